//! Reading of the older line-per-member "Tiny v1" format.
//!
//! The header is `v1\t<namespace…>`; every other line is `CLASS`, `FIELD` or
//! `METHOD`, with fields and methods naming their owner by its
//! default-namespace name. Members may appear before their `CLASS` line.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexSet;
use indexmap::map::Entry;
use jay::name::ClassName;
use crate::lines::Line;
use crate::tree::mappings::{ClassMapping, FieldMapping, Mappings, MethodMapping};
use crate::tree::names::Names;

pub fn read_file<const N: usize>(path: impl AsRef<Path>) -> Result<Mappings<N>> {
	read(File::open(&path)?)
		.with_context(|| anyhow!("failed to read mappings file {:?} as tiny v1", path.as_ref()))
}

pub fn read<const N: usize>(reader: impl Read) -> Result<Mappings<N>> {
	if N < 2 {
		bail!("must read at least two namespaces, {N} is less than that");
	}

	let mut lines = BufReader::new(reader)
		.lines()
		.enumerate()
		.map(|(i, line)| Line::parse(i + 1, &line?));

	let mut header = lines.next().context("no header line")??;
	if header.keyword != "v1" {
		bail!("header version isn't tiny v1, in line {header:?}");
	}

	let namespaces: [String; N] = header.into_names::<N, String>(false)?
		.names()
		.clone()
		.map(|x| x.unwrap_or_default());
	let mut mappings = Mappings::new(namespaces.try_into().context("in header line")?);

	// CLASS lines both declare the full name row and serve as anchor for
	// FIELD/METHOD lines, which may come first
	let mut declared: IndexSet<ClassName> = IndexSet::new();

	for line in lines {
		let mut line = line?;
		let number = line.number;

		if line.indent != 0 {
			bail!("unexpected indentation in line {number}");
		}

		match line.keyword.as_str() {
			"CLASS" => {
				let names: Names<N, ClassName> = line.into_names(false)?;
				let key = names.default_name()?.clone();

				if !declared.insert(key.clone()) {
					bail!("duplicate CLASS line for {key:?} in line {number}");
				}

				class_entry(&mut mappings, key).names = names;
			},
			"FIELD" => {
				let owner: ClassName = line.next()?.into();
				let desc = line.next()?.into();
				let names = line.into_names(false)?;

				class_entry(&mut mappings, owner)
					.add_field(FieldMapping::new(desc, names))
					.with_context(|| anyhow!("in line {number}"))?;
			},
			"METHOD" => {
				let owner: ClassName = line.next()?.into();
				let desc = line.next()?.into();
				let names = line.into_names(false)?;

				class_entry(&mut mappings, owner)
					.add_method(MethodMapping::new(desc, names))
					.with_context(|| anyhow!("in line {number}"))?;
			},
			keyword => bail!("unknown keyword {keyword:?} in line {number}"),
		}
	}

	Ok(mappings)
}

fn class_entry<const N: usize>(mappings: &mut Mappings<N>, name: ClassName) -> &mut ClassMapping<N> {
	match mappings.classes.entry(name.clone()) {
		Entry::Occupied(e) => e.into_mut(),
		Entry::Vacant(e) => e.insert(ClassMapping::new(Names::from_default(name))),
	}
}
