//! Reading and writing of the tab-delimited "Tiny v2" mapping format.
//!
//! A file starts with `tiny\t2\t0\t<namespace…>`, optionally followed by
//! indented property lines (the `escaped-names` property turns on the
//! `\\ \n \r \t \0` escapes), then one `c` block per class with nested `f`,
//! `m`, `p` and comment lines.
//!
//! After reading it's worth checking the namespaces are the expected ones,
//! see [`Namespaces::check_that`][crate::tree::names::Namespaces::check_that].

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use crate::lines::{cook, escape, Line, Nested};
use crate::tree::mappings::{ClassMapping, FieldMapping, Mappings, MethodMapping, ParameterMapping};
use crate::tree::names::Names;

pub const ESCAPED_NAMES: &str = "escaped-names";

pub fn read_file<const N: usize>(path: impl AsRef<Path>) -> Result<Mappings<N>> {
	read(File::open(&path)?)
		.with_context(|| anyhow!("failed to read mappings file {:?} as tiny v2", path.as_ref()))
}

pub fn read<const N: usize>(reader: impl Read) -> Result<Mappings<N>> {
	if N < 2 {
		bail!("must read at least two namespaces, {N} is less than that");
	}

	let mut lines = BufReader::new(reader)
		.lines()
		.enumerate()
		.map(|(i, line)| Line::parse(i + 1, &line?))
		.peekable();

	let mut header = lines.next().context("no header line")??;
	if header.keyword != "tiny" {
		bail!("header version isn't tiny v2, in line {header:?}");
	}
	if header.next()? != "2" {
		bail!("unsupported tiny major version, in line {header:?}");
	}
	let minor = header.next()?;
	if minor != "0" {
		bail!("unsupported tiny v2 minor version {minor:?}");
	}

	let namespaces: [String; N] = header.into_names::<N, String>(false)?
		.names()
		.clone()
		.map(|x| x.unwrap_or_default());
	let mut mappings = Mappings::new(namespaces.try_into().context("in header line")?);

	// property lines sit between the header and the first class
	while let Some(Ok(line)) = lines.peek() {
		if line.indent != 1 {
			break;
		}
		if let Some(Ok(mut line)) = lines.next() {
			let value = line.next_opt();
			mappings.properties.insert(line.keyword, value);
		}
	}

	let escaped = mappings.properties.contains_key(ESCAPED_NAMES);

	Nested::new(&mut lines).for_each_line(|iter, line| {
		if line.keyword != "c" {
			bail!("unknown keyword {:?} at class level", line.keyword);
		}

		let names: Names<N, _> = line.into_names(escaped)?;
		let class = mappings.add_class(ClassMapping::new(names))?;

		iter.children().for_each_line(|iter, mut line| {
			match line.keyword.as_str() {
				"f" => {
					let desc = line.next()?.into();
					let field = class.add_field(FieldMapping::new(desc, line.into_names(escaped)?))?;

					iter.children().for_each_line(|_, line| {
						match line.keyword.as_str() {
							"c" => set_comment(&mut field.doc, line, escaped),
							keyword => bail!("unknown keyword {keyword:?} below a field"),
						}
					})
				},
				"m" => {
					let desc = line.next()?.into();
					let method = class.add_method(MethodMapping::new(desc, line.into_names(escaped)?))?;

					iter.children().for_each_line(|iter, mut line| {
						match line.keyword.as_str() {
							"p" => {
								let slot = line.next_usize()?;
								let parameter = method.add_parameter(ParameterMapping::new(slot, line.into_names(escaped)?))?;

								iter.children().for_each_line(|_, line| {
									match line.keyword.as_str() {
										"c" => set_comment(&mut parameter.doc, line, escaped),
										keyword => bail!("unknown keyword {keyword:?} below a parameter"),
									}
								})
							},
							"c" => set_comment(&mut method.doc, line, escaped),
							keyword => bail!("unknown keyword {keyword:?} below a method"),
						}
					})
				},
				"c" => set_comment(&mut class.doc, line, escaped),
				keyword => bail!("unknown keyword {keyword:?} below a class"),
			}
		})
	}).context("reading lines")?;

	Ok(mappings)
}

fn set_comment(doc: &mut Option<String>, line: Line, escaped: bool) -> Result<()> {
	let comment = cook(&line.end()?, escaped)?;
	if doc.is_some() {
		bail!("only one comment is allowed, got a second one: {comment:?}");
	}
	*doc = Some(comment);
	Ok(())
}

pub fn write_file<const N: usize>(mappings: &Mappings<N>, path: impl AsRef<Path>) -> Result<()> {
	write(mappings, &mut File::create(&path)?)
		.with_context(|| anyhow!("failed to write mappings file {:?} as tiny v2", path.as_ref()))
}

pub fn write_string<const N: usize>(mappings: &Mappings<N>) -> Result<String> {
	let mut vec = Vec::new();
	write(mappings, &mut vec)?;
	String::from_utf8(vec).context("failed to convert written mappings to utf8")
}

/// Writes the tree in tiny v2. Classes, members and parameters come out
/// sorted, so writing is deterministic regardless of input order.
pub fn write<const N: usize>(mappings: &Mappings<N>, w: &mut impl Write) -> Result<()> {
	// the buffering makes it much faster
	let mut w = BufWriter::new(w);
	let w = &mut w;

	let escaped = mappings.properties.contains_key(ESCAPED_NAMES);

	write!(w, "tiny\t2\t0")?;
	for namespace in mappings.namespaces.labels() {
		write!(w, "\t{namespace}")?;
	}
	writeln!(w)?;

	for (key, value) in &mappings.properties {
		match value {
			Some(value) => writeln!(w, "\t{key}\t{value}")?,
			None => writeln!(w, "\t{key}")?,
		}
	}

	let mut classes: Vec<_> = mappings.classes.values().collect();
	classes.sort_by(|a, b| a.names.cmp(&b.names));
	for class in classes {
		write!(w, "c")?;
		write_names(w, &class.names, escaped)?;

		write_comment(w, 1, &class.doc, escaped)?;

		let mut fields: Vec<_> = class.fields.values().collect();
		fields.sort_by(|a, b| (&a.desc, &a.names).cmp(&(&b.desc, &b.names)));
		for field in fields {
			write!(w, "\tf\t{}", field.desc.as_str())?;
			write_names(w, &field.names, escaped)?;

			write_comment(w, 2, &field.doc, escaped)?;
		}

		let mut methods: Vec<_> = class.methods.values().collect();
		methods.sort_by(|a, b| (&a.desc, &a.names).cmp(&(&b.desc, &b.names)));
		for method in methods {
			write!(w, "\tm\t{}", method.desc.as_str())?;
			write_names(w, &method.names, escaped)?;

			write_comment(w, 2, &method.doc, escaped)?;

			let mut parameters: Vec<_> = method.parameters.values().collect();
			parameters.sort_by_key(|x| x.slot);
			for parameter in parameters {
				write!(w, "\t\tp\t{}", parameter.slot)?;
				write_names(w, &parameter.names, escaped)?;

				write_comment(w, 3, &parameter.doc, escaped)?;
			}
		}
	}

	w.flush()?;
	Ok(())
}

fn write_names<const N: usize, T: AsRef<str> + Ord>(w: &mut impl Write, names: &Names<N, T>, escaped: bool) -> Result<()> {
	for name in names.names() {
		let name = name.as_ref().map(AsRef::as_ref).unwrap_or("");
		if escaped {
			write!(w, "\t{}", escape(name))?;
		} else {
			write!(w, "\t{name}")?;
		}
	}
	writeln!(w)?;
	Ok(())
}

fn write_comment(w: &mut impl Write, depth: usize, doc: &Option<String>, escaped: bool) -> Result<()> {
	if let Some(doc) = doc {
		let doc = if escaped { escape(doc) } else { doc.clone() };
		writeln!(w, "{}c\t{doc}", "\t".repeat(depth))?;
	}
	Ok(())
}
