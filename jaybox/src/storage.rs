//! Jar storage.
//!
//! A [`Jar`] is anything that can be [`open`][Jar::open]ed for reading:
//! a file on disk ([`FileJar`]), a zip held in memory ([`MemJar`]), entries
//! already parsed into a map ([`ParsedJar`]), or several jars presented as
//! one read-only tree ([`CompositeJar`]). Entry names follow the archive
//! convention, so a class `a/b` sits at `a/b.class`.

use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use zip::write::SimpleFileOptions;
use zip::{DateTime, ZipArchive, ZipWriter};
use jay::name::ClassName;

/// What survives of a zip entry's metadata across the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryAttributes {
	pub last_modified: Option<DateTime>,
}

impl EntryAttributes {
	pub(crate) fn to_file_options(self) -> SimpleFileOptions {
		let options = SimpleFileOptions::default();
		match self.last_modified {
			Some(time) => options.last_modified_time(time),
			None => options,
		}
	}
}

/// Represents a `.jar` in some form. Opening it gives access to the entries.
pub trait Jar {
	type Opened<'a>: OpenedJar where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>>;
}

/// An opened, readable jar.
pub trait OpenedJar {
	/// Names of all non-directory entries, in archive order.
	fn entry_names(&mut self) -> Result<Vec<String>>;

	fn read_entry(&mut self, name: &str) -> Result<(EntryAttributes, Vec<u8>)>;

	/// The class entries as `(internal name, bytes)`, in archive order.
	fn classes(&mut self) -> Result<Vec<(ClassName, Vec<u8>)>> {
		let mut classes = Vec::new();
		for name in self.entry_names()? {
			if let Some(class_name) = class_entry_name(&name) {
				let (_, data) = self.read_entry(&name)?;
				classes.push((class_name, data));
			}
		}
		Ok(classes)
	}
}

/// The internal class name for a `….class` entry, `None` for anything else.
pub fn class_entry_name(entry_name: &str) -> Option<ClassName> {
	entry_name
		.strip_suffix(".class")
		.map(|x| x.trim_start_matches('/'))
		.map(ClassName::from)
}

/// A jar read from a path.
#[derive(Debug, Clone)]
pub struct FileJar {
	pub path: PathBuf,
}

impl FileJar {
	pub fn new(path: impl Into<PathBuf>) -> FileJar {
		FileJar { path: path.into() }
	}
}

impl Jar for FileJar {
	type Opened<'a> = ZipOpened<File> where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		let file = File::open(&self.path)
			.with_context(|| anyhow!("could not open file {:?}", self.path))?;
		let archive = ZipArchive::new(file)
			.with_context(|| anyhow!("failed to read zip archive from {:?}", self.path))?;
		Ok(ZipOpened { archive })
	}
}

/// A jar held in memory, optionally carrying the file name it should be
/// stored under.
#[derive(Debug, Clone)]
pub struct MemJar {
	pub name: Option<String>,
	data: Vec<u8>,
}

impl MemJar {
	pub fn named(name: impl Into<String>, data: Vec<u8>) -> MemJar {
		MemJar { name: Some(name.into()), data }
	}

	pub fn unnamed(data: Vec<u8>) -> MemJar {
		MemJar { name: None, data }
	}
}

impl Jar for MemJar {
	type Opened<'a> = ZipOpened<Cursor<&'a [u8]>> where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		let archive = ZipArchive::new(Cursor::new(self.data.as_slice()))
			.with_context(|| anyhow!("failed to read zip archive from memory jar {:?}", self.name))?;
		Ok(ZipOpened { archive })
	}
}

pub struct ZipOpened<R: Read + Seek> {
	archive: ZipArchive<R>,
}

impl<R: Read + Seek> OpenedJar for ZipOpened<R> {
	fn entry_names(&mut self) -> Result<Vec<String>> {
		let mut names = Vec::with_capacity(self.archive.len());
		for i in 0..self.archive.len() {
			let entry = self.archive.by_index(i)?;
			if !entry.is_dir() {
				names.push(entry.name().to_owned());
			}
		}
		Ok(names)
	}

	fn read_entry(&mut self, name: &str) -> Result<(EntryAttributes, Vec<u8>)> {
		let mut entry = self.archive.by_name(name)
			.with_context(|| anyhow!("no entry {name:?}"))?;

		let attr = EntryAttributes { last_modified: entry.last_modified() };

		let mut data = Vec::with_capacity(entry.size() as usize);
		entry.read_to_end(&mut data)?;
		Ok((attr, data))
	}
}

/// A jar with its entries parsed into memory; what the remapper produces,
/// and the only [`Jar`] here that can also be written out.
#[derive(Debug, Default, Clone)]
pub struct ParsedJar {
	pub entries: IndexMap<String, ParsedEntry>,
}

#[derive(Debug, Clone)]
pub struct ParsedEntry {
	pub attr: EntryAttributes,
	pub data: Vec<u8>,
}

impl ParsedJar {
	pub fn from_jar(jar: &impl Jar) -> Result<ParsedJar> {
		let mut opened = jar.open()?;

		let mut result = ParsedJar::default();
		for name in opened.entry_names()? {
			let (attr, data) = opened.read_entry(&name)?;
			result.entries.insert(name, ParsedEntry { attr, data });
		}
		Ok(result)
	}

	pub fn put(&mut self, name: String, attr: EntryAttributes, data: Vec<u8>) {
		self.entries.insert(name, ParsedEntry { attr, data });
	}

	fn write<W: Write + Seek>(&self, writer: W) -> Result<W> {
		let mut zip = ZipWriter::new(writer);
		for (name, entry) in &self.entries {
			zip.start_file(name.as_str(), entry.attr.to_file_options())?;
			zip.write_all(&entry.data)?;
		}
		Ok(zip.finish()?)
	}

	pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
		let file = File::create(&path)
			.with_context(|| anyhow!("failed to open {:?} for writing jar", path.as_ref()))?;
		self.write(file)
			.with_context(|| anyhow!("failed to write jar to {:?}", path.as_ref()))?;
		Ok(())
	}

	pub fn into_mem(self) -> Result<MemJar> {
		let vec = self.write(Cursor::new(Vec::new()))?.into_inner();
		Ok(MemJar::unnamed(vec))
	}
}

impl Jar for ParsedJar {
	type Opened<'a> = &'a ParsedJar where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		Ok(self)
	}
}

impl OpenedJar for &ParsedJar {
	fn entry_names(&mut self) -> Result<Vec<String>> {
		Ok(self.entries.keys().cloned().collect())
	}

	fn read_entry(&mut self, name: &str) -> Result<(EntryAttributes, Vec<u8>)> {
		let entry = self.entries.get(name)
			.with_context(|| anyhow!("no entry {name:?}"))?;
		Ok((entry.attr, entry.data.clone()))
	}
}

/// Several jars opened together as one read-only tree; the first jar
/// containing an entry wins. All of them are closed together when the
/// composite is dropped.
pub struct CompositeJar<J: Jar> {
	pub jars: Vec<J>,
}

impl<J: Jar> CompositeJar<J> {
	pub fn new(jars: Vec<J>) -> CompositeJar<J> {
		CompositeJar { jars }
	}
}

impl<J: Jar> Jar for CompositeJar<J> {
	type Opened<'a> = CompositeOpened<J::Opened<'a>> where Self: 'a;

	fn open(&self) -> Result<Self::Opened<'_>> {
		let opened = self.jars.iter()
			.map(|jar| jar.open())
			.collect::<Result<Vec<_>>>()?;
		Ok(CompositeOpened { opened })
	}
}

pub struct CompositeOpened<O> {
	opened: Vec<O>,
}

impl<O: OpenedJar> OpenedJar for CompositeOpened<O> {
	fn entry_names(&mut self) -> Result<Vec<String>> {
		let mut names = Vec::new();
		let mut seen = indexmap::IndexSet::new();
		for jar in &mut self.opened {
			for name in jar.entry_names()? {
				if seen.insert(name.clone()) {
					names.push(name);
				}
			}
		}
		Ok(names)
	}

	fn read_entry(&mut self, name: &str) -> Result<(EntryAttributes, Vec<u8>)> {
		for jar in &mut self.opened {
			if let Ok(entry) = jar.read_entry(name) {
				return Ok(entry);
			}
		}
		bail!("no entry {name:?} in any of the {} jars", self.opened.len());
	}
}
