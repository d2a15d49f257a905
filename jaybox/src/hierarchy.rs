//! The supertype index of one remap job.

use anyhow::{anyhow, Context, Result};
use indexmap::{IndexMap, IndexSet};
use jay::class_file::ClassHeader;
use jay::name::ClassName;
use plume::remapper::SuperTypes;
use crate::storage::{Jar, OpenedJar};

/// Declared supertypes per class: superclass first, then interfaces in
/// declared order, filtered to classes present in the job.
///
/// The hierarchy is a graph of names, not objects; walks over it carry a
/// visited set, so a malformed jar with a supertype cycle cannot hang a
/// lookup.
#[derive(Debug, Default)]
pub struct HierarchyIndex {
	supers: IndexMap<ClassName, IndexSet<ClassName>>,
}

impl HierarchyIndex {
	/// Indexes every class of `jar`, parsing only the class file headers.
	pub fn from_jar(jar: &impl Jar) -> Result<HierarchyIndex> {
		let mut opened = jar.open()?;

		let mut declared = Vec::new();
		for (name, data) in opened.classes()? {
			let header = ClassHeader::parse(&data)
				.with_context(|| anyhow!("failed to parse class file header of {name:?}"))?;

			let mut supers = IndexSet::new();
			if let Some(super_class) = header.super_class {
				supers.insert(super_class);
			}
			supers.extend(header.interfaces);

			declared.push((name, supers));
		}

		Ok(Self::from_declared(declared))
	}

	fn from_declared(declared: Vec<(ClassName, IndexSet<ClassName>)>) -> HierarchyIndex {
		let present: IndexSet<&ClassName> = declared.iter().map(|(name, _)| name).collect();

		let supers = declared.iter()
			.map(|(name, supers)| {
				let supers = supers.iter()
					.filter(|x| present.contains(x))
					.cloned()
					.collect();
				(name.clone(), supers)
			})
			.collect();

		HierarchyIndex { supers }
	}

	pub fn contains(&self, class: &ClassName) -> bool {
		self.supers.contains_key(class)
	}

	/// The supertype chain of `class` in resolution order: breadth across
	/// each declaration, depth-first overall, without duplicates and without
	/// `class` itself.
	pub fn ancestors<'a>(&'a self, class: &'a ClassName) -> Vec<&'a ClassName> {
		let mut out = Vec::new();
		let mut visited = IndexSet::new();
		visited.insert(class);
		self.collect_ancestors(class, &mut visited, &mut out);
		out
	}

	fn collect_ancestors<'a>(&'a self, class: &ClassName, visited: &mut IndexSet<&'a ClassName>, out: &mut Vec<&'a ClassName>) {
		if let Some(supers) = self.supers.get(class) {
			for super_type in supers {
				if visited.insert(super_type) {
					out.push(super_type);
					self.collect_ancestors(super_type, visited, out);
				}
			}
		}
	}
}

impl SuperTypes for HierarchyIndex {
	fn super_types(&self, class: &ClassName) -> Option<&IndexSet<ClassName>> {
		self.supers.get(class)
	}
}
