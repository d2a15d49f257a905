use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use indexmap::map::Entry;
use jay::name::{ClassName, FieldDescriptor, FieldName, MethodDescriptor, MethodName, ParameterName};
use crate::tree::names::{Names, Namespace, Namespaces};

/// A mapping tree: `N` namespaces and a table of classes, keyed by their
/// names in namespace 0 (the *default* namespace).
#[derive(Debug, Clone, PartialEq)]
pub struct Mappings<const N: usize> {
	pub namespaces: Namespaces<N>,
	/// Header properties of the source file, e.g. `escaped-names`.
	pub properties: IndexMap<String, Option<String>>,
	pub classes: IndexMap<ClassName, ClassMapping<N>>,
}

impl<const N: usize> Mappings<N> {
	pub fn new(namespaces: Namespaces<N>) -> Mappings<N> {
		Mappings {
			namespaces,
			properties: IndexMap::new(),
			classes: IndexMap::new(),
		}
	}

	pub fn namespace(&self, label: &str) -> Result<Namespace<N>> {
		self.namespaces.by_label(label)
	}

	/// A class may appear at most once per tree.
	pub fn add_class(&mut self, class: ClassMapping<N>) -> Result<&mut ClassMapping<N>> {
		match self.classes.entry(class.key()?) {
			Entry::Occupied(e) => {
				bail!("duplicate mapping for class {:?}: {:?} and {:?}", e.key(), e.get(), class);
			},
			Entry::Vacant(e) => Ok(e.insert(class)),
		}
	}

	pub fn get_class(&self, name: &ClassName) -> Option<&ClassMapping<N>> {
		self.classes.get(name)
	}

	/// Like [`get_class`][Self::get_class], but an absent class is an error.
	/// Remapping tolerates unmapped classes; explicit lookups don't.
	pub fn require_class(&self, name: &ClassName) -> Result<&ClassMapping<N>> {
		self.classes.get(name)
			.with_context(|| anyhow!("missing class {name:?} in the mapping tree"))
	}

	/// The name of `class` in `namespace`, or `class` itself if the tree
	/// doesn't map it. Array types and primitives are not handled here; the
	/// remapper composes descriptors from plain class names.
	pub fn map_type(&self, class: &ClassName, namespace: Namespace<N>) -> ClassName {
		match self.classes.get(class) {
			Some(mapping) => mapping.names.resolve(namespace)
				.map(|x| x.clone())
				.unwrap_or_else(|_| class.clone()),
			None => class.clone(),
		}
	}
}

/// The key fields and methods are looked up under, inside their owner.
///
/// Name and descriptor are both in the tree's default namespace; equality
/// and hashing use both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey {
	pub name: String,
	pub desc: String,
}

impl MemberKey {
	pub fn new(name: impl Into<String>, desc: impl Into<String>) -> MemberKey {
		MemberKey { name: name.into(), desc: desc.into() }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMapping<const N: usize> {
	pub names: Names<N, ClassName>,
	pub fields: IndexMap<MemberKey, FieldMapping<N>>,
	pub methods: IndexMap<MemberKey, MethodMapping<N>>,
	pub doc: Option<String>,
}

impl<const N: usize> ClassMapping<N> {
	pub fn new(names: Names<N, ClassName>) -> ClassMapping<N> {
		ClassMapping {
			names,
			fields: IndexMap::new(),
			methods: IndexMap::new(),
			doc: None,
		}
	}

	pub(crate) fn key(&self) -> Result<ClassName> {
		Ok(self.names.default_name()?.clone())
	}

	pub fn add_field(&mut self, field: FieldMapping<N>) -> Result<&mut FieldMapping<N>> {
		match self.fields.entry(field.key()?) {
			Entry::Occupied(e) => {
				bail!("duplicate mapping for field {:?}: {:?} and {:?}", e.key(), e.get(), field);
			},
			Entry::Vacant(e) => Ok(e.insert(field)),
		}
	}

	pub fn add_method(&mut self, method: MethodMapping<N>) -> Result<&mut MethodMapping<N>> {
		match self.methods.entry(method.key()?) {
			Entry::Occupied(e) => {
				bail!("duplicate mapping for method {:?}: {:?} and {:?}", e.key(), e.get(), method);
			},
			Entry::Vacant(e) => Ok(e.insert(method)),
		}
	}

	pub fn get_field(&self, name: &str, desc: &str) -> Option<&FieldMapping<N>> {
		self.fields.get(&MemberKey::new(name, desc))
	}

	pub fn get_method(&self, name: &str, desc: &str) -> Option<&MethodMapping<N>> {
		self.methods.get(&MemberKey::new(name, desc))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping<const N: usize> {
	/// In the tree's default namespace.
	pub desc: FieldDescriptor,
	pub names: Names<N, FieldName>,
	pub doc: Option<String>,
}

impl<const N: usize> FieldMapping<N> {
	pub fn new(desc: FieldDescriptor, names: Names<N, FieldName>) -> FieldMapping<N> {
		FieldMapping { desc, names, doc: None }
	}

	pub(crate) fn key(&self) -> Result<MemberKey> {
		Ok(MemberKey::new(self.names.default_name()?.as_str(), self.desc.as_str()))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodMapping<const N: usize> {
	/// In the tree's default namespace.
	pub desc: MethodDescriptor,
	pub names: Names<N, MethodName>,
	/// Sparse, keyed by local variable slot. Slot 0 is `this` for instance
	/// methods; `long` and `double` parameters take two slots.
	pub parameters: IndexMap<usize, ParameterMapping<N>>,
	pub doc: Option<String>,
}

impl<const N: usize> MethodMapping<N> {
	pub fn new(desc: MethodDescriptor, names: Names<N, MethodName>) -> MethodMapping<N> {
		MethodMapping {
			desc,
			names,
			parameters: IndexMap::new(),
			doc: None,
		}
	}

	pub(crate) fn key(&self) -> Result<MemberKey> {
		Ok(MemberKey::new(self.names.default_name()?.as_str(), self.desc.as_str()))
	}

	pub fn add_parameter(&mut self, parameter: ParameterMapping<N>) -> Result<&mut ParameterMapping<N>> {
		match self.parameters.entry(parameter.slot) {
			Entry::Occupied(e) => {
				bail!("duplicate mapping for parameter slot {}: {:?} and {:?}", e.key(), e.get(), parameter);
			},
			Entry::Vacant(e) => Ok(e.insert(parameter)),
		}
	}

	pub fn get_parameter(&self, slot: usize) -> Option<&ParameterMapping<N>> {
		self.parameters.get(&slot)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMapping<const N: usize> {
	pub slot: usize,
	pub names: Names<N, ParameterName>,
	pub doc: Option<String>,
}

impl<const N: usize> ParameterMapping<N> {
	pub fn new(slot: usize, names: Names<N, ParameterName>) -> ParameterMapping<N> {
		ParameterMapping { slot, names, doc: None }
	}
}
