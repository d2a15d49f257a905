//! Remappers answer "what is the name of X in the other namespace?".
//!
//! [`TypeMapper`] covers class names and descriptors. [`MemberMapper`] adds
//! fields and methods, resolved against a class hierarchy: Java lets a
//! subclass inherit members without re-declaring them, so a mapping usually
//! lists a member only on its declarer, and a reference through a subclass
//! has to walk the supertypes to find it.

use anyhow::{bail, Result};
use indexmap::{IndexMap, IndexSet};
use jay::name::{ClassName, FieldDescriptor, FieldName, MethodDescriptor, MethodName};
use crate::tree::mappings::{Mappings, MemberKey};
use crate::tree::names::Namespace;

/// Rewrites every `L…;` class reference in a field descriptor.
pub fn map_field_descriptor(desc: &str, f: impl Fn(&ClassName) -> ClassName) -> Result<String> {
	map_descriptor(desc, &f)
}

/// Rewrites every `L…;` class reference in a method descriptor.
pub fn map_method_descriptor(desc: &str, f: impl Fn(&ClassName) -> ClassName) -> Result<String> {
	map_descriptor(desc, &f)
}

fn map_descriptor(desc: &str, f: &dyn Fn(&ClassName) -> ClassName) -> Result<String> {
	let mut out = String::with_capacity(desc.len());
	let mut rest = desc;

	while let Some(start) = rest.find('L') {
		let (head, tail) = rest.split_at(start + 1);
		out.push_str(head);

		let Some(end) = tail.find(';') else {
			bail!("descriptor {desc:?} has a missing semicolon somewhere");
		};

		let class_name = ClassName::from(&tail[..end]);
		out.push_str(f(&class_name).as_str());
		out.push(';');

		rest = &tail[end + 1..];
	}
	out.push_str(rest);

	Ok(out)
}

/// Remaps class names and descriptors.
pub trait TypeMapper {
	fn map_class_opt(&self, class: &ClassName) -> Option<ClassName>;

	fn map_class(&self, class: &ClassName) -> ClassName {
		self.map_class_opt(class).unwrap_or_else(|| class.clone())
	}

	/// A `CONSTANT_Class` entry may carry an array descriptor instead of a
	/// plain internal name; both forms come through here.
	fn map_class_or_array(&self, name: &str) -> Result<String> {
		if name.starts_with('[') {
			self.map_descriptor(name)
		} else {
			Ok(self.map_class(&ClassName::from(name)).into_inner())
		}
	}

	fn map_descriptor(&self, desc: &str) -> Result<String> {
		map_descriptor(desc, &|x| self.map_class(x))
	}
}

/// Declared supertypes, superclass first, then interfaces in declared order.
pub trait SuperTypes {
	fn super_types(&self, class: &ClassName) -> Option<&IndexSet<ClassName>>;
}

/// For remapping without hierarchy information, e.g. trees of classes only.
pub struct NoSuperTypes;

impl SuperTypes for NoSuperTypes {
	fn super_types(&self, _class: &ClassName) -> Option<&IndexSet<ClassName>> {
		None
	}
}

/// Remaps fields and methods as well as class names and descriptors.
pub trait MemberMapper: TypeMapper {
	fn map_field_opt(&self, owner: &ClassName, name: &str, desc: &str) -> Result<Option<(FieldName, FieldDescriptor)>>;

	fn map_method_opt(&self, owner: &ClassName, name: &str, desc: &str) -> Result<Option<(MethodName, MethodDescriptor)>>;

	/// Unmapped members keep their name; the descriptor is still rewritten.
	fn map_field(&self, owner: &ClassName, name: &str, desc: &str) -> Result<(FieldName, FieldDescriptor)> {
		Ok(match self.map_field_opt(owner, name, desc)? {
			Some(mapped) => mapped,
			None => (name.into(), self.map_descriptor(desc)?.into()),
		})
	}

	/// Unmapped members keep their name; the descriptor is still rewritten.
	fn map_method(&self, owner: &ClassName, name: &str, desc: &str) -> Result<(MethodName, MethodDescriptor)> {
		Ok(match self.map_method_opt(owner, name, desc)? {
			Some(mapped) => mapped,
			None => (name.into(), self.map_descriptor(desc)?.into()),
		})
	}
}

#[derive(Debug)]
struct RemapperClass<'a> {
	name: &'a ClassName,
	fields: IndexMap<MemberKey, (&'a FieldName, String)>,
	methods: IndexMap<MemberKey, (&'a MethodName, String)>,
}

/// A [`MemberMapper`] over a [`Mappings`] tree, between two of its
/// namespaces, with member resolution through the given hierarchy.
#[derive(Debug)]
pub struct MappingsRemapper<'a, 'i, S> {
	classes: IndexMap<&'a ClassName, RemapperClass<'a>>,
	types: IndexMap<&'a ClassName, &'a ClassName>,
	supers: &'i S,
}

impl<const N: usize> Mappings<N> {
	/// A remapper from namespace `from` to namespace `to`, resolving
	/// inherited members through `supers`. The hierarchy must use class
	/// names of the `from` namespace.
	pub fn remapper<'i, S: SuperTypes>(&self, from: Namespace<N>, to: Namespace<N>, supers: &'i S) -> Result<MappingsRemapper<'_, 'i, S>> {
		let mut types = IndexMap::new();
		for class in self.classes.values() {
			types.insert(class.names.resolve(from)?, class.names.resolve(to)?);
		}

		let from_types = |x: &ClassName| -> ClassName {
			// descriptors in the tree are in the default namespace
			self.map_type(x, from)
		};
		let to_types = |x: &ClassName| -> ClassName {
			self.map_type(x, to)
		};

		let mut classes = IndexMap::new();
		for class in self.classes.values() {
			let mut fields = IndexMap::new();
			for field in class.fields.values() {
				fields.insert(
					MemberKey::new(field.names.resolve(from)?.as_str(), map_field_descriptor(field.desc.as_str(), from_types)?),
					(field.names.resolve(to)?, map_field_descriptor(field.desc.as_str(), to_types)?),
				);
			}

			let mut methods = IndexMap::new();
			for method in class.methods.values() {
				methods.insert(
					MemberKey::new(method.names.resolve(from)?.as_str(), map_method_descriptor(method.desc.as_str(), from_types)?),
					(method.names.resolve(to)?, map_method_descriptor(method.desc.as_str(), to_types)?),
				);
			}

			classes.insert(class.names.resolve(from)?, RemapperClass {
				name: class.names.resolve(to)?,
				fields,
				methods,
			});
		}

		Ok(MappingsRemapper { classes, types, supers })
	}
}

impl<S> TypeMapper for MappingsRemapper<'_, '_, S> {
	fn map_class_opt(&self, class: &ClassName) -> Option<ClassName> {
		self.types.get(class).map(|&x| x.clone())
	}
}

impl<S: SuperTypes> MappingsRemapper<'_, '_, S> {
	/// A member not mapped on the declarer may be mapped on a supertype:
	/// superclass first, then interfaces in declared order, recursively. The
	/// visited set keeps malformed, cyclic hierarchies from hanging this.
	fn resolve_field(&self, owner: &ClassName, key: &MemberKey, visited: &mut IndexSet<ClassName>) -> Option<(FieldName, FieldDescriptor)> {
		if !visited.insert(owner.clone()) {
			return None;
		}

		if let Some(class) = self.classes.get(owner) {
			if let Some((name, desc)) = class.fields.get(key) {
				return Some(((*name).clone(), desc.as_str().into()));
			}
		}

		if let Some(supers) = self.supers.super_types(owner) {
			for super_type in supers {
				if let Some(hit) = self.resolve_field(super_type, key, visited) {
					return Some(hit);
				}
			}
		}

		None
	}

	fn resolve_method(&self, owner: &ClassName, key: &MemberKey, visited: &mut IndexSet<ClassName>) -> Option<(MethodName, MethodDescriptor)> {
		if !visited.insert(owner.clone()) {
			return None;
		}

		if let Some(class) = self.classes.get(owner) {
			if let Some((name, desc)) = class.methods.get(key) {
				return Some(((*name).clone(), desc.as_str().into()));
			}
		}

		if let Some(supers) = self.supers.super_types(owner) {
			for super_type in supers {
				if let Some(hit) = self.resolve_method(super_type, key, visited) {
					return Some(hit);
				}
			}
		}

		None
	}
}

impl<S: SuperTypes> MemberMapper for MappingsRemapper<'_, '_, S> {
	fn map_field_opt(&self, owner: &ClassName, name: &str, desc: &str) -> Result<Option<(FieldName, FieldDescriptor)>> {
		let key = MemberKey::new(name, desc);
		Ok(self.resolve_field(owner, &key, &mut IndexSet::new()))
	}

	fn map_method_opt(&self, owner: &ClassName, name: &str, desc: &str) -> Result<Option<(MethodName, MethodDescriptor)>> {
		let key = MemberKey::new(name, desc);
		Ok(self.resolve_method(owner, &key, &mut IndexSet::new()))
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use super::*;
	use crate::tree::mappings::{ClassMapping, FieldMapping, Mappings};

	#[test]
	fn descriptors() {
		let f = |x: &ClassName| -> ClassName {
			match x.as_str() {
				"a" => "pkg/Apple".into(),
				other => other.into(),
			}
		};
		assert_eq!(map_field_descriptor("La;", f).unwrap(), "Lpkg/Apple;");
		assert_eq!(map_method_descriptor("(I[La;J)Lb;", f).unwrap(), "(I[Lpkg/Apple;J)Lb;");
		assert_eq!(map_field_descriptor("[[I", f).unwrap(), "[[I");
		assert!(map_field_descriptor("La", f).is_err());
	}

	#[test]
	fn field_mapped_on_super_resolves_through_subclass() {
		let mut mappings: Mappings<2> = Mappings::new(["official", "named"].into());
		let parent = mappings.add_class(ClassMapping::new(["p", "pkg/Parent"].map(ClassName::from).into())).unwrap();
		parent.add_field(FieldMapping::new("I".into(), ["x", "count"].map(Into::into).into())).unwrap();
		mappings.add_class(ClassMapping::new(["c", "pkg/Child"].map(ClassName::from).into())).unwrap();

		struct Supers;
		impl SuperTypes for Supers {
			fn super_types(&self, class: &ClassName) -> Option<&IndexSet<ClassName>> {
				static CELL: std::sync::OnceLock<IndexSet<ClassName>> = std::sync::OnceLock::new();
				(class.as_str() == "c")
					.then(|| CELL.get_or_init(|| IndexSet::from(["p".into()])))
			}
		}

		let from = Namespace::new(0).unwrap();
		let to = Namespace::new(1).unwrap();
		let remapper = mappings.remapper(from, to, &Supers).unwrap();

		let (name, desc) = remapper.map_field(&"c".into(), "x", "I").unwrap();
		assert_eq!(name.as_str(), "count");
		assert_eq!(desc.as_str(), "I");

		// not mapped anywhere: name kept, descriptor still rewritten
		let (name, desc) = remapper.map_field(&"c".into(), "y", "Lp;").unwrap();
		assert_eq!(name.as_str(), "y");
		assert_eq!(desc.as_str(), "Lpkg/Parent;");
	}
}
