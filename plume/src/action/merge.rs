use std::fmt::Debug;
use anyhow::{anyhow, bail, Context, Result};
use indexmap::map::Entry;
use crate::tree::mappings::{ClassMapping, Mappings, MethodMapping};
use crate::tree::names::{Names, Namespace};

/// Both sides set, and disagreeing.
fn names_conflict<const N: usize, T>(a: &Names<N, T>, b: &Names<N, T>) -> bool
where
	T: Debug + Clone + PartialEq,
{
	(0..N).any(|i| {
		// safe: i < N
		let namespace = Namespace::new(i).unwrap_or(Namespace::DEFAULT);
		match (a.resolve(namespace), b.resolve(namespace)) {
			(Ok(a), Ok(b)) => a != b,
			_ => false,
		}
	})
}

fn merge_doc(a: &Option<String>, b: &Option<String>) -> Result<Option<String>> {
	Ok(match (a, b) {
		(None, None) => None,
		(Some(x), None) | (None, Some(x)) => Some(x.clone()),
		(Some(a), Some(b)) if a == b => Some(a.clone()),
		(Some(a), Some(b)) => bail!("conflicting comments {a:?} and {b:?}"),
	})
}

fn merge_class<const N: usize>(into: &mut ClassMapping<N>, from: &ClassMapping<N>) -> Result<()> {
	if names_conflict(&into.names, &from.names) {
		bail!("inconsistent mappings: class has names {:?} on one side and {:?} on the other", into.names, from.names);
	}
	into.doc = merge_doc(&into.doc, &from.doc)?;

	for (key, field) in &from.fields {
		match into.fields.entry(key.clone()) {
			Entry::Vacant(e) => { e.insert(field.clone()); },
			Entry::Occupied(e) => {
				let existing = e.into_mut();
				if names_conflict(&existing.names, &field.names) {
					bail!("inconsistent mappings: field {key:?} has names {:?} on one side and {:?} on the other", existing.names, field.names);
				}
				existing.doc = merge_doc(&existing.doc, &field.doc)
					.with_context(|| anyhow!("on field {key:?}"))?;
			},
		}
	}

	for (key, method) in &from.methods {
		match into.methods.entry(key.clone()) {
			Entry::Vacant(e) => { e.insert(method.clone()); },
			Entry::Occupied(e) => {
				merge_method(e.into_mut(), method)
					.with_context(|| anyhow!("on method {key:?}"))?;
			},
		}
	}

	Ok(())
}

fn merge_method<const N: usize>(into: &mut MethodMapping<N>, from: &MethodMapping<N>) -> Result<()> {
	if names_conflict(&into.names, &from.names) {
		bail!("inconsistent mappings: method has names {:?} on one side and {:?} on the other", into.names, from.names);
	}
	into.doc = merge_doc(&into.doc, &from.doc)?;

	for (slot, parameter) in &from.parameters {
		match into.parameters.entry(*slot) {
			Entry::Vacant(e) => { e.insert(parameter.clone()); },
			Entry::Occupied(e) => {
				let existing = e.into_mut();
				if names_conflict(&existing.names, &parameter.names) {
					bail!("inconsistent mappings: parameter {slot} has names {:?} on one side and {:?} on the other", existing.names, parameter.names);
				}
				existing.doc = merge_doc(&existing.doc, &parameter.doc)
					.with_context(|| anyhow!("on parameter {slot}"))?;
			},
		}
	}

	Ok(())
}

impl<const N: usize> Mappings<N> {
	/// The union of two trees over the same namespaces, e.g. the client and
	/// server halves of one version.
	///
	/// Classes present in both union their member tables by key; shared
	/// entries must agree on their name vectors, a conflict is an error.
	/// Commutative when the class sets are disjoint.
	pub fn merge(&self, other: &Mappings<N>) -> Result<Mappings<N>> {
		if self.namespaces != other.namespaces {
			bail!("cannot merge mappings with namespaces {:?} and {:?}", self.namespaces, other.namespaces);
		}

		let mut out = self.clone();

		for (key, value) in &other.properties {
			out.properties.entry(key.clone()).or_insert_with(|| value.clone());
		}

		for (name, class) in &other.classes {
			match out.classes.entry(name.clone()) {
				Entry::Vacant(e) => { e.insert(class.clone()); },
				Entry::Occupied(e) => {
					merge_class(e.into_mut(), class)
						.with_context(|| anyhow!("while merging class {name:?}"))?;
				},
			}
		}

		Ok(out)
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use jay::name::ClassName;
	use crate::tree::mappings::{ClassMapping, FieldMapping, Mappings};

	fn tree_with(class: [&str; 2], field: Option<[&str; 2]>) -> Mappings<2> {
		let mut mappings: Mappings<2> = Mappings::new(["official", "named"].into());
		let added = mappings.add_class(ClassMapping::new(class.map(ClassName::from).into())).unwrap();
		if let Some(names) = field {
			added.add_field(FieldMapping::new("I".into(), names.map(Into::into).into())).unwrap();
		}
		mappings
	}

	#[test]
	fn merge_disjoint_is_commutative() {
		let a = tree_with(["a", "client/Render"], None);
		let b = tree_with(["b", "server/Tick"], None);

		let ab = a.merge(&b).unwrap();
		let ba = b.merge(&a).unwrap();

		assert_eq!(ab.classes.len(), 2);
		assert_eq!(ab.get_class(&"a".into()), ba.get_class(&"a".into()));
		assert_eq!(ab.get_class(&"b".into()), ba.get_class(&"b".into()));
	}

	#[test]
	fn merge_unions_members() {
		let a = tree_with(["a", "shared/Thing"], Some(["x", "count"]));
		let b = tree_with(["a", "shared/Thing"], Some(["y", "limit"]));

		let merged = a.merge(&b).unwrap();
		let class = merged.get_class(&"a".into()).unwrap();
		assert!(class.get_field("x", "I").is_some());
		assert!(class.get_field("y", "I").is_some());
	}

	#[test]
	fn merge_conflict_is_an_error() {
		let a = tree_with(["a", "shared/Thing"], Some(["x", "count"]));
		let b = tree_with(["a", "shared/Thing"], Some(["x", "limit"]));

		assert!(a.merge(&b).is_err());
	}
}
