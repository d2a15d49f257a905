use anyhow::{anyhow, Context, Result};
use crate::remapper::{map_field_descriptor, map_method_descriptor};
use crate::tree::mappings::{ClassMapping, FieldMapping, Mappings, MethodMapping, ParameterMapping};
use crate::tree::names::Namespace;

impl<const N: usize> Mappings<N> {
	/// Returns a tree whose default namespace is `target`: labels of
	/// namespace 0 and `target` are exchanged, and every keyed table is
	/// rebuilt under the names of `target`. Member descriptors are rewritten
	/// into the new default namespace; comments and parameter tables travel
	/// along unchanged.
	///
	/// Inverting along the default namespace is a clone. Inverting twice
	/// along the same namespace restores the original tree, up to `None`
	/// entries becoming explicit copies of the name they resolved to.
	pub fn invert(&self, target: Namespace<N>) -> Result<Mappings<N>> {
		if target.is_default() {
			return Ok(self.clone());
		}

		let mut out = Mappings::new(self.namespaces.swapped(target));
		out.properties = self.properties.clone();

		for class in self.classes.values() {
			let mut inverted = ClassMapping::new(class.names.swapped(target));
			inverted.doc = class.doc.clone();

			for field in class.fields.values() {
				let desc = map_field_descriptor(field.desc.as_str(), |x| self.map_type(x, target))
					.with_context(|| anyhow!("failed to invert descriptor of field {field:?}"))?;

				let mut out_field = FieldMapping::new(desc.into(), field.names.swapped(target));
				out_field.doc = field.doc.clone();
				inverted.add_field(out_field)?;
			}

			for method in class.methods.values() {
				let desc = map_method_descriptor(method.desc.as_str(), |x| self.map_type(x, target))
					.with_context(|| anyhow!("failed to invert descriptor of method {method:?}"))?;

				let mut out_method = MethodMapping::new(desc.into(), method.names.swapped(target));
				out_method.doc = method.doc.clone();
				for parameter in method.parameters.values() {
					let mut out_parameter = ParameterMapping::new(parameter.slot, parameter.names.swapped(target));
					out_parameter.doc = parameter.doc.clone();
					out_method.add_parameter(out_parameter)?;
				}
				inverted.add_method(out_method)?;
			}

			out.add_class(inverted)
				.with_context(|| anyhow!("while inverting to namespace {:?}", self.namespaces[target]))?;
		}

		Ok(out)
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use jay::name::ClassName;
	use crate::tree::mappings::{ClassMapping, FieldMapping, Mappings, MethodMapping, ParameterMapping};

	fn sample() -> Mappings<2> {
		let mut mappings: Mappings<2> = Mappings::new(["official", "named"].into());
		let class = mappings.add_class(ClassMapping::new(["a", "pkg/Apple"].map(ClassName::from).into())).unwrap();

		let mut field = FieldMapping::new("La;".into(), ["b", "parent"].map(Into::into).into());
		field.doc = Some("the parent apple".to_owned());
		class.add_field(field).unwrap();

		let mut method = MethodMapping::new("(La;)La;".into(), ["c", "graft"].map(Into::into).into());
		method.add_parameter(ParameterMapping::new(1, ["", "other"].map(Into::into).into())).unwrap();
		class.add_method(method).unwrap();

		mappings
	}

	#[test]
	fn invert_rekeys_and_maps_descriptors() {
		let mappings = sample();
		let named = mappings.namespace("named").unwrap();

		let inverted = mappings.invert(named).unwrap();
		assert_eq!(inverted.namespaces.labels(), &["named".to_owned(), "official".to_owned()]);

		let class = inverted.get_class(&"pkg/Apple".into()).unwrap();
		let official = inverted.namespace("official").unwrap();
		assert_eq!(class.names.resolve(official).unwrap().as_str(), "a");

		let field = class.get_field("parent", "Lpkg/Apple;").unwrap();
		assert_eq!(field.doc.as_deref(), Some("the parent apple"));

		let method = class.get_method("graft", "(Lpkg/Apple;)Lpkg/Apple;").unwrap();
		let parameter = method.get_parameter(1).unwrap();
		assert_eq!(parameter.names.resolve(official).unwrap().as_str(), "other");
	}

	#[test]
	fn invert_twice_restores() {
		let mappings = sample();
		let named = mappings.namespace("named").unwrap();

		let back = mappings.invert(named).unwrap().invert(named).unwrap();

		assert_eq!(back.namespaces, mappings.namespaces);
		let class = back.get_class(&"a".into()).unwrap();
		assert!(class.get_field("b", "La;").is_some());
		assert!(class.get_method("c", "(La;)La;").is_some());
	}
}
