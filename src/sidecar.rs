//! Comment and metadata side data, written next to the cached mappings.

use std::collections::BTreeMap;
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use plume::tree::mappings::Mappings;

/// One object per class, keyed by the class's default-namespace name.
pub type Comments = BTreeMap<String, ClassComments>;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassComments {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
	/// Keyed `"name:descriptor"`.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub fields: BTreeMap<String, String>,
	/// Keyed `"name:descriptor"`.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub methods: BTreeMap<String, MethodComments>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodComments {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub parameters: Vec<ParameterComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterComment {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
	pub name: String,
	pub version: String,
}

/// Collects everything comment-like out of a tree. Classes and members
/// without any comments or named parameters don't appear at all.
pub fn comments_from_tree<const N: usize>(mappings: &Mappings<N>) -> Result<Comments> {
	let mut out = Comments::new();

	for class in mappings.classes.values() {
		let mut class_comments = ClassComments {
			comment: class.doc.clone(),
			..ClassComments::default()
		};

		for (key, field) in &class.fields {
			if let Some(doc) = &field.doc {
				class_comments.fields.insert(format!("{}:{}", key.name, key.desc), doc.clone());
			}
		}

		for (key, method) in &class.methods {
			let mut parameters: Vec<_> = method.parameters.values().collect();
			parameters.sort_by_key(|x| x.slot);

			// parameters usually only carry a name in the most-named
			// namespace; take the last one that is set
			let parameters: Vec<_> = parameters.into_iter()
				.filter_map(|parameter| {
					let name = parameter.names.names().iter().rev().flatten().next()?;
					Some(ParameterComment {
						name: name.as_str().to_owned(),
						comment: parameter.doc.clone(),
					})
				})
				.collect();

			if method.doc.is_some() || !parameters.is_empty() {
				class_comments.methods.insert(format!("{}:{}", key.name, key.desc), MethodComments {
					comment: method.doc.clone(),
					parameters,
				});
			}
		}

		let empty = class_comments.comment.is_none()
			&& class_comments.fields.is_empty()
			&& class_comments.methods.is_empty();
		if !empty {
			out.insert(class.names.default_name()?.as_str().to_owned(), class_comments);
		}
	}

	Ok(out)
}

pub fn comments_to_json(comments: &Comments) -> Result<Vec<u8>> {
	serde_json::to_vec_pretty(comments).context("failed to serialize comments")
}

pub fn metadata_to_json(metadata: &Metadata) -> Result<Vec<u8>> {
	serde_json::to_vec_pretty(metadata).context("failed to serialize metadata")
}

pub fn read_comments(path: &Path) -> Result<Comments> {
	let data = std::fs::read(path)
		.with_context(|| anyhow!("failed to read comments file {path:?}"))?;
	serde_json::from_slice(&data)
		.with_context(|| anyhow!("failed to parse comments file {path:?}"))
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use jay::name::ClassName;
	use plume::tree::mappings::{ClassMapping, FieldMapping, MethodMapping, ParameterMapping};
	use super::*;

	#[test]
	fn only_commented_nodes_appear() {
		let mut mappings: Mappings<2> = Mappings::new(["official", "named"].into());

		let class = mappings.add_class(ClassMapping::new(["a", "pkg/Apple"].map(ClassName::from).into())).unwrap();
		class.doc = Some("an apple".to_owned());

		let mut field = FieldMapping::new("I".into(), ["b", "seeds"].map(Into::into).into());
		field.doc = Some("how many seeds".to_owned());
		class.add_field(field).unwrap();
		class.add_field(FieldMapping::new("J".into(), ["c", "age"].map(Into::into).into())).unwrap();

		let mut method = MethodMapping::new("(I)V".into(), ["m", "grow"].map(Into::into).into());
		method.add_parameter(ParameterMapping::new(1, ["amount", ""].map(Into::into).into())).unwrap();
		class.add_method(method).unwrap();

		mappings.add_class(ClassMapping::new(["d", "pkg/Dull"].map(ClassName::from).into())).unwrap();

		let comments = comments_from_tree(&mappings).unwrap();

		assert_eq!(comments.len(), 1);
		let apple = comments.get("a").unwrap();
		assert_eq!(apple.comment.as_deref(), Some("an apple"));
		assert_eq!(apple.fields.get("b:I").map(String::as_str), Some("how many seeds"));
		assert!(!apple.fields.contains_key("c:J"));

		let grow = apple.methods.get("m:(I)V").unwrap();
		assert_eq!(grow.parameters[0].name, "amount");

		// and it round-trips through json
		let json = comments_to_json(&comments).unwrap();
		let back: Comments = serde_json::from_slice(&json).unwrap();
		assert_eq!(back, comments);
	}
}
