//! Reading of Proguard mapping output.
//!
//! The format uses Java source names: dot-separated classes, `type name`
//! member declarations, `->` arrows, and optional `from:to:` line-number
//! prefixes on methods. The left-hand side is the original naming, the
//! right-hand side the obfuscated one, so a tree read here usually gets
//! [`invert`][crate::tree::mappings::Mappings::invert]ed before remapping
//! anything.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use jay::name::ClassName;
use crate::tree::mappings::{ClassMapping, FieldMapping, Mappings, MethodMapping};

pub fn read_file(path: impl AsRef<Path>, namespaces: [&str; 2]) -> Result<Mappings<2>> {
	read(File::open(&path)?, namespaces)
		.with_context(|| anyhow!("failed to read mappings file {:?} as proguard", path.as_ref()))
}

pub fn read(reader: impl Read, namespaces: [&str; 2]) -> Result<Mappings<2>> {
	let mut mappings = Mappings::new(namespaces.into());

	let mut current: Option<ClassName> = None;

	for (i, line) in BufReader::new(reader).lines().enumerate() {
		let number = i + 1;
		let line = line?;
		let trimmed = line.trim_start();

		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}

		let indented = trimmed.len() != line.len();

		(|| -> Result<()> {
			if indented {
				let owner = current.clone()
					.context("member line before the first class line")?;
				let class = mappings.classes.get_mut(&owner)
					.context("lost track of the current class")?;

				let (declaration, obf_name) = split_arrow(trimmed)?;
				// `from:to:` line number prefixes carry no mapping information
				let declaration = declaration.rsplit_once(':').map_or(declaration, |(_, x)| x);

				let (java_type, signature) = declaration.trim_start().split_once(' ')
					.with_context(|| anyhow!("expected `type name` in {declaration:?}"))?;

				if let Some((name, arguments)) = signature.split_once('(') {
					let arguments = arguments.strip_suffix(')')
						.with_context(|| anyhow!("expected closing parenthesis in {signature:?}"))?;

					let mut desc = String::from("(");
					if !arguments.is_empty() {
						for argument in arguments.split(',') {
							desc.push_str(&java_type_descriptor(argument)?);
						}
					}
					desc.push(')');
					desc.push_str(&java_type_descriptor(java_type)?);

					class.add_method(MethodMapping::new(desc.into(), [name, obf_name].map(Into::into).into()))?;
				} else {
					let desc = java_type_descriptor(java_type)?;
					class.add_field(FieldMapping::new(desc.into(), [signature, obf_name].map(Into::into).into()))?;
				}
			} else {
				let header = trimmed.strip_suffix(':')
					.with_context(|| anyhow!("class line doesn't end with a colon: {trimmed:?}"))?;
				let (original, obfuscated) = split_arrow(header)?;

				let names = [internal_name(original), internal_name(obfuscated)]
					.map(ClassName::from);
				let class = mappings.add_class(ClassMapping::new(names.into()))?;
				current = Some(class.names.default_name()?.clone());
			}
			Ok(())
		})().with_context(|| anyhow!("in line {number}"))?;
	}

	Ok(mappings)
}

fn split_arrow(field: &str) -> Result<(&str, &str)> {
	field.split_once(" -> ")
		.map(|(a, b)| (a.trim(), b.trim()))
		.with_context(|| anyhow!("expected an `->` arrow in {field:?}"))
}

fn internal_name(java_name: &str) -> String {
	java_name.replace('.', "/")
}

/// `com.example.Foo[][]` and friends into JVM descriptors.
fn java_type_descriptor(java_type: &str) -> Result<String> {
	let mut base = java_type;
	let mut dimensions = 0;
	while let Some(stripped) = base.strip_suffix("[]") {
		base = stripped;
		dimensions += 1;
	}

	if base.is_empty() {
		bail!("empty type in {java_type:?}");
	}

	let element = match base {
		"void" => "V".to_owned(),
		"boolean" => "Z".to_owned(),
		"byte" => "B".to_owned(),
		"char" => "C".to_owned(),
		"short" => "S".to_owned(),
		"int" => "I".to_owned(),
		"long" => "J".to_owned(),
		"float" => "F".to_owned(),
		"double" => "D".to_owned(),
		class => format!("L{};", internal_name(class)),
	};

	Ok(format!("{}{element}", "[".repeat(dimensions)))
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use super::*;

	#[test]
	fn classes_fields_and_methods() {
		let input = "\
# compiled from: Example.java
com.example.Style -> dqe:
    int weight -> a
    com.example.Style EMPTY -> b
    12:13:void apply(int,com.example.Style[]) -> a
    boolean isEmpty() -> b
";
		let mappings = read(input.as_bytes(), ["named", "official"]).unwrap();
		mappings.namespaces.check_that(["named", "official"]).unwrap();

		let class = mappings.get_class(&"com/example/Style".into()).unwrap();
		let official = mappings.namespace("official").unwrap();
		assert_eq!(class.names.resolve(official).unwrap().as_str(), "dqe");

		assert!(class.get_field("weight", "I").is_some());
		assert!(class.get_field("EMPTY", "Lcom/example/Style;").is_some());
		assert!(class.get_method("apply", "(I[Lcom/example/Style;)V").is_some());
		assert!(class.get_method("isEmpty", "()Z").is_some());
	}

	#[test]
	fn inverts_to_official_keys() {
		let input = "com.example.Style -> dqe:\n    int weight -> a\n";
		let mappings = read(input.as_bytes(), ["named", "official"]).unwrap();

		let official = mappings.namespace("official").unwrap();
		let inverted = mappings.invert(official).unwrap();

		let class = inverted.get_class(&"dqe".into()).unwrap();
		assert!(class.get_field("a", "I").is_some());
	}
}
