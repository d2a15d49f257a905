//! Local variable renaming for the final remap pass.
//!
//! Obfuscated jars keep their local variable tables but lose the names, or
//! carry generated `lvt<n>` placeholders. This pass overwrites parameter
//! slots from the mapping tree where it has names, and synthesizes readable,
//! non-colliding identifiers from the type descriptors everywhere else.
//!
//! The mapping tree passed in must be inverted so that its default namespace
//! matches the names the classes already carry.

use std::collections::HashMap;
use anyhow::{anyhow, Context, Result};
use indexmap::IndexSet;
use log::warn;
use jay::attribute;
use jay::attribute::LocalVariable;
use jay::class_file::{ClassFile, MemberInfo};
use jay::name::{ClassName, MethodName};
use jay::pool::Pool;
use plume::tree::mappings::Mappings;
use plume::tree::names::Namespace;
use crate::hierarchy::HierarchyIndex;
use crate::storage::{class_entry_name, ParsedJar};

/// Reserved words that can never be identifiers in Java sources.
const KEYWORDS: &[&str] = &[
	"abstract", "assert", "boolean", "break", "byte", "case", "catch", "char",
	"class", "const", "continue", "default", "do", "double", "else", "enum",
	"extends", "false", "final", "finally", "float", "for", "goto", "if",
	"implements", "import", "instanceof", "int", "interface", "long", "native",
	"new", "null", "package", "private", "protected", "public", "return",
	"short", "static", "strictfp", "super", "switch", "synchronized", "this",
	"throw", "throws", "transient", "true", "try", "void", "volatile", "while",
];

fn is_keyword(name: &str) -> bool {
	KEYWORDS.contains(&name)
}

/// Renames local variables across all classes of a remapped jar.
pub fn rename_locals<const N: usize>(jar: &mut ParsedJar, mappings: &Mappings<N>, hierarchy: &HierarchyIndex) -> Result<()> {
	for (name, entry) in &mut jar.entries {
		if class_entry_name(name).is_none() {
			continue;
		}

		rename_in_class(&mut entry.data, mappings, hierarchy)
			.with_context(|| anyhow!("failed to rename local variables in {name:?}"))?;
	}
	Ok(())
}

fn rename_in_class<const N: usize>(data: &mut Vec<u8>, mappings: &Mappings<N>, hierarchy: &HierarchyIndex) -> Result<()> {
	let mut class = ClassFile::parse(data)?;
	let this_name = ClassName::from(class.name()?);

	let mut changed = false;
	let pool = &mut class.pool;
	for method in &mut class.methods {
		changed |= rename_in_method(pool, method, &this_name, mappings, hierarchy)?;
	}

	if changed {
		*data = class.write()?;
	}
	Ok(())
}

fn rename_in_method<const N: usize>(
	pool: &mut Pool,
	method: &mut MemberInfo,
	owner: &ClassName,
	mappings: &Mappings<N>,
	hierarchy: &HierarchyIndex,
) -> Result<bool> {
	let Some(code_at) = method.find_attribute(pool, attribute::CODE)? else {
		return Ok(false); // abstract and native methods have no locals
	};
	let mut code = attribute::Code::parse(&method.attributes[code_at].info)?;

	let Some(table_at) = jay::class_file::find_attribute(&code.attributes, pool, attribute::LOCAL_VARIABLE_TABLE)? else {
		return Ok(false);
	};
	let mut table = attribute::parse_local_variable_table(&code.attributes[table_at].info)?;

	let method_name = pool.utf8(method.name_index)?.to_owned();
	let method_desc = pool.utf8(method.descriptor_index)?.to_owned();
	let is_static = method.access.is_static();

	let parameter_names = parameter_mapping_names(mappings, hierarchy, owner, &method_name, &method_desc);

	let mut taken: IndexSet<String> = IndexSet::new();
	let mut needs_name: Vec<usize> = Vec::new();
	let mut changed = false;

	for (i, variable) in table.iter_mut().enumerate() {
		if !is_static && variable.index == 0 {
			continue; // `this`
		}

		let current = pool.utf8(variable.name_index)?.to_owned();

		if let Some(mapped) = parameter_names.get(&(variable.index as usize)) {
			// a name from the mappings always wins
			if current != *mapped {
				variable.name_index = pool.add_utf8(mapped)?;
				changed = true;
			}
			taken.insert(mapped.clone());
		} else if current.is_empty() || is_generated_name(&current) {
			needs_name.push(i);
		} else {
			taken.insert(current);
		}
	}

	let mut counters: HashMap<String, usize> = HashMap::new();
	for i in needs_name {
		let desc = pool.utf8(table[i].descriptor_index)?.to_owned();

		match synthesize_name(&desc, hierarchy, &mut taken, &mut counters) {
			Some(name) => {
				table[i].name_index = pool.add_utf8(&name)?;
				changed = true;
			},
			None => {
				// never fail the job over a name; the original stays
				warn!("could not synthesize a name for a local of type {desc:?} in {owner}.{method_name}");
			},
		}
	}

	if !changed {
		return Ok(false);
	}

	code.attributes[table_at].info = attribute::write_local_variable_table(&table)?;
	sync_type_table(pool, &mut code, &table)?;
	method.attributes[code_at].info = code.write()?;

	Ok(true)
}

/// The `LocalVariableTypeTable` must agree with the renamed
/// `LocalVariableTable` entry for the same variable.
fn sync_type_table(pool: &mut Pool, code: &mut attribute::Code, table: &[LocalVariable]) -> Result<()> {
	let Some(at) = jay::class_file::find_attribute(&code.attributes, pool, attribute::LOCAL_VARIABLE_TYPE_TABLE)? else {
		return Ok(());
	};

	let names: HashMap<(u16, u16, u16), u16> = table.iter()
		.map(|x| ((x.index, x.start_pc, x.length), x.name_index))
		.collect();

	let mut type_table = attribute::parse_local_variable_table(&code.attributes[at].info)?;
	for variable in &mut type_table {
		if let Some(&name_index) = names.get(&(variable.index, variable.start_pc, variable.length)) {
			variable.name_index = name_index;
		}
	}
	code.attributes[at].info = attribute::write_local_variable_table(&type_table)?;

	Ok(())
}

/// Parameter names from the mappings, keyed by slot. A slot not named on the
/// method itself may be named on a super-declaration of the same method,
/// found by the same hierarchy walk the remapper resolves members with;
/// constructors never inherit.
fn parameter_mapping_names<const N: usize>(
	mappings: &Mappings<N>,
	hierarchy: &HierarchyIndex,
	owner: &ClassName,
	method_name: &str,
	method_desc: &str,
) -> HashMap<usize, String> {
	let mut out = HashMap::new();

	let mut chain = vec![owner];
	if method_name != MethodName::INIT {
		chain.extend(hierarchy.ancestors(owner));
	}

	for class_name in chain {
		let Some(class) = mappings.get_class(class_name) else { continue };
		let Some(method) = class.get_method(method_name, method_desc) else { continue };

		for (slot, parameter) in &method.parameters {
			if out.contains_key(slot) {
				continue; // nearest declaration wins
			}
			if let Ok(name) = parameter.names.resolve(Namespace::DEFAULT) {
				out.insert(*slot, name.as_str().to_owned());
			}
		}
	}

	out
}

/// `lvt<n>` placeholders left behind by earlier tooling.
fn is_generated_name(name: &str) -> bool {
	name.strip_prefix("lvt")
		.is_some_and(|x| !x.is_empty() && x.bytes().all(|b| b.is_ascii_digit()))
}

/// How synthesized names avoid collisions.
enum Uniquing {
	/// Advance through `a..z, aa, ab, …` starting at the base.
	Letters,
	/// Emit `base`, `base2`, `base3`, … with a per-base counter.
	Counter,
}

fn synthesize_name(desc: &str, hierarchy: &HierarchyIndex, taken: &mut IndexSet<String>, counters: &mut HashMap<String, usize>) -> Option<String> {
	let (base, uniquing) = base_name(desc, hierarchy)?;

	let name = match uniquing {
		Uniquing::Letters => next_letter_name(&base, taken),
		Uniquing::Counter => next_counted_name(base, taken, counters),
	};

	taken.insert(name.clone());
	Some(name)
}

fn base_name(desc: &str, hierarchy: &HierarchyIndex) -> Option<(String, Uniquing)> {
	match desc.as_bytes().first()? {
		b'B' => Some(("b".to_owned(), Uniquing::Letters)),
		b'C' => Some(("c".to_owned(), Uniquing::Letters)),
		b'D' => Some(("d".to_owned(), Uniquing::Letters)),
		b'F' => Some(("f".to_owned(), Uniquing::Letters)),
		b'I' => Some(("i".to_owned(), Uniquing::Letters)),
		b'J' => Some(("l".to_owned(), Uniquing::Letters)),
		b'S' => Some(("s".to_owned(), Uniquing::Letters)),
		b'Z' => Some(("bl".to_owned(), Uniquing::Counter)),
		b'L' => {
			let class = ClassName::from(desc.strip_prefix('L')?.strip_suffix(';')?);
			class_base(&class, hierarchy).map(|x| (x, Uniquing::Counter))
		},
		b'[' => {
			let (base, uniquing) = base_name(&desc[1..], hierarchy)?;
			let plural = format!("{base}s");
			if is_keyword(&plural) {
				Some((base, uniquing))
			} else {
				Some((plural, uniquing))
			}
		},
		other => {
			warn!("unknown descriptor leading byte {:?} in {desc:?}", char::from(*other));
			None
		},
	}
}

/// A name from the innermost class name segment; anonymous classes (purely
/// numeric segments) fall back to their supertypes.
fn class_base(class: &ClassName, hierarchy: &HierarchyIndex) -> Option<String> {
	if let Some(base) = segment_base(class) {
		return Some(base);
	}

	for ancestor in hierarchy.ancestors(class) {
		if ancestor.as_str() == ClassName::JAVA_LANG_OBJECT {
			continue;
		}
		if let Some(base) = segment_base(ancestor) {
			return Some(base);
		}
	}

	warn!("no usable name segment on {class} or its supertypes");
	None
}

fn segment_base(class: &ClassName) -> Option<String> {
	let segment = class.innermost_name();

	let base = lowercase_first(segment);
	if is_valid_identifier(&base) {
		return Some(base);
	}

	// anonymous inner classes leave segments like `1`; named ones can still
	// start with digits after obfuscation
	let stripped = segment.trim_start_matches(|x: char| x.is_ascii_digit());
	if !stripped.is_empty() {
		let base = lowercase_first(stripped);
		if is_valid_identifier(&base) {
			return Some(base);
		}
	}

	None
}

fn lowercase_first(segment: &str) -> String {
	let mut out = String::with_capacity(segment.len());
	let mut chars = segment.chars();
	out.extend(chars.next().map(|x| x.to_ascii_lowercase()));
	out.extend(chars);
	out
}

fn is_valid_identifier(name: &str) -> bool {
	let mut chars = name.chars();
	let Some(first) = chars.next() else {
		return false;
	};
	(first.is_alphabetic() || first == '_' || first == '$')
		&& chars.all(|x| x.is_alphanumeric() || x == '_' || x == '$')
}

/// `a..z, aa, ab, …` as a bijective base-26 numbering.
fn index_to_letters(index: usize) -> String {
	let mut n = index + 1;
	let mut out = Vec::new();
	while n > 0 {
		n -= 1;
		out.push(b'a' + (n % 26) as u8);
		n /= 26;
	}
	out.reverse();
	String::from_utf8(out).unwrap_or_default()
}

fn letters_to_index(name: &str) -> Option<usize> {
	let mut acc: usize = 0;
	for b in name.bytes() {
		if !b.is_ascii_lowercase() {
			return None;
		}
		acc = acc * 26 + (b - b'a' + 1) as usize;
	}
	acc.checked_sub(1)
}

fn next_letter_name(base: &str, taken: &IndexSet<String>) -> String {
	let mut index = letters_to_index(base).unwrap_or(0);
	loop {
		let candidate = index_to_letters(index);
		if !taken.contains(&candidate) && !is_keyword(&candidate) {
			return candidate;
		}
		index += 1;
	}
}

fn next_counted_name(base: String, taken: &IndexSet<String>, counters: &mut HashMap<String, usize>) -> String {
	let base = if is_keyword(&base) { format!("{base}_") } else { base };

	let counter = counters.entry(base.clone()).or_insert(1);
	loop {
		let candidate = if *counter == 1 { base.clone() } else { format!("{base}{counter}") };
		*counter += 1;
		if !taken.contains(&candidate) {
			return candidate;
		}
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use super::*;

	fn synth(desc: &str, taken: &mut IndexSet<String>, counters: &mut HashMap<String, usize>) -> String {
		synthesize_name(desc, &HierarchyIndex::default(), taken, counters).unwrap()
	}

	#[test]
	fn scalar_letters_advance() {
		let mut taken = IndexSet::new();
		let mut counters = HashMap::new();

		assert_eq!(synth("I", &mut taken, &mut counters), "i");
		assert_eq!(synth("I", &mut taken, &mut counters), "j");
		assert_eq!(synth("J", &mut taken, &mut counters), "l");
		// `long` took l, the next int continues past the taken letters
		assert_eq!(synth("I", &mut taken, &mut counters), "k");
	}

	#[test]
	fn letters_skip_taken_and_wrap() {
		let mut taken: IndexSet<String> = IndexSet::new();
		for b in b'a'..b'z' {
			taken.insert(String::from(char::from(b)));
		}
		let mut counters = HashMap::new();

		assert_eq!(synth("I", &mut taken, &mut counters), "z");
		assert_eq!(synth("I", &mut taken, &mut counters), "aa");
		assert_eq!(synth("I", &mut taken, &mut counters), "ab");
	}

	#[test]
	fn reference_types_use_class_segments() {
		let mut taken = IndexSet::new();
		let mut counters = HashMap::new();

		assert_eq!(synth("Ljava/lang/String;", &mut taken, &mut counters), "string");
		assert_eq!(synth("Ljava/lang/String;", &mut taken, &mut counters), "string2");
		assert_eq!(synth("Lnet/example/Block$Shape;", &mut taken, &mut counters), "shape");
	}

	#[test]
	fn keyword_bases_get_an_underscore() {
		let mut taken = IndexSet::new();
		let mut counters = HashMap::new();

		assert_eq!(synth("Lpkg/Class;", &mut taken, &mut counters), "class_");
		assert_eq!(synth("Z", &mut taken, &mut counters), "bl");
		assert_eq!(synth("Z", &mut taken, &mut counters), "bl2");
	}

	#[test]
	fn arrays_pluralize() {
		let mut taken = IndexSet::new();
		let mut counters = HashMap::new();

		assert_eq!(synth("[I", &mut taken, &mut counters), "is");
		assert_eq!(synth("[Ljava/lang/String;", &mut taken, &mut counters), "strings");
	}

	#[test]
	fn digit_segments_strip_or_fail_over() {
		assert_eq!(segment_base(&"pkg/Style$1".into()), None);
		assert_eq!(segment_base(&"pkg/4Gons".into()).as_deref(), Some("gons"));
	}

	#[test]
	fn generated_names() {
		assert!(is_generated_name("lvt1"));
		assert!(is_generated_name("lvt42"));
		assert!(!is_generated_name("lvt"));
		assert!(!is_generated_name("lvtx"));
		assert!(!is_generated_name("value"));
	}
}
