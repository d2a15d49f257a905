//! Whole-jar bytecode remapping.
//!
//! Classes are rewritten through their constant pool: every `Class`, member
//! reference, `MethodType` and `(Invoke)Dynamic` entry gets its strings
//! remapped, with changed strings landing in appended pool entries. Existing
//! entries keep their indices, so instruction operands and attributes that
//! point into the pool stay valid without being decoded at all. Only the
//! name-bearing attributes (`Record`, `InnerClasses`, local variable tables,
//! `SourceFile`) are rewritten structurally.

use anyhow::{anyhow, bail, Context, Result};
use jay::attribute;
use jay::class_file::{AttributeInfo, ClassFile, MemberInfo};
use jay::name::ClassName;
use jay::pool::{Pool, PoolEntry};
use plume::remapper::MemberMapper;
use plume::tree::chained::ChainedMappings;
use plume::tree::mappings::Mappings;
use plume::tree::names::Namespace;
use crate::hierarchy::HierarchyIndex;
use crate::storage::{class_entry_name, Jar, OpenedJar, ParsedJar};
use crate::{bridge, locals};

/// Polled between classes by the long-running passes; returning `true`
/// aborts the work with an error.
pub type StopCheck<'a> = &'a (dyn Fn() -> bool + Send + Sync);

fn never() -> bool {
	false
}

/// Remaps every class of `jar`; resources travel through unchanged.
pub fn remap_jar(jar: &impl Jar, remapper: &impl MemberMapper) -> Result<ParsedJar> {
	remap_jar_stoppable(jar, remapper, &never)
}

pub fn remap_jar_stoppable(jar: &impl Jar, remapper: &impl MemberMapper, stop: StopCheck<'_>) -> Result<ParsedJar> {
	let mut opened = jar.open()?;

	let mut out = ParsedJar::default();
	for name in opened.entry_names()? {
		if stop() {
			bail!("remap cancelled");
		}

		let (attr, data) = opened.read_entry(&name)?;

		match class_entry_name(&name) {
			Some(class_name) => {
				let data = remap_class(remapper, &data)
					.with_context(|| anyhow!("failed to remap class {class_name:?}"))?;

				// keep the leading-slash convention of the input entry
				let prefix = if name.starts_with('/') { "/" } else { "" };
				let new_name = remapper.map_class(&class_name);
				out.put(format!("{prefix}{new_name}.class"), attr, data);
			},
			None => out.put(name, attr, data),
		}
	}

	Ok(out)
}

/// Remaps a single class file.
pub fn remap_class(remapper: &impl MemberMapper, data: &[u8]) -> Result<Vec<u8>> {
	let mut class = ClassFile::parse(data)?;

	// the owner name member resolution runs against: the not-yet-remapped one
	let this_name = ClassName::from(class.name()?);

	remap_pool(remapper, &mut class.pool)?;
	remap_members(remapper, &this_name, &mut class)?;
	remap_class_attributes(remapper, &this_name, &mut class)?;

	class.write()
}

enum PoolEdit {
	/// Point a `Class` entry at a new name.
	ClassName { entry: u16, name: String },
	/// Point a member reference or `(Invoke)Dynamic` entry at a new
	/// name-and-type.
	NameAndType { entry: u16, name: String, desc: String },
	/// Point a `MethodType` entry at a new descriptor.
	MethodType { entry: u16, desc: String },
}

fn remap_pool(remapper: &impl MemberMapper, pool: &mut Pool) -> Result<()> {
	let mut edits = Vec::new();

	for entry in pool.indices() {
		match *pool.entry(entry)? {
			PoolEntry::Class { name } => {
				let old = pool.utf8(name)?;
				let name = remapper.map_class_or_array(old)?;
				if name != old {
					edits.push(PoolEdit::ClassName { entry, name });
				}
			},
			PoolEntry::FieldRef { class, name_and_type } => {
				let owner = pool.class_name(class)?;
				let (old_name, old_desc) = pool.name_and_type(name_and_type)?;
				let (name, desc) = map_member(remapper, owner, old_name, old_desc, true)?;
				if name != old_name || desc != old_desc {
					edits.push(PoolEdit::NameAndType { entry, name, desc });
				}
			},
			PoolEntry::MethodRef { class, name_and_type } |
			PoolEntry::InterfaceMethodRef { class, name_and_type } => {
				let owner = pool.class_name(class)?;
				let (old_name, old_desc) = pool.name_and_type(name_and_type)?;
				let (name, desc) = map_member(remapper, owner, old_name, old_desc, false)?;
				if name != old_name || desc != old_desc {
					edits.push(PoolEdit::NameAndType { entry, name, desc });
				}
			},
			PoolEntry::MethodType { descriptor } => {
				let old = pool.utf8(descriptor)?;
				let desc = remapper.map_descriptor(old)?;
				if desc != old {
					edits.push(PoolEdit::MethodType { entry, desc });
				}
			},
			// the call site name belongs to the bootstrap handle's target
			// interface, which lives outside this jar; only the descriptor
			// is ours to rewrite
			PoolEntry::Dynamic { name_and_type, .. } |
			PoolEntry::InvokeDynamic { name_and_type, .. } => {
				let (name, old_desc) = pool.name_and_type(name_and_type)?;
				let desc = remapper.map_descriptor(old_desc)?;
				if desc != old_desc {
					edits.push(PoolEdit::NameAndType { entry, name: name.to_owned(), desc });
				}
			},
			_ => {},
		}
	}

	for edit in edits {
		match edit {
			PoolEdit::ClassName { entry, name } => {
				let utf8 = pool.add_utf8(&name)?;
				let PoolEntry::Class { name } = pool.entry_mut(entry)? else {
					bail!("pool entry {entry} changed kind during remapping");
				};
				*name = utf8;
			},
			PoolEdit::NameAndType { entry, name, desc } => {
				let index = pool.add_name_and_type(&name, &desc)?;
				match pool.entry_mut(entry)? {
					PoolEntry::FieldRef { name_and_type, .. } |
					PoolEntry::MethodRef { name_and_type, .. } |
					PoolEntry::InterfaceMethodRef { name_and_type, .. } |
					PoolEntry::Dynamic { name_and_type, .. } |
					PoolEntry::InvokeDynamic { name_and_type, .. } => *name_and_type = index,
					_ => bail!("pool entry {entry} changed kind during remapping"),
				}
			},
			PoolEdit::MethodType { entry, desc } => {
				let utf8 = pool.add_utf8(&desc)?;
				let PoolEntry::MethodType { descriptor } = pool.entry_mut(entry)? else {
					bail!("pool entry {entry} changed kind during remapping");
				};
				*descriptor = utf8;
			},
		}
	}

	Ok(())
}

/// References through array "classes" (like `[La;.clone()`) keep their member
/// name; everything else resolves through the hierarchy.
fn map_member(remapper: &impl MemberMapper, owner: &str, name: &str, desc: &str, field: bool) -> Result<(String, String)> {
	if owner.starts_with('[') {
		return Ok((name.to_owned(), remapper.map_descriptor(desc)?));
	}

	let owner = ClassName::from(owner);
	Ok(if field {
		let (name, desc) = remapper.map_field(&owner, name, desc)?;
		(name.into_inner(), desc.into_inner())
	} else {
		let (name, desc) = remapper.map_method(&owner, name, desc)?;
		(name.into_inner(), desc.into_inner())
	})
}

fn remap_members(remapper: &impl MemberMapper, this_name: &ClassName, class: &mut ClassFile) -> Result<()> {
	let pool = &mut class.pool;

	for field in &mut class.fields {
		let name = pool.utf8(field.name_index)?.to_owned();
		let desc = pool.utf8(field.descriptor_index)?.to_owned();

		let (new_name, new_desc) = remapper.map_field(this_name, &name, &desc)?;
		if new_name.as_str() != name {
			field.name_index = pool.add_utf8(new_name.as_str())?;
		}
		if new_desc.as_str() != desc {
			field.descriptor_index = pool.add_utf8(new_desc.as_str())?;
		}
	}

	for method in &mut class.methods {
		let name = pool.utf8(method.name_index)?.to_owned();
		let desc = pool.utf8(method.descriptor_index)?.to_owned();

		let (new_name, new_desc) = remapper.map_method(this_name, &name, &desc)?;
		if new_name.as_str() != name {
			method.name_index = pool.add_utf8(new_name.as_str())?;
		}
		if new_desc.as_str() != desc {
			method.descriptor_index = pool.add_utf8(new_desc.as_str())?;
		}

		remap_local_variable_types(remapper, pool, method)?;
	}

	Ok(())
}

/// Local variable descriptors live inside `Code`; their names are the
/// renamer's business, but the types have to follow the class names now.
fn remap_local_variable_types(remapper: &impl MemberMapper, pool: &mut Pool, method: &mut MemberInfo) -> Result<()> {
	let Some(code_at) = method.find_attribute(pool, attribute::CODE)? else {
		return Ok(());
	};

	let mut code = attribute::Code::parse(&method.attributes[code_at].info)
		.context("failed to parse Code attribute")?;

	let mut changed = false;
	for nested in &mut code.attributes {
		if pool.utf8(nested.name_index)? != attribute::LOCAL_VARIABLE_TABLE {
			continue;
		}

		let mut table = attribute::parse_local_variable_table(&nested.info)?;
		let mut table_changed = false;
		for variable in &mut table {
			let old = pool.utf8(variable.descriptor_index)?.to_owned();
			let desc = remapper.map_descriptor(&old)?;
			if desc != old {
				variable.descriptor_index = pool.add_utf8(&desc)?;
				table_changed = true;
			}
		}

		if table_changed {
			nested.info = attribute::write_local_variable_table(&table)?;
			changed = true;
		}
	}

	if changed {
		method.attributes[code_at].info = code.write()?;
	}

	Ok(())
}

fn remap_class_attributes(remapper: &impl MemberMapper, this_name: &ClassName, class: &mut ClassFile) -> Result<()> {
	let pool = &mut class.pool;

	for attr in &mut class.attributes {
		match pool.utf8(attr.name_index)? {
			attribute::RECORD => {
				let mut components = attribute::parse_record(&attr.info)?;
				let mut changed = false;
				for component in &mut components {
					let name = pool.utf8(component.name_index)?.to_owned();
					let desc = pool.utf8(component.descriptor_index)?.to_owned();

					// record components resolve exactly like fields
					let (new_name, new_desc) = remapper.map_field(this_name, &name, &desc)?;
					if new_name.as_str() != name {
						component.name_index = pool.add_utf8(new_name.as_str())?;
						changed = true;
					}
					if new_desc.as_str() != desc {
						component.descriptor_index = pool.add_utf8(new_desc.as_str())?;
						changed = true;
					}
				}
				if changed {
					attr.info = attribute::write_record(&components)?;
				}
			},
			attribute::INNER_CLASSES => {
				let mut entries = attribute::parse_inner_classes(&attr.info)?;
				let mut changed = false;
				for entry in &mut entries {
					if entry.inner_name == 0 {
						continue; // anonymous
					}
					// the Class entry was already remapped, derive the new
					// simple name from it
					let inner = ClassName::from(pool.class_name(entry.inner_class)?);
					let simple = inner.innermost_name().to_owned();
					if pool.utf8(entry.inner_name)? != simple {
						entry.inner_name = pool.add_utf8(&simple)?;
						changed = true;
					}
				}
				if changed {
					attr.info = attribute::write_inner_classes(&entries)?;
				}
			},
			_ => {},
		}
	}

	// a class that lost its SourceFile to obfuscation gets one back,
	// derived from its remapped simple name
	if class.find_attribute(attribute::SOURCE_FILE)?.is_none() {
		let source_file = ClassName::from(class.name()?).source_file_name();

		let utf8 = class.pool.add_utf8(&source_file)?;
		let name_index = class.pool.add_utf8(attribute::SOURCE_FILE)?;
		class.attributes.push(AttributeInfo {
			name_index,
			info: attribute::write_source_file(utf8),
		});
	}

	Ok(())
}

/// One remap pass plus the post passes: bridge flags restored, then local
/// variables renamed against the inverted tree, whose default names match
/// what the classes now carry.
pub fn remap_full(jar: &impl Jar, mappings: &Mappings<2>) -> Result<ParsedJar> {
	remap_full_stoppable(jar, mappings, &never)
}

pub fn remap_full_stoppable(jar: &impl Jar, mappings: &Mappings<2>, stop: StopCheck<'_>) -> Result<ParsedJar> {
	let from = Namespace::new(0)?;
	let to = Namespace::new(1)?;

	let hierarchy = HierarchyIndex::from_jar(jar)?;
	let remapper = mappings.remapper(from, to, &hierarchy)?;
	let mut out = remap_jar_stoppable(jar, &remapper, stop)?;
	drop(remapper);

	bridge::restore_bridge_flags(&mut out)?;

	let hierarchy = HierarchyIndex::from_jar(&out)?;
	let inverted = mappings.invert(to)
		.context("failed to invert the mappings for local variable renaming")?;
	locals::rename_locals(&mut out, &inverted, &hierarchy)?;

	Ok(out)
}

/// Applies the two stages of a [`ChainedMappings`] as two whole passes over
/// the jar, rebuilding the hierarchy from the currently-named classes
/// between them. Bridge flags are restored and local variables renamed after
/// the final pass only.
pub fn remap_chained(jar: &impl Jar, chained: &ChainedMappings) -> Result<ParsedJar> {
	remap_chained_stoppable(jar, chained, &never)
}

pub fn remap_chained_stoppable(jar: &impl Jar, chained: &ChainedMappings, stop: StopCheck<'_>) -> Result<ParsedJar> {
	let from = Namespace::new(0)?;
	let to = Namespace::new(1)?;

	let hierarchy = HierarchyIndex::from_jar(jar)?;
	let remapper = chained.intermediate().remapper(from, to, &hierarchy)?;
	let pass_one = remap_jar_stoppable(jar, &remapper, stop)
		.context("intermediate remap pass failed")?;
	drop(remapper);

	remap_full_stoppable(&pass_one, chained.named(), stop)
		.context("named remap pass failed")
}
