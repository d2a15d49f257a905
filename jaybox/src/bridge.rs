//! Restores the `BRIDGE` flag some obfuscators strip.
//!
//! A compiler-made bridge forwards to a specialization of itself on the same
//! type hierarchy. A synthetic method whose method invocations all look like
//! that forwarding call is marked as a probable bridge; decompilers produce
//! clearer output when the flag is back.

use anyhow::{anyhow, Context, Result};
use log::debug;
use jay::access::ACC_BRIDGE;
use jay::attribute;
use jay::class_file::ClassFile;
use jay::insn::InsnIter;
use jay::name::MethodDescriptor;
use jay::pool::PoolEntry;
use crate::storage::{class_entry_name, ParsedJar};

/// Runs the detector over every class of a remapped jar; returns how many
/// methods got their flag restored.
pub fn restore_bridge_flags(jar: &mut ParsedJar) -> Result<usize> {
	let mut restored = 0;

	for (name, entry) in &mut jar.entries {
		if class_entry_name(name).is_none() {
			continue;
		}

		let count = restore_in_class(&mut entry.data)
			.with_context(|| anyhow!("failed to detect bridge methods in {name:?}"))?;
		restored += count;
	}

	Ok(restored)
}

fn restore_in_class(data: &mut Vec<u8>) -> Result<usize> {
	let mut class = ClassFile::parse(data)?;

	let this_name = class.name()?.to_owned();
	let super_name = class.super_class_name()?.map(str::to_owned);
	let interfaces: Vec<String> = class.interface_names()?
		.into_iter()
		.map(str::to_owned)
		.collect();

	let mut marked = Vec::new();
	for (i, method) in class.methods.iter().enumerate() {
		if !method.access.is_synthetic() || method.access.is_bridge() {
			continue;
		}

		let name = method.name(&class.pool)?;
		let arity = MethodDescriptor::from(method.descriptor(&class.pool)?).parameter_count();

		let Some(code_at) = method.find_attribute(&class.pool, attribute::CODE)? else {
			continue;
		};
		let code = attribute::Code::parse(&method.attributes[code_at].info)?;

		let mut invocations = 0;
		let mut all_forwarding = true;
		for insn in InsnIter::new(&code.code) {
			let insn = insn?;
			if !insn.is_method_invocation() {
				continue;
			}
			invocations += 1;

			let index = insn.pool_index()?;
			// the specialization is never an interface method
			if matches!(class.pool.entry(index)?, PoolEntry::InterfaceMethodRef { .. }) {
				all_forwarding = false;
				break;
			}

			let (owner, target_name, target_desc) = class.pool.member_ref(index)?;
			let on_own_hierarchy = owner == this_name
				|| super_name.as_deref() == Some(owner)
				|| interfaces.iter().any(|x| x == owner);

			if !on_own_hierarchy
				|| target_name != name
				|| MethodDescriptor::from(target_desc).parameter_count() != arity
			{
				all_forwarding = false;
				break;
			}
		}

		if invocations > 0 && all_forwarding {
			debug!("restoring bridge flag on {this_name}.{name}");
			marked.push(i);
		}
	}

	if marked.is_empty() {
		return Ok(0);
	}

	for &i in &marked {
		class.methods[i].access.set(ACC_BRIDGE);
	}
	*data = class.write()?;

	Ok(marked.len())
}

#[cfg(test)]
mod testing {
	// covered end-to-end by the remap integration tests, which build a
	// synthetic `Object get()` bridging to `String get()`
}
