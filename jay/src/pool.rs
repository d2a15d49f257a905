//! The constant pool.
//!
//! Entry indices are stable: [`Pool`] appends new entries at the end and
//! never renumbers or removes existing ones. Raw attribute payloads that
//! refer to the pool by index therefore stay valid across edits.

use std::collections::HashMap;
use anyhow::{anyhow, bail, Context, Result};
use crate::{ClassRead, ClassWrite};

pub const H_GETFIELD: u8 = 1;
pub const H_GETSTATIC: u8 = 2;
pub const H_PUTFIELD: u8 = 3;
pub const H_PUTSTATIC: u8 = 4;
pub const H_INVOKEVIRTUAL: u8 = 5;
pub const H_INVOKESTATIC: u8 = 6;
pub const H_INVOKESPECIAL: u8 = 7;
pub const H_NEWINVOKESPECIAL: u8 = 8;
pub const H_INVOKEINTERFACE: u8 = 9;

/// What depends (has an index to) on what:
/// ```txt
/// Long  Double  Utf8  Integer  Float
///      __________/\_______________
///     /      /     \    \         \
/// String  Class  NameAndType  MethodType
///           |      |      \
///           FieldRef     Dynamic
///           MethodRef    InvokeDynamic
///       InterfaceMethodRef
///              |
///         MethodHandle
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
	/// Index 0, and the slot following a `Long` or `Double`.
	Unusable,
	/// Kept as raw bytes: string constants may be modified UTF-8 that is not
	/// valid UTF-8. Names and descriptors are always plain UTF-8.
	Utf8(Vec<u8>),
	Integer(u32),
	Float(u32),
	Long { high: u32, low: u32 },
	Double { high: u32, low: u32 },
	Class { name: u16 },
	String { utf8: u16 },
	FieldRef { class: u16, name_and_type: u16 },
	MethodRef { class: u16, name_and_type: u16 },
	InterfaceMethodRef { class: u16, name_and_type: u16 },
	NameAndType { name: u16, descriptor: u16 },
	MethodHandle { kind: u8, reference: u16 },
	MethodType { descriptor: u16 },
	Dynamic { bootstrap_method: u16, name_and_type: u16 },
	InvokeDynamic { bootstrap_method: u16, name_and_type: u16 },
	Module { name: u16 },
	Package { name: u16 },
}

impl PoolEntry {
	fn parse(reader: &mut &[u8]) -> Result<PoolEntry> {
		Ok(match reader.u8()? {
			1 => {
				let length = reader.u16_usize()?;
				PoolEntry::Utf8(reader.take(length)?.to_vec())
			},
			3 => PoolEntry::Integer(reader.u32()?),
			4 => PoolEntry::Float(reader.u32()?),
			5 => PoolEntry::Long { high: reader.u32()?, low: reader.u32()? },
			6 => PoolEntry::Double { high: reader.u32()?, low: reader.u32()? },
			7 => PoolEntry::Class { name: reader.u16()? },
			8 => PoolEntry::String { utf8: reader.u16()? },
			9 => PoolEntry::FieldRef { class: reader.u16()?, name_and_type: reader.u16()? },
			10 => PoolEntry::MethodRef { class: reader.u16()?, name_and_type: reader.u16()? },
			11 => PoolEntry::InterfaceMethodRef { class: reader.u16()?, name_and_type: reader.u16()? },
			12 => PoolEntry::NameAndType { name: reader.u16()?, descriptor: reader.u16()? },
			15 => PoolEntry::MethodHandle { kind: reader.u8()?, reference: reader.u16()? },
			16 => PoolEntry::MethodType { descriptor: reader.u16()? },
			17 => PoolEntry::Dynamic { bootstrap_method: reader.u16()?, name_and_type: reader.u16()? },
			18 => PoolEntry::InvokeDynamic { bootstrap_method: reader.u16()?, name_and_type: reader.u16()? },
			19 => PoolEntry::Module { name: reader.u16()? },
			20 => PoolEntry::Package { name: reader.u16()? },
			tag => bail!("unknown constant pool tag {tag}"),
		})
	}

	fn write(&self, w: &mut Vec<u8>) -> Result<()> {
		match self {
			PoolEntry::Unusable => {},
			PoolEntry::Utf8(bytes) => {
				w.put_u8(1);
				w.put_u16(u16::try_from(bytes.len()).context("utf8 constant too long")?);
				w.put(bytes);
			},
			PoolEntry::Integer(x) => { w.put_u8(3); w.put_u32(*x); },
			PoolEntry::Float(x) => { w.put_u8(4); w.put_u32(*x); },
			PoolEntry::Long { high, low } => { w.put_u8(5); w.put_u32(*high); w.put_u32(*low); },
			PoolEntry::Double { high, low } => { w.put_u8(6); w.put_u32(*high); w.put_u32(*low); },
			PoolEntry::Class { name } => { w.put_u8(7); w.put_u16(*name); },
			PoolEntry::String { utf8 } => { w.put_u8(8); w.put_u16(*utf8); },
			PoolEntry::FieldRef { class, name_and_type } => { w.put_u8(9); w.put_u16(*class); w.put_u16(*name_and_type); },
			PoolEntry::MethodRef { class, name_and_type } => { w.put_u8(10); w.put_u16(*class); w.put_u16(*name_and_type); },
			PoolEntry::InterfaceMethodRef { class, name_and_type } => { w.put_u8(11); w.put_u16(*class); w.put_u16(*name_and_type); },
			PoolEntry::NameAndType { name, descriptor } => { w.put_u8(12); w.put_u16(*name); w.put_u16(*descriptor); },
			PoolEntry::MethodHandle { kind, reference } => { w.put_u8(15); w.put_u8(*kind); w.put_u16(*reference); },
			PoolEntry::MethodType { descriptor } => { w.put_u8(16); w.put_u16(*descriptor); },
			PoolEntry::Dynamic { bootstrap_method, name_and_type } => { w.put_u8(17); w.put_u16(*bootstrap_method); w.put_u16(*name_and_type); },
			PoolEntry::InvokeDynamic { bootstrap_method, name_and_type } => { w.put_u8(18); w.put_u16(*bootstrap_method); w.put_u16(*name_and_type); },
			PoolEntry::Module { name } => { w.put_u8(19); w.put_u16(*name); },
			PoolEntry::Package { name } => { w.put_u8(20); w.put_u16(*name); },
		}
		Ok(())
	}
}

#[derive(Debug, Clone)]
pub struct Pool {
	entries: Vec<PoolEntry>,
	/// First index for each utf8 value, for find-or-append.
	utf8_lookup: HashMap<Vec<u8>, u16>,
	name_and_type_lookup: HashMap<(u16, u16), u16>,
}

impl Default for Pool {
	fn default() -> Pool {
		Pool::new()
	}
}

impl Pool {
	pub fn new() -> Pool {
		Pool {
			entries: vec![PoolEntry::Unusable], // indexing is from 1
			utf8_lookup: HashMap::new(),
			name_and_type_lookup: HashMap::new(),
		}
	}

	pub(crate) fn parse(reader: &mut &[u8]) -> Result<Pool> {
		let count = reader.u16_usize()?;

		let mut pool = Pool {
			entries: Vec::with_capacity(count),
			utf8_lookup: HashMap::new(),
			name_and_type_lookup: HashMap::new(),
		};
		pool.entries.push(PoolEntry::Unusable); // indexing is from 1

		while pool.entries.len() < count {
			let index = pool.entries.len() as u16;
			let entry = PoolEntry::parse(reader)
				.with_context(|| anyhow!("failed to parse constant pool entry {index}"))?;

			let two_slots = matches!(entry, PoolEntry::Long { .. } | PoolEntry::Double { .. });

			match &entry {
				PoolEntry::Utf8(bytes) => {
					pool.utf8_lookup.entry(bytes.clone()).or_insert(index);
				},
				PoolEntry::NameAndType { name, descriptor } => {
					pool.name_and_type_lookup.entry((*name, *descriptor)).or_insert(index);
				},
				_ => {},
			}

			pool.entries.push(entry);
			if two_slots {
				pool.entries.push(PoolEntry::Unusable);
			}
		}

		Ok(pool)
	}

	pub(crate) fn write(&self, w: &mut Vec<u8>) -> Result<()> {
		w.put_u16(u16::try_from(self.entries.len()).context("constant pool too large")?);
		for entry in &self.entries[1..] {
			entry.write(w)?;
		}
		Ok(())
	}

	pub fn entry(&self, index: u16) -> Result<&PoolEntry> {
		self.entries.get(index as usize)
			.ok_or_else(|| anyhow!("constant pool index {index} out of bounds for pool size {}", self.entries.len()))
	}

	pub fn entry_mut(&mut self, index: u16) -> Result<&mut PoolEntry> {
		let size = self.entries.len();
		self.entries.get_mut(index as usize)
			.ok_or_else(|| anyhow!("constant pool index {index} out of bounds for pool size {size}"))
	}

	pub fn indices(&self) -> impl Iterator<Item=u16> + 'static {
		1..self.entries.len() as u16
	}

	pub fn utf8(&self, index: u16) -> Result<&str> {
		let PoolEntry::Utf8(bytes) = self.entry(index)? else {
			bail!("constant pool entry {index} isn't Utf8: {:?}", self.entry(index)?);
		};
		std::str::from_utf8(bytes)
			.with_context(|| anyhow!("constant pool entry {index} isn't valid utf8"))
	}

	pub fn class_name(&self, index: u16) -> Result<&str> {
		let PoolEntry::Class { name } = *self.entry(index)? else {
			bail!("constant pool entry {index} isn't Class: {:?}", self.entry(index)?);
		};
		self.utf8(name)
	}

	/// Index 0 means "no class": the super class of `java/lang/Object`.
	pub fn opt_class_name(&self, index: u16) -> Result<Option<&str>> {
		if index == 0 {
			Ok(None)
		} else {
			self.class_name(index).map(Some)
		}
	}

	pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
		let PoolEntry::NameAndType { name, descriptor } = *self.entry(index)? else {
			bail!("constant pool entry {index} isn't NameAndType: {:?}", self.entry(index)?);
		};
		Ok((self.utf8(name)?, self.utf8(descriptor)?))
	}

	/// Resolves a `FieldRef`, `MethodRef` or `InterfaceMethodRef` into
	/// `(owner, name, descriptor)`.
	pub fn member_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
		let (class, name_and_type) = match *self.entry(index)? {
			PoolEntry::FieldRef { class, name_and_type } |
			PoolEntry::MethodRef { class, name_and_type } |
			PoolEntry::InterfaceMethodRef { class, name_and_type } => (class, name_and_type),
			ref other => bail!("constant pool entry {index} isn't a member reference: {other:?}"),
		};
		let (name, descriptor) = self.name_and_type(name_and_type)?;
		Ok((self.class_name(class)?, name, descriptor))
	}

	fn push(&mut self, entry: PoolEntry) -> Result<u16> {
		let index = u16::try_from(self.entries.len())
			.context("cannot append constant pool entry: pool is full")?;
		self.entries.push(entry);
		Ok(index)
	}

	/// Finds or appends an utf8 entry.
	pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
		if let Some(&index) = self.utf8_lookup.get(value.as_bytes()) {
			return Ok(index);
		}
		let index = self.push(PoolEntry::Utf8(value.as_bytes().to_vec()))?;
		self.utf8_lookup.insert(value.as_bytes().to_vec(), index);
		Ok(index)
	}

	/// Finds or appends a name-and-type entry over [`add_utf8`][Self::add_utf8]ed halves.
	pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
		let name = self.add_utf8(name)?;
		let descriptor = self.add_utf8(descriptor)?;

		if let Some(&index) = self.name_and_type_lookup.get(&(name, descriptor)) {
			return Ok(index);
		}
		let index = self.push(PoolEntry::NameAndType { name, descriptor })?;
		self.name_and_type_lookup.insert((name, descriptor), index);
		Ok(index)
	}

	/// Finds or appends a class entry.
	pub fn add_class_entry(&mut self, class_name: &str) -> Result<u16> {
		let name = self.add_utf8(class_name)?;
		self.find_or_push(PoolEntry::Class { name })
	}

	pub fn add_string(&mut self, value: &str) -> Result<u16> {
		let utf8 = self.add_utf8(value)?;
		self.find_or_push(PoolEntry::String { utf8 })
	}

	pub fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
		let class = self.add_class_entry(owner)?;
		let name_and_type = self.add_name_and_type(name, descriptor)?;
		self.find_or_push(PoolEntry::FieldRef { class, name_and_type })
	}

	pub fn add_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
		let class = self.add_class_entry(owner)?;
		let name_and_type = self.add_name_and_type(name, descriptor)?;
		self.find_or_push(PoolEntry::MethodRef { class, name_and_type })
	}

	pub fn add_method_handle(&mut self, kind: u8, reference: u16) -> Result<u16> {
		self.find_or_push(PoolEntry::MethodHandle { kind, reference })
	}

	fn find_or_push(&mut self, entry: PoolEntry) -> Result<u16> {
		for index in self.indices() {
			if self.entry(index)? == &entry {
				return Ok(index);
			}
		}
		self.push(entry)
	}
}
