//! Parsing and writing of whole class files.

use anyhow::{anyhow, bail, Context, Result};
use crate::{ClassRead, ClassWrite};
use crate::access::AccessFlags;
use crate::name::ClassName;
use crate::pool::Pool;

const MAGIC: u32 = 0xCAFE_BABE;

/// An attribute with its payload kept raw.
///
/// The payload refers into the constant pool; those references stay valid
/// under pool edits, see [`Pool`].
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
	pub name_index: u16,
	pub info: Vec<u8>,
}

impl AttributeInfo {
	fn parse(reader: &mut &[u8]) -> Result<AttributeInfo> {
		let name_index = reader.u16()?;
		let length = reader.u32()? as usize;
		let info = reader.take(length)?.to_vec();
		Ok(AttributeInfo { name_index, info })
	}

	fn write(&self, w: &mut Vec<u8>) -> Result<()> {
		w.put_u16(self.name_index);
		w.put_u32(u32::try_from(self.info.len()).context("attribute too long")?);
		w.put(&self.info);
		Ok(())
	}

	pub(crate) fn parse_list(reader: &mut &[u8]) -> Result<Vec<AttributeInfo>> {
		let count = reader.u16_usize()?;
		reader.vec(count, AttributeInfo::parse)
	}

	pub(crate) fn write_list(attributes: &[AttributeInfo], w: &mut Vec<u8>) -> Result<()> {
		w.put_u16(u16::try_from(attributes.len()).context("too many attributes")?);
		for attribute in attributes {
			attribute.write(w)?;
		}
		Ok(())
	}
}

/// A field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
	pub access: AccessFlags,
	pub name_index: u16,
	pub descriptor_index: u16,
	pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
	fn parse(reader: &mut &[u8]) -> Result<MemberInfo> {
		Ok(MemberInfo {
			access: reader.u16()?.into(),
			name_index: reader.u16()?,
			descriptor_index: reader.u16()?,
			attributes: AttributeInfo::parse_list(reader)?,
		})
	}

	fn write(&self, w: &mut Vec<u8>) -> Result<()> {
		w.put_u16(self.access.0);
		w.put_u16(self.name_index);
		w.put_u16(self.descriptor_index);
		AttributeInfo::write_list(&self.attributes, w)
	}

	pub fn name<'a>(&self, pool: &'a Pool) -> Result<&'a str> {
		pool.utf8(self.name_index)
	}

	pub fn descriptor<'a>(&self, pool: &'a Pool) -> Result<&'a str> {
		pool.utf8(self.descriptor_index)
	}

	pub fn find_attribute(&self, pool: &Pool, name: &str) -> Result<Option<usize>> {
		find_attribute(&self.attributes, pool, name)
	}
}

pub fn find_attribute(attributes: &[AttributeInfo], pool: &Pool, name: &str) -> Result<Option<usize>> {
	for (i, attribute) in attributes.iter().enumerate() {
		if pool.utf8(attribute.name_index)? == name {
			return Ok(Some(i));
		}
	}
	Ok(None)
}

#[derive(Debug, Clone)]
pub struct ClassFile {
	pub minor_version: u16,
	pub major_version: u16,
	pub pool: Pool,
	pub access: AccessFlags,
	pub this_class: u16,
	pub super_class: u16,
	pub interfaces: Vec<u16>,
	pub fields: Vec<MemberInfo>,
	pub methods: Vec<MemberInfo>,
	pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
	pub fn parse(data: &[u8]) -> Result<ClassFile> {
		let reader = &mut { data };

		let magic = reader.u32()?;
		if magic != MAGIC {
			bail!("magic didn't match up: {magic:#x}");
		}

		let minor_version = reader.u16()?;
		let major_version = reader.u16()?;

		let pool = Pool::parse(reader).context("failed to parse constant pool")?;

		let access = reader.u16()?.into();
		let this_class = reader.u16()?;
		let super_class = reader.u16()?;

		let interface_count = reader.u16_usize()?;
		let interfaces = reader.vec(interface_count, |r| r.u16())?;

		let field_count = reader.u16_usize()?;
		let fields = reader.vec(field_count, MemberInfo::parse)
			.context("failed to parse fields")?;

		let method_count = reader.u16_usize()?;
		let methods = reader.vec(method_count, MemberInfo::parse)
			.context("failed to parse methods")?;

		let attributes = AttributeInfo::parse_list(reader)
			.context("failed to parse class attributes")?;

		if !reader.is_empty() {
			bail!("expected end of class file, got {} trailing bytes", reader.len());
		}

		Ok(ClassFile {
			minor_version, major_version, pool, access,
			this_class, super_class, interfaces,
			fields, methods, attributes,
		})
	}

	pub fn write(&self) -> Result<Vec<u8>> {
		let mut w = Vec::new();

		w.put_u32(MAGIC);
		w.put_u16(self.minor_version);
		w.put_u16(self.major_version);

		self.pool.write(&mut w)?;

		w.put_u16(self.access.0);
		w.put_u16(self.this_class);
		w.put_u16(self.super_class);

		w.put_u16(u16::try_from(self.interfaces.len()).context("too many interfaces")?);
		for interface in &self.interfaces {
			w.put_u16(*interface);
		}

		w.put_u16(u16::try_from(self.fields.len()).context("too many fields")?);
		for field in &self.fields {
			field.write(&mut w)?;
		}

		w.put_u16(u16::try_from(self.methods.len()).context("too many methods")?);
		for method in &self.methods {
			method.write(&mut w)?;
		}

		AttributeInfo::write_list(&self.attributes, &mut w)?;

		Ok(w)
	}

	pub fn name(&self) -> Result<&str> {
		self.pool.class_name(this_class_checked(self.this_class)?)
	}

	pub fn super_class_name(&self) -> Result<Option<&str>> {
		self.pool.opt_class_name(self.super_class)
	}

	pub fn interface_names(&self) -> Result<Vec<&str>> {
		self.interfaces.iter()
			.map(|&index| self.pool.class_name(index))
			.collect()
	}

	pub fn find_attribute(&self, name: &str) -> Result<Option<usize>> {
		find_attribute(&self.attributes, &self.pool, name)
	}
}

fn this_class_checked(index: u16) -> Result<u16> {
	if index == 0 {
		bail!("class file has no this_class entry");
	}
	Ok(index)
}

/// Only the name and supertypes of a class, parsed without touching the
/// fields, methods or attributes.
#[derive(Debug, Clone)]
pub struct ClassHeader {
	pub access: AccessFlags,
	pub name: ClassName,
	pub super_class: Option<ClassName>,
	pub interfaces: Vec<ClassName>,
}

impl ClassHeader {
	pub fn parse(data: &[u8]) -> Result<ClassHeader> {
		let reader = &mut { data };

		let magic = reader.u32()?;
		if magic != MAGIC {
			bail!("magic didn't match up: {magic:#x}");
		}

		let _minor_version = reader.u16()?;
		let _major_version = reader.u16()?;

		let pool = Pool::parse(reader).context("failed to parse constant pool")?;

		let access = reader.u16()?.into();
		let this_class = reader.u16()?;
		let super_class = reader.u16()?;

		let name = pool.class_name(this_class_checked(this_class)?)
			.with_context(|| anyhow!("failed to resolve this_class"))?
			.into();
		let super_class = pool.opt_class_name(super_class)
			.context("failed to resolve super_class")?
			.map(ClassName::from);

		let interface_count = reader.u16_usize()?;
		let interfaces = reader.vec(interface_count, |r| {
			Ok(pool.class_name(r.u16()?)?.into())
		})?;

		Ok(ClassHeader { access, name, super_class, interfaces })
	}
}

#[cfg(test)]
pub(crate) mod testing {
	use pretty_assertions::assert_eq;
	use crate::ClassWrite;
	use super::*;

	/// Builds a minimal class `Foo extends java/lang/Object` with no members.
	pub(crate) fn minimal_class(name: &str) -> Vec<u8> {
		let mut w = Vec::new();
		w.put_u32(super::MAGIC);
		w.put_u16(0); // minor
		w.put_u16(52); // major, Java 8
		w.put_u16(5); // pool count
		// 1: Utf8 name
		w.put_u8(1);
		w.put_u16(u16::try_from(name.len()).unwrap());
		w.put(name.as_bytes());
		// 2: Class -> 1
		w.put_u8(7);
		w.put_u16(1);
		// 3: Utf8 "java/lang/Object"
		w.put_u8(1);
		w.put_u16(16);
		w.put(b"java/lang/Object");
		// 4: Class -> 3
		w.put_u8(7);
		w.put_u16(3);
		w.put_u16(0x0021); // access: public super
		w.put_u16(2); // this_class
		w.put_u16(4); // super_class
		w.put_u16(0); // interfaces
		w.put_u16(0); // fields
		w.put_u16(0); // methods
		w.put_u16(0); // attributes
		w
	}

	#[test]
	fn parse_write_parse() {
		let data = minimal_class("test/Foo");

		let class = ClassFile::parse(&data).unwrap();
		assert_eq!(class.name().unwrap(), "test/Foo");
		assert_eq!(class.super_class_name().unwrap(), Some("java/lang/Object"));

		let written = class.write().unwrap();
		assert_eq!(written, data);
	}

	#[test]
	fn header_only() {
		let data = minimal_class("a");
		let header = ClassHeader::parse(&data).unwrap();
		assert_eq!(header.name.as_str(), "a");
		assert_eq!(header.super_class.unwrap().as_str(), "java/lang/Object");
		assert!(header.interfaces.is_empty());
	}
}
