//! Typed views of the attribute payloads the rest of the pipeline edits.
//!
//! Everything not listed here travels through [`AttributeInfo`] untouched.

use anyhow::{Context, Result};
use crate::{ClassRead, ClassWrite};
use crate::class_file::AttributeInfo;

pub const CODE: &str = "Code";
pub const SOURCE_FILE: &str = "SourceFile";
pub const INNER_CLASSES: &str = "InnerClasses";
pub const RECORD: &str = "Record";
pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";

/// The `Code` attribute. The bytecode itself and any nested attribute this
/// crate has no business with are kept raw.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
	pub max_stack: u16,
	pub max_locals: u16,
	pub code: Vec<u8>,
	pub exception_table: Vec<ExceptionTableEntry>,
	pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionTableEntry {
	pub start_pc: u16,
	pub end_pc: u16,
	pub handler_pc: u16,
	/// Pool index of the catch type; 0 catches everything.
	pub catch_type: u16,
}

impl Code {
	pub fn parse(info: &[u8]) -> Result<Code> {
		let reader = &mut { info };

		let max_stack = reader.u16()?;
		let max_locals = reader.u16()?;

		let code_length = reader.u32()? as usize;
		let code = reader.take(code_length)?.to_vec();

		let exception_count = reader.u16_usize()?;
		let exception_table = reader.vec(exception_count, |r| Ok(ExceptionTableEntry {
			start_pc: r.u16()?,
			end_pc: r.u16()?,
			handler_pc: r.u16()?,
			catch_type: r.u16()?,
		}))?;

		let attributes = AttributeInfo::parse_list(reader)
			.context("failed to parse attributes nested in Code")?;

		Ok(Code { max_stack, max_locals, code, exception_table, attributes })
	}

	pub fn write(&self) -> Result<Vec<u8>> {
		let mut w = Vec::new();

		w.put_u16(self.max_stack);
		w.put_u16(self.max_locals);

		w.put_u32(u32::try_from(self.code.len()).context("bytecode too long")?);
		w.put(&self.code);

		w.put_u16(u16::try_from(self.exception_table.len()).context("too many exception table entries")?);
		for entry in &self.exception_table {
			w.put_u16(entry.start_pc);
			w.put_u16(entry.end_pc);
			w.put_u16(entry.handler_pc);
			w.put_u16(entry.catch_type);
		}

		AttributeInfo::write_list(&self.attributes, &mut w)?;

		Ok(w)
	}
}

/// One `LocalVariableTable` (or `LocalVariableTypeTable`) entry; for the
/// latter, `descriptor_index` holds the signature.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
	pub start_pc: u16,
	pub length: u16,
	pub name_index: u16,
	pub descriptor_index: u16,
	/// The variable's slot.
	pub index: u16,
}

pub fn parse_local_variable_table(info: &[u8]) -> Result<Vec<LocalVariable>> {
	let reader = &mut { info };
	let count = reader.u16_usize()?;
	reader.vec(count, |r| Ok(LocalVariable {
		start_pc: r.u16()?,
		length: r.u16()?,
		name_index: r.u16()?,
		descriptor_index: r.u16()?,
		index: r.u16()?,
	}))
}

pub fn write_local_variable_table(table: &[LocalVariable]) -> Result<Vec<u8>> {
	let mut w = Vec::new();
	w.put_u16(u16::try_from(table.len()).context("too many local variables")?);
	for variable in table {
		w.put_u16(variable.start_pc);
		w.put_u16(variable.length);
		w.put_u16(variable.name_index);
		w.put_u16(variable.descriptor_index);
		w.put_u16(variable.index);
	}
	Ok(w)
}

/// One component of the `Record` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponent {
	pub name_index: u16,
	pub descriptor_index: u16,
	pub attributes: Vec<AttributeInfo>,
}

pub fn parse_record(info: &[u8]) -> Result<Vec<RecordComponent>> {
	let reader = &mut { info };
	let count = reader.u16_usize()?;
	reader.vec(count, |r| Ok(RecordComponent {
		name_index: r.u16()?,
		descriptor_index: r.u16()?,
		attributes: AttributeInfo::parse_list(r)?,
	}))
}

pub fn write_record(components: &[RecordComponent]) -> Result<Vec<u8>> {
	let mut w = Vec::new();
	w.put_u16(u16::try_from(components.len()).context("too many record components")?);
	for component in components {
		w.put_u16(component.name_index);
		w.put_u16(component.descriptor_index);
		AttributeInfo::write_list(&component.attributes, &mut w)?;
	}
	Ok(w)
}

/// One `InnerClasses` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct InnerClass {
	pub inner_class: u16,
	/// 0 for local and anonymous classes.
	pub outer_class: u16,
	/// Utf8 index of the simple inner name; 0 for anonymous classes.
	pub inner_name: u16,
	pub access: u16,
}

pub fn parse_inner_classes(info: &[u8]) -> Result<Vec<InnerClass>> {
	let reader = &mut { info };
	let count = reader.u16_usize()?;
	reader.vec(count, |r| Ok(InnerClass {
		inner_class: r.u16()?,
		outer_class: r.u16()?,
		inner_name: r.u16()?,
		access: r.u16()?,
	}))
}

pub fn write_inner_classes(entries: &[InnerClass]) -> Result<Vec<u8>> {
	let mut w = Vec::new();
	w.put_u16(u16::try_from(entries.len()).context("too many inner classes")?);
	for entry in entries {
		w.put_u16(entry.inner_class);
		w.put_u16(entry.outer_class);
		w.put_u16(entry.inner_name);
		w.put_u16(entry.access);
	}
	Ok(w)
}

/// The `SourceFile` payload: a single utf8 index.
pub fn parse_source_file(info: &[u8]) -> Result<u16> {
	let reader = &mut { info };
	reader.u16()
}

pub fn write_source_file(utf8_index: u16) -> Vec<u8> {
	utf8_index.to_be_bytes().to_vec()
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use super::*;

	#[test]
	fn code_round_trip() {
		let code = Code {
			max_stack: 2,
			max_locals: 3,
			code: vec![0x2a, 0xb1], // aload_0, return
			exception_table: vec![ExceptionTableEntry { start_pc: 0, end_pc: 1, handler_pc: 1, catch_type: 0 }],
			attributes: Vec::new(),
		};
		let written = code.write().unwrap();
		assert_eq!(Code::parse(&written).unwrap(), code);
	}

	#[test]
	fn local_variable_table_round_trip() {
		let table = vec![
			LocalVariable { start_pc: 0, length: 10, name_index: 7, descriptor_index: 8, index: 0 },
			LocalVariable { start_pc: 0, length: 10, name_index: 9, descriptor_index: 10, index: 1 },
		];
		let written = write_local_variable_table(&table).unwrap();
		assert_eq!(parse_local_variable_table(&written).unwrap(), table);
	}
}
