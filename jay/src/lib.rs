//! A small model of the Java class file format.
//!
//! This crate parses a `.class` file into a structure that keeps the constant
//! pool and all attribute payloads at the raw level: attribute bytes refer to
//! pool entries by index, and since [`pool::Pool`] only ever appends entries
//! (it never renumbers them), a class can be edited through its pool and
//! written back without touching payloads the editor doesn't understand.
//!
//! Use [`class_file::ClassFile::parse`] for the full structure, or
//! [`class_file::ClassHeader::parse`] when only the name and supertypes are
//! needed.

use anyhow::{bail, Result};

pub mod access;
pub mod attribute;
pub mod class_file;
pub mod insn;
pub mod name;
pub mod pool;

pub(crate) trait ClassRead {
	fn take(&mut self, n: usize) -> Result<&[u8]>;

	fn u8(&mut self) -> Result<u8>;
	fn u16(&mut self) -> Result<u16>;
	fn u32(&mut self) -> Result<u32>;

	fn u16_usize(&mut self) -> Result<usize> {
		Ok(self.u16()? as usize)
	}

	fn vec<T>(&mut self, n: usize, mut element: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
		let mut vec = Vec::with_capacity(n.min(1024));
		for _ in 0..n {
			vec.push(element(self)?);
		}
		Ok(vec)
	}
}

impl ClassRead for &[u8] {
	fn take(&mut self, n: usize) -> Result<&[u8]> {
		if self.len() < n {
			bail!("unexpected end of class data: wanted {n} more bytes, got {}", self.len());
		}
		let this = *self;
		let (head, tail) = this.split_at(n);
		*self = tail;
		Ok(head)
	}

	fn u8(&mut self) -> Result<u8> {
		Ok(self.take(1)?[0])
	}

	fn u16(&mut self) -> Result<u16> {
		let b = self.take(2)?;
		Ok(u16::from_be_bytes([b[0], b[1]]))
	}

	fn u32(&mut self) -> Result<u32> {
		let b = self.take(4)?;
		Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
	}
}

pub(crate) trait ClassWrite {
	fn put(&mut self, bytes: &[u8]);

	fn put_u8(&mut self, x: u8) {
		self.put(&[x]);
	}
	fn put_u16(&mut self, x: u16) {
		self.put(&x.to_be_bytes());
	}
	fn put_u32(&mut self, x: u32) {
		self.put(&x.to_be_bytes());
	}
}

impl ClassWrite for Vec<u8> {
	fn put(&mut self, bytes: &[u8]) {
		self.extend_from_slice(bytes);
	}
}
