//! A bytecode walker.
//!
//! Decodes just enough of each instruction to know where the next one
//! starts, handing out the opcode and its raw operand bytes. That is all the
//! callers here need: constant pool operands are two big-endian bytes into a
//! pool whose indices never move.

use anyhow::{bail, Result};

pub const OP_INVOKEVIRTUAL: u8 = 182;
pub const OP_INVOKESPECIAL: u8 = 183;
pub const OP_INVOKESTATIC: u8 = 184;
pub const OP_INVOKEINTERFACE: u8 = 185;
pub const OP_INVOKEDYNAMIC: u8 = 186;

#[derive(Debug, Clone, PartialEq)]
pub struct Insn<'a> {
	pub pc: usize,
	pub opcode: u8,
	pub operands: &'a [u8],
}

impl Insn<'_> {
	/// The constant pool index carried by instructions whose first two
	/// operand bytes are one, like the `invoke*` and `get`/`put` family.
	pub fn pool_index(&self) -> Result<u16> {
		match self.operands {
			[high, low, ..] => Ok(u16::from_be_bytes([*high, *low])),
			_ => bail!("instruction {} at {} carries no constant pool index", self.opcode, self.pc),
		}
	}

	pub fn is_method_invocation(&self) -> bool {
		matches!(self.opcode, OP_INVOKEVIRTUAL | OP_INVOKESPECIAL | OP_INVOKESTATIC | OP_INVOKEINTERFACE)
	}
}

pub struct InsnIter<'a> {
	code: &'a [u8],
	pos: usize,
}

impl<'a> InsnIter<'a> {
	pub fn new(code: &'a [u8]) -> InsnIter<'a> {
		InsnIter { code, pos: 0 }
	}

	fn operand_length(&self, pc: usize, opcode: u8) -> Result<usize> {
		Ok(match opcode {
			// bipush, ldc, single-byte slot loads/stores, ret, newarray
			16 | 18 | 21..=25 | 54..=58 | 169 | 188 => 1,
			// sipush, ldc_w, ldc2_w, iinc, branches, pool references
			17 | 19 | 20 | 132 | 153..=168 | 178..=184 | 187 | 189 | 192 | 193 | 198 | 199 => 2,
			// multianewarray
			197 => 3,
			// invokeinterface, invokedynamic, goto_w, jsr_w
			185 | 186 | 200 | 201 => 4,
			// wide
			196 => {
				let widened = *self.code.get(pc + 1)
					.ok_or_else(|| anyhow::anyhow!("wide at {pc} runs off the end of the code"))?;
				if widened == 132 { 5 } else { 3 } // wide iinc carries a 2-byte constant
			},
			// tableswitch
			170 => {
				let pad = 3 - pc % 4;
				let low = self.switch_operand(pc + 1 + pad + 4)?;
				let high = self.switch_operand(pc + 1 + pad + 8)?;
				if low > high {
					bail!("tableswitch at {pc} has low {low} > high {high}");
				}
				let count = (high as i64 - low as i64 + 1) as usize;
				pad + 12 + count * 4
			},
			// lookupswitch
			171 => {
				let pad = 3 - pc % 4;
				let npairs = self.switch_operand(pc + 1 + pad + 4)?;
				if npairs < 0 {
					bail!("lookupswitch at {pc} has negative pair count {npairs}");
				}
				pad + 8 + npairs as usize * 8
			},
			0..=201 => 0,
			_ => bail!("unknown opcode {opcode} at {pc}"),
		})
	}

	fn switch_operand(&self, at: usize) -> Result<i32> {
		match self.code.get(at..at + 4) {
			Some(&[a, b, c, d]) => Ok(i32::from_be_bytes([a, b, c, d])),
			_ => bail!("switch operand at {at} runs off the end of the code"),
		}
	}
}

impl<'a> Iterator for InsnIter<'a> {
	type Item = Result<Insn<'a>>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.pos >= self.code.len() {
			return None;
		}

		let pc = self.pos;
		let opcode = self.code[pc];

		let length = match self.operand_length(pc, opcode) {
			Ok(length) => length,
			Err(e) => {
				self.pos = self.code.len(); // poison further iteration
				return Some(Err(e));
			},
		};

		let Some(operands) = self.code.get(pc + 1..pc + 1 + length) else {
			self.pos = self.code.len();
			return Some(Err(anyhow::anyhow!("instruction {opcode} at {pc} runs off the end of the code")));
		};

		self.pos = pc + 1 + length;
		Some(Ok(Insn { pc, opcode, operands }))
	}
}
