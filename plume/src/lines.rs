//! Shared plumbing for the tab-delimited, indent-structured mapping formats.

use std::cmp::Ordering;
use std::iter::Peekable;
use anyhow::{anyhow, bail, Context, Result};
use crate::tree::names::Names;

/// One line, split on tabs, with its indentation depth.
#[derive(Debug)]
pub(crate) struct Line {
	pub(crate) number: usize,
	pub(crate) indent: usize,
	pub(crate) keyword: String,
	fields: std::vec::IntoIter<String>,
}

impl Line {
	pub(crate) fn parse(number: usize, raw: &str) -> Result<Line> {
		let indent = raw.bytes().take_while(|&x| x == b'\t').count();
		let mut fields = raw[indent..].split('\t').map(str::to_owned);

		let keyword = fields.next()
			.with_context(|| anyhow!("line {number} is empty"))?;

		Ok(Line {
			number,
			indent,
			keyword,
			fields: fields.collect::<Vec<_>>().into_iter(),
		})
	}

	pub(crate) fn next(&mut self) -> Result<String> {
		self.fields.next()
			.with_context(|| anyhow!("expected another field in line {}", self.number))
	}

	pub(crate) fn next_opt(&mut self) -> Option<String> {
		self.fields.next()
	}

	pub(crate) fn next_usize(&mut self) -> Result<usize> {
		let field = self.next()?;
		field.parse()
			.with_context(|| anyhow!("expected a number in line {}, got {field:?}", self.number))
	}

	/// The single remaining field; an error if there are more or none.
	pub(crate) fn end(mut self) -> Result<String> {
		let field = self.next()?;
		if self.fields.len() != 0 {
			bail!("line {} contains more fields than expected", self.number);
		}
		Ok(field)
	}

	/// All remaining fields as a name row; empty fields become `None`.
	pub(crate) fn into_names<const N: usize, T>(self, escaped: bool) -> Result<Names<N, T>>
	where
		T: From<String> + AsRef<str> + std::fmt::Debug,
	{
		let number = self.number;
		let names = self.fields
			.map(|x| -> Result<Option<T>> {
				Ok(if x.is_empty() {
					None
				} else {
					Some(T::from(cook(&x, escaped)?))
				})
			})
			.collect::<Result<Vec<_>>>()
			.with_context(|| anyhow!("on line {number}"))?;

		let names: [Option<T>; N] = names.try_into()
			.map_err(|x: Vec<_>| anyhow!("line {number} has {} name fields, expected {N}", x.len()))?;

		Names::try_from(names)
			.with_context(|| anyhow!("on line {number}"))
	}
}

/// Resolves the `\\ \n \r \t \0` escape sequences, when the tree asks for it.
pub(crate) fn cook(field: &str, escaped: bool) -> Result<String> {
	if !escaped || !field.contains('\\') {
		return Ok(field.to_owned());
	}

	let mut out = String::with_capacity(field.len());
	let mut chars = field.chars();
	while let Some(c) = chars.next() {
		if c != '\\' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some('\\') => out.push('\\'),
			Some('n') => out.push('\n'),
			Some('r') => out.push('\r'),
			Some('t') => out.push('\t'),
			Some('0') => out.push('\0'),
			other => bail!("unknown escape sequence \\{} in {field:?}", other.map(String::from).unwrap_or_default()),
		}
	}
	Ok(out)
}

pub(crate) fn escape(field: &str) -> String {
	let mut out = String::with_capacity(field.len());
	for c in field.chars() {
		match c {
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			'\0' => out.push_str("\\0"),
			c => out.push(c),
		}
	}
	out
}

/// Walks lines of one indentation depth, handing nested blocks to
/// [`children`][Nested::children].
pub(crate) struct Nested<'a, I: Iterator> {
	depth: usize,
	iter: &'a mut Peekable<I>,
}

impl<'a, I: Iterator<Item=Result<Line>>> Nested<'a, I> {
	pub(crate) fn new(iter: &'a mut Peekable<I>) -> Nested<'a, I> {
		Nested { depth: 0, iter }
	}

	pub(crate) fn children(&mut self) -> Nested<'_, I> {
		Nested {
			depth: self.depth + 1,
			iter: self.iter,
		}
	}

	/// Calls `f` for every line at this depth; `f` can recurse into deeper
	/// lines through the passed-in iterator. Deeper lines that `f` does not
	/// consume are an indentation error.
	pub(crate) fn for_each_line(mut self, mut f: impl FnMut(&mut Self, Line) -> Result<()>) -> Result<()> {
		loop {
			match self.iter.peek() {
				None => return Ok(()),
				Some(Err(_)) => {
					// propagate the iteration error
					if let Some(Err(e)) = self.iter.next() {
						return Err(e);
					}
				},
				Some(Ok(line)) => match line.indent.cmp(&self.depth) {
					Ordering::Less => return Ok(()), // end of this block
					Ordering::Greater => bail!("expected an indentation of {} in line {}", self.depth, line.number),
					Ordering::Equal => {
						if let Some(Ok(line)) = self.iter.next() {
							let number = line.number;
							f(&mut self, line)
								.with_context(|| anyhow!("in line {number}"))?;
						}
					},
				},
			}
		}
	}
}
