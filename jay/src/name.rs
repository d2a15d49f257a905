//! Newtypes for the strings a class file is made of.
//!
//! Keeping class names, member names and descriptors as distinct types makes
//! it impossible to pass a descriptor where a name is expected, without
//! paying for anything at runtime.

/// Implements the boilerplate for a `String` wrapper type.
macro_rules! make_string_like {
	($name:ident) => {
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub struct $name(String);

		impl $name {
			pub fn as_str(&self) -> &str {
				&self.0
			}

			pub fn into_inner(self) -> String {
				self.0
			}
		}

		impl From<String> for $name {
			fn from(value: String) -> Self {
				$name(value)
			}
		}

		impl From<&str> for $name {
			fn from(value: &str) -> Self {
				$name(value.to_owned())
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(&self.0)
			}
		}
	};
}

make_string_like!(ClassName);
make_string_like!(FieldName);
make_string_like!(FieldDescriptor);
make_string_like!(MethodName);
make_string_like!(MethodDescriptor);
make_string_like!(ParameterName);

impl ClassName {
	pub const JAVA_LANG_OBJECT: &'static str = "java/lang/Object";

	/// The segment after the last `/`, e.g. `Bar$Baz` for `foo/Bar$Baz`.
	pub fn simple_name(&self) -> &str {
		self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, x)| x)
	}

	/// The innermost `$`-separated segment of the simple name.
	pub fn innermost_name(&self) -> &str {
		let simple = self.simple_name();
		simple.rsplit_once('$').map_or(simple, |(_, x)| x)
	}

	/// The source file name a compiler would have emitted for this class:
	/// the simple name up to the first `$`, with `.java` appended.
	pub fn source_file_name(&self) -> String {
		let simple = self.simple_name();
		let outer = simple.split_once('$').map_or(simple, |(x, _)| x);
		format!("{outer}.java")
	}
}

impl MethodName {
	pub const INIT: &'static str = "<init>";
	pub const CLINIT: &'static str = "<clinit>";
}

impl MethodDescriptor {
	/// The number of parameters, counting `long` and `double` once.
	pub fn parameter_count(&self) -> usize {
		ParameterIter::new(self.as_str()).count()
	}

	/// Iterates over the parameter descriptors, in order.
	pub fn parameters(&self) -> impl Iterator<Item=&str> {
		ParameterIter::new(self.as_str())
	}
}

struct ParameterIter<'a> {
	rest: &'a str,
}

impl<'a> ParameterIter<'a> {
	fn new(desc: &'a str) -> ParameterIter<'a> {
		// everything between `(` and `)`, or nothing for a malformed descriptor
		let rest = desc.strip_prefix('(')
			.and_then(|x| x.split_once(')'))
			.map_or("", |(params, _)| params);
		ParameterIter { rest }
	}
}

impl<'a> Iterator for ParameterIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<&'a str> {
		if self.rest.is_empty() {
			return None;
		}

		let array = self.rest.bytes().take_while(|&x| x == b'[').count();
		let end = match self.rest.as_bytes().get(array)? {
			b'L' => array + self.rest[array..].find(';')? + 1,
			_ => array + 1,
		};

		let (param, rest) = self.rest.split_at(end);
		self.rest = rest;
		Some(param)
	}
}
