pub mod chained;
pub mod mappings;

pub mod names {
	use std::fmt::{Debug, Formatter};
	use std::ops::Index;
	use anyhow::{anyhow, bail, Context, Error, Result};

	/// A checked index into the namespaces of a mapping tree.
	///
	/// Once one of these exists for a given `N`, indexing with it cannot go
	/// out of bounds.
	#[derive(Debug, Copy, Clone, PartialEq, Eq)]
	pub struct Namespace<const N: usize>(pub(crate) usize);

	impl<const N: usize> Namespace<N> {
		pub const DEFAULT: Namespace<N> = Namespace(0);

		pub fn new(id: usize) -> Result<Namespace<N>> {
			if id >= N {
				bail!("cannot create namespace with id {id} for a tree with {N} namespaces");
			}
			Ok(Namespace(id))
		}

		pub fn id(self) -> usize {
			self.0
		}

		pub fn is_default(self) -> bool {
			self.0 == 0
		}
	}

	/// The labels of the `N` namespaces of a tree, e.g. `["official", "named"]`.
	#[derive(Clone, PartialEq, Eq)]
	pub struct Namespaces<const N: usize> {
		labels: [String; N],
	}

	impl<const N: usize> Namespaces<N> {
		pub fn labels(&self) -> &[String; N] {
			&self.labels
		}

		pub fn by_label(&self, label: &str) -> Result<Namespace<N>> {
			self.labels.iter()
				.position(|x| x == label)
				.map(Namespace)
				.with_context(|| anyhow!("cannot find namespace with label {label:?}, only got {self:?}"))
		}

		/// Returns an error unless the labels are exactly the given ones.
		/// Call this after reading a mappings file to check you got what you
		/// expected.
		pub fn check_that(&self, labels: [&str; N]) -> Result<()> {
			if self.labels != labels {
				bail!("expected namespaces {labels:?}, got {self:?}");
			}
			Ok(())
		}

		/// The labels with namespace 0 and `target` exchanged.
		pub(crate) fn swapped(&self, target: Namespace<N>) -> Namespaces<N> {
			let mut labels = self.labels.clone();
			labels.swap(0, target.0);
			Namespaces { labels }
		}
	}

	impl<const N: usize> Index<Namespace<N>> for Namespaces<N> {
		type Output = String;

		fn index(&self, index: Namespace<N>) -> &String {
			&self.labels[index.0]
		}
	}

	impl<const N: usize> Debug for Namespaces<N> {
		fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
			f.debug_list().entries(&self.labels).finish()
		}
	}

	impl<const N: usize> TryFrom<[String; N]> for Namespaces<N> {
		type Error = Error;

		fn try_from(labels: [String; N]) -> Result<Namespaces<N>> {
			if labels.iter().any(|x| x.is_empty()) {
				bail!("found empty namespace label in {labels:?}");
			}
			Ok(Namespaces { labels })
		}
	}

	impl<const N: usize> From<[&str; N]> for Namespaces<N> {
		fn from(labels: [&str; N]) -> Namespaces<N> {
			Namespaces { labels: labels.map(String::from) }
		}
	}

	/// The names of one class, field, method or parameter across the `N`
	/// namespaces.
	///
	/// A `None` entry means "same as the default namespace"; empty strings
	/// in mapping files are parsed into `None`.
	#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
	pub struct Names<const N: usize, T> {
		names: [Option<T>; N],
	}

	impl<const N: usize, T> Names<N, T> {
		pub fn from_default(name: T) -> Names<N, T> {
			let mut names = std::array::from_fn(|_| None);
			names[0] = Some(name);
			Names { names }
		}

		/// The name in the default namespace. Every node keyed into a tree
		/// has one.
		pub fn default_name(&self) -> Result<&T> where T: Debug {
			self.names[0].as_ref()
				.with_context(|| anyhow!("no name for the default namespace: {self:?}"))
		}

		pub fn get(&self, namespace: Namespace<N>) -> Option<&T> {
			self.names[namespace.0].as_ref()
		}

		/// The name in `namespace`, falling back to the default namespace.
		pub fn resolve(&self, namespace: Namespace<N>) -> Result<&T> where T: Debug {
			match self.names[namespace.0].as_ref() {
				Some(name) => Ok(name),
				None => self.default_name(),
			}
		}

		pub fn names(&self) -> &[Option<T>; N] {
			&self.names
		}

		/// The names with namespace 0 and `target` exchanged. The new entry 0
		/// is materialized from the old default when absent, so the result is
		/// again keyable.
		pub(crate) fn swapped(&self, target: Namespace<N>) -> Names<N, T> where T: Clone {
			let mut names = self.names.clone();
			if names[target.0].is_none() {
				names[target.0] = names[0].clone();
			}
			names.swap(0, target.0);
			Names { names }
		}
	}

	impl<const N: usize, T: Debug> Debug for Names<N, T> {
		fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
			f.debug_list().entries(&self.names).finish()
		}
	}

	/// Empty inputs turn into `None`.
	impl<const N: usize, T: AsRef<str>> From<[T; N]> for Names<N, T> {
		fn from(names: [T; N]) -> Names<N, T> {
			let names = names.map(|x| if x.as_ref().is_empty() { None } else { Some(x) });
			Names { names }
		}
	}

	impl<const N: usize, T: AsRef<str> + Debug> TryFrom<[Option<T>; N]> for Names<N, T> {
		type Error = Error;

		fn try_from(names: [Option<T>; N]) -> Result<Names<N, T>> {
			if names.iter().any(|x| x.as_ref().is_some_and(|x| x.as_ref().is_empty())) {
				bail!("cannot create names containing an empty string: {names:?}");
			}
			Ok(Names { names })
		}
	}

	impl<const N: usize, T> From<Names<N, T>> for [Option<T>; N] {
		fn from(names: Names<N, T>) -> [Option<T>; N] {
			names.names
		}
	}
}
