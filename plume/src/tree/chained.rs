use crate::tree::mappings::Mappings;

/// Two mapping stages presented as one: an *intermediate* tree (obfuscated →
/// stable names) and a *named* tree (stable → human-readable names).
///
/// This pair exists only to be consumed by the jar remapper, which applies
/// the two component trees in sequence, each as a whole pass. It deliberately
/// offers none of the tree operations (`invert`, `merge`, `map_type`): there
/// is no single tree here to run them on.
#[derive(Debug, Clone)]
pub struct ChainedMappings {
	intermediate: Mappings<2>,
	named: Mappings<2>,
}

impl ChainedMappings {
	pub fn new(intermediate: Mappings<2>, named: Mappings<2>) -> ChainedMappings {
		ChainedMappings { intermediate, named }
	}

	pub fn intermediate(&self) -> &Mappings<2> {
		&self.intermediate
	}

	pub fn named(&self) -> &Mappings<2> {
		&self.named
	}
}
