//! Whole-tree operations: [`invert`][crate::tree::mappings::Mappings::invert]
//! and [`merge`][crate::tree::mappings::Mappings::merge].

mod invert;
mod merge;
