//! Mapping trees with `N` symbolic namespaces, and the text formats they
//! are read from.
//!
//! The central type is [`tree::mappings::Mappings`]: per-class tables of
//! field, method and parameter names across `N` namespaces, keyed by the
//! names of namespace 0 (the *default* namespace).
//!
//! Trees are read with [`tiny_v2::read`], [`tiny_v1::read`] and
//! [`proguard::read`], written with [`tiny_v2::write`], and turned into
//! remappers for jar transformation via [`tree::mappings::Mappings::remapper`].

pub mod tree;
pub mod action;
pub mod remapper;

pub mod tiny_v1;
pub mod tiny_v2;
pub mod proguard;

mod lines;
