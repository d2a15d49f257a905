//! Jar containers and the transformations the pipeline runs on them.
//!
//! [`storage`] reads and writes zip-shaped jars. [`hierarchy`] indexes the
//! supertypes of the classes in a jar. [`remap`] rewrites whole jars through
//! a [`plume::remapper::MemberMapper`]; [`bridge`] and [`locals`] are the
//! post-remap passes restoring bridge flags and synthesizing readable local
//! variable names.

pub mod storage;
pub mod hierarchy;
pub mod remap;
pub mod bridge;
pub mod locals;
