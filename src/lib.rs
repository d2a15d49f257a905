//! The core of a game-version reconstruction pipeline.
//!
//! Given an obfuscated jar and one or more mapping trees, the pipeline
//! rewrites every class through the trees and writes a deobfuscated jar plus
//! its side data. The bytecode work lives in the [`jaybox`] and [`plume`]
//! crates; this crate contributes the surrounding machinery: a
//! content-addressed [`cache`], an at-most-once [`download`] coordinator,
//! the per-job [`env::PipelineEnv`], and the [`pipeline`] driver composing
//! them per version.
//!
//! There is deliberately no binary here: embedders construct a
//! [`env::PipelineEnv`] and feed it [`pipeline::VersionSpec`]s.

pub mod cache;
pub mod download;
pub mod env;
pub mod error;
pub mod logsink;
pub mod pipeline;
pub mod sidecar;

use anyhow::Result;

/// Wires `log` output through `fern` to stderr. Embedders that bring their
/// own logger skip this.
pub fn init_logging(level: log::LevelFilter) -> Result<()> {
	fern::Dispatch::new()
		.format(|out, message, record| {
			out.finish(format_args!("[{}] [{}] {}", record.level(), record.target(), message))
		})
		.level(level)
		.chain(std::io::stderr())
		.apply()?;
	Ok(())
}
