//! The error taxonomy surfaced at the future-graph level.
//!
//! The crates below report errors through `anyhow`; the pipeline sorts what
//! crosses a job boundary into these kinds, because callers react to them
//! differently: a [`PipelineError::BadFormat`] aborts the job, a
//! [`PipelineError::IntegrityFailure`] means "treat the file as absent".

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
	/// Mapping text or a jar entry is not parseable; aborts the job.
	#[error("bad format: {0}")]
	BadFormat(String),

	/// A merge found conflicting name rows for the same member; aborts.
	#[error("inconsistent mappings: {0}")]
	InconsistentMappings(String),

	/// A mapping references a class the jar doesn't have. Tolerated during
	/// remapping; only surfaced on explicit lookup.
	#[error("missing class {0}")]
	MissingClass(String),

	#[error("i/o failure")]
	Io(#[from] std::io::Error),

	/// The jar integrity check failed; the download coordinator treats this
	/// as "file not present" and downloads again.
	#[error("integrity check failed for {}", path.display())]
	IntegrityFailure { path: PathBuf },

	#[error("unsupported: {0}")]
	Unsupported(String),
}

impl PipelineError {
	/// Classifies an arbitrary error from the mapping layer.
	pub fn from_mapping_error(e: anyhow::Error) -> PipelineError {
		let message = format!("{e:#}");
		if message.contains("inconsistent mappings") {
			PipelineError::InconsistentMappings(message)
		} else if message.contains("missing class") {
			PipelineError::MissingClass(message)
		} else if message.contains("unsupported") {
			PipelineError::Unsupported(message)
		} else {
			PipelineError::BadFormat(message)
		}
	}
}
