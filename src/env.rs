//! The context handle threaded through every pipeline operation.
//!
//! Nothing here is a process-wide singleton: the download map, the cache
//! directories, the log sink and the cancellation token all hang off one
//! [`PipelineEnv`] value that the embedder constructs and passes around.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{bail, Context, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use crate::download::Downloads;
use crate::logsink::LogSink;

/// Typed task categories; each caps its in-flight task count independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCategory {
	Download,
	ReadMappings,
	Remap,
	PostProcess,
	ExtractResource,
}

const ALL_CATEGORIES: [TaskCategory; 5] = [
	TaskCategory::Download,
	TaskCategory::ReadMappings,
	TaskCategory::Remap,
	TaskCategory::PostProcess,
	TaskCategory::ExtractResource,
];

pub struct PipelineConfig {
	/// The per-run data directory everything lives under.
	pub data_dir: PathBuf,
	/// Degree of parallelism for categories without their own limit.
	pub parallelism: usize,
	pub category_limits: HashMap<TaskCategory, usize>,
}

impl PipelineConfig {
	pub fn new(data_dir: impl Into<PathBuf>) -> PipelineConfig {
		let parallelism = std::thread::available_parallelism()
			.map(|x| x.get())
			.unwrap_or(4);

		PipelineConfig {
			data_dir: data_dir.into(),
			parallelism,
			category_limits: HashMap::new(),
		}
	}

	pub fn with_limit(mut self, category: TaskCategory, limit: usize) -> PipelineConfig {
		self.category_limits.insert(category, limit);
		self
	}
}

pub struct PipelineEnv {
	pub data_dir: PathBuf,
	pub downloads: Downloads,
	pub log: LogSink,
	pub cancel: CancellationToken,
	categories: HashMap<TaskCategory, Arc<Semaphore>>,
}

impl PipelineEnv {
	pub fn new(config: PipelineConfig) -> Result<Arc<PipelineEnv>> {
		if config.parallelism == 0 {
			bail!("parallelism must be at least 1");
		}

		let cancel = CancellationToken::new();

		let categories = ALL_CATEGORIES.iter()
			.map(|&category| {
				let limit = config.category_limits.get(&category)
					.copied()
					.unwrap_or(config.parallelism);
				(category, Arc::new(Semaphore::new(limit.max(1))))
			})
			.collect();

		Ok(Arc::new(PipelineEnv {
			downloads: Downloads::new(cancel.clone()),
			log: LogSink::new(config.data_dir.join("logs")),
			cancel,
			categories,
			data_dir: config.data_dir,
		}))
	}

	/// Obfuscated inputs, organized by provider and version.
	pub fn jars_dir(&self) -> PathBuf {
		self.data_dir.join("jars")
	}

	/// Remapped outputs, mirroring the input layout.
	pub fn mapped_jars_dir(&self, provider: &str) -> PathBuf {
		self.data_dir.join("jars").join("mapped").join(provider)
	}

	pub fn mappings_cache_dir(&self, provider: &str, version: &str) -> PathBuf {
		self.data_dir.join("cache").join("mappings").join(provider).join(version)
	}

	/// Where the content-addressed blobs live.
	pub fn content_cache_dir(&self) -> PathBuf {
		self.data_dir.join("cache").join("content")
	}

	/// Waits for a slot in the category. Holding the returned permit counts
	/// against the category's in-flight cap.
	pub async fn acquire(&self, category: TaskCategory) -> Result<OwnedSemaphorePermit> {
		let semaphore = self.categories.get(&category)
			.with_context(|| format!("no semaphore for category {category:?}"))?
			.clone();
		semaphore.acquire_owned().await
			.context("task category closed")
	}

	pub fn check_cancelled(&self) -> Result<()> {
		if self.cancel.is_cancelled() {
			bail!("pipeline cancelled");
		}
		Ok(())
	}

	/// A predicate for blocking workers to poll between work items.
	pub fn stop_check(&self) -> impl Fn() -> bool + Send + Sync + 'static {
		let cancel = self.cancel.clone();
		move || cancel.is_cancelled()
	}
}

pub fn ensure_dir(path: &Path) -> Result<()> {
	std::fs::create_dir_all(path)
		.with_context(|| format!("failed to create directory {path:?}"))
}
