//! The download coordinator.
//!
//! At most one download runs per `(url, destination)` key: concurrent
//! callers share one future, and later callers of a finished key observe its
//! result without any new work. Network failures are retried a few times
//! before the shared future fails for everyone.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use anyhow::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{info, warn};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use crate::error::PipelineError;

const ATTEMPTS: u32 = 5;
const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Nothing smaller than an empty zip's end-of-central-directory record can
/// be a jar.
const MIN_JAR_SIZE: u64 = 22;

/// Called with `(content_length, bytes_so_far)` as the body streams in;
/// the length is `-1` when the server doesn't say.
pub type ProgressSink = Arc<dyn Fn(i64, u64) + Send + Sync>;

type DownloadFuture = Shared<BoxFuture<'static, Result<(), Arc<PipelineError>>>>;

pub struct Downloads {
	client: reqwest::Client,
	cancel: CancellationToken,
	active: Mutex<HashMap<(String, PathBuf), DownloadFuture>>,
}

impl Downloads {
	pub fn new(cancel: CancellationToken) -> Downloads {
		Downloads {
			client: reqwest::Client::new(),
			cancel,
			active: Mutex::new(HashMap::new()),
		}
	}

	/// Completes once `dest` is a valid file for `url`.
	///
	/// If `dest` already exists (and, for jars, passes the integrity check),
	/// this is immediate. Otherwise the caller joins the one download in
	/// flight for this key, or starts it.
	pub async fn download(&self, url: &str, dest: &Path, progress: Option<ProgressSink>) -> Result<(), Arc<PipelineError>> {
		let key = (url.to_owned(), dest.to_owned());

		let future = {
			let mut active = self.active.lock()
				.map_err(|_| Arc::new(PipelineError::Unsupported("download map poisoned".to_owned())))?;

			match active.get(&key) {
				Some(future) => future.clone(),
				None => {
					let future = download_body(
						self.client.clone(),
						self.cancel.clone(),
						key.0.clone(),
						key.1.clone(),
						progress,
					).boxed().shared();
					active.insert(key, future.clone());
					future
				},
			}
		};

		future.await
	}
}

async fn download_body(
	client: reqwest::Client,
	cancel: CancellationToken,
	url: String,
	dest: PathBuf,
	progress: Option<ProgressSink>,
) -> Result<(), Arc<PipelineError>> {
	download_inner(client, cancel, &url, &dest, progress).await.map_err(Arc::new)
}

async fn download_inner(
	client: reqwest::Client,
	cancel: CancellationToken,
	url: &str,
	dest: &Path,
	progress: Option<ProgressSink>,
) -> Result<(), PipelineError> {
	if dest.exists() && (!is_jar_name(dest) || is_jar_good(dest, MIN_JAR_SIZE)) {
		return Ok(());
	}

	if let Some(parent) = dest.parent() {
		tokio::fs::create_dir_all(parent).await?;
	}

	if let Some(local) = url.strip_prefix("file://") {
		info!("copying {local} to {dest:?}");
		tokio::fs::copy(local, dest).await?;
		return Ok(());
	}

	let mut staging = dest.as_os_str().to_owned();
	staging.push(".tmp");
	let staging = PathBuf::from(staging);

	let mut last_error: Option<PipelineError> = None;
	for attempt in 1..=ATTEMPTS {
		match stream_to(&client, &cancel, url, &staging, progress.as_ref()).await {
			Ok(()) => {
				tokio::fs::rename(&staging, dest).await?;
				if is_jar_name(dest) && !is_jar_good(dest, MIN_JAR_SIZE) {
					return Err(PipelineError::IntegrityFailure { path: dest.to_owned() });
				}
				return Ok(());
			},
			Err(e) => {
				warn!("download of {url} failed (attempt {attempt}/{ATTEMPTS}): {e}");
				last_error = Some(e);
				if attempt < ATTEMPTS {
					tokio::time::sleep(RETRY_PAUSE).await;
				}
			},
		}
	}

	Err(match last_error {
		Some(e) => PipelineError::Io(std::io::Error::other(format!("download of {url} failed after {ATTEMPTS} attempts: {e}"))),
		None => PipelineError::Io(std::io::Error::other(format!("download of {url} failed"))),
	})
}

async fn stream_to(
	client: &reqwest::Client,
	cancel: &CancellationToken,
	url: &str,
	staging: &Path,
	progress: Option<&ProgressSink>,
) -> Result<(), PipelineError> {
	info!("downloading {url}");

	let response = client.get(url).send().await
		.and_then(reqwest::Response::error_for_status)
		.map_err(|e| PipelineError::Io(std::io::Error::other(e)))?;

	let content_length = response.content_length()
		.and_then(|x| i64::try_from(x).ok())
		.unwrap_or(-1);

	let mut file = tokio::fs::File::create(staging).await?;
	let mut so_far: u64 = 0;

	let mut response = response;
	loop {
		let chunk = tokio::select! {
			// a cancelled download drops the stream and never touches dest
			() = cancel.cancelled() => {
				return Err(PipelineError::Io(std::io::Error::other(format!("download of {url} cancelled"))));
			},
			chunk = response.chunk() => chunk.map_err(|e| PipelineError::Io(std::io::Error::other(e)))?,
		};

		let Some(chunk) = chunk else { break };
		file.write_all(&chunk).await?;
		so_far += chunk.len() as u64;

		if let Some(progress) = progress {
			progress(content_length, so_far);
		}
	}

	file.flush().await?;
	Ok(())
}

fn is_jar_name(path: &Path) -> bool {
	path.extension().is_some_and(|x| x == "jar")
}

/// A jar is good when it's at least `min_size` bytes and every entry's
/// compressed stream opens and reads cleanly. Failures are logged; a bad jar
/// is simply "not there" as far as the coordinator cares.
pub fn is_jar_good(path: &Path, min_size: u64) -> bool {
	match check_jar(path, min_size) {
		Ok(()) => true,
		Err(e) => {
			warn!("jar {path:?} failed the integrity check: {e:#}");
			false
		},
	}
}

fn check_jar(path: &Path, min_size: u64) -> Result<()> {
	use anyhow::{bail, Context};

	let size = std::fs::metadata(path)?.len();
	if size < min_size {
		bail!("jar is {size} bytes, expected at least {min_size}");
	}

	let file = std::fs::File::open(path)?;
	let mut archive = zip::ZipArchive::new(file)?;
	for i in 0..archive.len() {
		let mut entry = archive.by_index(i)
			.with_context(|| format!("entry {i} cannot be opened"))?;
		std::io::copy(&mut entry, &mut std::io::sink())
			.with_context(|| format!("entry {i} cannot be read"))?;
	}

	Ok(())
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use super::*;

	#[tokio::test]
	async fn existing_file_completes_immediately() {
		let dir = tempfile::tempdir().unwrap();
		let dest = dir.path().join("data.txt");
		std::fs::write(&dest, b"already here").unwrap();

		let downloads = Downloads::new(CancellationToken::new());
		downloads.download("https://unreachable.invalid/data.txt", &dest, None).await.unwrap();

		assert_eq!(std::fs::read(&dest).unwrap(), b"already here");
	}

	#[tokio::test]
	async fn file_scheme_copies() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("source.bin");
		std::fs::write(&source, b"bytes").unwrap();
		let dest = dir.path().join("dest.bin");

		let downloads = Downloads::new(CancellationToken::new());
		let url = format!("file://{}", source.display());
		downloads.download(&url, &dest, None).await.unwrap();

		assert_eq!(std::fs::read(&dest).unwrap(), b"bytes");
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_execution() {
		let dir = tempfile::tempdir().unwrap();
		let dest = dir.path().join("dest.bin");

		let downloads = Arc::new(Downloads::new(CancellationToken::new()));
		// a missing source makes every caller observe the body's failure
		let url = format!("file://{}", dir.path().join("missing.bin").display());

		let mut handles = Vec::new();
		for _ in 0..8 {
			let downloads = downloads.clone();
			let url = url.clone();
			let dest = dest.clone();
			handles.push(tokio::spawn(async move {
				downloads.download(&url, &dest, None).await
			}));
		}

		let mut errors = Vec::new();
		for handle in handles {
			errors.push(handle.await.unwrap().unwrap_err());
		}

		// one body execution: everyone holds the very same error
		for error in &errors[1..] {
			assert!(Arc::ptr_eq(&errors[0], error));
		}
	}

	#[test]
	fn truncated_jar_fails_the_check() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("bad.jar");
		std::fs::write(&path, b"PK\x03\x04 definitely not a zip").unwrap();

		assert!(!is_jar_good(&path, 4));
	}
}
