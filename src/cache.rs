//! A content-addressed file cache.
//!
//! Blobs live at `cache_dir/<h[0..2]>/<h[2..]><suffix>` for `h` the SHA-256
//! of the content; targets are materialized as hard links onto the blob, so
//! identical resources across versions share one inode. Blob creation is
//! content-addressed and the link step is delete-then-link, so concurrent
//! writers race benignly: whoever wins links identical bytes.

use std::fs;
use std::path::Path;
use anyhow::{anyhow, bail, Context, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Everything after the first dot of the file name, dot included; empty for
/// dotless names. This keeps multi-part extensions like `.tar.gz` together.
fn name_suffix(name: &str) -> String {
	name.split_once('.')
		.map(|(_, rest)| format!(".{rest}"))
		.unwrap_or_default()
}

/// Writes `content` to `target`, backed by a blob under `cache_dir`.
///
/// Repeated calls with the same content leave both the blob and the target
/// unchanged; two targets written with the same content share an inode.
pub fn write_cached(target: &Path, content: &[u8], cache_dir: &Path) -> Result<()> {
	let file_name = target.file_name()
		.and_then(|x| x.to_str())
		.with_context(|| anyhow!("target {target:?} has no usable file name"))?;

	let hash = hex::encode(Sha256::digest(content));
	let blob = cache_dir
		.join(&hash[..2])
		.join(format!("{}{}", &hash[2..], name_suffix(file_name)));

	if !blob.exists() {
		let parent = blob.parent()
			.with_context(|| anyhow!("blob path {blob:?} has no parent"))?;
		fs::create_dir_all(parent)?;

		// write-then-rename: concurrent writers produce identical bytes, so
		// the last rename winning is fine
		let staging = blob.with_extension("tmp");
		fs::write(&staging, content)
			.with_context(|| anyhow!("failed to write blob {blob:?}"))?;
		fs::rename(&staging, &blob)?;
	}

	if target.exists() {
		fs::remove_file(target)
			.with_context(|| anyhow!("failed to replace {target:?}"))?;
	}
	if let Some(parent) = target.parent() {
		fs::create_dir_all(parent)?;
	}
	fs::hard_link(&blob, target)
		.with_context(|| anyhow!("failed to link {target:?} to blob {blob:?}"))?;

	Ok(())
}

/// Recursively mirrors `src_dir` into `dst_dir` through the cache.
///
/// With `rename_jar_resource` set, files named `….jar.resource` land as
/// `….jar` in the destination.
pub fn copy_cached(src_dir: &Path, dst_dir: &Path, cache_dir: &Path, rename_jar_resource: bool) -> Result<()> {
	for entry in WalkDir::new(src_dir) {
		let entry = entry?;
		let relative = entry.path().strip_prefix(src_dir)
			.with_context(|| anyhow!("walked outside of {src_dir:?}"))?;

		if entry.file_type().is_dir() {
			fs::create_dir_all(dst_dir.join(relative))?;
			continue;
		}
		if !entry.file_type().is_file() {
			bail!("cannot cache-copy special file {:?}", entry.path());
		}

		let content = fs::read(entry.path())
			.with_context(|| anyhow!("failed to read {:?}", entry.path()))?;

		let mut target = dst_dir.join(relative);
		if rename_jar_resource {
			if let Some(name) = target.file_name().and_then(|x| x.to_str()) {
				if let Some(stripped) = name.strip_suffix(".jar.resource") {
					target.set_file_name(format!("{stripped}.jar"));
				}
			}
		}

		write_cached(&target, &content, cache_dir)?;
	}

	Ok(())
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use super::*;

	#[test]
	fn suffixes() {
		assert_eq!(name_suffix("client.jar"), ".jar");
		assert_eq!(name_suffix("mappings.tar.gz"), ".tar.gz");
		assert_eq!(name_suffix("LICENSE"), "");
	}

	#[test]
	fn write_is_idempotent_and_links() {
		let dir = tempfile::tempdir().unwrap();
		let cache = dir.path().join("cache");
		let a = dir.path().join("out/a.txt");
		let b = dir.path().join("out/b.txt");

		write_cached(&a, b"same content", &cache).unwrap();
		write_cached(&a, b"same content", &cache).unwrap();
		write_cached(&b, b"same content", &cache).unwrap();

		assert_eq!(fs::read(&a).unwrap(), b"same content");

		#[cfg(unix)]
		{
			use std::os::unix::fs::MetadataExt;
			let ino_a = fs::metadata(&a).unwrap().ino();
			let ino_b = fs::metadata(&b).unwrap().ino();
			assert_eq!(ino_a, ino_b);
		}
	}

	#[test]
	fn copy_renames_jar_resources() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("src");
		let dst = dir.path().join("dst");
		let cache = dir.path().join("cache");

		fs::create_dir_all(src.join("nested")).unwrap();
		fs::write(src.join("nested/inner.jar.resource"), b"zipped").unwrap();
		fs::write(src.join("plain.txt"), b"text").unwrap();

		copy_cached(&src, &dst, &cache, true).unwrap();

		assert_eq!(fs::read(dst.join("nested/inner.jar")).unwrap(), b"zipped");
		assert_eq!(fs::read(dst.join("plain.txt")).unwrap(), b"text");
	}
}
