//! The per-version driver.
//!
//! One [`VersionSpec`] turns into one strictly ordered job: download the
//! obfuscated jar, read and merge the mapping trees, remap (one pass, or two
//! through an intermediate stage), restore bridges, rename locals, write the
//! mapped jar, then emit the side data through the content cache. Different
//! versions run independently; ordering only exists inside one job.

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{anyhow, bail, Context, Result};
use log::info;
use jaybox::remap;
use jaybox::storage::FileJar;
use plume::tree::chained::ChainedMappings;
use plume::tree::mappings::Mappings;
use crate::cache;
use crate::env::{ensure_dir, PipelineEnv, TaskCategory};
use crate::error::PipelineError;
use crate::sidecar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingsFormat {
	TinyV1,
	TinyV2,
	Proguard,
}

#[derive(Debug, Clone)]
pub struct MappingsFile {
	pub path: PathBuf,
	pub format: MappingsFormat,
}

#[derive(Debug, Clone)]
pub struct VersionSpec {
	pub provider: String,
	pub version: String,
	/// Where the obfuscated jar comes from; `http(s)` or `file`.
	pub jar_url: String,
	/// The tree carrying the final names: one file, or the client and
	/// server halves of one version, merged before use.
	pub named: Vec<MappingsFile>,
	/// An optional stable renaming applied as its own pass before `named`.
	pub intermediate: Option<MappingsFile>,
}

#[derive(Debug)]
pub struct VersionOutput {
	pub mapped_jar: PathBuf,
	pub mappings: PathBuf,
	pub comments: PathBuf,
	pub metadata: PathBuf,
}

/// Reads one mapping file into a two-namespace tree whose default namespace
/// names the classes as the jar currently has them.
fn read_tree(file: &MappingsFile) -> Result<Mappings<2>> {
	match file.format {
		MappingsFormat::TinyV1 => plume::tiny_v1::read_file(&file.path),
		MappingsFormat::TinyV2 => plume::tiny_v2::read_file(&file.path),
		MappingsFormat::Proguard => {
			// proguard output maps named -> obfuscated; flip it around
			let tree = plume::proguard::read_file(&file.path, ["named", "official"])?;
			let official = tree.namespace("official")?;
			tree.invert(official)
		},
	}
	.map_err(|e| anyhow!(PipelineError::from_mapping_error(e)))
	.with_context(|| anyhow!("while reading mappings from {:?}", file.path))
}

/// Client and server halves merge into one tree; a single file passes
/// through.
fn read_and_merge(files: &[MappingsFile]) -> Result<Mappings<2>> {
	let mut trees = files.iter().map(read_tree);

	let Some(first) = trees.next() else {
		bail!(PipelineError::BadFormat("a version needs at least one named mappings file".to_owned()));
	};

	trees.try_fold(first?, |merged, tree| {
		merged.merge(&tree?)
			.map_err(|e| anyhow!(PipelineError::from_mapping_error(e)))
	})
}

pub async fn run_version(env: &Arc<PipelineEnv>, spec: VersionSpec) -> Result<VersionOutput> {
	let key = format!("{}/{}", spec.provider, spec.version);
	env.log.line(&key, "job started")?;

	// download the obfuscated jar
	let input_jar = env.jars_dir().join(&spec.provider).join(format!("{}.jar", spec.version));
	{
		let _permit = env.acquire(TaskCategory::Download).await?;
		env.downloads.download(&spec.jar_url, &input_jar, None).await
			.map_err(|e| anyhow!("failed to download {}: {e}", spec.jar_url))?;
	}
	env.check_cancelled()?;
	env.log.line(&key, "obfuscated jar ready")?;

	// read the mapping trees
	let (named, intermediate) = {
		let _permit = env.acquire(TaskCategory::ReadMappings).await?;
		let named_files = spec.named.clone();
		let intermediate_file = spec.intermediate.clone();

		tokio::task::spawn_blocking(move || -> Result<_> {
			let named = read_and_merge(&named_files)?;
			let intermediate = intermediate_file.as_ref().map(read_tree).transpose()?;
			Ok((named, intermediate))
		}).await.context("mappings reader task died")??
	};
	env.check_cancelled()?;
	env.log.line(&key, "mappings read")?;

	// remap: read, index hierarchy, pass(es), bridges, locals
	let mapped = {
		let _permit = env.acquire(TaskCategory::Remap).await?;
		let stop = env.stop_check();
		let input_jar = input_jar.clone();
		let named = named.clone();

		tokio::task::spawn_blocking(move || {
			let jar = FileJar::new(input_jar);
			match intermediate {
				Some(intermediate) => {
					let chained = ChainedMappings::new(intermediate, named);
					remap::remap_chained_stoppable(&jar, &chained, &stop)
				},
				None => remap::remap_full_stoppable(&jar, &named, &stop),
			}
		}).await.context("remap task died")??
	};
	env.check_cancelled()?;
	env.log.line(&key, "remap finished")?;

	// write the mapped jar, mirroring the input layout
	let mapped_jar = env.mapped_jars_dir(&spec.provider).join(format!("{}.jar", spec.version));
	ensure_dir(mapped_jar.parent().context("mapped jar path has no parent")?)?;
	mapped.write_to_file(&mapped_jar)?;

	// side data, deduplicated through the content cache
	let output = {
		let _permit = env.acquire(TaskCategory::PostProcess).await?;

		let dir = env.mappings_cache_dir(&spec.provider, &spec.version);
		let content_cache = env.content_cache_dir();

		let mappings_path = dir.join("mappings-named.tiny");
		let mut tiny = Vec::new();
		plume::tiny_v2::write(&named, &mut tiny)?;
		cache::write_cached(&mappings_path, &tiny, &content_cache)?;

		let comments_path = dir.join("mappings-comments.json");
		let comments = sidecar::comments_from_tree(&named)?;
		cache::write_cached(&comments_path, &sidecar::comments_to_json(&comments)?, &content_cache)?;

		let metadata_path = dir.join("mappings-metadata.json");
		let metadata = sidecar::Metadata {
			name: spec.provider.clone(),
			version: spec.version.clone(),
		};
		cache::write_cached(&metadata_path, &sidecar::metadata_to_json(&metadata)?, &content_cache)?;

		VersionOutput {
			mapped_jar,
			mappings: mappings_path,
			comments: comments_path,
			metadata: metadata_path,
		}
	};

	info!("{key} done");
	env.log.line(&key, "job finished")?;
	Ok(output)
}

/// Mirrors a resource directory into the output tree through the content
/// cache, renaming `….jar.resource` files back to `….jar`.
pub async fn extract_resources(env: &Arc<PipelineEnv>, src_dir: PathBuf, dst_dir: PathBuf) -> Result<()> {
	let _permit = env.acquire(TaskCategory::ExtractResource).await?;
	env.check_cancelled()?;

	let content_cache = env.content_cache_dir();
	tokio::task::spawn_blocking(move || {
		cache::copy_cached(&src_dir, &dst_dir, &content_cache, true)
	}).await.context("resource extraction task died")?
}
