//! Drives one whole version job over a synthetic jar on disk.

use pretty_assertions::assert_eq;
use jay::access::AccessFlags;
use jay::class_file::{ClassFile, MemberInfo};
use jay::pool::Pool;
use jaybox::storage::{EntryAttributes, FileJar, Jar, OpenedJar, ParsedJar};
use bowerbird::env::{PipelineConfig, PipelineEnv};
use bowerbird::pipeline::{run_version, MappingsFile, MappingsFormat, VersionSpec};
use bowerbird::sidecar;

fn obfuscated_class() -> ClassFile {
	let mut pool = Pool::new();
	let this_class = pool.add_class_entry("a").unwrap();
	let super_class = pool.add_class_entry("java/lang/Object").unwrap();
	let field = MemberInfo {
		access: AccessFlags(0x0002),
		name_index: pool.add_utf8("b").unwrap(),
		descriptor_index: pool.add_utf8("I").unwrap(),
		attributes: Vec::new(),
	};

	ClassFile {
		minor_version: 0,
		major_version: 52,
		pool,
		access: AccessFlags(0x0021),
		this_class,
		super_class,
		interfaces: Vec::new(),
		fields: vec![field],
		methods: Vec::new(),
		attributes: Vec::new(),
	}
}

#[tokio::test]
async fn one_version_end_to_end() {
	let dir = tempfile::tempdir().unwrap();

	// the obfuscated input jar, served over file://
	let input = dir.path().join("upstream.jar");
	let mut jar = ParsedJar::default();
	jar.put("a.class".to_owned(), EntryAttributes::default(), obfuscated_class().write().unwrap());
	jar.put("assets/lang.txt".to_owned(), EntryAttributes::default(), b"resource".to_vec());
	jar.write_to_file(&input).unwrap();

	// the named mappings, with a comment that must surface in the side data
	let mappings = dir.path().join("named.tiny");
	std::fs::write(&mappings, "\
tiny\t2\t0\tofficial\tnamed
c\ta\tpkg/Apple
\tc\tan apple
\tf\tI\tb\tcount
").unwrap();

	let env = PipelineEnv::new(PipelineConfig::new(dir.path().join("data"))).unwrap();
	let spec = VersionSpec {
		provider: "orchard".to_owned(),
		version: "1.0".to_owned(),
		jar_url: format!("file://{}", input.display()),
		named: vec![MappingsFile { path: mappings, format: MappingsFormat::TinyV2 }],
		intermediate: None,
	};

	let output = run_version(&env, spec).await.unwrap();

	// the mapped jar has the renamed class and the untouched resource
	let mapped = FileJar::new(output.mapped_jar);
	let mut opened = mapped.open().unwrap();
	let names = opened.entry_names().unwrap();
	assert!(names.contains(&"pkg/Apple.class".to_owned()));
	assert!(names.contains(&"assets/lang.txt".to_owned()));

	let (_, data) = opened.read_entry("pkg/Apple.class").unwrap();
	let class = ClassFile::parse(&data).unwrap();
	assert_eq!(class.name().unwrap(), "pkg/Apple");
	assert_eq!(class.fields[0].name(&class.pool).unwrap(), "count");

	// side data landed in the mappings cache
	let comments = sidecar::read_comments(&output.comments).unwrap();
	assert_eq!(comments.get("a").unwrap().comment.as_deref(), Some("an apple"));

	let metadata: sidecar::Metadata = serde_json::from_slice(&std::fs::read(&output.metadata).unwrap()).unwrap();
	assert_eq!(metadata, sidecar::Metadata { name: "orchard".to_owned(), version: "1.0".to_owned() });

	// the per-job log stream exists
	let log = std::fs::read_to_string(dir.path().join("data/logs/orchard/1.0.log")).unwrap();
	assert!(log.contains("job finished"));

	// a second run is served from the existing download and caches
	let spec_again = VersionSpec {
		provider: "orchard".to_owned(),
		version: "1.0".to_owned(),
		jar_url: "https://unreachable.invalid/upstream.jar".to_owned(),
		named: vec![MappingsFile { path: dir.path().join("named.tiny"), format: MappingsFormat::TinyV2 }],
		intermediate: None,
	};
	run_version(&env, spec_again).await.unwrap();
}

#[tokio::test]
async fn resources_extract_through_the_cache() {
	let dir = tempfile::tempdir().unwrap();

	let src = dir.path().join("resources");
	std::fs::create_dir_all(src.join("maps")).unwrap();
	std::fs::write(src.join("maps/overworld.jar.resource"), b"nested jar").unwrap();

	let env = PipelineEnv::new(PipelineConfig::new(dir.path().join("data"))).unwrap();
	let dst = dir.path().join("out");

	bowerbird::pipeline::extract_resources(&env, src, dst.clone()).await.unwrap();

	assert_eq!(std::fs::read(dst.join("maps/overworld.jar")).unwrap(), b"nested jar");
}
