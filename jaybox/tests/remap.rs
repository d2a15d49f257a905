//! End-to-end remapping over synthetic class files.

use pretty_assertions::assert_eq;
use jay::access::{AccessFlags, ACC_SYNTHETIC};
use jay::attribute::{self, Code, LocalVariable};
use jay::class_file::{AttributeInfo, ClassFile, MemberInfo};
use jay::pool::{Pool, PoolEntry, H_INVOKEVIRTUAL};
use plume::tree::mappings::{ClassMapping, FieldMapping, Mappings, MethodMapping};
use plume::tree::names::Namespace;
use jaybox::bridge::restore_bridge_flags;
use jaybox::hierarchy::HierarchyIndex;
use jaybox::locals::rename_locals;
use jaybox::remap::{remap_class, remap_jar};
use jaybox::storage::{EntryAttributes, ParsedJar};

fn class_shell(name: &str, super_name: &str) -> ClassFile {
	let mut pool = Pool::new();
	let this_class = pool.add_class_entry(name).unwrap();
	let super_class = pool.add_class_entry(super_name).unwrap();

	ClassFile {
		minor_version: 0,
		major_version: 52,
		pool,
		access: AccessFlags(0x0021), // public super
		this_class,
		super_class,
		interfaces: Vec::new(),
		fields: Vec::new(),
		methods: Vec::new(),
		attributes: Vec::new(),
	}
}

fn member(pool: &mut Pool, access: u16, name: &str, desc: &str, attributes: Vec<AttributeInfo>) -> MemberInfo {
	MemberInfo {
		access: access.into(),
		name_index: pool.add_utf8(name).unwrap(),
		descriptor_index: pool.add_utf8(desc).unwrap(),
		attributes,
	}
}

fn code_attribute(pool: &mut Pool, max_locals: u16, code: Vec<u8>, attributes: Vec<AttributeInfo>) -> AttributeInfo {
	let code = Code {
		max_stack: 2,
		max_locals,
		code,
		exception_table: Vec::new(),
		attributes,
	};
	AttributeInfo {
		name_index: pool.add_utf8(attribute::CODE).unwrap(),
		info: code.write().unwrap(),
	}
}

fn local_variable_table(pool: &mut Pool, length: u16, variables: &[(u16, &str, &str)]) -> AttributeInfo {
	let table: Vec<_> = variables.iter()
		.map(|&(slot, name, desc)| LocalVariable {
			start_pc: 0,
			length,
			name_index: pool.add_utf8(name).unwrap(),
			descriptor_index: pool.add_utf8(desc).unwrap(),
			index: slot,
		})
		.collect();

	AttributeInfo {
		name_index: pool.add_utf8(attribute::LOCAL_VARIABLE_TABLE).unwrap(),
		info: attribute::write_local_variable_table(&table).unwrap(),
	}
}

fn source_file_attribute(pool: &mut Pool, name: &str) -> AttributeInfo {
	let utf8 = pool.add_utf8(name).unwrap();
	AttributeInfo {
		name_index: pool.add_utf8(attribute::SOURCE_FILE).unwrap(),
		info: attribute::write_source_file(utf8),
	}
}

fn jar_of(classes: Vec<ClassFile>) -> ParsedJar {
	let mut jar = ParsedJar::default();
	for class in classes {
		let name = class.name().unwrap().to_owned();
		jar.put(format!("{name}.class"), EntryAttributes::default(), class.write().unwrap());
	}
	jar
}

fn two_namespace_tree() -> Mappings<2> {
	Mappings::new(["official", "named"].into())
}

fn parse_entry(jar: &ParsedJar, name: &str) -> ClassFile {
	ClassFile::parse(&jar.entries.get(name).unwrap().data).unwrap()
}

#[test]
fn trivial_mapping_is_identity() {
	let mut class = class_shell("A", "java/lang/Object");
	let code = code_attribute(&mut class.pool, 2, vec![0x1b /* iload_1 */, 0xac /* ireturn */], Vec::new());
	let method = member(&mut class.pool, 0x0001, "m", "(I)I", vec![code]);
	class.methods.push(method);
	let source_file = source_file_attribute(&mut class.pool, "A.java");
	class.attributes.push(source_file);

	let input = class.write().unwrap();

	let mut tree = two_namespace_tree();
	tree.add_class(ClassMapping::new(["A", "A"].map(Into::into).into())).unwrap();

	let hierarchy = HierarchyIndex::default();
	let remapper = tree.remapper(Namespace::new(0).unwrap(), Namespace::new(1).unwrap(), &hierarchy).unwrap();

	let output = remap_class(&remapper, &input).unwrap();
	assert_eq!(output, input);
}

#[test]
fn missing_source_file_is_synthesized() {
	let class = class_shell("pkg/Widget$Handle", "java/lang/Object");
	let input = class.write().unwrap();

	let tree = two_namespace_tree();
	let hierarchy = HierarchyIndex::default();
	let remapper = tree.remapper(Namespace::new(0).unwrap(), Namespace::new(1).unwrap(), &hierarchy).unwrap();

	let output = ClassFile::parse(&remap_class(&remapper, &input).unwrap()).unwrap();

	let at = output.find_attribute(attribute::SOURCE_FILE).unwrap().unwrap();
	let utf8 = attribute::parse_source_file(&output.attributes[at].info).unwrap();
	assert_eq!(output.pool.utf8(utf8).unwrap(), "Widget.java");
}

#[test]
fn class_rename_keeps_unmapped_field() {
	let mut class = class_shell("a", "java/lang/Object");
	let field = member(&mut class.pool, 0x0002, "b", "I", Vec::new());
	class.fields.push(field);

	let jar = jar_of(vec![class]);

	let mut tree = two_namespace_tree();
	tree.add_class(ClassMapping::new(["a", "Apple"].map(Into::into).into())).unwrap();

	let hierarchy = HierarchyIndex::from_jar(&jar).unwrap();
	let remapper = tree.remapper(Namespace::new(0).unwrap(), Namespace::new(1).unwrap(), &hierarchy).unwrap();

	let out = remap_jar(&jar, &remapper).unwrap();
	assert!(out.entries.contains_key("Apple.class"));

	let class = parse_entry(&out, "Apple.class");
	assert_eq!(class.name().unwrap(), "Apple");
	assert_eq!(class.fields[0].name(&class.pool).unwrap(), "b");
	assert_eq!(class.fields[0].descriptor(&class.pool).unwrap(), "I");
}

#[test]
fn field_mapped_on_superclass_rewrites_subclass_reference() {
	let mut parent = class_shell("P", "java/lang/Object");
	let field = member(&mut parent.pool, 0x0004, "x", "I", Vec::new());
	parent.fields.push(field);

	let mut child = class_shell("C", "P");
	let field_ref = child.pool.add_field_ref("C", "x", "I").unwrap();
	let [high, low] = field_ref.to_be_bytes();
	let code = code_attribute(&mut child.pool, 1, vec![
		0x2a, // aload_0
		0xb4, high, low, // getfield C.x:I
		0xb1, // return
	], Vec::new());
	let method = member(&mut child.pool, 0x0001, "m", "()V", vec![code]);
	child.methods.push(method);

	let jar = jar_of(vec![parent, child]);

	let mut tree = two_namespace_tree();
	let p = tree.add_class(ClassMapping::new(["P", "P"].map(Into::into).into())).unwrap();
	p.add_field(FieldMapping::new("I".into(), ["x", "count"].map(Into::into).into())).unwrap();

	let hierarchy = HierarchyIndex::from_jar(&jar).unwrap();
	let remapper = tree.remapper(Namespace::new(0).unwrap(), Namespace::new(1).unwrap(), &hierarchy).unwrap();

	let out = remap_jar(&jar, &remapper).unwrap();
	let child = parse_entry(&out, "C.class");

	let field_ref = child.pool.indices()
		.find(|&i| matches!(child.pool.entry(i), Ok(PoolEntry::FieldRef { .. })))
		.unwrap();
	assert_eq!(child.pool.member_ref(field_ref).unwrap(), ("C", "count", "I"));

	// the declaration on P is renamed too
	let parent = parse_entry(&out, "P.class");
	assert_eq!(parent.fields[0].name(&parent.pool).unwrap(), "count");
}

#[test]
fn parameters_synthesize_readable_names() {
	let mut class = class_shell("T", "java/lang/Object");
	let table = local_variable_table(&mut class.pool, 1, &[
		(0, "this", "LT;"),
		(1, "lvt1", "I"),
		(2, "lvt2", "Ljava/lang/String;"),
	]);
	let code = code_attribute(&mut class.pool, 3, vec![0xb1 /* return */], vec![table]);
	let method = member(&mut class.pool, 0x0001, "f", "(ILjava/lang/String;)V", vec![code]);
	class.methods.push(method);

	let mut jar = jar_of(vec![class]);

	let tree = two_namespace_tree();
	let hierarchy = HierarchyIndex::from_jar(&jar).unwrap();
	rename_locals(&mut jar, &tree, &hierarchy).unwrap();

	let class = parse_entry(&jar, "T.class");
	let code = Code::parse(&class.methods[0].attributes[0].info).unwrap();
	let table = attribute::parse_local_variable_table(&code.attributes[0].info).unwrap();

	let names: Vec<_> = table.iter()
		.map(|x| class.pool.utf8(x.name_index).unwrap())
		.collect();
	assert_eq!(names, vec!["this", "i", "string"]);
}

#[test]
fn parameter_mappings_overwrite_locals() {
	let mut class = class_shell("T", "java/lang/Object");
	let table = local_variable_table(&mut class.pool, 1, &[
		(0, "this", "LT;"),
		(1, "lvt1", "I"),
	]);
	let code = code_attribute(&mut class.pool, 2, vec![0xb1], vec![table]);
	let method = member(&mut class.pool, 0x0001, "f", "(I)V", vec![code]);
	class.methods.push(method);

	let mut jar = jar_of(vec![class]);

	// the tree the renamer sees is keyed by the current (named) names
	let mut tree = two_namespace_tree();
	let t = tree.add_class(ClassMapping::new(["T", "t"].map(Into::into).into())).unwrap();
	let f = t.add_method(MethodMapping::new("(I)V".into(), ["f", "f"].map(Into::into).into())).unwrap();
	f.add_parameter(plume::tree::mappings::ParameterMapping::new(1, ["ticks", ""].map(Into::into).into())).unwrap();

	let hierarchy = HierarchyIndex::from_jar(&jar).unwrap();
	rename_locals(&mut jar, &tree, &hierarchy).unwrap();

	let class = parse_entry(&jar, "T.class");
	let code = Code::parse(&class.methods[0].attributes[0].info).unwrap();
	let table = attribute::parse_local_variable_table(&code.attributes[0].info).unwrap();

	assert_eq!(class.pool.utf8(table[1].name_index).unwrap(), "ticks");
}

#[test]
fn stripped_bridge_flag_is_restored() {
	let mut class = class_shell("B", "java/lang/Object");

	let target = class.pool.add_method_ref("B", "get", "()Ljava/lang/String;").unwrap();
	let [high, low] = target.to_be_bytes();
	let code = code_attribute(&mut class.pool, 1, vec![
		0x2a, // aload_0
		0xb6, high, low, // invokevirtual B.get()Ljava/lang/String;
		0xb0, // areturn
	], Vec::new());
	let bridge = member(&mut class.pool, 0x0001 | ACC_SYNTHETIC, "get", "()Ljava/lang/Object;", vec![code]);
	class.methods.push(bridge);

	let specialized_code = code_attribute(&mut class.pool, 1, vec![0x01, 0xb0 /* aconst_null, areturn */], Vec::new());
	let specialized = member(&mut class.pool, 0x0001, "get", "()Ljava/lang/String;", vec![specialized_code]);
	class.methods.push(specialized);

	let mut jar = jar_of(vec![class]);
	let restored = restore_bridge_flags(&mut jar).unwrap();
	assert_eq!(restored, 1);

	let class = parse_entry(&jar, "B.class");
	assert!(class.methods[0].access.is_bridge());
	assert!(!class.methods[1].access.is_bridge());
}

#[test]
fn synthetic_accessor_is_not_a_bridge() {
	let mut class = class_shell("B", "java/lang/Object");

	// calls a method of a *different* name, so it's no bridge
	let target = class.pool.add_method_ref("B", "inner", "()Ljava/lang/Object;").unwrap();
	let [high, low] = target.to_be_bytes();
	let code = code_attribute(&mut class.pool, 1, vec![0x2a, 0xb6, high, low, 0xb0], Vec::new());
	let accessor = member(&mut class.pool, 0x0008 | ACC_SYNTHETIC, "access$000", "()Ljava/lang/Object;", vec![code]);
	class.methods.push(accessor);

	let mut jar = jar_of(vec![class]);
	assert_eq!(restore_bridge_flags(&mut jar).unwrap(), 0);
}

#[test]
fn invokedynamic_handle_target_is_rewritten() {
	let mut class = class_shell("a", "java/lang/Object");
	let target = class.pool.add_method_ref("a", "b", "(I)Lz;").unwrap();
	class.pool.add_method_handle(H_INVOKEVIRTUAL, target).unwrap();

	let jar = jar_of(vec![class]);

	let mut tree = two_namespace_tree();
	let a = tree.add_class(ClassMapping::new(["a", "A"].map(Into::into).into())).unwrap();
	a.add_method(MethodMapping::new("(I)Lz;".into(), ["b", "compute"].map(Into::into).into())).unwrap();
	tree.add_class(ClassMapping::new(["z", "Z"].map(Into::into).into())).unwrap();

	let hierarchy = HierarchyIndex::from_jar(&jar).unwrap();
	let remapper = tree.remapper(Namespace::new(0).unwrap(), Namespace::new(1).unwrap(), &hierarchy).unwrap();

	let out = remap_jar(&jar, &remapper).unwrap();
	let class = parse_entry(&out, "A.class");

	let handle = class.pool.indices()
		.find_map(|i| match class.pool.entry(i) {
			Ok(&PoolEntry::MethodHandle { reference, .. }) => Some(reference),
			_ => None,
		})
		.unwrap();
	assert_eq!(class.pool.member_ref(handle).unwrap(), ("A", "compute", "(I)LZ;"));
}
