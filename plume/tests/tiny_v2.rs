use pretty_assertions::assert_eq;
use plume::tree::mappings::Mappings;

const SAMPLE: &str = "\
tiny\t2\t0\tofficial\tnamed
c\ta\tpkg/Apple
\tc\tan apple tree node
\tf\tI\tb\tcount
\t\tc\thow many
\tm\t(La;)La;\tc\tgraft
\t\tp\t1\t\tother
\t\t\tc\tthe other tree
c\td\t
";

#[test]
fn read_resolves_names_and_comments() {
	let mappings: Mappings<2> = plume::tiny_v2::read(SAMPLE.as_bytes()).unwrap();
	mappings.namespaces.check_that(["official", "named"]).unwrap();

	let named = mappings.namespace("named").unwrap();

	let class = mappings.get_class(&"a".into()).unwrap();
	assert_eq!(class.names.resolve(named).unwrap().as_str(), "pkg/Apple");
	assert_eq!(class.doc.as_deref(), Some("an apple tree node"));

	let field = class.get_field("b", "I").unwrap();
	assert_eq!(field.doc.as_deref(), Some("how many"));

	let method = class.get_method("c", "(La;)La;").unwrap();
	let parameter = method.get_parameter(1).unwrap();
	assert_eq!(parameter.names.resolve(named).unwrap().as_str(), "other");
	assert_eq!(parameter.doc.as_deref(), Some("the other tree"));

	// an empty name field means "same as default"
	let unnamed = mappings.get_class(&"d".into()).unwrap();
	assert_eq!(unnamed.names.resolve(named).unwrap().as_str(), "d");
}

#[test]
fn write_read_round_trips() {
	let mappings: Mappings<2> = plume::tiny_v2::read(SAMPLE.as_bytes()).unwrap();

	let written = plume::tiny_v2::write_string(&mappings).unwrap();
	let reread: Mappings<2> = plume::tiny_v2::read(written.as_bytes()).unwrap();

	assert_eq!(reread, mappings);
}

#[test]
fn escaped_names_property_is_honored() {
	let input = "\
tiny\t2\t0\tofficial\tnamed
\tescaped-names
c\ta\tpkg/Apple
\tc\tline one\\nline two
";
	let mappings: Mappings<2> = plume::tiny_v2::read(input.as_bytes()).unwrap();

	let class = mappings.get_class(&"a".into()).unwrap();
	assert_eq!(class.doc.as_deref(), Some("line one\nline two"));

	// and the writer escapes it right back
	let written = plume::tiny_v2::write_string(&mappings).unwrap();
	assert!(written.contains("line one\\nline two"));
}

#[test]
fn unsupported_minor_version_is_rejected() {
	let input = "tiny\t2\t1\tofficial\tnamed\n";
	let error = plume::tiny_v2::read::<2>(input.as_bytes()).unwrap_err();
	assert!(format!("{error}").contains("unsupported"));
}

#[test]
fn unknown_keywords_are_rejected() {
	let input = "tiny\t2\t0\tofficial\tnamed\nx\ta\tb\n";
	assert!(plume::tiny_v2::read::<2>(input.as_bytes()).is_err());
}

#[test]
fn bad_indent_is_rejected() {
	let input = "tiny\t2\t0\tofficial\tnamed\nc\ta\tb\n\t\t\tf\tI\tx\ty\n";
	assert!(plume::tiny_v2::read::<2>(input.as_bytes()).is_err());
}

#[test]
fn inversion_preserves_resolved_names_both_ways() {
	let mappings: Mappings<2> = plume::tiny_v2::read(SAMPLE.as_bytes()).unwrap();
	let named = mappings.namespace("named").unwrap();
	let official = mappings.namespace("official").unwrap();

	let there = mappings.invert(named).unwrap();
	let back = there.invert(named).unwrap();

	assert_eq!(back.namespaces, mappings.namespaces);
	for (name, class) in &mappings.classes {
		let round_tripped = back.get_class(name).unwrap();
		assert_eq!(
			round_tripped.names.resolve(official).unwrap(),
			class.names.resolve(official).unwrap(),
		);
		assert_eq!(
			round_tripped.names.resolve(named).unwrap(),
			class.names.resolve(named).unwrap(),
		);
		assert_eq!(round_tripped.doc, class.doc);
		assert_eq!(round_tripped.fields.len(), class.fields.len());
		assert_eq!(round_tripped.methods.len(), class.methods.len());
	}
}
