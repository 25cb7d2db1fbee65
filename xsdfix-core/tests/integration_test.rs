//! End-to-end validation and repair scenarios

use std::fs;

use tempfile::tempdir;
use xsdfix_core::{compile_schema_str, ActionType, ErrorKind, Validator, XmlFixer};

const LIBRARY_XSD: &str = r#"
<schema xmlns="http://www.w3.org/2001/XMLSchema">
    <element name="library">
        <complexType>
            <sequence>
                <element name="name" type="string"/>
                <element name="books">
                    <complexType>
                        <sequence>
                            <element name="book" type="string" minOccurs="0" maxOccurs="unbounded"/>
                        </sequence>
                    </complexType>
                </element>
            </sequence>
        </complexType>
    </element>
</schema>
"#;

fn fixer_for(xsd: &str) -> XmlFixer {
    XmlFixer::new(compile_schema_str(xsd).unwrap())
}

#[test]
fn scenario_missing_required_element() {
    let fixer = fixer_for(LIBRARY_XSD);

    let before = fixer.validate_str("<library><books/></library>");
    let missing: Vec<_> = before
        .errors
        .iter()
        .filter(|e| e.kind == ErrorKind::MissingRequiredElement)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].element_name, "name");
    assert_eq!(missing[0].path, "/library");

    let outcome = fixer.fix_str("<library><books/></library>");
    assert!(outcome.result.success);
    let corrected = outcome.corrected_xml.unwrap();
    // <name/> inserted as first child of <library>
    let name_pos = corrected.find("<name").unwrap();
    let books_pos = corrected.find("<books").unwrap();
    assert!(name_pos < books_pos);
    assert!(outcome.result.after_validation.unwrap().valid);
}

#[test]
fn scenario_cardinality_excess() {
    let xsd = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="departments">
            <complexType>
                <sequence>
                    <element name="department" type="string" maxOccurs="5"/>
                </sequence>
            </complexType>
        </element>
    </schema>
    "#;
    let xml = "<departments>\
        <department>a</department><department>b</department><department>c</department>\
        <department>d</department><department>e</department><department>f</department>\
        </departments>";
    let fixer = fixer_for(xsd);

    let before = fixer.validate_str(xml);
    let excess: Vec<_> = before
        .errors
        .iter()
        .filter(|e| e.kind == ErrorKind::TooManyOccurrences)
        .collect();
    assert_eq!(excess.len(), 1);
    assert_eq!(excess[0].element_name, "department");

    let outcome = fixer.fix_str(xml);
    assert_eq!(outcome.result.applied_count(), 1);
    let corrected = outcome.corrected_xml.unwrap();
    assert_eq!(corrected.matches("<department>").count(), 5);
    assert!(!corrected.contains(">f<"));
    assert!(outcome.result.after_validation.unwrap().valid);
}

#[test]
fn scenario_ordering_violation() {
    let xsd = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="employee">
            <complexType>
                <sequence>
                    <element name="firstName" type="string"/>
                    <element name="lastName" type="string"/>
                    <element name="age" type="int"/>
                    <element name="email" type="string"/>
                </sequence>
            </complexType>
        </element>
    </schema>
    "#;
    let xml = "<employee><age>30</age><email>x@y.z</email><firstName>J</firstName><lastName>D</lastName></employee>";
    let fixer = fixer_for(xsd);

    let before = fixer.validate_str(xml);
    assert!(before
        .errors
        .iter()
        .any(|e| e.kind == ErrorKind::InvalidElementOrder && e.path.starts_with("/employee")));

    let outcome = fixer.fix_str(xml);
    let corrected = outcome.corrected_xml.unwrap();
    let positions: Vec<usize> = ["<firstName>", "<lastName>", "<age>", "<email>"]
        .iter()
        .map(|tag| corrected.find(tag).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(outcome.result.after_validation.unwrap().valid);
}

#[test]
fn scenario_data_type_coercion() {
    let xsd = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="library">
            <complexType>
                <sequence>
                    <element name="founded" type="int"/>
                </sequence>
            </complexType>
        </element>
    </schema>
    "#;
    let xml = "<library><founded>not_a_number</founded></library>";
    let fixer = fixer_for(xsd);

    let before = fixer.validate_str(xml);
    let err = before
        .errors
        .iter()
        .find(|e| e.kind == ErrorKind::InvalidDataType)
        .unwrap();
    assert_eq!(err.actual_value.as_deref(), Some("not_a_number"));
    assert_eq!(err.expected_value.as_deref(), Some("int"));

    let outcome = fixer.fix_str(xml);
    let change = outcome
        .result
        .applied
        .iter()
        .find(|a| a.action_type == ActionType::ChangeTextContent)
        .unwrap();
    assert_eq!(change.new_value.as_deref(), Some("0"));
    assert!(outcome.corrected_xml.unwrap().contains("<founded>0</founded>"));
}

#[test]
fn scenario_enumeration_repair() {
    let xsd = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="department">
            <complexType>
                <sequence>
                    <element name="name" type="DeptName"/>
                </sequence>
            </complexType>
        </element>
        <simpleType name="DeptName">
            <restriction base="string">
                <enumeration value="Engineering"/>
                <enumeration value="Marketing"/>
                <enumeration value="Sales"/>
                <enumeration value="HR"/>
                <enumeration value="Finance"/>
            </restriction>
        </simpleType>
    </schema>
    "#;
    let xml = "<department><name>InvalidDepartment</name></department>";
    let fixer = fixer_for(xsd);

    let before = fixer.validate_str(xml);
    let err = before
        .errors
        .iter()
        .find(|e| e.kind == ErrorKind::ConstraintViolation)
        .unwrap();
    assert_eq!(err.schema_rule, "enumeration");

    let outcome = fixer.fix_str(xml);
    assert!(outcome
        .corrected_xml
        .unwrap()
        .contains("<name>Engineering</name>"));
    assert!(outcome.result.after_validation.unwrap().valid);
}

#[test]
fn scenario_numeric_range_clamp() {
    let xsd = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="employees">
            <complexType>
                <sequence>
                    <element name="employee" maxOccurs="unbounded">
                        <complexType>
                            <sequence>
                                <element name="age" type="AgeType"/>
                            </sequence>
                        </complexType>
                    </element>
                </sequence>
            </complexType>
        </element>
        <simpleType name="AgeType">
            <restriction base="int">
                <minInclusive value="18"/>
                <maxInclusive value="65"/>
            </restriction>
        </simpleType>
    </schema>
    "#;
    let xml = "<employees>\
        <employee><age>15</age></employee>\
        <employee><age>70</age></employee>\
        </employees>";
    let fixer = fixer_for(xsd);

    let before = fixer.validate_str(xml);
    let range_errors: Vec<_> = before
        .errors
        .iter()
        .filter(|e| e.kind == ErrorKind::InvalidValueRange)
        .collect();
    assert_eq!(range_errors.len(), 2);

    let outcome = fixer.fix_str(xml);
    let corrected = outcome.corrected_xml.unwrap();
    assert!(corrected.contains("<age>18</age>"));
    assert!(corrected.contains("<age>65</age>"));
    assert!(outcome.result.after_validation.unwrap().valid);
}

#[test]
fn validity_means_no_errors() {
    let fixer = fixer_for(LIBRARY_XSD);
    let good = fixer.validate_str("<library><name>x</name><books/></library>");
    assert_eq!(good.valid, good.errors.is_empty());
    let bad = fixer.validate_str("<library/>");
    assert_eq!(bad.valid, bad.errors.is_empty());
    assert!(!bad.valid);
}

#[test]
fn fix_is_idempotent() {
    let fixer = fixer_for(LIBRARY_XSD);
    let outcome = fixer.fix_str("<library><books/></library>");
    let corrected = outcome.corrected_xml.unwrap();

    let second = fixer.fix_str(&corrected);
    assert!(second.result.success);
    assert!(second.result.no_changes_required);
    assert!(second.corrected_xml.is_none());
}

#[test]
fn successful_fix_never_increases_error_count() {
    let fixer = fixer_for(LIBRARY_XSD);
    let xml = "<library><books><book>Dune</book></books></library>";
    let outcome = fixer.fix_str(xml);
    assert!(outcome.result.success);
    if let Some(after) = &outcome.result.after_validation {
        assert!(after.errors.len() <= outcome.result.before_validation.errors.len());
    }
}

#[test]
fn valid_document_round_trips_at_dom_level() {
    let fixer = fixer_for(LIBRARY_XSD);
    let xml = "<library><name>City Library</name><books><book>Dune</book><book>Solaris</book></books></library>";
    let outcome = fixer.fix_str(xml);
    // a clean document is left alone entirely
    assert!(outcome.result.no_changes_required);
    assert!(outcome.corrected_xml.is_none());
}

#[test]
fn empty_body_reports_every_required_root_child() {
    let fixer = fixer_for(LIBRARY_XSD);
    let result = fixer.validate_str("<?xml version=\"1.0\"?>\n");
    assert!(result
        .errors
        .iter()
        .any(|e| e.kind == ErrorKind::MissingRequiredElement && e.path == "/"));
}

#[test]
fn single_value_enumeration_acts_as_fixed() {
    let xsd = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="status" type="StatusType"/>
        <simpleType name="StatusType">
            <restriction base="string">
                <enumeration value="active"/>
            </restriction>
        </simpleType>
    </schema>
    "#;
    let fixer = fixer_for(xsd);
    assert!(fixer.validate_str("<status>active</status>").valid);
    let outcome = fixer.fix_str("<status>dormant</status>");
    assert!(outcome
        .corrected_xml
        .unwrap()
        .contains("<status>active</status>"));
}

#[test]
fn fix_file_writes_output_and_revalidates(){
    let dir = tempdir().unwrap();
    let xsd_path = dir.path().join("library.xsd");
    let xml_path = dir.path().join("library.xml");
    let out_path = dir.path().join("library.fixed.xml");
    fs::write(&xsd_path, LIBRARY_XSD).unwrap();
    fs::write(&xml_path, "<library><books/></library>").unwrap();

    let fixer = XmlFixer::builder()
        .schema_path(&xsd_path)
        .build()
        .unwrap();
    let result = fixer.fix_file(&xml_path, Some(out_path.as_path())).unwrap();
    assert!(result.success);
    assert!(out_path.exists());

    let written = fs::read_to_string(&out_path).unwrap();
    assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));

    let schema = compile_schema_str(LIBRARY_XSD).unwrap();
    let revalidated = Validator::new(&schema).validate_file(&out_path).unwrap();
    assert!(revalidated.valid, "errors: {:?}", revalidated.errors);
}

#[test]
fn comments_and_processing_instructions_survive_repair() {
    let fixer = fixer_for(LIBRARY_XSD);
    let xml = "<?xml version=\"1.0\"?>\n<!-- export 2024 -->\n<library><!-- inner --><books/></library>";
    let outcome = fixer.fix_str(xml);
    let corrected = outcome.corrected_xml.unwrap();
    assert!(corrected.contains("<!-- export 2024 -->"));
    assert!(corrected.contains("<!-- inner -->"));
}

#[test]
fn failed_actions_leave_residue_but_do_not_fail_the_run() {
    let xsd = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="doc">
            <complexType>
                <sequence>
                    <element name="code" type="CodeType"/>
                    <element name="count" type="int"/>
                </sequence>
            </complexType>
        </element>
        <simpleType name="CodeType">
            <restriction base="string">
                <pattern value="[a-z]+"/>
            </restriction>
        </simpleType>
    </schema>
    "#;
    let fixer = fixer_for(xsd);
    let outcome = fixer.fix_str("<doc><code>NOPE</code><count>x7y</count></doc>");
    assert!(outcome.result.success);
    // the pattern cannot be inverted, the int can be salvaged
    assert_eq!(outcome.result.failed_count(), 1);
    assert!(outcome
        .corrected_xml
        .unwrap()
        .contains("<count>7</count>"));
}
