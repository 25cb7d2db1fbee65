//! Streaming validator
//!
//! Single-threaded, single-pass walk over the XML event stream. The
//! validator maintains a stack of element contexts mirroring the open
//! elements, tracks occurrence counts per parent, and resolves each
//! element against the compiled schema as it is entered. Errors are
//! collected in document order; nothing short of malformed XML aborts
//! the walk.

mod content_model;
mod facets;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use tracing::debug;

use crate::error::{FixError, Result};
use crate::errors::{ErrorKind, Severity, ValidationError};
use crate::schema::{ContentModel, Schema, SchemaRef};

/// Outcome of one validation run
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub time_ms: u64,
}

impl ValidationResult {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Schema-driven streaming validator
pub struct Validator<'a> {
    schema: &'a Schema,
}

impl<'a> Validator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Validate an XML file on disk
    pub fn validate_file(&self, path: impl AsRef<Path>) -> Result<ValidationResult> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| FixError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(self.validate_str(&content))
    }

    /// Validate an XML document held in memory
    ///
    /// Malformed XML does not produce an `Err`; it surfaces as a fatal
    /// `MalformedXml` record and terminates the walk.
    pub fn validate_str(&self, xml: &str) -> ValidationResult {
        let started = Instant::now();
        let mut walk = Walk::new(self.schema, xml);
        walk.run(xml);

        let valid = walk.errors.is_empty();
        debug!(
            valid,
            errors = walk.errors.len(),
            warnings = walk.warnings.len(),
            "validation finished"
        );
        ValidationResult {
            valid,
            errors: walk.errors,
            warnings: walk.warnings,
            time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Open element on the validation stack
struct ElementContext {
    name: String,
    path: String,
    line: i64,
    column: i64,
    schema_ref: Option<SchemaRef>,
    /// Expanded content model when the element has complex content; the
    /// scaled slot bounds drive the occurrence checks on its children
    content_check: Option<content_model::ContentCheck>,
    text: String,
    child_counts: HashMap<String, u32>,
    observed_children: Vec<String>,
    has_element_children: bool,
}

/// Precomputed line starts for locator lookups
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-based line and column of a byte offset
    fn locate(&self, offset: usize) -> (i64, i64) {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let start = self.line_starts[line - 1];
        (line as i64, (offset - start + 1) as i64)
    }
}

struct Walk<'a> {
    schema: &'a Schema,
    index: LineIndex,
    stack: Vec<ElementContext>,
    /// Namespace prefixes declared per open element
    ns_scopes: Vec<Vec<String>>,
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationError>,
    root_seen: bool,
}

impl<'a> Walk<'a> {
    fn new(schema: &'a Schema, xml: &str) -> Self {
        Self {
            schema,
            index: LineIndex::new(xml),
            stack: Vec::new(),
            ns_scopes: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            root_seen: false,
        }
    }

    fn run(&mut self, xml: &str) {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let (line, column) = self.index.locate(reader.buffer_position() as usize);
                    self.handle_start(&e, line, column);
                }
                Ok(Event::Text(t)) => {
                    if let (Some(ctx), Ok(text)) = (self.stack.last_mut(), t.unescape()) {
                        ctx.text.push_str(&text);
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some(ctx) = self.stack.last_mut() {
                        ctx.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
                Ok(Event::End(_)) => self.handle_end(),
                Ok(Event::Eof) => {
                    self.handle_document_end(reader.buffer_position() as usize);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    let (line, column) = self.index.locate(reader.buffer_position() as usize);
                    let path = self
                        .stack
                        .last()
                        .map(|ctx| ctx.path.clone())
                        .unwrap_or_else(|| "/".to_string());
                    let element = self
                        .stack
                        .last()
                        .map(|ctx| ctx.name.clone())
                        .unwrap_or_default();
                    self.report(
                        ValidationError::new(ErrorKind::MalformedXml, path, element)
                            .at(line, column)
                            .rule(e.to_string()),
                    );
                    break;
                }
            }
            buf.clear();
        }
    }

    fn report(&mut self, error: ValidationError) {
        match error.severity {
            Severity::Error => self.errors.push(error),
            Severity::Warning => self.warnings.push(error),
        }
    }

    fn handle_start(&mut self, e: &BytesStart, line: i64, column: i64) {
        let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let (prefix, local) = match qualified.split_once(':') {
            Some((p, l)) => (Some(p.to_string()), l.to_string()),
            None => (None, qualified.clone()),
        };

        let mut attrs: Vec<(String, String)> = Vec::new();
        for attr in e.attributes().with_checks(false).flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_default();
            attrs.push((key, value));
        }
        let declared: Vec<String> = attrs
            .iter()
            .filter_map(|(k, _)| k.strip_prefix("xmlns:").map(str::to_string))
            .collect();

        // canonical path and schema lookup
        let (path, schema_ref, occurrence, occurrence_bound) = if self.stack.is_empty() {
            self.root_seen = true;
            let path = format!("/{}", local);
            let schema_ref = self.resolve_root(&local, &path, line, column);
            self.check_root_namespace(&attrs, &path, &local, line, column);
            (path, schema_ref, 1, None)
        } else {
            let allowed = self.allowed_children_of_parent();
            let parent = self.stack.last_mut().expect("non-empty stack");
            let count = parent.child_counts.entry(local.clone()).or_insert(0);
            *count += 1;
            let occurrence = *count;
            let path = if occurrence > 1 {
                format!("{}/{}[{}]", parent.path, local, occurrence)
            } else {
                format!("{}/{}", parent.path, local)
            };
            parent.observed_children.push(local.clone());
            parent.has_element_children = true;

            let parent_ref = parent.schema_ref;
            // the content-model slot carries the group-scaled bound
            let occurrence_bound = parent
                .content_check
                .as_ref()
                .and_then(|check| check.max_for(&local));
            let schema_ref = parent_ref.and_then(|p| self.schema.find_child(p, &local));
            if parent_ref.is_some() && schema_ref.is_none() {
                let mut err = ValidationError::new(ErrorKind::UnexpectedElement, &path, &local)
                    .at(line, column)
                    .rule("element not allowed here");
                if !allowed.is_empty() {
                    err = err.expected(allowed.join(" | "));
                }
                self.report(err);
            }
            (path, schema_ref, occurrence, occurrence_bound)
        };

        if let Some(p) = &prefix {
            if p != "xml" && !self.prefix_in_scope(p, &declared) {
                self.report(
                    ValidationError::new(ErrorKind::UndefinedPrefix, &path, &local)
                        .at(line, column)
                        .actual(p.clone())
                        .rule(format!("namespace prefix '{}' is not declared", p)),
                );
            }
        }

        if let Some(max) = occurrence_bound {
            if !max.admits(occurrence) {
                self.report(
                    ValidationError::new(ErrorKind::TooManyOccurrences, &path, &local)
                        .at(line, column)
                        .actual(occurrence.to_string())
                        .expected(max.to_string())
                        .rule(format!("at most {} occurrence(s) allowed", max)),
                );
            }
        }

        if let Some(r) = schema_ref {
            self.check_attributes(r, &attrs, &path, &local, line, column);
        }

        let content_check = schema_ref.and_then(|r| match &self.schema.element(r).content {
            ContentModel::Complex(group) => Some(content_model::expand(self.schema, group)),
            _ => None,
        });

        self.stack.push(ElementContext {
            name: local,
            path,
            line,
            column,
            schema_ref,
            content_check,
            text: String::new(),
            child_counts: HashMap::new(),
            observed_children: Vec::new(),
            has_element_children: false,
        });
        self.ns_scopes.push(declared);
    }

    fn resolve_root(&mut self, local: &str, path: &str, line: i64, column: i64) -> Option<SchemaRef> {
        let root = self.schema.root();
        let resolved = if self.schema.has_virtual_root() {
            self.schema.find_child(root, local)
        } else if self.schema.element(root).name == local {
            Some(root)
        } else {
            None
        };
        if resolved.is_none() {
            let expected = if self.schema.has_virtual_root() {
                self.schema
                    .element(root)
                    .children
                    .iter()
                    .map(|&c| self.schema.element(c).name.clone())
                    .collect::<Vec<_>>()
                    .join(" | ")
            } else {
                self.schema.element(root).name.clone()
            };
            self.report(
                ValidationError::new(ErrorKind::UnexpectedElement, path, local)
                    .at(line, column)
                    .actual(local)
                    .expected(expected)
                    .rule("document root does not match the schema root"),
            );
        }
        resolved
    }

    fn check_root_namespace(
        &mut self,
        attrs: &[(String, String)],
        path: &str,
        local: &str,
        line: i64,
        column: i64,
    ) {
        let Some(tns) = self.schema.target_namespace() else {
            return;
        };
        let declared = attrs.iter().find(|(k, _)| k == "xmlns").map(|(_, v)| v.as_str());
        match declared {
            Some(ns) if ns == tns => {}
            Some(ns) => self.report(
                ValidationError::new(ErrorKind::NamespaceError, path, local)
                    .warning()
                    .at(line, column)
                    .actual(ns)
                    .expected(tns)
                    .rule("namespace does not match the schema target namespace"),
            ),
            None => self.report(
                ValidationError::new(ErrorKind::NamespaceError, path, local)
                    .warning()
                    .at(line, column)
                    .expected(tns)
                    .rule("missing namespace declaration"),
            ),
        }
    }

    fn allowed_children_of_parent(&self) -> Vec<String> {
        self.stack
            .last()
            .and_then(|ctx| ctx.schema_ref)
            .map(|r| {
                self.schema
                    .element(r)
                    .children
                    .iter()
                    .map(|&c| self.schema.element(c).name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn prefix_in_scope(&self, prefix: &str, declared: &[String]) -> bool {
        declared.iter().any(|p| p == prefix)
            || self
                .ns_scopes
                .iter()
                .any(|scope| scope.iter().any(|p| p == prefix))
    }

    fn check_attributes(
        &mut self,
        r: SchemaRef,
        attrs: &[(String, String)],
        path: &str,
        local: &str,
        line: i64,
        column: i64,
    ) {
        let decls = self.schema.element(r).attributes.clone();
        for decl in &decls {
            let value = attrs
                .iter()
                .find(|(k, _)| k == &decl.name)
                .map(|(_, v)| v.as_str());
            match value {
                None => {
                    if decl.usage == crate::schema::AttributeUse::Required {
                        let expected = decl
                            .effective_default()
                            .map(str::to_string)
                            .unwrap_or_else(|| decl.type_name.clone());
                        self.report(
                            ValidationError::new(ErrorKind::MissingRequiredAttribute, path, local)
                                .at(line, column)
                                .attribute(&decl.name)
                                .expected(expected)
                                .rule(format!("required attribute '{}' is missing", decl.name)),
                        );
                    }
                }
                Some(value) => {
                    if decl.usage == crate::schema::AttributeUse::Prohibited {
                        self.report(
                            ValidationError::new(ErrorKind::UnexpectedAttribute, path, local)
                                .at(line, column)
                                .attribute(&decl.name)
                                .actual(value)
                                .rule(format!("attribute '{}' is prohibited", decl.name)),
                        );
                        continue;
                    }
                    if let Some(fixed) = &decl.fixed {
                        if value != fixed {
                            self.report(
                                ValidationError::new(ErrorKind::InvalidAttributeValue, path, local)
                                    .at(line, column)
                                    .attribute(&decl.name)
                                    .actual(value)
                                    .expected(fixed.clone())
                                    .rule(format!("attribute '{}' is fixed", decl.name)),
                            );
                            continue;
                        }
                    }
                    if let Some(violation) =
                        facets::check_value(value, &decl.type_name, &decl.constraints)
                            .into_iter()
                            .next()
                    {
                        let mut err =
                            ValidationError::new(ErrorKind::InvalidAttributeValue, path, local)
                                .at(line, column)
                                .attribute(&decl.name)
                                .actual(value)
                                .rule(violation.rule);
                        if let Some(expected) = violation.expected {
                            err = err.expected(expected);
                        }
                        self.report(err);
                    }
                }
            }
        }
    }

    fn handle_end(&mut self) {
        let Some(ctx) = self.stack.pop() else {
            return;
        };
        self.ns_scopes.pop();

        let Some(r) = ctx.schema_ref else {
            return;
        };
        let element = self.schema.element(r).clone();

        match &element.content {
            ContentModel::Simple(base) => {
                let text = ctx.text.trim();
                if text.is_empty() && !ctx.has_element_children {
                    if element.effective_default().is_none()
                        && facets::rejects_empty(base, &element.constraints)
                    {
                        self.report(
                            ValidationError::new(
                                ErrorKind::EmptyRequiredContent,
                                &ctx.path,
                                &ctx.name,
                            )
                            .at(ctx.line, ctx.column)
                            .expected(base.clone())
                            .rule("element requires non-empty content"),
                        );
                    }
                } else if !text.is_empty() {
                    if let Some(fixed) = &element.fixed_value {
                        if text != fixed {
                            self.report(
                                ValidationError::new(
                                    ErrorKind::ConstraintViolation,
                                    &ctx.path,
                                    &ctx.name,
                                )
                                .at(ctx.line, ctx.column)
                                .actual(text)
                                .expected(fixed.clone())
                                .rule("fixed"),
                            );
                        }
                    }
                    for violation in facets::check_value(text, base, &element.constraints) {
                        let mut err = ValidationError::new(violation.kind, &ctx.path, &ctx.name)
                            .at(ctx.line, ctx.column)
                            .actual(text)
                            .rule(violation.rule);
                        if let Some(expected) = violation.expected {
                            err = err.expected(expected);
                        }
                        self.report(err);
                    }
                }
            }
            ContentModel::Complex(_) => {
                if !ctx.text.trim().is_empty() {
                    self.report(
                        ValidationError::new(ErrorKind::MixedContentError, &ctx.path, &ctx.name)
                            .warning()
                            .at(ctx.line, ctx.column)
                            .actual(ctx.text.trim())
                            .rule("text content in element-only content"),
                    );
                }
                let Some(check) = &ctx.content_check else {
                    return;
                };
                let outcome = content_model::replay(check, &ctx.observed_children);
                let expected_order: Vec<String> = check
                    .specs
                    .iter()
                    .map(|s| s.names.join("|"))
                    .collect();

                for shortfall in outcome.shortfalls {
                    let display_name = shortfall.names.first().cloned().unwrap_or_default();
                    if shortfall.observed == 0 {
                        self.report(
                            ValidationError::new(
                                ErrorKind::MissingRequiredElement,
                                &ctx.path,
                                display_name,
                            )
                            .at(ctx.line, ctx.column)
                            .actual("0")
                            .expected(shortfall.names.join(" | "))
                            .rule(format!(
                                "required element '{}' is missing",
                                shortfall.names.join(" | ")
                            )),
                        );
                    } else {
                        self.report(
                            ValidationError::new(
                                ErrorKind::TooFewOccurrences,
                                &ctx.path,
                                display_name,
                            )
                            .at(ctx.line, ctx.column)
                            .actual(shortfall.observed.to_string())
                            .expected(shortfall.min.to_string())
                            .rule(format!(
                                "at least {} occurrence(s) required",
                                shortfall.min
                            )),
                        );
                    }
                }
                for name in outcome.order_violations {
                    self.report(
                        ValidationError::new(ErrorKind::InvalidElementOrder, &ctx.path, name)
                            .at(ctx.line, ctx.column)
                            .expected(expected_order.join(", "))
                            .rule("child elements out of order"),
                    );
                }
            }
            ContentModel::Empty => {
                if ctx.has_element_children || !ctx.text.trim().is_empty() {
                    self.report(
                        ValidationError::new(ErrorKind::InvalidContentModel, &ctx.path, &ctx.name)
                            .at(ctx.line, ctx.column)
                            .rule("element declares empty content"),
                    );
                }
            }
        }
    }

    fn handle_document_end(&mut self, offset: usize) {
        let (line, column) = self.index.locate(offset.saturating_sub(1));
        if !self.stack.is_empty() {
            let ctx = self.stack.last().expect("non-empty stack");
            let (path, name) = (ctx.path.clone(), ctx.name.clone());
            self.report(
                ValidationError::new(ErrorKind::MalformedXml, path, name)
                    .at(line, column)
                    .rule("unexpected end of document"),
            );
            return;
        }
        if self.root_seen {
            return;
        }
        // empty document body: report the required root content one level up
        let root = self.schema.root();
        if self.schema.has_virtual_root() {
            let required: Vec<String> = self
                .schema
                .element(root)
                .children
                .iter()
                .map(|&c| self.schema.element(c))
                .filter(|e| e.is_required())
                .map(|e| e.name.clone())
                .collect();
            for name in required {
                self.report(
                    ValidationError::new(ErrorKind::MissingRequiredElement, "/", name.clone())
                        .rule(format!("required element '{}' is missing", name)),
                );
            }
        } else {
            let name = self.schema.element(root).name.clone();
            self.report(
                ValidationError::new(ErrorKind::MissingRequiredElement, "/", name.clone())
                    .rule(format!("required element '{}' is missing", name)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compile_schema_str;

    const LIBRARY_XSD: &str = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="library">
            <complexType>
                <sequence>
                    <element name="name" type="string"/>
                    <element name="books" minOccurs="0">
                        <complexType>
                            <sequence>
                                <element name="book" type="string" minOccurs="0" maxOccurs="unbounded"/>
                            </sequence>
                        </complexType>
                    </element>
                    <element name="founded" type="int" minOccurs="0"/>
                </sequence>
            </complexType>
        </element>
    </schema>
    "#;

    fn validate(xsd: &str, xml: &str) -> ValidationResult {
        let schema = compile_schema_str(xsd).unwrap();
        Validator::new(&schema).validate_str(xml)
    }

    #[test]
    fn valid_document_has_no_errors() {
        let result = validate(
            LIBRARY_XSD,
            "<library><name>City Library</name><books><book>Dune</book></books></library>",
        );
        assert!(result.valid, "unexpected errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn missing_required_child_is_reported_on_the_parent() {
        let result = validate(LIBRARY_XSD, "<library><books/></library>");
        assert!(!result.valid);
        let err = result
            .errors
            .iter()
            .find(|e| e.kind == ErrorKind::MissingRequiredElement)
            .unwrap();
        assert_eq!(err.element_name, "name");
        assert_eq!(err.path, "/library");
    }

    #[test]
    fn invalid_int_reports_data_type_with_location() {
        let result = validate(
            LIBRARY_XSD,
            "<library>\n  <name>x</name>\n  <founded>not_a_number</founded>\n</library>",
        );
        let err = result
            .errors
            .iter()
            .find(|e| e.kind == ErrorKind::InvalidDataType)
            .unwrap();
        assert_eq!(err.actual_value.as_deref(), Some("not_a_number"));
        assert_eq!(err.expected_value.as_deref(), Some("int"));
        assert_eq!(err.line, 3);
        assert!(err.path.ends_with("/founded"));
    }

    #[test]
    fn unexpected_element_keeps_walking() {
        let result = validate(
            LIBRARY_XSD,
            "<library><name>x</name><intruder><deep/></intruder></library>",
        );
        let unexpected: Vec<_> = result
            .errors
            .iter()
            .filter(|e| e.kind == ErrorKind::UnexpectedElement)
            .collect();
        // children of unknown elements are walked but not schema-validated
        assert_eq!(unexpected.len(), 1);
        assert_eq!(unexpected[0].element_name, "intruder");
    }

    #[test]
    fn sibling_paths_are_indexed() {
        let xsd = r#"
        <schema xmlns="http://www.w3.org/2001/XMLSchema">
            <element name="shelf">
                <complexType>
                    <sequence>
                        <element name="book" type="string" maxOccurs="2"/>
                    </sequence>
                </complexType>
            </element>
        </schema>
        "#;
        let result = validate(
            xsd,
            "<shelf><book>a</book><book>b</book><book>c</book></shelf>",
        );
        let err = result
            .errors
            .iter()
            .find(|e| e.kind == ErrorKind::TooManyOccurrences)
            .unwrap();
        assert_eq!(err.path, "/shelf/book[3]");
        assert_eq!(err.actual_value.as_deref(), Some("3"));
    }

    #[test]
    fn repeating_group_scales_occurrence_bounds() {
        let xsd = r#"
        <schema xmlns="http://www.w3.org/2001/XMLSchema">
            <element name="log">
                <complexType>
                    <sequence maxOccurs="3">
                        <element name="entry" type="string" maxOccurs="2"/>
                    </sequence>
                </complexType>
            </element>
        </schema>
        "#;
        // six entries sit exactly on the 2 x 3 compounded bound
        let six = format!("<log>{}</log>", "<entry>x</entry>".repeat(6));
        let result = validate(xsd, &six);
        assert!(result.valid, "unexpected errors: {:?}", result.errors);

        let seven = format!("<log>{}</log>", "<entry>x</entry>".repeat(7));
        let result = validate(xsd, &seven);
        let err = result
            .errors
            .iter()
            .find(|e| e.kind == ErrorKind::TooManyOccurrences)
            .unwrap();
        assert_eq!(err.path, "/log/entry[7]");
        assert_eq!(err.expected_value.as_deref(), Some("6"));
    }

    #[test]
    fn malformed_xml_is_fatal_but_reported() {
        let result = validate(LIBRARY_XSD, "<library><name>x</name>");
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::MalformedXml));
    }

    #[test]
    fn empty_body_reports_required_root() {
        let result = validate(LIBRARY_XSD, "<?xml version=\"1.0\"?>\n");
        let err = result
            .errors
            .iter()
            .find(|e| e.kind == ErrorKind::MissingRequiredElement)
            .unwrap();
        assert_eq!(err.path, "/");
        assert_eq!(err.element_name, "library");
    }

    #[test]
    fn attribute_checks() {
        let xsd = r#"
        <schema xmlns="http://www.w3.org/2001/XMLSchema">
            <element name="book">
                <complexType>
                    <sequence>
                        <element name="title" type="string"/>
                    </sequence>
                    <attribute name="isbn" type="string" use="required"/>
                    <attribute name="pages" type="int"/>
                </complexType>
            </element>
        </schema>
        "#;
        let result = validate(xsd, r#"<book pages="many"><title>Dune</title></book>"#);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::MissingRequiredAttribute
                && e.attribute_name.as_deref() == Some("isbn")));
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::InvalidAttributeValue
                && e.attribute_name.as_deref() == Some("pages")));
    }

    #[test]
    fn undefined_prefix_is_reported() {
        let result = validate(
            LIBRARY_XSD,
            "<library><name>x</name><foo:books xmlns:bar=\"urn:b\"/></library>",
        );
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::UndefinedPrefix));
    }

    #[test]
    fn enumeration_violation_has_enumeration_rule() {
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
        let result = validate(
            xsd,
            "<department><name>InvalidDepartment</name></department>",
        );
        let err = result
            .errors
            .iter()
            .find(|e| e.kind == ErrorKind::ConstraintViolation)
            .unwrap();
        assert_eq!(err.schema_rule, "enumeration");
        assert_eq!(err.actual_value.as_deref(), Some("InvalidDepartment"));
    }
}
