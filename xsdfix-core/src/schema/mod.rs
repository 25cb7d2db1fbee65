//! Compiled schema model
//!
//! The schema compiler turns an XSD document into an immutable constraint
//! graph that both the validator and the correction planner can walk. The
//! compiler runs in two passes:
//!
//! - `parser` - pass A: register raw global declarations
//! - `resolve` - pass B: materialize elements, types and content models
//! - `builtins` - built-in type patterns and default values
//!
//! Element nodes live in a flat arena and reference each other by index,
//! so reference cycles in the XSD never become owning cycles here.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{FixError, Result};

pub mod builtins;
mod parser;
mod resolve;

/// Name given to the synthesized root when no global element qualifies
pub const VIRTUAL_ROOT_NAME: &str = "schema_root";

/// Index of an element node in the schema arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaRef(pub(crate) u32);

impl SchemaRef {
    /// Arena index of this reference
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Upper cardinality bound of an element or group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl Default for MaxOccurs {
    fn default() -> Self {
        MaxOccurs::Bounded(1)
    }
}

impl MaxOccurs {
    /// Parse a `maxOccurs` attribute value; unparsable values fall back to 1
    pub fn parse(value: &str) -> Self {
        if value == "unbounded" {
            MaxOccurs::Unbounded
        } else {
            MaxOccurs::Bounded(value.parse().unwrap_or(1))
        }
    }

    /// Whether `count` occurrences stay within this bound
    pub fn admits(self, count: u32) -> bool {
        match self {
            MaxOccurs::Bounded(max) => count <= max,
            MaxOccurs::Unbounded => true,
        }
    }

    /// Bounded value, if any
    pub fn bound(self) -> Option<u32> {
        match self {
            MaxOccurs::Bounded(max) => Some(max),
            MaxOccurs::Unbounded => None,
        }
    }
}

impl std::fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxOccurs::Bounded(max) => write!(f, "{}", max),
            MaxOccurs::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Compositor kind of a content-model group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    Sequence,
    Choice,
    All,
}

/// Member of a content-model group: a child element or a nested group
#[derive(Debug, Clone)]
pub enum GroupMember {
    Element(SchemaRef),
    Group(GroupNode),
}

/// Content-model node of a complex type
#[derive(Debug, Clone)]
pub struct GroupNode {
    pub compositor: Compositor,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub members: Vec<GroupMember>,
}

impl GroupNode {
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            min_occurs: 1,
            max_occurs: MaxOccurs::default(),
            members: Vec::new(),
        }
    }
}

/// Content model of an element
#[derive(Debug, Clone, Default)]
pub enum ContentModel {
    /// No text, no children
    #[default]
    Empty,
    /// Text content of the named simple type
    Simple(String),
    /// Child elements per the group
    Complex(GroupNode),
}

impl ContentModel {
    pub fn is_simple(&self) -> bool {
        matches!(self, ContentModel::Simple(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, ContentModel::Complex(_))
    }
}

/// Facet restricting the value space of a simple type
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Pattern(String),
    Enumeration(Vec<String>),
    MinLength(u32),
    MaxLength(u32),
    MinInclusive(String),
    MaxInclusive(String),
    MinExclusive(String),
    MaxExclusive(String),
    TotalDigits(u32),
    FractionDigits(u32),
    WhiteSpace(String),
}

impl Constraint {
    /// Short facet name used in `schema_rule` texts
    pub fn facet_name(&self) -> &'static str {
        match self {
            Constraint::Pattern(_) => "pattern",
            Constraint::Enumeration(_) => "enumeration",
            Constraint::MinLength(_) => "minLength",
            Constraint::MaxLength(_) => "maxLength",
            Constraint::MinInclusive(_) => "minInclusive",
            Constraint::MaxInclusive(_) => "maxInclusive",
            Constraint::MinExclusive(_) => "minExclusive",
            Constraint::MaxExclusive(_) => "maxExclusive",
            Constraint::TotalDigits(_) => "totalDigits",
            Constraint::FractionDigits(_) => "fractionDigits",
            Constraint::WhiteSpace(_) => "whiteSpace",
        }
    }
}

/// Use constraint of an attribute declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUse {
    #[default]
    Optional,
    Required,
    Prohibited,
}

impl AttributeUse {
    pub fn parse(value: &str) -> Self {
        match value {
            "required" => AttributeUse::Required,
            "prohibited" => AttributeUse::Prohibited,
            _ => AttributeUse::Optional,
        }
    }
}

/// Attribute declaration attached to an element
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    pub name: String,
    pub type_name: String,
    pub usage: AttributeUse,
    pub default: Option<String>,
    pub fixed: Option<String>,
    pub constraints: Vec<Constraint>,
}

impl AttributeDecl {
    /// Fixed wins over default when both are present
    pub fn effective_default(&self) -> Option<&str> {
        self.fixed.as_deref().or(self.default.as_deref())
    }
}

/// Node in the compiled schema graph
#[derive(Debug, Clone)]
pub struct SchemaElement {
    pub name: String,
    pub namespace: Option<String>,
    /// Built-in name, named user type, or the `complexType` sentinel
    pub type_name: String,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub default_value: Option<String>,
    pub fixed_value: Option<String>,
    pub constraints: Vec<Constraint>,
    pub attributes: Vec<AttributeDecl>,
    pub content: ContentModel,
    /// Resolved child references for fast lookup during validation
    pub children: Vec<SchemaRef>,
}

impl SchemaElement {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            type_name: "string".to_string(),
            min_occurs: 1,
            max_occurs: MaxOccurs::default(),
            default_value: None,
            fixed_value: None,
            constraints: Vec::new(),
            attributes: Vec::new(),
            content: ContentModel::Empty,
            children: Vec::new(),
        }
    }

    /// Required means at least one occurrence
    pub fn is_required(&self) -> bool {
        self.min_occurs > 0
    }

    /// `namespace:name` when a namespace is present, plain name otherwise
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    /// Fixed pins the value and wins over default
    pub fn effective_default(&self) -> Option<&str> {
        self.fixed_value.as_deref().or(self.default_value.as_deref())
    }

    /// Enumeration values, if an enumeration facet is present
    pub fn enumeration(&self) -> Option<&[String]> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Enumeration(values) => Some(values.as_slice()),
            _ => None,
        })
    }
}

/// Warning emitted by the compiler's consistency check
#[derive(Debug, Clone)]
pub struct SchemaWarning {
    pub element: String,
    pub message: String,
}

impl std::fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.element, self.message)
    }
}

/// Compiled, immutable schema graph
///
/// Built once per session; every downstream component borrows it. The
/// graph is safe to share across batch worker threads.
#[derive(Debug)]
pub struct Schema {
    elements: Vec<SchemaElement>,
    root: SchemaRef,
    globals: HashMap<String, SchemaRef>,
    target_namespace: Option<String>,
    warnings: Vec<SchemaWarning>,
}

impl Schema {
    pub(crate) fn new(
        elements: Vec<SchemaElement>,
        root: SchemaRef,
        globals: HashMap<String, SchemaRef>,
        target_namespace: Option<String>,
        warnings: Vec<SchemaWarning>,
    ) -> Self {
        Self {
            elements,
            root,
            globals,
            target_namespace,
            warnings,
        }
    }

    /// Root element reference
    pub fn root(&self) -> SchemaRef {
        self.root
    }

    /// Whether the root was synthesized because no global qualified
    pub fn has_virtual_root(&self) -> bool {
        self.element(self.root).name == VIRTUAL_ROOT_NAME
    }

    /// Element node behind a reference
    pub fn element(&self, r: SchemaRef) -> &SchemaElement {
        &self.elements[r.index()]
    }

    /// Look up a named global declaration
    pub fn global(&self, name: &str) -> Option<SchemaRef> {
        self.globals.get(name).copied()
    }

    /// Target namespace of the schema document, if declared
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Warnings from the facet consistency check
    pub fn warnings(&self) -> &[SchemaWarning] {
        &self.warnings
    }

    /// Number of element nodes in the arena
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Resolve `name` among the expanded children of `parent`
    pub fn find_child(&self, parent: SchemaRef, name: &str) -> Option<SchemaRef> {
        self.element(parent)
            .children
            .iter()
            .copied()
            .find(|&c| self.element(c).name == name)
    }
}

/// Compile an XSD file into a schema graph
pub fn compile_schema(path: impl AsRef<Path>) -> Result<Schema> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| FixError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    compile_schema_str(&content)
}

/// Compile an XSD document held in memory
pub fn compile_schema_str(xsd: &str) -> Result<Schema> {
    let raw = parser::parse_declarations(xsd)?;
    resolve::resolve(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_occurs_parsing() {
        assert_eq!(MaxOccurs::parse("unbounded"), MaxOccurs::Unbounded);
        assert_eq!(MaxOccurs::parse("5"), MaxOccurs::Bounded(5));
        assert_eq!(MaxOccurs::parse("garbage"), MaxOccurs::Bounded(1));
    }

    #[test]
    fn max_occurs_admits() {
        assert!(MaxOccurs::Bounded(2).admits(2));
        assert!(!MaxOccurs::Bounded(2).admits(3));
        assert!(MaxOccurs::Unbounded.admits(u32::MAX));
    }

    #[test]
    fn fixed_wins_over_default() {
        let mut elem = SchemaElement::named("status");
        elem.default_value = Some("open".to_string());
        elem.fixed_value = Some("closed".to_string());
        assert_eq!(elem.effective_default(), Some("closed"));
    }

    #[test]
    fn qualified_name_formats() {
        let mut elem = SchemaElement::named("book");
        assert_eq!(elem.qualified_name(), "book");
        elem.namespace = Some("lib".to_string());
        assert_eq!(elem.qualified_name(), "lib:book");
    }
}
