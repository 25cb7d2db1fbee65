//! Validation error model
//!
//! Typed, immutable error records emitted by the validator and consumed
//! by the correction planner. The kind taxonomy is fixed; the planner
//! dispatches on it directly.

use serde::Serialize;

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// Priority class a correction action belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PriorityClass {
    Critical,
    Structural,
    DataQuality,
    Optional,
}

/// The fixed taxonomy of validation error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    // structural
    MalformedXml,
    MissingRequiredElement,
    InvalidElementOrder,
    UnexpectedElement,
    // cardinality
    TooFewOccurrences,
    TooManyOccurrences,
    // data-type
    InvalidDataType,
    InvalidFormat,
    InvalidValueRange,
    PatternMismatch,
    // attribute
    MissingRequiredAttribute,
    InvalidAttributeValue,
    UnexpectedAttribute,
    // constraint
    SchemaViolation,
    ConstraintViolation,
    // content
    EmptyRequiredContent,
    InvalidContentModel,
    MixedContentError,
    // namespace
    NamespaceError,
    UndefinedPrefix,
    // catch-all
    UnknownError,
}

impl ErrorKind {
    /// Priority class used by the correction planner
    pub fn priority_class(self) -> PriorityClass {
        match self {
            ErrorKind::MalformedXml
            | ErrorKind::MissingRequiredElement
            | ErrorKind::MissingRequiredAttribute => PriorityClass::Critical,
            ErrorKind::InvalidElementOrder
            | ErrorKind::TooFewOccurrences
            | ErrorKind::TooManyOccurrences
            | ErrorKind::EmptyRequiredContent
            | ErrorKind::UnexpectedElement
            | ErrorKind::InvalidContentModel => PriorityClass::Structural,
            ErrorKind::InvalidDataType
            | ErrorKind::InvalidFormat
            | ErrorKind::PatternMismatch
            | ErrorKind::InvalidValueRange
            | ErrorKind::InvalidAttributeValue
            | ErrorKind::UnexpectedAttribute
            | ErrorKind::ConstraintViolation
            | ErrorKind::SchemaViolation => PriorityClass::DataQuality,
            ErrorKind::MixedContentError
            | ErrorKind::NamespaceError
            | ErrorKind::UndefinedPrefix
            | ErrorKind::UnknownError => PriorityClass::Optional,
        }
    }

    /// Numeric priority inside the plan ordering, lower first
    pub fn priority(self) -> u8 {
        match self {
            ErrorKind::MalformedXml => 1,
            ErrorKind::MissingRequiredElement => 2,
            ErrorKind::MissingRequiredAttribute => 3,
            ErrorKind::InvalidElementOrder => 4,
            ErrorKind::TooFewOccurrences => 5,
            ErrorKind::TooManyOccurrences => 6,
            ErrorKind::EmptyRequiredContent => 7,
            ErrorKind::UnexpectedElement => 7,
            ErrorKind::InvalidContentModel => 7,
            ErrorKind::InvalidDataType => 8,
            ErrorKind::InvalidFormat => 9,
            ErrorKind::PatternMismatch => 10,
            ErrorKind::InvalidValueRange => 11,
            ErrorKind::InvalidAttributeValue => 12,
            ErrorKind::UnexpectedAttribute => 12,
            ErrorKind::ConstraintViolation => 12,
            ErrorKind::SchemaViolation => 12,
            ErrorKind::MixedContentError => 13,
            ErrorKind::NamespaceError => 13,
            ErrorKind::UndefinedPrefix => 13,
            ErrorKind::UnknownError => 14,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Immutable record of a single validation finding
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub severity: Severity,
    /// 1-based; -1 when unknown
    pub line: i64,
    /// 1-based; -1 when unknown
    pub column: i64,
    /// Canonical element path, `/name[n]` with `[1]` elided
    pub path: String,
    pub element_name: String,
    pub attribute_name: Option<String>,
    pub actual_value: Option<String>,
    pub expected_value: Option<String>,
    /// Short human description of the violated constraint
    pub schema_rule: String,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, path: impl AsRef<str>, element_name: impl AsRef<str>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            line: -1,
            column: -1,
            path: path.as_ref().to_string(),
            element_name: element_name.as_ref().to_string(),
            attribute_name: None,
            actual_value: None,
            expected_value: None,
            schema_rule: String::new(),
        }
    }

    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn at(mut self, line: i64, column: i64) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn attribute(mut self, name: impl AsRef<str>) -> Self {
        self.attribute_name = Some(name.as_ref().to_string());
        self
    }

    pub fn actual(mut self, value: impl AsRef<str>) -> Self {
        self.actual_value = Some(value.as_ref().to_string());
        self
    }

    pub fn expected(mut self, value: impl AsRef<str>) -> Self {
        self.expected_value = Some(value.as_ref().to_string());
        self
    }

    pub fn rule(mut self, rule: impl AsRef<str>) -> Self {
        self.schema_rule = rule.as_ref().to_string();
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} {} at {}", self.line, self.column, self.kind, self.path)?;
        if let Some(attr) = &self.attribute_name {
            write!(f, "@{}", attr)?;
        }
        if !self.schema_rule.is_empty() {
            write!(f, ": {}", self.schema_rule)?;
        }
        Ok(())
    }
}
