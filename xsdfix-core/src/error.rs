//! Error types for schema compilation and document repair

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for validation and repair operations
pub type Result<T> = std::result::Result<T, FixError>;

/// Errors that can occur while compiling a schema or repairing a document
#[derive(Error, Debug)]
pub enum FixError {
    /// Failed to read a file
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a file
    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XSD schema parsing error
    #[error("XSD schema parsing error: {0}")]
    SchemaParse(String),

    /// Structurally invalid schema (wrong root, malformed declarations)
    #[error("Invalid XSD schema: {0}")]
    SchemaStructure(String),

    /// A type or element reference could not be resolved
    #[error("Unresolved schema reference: '{name}'")]
    UnresolvedReference { name: String },

    /// A canonical document path could not be parsed or resolved
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// Failed to serialize the corrected document
    #[error("Document serialization failed: {0}")]
    Serialize(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FixError>,
    },

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FixError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FixError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<quick_xml::Error> for FixError {
    fn from(err: quick_xml::Error) -> Self {
        FixError::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for FixError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        FixError::XmlParse(err.to_string())
    }
}

impl From<xmltree::ParseError> for FixError {
    fn from(err: xmltree::ParseError) -> Self {
        FixError::XmlParse(err.to_string())
    }
}

impl From<std::str::Utf8Error> for FixError {
    fn from(err: std::str::Utf8Error) -> Self {
        FixError::XmlParse(format!("UTF-8 decoding error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FixError::UnresolvedReference {
            name: "tns:AddressType".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unresolved schema reference: 'tns:AddressType'"
        );
    }

    #[test]
    fn test_with_context() {
        let err = FixError::SchemaStructure("root element is not 'schema'".to_string());
        let err_with_ctx = err.with_context("While compiling 'library.xsd'");

        assert!(err_with_ctx.to_string().contains("While compiling"));
        assert!(err_with_ctx.to_string().contains("root element"));
    }
}
