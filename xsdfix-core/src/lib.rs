//! # xsdfix-core
//!
//! XSD-driven XML validation and repair. This crate compiles an XML
//! Schema into an immutable constraint graph, validates documents
//! against it in a single streaming pass, and turns the resulting error
//! list into an ordered plan of tree edits that is applied, serialized
//! and re-validated.
//!
//! ## Features
//!
//! - **Schema compilation** - elements, complex/simple types, facets,
//!   ordering groups and cardinalities resolved in two passes
//! - **Streaming validation** - located, classified errors over an XML
//!   event stream; a single malformed-XML failure never panics
//! - **Correction planning** - per-error-class strategies, priority
//!   ordering, conflict resolution
//! - **Tree repair** - canonical-path addressing over a mutable
//!   document tree, with comments and processing instructions preserved
//!
//! ## Usage
//!
//! ```ignore
//! use xsdfix_core::XmlFixer;
//!
//! let fixer = XmlFixer::builder()
//!     .schema_path("library.xsd")
//!     .build()?;
//!
//! let report = fixer.validate_file("catalog.xml")?;
//! if !report.valid {
//!     let outcome = fixer.fix_file("catalog.xml", Some("catalog.fixed.xml".as_ref()))?;
//!     println!("applied {} corrections", outcome.applied_count());
//! }
//! ```

pub mod correction;
pub mod error;
pub mod errors;
pub mod schema;
pub mod tree;
pub mod validator;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

pub use correction::{
    ActionType, CorrectionAction, CorrectionGroup, CorrectionPlan, CorrectionResult, Executor,
    Planner,
};
pub use error::{FixError, Result};
pub use errors::{ErrorKind, PriorityClass, Severity, ValidationError};
pub use schema::{compile_schema, compile_schema_str, Schema};
pub use tree::Document;
pub use validator::{ValidationResult, Validator};

/// A repaired document together with its correction report
#[derive(Debug)]
pub struct FixOutcome {
    pub result: CorrectionResult,
    /// Serialized corrected document; `None` when nothing was produced
    pub corrected_xml: Option<String>,
}

/// One validation-and-repair pipeline bound to a compiled schema
///
/// The fixer owns the schema; everything else is created per document.
/// A fixer is safe to share across batch worker threads.
pub struct XmlFixer {
    schema: Schema,
}

impl XmlFixer {
    /// Create a builder for configuring the pipeline
    pub fn builder() -> XmlFixerBuilder {
        XmlFixerBuilder::default()
    }

    /// Wrap an already compiled schema
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate a file against the schema
    pub fn validate_file(&self, path: impl AsRef<Path>) -> Result<ValidationResult> {
        Validator::new(&self.schema).validate_file(path)
    }

    /// Validate a document held in memory
    pub fn validate_str(&self, xml: &str) -> ValidationResult {
        Validator::new(&self.schema).validate_str(xml)
    }

    /// Validate, plan and repair a document held in memory
    pub fn fix_str(&self, xml: &str) -> FixOutcome {
        let started = Instant::now();
        let before = self.validate_str(xml);

        if before.valid {
            return FixOutcome {
                result: CorrectionResult {
                    success: true,
                    no_changes_required: true,
                    message: None,
                    applied: Vec::new(),
                    failed: Vec::new(),
                    time_ms: started.elapsed().as_millis() as u64,
                    before_validation: before,
                    after_validation: None,
                },
                corrected_xml: None,
            };
        }

        let mut doc = match Document::from_str(xml) {
            Ok(doc) => doc,
            Err(e) => {
                return FixOutcome {
                    result: CorrectionResult {
                        success: false,
                        no_changes_required: false,
                        message: Some(format!("failed to load document: {}", e)),
                        applied: Vec::new(),
                        failed: Vec::new(),
                        time_ms: started.elapsed().as_millis() as u64,
                        before_validation: before,
                        after_validation: None,
                    },
                    corrected_xml: None,
                }
            }
        };

        let plan = Planner::new(&self.schema).plan(&before.errors, &doc);
        if plan.iter().next().is_none() {
            return FixOutcome {
                result: CorrectionResult {
                    success: true,
                    no_changes_required: true,
                    message: Some("no correctable errors".to_string()),
                    applied: Vec::new(),
                    failed: Vec::new(),
                    time_ms: started.elapsed().as_millis() as u64,
                    before_validation: before,
                    after_validation: None,
                },
                corrected_xml: None,
            };
        }

        let (applied, failed) = Executor::new(&self.schema).execute(&mut doc, plan);

        let corrected = match doc.to_xml_string() {
            Ok(xml) => xml,
            Err(e) => {
                return FixOutcome {
                    result: CorrectionResult {
                        success: false,
                        no_changes_required: false,
                        message: Some(format!("failed to serialize document: {}", e)),
                        applied,
                        failed,
                        time_ms: started.elapsed().as_millis() as u64,
                        before_validation: before,
                        after_validation: None,
                    },
                    corrected_xml: None,
                }
            }
        };

        // post-correction validation quantifies the improvement
        let after_validation = if applied.is_empty() {
            None
        } else {
            Some(self.validate_str(&corrected))
        };

        info!(
            applied = applied.len(),
            failed = failed.len(),
            errors_before = before.errors.len(),
            errors_after = after_validation.as_ref().map(|r| r.errors.len()),
            "repair finished"
        );

        FixOutcome {
            result: CorrectionResult {
                success: true,
                no_changes_required: applied.is_empty() && failed.is_empty(),
                message: None,
                applied,
                failed,
                time_ms: started.elapsed().as_millis() as u64,
                before_validation: before,
                after_validation,
            },
            corrected_xml: Some(corrected),
        }
    }

    /// Validate, repair and write a file; `output = None` is a dry run
    pub fn fix_file(
        &self,
        input: impl AsRef<Path>,
        output: Option<&Path>,
    ) -> Result<CorrectionResult> {
        let input = input.as_ref();
        let content = fs::read_to_string(input).map_err(|e| FixError::FileRead {
            path: input.to_path_buf(),
            source: e,
        })?;

        let outcome = self.fix_str(&content);
        let mut result = outcome.result;

        if let (Some(corrected), Some(output)) = (&outcome.corrected_xml, output) {
            if result.success {
                if let Err(e) = fs::write(output, corrected) {
                    result.success = false;
                    result.message = Some(
                        FixError::FileWrite {
                            path: output.to_path_buf(),
                            source: e,
                        }
                        .to_string(),
                    );
                }
            }
        }
        Ok(result)
    }
}

/// Builder for [`XmlFixer`]
#[derive(Debug, Default)]
pub struct XmlFixerBuilder {
    schema_path: Option<PathBuf>,
}

impl XmlFixerBuilder {
    /// Path of the XSD to compile
    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    /// Compile the schema and build the pipeline
    pub fn build(self) -> Result<XmlFixer> {
        let path = self.schema_path.ok_or_else(|| {
            FixError::SchemaStructure("no schema path configured".to_string())
        })?;
        let schema = compile_schema(&path)?;
        info!(
            schema = %path.display(),
            elements = schema.element_count(),
            "schema compiled"
        );
        Ok(XmlFixer::new(schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XSD: &str = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="note">
            <complexType>
                <sequence>
                    <element name="to" type="string"/>
                    <element name="body" type="string"/>
                </sequence>
            </complexType>
        </element>
    </schema>
    "#;

    #[test]
    fn valid_input_requires_no_changes() {
        let fixer = XmlFixer::new(compile_schema_str(XSD).unwrap());
        let outcome = fixer.fix_str("<note><to>A</to><body>hi</body></note>");
        assert!(outcome.result.success);
        assert!(outcome.result.no_changes_required);
        assert!(outcome.corrected_xml.is_none());
    }

    #[test]
    fn invalid_input_is_repaired_and_revalidated() {
        let fixer = XmlFixer::new(compile_schema_str(XSD).unwrap());
        let outcome = fixer.fix_str("<note><body>hi</body></note>");
        assert!(outcome.result.success);
        assert!(!outcome.result.no_changes_required);
        assert_eq!(outcome.result.applied_count(), 1);
        let after = outcome.result.after_validation.as_ref().unwrap();
        assert!(after.valid);
        assert!(outcome.corrected_xml.unwrap().contains("<to"));
    }

    #[test]
    fn unloadable_document_fails_the_run() {
        let fixer = XmlFixer::new(compile_schema_str(XSD).unwrap());
        let outcome = fixer.fix_str("<note><to>unclosed");
        assert!(!outcome.result.success);
        assert!(outcome.result.message.is_some());
    }
}
