//! Report rendering
//!
//! Validation and fix reports render to text, JSON or HTML. Text goes to
//! the terminal; the other two are for `--report` files consumed by
//! other tooling.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use xsdfix_core::{CorrectionResult, ValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Html,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
        };
        write!(f, "{}", name)
    }
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    file: &'a str,
    valid: bool,
    error_count: usize,
    warning_count: usize,
    time_ms: u64,
    errors: &'a [ValidationError],
    warnings: &'a [ValidationError],
}

#[derive(Serialize)]
struct FixReport<'a> {
    file: &'a str,
    success: bool,
    no_changes_required: bool,
    applied_count: usize,
    failed_count: usize,
    errors_before: usize,
    errors_after: Option<usize>,
    result: &'a CorrectionResult,
}

pub fn render_validation(file: &str, result: &ValidationResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(validation_text(file, result)),
        ReportFormat::Json => {
            let report = ValidationReport {
                file,
                valid: result.valid,
                error_count: result.errors.len(),
                warning_count: result.warnings.len(),
                time_ms: result.time_ms,
                errors: &result.errors,
                warnings: &result.warnings,
            };
            serde_json::to_string_pretty(&report).context("serializing JSON report")
        }
        ReportFormat::Html => Ok(validation_html(file, result)),
    }
}

pub fn render_fix(file: &str, result: &CorrectionResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(fix_text(file, result)),
        ReportFormat::Json => {
            let report = FixReport {
                file,
                success: result.success,
                no_changes_required: result.no_changes_required,
                applied_count: result.applied_count(),
                failed_count: result.failed_count(),
                errors_before: result.before_validation.errors.len(),
                errors_after: result.after_validation.as_ref().map(|r| r.errors.len()),
                result,
            };
            serde_json::to_string_pretty(&report).context("serializing JSON report")
        }
        ReportFormat::Html => Ok(fix_html(file, result)),
    }
}

pub fn write_report(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

fn error_line(error: &ValidationError) -> String {
    let mut line = format!(
        "  [{}:{}] {} at {}",
        error.line, error.column, error.kind, error.path
    );
    if let Some(attr) = &error.attribute_name {
        line.push_str(&format!("@{}", attr));
    }
    if !error.schema_rule.is_empty() {
        line.push_str(&format!(" - {}", error.schema_rule));
    }
    if let Some(actual) = &error.actual_value {
        line.push_str(&format!(" (actual: '{}')", actual));
    }
    line
}

fn validation_text(file: &str, result: &ValidationResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("File: {}\n", file));
    out.push_str(&format!(
        "Result: {} ({} error(s), {} warning(s), {} ms)\n",
        if result.valid { "VALID" } else { "INVALID" },
        result.errors.len(),
        result.warnings.len(),
        result.time_ms
    ));
    if !result.errors.is_empty() {
        out.push_str("Errors:\n");
        for error in &result.errors {
            out.push_str(&error_line(error));
            out.push('\n');
        }
    }
    if !result.warnings.is_empty() {
        out.push_str("Warnings:\n");
        for warning in &result.warnings {
            out.push_str(&error_line(warning));
            out.push('\n');
        }
    }
    out
}

fn fix_text(file: &str, result: &CorrectionResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("File: {}\n", file));
    if result.no_changes_required {
        out.push_str("Result: no changes required\n");
        return out;
    }
    out.push_str(&format!(
        "Result: {} ({} applied, {} failed, {} ms)\n",
        if result.success { "FIXED" } else { "FAILED" },
        result.applied_count(),
        result.failed_count(),
        result.time_ms
    ));
    if let Some(message) = &result.message {
        out.push_str(&format!("Message: {}\n", message));
    }
    out.push_str(&format!(
        "Errors before: {}\n",
        result.before_validation.errors.len()
    ));
    if let Some(after) = &result.after_validation {
        out.push_str(&format!("Errors after: {}\n", after.errors.len()));
    }
    for action in &result.applied {
        out.push_str(&format!(
            "  + {:?} {} {}\n",
            action.action_type,
            action.path,
            action.new_value.as_deref().unwrap_or("")
        ));
    }
    for action in &result.failed {
        out.push_str(&format!(
            "  ! {:?} {} ({})\n",
            action.action_type,
            action.path,
            action.failure_reason.as_deref().unwrap_or("unknown")
        ));
    }
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn validation_html(file: &str, result: &ValidationResult) -> String {
    let mut rows = String::new();
    for error in result.errors.iter().chain(&result.warnings) {
        rows.push_str(&format!(
            "<tr><td>{}:{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            error.line,
            error.column,
            error.kind,
            escape_html(&error.path),
            escape_html(&error.schema_rule)
        ));
    }
    format!(
        "<!DOCTYPE html>\n<html><head><title>Validation report</title></head><body>\n\
         <h1>Validation report</h1>\n\
         <p>File: {} - {} - {} error(s), {} warning(s)</p>\n\
         <table border=\"1\">\n\
         <tr><th>Location</th><th>Kind</th><th>Path</th><th>Rule</th></tr>\n{}\
         </table>\n</body></html>\n",
        escape_html(file),
        if result.valid { "VALID" } else { "INVALID" },
        result.errors.len(),
        result.warnings.len(),
        rows
    )
}

fn fix_html(file: &str, result: &CorrectionResult) -> String {
    let mut rows = String::new();
    for action in result.applied.iter().chain(&result.failed) {
        rows.push_str(&format!(
            "<tr><td>{:?}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            action.action_type,
            escape_html(&action.path),
            escape_html(action.new_value.as_deref().unwrap_or("")),
            escape_html(action.failure_reason.as_deref().unwrap_or("applied"))
        ));
    }
    format!(
        "<!DOCTYPE html>\n<html><head><title>Fix report</title></head><body>\n\
         <h1>Fix report</h1>\n\
         <p>File: {} - {} applied, {} failed</p>\n\
         <table border=\"1\">\n\
         <tr><th>Action</th><th>Path</th><th>New value</th><th>Status</th></tr>\n{}\
         </table>\n</body></html>\n",
        escape_html(file),
        result.applied_count(),
        result.failed_count(),
        rows
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsdfix_core::{compile_schema_str, XmlFixer};

    const XSD: &str = r#"
    <schema xmlns="http://www.w3.org/2001/XMLSchema">
        <element name="note">
            <complexType>
                <sequence>
                    <element name="to" type="string"/>
                </sequence>
            </complexType>
        </element>
    </schema>
    "#;

    #[test]
    fn json_report_is_parseable() {
        let fixer = XmlFixer::new(compile_schema_str(XSD).unwrap());
        let result = fixer.validate_str("<note/>");
        let json = render_validation("note.xml", &result, ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["valid"], false);
        assert_eq!(value["error_count"], 1);
    }

    #[test]
    fn text_report_mentions_locations() {
        let fixer = XmlFixer::new(compile_schema_str(XSD).unwrap());
        let result = fixer.validate_str("<note/>");
        let text = render_validation("note.xml", &result, ReportFormat::Text).unwrap();
        assert!(text.contains("INVALID"));
        assert!(text.contains("MissingRequiredElement"));
    }

    #[test]
    fn html_report_escapes_paths() {
        let fixer = XmlFixer::new(compile_schema_str(XSD).unwrap());
        let result = fixer.validate_str("<note/>");
        let html = render_validation("a<b.xml", &result, ReportFormat::Html).unwrap();
        assert!(html.contains("a&lt;b.xml"));
        assert!(html.contains("<table"));
    }
}
