//! Simple-type value validation
//!
//! Checks a text value against its base built-in type and the facet
//! constraints collected by the schema compiler. Violations are returned
//! as data; the validator turns them into located error records.

use crate::errors::ErrorKind;
use crate::schema::builtins;
use crate::schema::Constraint;

/// A single facet violation, not yet located
#[derive(Debug, Clone)]
pub(crate) struct FacetViolation {
    pub kind: ErrorKind,
    pub rule: String,
    pub expected: Option<String>,
}

/// Apply a whiteSpace facet the way XSD processors do
pub(crate) fn apply_whitespace(value: &str, constraints: &[Constraint]) -> String {
    let mode = constraints.iter().find_map(|c| match c {
        Constraint::WhiteSpace(mode) => Some(mode.as_str()),
        _ => None,
    });
    match mode {
        Some("replace") => value.replace(['\t', '\n', '\r'], " "),
        Some("collapse") => value.split_whitespace().collect::<Vec<_>>().join(" "),
        _ => value.to_string(),
    }
}

/// Validate a value against its base type and facets
pub(crate) fn check_value(
    value: &str,
    base_type: &str,
    constraints: &[Constraint],
) -> Vec<FacetViolation> {
    let mut violations = Vec::new();
    let value = apply_whitespace(value, constraints);
    let value = value.as_str();

    if let Some(pattern) = builtins::builtin_pattern(base_type) {
        if !pattern.is_match(value) {
            let kind = match builtins::local_name(base_type) {
                "date" | "time" | "dateTime" => ErrorKind::InvalidFormat,
                _ => ErrorKind::InvalidDataType,
            };
            violations.push(FacetViolation {
                kind,
                rule: format!("value does not conform to type '{}'", base_type),
                expected: Some(base_type.to_string()),
            });
        }
    }

    let numeric_value: Option<f64> = if builtins::is_numeric(base_type) {
        value.parse().ok()
    } else {
        None
    };

    for constraint in constraints {
        match constraint {
            Constraint::Pattern(pattern) => {
                match builtins::cached_regex(pattern) {
                    Some(re) => {
                        if !re.is_match(value) {
                            violations.push(FacetViolation {
                                kind: ErrorKind::PatternMismatch,
                                rule: format!("value does not match pattern '{}'", pattern),
                                expected: Some(pattern.clone()),
                            });
                        }
                    }
                    None => violations.push(FacetViolation {
                        kind: ErrorKind::SchemaViolation,
                        rule: format!("unsupported pattern '{}'", pattern),
                        expected: None,
                    }),
                }
            }
            Constraint::Enumeration(values) => {
                if !values.iter().any(|v| v == value) {
                    violations.push(FacetViolation {
                        kind: ErrorKind::ConstraintViolation,
                        rule: "enumeration".to_string(),
                        expected: Some(values.join(" | ")),
                    });
                }
            }
            Constraint::MinLength(min) => {
                if (value.chars().count() as u32) < *min {
                    violations.push(FacetViolation {
                        kind: ErrorKind::ConstraintViolation,
                        rule: format!("minLength {}", min),
                        expected: Some(format!("at least {} characters", min)),
                    });
                }
            }
            Constraint::MaxLength(max) => {
                if (value.chars().count() as u32) > *max {
                    violations.push(FacetViolation {
                        kind: ErrorKind::ConstraintViolation,
                        rule: format!("maxLength {}", max),
                        expected: Some(format!("at most {} characters", max)),
                    });
                }
            }
            Constraint::MinInclusive(bound) => {
                if let (Some(v), Ok(b)) = (numeric_value, bound.parse::<f64>()) {
                    if v < b {
                        violations.push(range_violation("minInclusive", bound));
                    }
                }
            }
            Constraint::MaxInclusive(bound) => {
                if let (Some(v), Ok(b)) = (numeric_value, bound.parse::<f64>()) {
                    if v > b {
                        violations.push(range_violation("maxInclusive", bound));
                    }
                }
            }
            Constraint::MinExclusive(bound) => {
                if let (Some(v), Ok(b)) = (numeric_value, bound.parse::<f64>()) {
                    if v <= b {
                        violations.push(range_violation("minExclusive", bound));
                    }
                }
            }
            Constraint::MaxExclusive(bound) => {
                if let (Some(v), Ok(b)) = (numeric_value, bound.parse::<f64>()) {
                    if v >= b {
                        violations.push(range_violation("maxExclusive", bound));
                    }
                }
            }
            Constraint::TotalDigits(max) => {
                let digits = value.chars().filter(|c| c.is_ascii_digit()).count() as u32;
                if numeric_value.is_some() && digits > *max {
                    violations.push(FacetViolation {
                        kind: ErrorKind::ConstraintViolation,
                        rule: format!("totalDigits {}", max),
                        expected: Some(format!("at most {} digits", max)),
                    });
                }
            }
            Constraint::FractionDigits(max) => {
                if let Some(fraction) = value.split('.').nth(1) {
                    let digits = fraction.chars().filter(|c| c.is_ascii_digit()).count() as u32;
                    if numeric_value.is_some() && digits > *max {
                        violations.push(FacetViolation {
                            kind: ErrorKind::ConstraintViolation,
                            rule: format!("fractionDigits {}", max),
                            expected: Some(format!("at most {} fraction digits", max)),
                        });
                    }
                }
            }
            Constraint::WhiteSpace(_) => {} // applied above
        }
    }

    violations
}

/// Whether the empty string is rejected by this type and facet set
pub(crate) fn rejects_empty(base_type: &str, constraints: &[Constraint]) -> bool {
    if let Some(pattern) = builtins::builtin_pattern(base_type) {
        if !pattern.is_match("") {
            return true;
        }
    }
    constraints.iter().any(|c| match c {
        Constraint::MinLength(min) => *min > 0,
        Constraint::Enumeration(values) => !values.iter().any(|v| v.is_empty()),
        Constraint::Pattern(pattern) => builtins::cached_regex(pattern)
            .map(|re| !re.is_match(""))
            .unwrap_or(false),
        _ => false,
    })
}

fn range_violation(facet: &str, bound: &str) -> FacetViolation {
    FacetViolation {
        kind: ErrorKind::InvalidValueRange,
        rule: format!("{} {}", facet, bound),
        expected: Some(bound.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_syntax_violations() {
        let violations = check_value("not_a_number", "int", &[]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ErrorKind::InvalidDataType);
        assert_eq!(violations[0].expected.as_deref(), Some("int"));

        assert!(check_value("42", "int", &[]).is_empty());
    }

    #[test]
    fn date_syntax_reports_format() {
        let violations = check_value("01/15/2024", "date", &[]);
        assert_eq!(violations[0].kind, ErrorKind::InvalidFormat);
    }

    #[test]
    fn enumeration_violation_uses_enumeration_rule() {
        let constraints = vec![Constraint::Enumeration(vec![
            "Engineering".to_string(),
            "Marketing".to_string(),
        ])];
        let violations = check_value("InvalidDepartment", "string", &constraints);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ErrorKind::ConstraintViolation);
        assert_eq!(violations[0].rule, "enumeration");
    }

    #[test]
    fn numeric_range_violations() {
        let constraints = vec![
            Constraint::MinInclusive("18".to_string()),
            Constraint::MaxInclusive("65".to_string()),
        ];
        assert_eq!(
            check_value("15", "int", &constraints)[0].kind,
            ErrorKind::InvalidValueRange
        );
        assert_eq!(
            check_value("70", "int", &constraints)[0].kind,
            ErrorKind::InvalidValueRange
        );
        assert!(check_value("40", "int", &constraints).is_empty());
    }

    #[test]
    fn degenerate_range_admits_single_value() {
        let constraints = vec![
            Constraint::MinInclusive("7".to_string()),
            Constraint::MaxInclusive("7".to_string()),
        ];
        assert!(check_value("7", "int", &constraints).is_empty());
        assert!(!check_value("8", "int", &constraints).is_empty());
    }

    #[test]
    fn length_facets() {
        let constraints = vec![Constraint::MinLength(2), Constraint::MaxLength(4)];
        assert!(!check_value("x", "string", &constraints).is_empty());
        assert!(!check_value("xxxxx", "string", &constraints).is_empty());
        assert!(check_value("xyz", "string", &constraints).is_empty());
    }

    #[test]
    fn digit_facets() {
        let constraints = vec![Constraint::TotalDigits(4), Constraint::FractionDigits(2)];
        assert!(check_value("12.34", "decimal", &constraints).is_empty());
        assert!(!check_value("123.456", "decimal", &constraints).is_empty());
    }

    #[test]
    fn whitespace_collapse_before_checks() {
        let constraints = vec![
            Constraint::WhiteSpace("collapse".to_string()),
            Constraint::Enumeration(vec!["HR".to_string()]),
        ];
        assert!(check_value("  HR \n", "string", &constraints).is_empty());
    }

    #[test]
    fn empty_rejection() {
        assert!(rejects_empty("int", &[]));
        assert!(!rejects_empty("string", &[]));
        assert!(rejects_empty("string", &[Constraint::MinLength(1)]));
        assert!(rejects_empty(
            "string",
            &[Constraint::Enumeration(vec!["a".to_string()])]
        ));
    }
}
