//! Value coercion
//!
//! Turns an invalid text value into a syntactically valid representative
//! of its target type. Coercion is best-effort and text-based: digits are
//! salvaged where possible, ranges clamp to their bounds, and every
//! built-in type has a last-resort default. A `None` result means the
//! value could not be coerced and the action should be marked failed.

use std::sync::OnceLock;

use regex::Regex;

use crate::schema::builtins;
use crate::schema::{Constraint, ContentModel, SchemaElement};

struct CoerceRegexes {
    integer: Regex,
    decimal: Regex,
    iso_date: Regex,
    us_date: Regex,
    time: Regex,
    date_time: Regex,
}

fn regexes() -> &'static CoerceRegexes {
    static CACHE: OnceLock<CoerceRegexes> = OnceLock::new();
    CACHE.get_or_init(|| CoerceRegexes {
        integer: Regex::new(r"-?\d+").expect("integer pattern"),
        decimal: Regex::new(r"-?\d+(\.\d+)?").expect("decimal pattern"),
        iso_date: Regex::new(r"\d{4}-\d{2}-\d{2}").expect("iso date pattern"),
        us_date: Regex::new(r"(\d{2})/(\d{2})/(\d{4})").expect("us date pattern"),
        time: Regex::new(r"\d{2}:\d{2}:\d{2}").expect("time pattern"),
        date_time: Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("dateTime pattern"),
    })
}

/// Coerce `value` toward the given base type and facets
pub(crate) fn coerce(value: &str, base_type: &str, constraints: &[Constraint]) -> Option<String> {
    let value = value.trim();

    // an enumeration is decisive regardless of the base type
    if let Some(values) = enumeration_of(constraints) {
        let normalized = values
            .iter()
            .find(|v| v.eq_ignore_ascii_case(value))
            .or_else(|| values.first())?;
        return Some(normalized.clone());
    }

    match builtins::local_name(base_type) {
        "int" | "integer" | "long" | "short" | "byte" | "positiveInteger" | "negativeInteger"
        | "nonNegativeInteger" | "nonPositiveInteger" => {
            Some(coerce_integer(value, base_type, constraints))
        }
        "decimal" | "double" | "float" => Some(coerce_decimal(value, constraints)),
        "boolean" => Some(coerce_boolean(value)),
        "date" => Some(coerce_date(value)),
        "time" => Some(coerce_time(value)),
        "dateTime" => Some(coerce_date_time(value)),
        _ => coerce_string(value, constraints),
    }
}

/// Default-value derivation for generated content, in priority order:
/// fixed, default, first enumeration value, lower range bound, then the
/// type-indexed fallback.
pub(crate) fn default_content(element: &SchemaElement) -> String {
    if let Some(value) = element.effective_default() {
        return value.to_string();
    }
    if let Some(values) = element.enumeration() {
        if let Some(first) = values.first() {
            return first.clone();
        }
    }
    let base = base_type_of(element);
    for constraint in &element.constraints {
        match constraint {
            Constraint::MinInclusive(bound) => return bound.clone(),
            Constraint::MinExclusive(bound) => {
                if builtins::is_integer(base) {
                    if let Ok(v) = bound.parse::<i64>() {
                        return (v + 1).to_string();
                    }
                }
                return bound.clone();
            }
            _ => {}
        }
    }
    builtins::default_for_type(base).to_string()
}

pub(crate) fn base_type_of(element: &SchemaElement) -> &str {
    match &element.content {
        ContentModel::Simple(base) => base,
        _ => &element.type_name,
    }
}

fn enumeration_of(constraints: &[Constraint]) -> Option<&Vec<String>> {
    constraints.iter().find_map(|c| match c {
        Constraint::Enumeration(values) if !values.is_empty() => Some(values),
        _ => None,
    })
}

fn coerce_integer(value: &str, base_type: &str, constraints: &[Constraint]) -> String {
    let extracted = regexes()
        .integer
        .find_iter(value)
        .max_by_key(|m| m.as_str().trim_start_matches('-').len())
        .map(|m| m.as_str().to_string());

    let fallback: i64 = match builtins::local_name(base_type) {
        "positiveInteger" => 1,
        "negativeInteger" => -1,
        _ => 0,
    };
    let mut parsed: i64 = extracted
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback);

    parsed = match builtins::local_name(base_type) {
        "nonNegativeInteger" => parsed.max(0),
        "positiveInteger" => parsed.max(1),
        "nonPositiveInteger" => parsed.min(0),
        "negativeInteger" => parsed.min(-1),
        _ => parsed,
    };

    let (lo, hi) = integer_bounds(constraints);
    if let Some(lo) = lo {
        parsed = parsed.max(lo);
    }
    if let Some(hi) = hi {
        parsed = parsed.min(hi);
    }
    parsed.to_string()
}

/// Inclusive integer bounds; exclusive bounds nudge by one unit
fn integer_bounds(constraints: &[Constraint]) -> (Option<i64>, Option<i64>) {
    let mut lo = None;
    let mut hi = None;
    for constraint in constraints {
        match constraint {
            Constraint::MinInclusive(b) => lo = b.parse().ok().or(lo),
            Constraint::MinExclusive(b) => lo = b.parse::<i64>().ok().map(|v| v + 1).or(lo),
            Constraint::MaxInclusive(b) => hi = b.parse().ok().or(hi),
            Constraint::MaxExclusive(b) => hi = b.parse::<i64>().ok().map(|v| v - 1).or(hi),
            _ => {}
        }
    }
    (lo, hi)
}

fn coerce_decimal(value: &str, constraints: &[Constraint]) -> String {
    let mut text = regexes()
        .decimal
        .find_iter(value)
        .max_by_key(|m| m.as_str().trim_start_matches('-').len())
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "0.0".to_string());

    let fraction_limit = constraints.iter().find_map(|c| match c {
        Constraint::FractionDigits(n) => Some(*n as usize),
        _ => None,
    });
    let total_limit = constraints.iter().find_map(|c| match c {
        Constraint::TotalDigits(n) => Some(*n as usize),
        _ => None,
    });

    if let Some(dot) = text.find('.') {
        let int_part = text[..dot].to_string();
        let fraction = text[dot + 1..].to_string();
        let mut keep = fraction.len();
        if let Some(limit) = fraction_limit {
            keep = keep.min(limit);
        }
        if let Some(limit) = total_limit {
            let int_digits = int_part.trim_start_matches('-').len();
            keep = keep.min(limit.saturating_sub(int_digits));
        }
        text = if keep == 0 {
            int_part
        } else {
            format!("{}.{}", int_part, &fraction[..keep])
        };
    }

    // range clamp: exclusive bounds use the bound itself, no nudge
    if let Ok(parsed) = text.parse::<f64>() {
        for constraint in constraints {
            match constraint {
                Constraint::MinInclusive(b) | Constraint::MinExclusive(b) => {
                    if let Ok(bound) = b.parse::<f64>() {
                        if parsed < bound {
                            return b.clone();
                        }
                    }
                }
                Constraint::MaxInclusive(b) | Constraint::MaxExclusive(b) => {
                    if let Ok(bound) = b.parse::<f64>() {
                        if parsed > bound {
                            return b.clone();
                        }
                    }
                }
                _ => {}
            }
        }
    }
    text
}

fn coerce_boolean(value: &str) -> String {
    let lowered = value.to_ascii_lowercase();
    if lowered.starts_with('t') || lowered == "1" || lowered == "yes" {
        "true".to_string()
    } else {
        "false".to_string()
    }
}

fn coerce_date(value: &str) -> String {
    if let Some(m) = regexes().iso_date.find(value) {
        return m.as_str().to_string();
    }
    if let Some(captures) = regexes().us_date.captures(value) {
        return format!("{}-{}-{}", &captures[3], &captures[1], &captures[2]);
    }
    "1970-01-01".to_string()
}

fn coerce_time(value: &str) -> String {
    regexes()
        .time
        .find(value)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "00:00:00".to_string())
}

fn coerce_date_time(value: &str) -> String {
    if let Some(m) = regexes().date_time.find(value) {
        return m.as_str().to_string();
    }
    let date = regexes()
        .iso_date
        .find(value)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "1970-01-01".to_string());
    let time = regexes()
        .time
        .find(value)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "00:00:00".to_string());
    format!("{}T{}", date, time)
}

/// No general pattern inversion exists; salvage digits when the pattern
/// wants them, otherwise give up.
fn coerce_string(value: &str, constraints: &[Constraint]) -> Option<String> {
    let pattern = constraints.iter().find_map(|c| match c {
        Constraint::Pattern(p) => Some(p.as_str()),
        _ => None,
    })?;
    if !pattern.contains("\\d") {
        return None;
    }
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_without_digits_falls_back_to_zero() {
        assert_eq!(coerce("not_a_number", "int", &[]), Some("0".to_string()));
    }

    #[test]
    fn integer_extracts_longest_run() {
        assert_eq!(coerce("around 1995 or 96", "int", &[]), Some("1995".to_string()));
        assert_eq!(coerce("-42 degrees", "int", &[]), Some("-42".to_string()));
    }

    #[test]
    fn positive_integer_clamps_up() {
        assert_eq!(coerce("-5", "positiveInteger", &[]), Some("1".to_string()));
        assert_eq!(coerce("0", "positiveInteger", &[]), Some("1".to_string()));
        assert_eq!(coerce("-5", "nonNegativeInteger", &[]), Some("0".to_string()));
    }

    #[test]
    fn range_clamps_to_inclusive_bounds() {
        let constraints = vec![
            Constraint::MinInclusive("18".to_string()),
            Constraint::MaxInclusive("65".to_string()),
        ];
        assert_eq!(coerce("15", "int", &constraints), Some("18".to_string()));
        assert_eq!(coerce("70", "int", &constraints), Some("65".to_string()));
        assert_eq!(coerce("40", "int", &constraints), Some("40".to_string()));
    }

    #[test]
    fn exclusive_bounds_nudge_integers() {
        let constraints = vec![Constraint::MinExclusive("0".to_string())];
        assert_eq!(coerce("-3", "int", &constraints), Some("1".to_string()));
    }

    #[test]
    fn decimal_truncates_fraction_digits() {
        let constraints = vec![Constraint::FractionDigits(2)];
        assert_eq!(
            coerce("3.14159", "decimal", &constraints),
            Some("3.14".to_string())
        );
        assert_eq!(coerce("garbage", "decimal", &[]), Some("0.0".to_string()));
    }

    #[test]
    fn boolean_mapping() {
        assert_eq!(coerce("True", "boolean", &[]), Some("true".to_string()));
        assert_eq!(coerce("yes", "boolean", &[]), Some("true".to_string()));
        assert_eq!(coerce("1", "boolean", &[]), Some("true".to_string()));
        assert_eq!(coerce("nope", "boolean", &[]), Some("false".to_string()));
        assert_eq!(coerce("whatever", "boolean", &[]), Some("false".to_string()));
    }

    #[test]
    fn date_extraction_and_conversion() {
        assert_eq!(
            coerce("published 2021-07-14 maybe", "date", &[]),
            Some("2021-07-14".to_string())
        );
        assert_eq!(
            coerce("07/14/2021", "date", &[]),
            Some("2021-07-14".to_string())
        );
        assert_eq!(coerce("someday", "date", &[]), Some("1970-01-01".to_string()));
    }

    #[test]
    fn enumeration_normalizes_case_or_picks_first() {
        let constraints = vec![Constraint::Enumeration(vec![
            "Engineering".to_string(),
            "Marketing".to_string(),
        ])];
        assert_eq!(
            coerce("engineering", "string", &constraints),
            Some("Engineering".to_string())
        );
        assert_eq!(
            coerce("InvalidDepartment", "string", &constraints),
            Some("Engineering".to_string())
        );
    }

    #[test]
    fn pattern_digit_salvage() {
        let constraints = vec![Constraint::Pattern(r"\d+".to_string())];
        assert_eq!(
            coerce("ab12cd34", "string", &constraints),
            Some("1234".to_string())
        );
        assert_eq!(coerce("no digits here", "string", &constraints), None);
    }

    #[test]
    fn plain_string_cannot_be_coerced() {
        assert_eq!(coerce("anything", "string", &[]), None);
    }

    #[test]
    fn default_content_priority() {
        let mut elem = SchemaElement::named("status");
        elem.content = ContentModel::Simple("int".to_string());

        assert_eq!(default_content(&elem), "0");

        elem.constraints = vec![Constraint::MinInclusive("18".to_string())];
        assert_eq!(default_content(&elem), "18");

        elem.constraints = vec![Constraint::Enumeration(vec!["open".to_string()])];
        assert_eq!(default_content(&elem), "open");

        elem.default_value = Some("pending".to_string());
        assert_eq!(default_content(&elem), "pending");

        elem.fixed_value = Some("closed".to_string());
        assert_eq!(default_content(&elem), "closed");
    }
}
