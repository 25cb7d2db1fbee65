//! Built-in XML Schema types
//!
//! Built-in simple types are validated syntactically through a fixed
//! regex table. Each built-in contributes an implicit pattern constraint
//! to the elements that use it.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::Regex;

/// Anchored syntax patterns for the supported built-in types
const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("string", r"^[\s\S]*$"),
    ("int", r"^-?\d+$"),
    ("integer", r"^-?\d+$"),
    ("long", r"^-?\d+$"),
    ("short", r"^-?\d+$"),
    ("byte", r"^-?\d+$"),
    ("positiveInteger", r"^\d*[1-9]\d*$"),
    ("negativeInteger", r"^-\d*[1-9]\d*$"),
    ("nonNegativeInteger", r"^\d+$"),
    ("nonPositiveInteger", r"^-?\d+$"),
    ("decimal", r"^-?\d+(\.\d+)?$"),
    ("double", r"^-?\d+(\.\d+)?([eE][+-]?\d+)?$"),
    ("float", r"^-?\d+(\.\d+)?([eE][+-]?\d+)?$"),
    ("boolean", r"^(true|false|1|0)$"),
    ("date", r"^\d{4}-\d{2}-\d{2}$"),
    ("time", r"^\d{2}:\d{2}:\d{2}$"),
    ("dateTime", r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}$"),
];

fn builtin_table() -> &'static HashMap<&'static str, Regex> {
    static TABLE: OnceLock<HashMap<&'static str, Regex>> = OnceLock::new();
    TABLE.get_or_init(|| {
        BUILTIN_PATTERNS
            .iter()
            .map(|(name, pattern)| (*name, Regex::new(pattern).expect("builtin pattern")))
            .collect()
    })
}

/// Whether `name` is a supported built-in simple type
pub fn is_builtin(name: &str) -> bool {
    builtin_table().contains_key(local_name(name))
}

/// Syntax pattern of a built-in type, if it has one
pub fn builtin_pattern(name: &str) -> Option<&'static Regex> {
    builtin_table().get(local_name(name))
}

/// Source pattern string of a built-in type, for implicit constraints
pub fn builtin_pattern_source(name: &str) -> Option<&'static str> {
    BUILTIN_PATTERNS
        .iter()
        .find(|(n, _)| *n == local_name(name))
        .map(|(_, p)| *p)
}

/// Type-indexed fallback value used when no schema default applies
pub fn default_for_type(name: &str) -> &'static str {
    match local_name(name) {
        "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "nonPositiveInteger" => "0",
        "positiveInteger" => "1",
        "negativeInteger" => "-1",
        "decimal" | "double" | "float" => "0.0",
        "boolean" => "false",
        "date" => "1970-01-01",
        "time" => "00:00:00",
        "dateTime" => "1970-01-01T00:00:00",
        _ => "",
    }
}

/// Whether values of this type order numerically
pub fn is_numeric(name: &str) -> bool {
    matches!(
        local_name(name),
        "int"
            | "integer"
            | "long"
            | "short"
            | "byte"
            | "positiveInteger"
            | "negativeInteger"
            | "nonNegativeInteger"
            | "nonPositiveInteger"
            | "decimal"
            | "double"
            | "float"
    )
}

/// Whether values of this type are whole numbers
pub fn is_integer(name: &str) -> bool {
    matches!(
        local_name(name),
        "int"
            | "integer"
            | "long"
            | "short"
            | "byte"
            | "positiveInteger"
            | "negativeInteger"
            | "nonNegativeInteger"
            | "nonPositiveInteger"
    )
}

/// Strip a namespace prefix (`xs:int` -> `int`)
pub fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Process-wide cache for facet patterns compiled at validation time
///
/// Facet patterns come from user schemas, so compilation can fail; failed
/// patterns are cached as misses and reported once by the caller.
pub fn cached_regex(pattern: &str) -> Option<Regex> {
    static CACHE: OnceLock<Mutex<HashMap<String, Option<Regex>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    cache
        .entry(pattern.to_string())
        .or_insert_with(|| Regex::new(&anchor(pattern)).ok())
        .clone()
}

/// XSD patterns match the whole value; anchor unless already anchored
fn anchor(pattern: &str) -> String {
    let starts = pattern.starts_with('^');
    let ends = pattern.ends_with('$');
    match (starts, ends) {
        (true, true) => pattern.to_string(),
        (true, false) => format!("{}$", pattern),
        (false, true) => format!("^{}", pattern),
        (false, false) => format!("^(?:{})$", pattern),
    }
}
