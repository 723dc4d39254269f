//! Parsed OQL conditions and their evaluation against stored values

use criteria_core::Value;
use regex::Regex;
use std::cmp::Ordering;

/// Condition of a parsed query
#[derive(Debug, Clone)]
pub enum Filter {
    /// No `WHERE` clause (matches everything)
    Empty,

    /// Equality: field = value
    Eq { field: String, value: Value },

    /// Not equal: field != value
    Ne { field: String, value: Value },

    /// Greater than: field > value
    Gt { field: String, value: Value },

    /// Greater than or equal: field >= value
    Gte { field: String, value: Value },

    /// Less than: field < value
    Lt { field: String, value: Value },

    /// Less than or equal: field <= value
    Lte { field: String, value: Value },

    /// In: field IN SET(values)
    In { field: String, values: Vec<Value> },

    /// IS_DEFINED / IS_UNDEFINED
    Defined { field: String, defined: bool },

    /// field = NULL (missing or null)
    IsNull { field: String },

    /// field LIKE pattern, compiled to an anchored regex
    Like { field: String, pattern: Regex },

    /// Logical AND: all conditions must match
    And(Vec<Filter>),

    /// Logical OR: at least one condition must match
    Or(Vec<Filter>),

    /// Logical NOT: condition must not match
    Not(Box<Filter>),
}

impl Filter {
    /// Check whether a stored value satisfies this condition
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Empty => true,

            Filter::Eq { field, value } => lookup(doc, field).map_or(false, |v| equals(v, value)),

            Filter::Ne { field, value } => lookup(doc, field).map_or(true, |v| !equals(v, value)),

            Filter::Gt { field, value } => ordering(doc, field, value) == Some(Ordering::Greater),

            Filter::Gte { field, value } => matches!(
                ordering(doc, field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),

            Filter::Lt { field, value } => ordering(doc, field, value) == Some(Ordering::Less),

            Filter::Lte { field, value } => matches!(
                ordering(doc, field, value),
                Some(Ordering::Less | Ordering::Equal)
            ),

            Filter::In { field, values } => {
                lookup(doc, field).map_or(false, |v| values.iter().any(|candidate| equals(v, candidate)))
            }

            Filter::Defined { field, defined } => lookup(doc, field).is_some() == *defined,

            Filter::IsNull { field } => lookup(doc, field).map_or(true, Value::is_null),

            Filter::Like { field, pattern } => lookup(doc, field)
                .and_then(Value::as_str)
                .map_or(false, |s| pattern.is_match(s)),

            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),

            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),

            Filter::Not(filter) => !filter.matches(doc),
        }
    }
}

/// Resolve a dotted field against a stored value
pub fn lookup<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    let segments: Vec<&str> = field.split('.').collect();
    doc.get_by_path(&segments)
}

fn ordering(doc: &Value, field: &str, value: &Value) -> Option<Ordering> {
    lookup(doc, field)?.compare(value)
}

fn equals(a: &Value, b: &Value) -> bool {
    match a.compare(b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

/// Sort order of two (possibly missing) field values: missing sorts first,
/// comparable values compare as queries do, the rest by type
pub fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.compare(b).unwrap_or_else(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Translate a LIKE pattern (`%`, `_`, `\` escapes) to an anchored regex
pub fn like_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => {
                let escaped = chars.next().unwrap_or('\\');
                re.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
            }
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re)
}
