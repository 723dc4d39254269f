//! Key extraction for deletes by identity
//!
//! Recognizes filters that only select entities by key, so a delete can
//! remove those keys directly instead of querying for them first.

use criteria_core::{Expression, Operator, Path, Value};

/// Keys selected by `filter` when it only constrains the identity attribute.
///
/// Recognized shapes are `id = k`, `id IN {k1..kn}` and `OR` of those.
/// Anything else yields `None`; a filter is never partially reduced.
/// Keys are returned in first-seen order without duplicates.
pub fn extract_keys(filter: &Expression, identity: &Path) -> Option<Vec<Value>> {
    let mut keys = Vec::new();
    collect(filter, identity, &mut keys)?;
    Some(keys)
}

fn collect(filter: &Expression, identity: &Path, keys: &mut Vec<Value>) -> Option<()> {
    let call = filter.as_call()?;
    match (call.operator(), call.arguments()) {
        (Operator::Equal, [Expression::Path(path), Expression::Constant(key)])
            if path == identity =>
        {
            if matches!(key.value(), Value::Array(_) | Value::Object(_)) {
                return None;
            }
            push_unique(keys, key.value().clone());
            Some(())
        }
        (Operator::In, [Expression::Path(path), Expression::Constant(set)]) if path == identity => {
            for key in set.value().as_array()? {
                if matches!(key, Value::Null | Value::Array(_) | Value::Object(_)) {
                    return None;
                }
                push_unique(keys, key.clone());
            }
            Some(())
        }
        (Operator::Or, branches) => branches
            .iter()
            .try_for_each(|branch| collect(branch, identity, keys)),
        _ => None,
    }
}

fn push_unique(keys: &mut Vec<Value>, key: Value) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}
