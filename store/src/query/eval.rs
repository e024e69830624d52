//! In-memory evaluation of compiled document filters.

use serde_json::Value;

/// Whether `doc` satisfies `filter`. Filters are the JSON dialect produced by
/// [`DocFilterBuilder`](super::doc::DocFilterBuilder): field conditions plus
/// `$and` / `$or` combinators. A malformed filter matches nothing.
pub fn matches(filter: &Value, doc: &Value) -> bool {
    let Some(clauses) = filter.as_object() else {
        return false;
    };
    clauses.iter().all(|(key, condition)| match key.as_str() {
        "$and" => condition
            .as_array()
            .is_some_and(|subs| subs.iter().all(|sub| matches(sub, doc))),
        "$or" => condition
            .as_array()
            .is_some_and(|subs| subs.iter().any(|sub| matches(sub, doc))),
        field => {
            let actual = doc.get(field).unwrap_or(&Value::Null);
            field_matches(condition, actual)
        }
    })
}

fn field_matches(condition: &Value, actual: &Value) -> bool {
    let Some(ops) = condition.as_object() else {
        // bare operand means equality
        return equals(condition, actual);
    };
    ops.iter().all(|(op, operand)| match op.as_str() {
        "$eq" => equals(operand, actual),
        "$ne" => !equals(operand, actual),
        "$gt" => compare(actual, operand).is_some_and(|o| o == std::cmp::Ordering::Greater),
        "$gte" => compare(actual, operand).is_some_and(|o| o != std::cmp::Ordering::Less),
        "$lt" => compare(actual, operand).is_some_and(|o| o == std::cmp::Ordering::Less),
        "$lte" => compare(actual, operand).is_some_and(|o| o != std::cmp::Ordering::Greater),
        "$in" => operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| equals(item, actual))),
        "$not" => !field_matches(operand, actual),
        _ => false,
    })
}

/// Equality with numeric widening, so 9 and 9.0 compare equal.
fn equals(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Numbers compare numerically, strings lexicographically; anything else is
/// unordered and fails every range operator.
fn compare(actual: &Value, operand: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (actual.as_f64(), operand.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (actual.as_str(), operand.as_str()) {
        return Some(x.cmp(y));
    }
    None
}
