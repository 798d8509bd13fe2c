use serde_json::Value;

/// Field lookup that falls back to a case-insensitive scan when the exact
/// key misses. Isolated here so every decoder in the workspace shares one
/// implementation (spec.md §9 "case-insensitive field lookup").
pub fn get_ci<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = value.as_object()?;
    if let Some(v) = obj.get(key) {
        return Some(v);
    }
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

pub fn get_str_ci<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    get_ci(value, key).and_then(Value::as_str)
}

pub fn get_u64_ci(value: &Value, key: &str) -> Option<u64> {
    get_ci(value, key).and_then(Value::as_u64)
}

pub fn get_bool_ci(value: &Value, key: &str) -> Option<bool> {
    get_ci(value, key).and_then(Value::as_bool)
}
