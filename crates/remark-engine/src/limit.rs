use serde_json::Value;

/// Truncate an array result to its first `limit` entries, in the
/// original order. Non-array results and absent limits pass through
/// untouched. Never reorders, never samples.
pub fn apply_limit(result: Value, limit: Option<usize>) -> Value {
    match (result, limit) {
        (Value::Array(mut items), Some(n)) => {
            items.truncate(n);
            Value::Array(items)
        }
        (other, _) => other,
    }
}

/// Read an integer `limit` out of raw tool arguments, if present.
pub fn limit_from_args(args: &Value) -> Option<usize> {
    args.get("limit").and_then(Value::as_u64).map(|n| n as usize)
}
