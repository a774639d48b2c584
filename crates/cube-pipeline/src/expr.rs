//! Constructors for the aggregation expressions this crate emits.

use cube_api::{field_ref, AccumulatorOp};
use serde_json::{json, Value};

/// Reference to a field or dotted path, e.g. `"$Weight.sum"`.
pub fn reference(path: &str) -> Value {
    Value::String(field_ref(path))
}

/// `{<op>: <operand>}`
pub fn accumulator(op: AccumulatorOp, operand: Value) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(op.operator(), operand);
    Value::Object(map)
}

/// 1 when `field` is truthy, 0 otherwise.
///
/// Missing fields and the values `null`, `0` and `false` are not counted.
pub fn truthy_flag(field: &str) -> Value {
    json!({"$cond": {"if": reference(field), "then": 1, "else": 0}})
}

/// `numerator / denominator`, or `null` when the denominator is zero.
pub fn safe_divide(numerator: Value, denominator: Value) -> Value {
    json!({
        "$cond": [
            {"$eq": [denominator.clone(), 0]},
            null,
            {"$divide": [numerator, denominator]}
        ]
    })
}
