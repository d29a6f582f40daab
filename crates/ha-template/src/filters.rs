//! Numeric filters for templates
//!
//! State values arrive as strings, so every filter here accepts numbers and
//! numeric strings alike. A value that is not a number passes through
//! unchanged (or falls back to the given default).

use minijinja::value::Value;

/// Helper to convert Value to f64, parsing strings
pub(crate) fn value_to_f64(value: &Value) -> Option<f64> {
    if let Some(text) = value.as_str() {
        return text.trim().parse().ok();
    }
    f64::try_from(value.clone())
        .ok()
        .or_else(|| value.as_i64().map(|i| i as f64))
}

/// `value * amount`, or `value` untouched when it is not a number
pub fn multiply(value: Value, amount: f64) -> Value {
    match value_to_f64(&value) {
        Some(number) => Value::from(number * amount),
        None => value,
    }
}

/// Round to `precision` decimal places (default 0)
pub fn round_filter(value: Value, precision: Option<i32>) -> Value {
    let Some(number) = value_to_f64(&value) else {
        return value;
    };
    let factor = 10f64.powi(precision.unwrap_or(0));
    Value::from((number * factor).round() / factor)
}

/// Convert to float; `default` (or 0.0) when that fails
pub fn to_float(value: Value, default: Option<Value>) -> Value {
    match value_to_f64(&value) {
        Some(number) => Value::from(number),
        None => default.unwrap_or_else(|| Value::from(0.0)),
    }
}

/// Convert to integer, truncating; `default` (or 0) when that fails
pub fn to_int(value: Value, default: Option<Value>) -> Value {
    match value_to_f64(&value) {
        Some(number) => Value::from(number.trunc() as i64),
        None => default.unwrap_or_else(|| Value::from(0)),
    }
}
