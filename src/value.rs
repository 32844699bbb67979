//! Dynamic values flowing through the reactive runtime.
//!
//! `Value` mirrors a loosely typed host data model: one numeric type,
//! strings, booleans, arrays, string-keyed objects, `null`, and a distinct
//! `Undefined` sentinel. `Undefined` is what missing path segments, failed
//! compilations, and never-evaluated watchers produce; it is deliberately
//! not the same thing as `Null`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A dynamically typed value.
///
/// # Examples
///
/// ```
/// use filament::Value;
///
/// let n = Value::from(2.5);
/// assert!(n.is_number());
/// assert_eq!(n.to_number(), 2.5);
/// assert!(Value::Undefined.to_number().is_nan());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "serde_json::Value", from = "serde_json::Value")]
pub enum Value {
    /// The empty sentinel: absent properties, no-op accessors.
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Numbers are always double-precision floats.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// String-keyed mapping.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// True for the `Undefined` sentinel.
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// True for explicit `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for booleans.
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// True for numbers.
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// True for strings.
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// True for arrays.
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// True for objects.
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// The boolean payload, if any.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The numeric payload, if any.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The array payload, if any.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// The object payload, if any.
    pub const fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name (also the `typeof` result,
    /// except that `Null` reports "object" there).
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Host-language truthiness: `false`, `0`, `NaN`, `""`, `null`, and
    /// `undefined` are falsy; everything else (including empty arrays and
    /// objects) is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    /// Numeric coercion. `undefined` is NaN, `null` is 0, booleans are 0/1,
    /// strings parse (empty string is 0), a single-element array coerces its
    /// element, everything else is NaN.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(n) => *n,
            Self::String(s) => parse_number_str(s),
            Self::Array(items) => match items.as_slice() {
                [] => 0.0,
                [only] => only.to_number(),
                _ => f64::NAN,
            },
            Self::Object(_) => f64::NAN,
        }
    }
}

/// Numeric coercion of string contents.
fn parse_number_str(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if t == "Infinity" || t == "+Infinity" {
        return f64::INFINITY;
    }
    if t == "-Infinity" {
        return f64::NEG_INFINITY;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Loose equality, used to suppress no-op writes.
///
/// Cross-type numeric coercion applies between numbers, strings, and
/// booleans; `null` and `undefined` equal each other and nothing else.
/// Arrays and objects compared by identity in the source model; two owned
/// composites are therefore never loosely equal.
#[must_use]
pub fn loosely_equals(a: &Value, b: &Value) -> bool {
    use Value::{Bool, Null, Number, String, Undefined};
    match (a, b) {
        (Undefined | Null, Undefined | Null) => true,
        (Undefined | Null, _) | (_, Undefined | Null) => false,
        (Number(x), Number(y)) => x == y,
        (String(x), String(y)) => x == y,
        (Bool(x), Bool(y)) => x == y,
        (Number(x), String(s)) | (String(s), Number(x)) => parse_number_str(s) == *x,
        (Bool(x), other) | (other, Bool(x)) => {
            loosely_equals(&Number(if *x { 1.0 } else { 0.0 }), other)
        }
        _ => false,
    }
}

/// Strict equality, used for watcher change detection.
///
/// No coercion; `NaN` never equals itself; composites never equal
/// (identity semantics, see `loosely_equals`).
#[must_use]
pub fn strictly_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Undefined
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Number(n) => fmt_number(*n, f),
            Self::String(s) => write!(f, "{s}"),
            Self::Array(items) => {
                // Arrays stringify as comma-joined elements.
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match item {
                        Self::Undefined | Self::Null => {}
                        other => write!(f, "{other}")?,
                    }
                }
                Ok(())
            }
            Self::Object(_) => write!(f, "[object Object]"),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_infinite() {
        return write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if n == 0.0 {
        // Canonical zero, so "-0" never leaks into concatenation.
        return write!(f, "0");
    }
    write!(f, "{n}")
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            // JSON has no undefined; both sentinels collapse to null.
            Value::Undefined | Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                // Integral values map back to JSON integers so round-trips
                // through serde_json compare equal.
                if n.is_finite() && n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_991.0 {
                    Self::Number(serde_json::Number::from(n as i64))
                } else {
                    serde_json::Number::from_f64(n).map_or(Self::Null, Self::Number)
                }
            }
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::String("0".into()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::Object(Default::default()).is_truthy());
    }

    #[test]
    fn test_to_number_coercions() {
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::String("  42 ".into()).to_number(), 42.0);
        assert_eq!(Value::String(String::new()).to_number(), 0.0);
        assert_eq!(Value::String("0x10".into()).to_number(), 16.0);
        assert_eq!(Value::String("Infinity".into()).to_number(), f64::INFINITY);
        assert!(Value::String("not a number".into()).to_number().is_nan());
        assert_eq!(Value::Array(vec![]).to_number(), 0.0);
        assert_eq!(Value::Array(vec![Value::Number(5.0)]).to_number(), 5.0);
        assert!(Value::Object(Default::default()).to_number().is_nan());
    }

    #[test]
    fn test_loose_equality() {
        assert!(loosely_equals(&Value::Null, &Value::Undefined));
        assert!(loosely_equals(
            &Value::Number(1.0),
            &Value::String("1".into())
        ));
        assert!(loosely_equals(&Value::Bool(true), &Value::Number(1.0)));
        assert!(loosely_equals(
            &Value::Bool(false),
            &Value::String(String::new())
        ));
        assert!(!loosely_equals(&Value::Null, &Value::Number(0.0)));
        assert!(!loosely_equals(
            &Value::Number(f64::NAN),
            &Value::Number(f64::NAN)
        ));
        // Composites never compare equal (identity semantics).
        assert!(!loosely_equals(
            &Value::Array(vec![]),
            &Value::Array(vec![])
        ));
    }

    #[test]
    fn test_strict_equality() {
        assert!(strictly_equals(&Value::Number(2.0), &Value::Number(2.0)));
        assert!(!strictly_equals(&Value::Null, &Value::Undefined));
        assert!(!strictly_equals(
            &Value::Number(1.0),
            &Value::String("1".into())
        ));
        assert!(!strictly_equals(
            &Value::Number(f64::NAN),
            &Value::Number(f64::NAN)
        ));
        assert!(!strictly_equals(
            &Value::Object(Default::default()),
            &Value::Object(Default::default())
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Number(3.0)), "3");
        assert_eq!(format!("{}", Value::Number(3.5)), "3.5");
        assert_eq!(format!("{}", Value::Number(-0.0)), "0");
        assert_eq!(format!("{}", Value::Number(f64::NAN)), "NaN");
        assert_eq!(format!("{}", Value::Number(f64::INFINITY)), "Infinity");
        assert_eq!(format!("{}", Value::Undefined), "undefined");
        assert_eq!(
            format!(
                "{}",
                Value::Array(vec![Value::Number(1.0), Value::Null, Value::from("x")])
            ),
            "1,,x"
        );
        assert_eq!(
            format!("{}", Value::Object(Default::default())),
            "[object Object]"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let json: serde_json::Value = serde_json::json!({"a": {"b": [1, "two", null, true]}});
        let value = Value::from(json.clone());
        let back: serde_json::Value = value.into();
        assert_eq!(json, back);
    }

    #[test]
    fn test_undefined_serializes_as_null() {
        let json: serde_json::Value = Value::Undefined.into();
        assert!(json.is_null());
    }
}
