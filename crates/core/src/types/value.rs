use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Sampled Values
// =============================================================================

/// A scalar produced by sampling or expression evaluation.
///
/// Integers and floats are kept apart so that `7 // 2` stays `3` and
/// `10 / 2` becomes `5.0`, matching the arithmetic users expect from a
/// word-problem formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value. Booleans count as 0/1, text has none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(_) => None,
        }
    }

    /// Integer view; floats qualify only when they are integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::Text(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// Convert a JSON scalar. Arrays and objects have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float)),
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                // Strip float noise such as 0.30000000000000004.
                let rounded = (x * 1e10).round() / 1e10;
                if rounded.fract() == 0.0 && rounded.abs() < 9.0e15 {
                    write!(f, "{}", rounded as i64)
                } else {
                    write!(f, "{}", rounded)
                }
            }
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Difficulty profile used when sampling integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Small, round numbers (multiples of 5 up to 30).
    Easy,
    #[default]
    Medium,
    /// Larger numbers that are never multiples of 10.
    Hard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_trims_integral_floats() {
        assert_eq!(Value::Float(5.0).to_string(), "5");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(0.1 + 0.2).to_string(), "0.3");
        assert_eq!(Value::Int(-4).to_string(), "-4");
    }

    #[test]
    fn test_untagged_deserialize() {
        let values: Vec<Value> = serde_json::from_str(r#"[3, 2.5, true, "apple"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Int(3),
                Value::Float(2.5),
                Value::Bool(true),
                Value::Text("apple".into())
            ]
        );
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::Float(4.0).as_i64(), Some(4));
        assert_eq!(Value::Float(4.5).as_i64(), None);
        assert_eq!(Value::Text("x".into()).as_f64(), None);
    }
}
