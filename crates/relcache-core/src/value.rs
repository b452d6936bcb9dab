//! Dynamic SQL values for parameter binding.

use serde::{Deserialize, Serialize};

/// A dynamically-typed SQL value.
///
/// Mirrors SQLite's five storage classes. Used for binding statement
/// parameters and as the typed form of engine column reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point
    Real(f64),
    /// Text string
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the storage class name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }

    /// Try to read this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to read this value as an f64. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to read this value as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render this value as the text form stored in the row store and
    /// written to dumps. NULL renders as the empty string.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Real(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(Value::Null.type_name(), "NULL");
        assert_eq!(Value::Integer(1).type_name(), "INTEGER");
        assert_eq!(Value::Real(1.5).type_name(), "REAL");
        assert_eq!(Value::Text("x".to_string()).type_name(), "TEXT");
        assert_eq!(Value::Blob(vec![0]).type_name(), "BLOB");
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::Integer(7).as_i64(), Some(7));
        assert_eq!(Value::Text("7".to_string()).as_i64(), None);
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert_eq!(Value::Text("abc".to_string()).as_text(), Some("abc"));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn render_forms() {
        assert_eq!(Value::Null.render(), "");
        assert_eq!(Value::Integer(-3).render(), "-3");
        assert_eq!(Value::Text("Noun".to_string()).render(), "Noun");
        assert_eq!(Value::Blob(b"raw".to_vec()).render(), "raw");
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(5_i64), Value::Integer(5));
        assert_eq!(Value::from("hi"), Value::Text("hi".to_string()));
        assert_eq!(Value::from(vec![1_u8]), Value::Blob(vec![1]));
    }
}
