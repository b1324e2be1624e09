//! In-memory tabular data handed to the loader.

use crate::error::{LoadError, Result};

/// A single scalar value in a dataset row.
///
/// Variants cover the column types the loader knows how to bind (see
/// [`crate::typemap`]). Values are transmitted to PostgreSQL as text and
/// cast server-side using the column's resolved descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Text(String),
    Json(serde_json::Value),
    Timestamp(chrono::NaiveDateTime),
}

impl Value {
    /// Render the value as the text form PostgreSQL will cast server-side.
    /// `None` encodes SQL NULL.
    pub fn to_param(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::SmallInt(n) => Some(n.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::BigInt(n) => Some(n.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Json(v) => Some(v.to_string()),
            Value::Timestamp(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        }
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::SmallInt(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::BigInt(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(dt: chrono::NaiveDateTime) -> Self {
        Value::Timestamp(dt)
    }
}

/// An ordered set of named columns plus rows of values.
///
/// Every row has exactly as many values as there are columns; `push_row`
/// rejects anything else.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Create an empty dataset with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a dataset from column names and pre-built rows, validating
    /// the arity of every row.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut ds = Self::new(columns);
        for row in rows {
            ds.push_row(row)?;
        }
        Ok(ds)
    }

    /// Append a row. Fails if the row's length does not match the column
    /// count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(LoadError::RowArity {
                index: self.rows.len(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<String> {
        vec!["id".to_string(), "name".to_string()]
    }

    #[test]
    fn test_push_row_accepts_matching_arity() {
        let mut ds = Dataset::new(cols());
        ds.push_row(vec![Value::Int(1), Value::from("Alice")]).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_push_row_rejects_short_row() {
        let mut ds = Dataset::new(cols());
        let err = ds.push_row(vec![Value::Int(1)]).unwrap_err();
        match err {
            LoadError::RowArity {
                index,
                expected,
                actual,
            } => {
                assert_eq!(index, 0);
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_rows_validates_every_row() {
        let rows = vec![
            vec![Value::Int(1), Value::from("a")],
            vec![Value::Int(2)],
        ];
        assert!(Dataset::from_rows(cols(), rows).is_err());
    }

    #[test]
    fn test_value_to_param() {
        assert_eq!(Value::Null.to_param(), None);
        assert_eq!(Value::SmallInt(7).to_param(), Some("7".to_string()));
        assert_eq!(Value::BigInt(-3).to_param(), Some("-3".to_string()));
        assert_eq!(
            Value::Json(serde_json::json!({"a": 1})).to_param(),
            Some("{\"a\":1}".to_string())
        );
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            Value::Timestamp(dt).to_param(),
            Some("2024-01-01 00:00:00.000000".to_string())
        );
    }
}
