use std::borrow::Cow;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use thiserror::Error;

use crate::helpers::numeric::parse_finite;
use crate::processor::column::Schema;
use crate::processor::filter::Operator;

pub mod aggregate;
pub mod column;
pub mod config;
pub mod dataset;
pub mod export;
pub mod filter;
pub mod filter_builder;
pub mod pipeline;
pub mod query_builder;
pub mod value_index;

/// Error type used across the crate
///
/// Only loading, configuration and clause construction can fail. Everything
/// that runs on an already loaded dataset degrades to "no match" instead.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Dataset has no field names")]
    EmptySchema,

    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Operator '{operator}' is not valid for a {mode} filter")]
    InvalidOperator {
        operator: Operator,
        mode: &'static str,
    },

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Filter builder step error: {0}")]
    InvalidStep(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Outcome of building a dataset from raw rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_loaded: usize,
    pub errors: Vec<RowError>,
}

/// A source row that was rejected while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based record number in the source, header included
    pub row: usize,
    pub reason: String,
}

/// Scalar cell value of a record
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

pub(crate) static NULL: Value = Value::Null;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric payload of `Int`/`Float` cells. Strings are not numbers here,
    /// even when they would parse as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Coerces the cell to a number. Null, blank, unparsable and non-finite
    /// text ("inf", "NaN") become NaN.
    pub fn to_f64(&self) -> f64 {
        match self {
            Value::Null => f64::NAN,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Str(s) => parse_finite(s).unwrap_or(f64::NAN),
        }
    }

    /// String form used by text filters, search and pick-lists. Null is "".
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Int(v) => Cow::Owned(v.to_string()),
            Value::Float(v) => Cow::Owned(v.to_string()),
            Value::Str(s) => Cow::Borrowed(s.as_str()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One row of a dataset. Values are stored in schema order and are immutable
/// once loaded.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Record { schema, values }
    }

    /// Value of `field`, or Null when the schema has no such field
    pub fn get(&self, field: &str) -> &Value {
        self.schema
            .position(field)
            .and_then(|idx| self.values.get(idx))
            .unwrap_or(&NULL)
    }

    /// Lookup by trimmed, case-insensitive field name
    pub fn get_normalized(&self, key: &str) -> &Value {
        self.schema
            .position_normalized(key)
            .and_then(|idx| self.values.get(idx))
            .unwrap_or(&NULL)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.schema.names().zip(self.values.iter())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values && self.schema.names().eq(other.schema.names())
    }
}

/// Aggregate operations used for chart series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    /// Sum of all numeric values
    Sum,
    /// Count of all rows
    Count,
    /// Average of numeric values
    Avg,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_forms() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Float(100.0).to_text(), "100");
        assert_eq!(Value::Float(1.5).to_text(), "1.5");
        assert_eq!(Value::Int(-3).to_text(), "-3");
        assert_eq!(Value::Bool(true).to_text(), "true");
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Str(" 42 ".into()).to_f64(), 42.0);
        assert!(Value::Str("abc".into()).to_f64().is_nan());
        assert!(Value::Str("".into()).to_f64().is_nan());
        assert!(Value::Null.to_f64().is_nan());
        assert_eq!(Value::Bool(true).to_f64(), 1.0);
    }

    #[test]
    fn test_infinity_text_is_not_a_number() {
        for text in ["inf", "-Infinity", "NaN", "+INF"] {
            assert!(Value::Str(text.into()).to_f64().is_nan(), "{text}");
        }
    }

    #[test]
    fn test_only_int_and_float_are_numbers() {
        assert_eq!(Value::Int(5).as_number(), Some(5.0));
        assert_eq!(Value::Str("5".into()).as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
    }
}
