//! Per-field pick-lists and numeric inference.
//!
//! Nothing here is cached: callers pass whatever record set is current
//! (all rows, or the rows left by filters already applied) and get an
//! answer for exactly that set.

use std::collections::BTreeSet;

use crate::helpers::numeric::parse_finite;
use crate::processor::{
    Record, Value,
    column::{FieldCategory, FieldDescriptor},
};

/// Sorted, de-duplicated string forms of the non-null values of `field`
pub fn distinct_values<'a, I>(records: I, field: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .map(|record| record.get(field))
        .filter(|value| !value.is_null())
        .map(|value| value.to_text().into_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Whether filters on `field` should compare numerically.
///
/// True for metrics, for names ending in "id", or when the first
/// `sample_size` non-null values all parse as finite numbers. A field with
/// no sampled values is not numeric.
pub fn is_numeric_field<'a, I>(records: I, field: &FieldDescriptor, sample_size: usize) -> bool
where
    I: IntoIterator<Item = &'a Record>,
{
    if field.category == FieldCategory::Metric {
        return true;
    }
    if field.name.trim().to_lowercase().ends_with("id") {
        return true;
    }

    let mut sampled = 0;
    for record in records {
        if sampled == sample_size {
            break;
        }
        let value = record.get(&field.name);
        if is_blank(value) {
            continue;
        }
        sampled += 1;
        if !is_finite_number(value) {
            return false;
        }
    }
    sampled > 0
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Str(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn is_finite_number(value: &Value) -> bool {
    match value {
        Value::Int(_) => true,
        Value::Float(v) => v.is_finite(),
        Value::Str(s) => parse_finite(s).is_some(),
        Value::Bool(_) | Value::Null => false,
    }
}
