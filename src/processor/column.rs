use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::processor::ProcessorError;

/// Field names recognised as numeric KPIs
pub const DEFAULT_METRIC_KEYS: &[&str] = &[
    "spend",
    "impressions",
    "clicks",
    "installs",
    "ipm",
    "ctr",
    "cpm",
    "cost_per_click",
    "cost_per_install",
];

/// Semantic category of a field, inferred from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    /// Numeric KPI
    Metric,
    /// Free-text label used to identify creatives
    Tag,
    /// Anything else
    Dimension,
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Metric => "metric",
            Self::Tag => "tag",
            Self::Dimension => "dimension",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub category: FieldCategory,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, category: FieldCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }

    pub fn is_metric(&self) -> bool {
        self.category == FieldCategory::Metric
    }
}

pub fn normalize_field_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Category of a single field name.
///
/// Precedence: metric catalog, then a "tag" substring, then dimension.
/// "cost_tag_id" is therefore a Tag.
pub fn categorize<K: AsRef<str>>(name: &str, metric_keys: &[K]) -> FieldCategory {
    let normalized = normalize_field_name(name);
    if metric_keys
        .iter()
        .any(|key| normalize_field_name(key.as_ref()) == normalized)
    {
        FieldCategory::Metric
    } else if normalized.contains("tag") {
        FieldCategory::Tag
    } else {
        FieldCategory::Dimension
    }
}

/// Classifies field names against [`DEFAULT_METRIC_KEYS`], preserving order
pub fn classify<S: AsRef<str>>(field_names: &[S]) -> Vec<FieldDescriptor> {
    classify_with(field_names, DEFAULT_METRIC_KEYS)
}

pub fn classify_with<S: AsRef<str>, K: AsRef<str>>(
    field_names: &[S],
    metric_keys: &[K],
) -> Vec<FieldDescriptor> {
    field_names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            FieldDescriptor::new(name, categorize(name, metric_keys))
        })
        .collect()
}

/// Ordered, classified field set shared by every record of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    positions: HashMap<String, usize>,
    normalized: HashMap<String, usize>,
}

impl Schema {
    /// Builds a schema from classified fields.
    ///
    /// # Errors
    /// [`ProcessorError::EmptySchema`] for an empty field list,
    /// [`ProcessorError::DuplicateField`] when a name repeats.
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, ProcessorError> {
        if fields.is_empty() {
            return Err(ProcessorError::EmptySchema);
        }

        let mut positions = HashMap::with_capacity(fields.len());
        let mut normalized = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if positions.insert(field.name.clone(), idx).is_some() {
                return Err(ProcessorError::DuplicateField(field.name.clone()));
            }
            // first spelling wins for case-insensitive lookups
            normalized
                .entry(normalize_field_name(&field.name))
                .or_insert(idx);
        }

        Ok(Schema {
            fields,
            positions,
            normalized,
        })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn position_normalized(&self, key: &str) -> Option<usize> {
        self.normalized.get(&normalize_field_name(key)).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.position(name).map(|idx| &self.fields[idx])
    }

    pub fn get_field(&self, name: &str) -> Result<&FieldDescriptor, ProcessorError> {
        self.field(name)
            .ok_or_else(|| ProcessorError::MissingColumn(name.to_string()))
    }

    /// Fields of one category, in header order
    pub fn by_category(&self, category: FieldCategory) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(move |f| f.category == category)
    }
}
