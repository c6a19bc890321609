use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::helpers::numeric::parse_finite;
use crate::processor::{ProcessorError, Record, Value, column::FieldDescriptor};

/// Comparison applied by a filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // numeric mode
    Equals,
    LesserThan,
    GreaterThan,
    // text mode
    Is,
    IsNot,
    Contains,
    DoesNotContain,
}

impl Operator {
    pub const NUMERIC: &'static [Operator] = &[Self::Equals, Self::LesserThan, Self::GreaterThan];
    pub const TEXT: &'static [Operator] =
        &[Self::Is, Self::IsNot, Self::Contains, Self::DoesNotContain];

    /// Operators offered for a field in the given mode
    pub fn for_mode(numeric: bool) -> &'static [Operator] {
        if numeric { Self::NUMERIC } else { Self::TEXT }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Equals | Self::LesserThan | Self::GreaterThan)
    }

    pub fn valid_for(self, numeric: bool) -> bool {
        self.is_numeric() == numeric
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::LesserThan => "lesser_than",
            Self::GreaterThan => "greater_than",
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::Contains => "contains",
            Self::DoesNotContain => "does_not_contain",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_lowercase().as_str() {
            "equals" => Self::Equals,
            "lesser_than" => Self::LesserThan,
            "greater_than" => Self::GreaterThan,
            "is" => Self::Is,
            "is_not" => Self::IsNot,
            "contains" => Self::Contains,
            "does_not_contain" => Self::DoesNotContain,
            other => return Err(ProcessorError::UnknownOperator(other.to_string())),
        };
        Ok(op)
    }
}

fn mode_name(numeric: bool) -> &'static str {
    if numeric { "numeric" } else { "text" }
}

/// Right-hand side of a clause: one value, or a multi-select set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Single(String),
    Set(BTreeSet<String>),
}

impl Operand {
    pub fn number(value: f64) -> Self {
        Operand::Single(Value::Float(value).to_text().into_owned())
    }

    pub fn set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Operand::Set(values.into_iter().map(Into::into).collect())
    }

    /// Numeric reading of the operand. Sets only parse when they hold exactly one value.
    fn to_f64(&self) -> f64 {
        let text = match self {
            Operand::Single(s) => Some(s.as_str()),
            Operand::Set(set) if set.len() == 1 => set.iter().next().map(String::as_str),
            Operand::Set(_) => None,
        };
        text.and_then(parse_finite).unwrap_or(f64::NAN)
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Single(v.to_string())
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Single(v)
    }
}

/// A single filter condition.
///
/// `numeric` is fixed when the clause is created and selects which operator
/// family is valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterClause {
    pub field: FieldDescriptor,
    pub operator: Operator,
    pub operand: Operand,
    pub numeric: bool,
}

impl FilterClause {
    /// # Errors
    /// [`ProcessorError::InvalidOperator`] when `operator` does not belong to the mode.
    pub fn new(
        field: FieldDescriptor,
        operator: Operator,
        operand: Operand,
        numeric: bool,
    ) -> Result<Self, ProcessorError> {
        if !operator.valid_for(numeric) {
            return Err(ProcessorError::InvalidOperator {
                operator,
                mode: mode_name(numeric),
            });
        }
        Ok(FilterClause {
            field,
            operator,
            operand,
            numeric,
        })
    }

    pub fn numeric(
        field: FieldDescriptor,
        operator: Operator,
        value: f64,
    ) -> Result<Self, ProcessorError> {
        Self::new(field, operator, Operand::number(value), true)
    }

    pub fn text(
        field: FieldDescriptor,
        operator: Operator,
        operand: impl Into<Operand>,
    ) -> Result<Self, ProcessorError> {
        Self::new(field, operator, operand.into(), false)
    }

    /// Whether the operator belongs to the clause's mode. Clauses built
    /// through [`FilterClause::new`] always are.
    pub fn is_valid(&self) -> bool {
        self.operator.valid_for(self.numeric)
    }

    /// An invalid clause matches nothing; [`FilterSet::apply`] reports it.
    pub fn matches(&self, record: &Record) -> bool {
        if !self.is_valid() {
            return false;
        }

        let value = record.get(&self.field.name);
        if self.numeric {
            matches_numeric(value, self.operator, &self.operand)
        } else {
            matches_text(value, self.operator, &self.operand)
        }
    }
}

/// Evaluates one clause against one record
pub fn matches(record: &Record, clause: &FilterClause) -> bool {
    clause.matches(record)
}

// NaN on either side never matches, including Equals
fn matches_numeric(value: &Value, operator: Operator, operand: &Operand) -> bool {
    let lhs = value.to_f64();
    let rhs = operand.to_f64();
    match operator {
        Operator::Equals => lhs == rhs,
        Operator::LesserThan => lhs < rhs,
        Operator::GreaterThan => lhs > rhs,
        _ => false,
    }
}

fn matches_text(value: &Value, operator: Operator, operand: &Operand) -> bool {
    let haystack = value.to_text().to_lowercase();
    match operand {
        Operand::Single(needle) => {
            let needle = needle.to_lowercase();
            match operator {
                Operator::Is => haystack == needle,
                Operator::IsNot => haystack != needle,
                Operator::Contains => haystack.contains(&needle),
                Operator::DoesNotContain => !haystack.contains(&needle),
                _ => false,
            }
        }
        Operand::Set(options) => {
            let is_member = || options.iter().any(|o| o.to_lowercase() == haystack);
            let any_contained = || options.iter().any(|o| haystack.contains(&o.to_lowercase()));
            match operator {
                Operator::Is => is_member(),
                Operator::IsNot => !is_member(),
                Operator::Contains => any_contained(),
                // none of the options occur
                Operator::DoesNotContain => !any_contained(),
                _ => false,
            }
        }
    }
}

/// How clause results are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// Ordered clauses plus one combinator applied uniformly across them
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FilterSet {
    clauses: Vec<FilterClause>,
    combinator: Combinator,
}

impl FilterSet {
    pub fn new(clauses: Vec<FilterClause>, combinator: Combinator) -> Self {
        Self {
            clauses,
            combinator,
        }
    }

    pub fn all(clauses: Vec<FilterClause>) -> Self {
        Self::new(clauses, Combinator::And)
    }

    pub fn any(clauses: Vec<FilterClause>) -> Self {
        Self::new(clauses, Combinator::Or)
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Copy of this set with `clause` appended
    pub fn with_clause(&self, clause: FilterClause) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.push(clause);
        Self::new(clauses, self.combinator)
    }

    pub fn with_combinator(&self, combinator: Combinator) -> Self {
        Self::new(self.clauses.clone(), combinator)
    }

    pub fn passes(&self, record: &Record) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        match self.combinator {
            Combinator::And => self.clauses.iter().all(|c| c.matches(record)),
            Combinator::Or => self.clauses.iter().any(|c| c.matches(record)),
        }
    }

    // once per evaluation, not once per record
    fn warn_invalid(&self) {
        for clause in self.clauses.iter().filter(|c| !c.is_valid()) {
            warn!(
                field = %clause.field.name,
                operator = %clause.operator,
                mode = mode_name(clause.numeric),
                "Operator not valid for clause mode, treating as no match"
            );
        }
    }

    /// Indices of the passing records, in input order
    pub fn apply(&self, records: &[Record]) -> Vec<usize> {
        if self.clauses.is_empty() {
            return (0..records.len()).collect();
        }
        self.warn_invalid();
        records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| self.passes(record).then_some(i))
            .collect()
    }

    /// Like [`FilterSet::apply`] but restricted to `rows`
    pub fn apply_rows(&self, records: &[Record], rows: &[usize]) -> Vec<usize> {
        self.warn_invalid();
        rows.iter()
            .copied()
            .filter(|&i| records.get(i).is_some_and(|record| self.passes(record)))
            .collect()
    }
}

/// Filters `records` with `filter_set`, returning surviving row indices
pub fn apply(records: &[Record], filter_set: &FilterSet) -> Vec<usize> {
    filter_set.apply(records)
}
