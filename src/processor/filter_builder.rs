//! Step-by-step construction of filter clauses.
//!
//! A [`FilterDraft`] walks column → operator → value. Every transition takes
//! the current draft by reference and returns the next one, so a failed
//! transition leaves the caller's draft untouched. Finished clauses collect
//! in [`PendingFilters`] until they are committed as a whole [`FilterSet`].

use crate::processor::{
    ProcessorError,
    column::FieldDescriptor,
    dataset::Dataset,
    filter::{Combinator, FilterClause, FilterSet, Operand, Operator},
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterDraft {
    #[default]
    PickColumn,
    PickOperator {
        field: FieldDescriptor,
        numeric: bool,
    },
    PickValue {
        field: FieldDescriptor,
        numeric: bool,
        operator: Operator,
        operand: Option<Operand>,
    },
}

impl FilterDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1-based step index for display
    pub fn step(&self) -> u8 {
        match self {
            Self::PickColumn => 1,
            Self::PickOperator { .. } => 2,
            Self::PickValue { .. } => 3,
        }
    }

    /// Picks the column; numeric mode is inferred from `dataset` here and
    /// stays fixed for the clause.
    pub fn pick_column(&self, dataset: &Dataset, field: &str) -> Result<Self, ProcessorError> {
        let field = dataset.get_field(field)?.clone();
        let numeric = dataset.is_numeric_field(&field);
        self.pick_column_with_mode(field, numeric)
    }

    pub fn pick_column_with_mode(
        &self,
        field: FieldDescriptor,
        numeric: bool,
    ) -> Result<Self, ProcessorError> {
        match self {
            Self::PickColumn => Ok(Self::PickOperator { field, numeric }),
            _ => Err(self.wrong_step("pick a column")),
        }
    }

    pub fn pick_operator(&self, operator: Operator) -> Result<Self, ProcessorError> {
        match self {
            Self::PickOperator { field, numeric } => {
                if !operator.valid_for(*numeric) {
                    return Err(ProcessorError::InvalidOperator {
                        operator,
                        mode: if *numeric { "numeric" } else { "text" },
                    });
                }
                Ok(Self::PickValue {
                    field: field.clone(),
                    numeric: *numeric,
                    operator,
                    operand: None,
                })
            }
            _ => Err(self.wrong_step("pick an operator")),
        }
    }

    /// Operators selectable at the current step, empty outside step 2
    pub fn available_operators(&self) -> &'static [Operator] {
        match self {
            Self::PickOperator { numeric, .. } => Operator::for_mode(*numeric),
            _ => &[],
        }
    }

    pub fn set_operand(&self, operand: Operand) -> Result<Self, ProcessorError> {
        match self {
            Self::PickValue {
                field,
                numeric,
                operator,
                ..
            } => Ok(Self::PickValue {
                field: field.clone(),
                numeric: *numeric,
                operator: *operator,
                operand: Some(operand),
            }),
            _ => Err(self.wrong_step("set a value")),
        }
    }

    /// Adds `value` to a multi-select operand, or removes it if present
    pub fn toggle_value(&self, value: &str) -> Result<Self, ProcessorError> {
        let Self::PickValue { operand, .. } = self else {
            return Err(self.wrong_step("select a value"));
        };

        let mut selected = match operand {
            Some(Operand::Set(set)) => set.clone(),
            Some(Operand::Single(single)) => [single.clone()].into(),
            None => Default::default(),
        };
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
        self.set_operand(Operand::Set(selected))
    }

    /// Steps back one stage, discarding what that stage chose
    pub fn back(&self) -> Self {
        match self {
            Self::PickColumn | Self::PickOperator { .. } => Self::PickColumn,
            Self::PickValue { field, numeric, .. } => Self::PickOperator {
                field: field.clone(),
                numeric: *numeric,
            },
        }
    }

    pub fn finish(&self) -> Result<FilterClause, ProcessorError> {
        match self {
            Self::PickValue {
                field,
                numeric,
                operator,
                operand: Some(operand),
            } => FilterClause::new(field.clone(), *operator, operand.clone(), *numeric),
            Self::PickValue { operand: None, .. } => {
                Err(ProcessorError::InvalidStep("no value selected".into()))
            }
            _ => Err(self.wrong_step("finish")),
        }
    }

    fn wrong_step(&self, action: &str) -> ProcessorError {
        ProcessorError::InvalidStep(format!("cannot {action} at step {}", self.step()))
    }
}

/// Clauses being assembled before they replace the active filter set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFilters {
    clauses: Vec<FilterClause>,
    combinator: Combinator,
}

impl PendingFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the currently active set
    pub fn from_active(active: &FilterSet) -> Self {
        Self {
            clauses: active.clauses().to_vec(),
            combinator: active.combinator(),
        }
    }

    pub fn push(&mut self, clause: FilterClause) {
        self.clauses.push(clause);
    }

    pub fn remove(&mut self, idx: usize) -> Option<FilterClause> {
        (idx < self.clauses.len()).then(|| self.clauses.remove(idx))
    }

    pub fn clear(&mut self) {
        self.clauses.clear();
    }

    pub fn set_combinator(&mut self, combinator: Combinator) {
        self.combinator = combinator;
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn commit(&self) -> FilterSet {
        FilterSet::new(self.clauses.clone(), self.combinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::config::EngineConfig;

    fn make_dataset() -> Dataset {
        let csv = "creative_id,network,spend\n1,Meta,10\n2,Google,20\n";
        Dataset::from_csv_str(csv, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_walks_all_steps() {
        let dataset = make_dataset();
        let draft = FilterDraft::new();
        assert_eq!(draft.step(), 1);

        let draft = draft.pick_column(&dataset, "spend").unwrap();
        assert_eq!(draft.step(), 2);
        assert_eq!(draft.available_operators(), Operator::NUMERIC);

        let draft = draft.pick_operator(Operator::GreaterThan).unwrap();
        let clause = draft
            .set_operand(Operand::number(15.0))
            .unwrap()
            .finish()
            .unwrap();
        assert!(clause.numeric);
        assert_eq!(FilterSet::all(vec![clause]).apply(dataset.records()), vec![1]);
    }

    #[test]
    fn test_text_column_offers_text_operators() {
        let dataset = make_dataset();
        let draft = FilterDraft::new().pick_column(&dataset, "network").unwrap();
        assert_eq!(draft.available_operators(), Operator::TEXT);
        assert!(matches!(
            draft.pick_operator(Operator::Equals),
            Err(ProcessorError::InvalidOperator { .. })
        ));
        // failed transition leaves the draft usable
        assert!(draft.pick_operator(Operator::Is).is_ok());
    }

    #[test]
    fn test_toggle_builds_multi_select() {
        let dataset = make_dataset();
        let draft = FilterDraft::new()
            .pick_column(&dataset, "network")
            .unwrap()
            .pick_operator(Operator::Is)
            .unwrap()
            .toggle_value("Meta")
            .unwrap()
            .toggle_value("Google")
            .unwrap()
            .toggle_value("Meta")
            .unwrap();
        let clause = draft.finish().unwrap();
        assert_eq!(clause.operand, Operand::set(["Google"]));
    }

    #[test]
    fn test_out_of_order_transitions() {
        let draft = FilterDraft::new();
        assert!(matches!(
            draft.pick_operator(Operator::Is),
            Err(ProcessorError::InvalidStep(_))
        ));
        assert!(matches!(draft.finish(), Err(ProcessorError::InvalidStep(_))));

        let dataset = make_dataset();
        let draft = draft
            .pick_column(&dataset, "network")
            .unwrap()
            .pick_operator(Operator::Contains)
            .unwrap();
        assert!(matches!(draft.finish(), Err(ProcessorError::InvalidStep(_))));
        assert!(draft.pick_column(&dataset, "spend").is_err());
        assert!(matches!(
            FilterDraft::new().pick_column(&dataset, "nope"),
            Err(ProcessorError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_back_discards_stage() {
        let field = FieldDescriptor::new("network", crate::processor::column::FieldCategory::Dimension);
        let draft = FilterDraft::new()
            .pick_column_with_mode(field, false)
            .unwrap()
            .pick_operator(Operator::Is)
            .unwrap();
        let back = draft.back();
        assert_eq!(back.step(), 2);
        assert_eq!(back.back(), FilterDraft::PickColumn);
    }

    #[test]
    fn test_pending_commit_is_atomic_copy() {
        let dataset = make_dataset();
        let clause = FilterDraft::new()
            .pick_column(&dataset, "network")
            .unwrap()
            .pick_operator(Operator::Is)
            .unwrap()
            .set_operand(Operand::from("meta"))
            .unwrap()
            .finish()
            .unwrap();

        let mut pending = PendingFilters::new();
        pending.push(clause.clone());
        pending.set_combinator(Combinator::Or);
        let committed = pending.commit();

        pending.push(clause);
        assert_eq!(committed.len(), 1);
        assert_eq!(committed.combinator(), Combinator::Or);
        assert_eq!(PendingFilters::from_active(&committed).clauses().len(), 1);
        assert!(pending.remove(5).is_none());
        assert!(pending.remove(0).is_some());
    }
}
