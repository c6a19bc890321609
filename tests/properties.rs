use creative_query::{
    Combinator, Dataset, EngineConfig, FieldCategory, FieldDescriptor, FilterClause, FilterSet,
    Operator, SortSpec, Value, classify, paginate, sort,
};
use creative_query::processor::pipeline::compare_values;
use proptest::prelude::*;
use proptest::test_runner::Config;
use std::cmp::Ordering;

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (-50_i64..50).prop_map(Value::Int),
        (-50.0_f64..50.0).prop_map(Value::Float),
        // integral floats tie with ints
        (-5_i64..5).prop_map(|v| Value::Float(v as f64)),
        "[a-cA-C]{0,3}".prop_map(Value::Str),
    ]
}

fn dataset() -> impl Strategy<Value = Dataset> {
    prop::collection::vec((cell(), cell()), 0..40).prop_map(|rows| {
        let rows = rows.into_iter().map(|(a, b)| vec![a, b]).collect();
        Dataset::from_rows(&["network", "clicks"], rows, &EngineConfig::default())
            .expect("two distinct headers")
    })
}

// words plus the spellings float parsers read as non-finite
fn non_numeric_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{0,5}",
        prop::sample::select(vec!["inf", "-inf", "+Infinity", "-Infinity", "INF", "NaN", "nan"])
            .prop_map(String::from),
    ]
}

fn numeric_operator() -> impl Strategy<Value = Operator> {
    prop::sample::select(Operator::NUMERIC.to_vec())
}

fn text_operator() -> impl Strategy<Value = Operator> {
    prop::sample::select(Operator::TEXT.to_vec())
}

fn clause() -> impl Strategy<Value = FilterClause> {
    prop_oneof![
        (numeric_operator(), -50.0_f64..50.0).prop_map(|(op, v)| {
            let field = FieldDescriptor::new("clicks", FieldCategory::Metric);
            FilterClause::numeric(field, op, v).expect("numeric operator")
        }),
        (text_operator(), "[a-c]{0,2}").prop_map(|(op, v)| {
            let field = FieldDescriptor::new("network", FieldCategory::Dimension);
            FilterClause::text(field, op, v).expect("text operator")
        }),
    ]
}

proptest! {
    #![proptest_config(Config::with_cases(128))]

    #[test]
    fn classify_is_deterministic(names in prop::collection::vec("[a-z_]{1,12}", 0..12)) {
        prop_assert_eq!(classify(&names), classify(&names));
    }

    #[test]
    fn filtering_own_output_is_stable(
        dataset in dataset(),
        clauses in prop::collection::vec(clause(), 0..4),
        or in any::<bool>(),
    ) {
        let combinator = if or { Combinator::Or } else { Combinator::And };
        let filter_set = FilterSet::new(clauses, combinator);
        let once = filter_set.apply(dataset.records());
        let twice = filter_set.apply_rows(dataset.records(), &once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn single_clause_ignores_combinator(dataset in dataset(), clause in clause()) {
        let and = FilterSet::all(vec![clause.clone()]).apply(dataset.records());
        let or = FilterSet::any(vec![clause]).apply(dataset.records());
        prop_assert_eq!(and, or);
    }

    #[test]
    fn numeric_filters_skip_non_numbers(
        text in non_numeric_text(),
        op in numeric_operator(),
        operand in -50.0_f64..50.0,
        null in any::<bool>(),
    ) {
        let value = if null { Value::Null } else { Value::Str(text) };
        let dataset = Dataset::from_rows(&["clicks"], vec![vec![value]], &EngineConfig::default())
            .expect("one header");
        let field = FieldDescriptor::new("clicks", FieldCategory::Metric);
        let clause = FilterClause::numeric(field, op, operand).expect("numeric operator");
        prop_assert!(!clause.matches(&dataset.records()[0]));
    }

    #[test]
    fn sort_keeps_ties_in_input_order(dataset in dataset(), desc in any::<bool>()) {
        let spec = if desc { SortSpec::desc("clicks") } else { SortSpec::asc("clicks") };
        let rows: Vec<usize> = (0..dataset.row_count()).collect();
        let sorted = sort(dataset.records(), &rows, Some(&spec));

        prop_assert_eq!(sorted.len(), rows.len());
        for pair in sorted.windows(2) {
            let a = dataset.records()[pair[0]].get("clicks");
            let b = dataset.records()[pair[1]].get("clicks");
            match compare_values(a, b, spec.direction) {
                Ordering::Greater => prop_assert!(false, "{a:?} sorted before {b:?}"),
                Ordering::Equal => prop_assert!(pair[0] < pair[1]),
                Ordering::Less => {}
            }
        }
    }

    #[test]
    fn pages_cover_every_row_once(total in 0_usize..120, page_size in 1_usize..30) {
        let rows: Vec<usize> = (0..total).rev().collect();
        let first = paginate(&rows, 1, page_size);
        let mut joined = Vec::new();
        for page_index in 1..=first.total_pages {
            joined.extend(paginate(&rows, page_index, page_size).rows);
        }
        prop_assert_eq!(joined, rows);
    }
}
