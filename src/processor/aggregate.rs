use std::collections::BTreeMap;

use crate::helpers::numeric::{percent, reduce_f64};
use crate::processor::{AggregateOp, Record, Value};

/// Summed raw metrics of a record set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricTotals {
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub installs: f64,
}

/// Totals plus derived ratios, ready for KPI cards
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub totals: MetricTotals,
    /// clicks / impressions, percent with two decimals or "0"
    pub ctr: String,
    /// installs / clicks, percent with two decimals or "0"
    pub cvr: String,
}

impl Default for MetricSummary {
    fn default() -> Self {
        summarize(MetricTotals::default())
    }
}

// missing or non-numeric cells count as 0
fn metric(record: &Record, key: &str) -> f64 {
    let v = record.get_normalized(key).to_f64();
    if v.is_finite() { v } else { 0.0 }
}

/// Sums spend/impressions/clicks/installs and derives CTR and CVR
pub fn aggregate<'a, I>(records: I) -> MetricSummary
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut totals = MetricTotals::default();
    for record in records {
        totals.spend += metric(record, "spend");
        totals.impressions += metric(record, "impressions");
        totals.clicks += metric(record, "clicks");
        totals.installs += metric(record, "installs");
    }
    summarize(totals)
}

fn summarize(totals: MetricTotals) -> MetricSummary {
    MetricSummary {
        totals,
        ctr: percent(totals.clicks, totals.impressions),
        cvr: percent(totals.installs, totals.clicks),
    }
}

/// One bar/point of a chart series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
    /// Rows that fell into this group
    pub rows: usize,
}

/// Group-by aggregation for charts
///
/// Groups by the text form of `dimension` (null groups under "") and reduces
/// `metric` with `op`. Non-numeric metric cells count as 0 for Sum/Avg and are
/// skipped for Min/Max; a group with nothing left reduces to 0. Points come
/// back ordered by label.
///
/// # Example
/// ```rust
/// # use creative_query::{AggregateOp, Dataset, EngineConfig, group_series};
/// let csv = "network,spend\nMeta,10\nGoogle,5\nMeta,7\n";
/// let dataset = Dataset::from_csv_str(csv, &EngineConfig::default()).unwrap();
/// let series = group_series(dataset.records(), "network", "spend", AggregateOp::Sum);
/// assert_eq!(series[1].label, "Meta");
/// assert_eq!(series[1].value, 17.0);
/// ```
pub fn group_series<'a, I>(records: I, dimension: &str, metric: &str, op: AggregateOp) -> Vec<SeriesPoint>
where
    I: IntoIterator<Item = &'a Record>,
{
    // (numeric values, row count)
    let mut groups: BTreeMap<String, (Vec<f64>, usize)> = BTreeMap::new();

    for record in records {
        let key = record.get(dimension).to_text().into_owned();
        let entry = groups.entry(key).or_default();
        entry.1 += 1;

        let value = match record.get(metric) {
            Value::Null => None,
            v => Some(v.to_f64()).filter(|v| v.is_finite()),
        };
        match (value, op) {
            (Some(v), _) => entry.0.push(v),
            (None, AggregateOp::Sum | AggregateOp::Avg) => entry.0.push(0.0),
            (None, _) => {}
        }
    }

    groups
        .into_iter()
        .map(|(label, (values, rows))| {
            let value = match op {
                AggregateOp::Count => rows as f64,
                _ => reduce_f64(&values, op),
            };
            SeriesPoint { label, value, rows }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{config::EngineConfig, dataset::Dataset};

    fn make_dataset(csv: &str) -> Dataset {
        Dataset::from_csv_str(csv, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_totals_and_ratios() {
        let dataset = make_dataset(
            "spend,impressions,clicks,installs\n100,1000,50,5\n200,2000,100,20\n",
        );
        let summary = aggregate(dataset.records());
        assert_eq!(
            summary.totals,
            MetricTotals {
                spend: 300.0,
                impressions: 3000.0,
                clicks: 150.0,
                installs: 25.0
            }
        );
        assert_eq!(summary.ctr, "5.00");
        assert_eq!(summary.cvr, "16.67");
    }

    #[test]
    fn test_empty_input_is_zero_safe() {
        let summary = aggregate(std::iter::empty());
        assert_eq!(summary.totals, MetricTotals::default());
        assert_eq!(summary.ctr, "0");
        assert_eq!(summary.cvr, "0");
        assert_eq!(summary, MetricSummary::default());
    }

    #[test]
    fn test_missing_and_text_cells_count_as_zero() {
        let dataset = make_dataset("Spend,Clicks,network\n10,n/a,Meta\n,4,Meta\n");
        let summary = aggregate(dataset.records());
        assert_eq!(summary.totals.spend, 10.0);
        assert_eq!(summary.totals.clicks, 4.0);
        assert_eq!(summary.totals.impressions, 0.0);
        assert_eq!(summary.ctr, "0");
        assert_eq!(summary.cvr, "0.00");
    }

    #[test]
    fn test_group_series_ops() {
        let dataset = make_dataset("network,spend\nMeta,10\nGoogle,\nMeta,30\nGoogle,4\n,1\n");
        let series = |op| group_series(dataset.records(), "network", "spend", op);

        let sums = series(AggregateOp::Sum);
        let labels: Vec<_> = sums.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["", "Google", "Meta"]);
        assert_eq!(sums[2].value, 40.0);

        assert_eq!(series(AggregateOp::Avg)[1].value, 2.0);
        assert_eq!(series(AggregateOp::Min)[1].value, 4.0);
        assert_eq!(series(AggregateOp::Max)[2].value, 30.0);
        assert_eq!(series(AggregateOp::Count)[1].value, 2.0);
        assert_eq!(series(AggregateOp::Count)[1].rows, 2);
    }
}
