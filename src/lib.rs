//! # creative_query
//!
//! `creative_query` is an in-memory query engine for advertising-creative
//! performance tables. It loads a CSV export once and then derives views
//! from it without touching the loaded records. It supports:
//!
//! - Memory-mapped CSV loading with a quote-aware scanner
//! - Field classification into metrics, tags and dimensions
//! - Per-field pick-lists and numeric inference
//! - Typed filter clauses combined with AND/OR
//! - Free-text search, null-aware stable sorting and clamped pagination
//! - Summary metrics (spend, impressions, clicks, installs, CTR, CVR)
//! - Chart series and delimited export of a view
//! - An LRU cache of derived views
//!
//! # Example
//!
//! ```rust
//! use creative_query::{Dataset, EngineConfig, FilterClause, Operator, SortSpec};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let csv = "creative,network,spend,impressions,clicks,installs\n\
//!                Summer,Meta,100,1000,50,5\n\
//!                Winter,Google,200,2000,100,20\n";
//!     let dataset = Dataset::from_csv_str(csv, &EngineConfig::default())?;
//!
//!     // Numeric filter on a metric
//!     let spend = dataset.get_field("spend")?.clone();
//!     let view = dataset
//!         .query()
//!         .filter(FilterClause::numeric(spend, Operator::GreaterThan, 150.0)?)
//!         .sort_by(SortSpec::desc("clicks"))
//!         .execute();
//!
//!     assert_eq!(view.page.rows, vec![1]);
//!     println!("CTR {}%, CVR {}%", view.summary.ctr, view.summary.cvr);
//!     Ok(())
//! }
//! ```

mod helpers;
pub mod processor;

pub use processor::{
    AggregateOp, LoadSummary, ProcessorError, Record, RowError, Value,
    aggregate::{MetricSummary, MetricTotals, SeriesPoint, aggregate, group_series},
    column::{FieldCategory, FieldDescriptor, Schema, classify, classify_with},
    config::EngineConfig,
    dataset::Dataset,
    export::ExportTable,
    filter::{Combinator, FilterClause, FilterSet, Operand, Operator},
    filter_builder::{FilterDraft, PendingFilters},
    pipeline::{Page, SortDirection, SortSpec, paginate, search, sort},
    query_builder::{QueryCache, RenderModel, ViewQuery, ViewState, derive_view},
};
