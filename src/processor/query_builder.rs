use lru::LruCache;
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use tracing::debug;

use crate::processor::{
    aggregate::{MetricSummary, aggregate},
    config::EngineConfig,
    dataset::Dataset,
    filter::{Combinator, FilterClause, FilterSet},
    pipeline::{Page, SortSpec, paginate, search, sort},
};

/// Everything the user has chosen about a view
///
/// Immutable: every setter returns a new state. Changing the search term,
/// filters, sort or page size moves back to page 1; only
/// [`ViewState::with_page`] keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewState {
    search_term: String,
    filter_set: FilterSet,
    sort: Option<SortSpec>,
    page_index: usize,
    page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(EngineConfig::default().default_page_size)
    }
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        ViewState {
            search_term: String::new(),
            filter_set: FilterSet::default(),
            sort: None,
            page_index: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn with_search(&self, term: impl Into<String>) -> Self {
        ViewState {
            search_term: term.into(),
            page_index: 1,
            ..self.clone()
        }
    }

    pub fn with_filter_set(&self, filter_set: FilterSet) -> Self {
        ViewState {
            filter_set,
            page_index: 1,
            ..self.clone()
        }
    }

    pub fn with_sort(&self, sort: Option<SortSpec>) -> Self {
        ViewState {
            sort,
            page_index: 1,
            ..self.clone()
        }
    }

    /// Header click: toggles direction on the current field or sorts a new one ascending
    pub fn toggle_sort(&self, field: &str) -> Self {
        self.with_sort(Some(SortSpec::toggle(self.sort.as_ref(), field)))
    }

    pub fn with_page_size(&self, page_size: usize) -> Self {
        ViewState {
            page_size: page_size.max(1),
            page_index: 1,
            ..self.clone()
        }
    }

    /// 1-based; clamped when the view is derived, not here
    pub fn with_page(&self, page_index: usize) -> Self {
        ViewState {
            page_index,
            ..self.clone()
        }
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn filter_set(&self) -> &FilterSet {
        &self.filter_set
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

/// Output of one view derivation
#[derive(Debug, Clone, PartialEq)]
pub struct RenderModel {
    /// Rows passing the filter set, in dataset order
    pub filtered: Vec<usize>,
    /// Filtered, searched and sorted rows (all pages)
    pub ordered: Vec<usize>,
    pub page: Page,
    /// Totals over `filtered`
    pub summary: MetricSummary,
}

impl RenderModel {
    pub fn total_rows(&self) -> usize {
        self.ordered.len()
    }
}

/// Runs filter, search, sort, paginate and aggregate for `state`
pub fn derive_view(dataset: &Dataset, state: &ViewState) -> RenderModel {
    let records = dataset.records();

    let filtered = state.filter_set.apply(records);
    let searched = search(records, &filtered, &state.search_term);
    let ordered = sort(records, &searched, state.sort.as_ref());
    let page = paginate(&ordered, state.page_index, state.page_size);
    let summary = aggregate(dataset.rows(&filtered));

    debug!(
        dataset = dataset.id(),
        filters = state.filter_set.len(),
        filtered = filtered.len(),
        searched = ordered.len(),
        page = page.page_index,
        total_pages = page.total_pages,
        "Derived view"
    );

    RenderModel {
        filtered,
        ordered,
        page,
        summary,
    }
}

/// LRU of derived views keyed by dataset identity and view state
#[derive(Debug)]
pub struct QueryCache {
    cache: RefCell<LruCache<(u64, ViewState), Rc<RenderModel>>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cache_capacity)
    }

    pub fn get(&self, dataset: &Dataset, state: &ViewState) -> Option<Rc<RenderModel>> {
        self.cache
            .borrow_mut()
            .get(&(dataset.id(), state.clone()))
            .cloned()
    }

    pub fn put(&self, dataset: &Dataset, state: ViewState, model: Rc<RenderModel>) {
        self.cache.borrow_mut().put((dataset.id(), state), model);
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

/// Fluent builder over a [`ViewState`]
///
/// # Example
/// ```rust
/// # use creative_query::{Dataset, EngineConfig, SortSpec};
/// let csv = "creative,spend\nA,10\nB,30\nC,20\n";
/// let dataset = Dataset::from_csv_str(csv, &EngineConfig::default()).unwrap();
/// let view = dataset
///     .query()
///     .sort_by(SortSpec::desc("spend"))
///     .page_size(5)
///     .execute();
/// assert_eq!(view.page.rows, vec![1, 2, 0]);
/// assert_eq!(view.summary.totals.spend, 60.0);
/// ```
#[derive(Debug, Clone)]
pub struct ViewQuery<'a> {
    dataset: &'a Dataset,
    cache: Option<&'a QueryCache>,
    state: ViewState,
}

impl<'a> ViewQuery<'a> {
    pub fn new(dataset: &'a Dataset, cache: Option<&'a QueryCache>) -> Self {
        Self {
            dataset,
            cache,
            state: ViewState::new(dataset.config().default_page_size),
        }
    }

    /// Starts from an existing state instead of a fresh one
    pub fn state(mut self, state: ViewState) -> Self {
        self.state = state;
        self
    }

    pub fn search(mut self, term: &str) -> Self {
        self.state = self.state.with_search(term);
        self
    }

    /// Replaces the whole filter set
    pub fn filters(mut self, filter_set: FilterSet) -> Self {
        self.state = self.state.with_filter_set(filter_set);
        self
    }

    /// Adds one clause to the current filter set
    pub fn filter(mut self, clause: FilterClause) -> Self {
        let filter_set = self.state.filter_set.with_clause(clause);
        self.state = self.state.with_filter_set(filter_set);
        self
    }

    pub fn combinator(mut self, combinator: Combinator) -> Self {
        let filter_set = self.state.filter_set.with_combinator(combinator);
        self.state = self.state.with_filter_set(filter_set);
        self
    }

    pub fn sort_by(mut self, spec: SortSpec) -> Self {
        self.state = self.state.with_sort(Some(spec));
        self
    }

    pub fn page(mut self, page_index: usize) -> Self {
        self.state = self.state.with_page(page_index);
        self
    }

    /// Sizes outside the configured presets (0 included) fall back to the default
    pub fn page_size(mut self, page_size: usize) -> Self {
        let size = self.dataset.config().resolve_page_size(page_size);
        self.state = self.state.with_page_size(size);
        self
    }

    /// Disable caching
    pub fn no_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn view_state(&self) -> &ViewState {
        &self.state
    }

    pub fn execute(self) -> Rc<RenderModel> {
        let Some(cache) = self.cache else {
            return Rc::new(derive_view(self.dataset, &self.state));
        };

        if let Some(model) = cache.get(self.dataset, &self.state) {
            debug!(dataset = self.dataset.id(), "View cache hit");
            return model;
        }
        let model = Rc::new(derive_view(self.dataset, &self.state));
        cache.put(self.dataset, self.state, Rc::clone(&model));
        model
    }
}

impl Dataset {
    pub fn query(&self) -> ViewQuery<'_> {
        ViewQuery::new(self, None)
    }

    pub fn query_with_cache<'a>(&'a self, cache: &'a QueryCache) -> ViewQuery<'a> {
        ViewQuery::new(self, Some(cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::filter::Operator;

    fn make_dataset() -> Dataset {
        let mut csv = String::from("creative,network,spend,clicks\n");
        for i in 0..23 {
            let network = if i % 2 == 0 { "Meta" } else { "Google" };
            csv.push_str(&format!("ad_{i},{network},{},{}\n", i * 10, i));
        }
        Dataset::from_csv_str(&csv, &EngineConfig::default()).unwrap()
    }

    fn meta_only(dataset: &Dataset) -> FilterClause {
        let field = dataset.get_field("network").unwrap().clone();
        FilterClause::text(field, Operator::Is, "Meta").unwrap()
    }

    #[test]
    fn test_setters_reset_page() {
        let state = ViewState::default().with_page(3);
        assert_eq!(state.page_index(), 3);
        assert_eq!(state.page_size(), 10);
        assert_eq!(state.with_search("x").page_index(), 1);
        assert_eq!(state.with_filter_set(FilterSet::default()).page_index(), 1);
        assert_eq!(state.toggle_sort("spend").page_index(), 1);
        assert_eq!(state.with_page_size(25).page_index(), 1);
        assert_eq!(state.with_page_size(0).page_size(), 1);
    }

    #[test]
    fn test_derive_view_stages() {
        let dataset = make_dataset();
        let state = ViewState::new(5)
            .with_filter_set(FilterSet::all(vec![meta_only(&dataset)]))
            .with_sort(Some(SortSpec::desc("spend")))
            .with_page(2);
        let view = derive_view(&dataset, &state);

        assert_eq!(view.filtered.len(), 12);
        assert_eq!(view.ordered[0], 22);
        assert_eq!(view.page.page_index, 2);
        assert_eq!(view.page.total_pages, 3);
        assert_eq!(view.page.rows, vec![12, 10, 8, 6, 4]);
        // summary covers the filtered rows: 0+20+...+220
        assert_eq!(view.summary.totals.spend, 1320.0);
    }

    #[test]
    fn test_search_narrows_ordered_not_summary() {
        let dataset = make_dataset();
        let view = dataset.query().search("ad_1").execute();
        // ad_1, ad_10 .. ad_19
        assert_eq!(view.total_rows(), 11);
        assert_eq!(view.filtered.len(), 23);
        assert_eq!(view.summary.totals.clicks, (0..23).sum::<i32>() as f64);
    }

    #[test]
    fn test_builder_page_size_falls_back() {
        let dataset = make_dataset();
        assert_eq!(dataset.query().page_size(7).view_state().page_size(), 10);
        assert_eq!(dataset.query().page_size(25).view_state().page_size(), 25);
        // zero is not a preset either
        assert_eq!(dataset.query().page_size(0).view_state().page_size(), 10);
        let view = dataset.query().page(99).execute();
        assert_eq!(view.page.page_index, 3);
        assert_eq!(view.page.rows, vec![20, 21, 22]);
    }

    #[test]
    fn test_builder_filter_and_combinator() {
        let dataset = make_dataset();
        let spend = dataset.get_field("spend").unwrap().clone();
        let view = dataset
            .query()
            .filter(meta_only(&dataset))
            .filter(FilterClause::numeric(spend, Operator::LesserThan, 15.0).unwrap())
            .combinator(Combinator::Or)
            .execute();
        // 12 Meta rows plus row 1 (spend 10)
        assert_eq!(view.filtered.len(), 13);
    }

    #[test]
    fn test_cache_reuses_views() {
        let dataset = make_dataset();
        let cache = QueryCache::from_config(dataset.config());

        let first = dataset.query_with_cache(&cache).search("meta").execute();
        let second = dataset.query_with_cache(&cache).search("meta").execute();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let uncached = dataset.query_with_cache(&cache).search("meta").no_cache().execute();
        assert!(!Rc::ptr_eq(&first, &uncached));
        assert_eq!(*first, *uncached);

        // same state on another dataset is a different entry
        let other = make_dataset();
        other.query_with_cache(&cache).search("meta").execute();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_evicts_least_recent() {
        let dataset = make_dataset();
        let cache = QueryCache::new(2);
        for term in ["a", "b", "c"] {
            dataset.query_with_cache(&cache).search(term).execute();
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&dataset, &ViewState::default().with_search("a")).is_none());
        assert!(cache.get(&dataset, &ViewState::default().with_search("c")).is_some());
        cache.clear();
        assert!(cache.is_empty());
    }
}
