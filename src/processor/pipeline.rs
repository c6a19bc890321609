//! Search, sort and pagination over row indices.
//!
//! Each stage takes the record slice plus the row indices produced by the
//! previous stage and returns new indices; the records are never touched.

use std::cmp::Ordering;

use crate::processor::{NULL, Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Sort after a header click: same field flips direction, a new field starts ascending
    pub fn toggle(current: Option<&SortSpec>, field: &str) -> SortSpec {
        match current {
            Some(spec) if spec.field == field && spec.direction == SortDirection::Asc => {
                Self::desc(field)
            }
            _ => Self::asc(field),
        }
    }
}

/// Keeps rows where any field's lowercase text contains the trimmed,
/// lowercased `term`. A blank term keeps everything.
pub fn search(records: &[Record], rows: &[usize], term: &str) -> Vec<usize> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .copied()
        .filter(|&i| {
            records
                .get(i)
                .is_some_and(|record| record_contains(record, &needle))
        })
        .collect()
}

fn record_contains(record: &Record, needle: &str) -> bool {
    record
        .values()
        .iter()
        .any(|value| value.to_text().to_lowercase().contains(needle))
}

/// Orders two cells. Nulls sort last in both directions; numbers compare
/// numerically, everything else as text.
pub fn compare_values(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                // numbers ahead of text keeps mixed columns a total order
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => compare_text(&a.to_text(), &b.to_text()),
            };
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
    }
}

// case-insensitive first, ordinal as tie-break
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Stable sort of `rows`; `None` keeps the incoming order
pub fn sort(records: &[Record], rows: &[usize], spec: Option<&SortSpec>) -> Vec<usize> {
    let mut sorted = rows.to_vec();
    let Some(spec) = spec else {
        return sorted;
    };

    let key = |i: usize| {
        records
            .get(i)
            .map_or(&NULL, |record| record.get(&spec.field))
    };
    sorted.sort_by(|&a, &b| compare_values(key(a), key(b), spec.direction));
    sorted
}

/// One window of an ordered row list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub rows: Vec<usize>,
    /// 1-based, already clamped to `1..=total_pages`
    pub page_index: usize,
    pub total_pages: usize,
    pub total_rows: usize,
    pub page_size: usize,
}

impl Page {
    pub fn has_previous(&self) -> bool {
        self.page_index > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_index < self.total_pages
    }
}

/// `max(ceil(total_rows / page_size), 1)`; a zero page size counts as 1
pub fn total_pages(total_rows: usize, page_size: usize) -> usize {
    total_rows.div_ceil(page_size.max(1)).max(1)
}

/// Slices page `page_index` (1-based) out of `rows`, clamping the index into range
pub fn paginate(rows: &[usize], page_index: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total_rows = rows.len();
    let total_pages = total_pages(total_rows, page_size);
    let page_index = page_index.clamp(1, total_pages);

    let start = ((page_index - 1) * page_size).min(total_rows);
    let end = (start + page_size).min(total_rows);

    Page {
        rows: rows[start..end].to_vec(),
        page_index,
        total_pages,
        total_rows,
        page_size,
    }
}
