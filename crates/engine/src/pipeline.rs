//! The list view pipeline.
//!
//! [`view`] is a pure function: overlay exclusion, then filtering, then a
//! stable sort, then the page slice. Facets are computed after overlay
//! exclusion but *before* filtering, so filter controls always offer every
//! value present in the data and a narrowed filter can still be broadened.

use std::collections::{BTreeMap, HashSet};

use api_types::transaction::{RecordId, TransactionRecord};
use chrono_tz::Tz;

use crate::{filter::FilterCriteria, sort::SortSpec, util::fold, util::non_blank};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// 1-based page window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    page: usize,
    page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Zero values are bumped to 1.
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }

    /// Returns a copy whose page lies within `1..=max(1, total_pages)`.
    pub fn clamped(&self, total: usize) -> Self {
        let last = self.total_pages(total).max(1);
        Self::new(self.page.min(last), self.page_size)
    }

    fn range(&self, total: usize) -> std::ops::Range<usize> {
        let start = (self.page - 1).saturating_mul(self.page_size).min(total);
        let end = start.saturating_add(self.page_size).min(total);
        start..end
    }
}

/// Everything the user controls about the list besides selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub criteria: FilterCriteria,
    pub sort: SortSpec,
    pub pagination: Pagination,
}

/// Distinct values for filter controls, sorted case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Facets {
    pub origins: Vec<String>,
    pub banks: Vec<String>,
    pub major_categories: Vec<String>,
    pub categories: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewPage<'a> {
    pub records: Vec<&'a TransactionRecord>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_filtered: usize,
    pub facets: Facets,
}

impl ViewPage<'_> {
    /// Ids on the page in display order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }
}

/// Computes the visible page.
///
/// The page is not clamped here: a page past the end yields no records.
pub fn view<'a>(
    records: &'a [TransactionRecord],
    hidden: &HashSet<RecordId>,
    query: &ViewQuery,
    tz: Tz,
) -> ViewPage<'a> {
    let visible: Vec<&TransactionRecord> = records
        .iter()
        .filter(|record| !hidden.contains(&record.id))
        .collect();
    let facets = facets(&visible);

    let filter = query.criteria.compile(tz);
    let mut matched: Vec<&TransactionRecord> = visible
        .into_iter()
        .filter(|record| filter.matches(record))
        .collect();
    query.sort.apply(&mut matched);

    let total_filtered = matched.len();
    let range = query.pagination.range(total_filtered);
    let page_records = matched[range].to_vec();

    ViewPage {
        records: page_records,
        page: query.pagination.page(),
        page_size: query.pagination.page_size(),
        total_pages: query.pagination.total_pages(total_filtered),
        total_filtered,
        facets,
    }
}

/// Ids of every record the criteria let through, on any page.
pub fn reachable_ids(
    records: &[TransactionRecord],
    hidden: &HashSet<RecordId>,
    criteria: &FilterCriteria,
    tz: Tz,
) -> HashSet<RecordId> {
    let filter = criteria.compile(tz);
    records
        .iter()
        .filter(|record| !hidden.contains(&record.id) && filter.matches(record))
        .map(|record| record.id.clone())
        .collect()
}

fn facets(records: &[&TransactionRecord]) -> Facets {
    Facets {
        origins: distinct(records.iter().map(|r| Some(r.origin.as_str()))),
        banks: distinct(records.iter().map(|r| Some(r.bank.as_str()))),
        major_categories: distinct(records.iter().map(|r| r.major_category.as_deref())),
        categories: distinct(records.iter().map(|r| r.category.as_deref())),
    }
}

/// Keeps the first spelling seen for each folded value.
fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for value in values.filter_map(non_blank) {
        seen.entry(fold(value)).or_insert_with(|| value.to_string());
    }
    seen.into_values().collect()
}
