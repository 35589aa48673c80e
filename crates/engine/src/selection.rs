//! Row selection for the list view.
//!
//! Selection is global across pages: moving to another page keeps what was
//! selected before. Range gestures are anchored on the visible page only,
//! not on the full filtered list; an anchor that is not on the current page
//! turns a range gesture into a plain toggle. Filter changes never prune the
//! selection, so it may hold ids the current filter hides (see
//! [`Selection::stale_ids`]).

use std::collections::{BTreeSet, HashSet};

use api_types::transaction::RecordId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<RecordId>,
    last_touched: Option<RecordId>,
}

impl Selection {
    /// Toggles `id`, or extends the selection over a span of `visible_page`
    /// when `range` is set and the previous anchor is on the page.
    pub fn toggle(&mut self, id: &RecordId, visible_page: &[RecordId], range: bool) {
        if range && let Some(span) = self.span(id, visible_page) {
            self.ids.extend(span.iter().cloned());
        } else if !self.ids.remove(id) {
            self.ids.insert(id.clone());
        }
        self.last_touched = Some(id.clone());
    }

    /// Selects the whole page, or clears *everything* when the page is
    /// already fully selected.
    pub fn toggle_all(&mut self, visible_page: &[RecordId]) {
        if self.is_all_selected(visible_page) {
            self.clear();
        } else {
            self.ids.extend(visible_page.iter().cloned());
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.last_touched = None;
    }

    /// Drops a single id, e.g. after the record was deleted.
    pub fn remove(&mut self, id: &RecordId) {
        self.ids.remove(id);
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    /// An empty page is never "all selected".
    pub fn is_all_selected(&self, visible_page: &[RecordId]) -> bool {
        !visible_page.is_empty() && visible_page.iter().all(|id| self.ids.contains(id))
    }

    pub fn last_touched(&self) -> Option<&RecordId> {
        self.last_touched.as_ref()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in ascending id order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.ids.iter().cloned().collect()
    }

    /// Selected ids that are not in `reachable`.
    pub fn stale_ids(&self, reachable: &HashSet<RecordId>) -> Vec<RecordId> {
        self.ids
            .iter()
            .filter(|id| !reachable.contains(*id))
            .cloned()
            .collect()
    }

    fn span<'p>(&self, id: &RecordId, visible_page: &'p [RecordId]) -> Option<&'p [RecordId]> {
        let anchor = self.last_touched.as_ref()?;
        let from = visible_page.iter().position(|candidate| candidate == anchor)?;
        let to = visible_page.iter().position(|candidate| candidate == id)?;
        let (start, end) = if from <= to { (from, to) } else { (to, from) };
        Some(&visible_page[start..=end])
    }
}
