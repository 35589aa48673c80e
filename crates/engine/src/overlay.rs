//! Optimistic visibility overlay.
//!
//! Ids are hidden the instant a delete is requested and revealed again if the
//! delete is undone or fails. The overlay is only a mask over the committed
//! records; the pipeline recomputes the view from scratch, so a revealed
//! record lands back at its sorted position without extra bookkeeping.
//!
//! `Overlay` is a cheap handle: clones share the same set, which lets the
//! scheduler's callbacks reveal ids without reaching into the list.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use api_types::transaction::RecordId;

#[derive(Clone, Debug, Default)]
pub struct Overlay {
    hidden: Arc<Mutex<HashSet<RecordId>>>,
}

impl Overlay {
    pub fn hide(&self, id: RecordId) {
        tracing::debug!(%id, "hiding record");
        self.lock().insert(id);
    }

    pub fn reveal(&self, id: &RecordId) {
        if self.lock().remove(id) {
            tracing::debug!(%id, "revealing record");
        }
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.lock().contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the hidden set, for feeding the pipeline.
    pub fn snapshot(&self) -> HashSet<RecordId> {
        self.lock().clone()
    }

    /// Forgets ids that the store no longer returns.
    pub fn retain_existing(&self, existing: &HashSet<&RecordId>) {
        self.lock().retain(|id| existing.contains(id));
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<RecordId>> {
        self.hidden.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
