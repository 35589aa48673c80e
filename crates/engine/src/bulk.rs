//! Bulk edit coordination.
//!
//! The coordinator owns the bulk edit form (a sparse [`RecordPatch`]) and
//! guards the apply step: nothing is sent for an empty selection or an
//! effectively empty patch, blank fields are dropped before they can
//! overwrite existing values, and only one apply runs at a time. A successful
//! apply clears the form only if it was not edited while the apply ran.
//! Removing the applied ids from the selection is left to the caller.

use std::{
    collections::BTreeSet,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use api_types::transaction::{RecordId, RecordPatch, TransactionRecord};

use crate::{EngineError, ResultEngine, flight::SingleFlight};

/// Consolidated outcome of one bulk apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub requested: usize,
    /// Ids the patch was sent for.
    pub targets: Vec<RecordId>,
    /// Updated copies returned by the store.
    pub updated: Vec<TransactionRecord>,
    pub failed: usize,
    /// The last per-record error, if any failed.
    pub last_error: Option<EngineError>,
}

impl BulkReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn message(&self) -> String {
        match &self.last_error {
            None => format!("Updated {} transaction(s)", self.updated.len()),
            Some(err) => format!(
                "Updated {} of {} transaction(s); {} failed: {err}",
                self.updated.len(),
                self.requested,
                self.failed
            ),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BulkEditor {
    form: Arc<Mutex<RecordPatch>>,
    flight: SingleFlight,
}

impl BulkEditor {
    /// Current form contents, as entered.
    pub fn form(&self) -> RecordPatch {
        self.lock_form().clone()
    }

    pub fn update_form(&self, edit: impl FnOnce(&mut RecordPatch)) {
        edit(&mut self.lock_form());
    }

    pub fn reset_form(&self) {
        *self.lock_form() = RecordPatch::default();
    }

    pub fn is_busy(&self) -> bool {
        self.flight.is_busy()
    }

    /// Starts applying the form to `selected`.
    ///
    /// The in-flight flag is taken when this is called, not when the future is
    /// first polled, so a second call made before the first completes fails
    /// with [`EngineError::Busy`] without reaching `apply_fn`.
    pub fn apply<F, Fut>(
        &self,
        selected: Vec<RecordId>,
        apply_fn: F,
    ) -> impl Future<Output = ResultEngine<BulkReport>> + Send + 'static
    where
        F: FnOnce(Vec<RecordId>, RecordPatch) -> Fut + Send + 'static,
        Fut: Future<Output = ResultEngine<BulkReport>> + Send + 'static,
    {
        let permit = self.flight.try_start();
        let form = Arc::clone(&self.form);
        let submitted = self.form();
        let patch = normalize_patch(&submitted);

        async move {
            let Some(_permit) = permit else {
                return Err(EngineError::Busy("bulk edit"));
            };
            if selected.is_empty() {
                return Err(EngineError::Validation(
                    "no transactions selected".to_string(),
                ));
            }
            if patch.is_empty() {
                return Err(EngineError::Validation("no fields to update".to_string()));
            }

            tracing::info!(count = selected.len(), "applying bulk edit");
            let targets = selected.clone();
            let mut report = apply_fn(selected, patch).await?;
            report.targets = targets;
            if report.is_success() {
                let mut live = form.lock().unwrap_or_else(PoisonError::into_inner);
                if *live == submitted {
                    *live = RecordPatch::default();
                } else {
                    tracing::debug!("bulk form edited during apply, keeping it");
                }
            } else {
                tracing::warn!(failed = report.failed, "bulk edit partially failed");
            }
            Ok(report)
        }
    }

    fn lock_form(&self) -> MutexGuard<'_, RecordPatch> {
        self.form.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drops blank text fields and empty tag sets; trims what is kept.
pub fn normalize_patch(patch: &RecordPatch) -> RecordPatch {
    RecordPatch {
        status: patch.status,
        flagged: patch.flagged,
        major_category: normalize_text(patch.major_category.as_deref()),
        category: normalize_text(patch.category.as_deref()),
        tags: patch.tags.as_ref().and_then(normalize_tags),
        notes: normalize_text(patch.notes.as_deref()),
    }
}

fn normalize_text(value: Option<&str>) -> Option<String> {
    crate::util::non_blank(value).map(str::to_string)
}

fn normalize_tags(tags: &BTreeSet<String>) -> Option<BTreeSet<String>> {
    let tags: BTreeSet<String> = tags
        .iter()
        .filter_map(|tag| normalize_text(Some(tag)))
        .collect();
    (!tags.is_empty()).then_some(tags)
}
