//! The transaction list controller.
//!
//! [`TransactionList`] owns every piece of session state (the committed
//! records, the query, the overlay, the selection, the undo slot, the bulk
//! edit form) and is the only thing that talks to the [`RecordStore`].
//! Components never reach into each other: a delete hides the record and
//! hands the scheduler callbacks that reveal it again on undo or failure.

use std::{collections::HashSet, future::Future, sync::Arc};

use api_types::{
    import::{ImportRequest, ImportSummary},
    transaction::{RecordId, RecordPatch, TransactionRecord},
};
use tokio::sync::{mpsc, watch};

use crate::{
    EngineError, ResultEngine,
    bulk::{BulkEditor, BulkReport},
    filter::FilterCriteria,
    flight::SingleFlight,
    overlay::Overlay,
    pipeline::{self, Pagination, ViewPage, ViewQuery},
    scheduler::{PendingAction, SchedulerState, UndoScheduler},
    selection::Selection,
    settings::EngineSettings,
    sort::{SortDirection, SortField, SortSpec},
    store::RecordStore,
};

/// A scheduled delete the store refused. The record is back in view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteFailure {
    pub id: RecordId,
    pub description: String,
    pub error: String,
}

pub struct TransactionList<S> {
    store: Arc<S>,
    settings: EngineSettings,
    records: Vec<TransactionRecord>,
    query: ViewQuery,
    overlay: Overlay,
    selection: Selection,
    scheduler: UndoScheduler,
    pending_delete: Option<RecordId>,
    delete_failures: mpsc::UnboundedSender<DeleteFailure>,
    delete_failures_rx: Option<mpsc::UnboundedReceiver<DeleteFailure>>,
    bulk: BulkEditor,
    import_flight: SingleFlight,
}

impl<S: RecordStore> TransactionList<S> {
    /// Return a builder for `TransactionList`.
    pub fn builder() -> TransactionListBuilder<S> {
        TransactionListBuilder {
            store: None,
            settings: EngineSettings::default(),
            records: Vec::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// Replaces the committed records with a fresh copy from the store.
    pub async fn refresh(&mut self) -> ResultEngine<()> {
        let records = self.store.fetch_records().await?;
        tracing::debug!(count = records.len(), "records refreshed");
        self.replace_records(records);
        Ok(())
    }

    pub fn replace_records(&mut self, records: Vec<TransactionRecord>) {
        self.records = records;
        let existing: HashSet<&RecordId> = self.records.iter().map(|r| &r.id).collect();
        self.overlay.retain_existing(&existing);
        self.clamp_page();
    }

    /// Swaps in updated copies returned by the store, matched by id.
    pub fn merge_updated(&mut self, updated: Vec<TransactionRecord>) {
        for record in updated {
            if let Some(slot) = self.records.iter_mut().find(|r| r.id == record.id) {
                *slot = record;
            }
        }
        self.clamp_page();
    }

    pub fn view(&self) -> ViewPage<'_> {
        pipeline::view(
            &self.records,
            &self.overlay.snapshot(),
            &self.query,
            self.settings.timezone,
        )
    }

    // Query.

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.query.criteria = criteria;
        self.clamp_page();
    }

    pub fn update_criteria(&mut self, edit: impl FnOnce(&mut FilterCriteria)) {
        edit(&mut self.query.criteria);
        self.clamp_page();
    }

    pub fn clear_filters(&mut self) {
        self.set_criteria(FilterCriteria::default());
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.query.sort = sort;
    }

    /// Column-header behaviour: the active field flips direction, another
    /// field starts descending.
    pub fn sort_by(&mut self, field: SortField) {
        let sort = self.query.sort;
        self.query.sort = if sort.field == field {
            SortSpec::new(field, sort.direction.reversed())
        } else {
            SortSpec::new(field, SortDirection::Desc)
        };
    }

    pub fn set_page(&mut self, page: usize) {
        let page_size = self.query.pagination.page_size();
        self.query.pagination = Pagination::new(page, page_size);
        self.clamp_page();
    }

    pub fn next_page(&mut self) {
        self.set_page(self.query.pagination.page() + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.query.pagination.page().saturating_sub(1));
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.query.pagination = Pagination::new(1, page_size);
    }

    /// Keeps the current page within the filtered result.
    fn clamp_page(&mut self) {
        let total = self.reachable_ids().len();
        self.query.pagination = self.query.pagination.clamped(total);
    }

    fn reachable_ids(&self) -> HashSet<RecordId> {
        pipeline::reachable_ids(
            &self.records,
            &self.overlay.snapshot(),
            &self.query.criteria,
            self.settings.timezone,
        )
    }

    // Selection.

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Toggles `id`; `range` extends from the last touched row on this page.
    pub fn toggle_selection(&mut self, id: &RecordId, range: bool) {
        let page = self.view().ids();
        self.selection.toggle(id, &page, range);
    }

    pub fn toggle_page_selection(&mut self) {
        let page = self.view().ids();
        self.selection.toggle_all(&page);
    }

    pub fn is_page_selected(&self) -> bool {
        self.selection.is_all_selected(&self.view().ids())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected ids the current filter hides. They are still targeted by
    /// bulk edits.
    pub fn stale_selection(&self) -> Vec<RecordId> {
        self.selection.stale_ids(&self.reachable_ids())
    }

    // Delete with undo.

    /// Hides `id` right away and schedules the delete after the undo window.
    ///
    /// A delete still waiting out its window is abandoned and its record comes
    /// back into view; only one delete can be undoable at a time.
    pub fn request_delete(&mut self, id: &RecordId) -> ResultEngine<()> {
        let record = self
            .records
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if self.overlay.contains(id) {
            return Ok(());
        }

        let description = record.description.clone();
        let message = format!("Deleted \"{description}\"");
        self.overlay.hide(id.clone());
        self.selection.remove(id);

        let store = Arc::clone(&self.store);
        let target = id.clone();
        let undo_overlay = self.overlay.clone();
        let undo_id = id.clone();
        let error_overlay = self.overlay.clone();
        let error_id = id.clone();
        let failures = self.delete_failures.clone();
        let action = PendingAction::new(message, move || async move {
            store.delete_record(&target).await
        })
        .delay(self.settings.undo_delay)
        .on_undo(move || undo_overlay.reveal(&undo_id))
        .on_error(move |err| {
            tracing::warn!(id = %error_id, error = %err, "delete failed, restoring record");
            error_overlay.reveal(&error_id);
            let _ = failures.send(DeleteFailure {
                id: error_id,
                description,
                error: err.to_string(),
            });
        });

        if self.scheduler.trigger(action)
            && let Some(previous) = self.pending_delete.take()
        {
            self.overlay.reveal(&previous);
        }
        self.pending_delete = Some(id.clone());
        self.clamp_page();
        Ok(())
    }

    /// Undoes the pending delete, if any.
    pub fn undo(&mut self) -> bool {
        let undone = self.scheduler.undo();
        if undone {
            self.pending_delete = None;
            self.clamp_page();
        }
        undone
    }

    pub fn pending(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Countdown of the pending delete, updated every tick.
    pub fn countdown(&self) -> watch::Receiver<std::time::Duration> {
        self.scheduler.subscribe()
    }

    pub fn is_hidden(&self, id: &RecordId) -> bool {
        self.overlay.contains(id)
    }

    /// Receiver of failed deletes. Only the first call gets it.
    pub fn take_delete_failures(&mut self) -> Option<mpsc::UnboundedReceiver<DeleteFailure>> {
        self.delete_failures_rx.take()
    }

    // Bulk edit.

    pub fn bulk_form(&self) -> RecordPatch {
        self.bulk.form()
    }

    pub fn update_bulk_form(&self, edit: impl FnOnce(&mut RecordPatch)) {
        self.bulk.update_form(edit);
    }

    pub fn reset_bulk_form(&self) {
        self.bulk.reset_form();
    }

    pub fn is_bulk_busy(&self) -> bool {
        self.bulk.is_busy()
    }

    /// Starts a bulk edit of the current selection.
    ///
    /// The returned future does not borrow the list, so it can be spawned;
    /// hand its result to [`finish_bulk_edit`](Self::finish_bulk_edit).
    pub fn start_bulk_edit(
        &self,
    ) -> impl Future<Output = ResultEngine<BulkReport>> + Send + 'static {
        let store = Arc::clone(&self.store);
        self.bulk.apply(self.selection.ids(), move |ids, patch| {
            update_each(store, ids, patch)
        })
    }

    /// Folds a bulk edit result back into the list.
    ///
    /// On success the edited ids leave the selection; rows selected while the
    /// edit ran stay selected.
    pub fn finish_bulk_edit(&mut self, result: &ResultEngine<BulkReport>) {
        let Ok(report) = result else {
            return;
        };
        self.merge_updated(report.updated.clone());
        if report.is_success() {
            for id in &report.targets {
                self.selection.remove(id);
            }
        }
    }

    pub async fn apply_bulk_edit(&mut self) -> ResultEngine<BulkReport> {
        let result = self.start_bulk_edit().await;
        self.finish_bulk_edit(&result);
        result
    }

    // Import.

    pub fn is_importing(&self) -> bool {
        self.import_flight.is_busy()
    }

    /// Starts an import; a second call while one runs fails with
    /// [`EngineError::Busy`]. Refresh once it completes.
    pub fn start_import(
        &self,
        request: ImportRequest,
    ) -> impl Future<Output = ResultEngine<ImportSummary>> + Send + 'static {
        let permit = self.import_flight.try_start();
        let store = Arc::clone(&self.store);
        async move {
            let Some(_permit) = permit else {
                return Err(EngineError::Busy("import"));
            };
            tracing::info!(file = %request.file_name, "importing records");
            let summary = store.import_records(&request).await?;
            tracing::info!(
                imported = summary.imported,
                duplicates = summary.duplicates,
                "import finished"
            );
            Ok(summary)
        }
    }

    pub async fn import(&mut self, request: ImportRequest) -> ResultEngine<ImportSummary> {
        let summary = self.start_import(request).await?;
        self.refresh().await?;
        Ok(summary)
    }
}

/// One store call per id; failures are counted, not raised.
async fn update_each<S: RecordStore>(
    store: Arc<S>,
    ids: Vec<RecordId>,
    patch: RecordPatch,
) -> ResultEngine<BulkReport> {
    let mut report = BulkReport {
        requested: ids.len(),
        ..BulkReport::default()
    };
    for id in &ids {
        match store.update_record(id, &patch).await {
            Ok(record) => report.updated.push(record),
            Err(err) => {
                tracing::warn!(%id, error = %err, "bulk update failed for record");
                report.failed += 1;
                report.last_error = Some(err);
            }
        }
    }
    Ok(report)
}

pub struct TransactionListBuilder<S> {
    store: Option<Arc<S>>,
    settings: EngineSettings,
    records: Vec<TransactionRecord>,
}

impl<S: RecordStore> TransactionListBuilder<S> {
    /// Pass the required store.
    pub fn store(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Share a store that is also used elsewhere.
    pub fn shared_store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Seed the list without a round trip.
    pub fn records(mut self, records: Vec<TransactionRecord>) -> Self {
        self.records = records;
        self
    }

    /// Construct `TransactionList`.
    pub fn build(self) -> ResultEngine<TransactionList<S>> {
        let store = self
            .store
            .ok_or_else(|| EngineError::Validation("a record store is required".to_string()))?;
        let query = ViewQuery {
            pagination: Pagination::new(1, self.settings.page_size),
            ..ViewQuery::default()
        };
        let (delete_failures, delete_failures_rx) = mpsc::unbounded_channel();
        Ok(TransactionList {
            store,
            settings: self.settings,
            records: self.records,
            query,
            overlay: Overlay::default(),
            selection: Selection::default(),
            scheduler: UndoScheduler::new(),
            pending_delete: None,
            delete_failures,
            delete_failures_rx: Some(delete_failures_rx),
            bulk: BulkEditor::default(),
            import_flight: SingleFlight::default(),
        })
    }
}
