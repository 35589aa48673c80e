use std::future::Future;

use api_types::{
    import::{ImportRequest, ImportSummary},
    transaction::{RecordId, RecordPatch, TransactionRecord},
};

use crate::ResultEngine;

/// The persistence collaborator behind the list.
///
/// Futures must be `Send`: deletes run from a spawned timer task.
pub trait RecordStore: Send + Sync + 'static {
    fn fetch_records(&self) -> impl Future<Output = ResultEngine<Vec<TransactionRecord>>> + Send;

    /// Applies `patch` and returns the updated copy of the record.
    fn update_record(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> impl Future<Output = ResultEngine<TransactionRecord>> + Send;

    fn delete_record(&self, id: &RecordId) -> impl Future<Output = ResultEngine<()>> + Send;

    fn import_records(
        &self,
        request: &ImportRequest,
    ) -> impl Future<Output = ResultEngine<ImportSummary>> + Send;
}
