use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use api_types::{
    import::{ImportRequest, ImportSummary},
    transaction::{RecordId, RecordPatch, RecordStatus, TransactionRecord},
};
use chrono::{TimeZone, Utc};

use engine::{
    DeleteFailure, EngineError, EngineSettings, FilterCriteria, RecordStore, ResultEngine, SchedulerState,
    SortDirection, SortField, SortSpec, TransactionList,
};

/// In-memory store that records every call.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<Vec<TransactionRecord>>,
    deleted: Mutex<Vec<RecordId>>,
    updated: Mutex<Vec<RecordId>>,
    imports: Mutex<Vec<String>>,
    fail_delete: AtomicBool,
    fail_update: Mutex<HashSet<RecordId>>,
}

impl MemoryStore {
    fn with(records: Vec<TransactionRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            ..Self::default()
        })
    }

    fn deleted(&self) -> Vec<RecordId> {
        self.deleted.lock().unwrap().clone()
    }
}

impl RecordStore for MemoryStore {
    async fn fetch_records(&self) -> ResultEngine<Vec<TransactionRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update_record(
        &self,
        id: &RecordId,
        patch: &RecordPatch,
    ) -> ResultEngine<TransactionRecord> {
        if self.fail_update.lock().unwrap().contains(id) {
            return Err(EngineError::Conflict(format!("{id} was modified")));
        }
        self.updated.lock().unwrap().push(id.clone());
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_record(&self, id: &RecordId) -> ResultEngine<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(EngineError::Server("storage unavailable".to_string()));
        }
        self.deleted.lock().unwrap().push(id.clone());
        self.records.lock().unwrap().retain(|r| &r.id != id);
        Ok(())
    }

    async fn import_records(&self, request: &ImportRequest) -> ResultEngine<ImportSummary> {
        self.imports.lock().unwrap().push(request.file_name.clone());
        Ok(ImportSummary {
            imported: 2,
            duplicates: 1,
            finished_at: None,
        })
    }
}

fn record(id: &str, day: u32, amount_minor: i64, status: RecordStatus) -> TransactionRecord {
    TransactionRecord {
        id: id.into(),
        date: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        description: format!("Payment {id}"),
        amount_minor,
        origin: "Checking".to_string(),
        bank: "First Bank".to_string(),
        status,
        flagged: false,
        major_category: None,
        category: None,
        tags: Default::default(),
        notes: None,
    }
}

fn three_records() -> Vec<TransactionRecord> {
    vec![
        record("T1", 1, -5000, RecordStatus::Pending),
        record("T2", 2, 2000, RecordStatus::Categorized),
        record("T3", 3, -20000, RecordStatus::Pending),
    ]
}

async fn list_with(
    records: Vec<TransactionRecord>,
    settings: EngineSettings,
) -> (TransactionList<MemoryStore>, Arc<MemoryStore>) {
    let store = MemoryStore::with(records);
    let mut list = TransactionList::builder()
        .shared_store(Arc::clone(&store))
        .settings(settings)
        .build()
        .unwrap();
    list.refresh().await.unwrap();
    (list, store)
}

fn page_ids(list: &TransactionList<MemoryStore>) -> Vec<String> {
    list.view().ids().iter().map(ToString::to_string).collect()
}

fn amounts(list: &TransactionList<MemoryStore>) -> Vec<i64> {
    list.view().records.iter().map(|r| r.amount_minor).collect()
}

fn id(value: &str) -> RecordId {
    RecordId::from(value)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance_ms(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

#[tokio::test]
async fn build_requires_a_store() {
    let result = TransactionList::<MemoryStore>::builder().build();
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn amount_sort_and_status_filter_round_trip() {
    let (mut list, _store) = list_with(three_records(), EngineSettings::default()).await;

    list.set_sort(SortSpec::new(SortField::Amount, SortDirection::Desc));
    assert_eq!(amounts(&list), [-20000, -5000, 2000]);

    list.update_criteria(|criteria| criteria.status = Some(RecordStatus::Pending));
    assert_eq!(amounts(&list), [-20000, -5000]);

    list.clear_filters();
    assert_eq!(amounts(&list), [-20000, -5000, 2000]);
}

#[tokio::test]
async fn sort_by_same_field_flips_direction() {
    let (mut list, _store) = list_with(three_records(), EngineSettings::default()).await;

    list.sort_by(SortField::Date);
    assert_eq!(page_ids(&list), ["T1", "T2", "T3"]);

    list.sort_by(SortField::Amount);
    assert_eq!(list.query().sort.direction, SortDirection::Desc);
    assert_eq!(page_ids(&list), ["T3", "T1", "T2"]);
}

#[tokio::test]
async fn range_select_over_the_page() {
    let records = vec![
        record("A", 4, 100, RecordStatus::Pending),
        record("B", 3, 100, RecordStatus::Pending),
        record("C", 2, 100, RecordStatus::Pending),
        record("D", 1, 100, RecordStatus::Pending),
    ];
    let (mut list, _store) = list_with(records, EngineSettings::default()).await;
    assert_eq!(page_ids(&list), ["A", "B", "C", "D"]);

    list.toggle_selection(&id("A"), false);
    list.toggle_selection(&id("D"), true);
    assert_eq!(list.selection().len(), 4);
    assert!(list.is_page_selected());

    list.toggle_selection(&id("B"), false);
    assert!(!list.selection().is_selected(&id("B")));
    assert_eq!(list.selection().len(), 3);

    list.toggle_page_selection();
    assert!(list.is_page_selected());
    list.toggle_page_selection();
    assert!(list.selection().is_empty());
}

#[tokio::test]
async fn page_is_clamped_when_the_filter_narrows() {
    let settings = EngineSettings {
        page_size: 2,
        ..EngineSettings::default()
    };
    let (mut list, _store) = list_with(three_records(), settings).await;

    list.set_page(9);
    assert_eq!(list.view().page, 2);
    assert_eq!(list.view().total_pages, 2);

    list.update_criteria(|criteria| criteria.status = Some(RecordStatus::Categorized));
    let page = list.view();
    assert_eq!(page.page, 1);
    assert_eq!(page.total_filtered, 1);

    list.prev_page();
    assert_eq!(list.view().page, 1);
}

#[tokio::test]
async fn stale_selection_is_reported_and_still_edited() {
    let (mut list, store) = list_with(three_records(), EngineSettings::default()).await;

    list.toggle_selection(&id("T2"), false);
    list.set_criteria(FilterCriteria {
        status: Some(RecordStatus::Pending),
        ..FilterCriteria::default()
    });
    assert_eq!(list.stale_selection(), [id("T2")]);

    list.update_bulk_form(|form| form.flagged = Some(true));
    let report = list.apply_bulk_edit().await.unwrap();

    assert_eq!(report.updated.len(), 1);
    assert_eq!(*store.updated.lock().unwrap(), [id("T2")]);
    assert!(list.selection().is_empty());
    assert!(list.stale_selection().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delete_then_undo_restores_sorted_position() {
    let (mut list, store) = list_with(three_records(), EngineSettings::default()).await;
    list.set_sort(SortSpec::new(SortField::Amount, SortDirection::Desc));

    list.request_delete(&id("T1")).unwrap();
    assert_eq!(page_ids(&list), ["T3", "T2"]);
    assert!(matches!(list.pending(), SchedulerState::Pending { .. }));

    advance_ms(2000).await;
    assert!(list.undo());
    assert_eq!(page_ids(&list), ["T3", "T1", "T2"]);
    assert_eq!(list.pending(), SchedulerState::Idle);

    advance_ms(4000).await;
    assert!(store.deleted().is_empty());
    assert!(!list.undo());
}

#[tokio::test(start_paused = true)]
async fn delete_executes_after_the_window() {
    let (mut list, store) = list_with(three_records(), EngineSettings::default()).await;
    list.toggle_selection(&id("T1"), false);

    list.request_delete(&id("T1")).unwrap();
    assert!(list.selection().is_empty());

    advance_ms(4900).await;
    assert!(store.deleted().is_empty());

    advance_ms(200).await;
    assert_eq!(store.deleted(), [id("T1")]);
    assert!(list.is_hidden(&id("T1")));

    list.refresh().await.unwrap();
    assert!(!list.is_hidden(&id("T1")));
    assert_eq!(list.records().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_delete_reveals_the_record() {
    let (mut list, store) = list_with(three_records(), EngineSettings::default()).await;
    store.fail_delete.store(true, Ordering::SeqCst);
    let mut failures = list.take_delete_failures().unwrap();
    assert!(list.take_delete_failures().is_none());

    list.request_delete(&id("T2")).unwrap();
    assert!(list.is_hidden(&id("T2")));

    advance_ms(5100).await;
    assert!(!list.is_hidden(&id("T2")));
    assert!(page_ids(&list).contains(&"T2".to_string()));
    assert_eq!(
        failures.try_recv().unwrap(),
        DeleteFailure {
            id: id("T2"),
            description: "Payment T2".to_string(),
            error: "Server error: storage unavailable".to_string(),
        }
    );
    assert!(failures.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn superseded_delete_comes_back_into_view() {
    let (mut list, store) = list_with(three_records(), EngineSettings::default()).await;

    list.request_delete(&id("T1")).unwrap();
    advance_ms(1000).await;
    list.request_delete(&id("T2")).unwrap();

    assert!(!list.is_hidden(&id("T1")));
    assert!(list.is_hidden(&id("T2")));

    advance_ms(5100).await;
    assert_eq!(store.deleted(), [id("T2")]);
}

#[tokio::test(start_paused = true)]
async fn countdown_reaches_zero() {
    let settings = EngineSettings {
        undo_delay: Duration::from_millis(1000),
        ..EngineSettings::default()
    };
    let (mut list, _store) = list_with(three_records(), settings).await;
    let countdown = list.countdown();

    list.request_delete(&id("T3")).unwrap();
    assert_eq!(*countdown.borrow(), Duration::from_millis(1000));

    advance_ms(400).await;
    let midway = *countdown.borrow();
    assert!(midway <= Duration::from_millis(600));
    assert!(midway > Duration::ZERO);

    advance_ms(700).await;
    assert_eq!(*countdown.borrow(), Duration::ZERO);
}

#[tokio::test]
async fn deleting_an_unknown_record_fails() {
    let (mut list, _store) = list_with(three_records(), EngineSettings::default()).await;
    assert_eq!(
        list.request_delete(&id("nope")),
        Err(EngineError::NotFound("nope".to_string()))
    );
}

#[tokio::test]
async fn bulk_edit_merges_updated_records() {
    let (mut list, _store) = list_with(three_records(), EngineSettings::default()).await;
    list.toggle_selection(&id("T1"), false);
    list.toggle_selection(&id("T3"), false);
    list.update_bulk_form(|form| {
        form.category = Some(" Groceries ".to_string());
        form.notes = Some("  ".to_string());
    });

    let report = list.apply_bulk_edit().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.message(), "Updated 2 transaction(s)");
    let categorized: Vec<_> = list
        .records()
        .iter()
        .filter(|r| r.category.as_deref() == Some("Groceries"))
        .map(|r| r.id.to_string())
        .collect();
    assert_eq!(categorized, ["T1", "T3"]);
    assert!(list.selection().is_empty());
    assert_eq!(list.bulk_form(), RecordPatch::default());
}

#[tokio::test]
async fn input_made_while_bulk_edit_runs_is_kept() {
    let (mut list, _store) = list_with(three_records(), EngineSettings::default()).await;
    list.toggle_selection(&id("T1"), false);
    list.update_bulk_form(|form| form.flagged = Some(true));

    let running = list.start_bulk_edit();
    assert!(list.is_bulk_busy());
    list.toggle_selection(&id("T3"), false);
    list.update_bulk_form(|form| form.category = Some("Rent".to_string()));

    let result = running.await;
    list.finish_bulk_edit(&result);

    let report = result.unwrap();
    assert_eq!(report.targets, [id("T1")]);
    assert_eq!(list.selection().ids(), [id("T3")]);
    assert_eq!(list.bulk_form().category.as_deref(), Some("Rent"));
    assert!(list.records().iter().any(|r| r.id == id("T1") && r.flagged));
    assert!(!list.records().iter().any(|r| r.id == id("T3") && r.flagged));

    list.reset_bulk_form();
    assert_eq!(list.bulk_form(), RecordPatch::default());
}

#[tokio::test]
async fn bulk_edit_partial_failure_keeps_selection() {
    let (mut list, store) = list_with(three_records(), EngineSettings::default()).await;
    store.fail_update.lock().unwrap().insert(id("T2"));
    list.toggle_selection(&id("T1"), false);
    list.toggle_selection(&id("T2"), false);
    list.update_bulk_form(|form| form.status = Some(RecordStatus::Categorized));

    let report = list.apply_bulk_edit().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(
        report.message(),
        "Updated 1 of 2 transaction(s); 1 failed: Conflict: T2 was modified"
    );
    assert_eq!(list.selection().len(), 2);
    assert_eq!(list.bulk_form().status, Some(RecordStatus::Categorized));
    assert_eq!(list.records()[0].status, RecordStatus::Categorized);
}

#[tokio::test]
async fn bulk_edit_without_selection_is_rejected() {
    let (list, store) = list_with(three_records(), EngineSettings::default()).await;
    list.update_bulk_form(|form| form.flagged = Some(true));

    let result = list.start_bulk_edit().await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert!(store.updated.lock().unwrap().is_empty());
}

#[tokio::test]
async fn second_import_while_running_is_busy() {
    let (mut list, store) = list_with(three_records(), EngineSettings::default()).await;
    let request = ImportRequest {
        file_name: "march.csv".to_string(),
        bank: None,
        origin: None,
        contents: String::new(),
    };

    let first = list.start_import(request.clone());
    assert!(list.is_importing());
    let second = list.start_import(request.clone()).await;
    assert_eq!(second, Err(EngineError::Busy("import")));

    let summary = first.await.unwrap();
    assert_eq!(summary.imported, 2);
    assert!(!list.is_importing());
    assert_eq!(*store.imports.lock().unwrap(), ["march.csv"]);

    list.import(request).await.unwrap();
    assert_eq!(store.imports.lock().unwrap().len(), 2);
}
