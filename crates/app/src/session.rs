use std::fmt::Write as _;

use api_types::{
    import::{ImportRequest, ImportSummary},
    transaction::RecordPatch,
};
use chrono_tz::Tz;
use engine::{
    BulkReport, DeleteFailure, FilterCriteria, RecordStore, ResultEngine, SchedulerState, Selection, SortSpec,
    TransactionList, ViewPage,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    commands::{self, Command, FilterEdit, FormEdit},
    error::Result,
};

/// Completion of work started in the background.
#[derive(Debug)]
enum Event {
    BulkFinished(ResultEngine<BulkReport>),
    ImportFinished(ResultEngine<ImportSummary>),
    DeleteFailed(DeleteFailure),
}

/// Line-oriented session over stdin driving one [`TransactionList`].
pub struct Session<S> {
    list: TransactionList<S>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    should_quit: bool,
}

impl<S: RecordStore> Session<S> {
    /// Must be called within a tokio runtime.
    pub fn new(mut list: TransactionList<S>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        if let Some(mut failures) = list.take_delete_failures() {
            let events = events_tx.clone();
            tokio::spawn(async move {
                while let Some(failure) = failures.recv().await {
                    if events.send(Event::DeleteFailed(failure)).is_err() {
                        break;
                    }
                }
            });
        }
        Self {
            list,
            events_tx,
            events_rx,
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        if let Err(err) = self.list.refresh().await {
            tracing::error!("initial load failed: {err}");
            println!("Could not load transactions: {err}");
        }
        self.show();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while !self.should_quit {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await,
                    None => self.should_quit = true,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
            }
        }

        if let SchedulerState::Pending { message, .. } = self.list.pending() {
            println!("Discarding pending action: {message}");
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) {
        let command = match commands::parse_command(line) {
            Ok(command) => command,
            Err(commands::ParseError::Empty) => return,
            Err(err) => {
                println!("{err}");
                return;
            }
        };
        tracing::debug!(?command, "command");

        match command {
            Command::Show => self.show(),
            Command::Help => println!("{}", commands::HELP),
            Command::Quit => self.should_quit = true,
            Command::Refresh => {
                match self.list.refresh().await {
                    Ok(()) => self.show(),
                    Err(err) => println!("Refresh failed: {err}"),
                }
            }
            Command::Facets => println!("{}", render_facets(&self.list.view())),
            Command::NextPage => {
                self.list.next_page();
                self.show();
            }
            Command::PrevPage => {
                self.list.prev_page();
                self.show();
            }
            Command::Page(page) => {
                self.list.set_page(page);
                self.show();
            }
            Command::PageSize(size) => {
                self.list.set_page_size(size);
                self.show();
            }
            Command::Sort(field, direction) => {
                match direction {
                    Some(direction) => self.list.set_sort(SortSpec::new(field, direction)),
                    None => self.list.sort_by(field),
                }
                self.show();
            }
            Command::Filter(edit) => {
                self.list
                    .update_criteria(|criteria| apply_filter_edit(criteria, edit));
                self.show();
            }
            Command::ClearFilters => {
                self.list.clear_filters();
                self.show();
            }
            Command::Select { id, range } => {
                self.list.toggle_selection(&id, range);
                self.show();
            }
            Command::SelectPage => {
                self.list.toggle_page_selection();
                self.show();
            }
            Command::ClearSelection => {
                self.list.clear_selection();
                self.show();
            }
            Command::Delete(id) => match self.list.request_delete(&id) {
                Ok(()) => self.show(),
                Err(err) => println!("Cannot delete: {err}"),
            },
            Command::Undo => {
                if self.list.undo() {
                    self.show();
                } else {
                    println!("Nothing to undo");
                }
            }
            Command::Set(edit) => {
                self.list.update_bulk_form(|form| apply_form_edit(form, edit));
                println!("Bulk form: {}", render_form(&self.list.bulk_form()));
            }
            Command::ResetForm => {
                self.list.reset_bulk_form();
                println!("Bulk form cleared");
            }
            Command::Apply => self.start_bulk_edit(),
            Command::Import { path, bank, origin } => {
                let contents = match tokio::fs::read_to_string(&path).await {
                    Ok(contents) => contents,
                    Err(err) => {
                        println!("Cannot read {}: {err}", path.display());
                        return;
                    }
                };
                let request = ImportRequest {
                    file_name: path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string()),
                    bank,
                    origin,
                    contents,
                };
                self.start_import(request);
            }
        }
    }

    fn start_bulk_edit(&self) {
        if self.list.is_bulk_busy() {
            println!("A bulk edit is already in progress");
            return;
        }
        println!("Applying bulk edit to {} transaction(s)...", self.list.selection().len());
        let task = self.list.start_bulk_edit();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let _ = events.send(Event::BulkFinished(task.await));
        });
    }

    fn start_import(&self, request: ImportRequest) {
        if self.list.is_importing() {
            println!("An import is already in progress");
            return;
        }
        println!("Importing {}...", request.file_name);
        let task = self.list.start_import(request);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let _ = events.send(Event::ImportFinished(task.await));
        });
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::BulkFinished(result) => {
                self.list.finish_bulk_edit(&result);
                match &result {
                    Ok(report) => println!("{}", report.message()),
                    Err(err) => println!("Bulk edit failed: {err}"),
                }
                self.show();
            }
            Event::ImportFinished(Ok(summary)) => {
                println!(
                    "Imported {} transaction(s), {} duplicate(s) skipped",
                    summary.imported, summary.duplicates
                );
                if let Err(err) = self.list.refresh().await {
                    println!("Refresh failed: {err}");
                }
                self.show();
            }
            Event::ImportFinished(Err(err)) => println!("Import failed: {err}"),
            Event::DeleteFailed(failure) => {
                println!("{}", delete_failure_message(&failure));
                self.show();
            }
        }
    }

    fn show(&self) {
        let view = self.list.view();
        print!(
            "{}",
            render_page(
                &view,
                self.list.selection(),
                self.list.settings().timezone
            )
        );
        let stale = self.list.stale_selection().len();
        if stale > 0 {
            println!("{stale} selected transaction(s) are hidden by the current filters");
        }
        if let SchedulerState::Pending {
            message, remaining, ..
        } = self.list.pending()
        {
            println!("{message} (`undo` within {:.1}s)", remaining.as_secs_f64());
        }
    }
}

pub(crate) fn apply_filter_edit(criteria: &mut FilterCriteria, edit: FilterEdit) {
    match edit {
        FilterEdit::Status(status) => criteria.status = status,
        FilterEdit::MajorCategory(value) => criteria.major_category = value,
        FilterEdit::Category(value) => criteria.category = value,
        FilterEdit::Origin(value) => criteria.origin = value,
        FilterEdit::Bank(value) => criteria.bank = value,
        FilterEdit::Flagged(flagged) => criteria.flagged = flagged,
        FilterEdit::Tag(tag) => {
            if !criteria.tags.remove(&tag) {
                criteria.tags.insert(tag);
            }
        }
        FilterEdit::Search(value) => criteria.search = value,
        FilterEdit::From(date) => criteria.date_from = date,
        FilterEdit::To(date) => criteria.date_to = date,
    }
}

pub(crate) fn apply_form_edit(form: &mut RecordPatch, edit: FormEdit) {
    match edit {
        FormEdit::Status(status) => form.status = Some(status),
        FormEdit::Flagged(flagged) => form.flagged = Some(flagged),
        FormEdit::MajorCategory(value) => form.major_category = Some(value),
        FormEdit::Category(value) => form.category = Some(value),
        FormEdit::Tags(tags) => form.tags = Some(tags),
        FormEdit::Notes(value) => form.notes = Some(value),
    }
}

fn format_amount(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

pub(crate) fn render_page(view: &ViewPage<'_>, selection: &Selection, tz: Tz) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Page {}/{} - {} transaction(s), {} selected",
        view.page,
        view.total_pages.max(1),
        view.total_filtered,
        selection.len()
    );
    if view.records.is_empty() {
        let _ = writeln!(out, "  (no transactions)");
    }
    for record in &view.records {
        let mark = if selection.is_selected(&record.id) { "x" } else { " " };
        let flag = if record.flagged { "!" } else { " " };
        let _ = writeln!(
            out,
            "[{mark}]{flag}{:<10} {} {:>12}  {:<32} {} / {}  {}",
            record.id.as_str(),
            record.date.with_timezone(&tz).format("%Y-%m-%d"),
            format_amount(record.amount_minor),
            record.description,
            record.bank,
            record.origin,
            record.status.as_str(),
        );
    }
    out
}

fn render_facets(view: &ViewPage<'_>) -> String {
    let facets = &view.facets;
    let line = |name: &str, values: &[String]| format!("{name}: {}", values.join(", "));
    [
        line("origins", &facets.origins),
        line("banks", &facets.banks),
        line("major categories", &facets.major_categories),
        line("categories", &facets.categories),
    ]
    .join("\n")
}

fn delete_failure_message(failure: &DeleteFailure) -> String {
    format!(
        "Could not delete \"{}\": {}. It is back in the list.",
        failure.description, failure.error
    )
}

fn render_form(form: &RecordPatch) -> String {
    let mut fields = Vec::new();
    if let Some(status) = form.status {
        fields.push(format!("status={}", status.as_str()));
    }
    if let Some(flagged) = form.flagged {
        fields.push(format!("flagged={flagged}"));
    }
    if let Some(value) = &form.major_category {
        fields.push(format!("major={value}"));
    }
    if let Some(value) = &form.category {
        fields.push(format!("category={value}"));
    }
    if let Some(tags) = &form.tags {
        fields.push(format!(
            "tags={}",
            tags.iter().cloned().collect::<Vec<_>>().join(",")
        ));
    }
    if let Some(value) = &form.notes {
        fields.push(format!("notes={value}"));
    }
    if fields.is_empty() {
        return "(empty)".to_string();
    }
    fields.join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use api_types::transaction::{RecordStatus, TransactionRecord};
    use chrono::{TimeZone, Utc};
    use engine::{FlagFilter, ViewQuery};

    use super::*;

    fn record(id: &str, amount_minor: i64) -> TransactionRecord {
        TransactionRecord {
            id: id.into(),
            date: Utc.with_ymd_and_hms(2024, 6, 30, 23, 30, 0).unwrap(),
            description: "Corner shop".to_string(),
            amount_minor,
            origin: "Card".to_string(),
            bank: "Fineco".to_string(),
            status: RecordStatus::Pending,
            flagged: true,
            major_category: Some("Food".to_string()),
            category: None,
            tags: Default::default(),
            notes: None,
        }
    }

    #[test]
    fn amounts_keep_two_decimals() {
        assert_eq!(format_amount(-5000), "-50.00");
        assert_eq!(format_amount(1205), "12.05");
        assert_eq!(format_amount(-7), "-0.07");
    }

    #[test]
    fn page_marks_selection_and_uses_local_day() {
        let records = vec![record("T1", -1250), record("T2", 300)];
        let view = engine::view(&records, &HashSet::new(), &ViewQuery::default(), Tz::UTC);
        let mut selection = Selection::default();
        selection.toggle(&"T1".into(), &view.ids(), false);

        let rendered = render_page(&view, &selection, chrono_tz::Europe::Rome);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Page 1/1 - 2 transaction(s), 1 selected");
        assert!(lines[1].starts_with("[x]!T1"));
        assert!(lines[1].contains("2024-07-01"));
        assert!(lines[1].contains("-12.50"));
        assert!(lines[2].starts_with("[ ]!T2"));
    }

    #[test]
    fn empty_page_says_so() {
        let view = engine::view(&[], &HashSet::new(), &ViewQuery::default(), Tz::UTC);
        let rendered = render_page(&view, &Selection::default(), Tz::UTC);
        assert!(rendered.contains("Page 1/1 - 0 transaction(s)"));
        assert!(rendered.contains("(no transactions)"));
    }

    #[test]
    fn tag_filter_edit_toggles() {
        let mut criteria = FilterCriteria::default();
        apply_filter_edit(&mut criteria, FilterEdit::Tag("rent".to_string()));
        assert!(criteria.tags.contains("rent"));
        apply_filter_edit(&mut criteria, FilterEdit::Flagged(FlagFilter::Flagged));
        apply_filter_edit(&mut criteria, FilterEdit::Tag("rent".to_string()));
        assert!(criteria.tags.is_empty());
        assert_eq!(criteria.flagged, FlagFilter::Flagged);
    }

    #[test]
    fn form_edits_fill_the_patch() {
        let mut form = RecordPatch::default();
        assert_eq!(render_form(&form), "(empty)");
        apply_form_edit(&mut form, FormEdit::Category("Rent".to_string()));
        apply_form_edit(&mut form, FormEdit::Flagged(false));
        assert_eq!(render_form(&form), "flagged=false category=Rent");
    }

    #[test]
    fn failed_delete_names_the_record() {
        let failure = DeleteFailure {
            id: "T7".into(),
            description: "Corner Shop".to_string(),
            error: "Server error: storage unavailable".to_string(),
        };
        assert_eq!(
            delete_failure_message(&failure),
            "Could not delete \"Corner Shop\": Server error: storage unavailable. It is back in the list."
        );
    }
}
