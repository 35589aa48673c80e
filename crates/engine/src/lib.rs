//! Client-side transaction list engine.
//!
//! [`TransactionList`] is the entry point. The pieces it wires together are
//! public on their own as well: the pure [`view`] pipeline, [`Selection`],
//! the [`Overlay`] mask, the [`UndoScheduler`] and the [`BulkEditor`].

pub use bulk::{BulkEditor, BulkReport, normalize_patch};
pub use error::EngineError;
pub use filter::{FilterCriteria, FlagFilter};
pub use flight::{FlightPermit, SingleFlight};
pub use list::{DeleteFailure, TransactionList, TransactionListBuilder};
pub use overlay::Overlay;
pub use pipeline::{
    DEFAULT_PAGE_SIZE, Facets, Pagination, ViewPage, ViewQuery, reachable_ids, view,
};
pub use scheduler::{
    ActionError, BoxError, COUNTDOWN_TICK, DEFAULT_UNDO_DELAY, PendingAction, SchedulerState,
    UndoScheduler,
};
pub use selection::Selection;
pub use settings::EngineSettings;
pub use sort::{SortDirection, SortField, SortSpec};
pub use store::RecordStore;

mod bulk;
mod error;
mod filter;
mod flight;
mod list;
mod overlay;
mod pipeline;
mod scheduler;
mod selection;
mod settings;
mod sort;
mod store;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
