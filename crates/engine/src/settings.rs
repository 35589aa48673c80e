use std::time::Duration;

use chrono_tz::Tz;

use crate::{pipeline::DEFAULT_PAGE_SIZE, scheduler::DEFAULT_UNDO_DELAY};

/// Tunables for a [`TransactionList`](crate::TransactionList).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// How long a delete can be undone before it is sent to the store.
    pub undo_delay: Duration,
    pub page_size: usize,
    /// Zone whose calendar days the date filters refer to.
    pub timezone: Tz,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            undo_delay: DEFAULT_UNDO_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
            timezone: Tz::UTC,
        }
    }
}
