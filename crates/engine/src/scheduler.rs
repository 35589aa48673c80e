//! Countdown-then-execute scheduler with undo.
//!
//! State machine: `Idle -> Pending -> {Executed | Undone} -> Idle`. Only one
//! action can be pending; triggering another supersedes the first without
//! calling its undo callback.
//!
//! Expiry and [`UndoScheduler::undo`] both take the pending action out of the
//! same locked slot, so exactly one of them wins. The timer task also checks
//! a generation counter, so a superseded timer that is already past its
//! deadline finds nothing to run.
//!
//! The scheduler spawns onto the ambient tokio runtime; `trigger` must be
//! called from within one.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use thiserror::Error;
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
    time::{self, Instant, MissedTickBehavior},
};

pub const DEFAULT_UNDO_DELAY: Duration = Duration::from_millis(5000);
pub const COUNTDOWN_TICK: Duration = Duration::from_millis(100);

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type ExecuteFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// Failure of an executed action, as handed to the error callback.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(BoxError),
    /// The action panicked; carries the panic message.
    #[error("action panicked: {0}")]
    Panicked(String),
    /// The action's task was cancelled before it finished, e.g. on runtime
    /// shutdown.
    #[error("action was cancelled")]
    Cancelled,
}

impl ActionError {
    fn from_join(err: JoinError) -> Self {
        if err.is_cancelled() {
            return Self::Cancelled;
        }
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::Panicked(message)
    }
}

/// An action waiting out its undo window.
pub struct PendingAction {
    message: String,
    delay: Duration,
    on_execute: Box<dyn FnOnce() -> ExecuteFuture + Send>,
    on_undo: Option<Box<dyn FnOnce() + Send>>,
    on_error: Option<Box<dyn FnOnce(ActionError) + Send>>,
}

impl PendingAction {
    pub fn new<F, Fut, E>(message: impl Into<String>, on_execute: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            message: message.into(),
            delay: DEFAULT_UNDO_DELAY,
            on_execute: Box::new(move || Box::pin(async move { on_execute().await.map_err(Into::into) })),
            on_undo: None,
            on_error: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn on_undo(mut self, on_undo: impl FnOnce() + Send + 'static) -> Self {
        self.on_undo = Some(Box::new(on_undo));
        self
    }

    pub fn on_error(mut self, on_error: impl FnOnce(ActionError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }
}

impl fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAction")
            .field("message", &self.message)
            .field("delay", &self.delay)
            .field("on_undo", &self.on_undo.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending {
        message: String,
        remaining: Duration,
        total: Duration,
    },
}

struct Armed {
    action: PendingAction,
    started_at: Instant,
    timer: JoinHandle<()>,
}

struct Slot {
    generation: u64,
    armed: Option<Armed>,
    remaining: watch::Sender<Duration>,
}

pub struct UndoScheduler {
    slot: Arc<Mutex<Slot>>,
    remaining: watch::Receiver<Duration>,
    tick: Duration,
}

impl Default for UndoScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoScheduler {
    pub fn new() -> Self {
        Self::with_tick(COUNTDOWN_TICK)
    }

    pub fn with_tick(tick: Duration) -> Self {
        let (sender, receiver) = watch::channel(Duration::ZERO);
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                armed: None,
                remaining: sender,
            })),
            remaining: receiver,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// Arms `action`, silently cancelling whatever was pending before.
    ///
    /// Returns `true` if a pending action was superseded. Its undo callback is
    /// not called.
    pub fn trigger(&self, action: PendingAction) -> bool {
        let mut slot = lock(&self.slot);
        let superseded = match slot.armed.take() {
            Some(previous) => {
                previous.timer.abort();
                tracing::debug!(message = %previous.action.message, "pending action superseded");
                true
            }
            None => false,
        };

        slot.generation += 1;
        let generation = slot.generation;
        let started_at = Instant::now();
        let delay = action.delay;
        slot.remaining.send_replace(delay);

        let timer = tokio::spawn(countdown(
            Arc::clone(&self.slot),
            generation,
            started_at,
            delay,
            self.tick,
        ));
        tracing::debug!(message = %action.message, ?delay, "pending action armed");
        slot.armed = Some(Armed {
            action,
            started_at,
            timer,
        });
        superseded
    }

    /// Cancels the pending action and runs its undo callback.
    ///
    /// Returns `false` when nothing was pending.
    pub fn undo(&self) -> bool {
        let armed = {
            let mut slot = lock(&self.slot);
            let armed = slot.armed.take();
            if armed.is_some() {
                slot.remaining.send_replace(Duration::ZERO);
            }
            armed
        };
        let Some(armed) = armed else {
            tracing::debug!("undo requested with nothing pending");
            return false;
        };

        armed.timer.abort();
        tracing::info!(message = %armed.action.message, "pending action undone");
        if let Some(on_undo) = armed.action.on_undo {
            on_undo();
        }
        true
    }

    /// Drops the pending action without calling any of its callbacks.
    pub fn dispose(&self) {
        let mut slot = lock(&self.slot);
        if let Some(armed) = slot.armed.take() {
            armed.timer.abort();
            slot.remaining.send_replace(Duration::ZERO);
            tracing::debug!(message = %armed.action.message, "pending action abandoned");
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).armed.is_some()
    }

    pub fn state(&self) -> SchedulerState {
        let slot = lock(&self.slot);
        match &slot.armed {
            None => SchedulerState::Idle,
            Some(armed) => SchedulerState::Pending {
                message: armed.action.message.clone(),
                remaining: armed.action.delay.saturating_sub(armed.started_at.elapsed()),
                total: armed.action.delay,
            },
        }
    }

    /// Remaining time as of the last countdown tick.
    pub fn time_remaining(&self) -> Duration {
        *self.remaining.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Duration> {
        self.remaining.clone()
    }
}

impl Drop for UndoScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publishes a countdown value; `false` if this timer was superseded.
fn publish(slot: &Mutex<Slot>, generation: u64, remaining: Duration) -> bool {
    let slot = lock(slot);
    if slot.generation != generation || slot.armed.is_none() {
        return false;
    }
    slot.remaining.send_replace(remaining);
    true
}

fn take_expired(slot: &Mutex<Slot>, generation: u64) -> Option<PendingAction> {
    let mut slot = lock(slot);
    if slot.generation != generation {
        return None;
    }
    let armed = slot.armed.take()?;
    slot.remaining.send_replace(Duration::ZERO);
    Some(armed.action)
}

async fn countdown(
    slot: Arc<Mutex<Slot>>,
    generation: u64,
    started_at: Instant,
    delay: Duration,
    tick: Duration,
) {
    let mut ticker = time::interval_at(started_at + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let expiry = time::sleep_until(started_at + delay);
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            biased;
            () = &mut expiry => break,
            _ = ticker.tick() => {
                let remaining = delay.saturating_sub(started_at.elapsed());
                if !publish(&slot, generation, remaining) {
                    return;
                }
            }
        }
    }

    // Back to idle before running, so the action may trigger a successor.
    let Some(action) = take_expired(&slot, generation) else {
        return;
    };
    execute(action).await;
}

async fn execute(action: PendingAction) {
    let PendingAction {
        message,
        on_execute,
        on_error,
        ..
    } = action;
    tracing::info!(%message, "executing pending action");

    let outcome = match tokio::spawn(async move { on_execute().await }).await {
        Ok(result) => result.map_err(ActionError::Failed),
        Err(err) => Err(ActionError::from_join(err)),
    };

    if let Err(err) = outcome {
        tracing::warn!(%message, error = %err, "pending action failed");
        if let Some(on_error) = on_error {
            on_error(err);
        }
    }
}
