//! The module contains the errors the engine can return.
//!
//! The list view itself never fails: filtering, sorting, pagination and
//! selection degrade to empty results. Errors only come from the store
//! collaborator and from the guards in front of it:
//!
//! - [`Validation`] malformed input, rejected before any side effect.
//! - [`Conflict`] the store rejected an update (e.g. stale data).
//! - [`NotFound`] the record does not exist.
//! - [`Transport`] the store could not be reached.
//! - [`Server`] the store failed for any other reason.
//! - [`Busy`] a single-flight operation is already running.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Conflict`]: EngineError::Conflict
//!  [`NotFound`]: EngineError::NotFound
//!  [`Transport`]: EngineError::Transport
//!  [`Server`]: EngineError::Server
//!  [`Busy`]: EngineError::Busy
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Server error: {0}")]
    Server(String),
    #[error("{0} already in progress")]
    Busy(&'static str),
}
