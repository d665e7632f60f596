//! Error types for the simulation core.

use thiserror::Error;

/// Errors raised by [`crate::engine::Simulation`] and [`crate::prng::Prng`].
///
/// All variants are programmer/input errors; there is nothing to retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SmplError {
    /// A required argument was missing or out of its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A facility handle was not registered with this engine.
    #[error("unknown facility handle")]
    UnknownHandle,

    /// An operation found the engine in a state it didn't expect.
    #[error("invalid state: {0}")]
    StateError(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SmplError>;
