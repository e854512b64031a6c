//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum CrafterError {
    /// Sampling was requested from a buffer holding no transitions.
    #[error("Cannot sample from an empty replay buffer")]
    EmptyBuffer,

    /// Prioritized sampling without replacement needs at least `requested`
    /// slots with nonzero priority.
    #[error("Requested {requested} samples but only {available} slots have nonzero priority")]
    InsufficientSamples {
        /// Batch size asked for.
        requested: usize,
        /// Number of slots that can be drawn.
        available: usize,
    },

    /// An observation did not match the configured shape.
    #[error("Observation shape mismatch: expected {expected:?}, got {got:?}")]
    ObservationShape {
        /// Shape declared in the configuration.
        expected: Vec<usize>,
        /// Shape of the given observation.
        got: Vec<usize>,
    },

    /// The global gradient norm was NaN or infinite.
    #[error("Non-finite gradient norm: {0}")]
    NonFiniteGradient(f64),

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
