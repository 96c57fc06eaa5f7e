//! Error types surfaced by the typing core.
//!
//! Only conditions the caller can act on are errors. Malformed directives,
//! out-of-range pause durations and unknown languages all degrade to a safe
//! default instead (typed literally, clamped, universal rules only).

use thiserror::Error;

/// Rejected words-per-minute input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpeedError {
    #[error("{field} WPM is not a number: '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} WPM must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("min WPM ({min}) is greater than max WPM ({max})")]
    Inverted { min: f64, max: f64 },
}

/// A pattern rule that failed load-time validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("rule in category '{0}' has an empty token")]
    EmptyToken(String),

    #[error("rule '{token}' has non-positive speed multiplier {value}")]
    NonPositiveMultiplier { token: String, value: f64 },

    #[error("rule '{token}' has invalid {which} pause {value}s")]
    InvalidPause {
        token: String,
        which: &'static str,
        value: f64,
    },

    #[error("rule '{token}' could not be compiled: {source}")]
    Regex {
        token: String,
        #[source]
        source: regex::Error,
    },
}

/// Invalid pause-duration bounds handed to the directive parser.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("pause bounds must satisfy 0 <= min <= max, got [{min}, {max}]")]
pub struct BoundsError {
    pub min: f64,
    pub max: f64,
}

/// Errors returned by the [`Typist`](crate::Typist) control surface.
#[derive(Debug, Error)]
pub enum TypingError {
    #[error(transparent)]
    InvalidSpeed(#[from] SpeedError),
}
