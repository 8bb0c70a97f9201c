//! Error types for extraction operations with attempt history tracking.

use std::time::Duration;
use thiserror::Error;

use super::metrics::ExtractionMetrics;
use super::parse::ParseError;
use crate::client::ModelError;
use crate::error::InputError;
use crate::schema::FieldError;

/// Why a single attempt failed. Never escapes the retry loop on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The model capability failed to respond.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// No JSON object could be isolated from the output.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The object parsed but fields are missing or have non-coercible values.
    #[error("schema validation failed: {}", join_errors(.0))]
    Validation(Vec<FieldError>),
}

impl AttemptError {
    /// Names of the fields that failed validation, if any.
    #[must_use]
    pub fn failed_fields(&self) -> Vec<&str> {
        match self {
            Self::Validation(errors) => errors.iter().map(FieldError::field).collect(),
            Self::Model(_) | Self::Parse(_) => Vec::new(),
        }
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Record of a single failed extraction attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: usize,
    /// Raw model output; empty when the model call itself failed.
    pub raw_output: String,
    /// What went wrong.
    pub error: AttemptError,
    /// Elapsed time since the extraction started.
    pub elapsed: Duration,
}

/// Errors that can occur during extraction operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Fatal input problem detected before any model call.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Maximum attempts exhausted without a conforming output.
    #[error("Extraction failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Error of the final attempt.
        last_error: AttemptError,
        /// Every failed attempt, oldest first.
        history: Vec<AttemptRecord>,
        /// Metrics tracked across all attempts.
        metrics: ExtractionMetrics,
    },

    /// The overall extraction deadline elapsed.
    #[error("Extraction timed out after {elapsed:?} ({attempts} attempts started)")]
    TimedOut {
        /// Attempts started, including the one that was cut off.
        attempts: usize,
        /// Time spent before giving up.
        elapsed: Duration,
        /// Attempts that completed and failed before the deadline.
        history: Vec<AttemptRecord>,
    },

    /// A conforming value did not deserialize into the requested type.
    #[error("Deserialization to target type failed after {attempts} attempts: {message}")]
    Deserialize {
        /// Deserializer message.
        message: String,
        /// Attempts the successful extraction took.
        attempts: usize,
    },
}

impl ExtractionError {
    /// Number of attempts made; zero for input errors.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        match self {
            Self::Input(_) => 0,
            Self::RetriesExhausted { attempts, .. }
            | Self::TimedOut { attempts, .. }
            | Self::Deserialize { attempts, .. } => *attempts,
        }
    }

    /// Failed-attempt history, when the loop ran.
    #[must_use]
    pub fn history(&self) -> &[AttemptRecord] {
        match self {
            Self::RetriesExhausted { history, .. } | Self::TimedOut { history, .. } => history.as_slice(),
            Self::Input(_) | Self::Deserialize { .. } => &[],
        }
    }
}
