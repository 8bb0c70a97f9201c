//! The terminal, serialisable outcome of an extraction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ExtractionError;
use super::orchestrator::Extraction;
use crate::error::InputError;

/// Outcome handed back to callers once the retry loop has finished.
///
/// Serialises as `{"status": "ok", "value": {...}}` or
/// `{"status": "error", "reason": "...", "attempts": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ExtractionResult {
    /// A conforming object was produced.
    #[serde(rename = "ok")]
    Success {
        /// The descriptor's fields with coerced values.
        value: Map<String, Value>,
    },

    /// Every attempt failed, or the deadline elapsed.
    #[serde(rename = "error")]
    Failure {
        /// Readable description of the last failure.
        reason: String,
        /// Attempts made before giving up.
        attempts: usize,
    },
}

impl ExtractionResult {
    /// Collapses a rich run outcome. Input errors stay fatal.
    ///
    /// # Errors
    ///
    /// Returns the `InputError` when the run never started.
    pub fn from_run(run: Result<Extraction, ExtractionError>) -> Result<Self, InputError> {
        match run {
            Ok(extraction) => Ok(Self::Success {
                value: extraction.value,
            }),
            Err(ExtractionError::Input(error)) => Err(error),
            Err(ExtractionError::RetriesExhausted {
                attempts,
                last_error,
                ..
            }) => Ok(Self::Failure {
                reason: last_error.to_string(),
                attempts,
            }),
            Err(error) => Ok(Self::Failure {
                reason: error.to_string(),
                attempts: error.attempts(),
            }),
        }
    }

    /// Whether a conforming object was produced.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The extracted object, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Success { value } => Some(value),
            Self::Failure { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::extraction::error::AttemptError;
    use crate::extraction::metrics::ExtractionMetrics;
    use crate::extraction::parse::ParseError;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_success_serialises_with_status_ok() {
        let mut value = Map::new();
        value.insert("code".to_string(), json!("1241-100468"));
        value.insert("price".to_string(), json!(2871));
        let result = ExtractionResult::Success { value };

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "ok", "value": {"code": "1241-100468", "price": 2871}})
        );
    }

    #[test]
    fn test_failure_serialises_with_reason_and_attempts() {
        let result = ExtractionResult::Failure {
            reason: "no JSON object found in model output".to_string(),
            attempts: 5,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["attempts"], 5);

        let back: ExtractionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_from_run_uses_last_error_as_reason() {
        let run = Err(ExtractionError::RetriesExhausted {
            attempts: 3,
            last_error: AttemptError::Parse(ParseError::NoObject),
            history: Vec::new(),
            metrics: ExtractionMetrics::default(),
        });

        assert_eq!(
            ExtractionResult::from_run(run).unwrap(),
            ExtractionResult::Failure {
                reason: "no JSON object found in model output".to_string(),
                attempts: 3,
            }
        );
    }

    #[test]
    fn test_from_run_maps_timeout_to_failure() {
        let run = Err(ExtractionError::TimedOut {
            attempts: 2,
            elapsed: Duration::from_secs(1),
            history: Vec::new(),
        });
        let result = ExtractionResult::from_run(run).unwrap();
        assert!(!result.is_success());
        assert!(matches!(result, ExtractionResult::Failure { attempts: 2, .. }));
    }

    #[test]
    fn test_from_run_keeps_input_errors_fatal() {
        let run = Err(ExtractionError::Input(InputError::ZeroAttempts));
        assert_eq!(ExtractionResult::from_run(run), Err(InputError::ZeroAttempts));
    }
}
