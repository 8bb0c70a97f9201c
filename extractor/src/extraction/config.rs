//! Configuration for extraction retry behavior.

use std::time::Duration;

/// Configuration for extraction retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Maximum number of attempts before giving up (default: 5).
    pub max_attempts: usize,
    /// Time limit for a single model call; a timed-out call is a failed attempt (default: none).
    pub attempt_timeout: Option<Duration>,
    /// Time limit for the whole retry loop (default: none).
    pub overall_timeout: Option<Duration>,
    /// Whether to include the expected output format in repair feedback (default: true).
    pub include_schema_in_feedback: bool,
    /// How many characters of an unparsable output are echoed back (default: 500).
    pub feedback_excerpt_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout: None,
            overall_timeout: None,
            include_schema_in_feedback: true,
            feedback_excerpt_chars: 500,
        }
    }
}

impl ExtractionConfig {
    /// Set the maximum number of retry attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set the per-attempt model call timeout.
    #[must_use]
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Set the timeout for the whole extraction.
    #[must_use]
    pub const fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = Some(timeout);
        self
    }

    /// Set whether to include the expected format in validation feedback.
    #[must_use]
    pub const fn with_schema_in_feedback(mut self, include: bool) -> Self {
        self.include_schema_in_feedback = include;
        self
    }

    /// Set how much of an unparsable output is echoed back to the model.
    #[must_use]
    pub const fn with_feedback_excerpt_chars(mut self, chars: usize) -> Self {
        self.feedback_excerpt_chars = chars;
        self
    }
}
