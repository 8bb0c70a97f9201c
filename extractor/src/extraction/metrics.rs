//! Metrics tracking and token estimation for extraction operations.

use std::time::Duration;

/// Metrics collected during an extraction operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionMetrics {
    /// Total number of attempts made.
    pub total_attempts: usize,
    /// Wall-clock time elapsed during extraction.
    pub wall_time: Duration,
    /// Estimated input tokens sent to the model across all attempts.
    pub estimated_input_tokens: usize,
    /// Estimated output tokens received from the model across all attempts.
    pub estimated_output_tokens: usize,
}

impl ExtractionMetrics {
    /// Builds metrics from character totals accumulated over the retry loop.
    #[must_use]
    pub const fn from_char_totals(
        total_attempts: usize,
        wall_time: Duration,
        input_chars: usize,
        output_chars: usize,
    ) -> Self {
        Self {
            total_attempts,
            wall_time,
            estimated_input_tokens: input_chars.div_ceil(4),
            estimated_output_tokens: output_chars.div_ceil(4),
        }
    }
}

/// Estimate token count from text using the standard 4-chars-per-token heuristic.
///
/// Uses `chars().count()` to handle UTF-8 correctly (not `len()` which counts bytes).
/// Returns ceiling division to avoid underestimation.
///
/// # Examples
///
/// ```
/// use webai_extractor::extraction::estimate_tokens;
///
/// assert_eq!(estimate_tokens("hello"), 2);  // 5 chars / 4 = 1.25 -> 2
/// assert_eq!(estimate_tokens("hello world"), 3);  // 11 chars / 4 = 2.75 -> 3
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
