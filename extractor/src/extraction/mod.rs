//! Schema-constrained extraction with bounded retries.
//!
//! - [`Extractor`] - Async retry loop with repair feedback
//! - [`ExtractionResult`] - Terminal `ok`/`error` outcome
//! - [`ExtractionError`] - Typed error enum with attempt history
//! - [`ExtractionMetrics`] - Token and timing metrics
//! - [`ExtractionConfig`] - Retry behavior configuration
//! - [`extract`] / [`extract_from_html`] - One-call entry points

pub mod config;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod orchestrator;
pub mod parse;
pub mod result;

pub use config::ExtractionConfig;
pub use error::{AttemptError, AttemptRecord, ExtractionError};
pub use feedback::build_validation_feedback;
pub use metrics::{estimate_tokens, ExtractionMetrics};
pub use orchestrator::{Extraction, Extractor};
pub use parse::ParseError;
pub use result::ExtractionResult;

use crate::client::ModelClient;
use crate::error::InputError;
use crate::prompt::PromptConfig;
use crate::schema::SchemaDescriptor;
use crate::text::TextConfig;

/// Extracts a schema-conforming object from already-extracted text.
///
/// Uses the default prompt layout and makes at most `max_tries` model calls.
///
/// # Errors
///
/// Returns an `InputError` for an invalid descriptor or `max_tries == 0`.
/// Every other outcome, including exhausted retries, is an [`ExtractionResult`].
pub async fn extract<C>(
    extracted_text: &str,
    schema: &SchemaDescriptor,
    system_prompt: &str,
    client: &C,
    max_tries: usize,
) -> Result<ExtractionResult, InputError>
where
    C: ModelClient + ?Sized,
{
    let extractor = Extractor::new(schema.clone()).max_attempts(max_tries);
    ExtractionResult::from_run(extractor.run(extracted_text, system_prompt, client).await)
}

/// Renders a markup fragment to text, then extracts from it.
///
/// # Errors
///
/// As [`extract`], plus an `InputError` when the fragment cannot be rendered.
pub async fn extract_from_html<C>(
    fragment: &str,
    text_config: &TextConfig,
    schema: &SchemaDescriptor,
    system_prompt: &str,
    prompt_config: PromptConfig,
    client: &C,
    max_tries: usize,
) -> Result<ExtractionResult, InputError>
where
    C: ModelClient + ?Sized,
{
    let extractor = Extractor::with_config(
        schema.clone(),
        prompt_config,
        ExtractionConfig::default().with_max_attempts(max_tries),
    );
    ExtractionResult::from_run(
        extractor
            .run_html(fragment, text_config, system_prompt, client)
            .await,
    )
}
