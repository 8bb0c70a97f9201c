//! The bounded retry loop behind schema-constrained extraction.

use serde_json::{Map, Value};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::config::ExtractionConfig;
use super::error::{AttemptError, AttemptRecord, ExtractionError};
use super::feedback::{build_parse_error_feedback, build_validation_feedback, collect_validation_errors};
use super::metrics::ExtractionMetrics;
use super::parse::{isolate_json_object, normalize_keys};
use crate::client::{ModelClient, ModelError};
use crate::error::InputError;
use crate::prompt::{PromptAssembler, PromptConfig, PromptPayload};
use crate::schema::SchemaDescriptor;
use crate::text::{html_to_text, TextConfig};

/// A successful extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Exactly the descriptor's fields, coerced, in descriptor order.
    pub value: Map<String, Value>,
    /// Metrics tracked across all attempts.
    pub metrics: ExtractionMetrics,
    /// Attempts that failed before the successful one.
    pub history: Vec<AttemptRecord>,
}

/// Runs bounded, stateless retry loops against a [`ModelClient`].
///
/// Every attempt rebuilds the prompt from scratch; the only thing carried
/// between attempts is textual repair feedback describing the most recent
/// unusable output. The extractor holds no mutable state and can be shared
/// across concurrent extractions.
///
/// # Examples
///
/// ```
/// use webai_extractor::client::model_fn;
/// use webai_extractor::extraction::Extractor;
/// use webai_extractor::schema::{FieldType, SchemaDescriptor};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = SchemaDescriptor::new().field("price", FieldType::Integer, "price");
/// let model = model_fn(|_, _| async { Ok(r####"{"###price###": "2871"}"####.to_string()) });
///
/// let extraction = Extractor::new(schema).run("￥2,871", "Extract.", &model).await?;
/// assert_eq!(extraction.value["price"], 2871);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Extractor {
    schema: SchemaDescriptor,
    assembler: PromptAssembler,
    config: ExtractionConfig,
}

#[derive(Default)]
struct LoopState {
    attempts: usize,
    history: Vec<AttemptRecord>,
    input_chars: usize,
    output_chars: usize,
}

impl LoopState {
    fn metrics(&self, start: Instant) -> ExtractionMetrics {
        ExtractionMetrics::from_char_totals(
            self.attempts,
            start.elapsed(),
            self.input_chars,
            self.output_chars,
        )
    }
}

impl Extractor {
    /// Creates an extractor with the default prompt layout and configuration.
    #[must_use]
    pub fn new(schema: SchemaDescriptor) -> Self {
        Self::with_config(schema, PromptConfig::default(), ExtractionConfig::default())
    }

    /// Creates an extractor with explicit prompt layout and configuration.
    #[must_use]
    pub const fn with_config(
        schema: SchemaDescriptor,
        prompt: PromptConfig,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            schema,
            assembler: PromptAssembler::new(prompt),
            config,
        }
    }

    /// Sets the maximum number of attempts (fluent builder pattern).
    #[must_use]
    pub const fn max_attempts(mut self, max: usize) -> Self {
        self.config.max_attempts = max;
        self
    }

    /// The descriptor outputs are checked against.
    #[must_use]
    pub const fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// The retry configuration.
    #[must_use]
    pub const fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// The prompt assembler used for every attempt.
    #[must_use]
    pub const fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    /// Runs the retry loop over already-extracted text.
    ///
    /// # Errors
    ///
    /// - `ExtractionError::Input` if the descriptor is invalid or `max_attempts`
    ///   is zero; the model is never called.
    /// - `ExtractionError::RetriesExhausted` if no attempt produced a conforming object.
    /// - `ExtractionError::TimedOut` if the overall timeout elapsed.
    pub async fn run<C>(
        &self,
        text: &str,
        system_prompt: &str,
        client: &C,
    ) -> Result<Extraction, ExtractionError>
    where
        C: ModelClient + ?Sized,
    {
        self.schema.validate()?;
        if self.config.max_attempts == 0 {
            return Err(InputError::ZeroAttempts.into());
        }

        let start = Instant::now();
        if self.schema.is_empty() {
            debug!("empty schema, returning an empty object without calling the model");
            return Ok(Extraction {
                value: Map::new(),
                metrics: ExtractionMetrics {
                    wall_time: start.elapsed(),
                    ..ExtractionMetrics::default()
                },
                history: Vec::new(),
            });
        }

        let validator = jsonschema::Validator::new(&self.schema.to_json_schema())
            .map_err(|e| InputError::MalformedSchema(e.to_string()))?;

        info!(
            fields = self.schema.len(),
            max_attempts = self.config.max_attempts,
            text_chars = text.chars().count(),
            "starting extraction"
        );

        let mut state = LoopState::default();
        let outcome = match self.config.overall_timeout {
            Some(limit) => {
                let timed = timeout(
                    limit,
                    self.attempt_loop(text, system_prompt, client, &validator, start, &mut state),
                )
                .await;
                match timed {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(attempts = state.attempts, ?limit, "extraction deadline elapsed");
                        return Err(ExtractionError::TimedOut {
                            attempts: state.attempts,
                            elapsed: start.elapsed(),
                            history: state.history,
                        });
                    }
                }
            }
            None => {
                self.attempt_loop(text, system_prompt, client, &validator, start, &mut state)
                    .await
            }
        };

        let value = outcome?;
        let metrics = state.metrics(start);
        info!(
            attempts = metrics.total_attempts,
            wall_time_ms = u64::try_from(metrics.wall_time.as_millis()).unwrap_or(u64::MAX),
            "extraction succeeded"
        );
        Ok(Extraction {
            value,
            metrics,
            history: state.history,
        })
    }

    /// Renders a markup fragment to text, then runs the retry loop.
    ///
    /// An empty descriptor short-circuits before rendering.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus `ExtractionError::Input` when the fragment
    /// cannot be rendered.
    pub async fn run_html<C>(
        &self,
        fragment: &str,
        text_config: &TextConfig,
        system_prompt: &str,
        client: &C,
    ) -> Result<Extraction, ExtractionError>
    where
        C: ModelClient + ?Sized,
    {
        let text = if self.schema.is_empty() {
            String::new()
        } else {
            html_to_text(fragment, text_config)?
        };
        self.run(&text, system_prompt, client).await
    }

    /// Runs the retry loop and deserializes the result into `T`.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus `ExtractionError::Deserialize` if the
    /// conforming object does not fit `T`.
    pub async fn run_typed<T, C>(
        &self,
        text: &str,
        system_prompt: &str,
        client: &C,
    ) -> Result<(T, ExtractionMetrics), ExtractionError>
    where
        T: serde::de::DeserializeOwned,
        C: ModelClient + ?Sized,
    {
        let extraction = self.run(text, system_prompt, client).await?;
        let attempts = extraction.metrics.total_attempts;

        let typed = serde_json::from_value(Value::Object(extraction.value)).map_err(|e| {
            ExtractionError::Deserialize {
                message: e.to_string(),
                attempts,
            }
        })?;

        Ok((typed, extraction.metrics))
    }

    async fn attempt_loop<C>(
        &self,
        text: &str,
        system_prompt: &str,
        client: &C,
        validator: &jsonschema::Validator,
        start: Instant,
        state: &mut LoopState,
    ) -> Result<Map<String, Value>, ExtractionError>
    where
        C: ModelClient + ?Sized,
    {
        let max_attempts = self.config.max_attempts;
        let mut feedback: Option<String> = None;

        loop {
            state.attempts += 1;
            let attempt = state.attempts;

            let payload = match &feedback {
                Some(hint) => self.assembler.assemble_retry(system_prompt, text, &self.schema, hint),
                None => self.assembler.assemble(system_prompt, text, &self.schema),
            };
            state.input_chars += payload.system_instruction.chars().count()
                + payload.user_content.chars().count();

            debug!(
                attempt,
                max_attempts,
                user_content = %payload.user_content,
                "invoking model"
            );

            let (raw_output, error) = match self.invoke(client, &payload).await {
                Ok(raw_output) => {
                    state.output_chars += raw_output.chars().count();
                    debug!(attempt, raw_output = %raw_output, "model responded");
                    match self.evaluate(&raw_output, validator) {
                        Ok(value) => return Ok(value),
                        Err(error) => (raw_output, error),
                    }
                }
                Err(error) => (String::new(), AttemptError::Model(error)),
            };

            warn!(attempt, max_attempts, error = %error, "extraction attempt failed");

            if attempt < max_attempts {
                if let Some(hint) = self.feedback_for(&raw_output, &error, attempt) {
                    feedback = Some(hint);
                }
            }

            state.history.push(AttemptRecord {
                attempt_number: attempt,
                raw_output,
                error: error.clone(),
                elapsed: start.elapsed(),
            });

            if attempt >= max_attempts {
                return Err(ExtractionError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error,
                    metrics: state.metrics(start),
                    history: std::mem::take(&mut state.history),
                });
            }
        }
    }

    async fn invoke<C>(&self, client: &C, payload: &PromptPayload) -> Result<String, ModelError>
    where
        C: ModelClient + ?Sized,
    {
        let call = client.invoke(&payload.system_instruction, &payload.user_content);
        match self.config.attempt_timeout {
            Some(limit) => timeout(limit, call)
                .await
                .unwrap_or(Err(ModelError::Timeout(limit))),
            None => call.await,
        }
    }

    /// Isolates, normalises, coerces and validates one raw output.
    fn evaluate(
        &self,
        raw_output: &str,
        validator: &jsonschema::Validator,
    ) -> Result<Map<String, Value>, AttemptError> {
        let object = isolate_json_object(raw_output)?;
        let object = normalize_keys(object, &self.assembler.config().key_delimiter);
        let coerced = self
            .schema
            .coerce(&object)
            .map_err(AttemptError::Validation)?;

        let errors = collect_validation_errors(validator, &Value::Object(coerced.clone()));
        if errors.is_empty() {
            Ok(coerced)
        } else {
            Err(AttemptError::Validation(errors))
        }
    }

    /// Feedback for the next attempt; model failures produce none.
    fn feedback_for(&self, raw_output: &str, error: &AttemptError, attempt: usize) -> Option<String> {
        let format_line = self
            .config
            .include_schema_in_feedback
            .then(|| self.assembler.format_line(&self.schema));
        let max_attempts = self.config.max_attempts;
        let excerpt = self.config.feedback_excerpt_chars;

        match error {
            AttemptError::Model(_) => None,
            AttemptError::Parse(parse_error) => Some(build_parse_error_feedback(
                raw_output,
                &parse_error.to_string(),
                attempt,
                max_attempts,
                format_line.as_deref(),
                excerpt,
            )),
            AttemptError::Validation(errors) => Some(build_validation_feedback(
                raw_output,
                errors,
                attempt,
                max_attempts,
                format_line.as_deref(),
                excerpt,
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::client::model_fn;
    use crate::schema::FieldType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn price_schema() -> SchemaDescriptor {
        SchemaDescriptor::new().field("price", FieldType::Integer, "price of the product")
    }

    #[tokio::test]
    async fn test_validation_error_then_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let model = model_fn(move |_, user| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(r#"{"cost": 1}"#.to_string())
                } else {
                    assert!(user.contains("field 'price' is missing"));
                    assert!(user.contains(r#"{"cost": 1}"#));
                    Ok(r#"{"price": 10}"#.to_string())
                }
            }
        });

        let extraction = Extractor::new(price_schema())
            .max_attempts(3)
            .run("text", "sys", &model)
            .await
            .unwrap();

        assert_eq!(extraction.value["price"], 10);
        assert_eq!(extraction.metrics.total_attempts, 2);
        assert_eq!(extraction.history.len(), 1);
        assert_eq!(extraction.history[0].error.failed_fields(), vec!["price"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_max_attempts_exhausted() {
        let model = model_fn(|_, _| async { Ok("no json here".to_string()) });

        let err = Extractor::new(price_schema())
            .max_attempts(2)
            .run("text", "sys", &model)
            .await
            .unwrap_err();

        match err {
            ExtractionError::RetriesExhausted {
                attempts,
                history,
                metrics,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(history.len(), 2);
                assert_eq!(metrics.total_attempts, 2);
                assert!(matches!(last_error, AttemptError::Parse(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_error_keeps_previous_feedback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let model = model_fn(move |_, user| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Ok("garbage".to_string()),
                    1 => Err(ModelError::Invocation("busy".to_string())),
                    _ => {
                        assert!(user.contains("garbage"), "feedback lost: {user}");
                        Ok(r#"{"price": 3}"#.to_string())
                    }
                }
            }
        });

        let extraction = Extractor::new(price_schema())
            .run("text", "sys", &model)
            .await
            .unwrap();

        assert_eq!(extraction.metrics.total_attempts, 3);
        assert!(extraction.history[1].raw_output.is_empty());
        assert!(matches!(
            extraction.history[1].error,
            AttemptError::Model(ModelError::Invocation(_))
        ));
    }

    #[tokio::test]
    async fn test_attempt_timeout_consumes_a_try() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let model = model_fn(move |_, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok(r#"{"price": 5}"#.to_string())
            }
        });

        let extractor = Extractor::with_config(
            price_schema(),
            PromptConfig::default(),
            ExtractionConfig::default().with_attempt_timeout(Duration::from_millis(20)),
        );
        let extraction = extractor.run("text", "sys", &model).await.unwrap();

        assert_eq!(extraction.metrics.total_attempts, 2);
        assert!(matches!(
            extraction.history[0].error,
            AttemptError::Model(ModelError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_overall_timeout_stops_the_loop() {
        let model = model_fn(|_, _| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        });

        let extractor = Extractor::with_config(
            price_schema(),
            PromptConfig::default(),
            ExtractionConfig::default().with_overall_timeout(Duration::from_millis(20)),
        );
        let err = extractor.run("text", "sys", &model).await.unwrap_err();

        assert!(matches!(err, ExtractionError::TimedOut { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_zero_attempts_is_an_input_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let model = model_fn(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(String::new()) }
        });
        let err = Extractor::new(price_schema())
            .max_attempts(0)
            .run("text", "sys", &model)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Input(InputError::ZeroAttempts)));
        assert_eq!(err.attempts(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_typed() {
        #[derive(serde::Deserialize)]
        struct Product {
            price: i64,
        }

        let model = model_fn(|_, _| async { Ok(r#"{"price": 2871.0}"#.to_string()) });
        let (product, metrics): (Product, _) = Extractor::new(price_schema())
            .run_typed("text", "sys", &model)
            .await
            .unwrap();

        assert_eq!(product.price, 2871);
        assert_eq!(metrics.total_attempts, 1);
    }

    #[tokio::test]
    async fn test_run_typed_deserialize_failure() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct WrongShape {
            sku: String,
        }

        let model = model_fn(|_, _| async { Ok(r#"{"price": 1}"#.to_string()) });
        let err = Extractor::new(price_schema())
            .run_typed::<WrongShape, _>("text", "sys", &model)
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::Deserialize { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_feedback_omits_format_when_disabled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let model = model_fn(move |_, user| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok("nope".to_string())
                } else {
                    assert!(!user.contains("Expected format"));
                    Ok(r#"{"price": 1}"#.to_string())
                }
            }
        });

        let extractor = Extractor::with_config(
            price_schema(),
            PromptConfig::default(),
            ExtractionConfig::default().with_schema_in_feedback(false),
        );
        assert!(extractor.run("text", "sys", &model).await.is_ok());
    }

    #[test]
    fn test_extractor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Extractor>();
    }
}
