//! Prompt assembly: caller instruction, schema rendering, one-shot example, content.

use serde::{Deserialize, Serialize};

use crate::schema::SchemaDescriptor;

/// Separator between prompt segments.
pub const DEFAULT_SENTINEL: &str = "<ctrl23>";

/// Delimiter wrapped around keys in the rendered output format.
pub const DEFAULT_KEY_DELIMITER: &str = "###";

const FORMAT_PREFIX: &str = "Output in the following json string format: ";

const OUTPUT_RULES: &str = "Update text enclosed in <>. \
Output only a valid json string beginning with { and ending with }";

const EXAMPLE_OUTPUT_PREFIX: &str = "output of this content is: ";

/// A worked input/output pair shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneShotExample {
    /// Sample content, in the same form as the extracted text.
    pub input: String,
    /// The JSON the model should produce for `input`.
    pub output: String,
}

impl OneShotExample {
    /// Creates an example.
    #[must_use]
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Prompt layout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Token separating instruction, example and content (default: `<ctrl23>`).
    pub sentinel: String,
    /// Delimiter wrapped around keys in the rendered format (default: `###`).
    pub key_delimiter: String,
    /// Optional one-shot example.
    pub example: Option<OneShotExample>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_string(),
            key_delimiter: DEFAULT_KEY_DELIMITER.to_string(),
            example: None,
        }
    }
}

impl PromptConfig {
    /// Set the segment sentinel.
    #[must_use]
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Set the key delimiter; an empty string renders bare keys.
    #[must_use]
    pub fn with_key_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.key_delimiter = delimiter.into();
        self
    }

    /// Set the one-shot example.
    #[must_use]
    pub fn with_example(mut self, example: OneShotExample) -> Self {
        self.example = Some(example);
        self
    }
}

/// The two text segments sent to the model for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    /// Caller instruction plus output format and example.
    pub system_instruction: String,
    /// Extracted text, plus repair feedback on retries.
    pub user_content: String,
}

/// Builds [`PromptPayload`]s. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    /// Creates an assembler.
    #[must_use]
    pub const fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Layout settings in use.
    #[must_use]
    pub const fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Renders the schema as an illustrative output object.
    ///
    /// # Examples
    ///
    /// ```
    /// use webai_extractor::prompt::PromptAssembler;
    /// use webai_extractor::schema::{FieldType, SchemaDescriptor};
    ///
    /// let schema = SchemaDescriptor::new().field("price", FieldType::Integer, "price");
    /// assert_eq!(
    ///     PromptAssembler::default().render_schema(&schema),
    ///     r####"{"###price###": "<price, type: integer>"}"####
    /// );
    /// ```
    #[must_use]
    pub fn render_schema(&self, schema: &SchemaDescriptor) -> String {
        let delimiter = &self.config.key_delimiter;
        let members: Vec<String> = schema
            .iter()
            .map(|(name, spec)| {
                let placeholder = if spec.description.is_empty() {
                    format!("<type: {}>", spec.expected_type)
                } else {
                    format!("<{}, type: {}>", spec.description, spec.expected_type)
                };
                format!(
                    "{}: {}",
                    quote(&format!("{delimiter}{name}{delimiter}")),
                    quote(&placeholder)
                )
            })
            .collect();
        format!("{{{}}}", members.join(", "))
    }

    /// The line that tells the model which object shape to emit.
    #[must_use]
    pub fn format_line(&self, schema: &SchemaDescriptor) -> String {
        format!("{FORMAT_PREFIX}{}", self.render_schema(schema))
    }

    /// Builds the payload for a first attempt.
    #[must_use]
    pub fn assemble(
        &self,
        system_prompt: &str,
        extracted_text: &str,
        schema: &SchemaDescriptor,
    ) -> PromptPayload {
        PromptPayload {
            system_instruction: self.system_instruction(system_prompt, schema),
            user_content: extracted_text.to_string(),
        }
    }

    /// Builds the payload for a retry, appending repair feedback after the content.
    #[must_use]
    pub fn assemble_retry(
        &self,
        system_prompt: &str,
        extracted_text: &str,
        schema: &SchemaDescriptor,
        feedback: &str,
    ) -> PromptPayload {
        let sentinel = &self.config.sentinel;
        PromptPayload {
            system_instruction: self.system_instruction(system_prompt, schema),
            user_content: format!("{extracted_text}\n{sentinel}\n{feedback}"),
        }
    }

    fn system_instruction(&self, system_prompt: &str, schema: &SchemaDescriptor) -> String {
        let sentinel = &self.config.sentinel;
        let format_line = self.format_line(schema);
        let system_prompt = system_prompt.trim_end();

        let mut out = String::new();
        if !system_prompt.is_empty() {
            out.push_str(system_prompt);
            out.push('\n');
        }
        out.push_str(sentinel);
        out.push('\n');

        if !system_prompt.contains(&format_line) {
            out.push_str(&format_line);
            out.push('\n');
        }
        out.push_str(OUTPUT_RULES);

        if let Some(example) = &self.config.example {
            out.push('\n');
            out.push_str(example.input.trim());
            out.push('\n');
            out.push_str(EXAMPLE_OUTPUT_PREFIX);
            out.push_str(example.output.trim());
        }
        out
    }
}

fn quote(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn product_schema() -> SchemaDescriptor {
        SchemaDescriptor::new()
            .field("code", FieldType::String, "code or number of the product")
            .field("price", FieldType::Integer, "")
    }

    const SYSTEM: &str = "You are a product information extractor.";

    #[test]
    fn test_render_schema_shows_names_types_and_descriptions() {
        let rendered = PromptAssembler::default().render_schema(&product_schema());
        assert_eq!(
            rendered,
            r####"{"###code###": "<code or number of the product, type: string>", "###price###": "<type: integer>"}"####
        );
    }

    #[test]
    fn test_render_schema_without_delimiter() {
        let assembler = PromptAssembler::new(PromptConfig::default().with_key_delimiter(""));
        let rendered = assembler.render_schema(&product_schema());
        assert!(rendered.starts_with(r#"{"code": "#));
    }

    #[test]
    fn test_render_schema_escapes_quotes() {
        let schema = SchemaDescriptor::new().field("name", FieldType::String, r#"the "full" name"#);
        let rendered = PromptAssembler::default().render_schema(&schema);
        assert!(rendered.contains(r#"the \"full\" name"#));
        assert!(serde_json::from_str::<serde_json::Value>(&rendered).is_ok());
    }

    #[test]
    fn test_assemble_layout() {
        let assembler = PromptAssembler::default();
        let payload = assembler.assemble(SYSTEM, "商品番号：1241-100468", &product_schema());

        let sys = &payload.system_instruction;
        assert!(sys.starts_with(SYSTEM));
        assert!(sys.contains(DEFAULT_SENTINEL));
        assert!(sys.contains(&assembler.format_line(&product_schema())));
        assert!(sys.contains("Output only a valid json string"));
        assert!(!sys.ends_with(DEFAULT_SENTINEL));
        assert_eq!(payload.user_content, "商品番号：1241-100468");
    }

    #[test]
    fn test_schema_not_injected_twice() {
        let assembler = PromptAssembler::default();
        let schema = product_schema();
        let system = format!("{SYSTEM}\n{}", assembler.format_line(&schema));

        let payload = assembler.assemble(&system, "text", &schema);
        assert_eq!(
            payload
                .system_instruction
                .matches(&assembler.format_line(&schema))
                .count(),
            1
        );
    }

    #[test]
    fn test_one_shot_example_is_included() {
        let assembler = PromptAssembler::new(PromptConfig::default().with_example(
            OneShotExample::new("商品番号：1241-100468", r####"{"###code###": "1241-100468"}"####),
        ));
        let payload = assembler.assemble(SYSTEM, "text", &product_schema());

        assert!(payload
            .system_instruction
            .contains("output of this content is: {\"###code###\": \"1241-100468\"}"));
        assert!(payload.system_instruction.contains("商品番号：1241-100468"));
    }

    #[test]
    fn test_retry_appends_feedback_after_sentinel() {
        let assembler = PromptAssembler::new(PromptConfig::default().with_sentinel("---"));
        let first = assembler.assemble(SYSTEM, "text", &product_schema());
        let retry = assembler.assemble_retry(SYSTEM, "text", &product_schema(), "field 'price' is missing");

        assert_eq!(first.system_instruction, retry.system_instruction);
        assert_eq!(retry.user_content, "text\n---\nfield 'price' is missing");
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let assembler = PromptAssembler::default();
        assert_eq!(
            assembler.assemble(SYSTEM, "text", &product_schema()),
            assembler.assemble(SYSTEM, "text", &product_schema())
        );
    }

    #[test]
    fn test_empty_system_prompt_starts_with_sentinel() {
        let payload = PromptAssembler::default().assemble("", "text", &product_schema());
        assert!(payload.system_instruction.starts_with(DEFAULT_SENTINEL));
    }
}
