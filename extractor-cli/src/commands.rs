//! Subcommand implementations, kept free of process-global state so they can be tested.

use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use webai_command_adapter::{CommandConfig, CommandModelClient, PromptTransport};
use webai_extractor::client::{model_fn, ModelClient, ModelError};
use webai_extractor::extraction::{ExtractionConfig, ExtractionResult, Extractor};
use webai_extractor::prompt::{OneShotExample, PromptAssembler, PromptConfig};
use webai_extractor::schema::SchemaDescriptor;
use webai_extractor::text::{html_bytes_to_text, TextConfig};

use crate::args::{ExtractArgs, HtmlArgs, SchemaArgs, TextArgs};
use crate::errors::CliError;

/// System prompt used when neither `--prompt` nor `--prompt-file` is given.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an information extractor. Read the content and fill in the requested fields.";

/// Reads a file, or stdin when `source` is `-`.
///
/// # Errors
/// Returns `CliError::Read` if the source cannot be read.
pub fn read_source(source: &str) -> Result<Vec<u8>, CliError> {
    if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| read_error_for("-", e))?;
        Ok(buf)
    } else {
        std::fs::read(source).map_err(|e| read_error_for(source, e))
    }
}

fn read_error_for(path: &str, source: std::io::Error) -> CliError {
    CliError::Read {
        path: PathBuf::from(path),
        source,
    }
}

/// Loads a schema descriptor file.
///
/// # Errors
/// Returns `CliError::Read` or `CliError::Input` for an unreadable or malformed file.
pub fn load_schema(path: &Path) -> Result<SchemaDescriptor, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SchemaDescriptor::from_json_str(&text)?)
}

/// Resolves the system prompt from the flags.
///
/// # Errors
/// Returns `CliError::Read` if the prompt file cannot be read.
pub fn resolve_system_prompt(
    prompt: Option<&str>,
    prompt_file: Option<&Path>,
) -> Result<String, CliError> {
    match (prompt, prompt_file) {
        (Some(prompt), _) => Ok(prompt.to_string()),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        }),
        (None, None) => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
    }
}

/// Rendering settings for the fragment flags.
#[must_use]
pub fn text_config(input: &HtmlArgs) -> TextConfig {
    let width = (input.width > 0).then_some(input.width);
    TextConfig::default().with_wrap_width(width)
}

/// Prompt layout for the example flags.
#[must_use]
pub fn prompt_config(args: &ExtractArgs) -> PromptConfig {
    let config = PromptConfig::default();
    match (&args.example_input, &args.example_output) {
        (Some(input), Some(output)) => config.with_example(OneShotExample::new(input, output)),
        _ => config,
    }
}

/// Retry settings for the extraction flags.
#[must_use]
pub fn extraction_config(args: &ExtractArgs) -> ExtractionConfig {
    let config = ExtractionConfig::default().with_max_attempts(args.max_tries);
    match args.attempt_timeout_secs {
        Some(secs) => config.with_attempt_timeout(Duration::from_secs(secs)),
        None => config,
    }
}

/// Model command settings for the extraction flags.
///
/// # Errors
/// Returns `CliError::Usage` when `--stdin` and `--argument` are both set.
pub fn command_config(args: &ExtractArgs) -> Result<CommandConfig, CliError> {
    let transport = match (args.stdin, args.argument) {
        (true, true) => {
            return Err(CliError::Usage(
                "--stdin and --argument are mutually exclusive".to_string(),
            ))
        }
        (_, true) => PromptTransport::Argument,
        _ => PromptTransport::Stdin,
    };

    let mut config = CommandConfig::default()
        .with_args(args.model_args.iter().cloned())
        .with_transport(transport);
    if let Some(ref flag) = args.system_prompt_flag {
        config = config.with_system_prompt_flag(flag);
    }
    if let Some(secs) = args.attempt_timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

/// Locates the model executable for `extract`.
///
/// # Errors
/// Returns `CliError::Command` when discovery fails.
pub fn model_client(args: &ExtractArgs) -> Result<CommandModelClient, CliError> {
    let client = CommandModelClient::discover(
        args.model_bin.clone(),
        &args.model_program,
        command_config(args)?,
    )?;
    info!(model = %client.path().display(), "using model command");
    Ok(client)
}

/// Runs `extract`, calling `connect` for the model only when the
/// descriptor requests at least one field.
///
/// # Errors
/// Returns a `CliError` for unreadable inputs, an invalid descriptor, or a
/// model that cannot be located; exhausted retries are an
/// `ExtractionResult::Failure`, not an error.
pub async fn run_extract<C, F>(args: &ExtractArgs, connect: F) -> Result<ExtractionResult, CliError>
where
    C: ModelClient,
    F: FnOnce() -> Result<C, CliError>,
{
    let schema = load_schema(&args.schema)?;
    let system_prompt =
        resolve_system_prompt(args.prompt.as_deref(), args.prompt_file.as_deref())?;
    let extractor = Extractor::with_config(schema, prompt_config(args), extraction_config(args));

    if extractor.schema().is_empty() {
        let unused = model_fn(|_, _| async {
            Err(ModelError::Unavailable("no fields requested".to_string()))
        });
        let run = extractor.run("", &system_prompt, &unused).await;
        return Ok(ExtractionResult::from_run(run)?);
    }

    let fragment = read_source(&args.input.html)?;
    let text = html_bytes_to_text(&fragment, &text_config(&args.input))?;
    let client = connect()?;
    let run = extractor.run(&text, &system_prompt, &client).await;
    Ok(ExtractionResult::from_run(run)?)
}

/// Runs `text`.
///
/// # Errors
/// Returns a `CliError` for an unreadable or undecodable fragment.
pub fn run_text(args: &TextArgs) -> Result<String, CliError> {
    let fragment = read_source(&args.input.html)?;
    Ok(html_bytes_to_text(&fragment, &text_config(&args.input))?)
}

/// Runs `schema`.
///
/// # Errors
/// Returns a `CliError` for an unreadable or malformed descriptor.
pub fn run_schema(args: &SchemaArgs) -> Result<Value, CliError> {
    let schema = load_schema(&args.schema)?;
    Ok(json!({
        "json_schema": schema.to_json_schema(),
        "prompt_format": PromptAssembler::default().format_line(&schema),
    }))
}
