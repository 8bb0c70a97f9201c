use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use webai_command_adapter::DEFAULT_PROGRAM;

/// Extract schema-conforming JSON from HTML fragments with a local model.
#[derive(Debug, Parser)]
#[command(name = "webai-extract", author, version, about, long_about = None)]
pub struct Cli {
    /// What to do.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract a JSON object matching a schema descriptor from an HTML fragment
    Extract(ExtractArgs),
    /// Print the plain text the model would see for an HTML fragment
    Text(TextArgs),
    /// Print the JSON Schema and prompt format of a schema descriptor
    Schema(SchemaArgs),
}

/// Where the fragment comes from and how it is rendered.
#[derive(Debug, Clone, Args)]
pub struct HtmlArgs {
    /// HTML fragment file, or `-` for stdin
    #[arg(long, default_value = "-")]
    pub html: String,

    /// Wrap width of the rendered text; 0 disables wrapping
    #[arg(long, default_value_t = 80)]
    pub width: usize,
}

/// Arguments of `text`.
#[derive(Debug, Clone, Args)]
pub struct TextArgs {
    /// Fragment input.
    #[command(flatten)]
    pub input: HtmlArgs,
}

/// Arguments of `schema`.
#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    /// Schema descriptor file (JSON)
    #[arg(long)]
    pub schema: PathBuf,
}

/// Arguments of `extract`.
#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Fragment input.
    #[command(flatten)]
    pub input: HtmlArgs,

    /// Schema descriptor file (JSON)
    #[arg(long)]
    pub schema: PathBuf,

    /// System prompt text
    #[arg(long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// File holding the system prompt
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Maximum number of model calls
    #[arg(long, default_value_t = 5)]
    pub max_tries: usize,

    /// Time limit for each model call, in seconds
    #[arg(long)]
    pub attempt_timeout_secs: Option<u64>,

    /// Path to the model executable (overrides WEBAI_MODEL_BIN and PATH lookup)
    #[arg(long)]
    pub model_bin: Option<PathBuf>,

    /// Program name looked up on PATH when no path is given
    #[arg(long, default_value = DEFAULT_PROGRAM)]
    pub model_program: String,

    /// Extra argument for the model executable (repeatable)
    #[arg(long = "model-arg", allow_hyphen_values = true)]
    pub model_args: Vec<String>,

    /// Flag the model executable takes the system prompt with, e.g. `--system`
    #[arg(long, allow_hyphen_values = true)]
    pub system_prompt_flag: Option<String>,

    /// Send the prompt on stdin (default)
    #[arg(long, conflicts_with = "argument")]
    pub stdin: bool,

    /// Send the prompt as the last argument
    #[arg(long)]
    pub argument: bool,

    /// Sample content for a one-shot example
    #[arg(long, requires = "example_output")]
    pub example_input: Option<String>,

    /// The JSON the model should produce for the example content
    #[arg(long, requires = "example_input")]
    pub example_output: Option<String>,
}
