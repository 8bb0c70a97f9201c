use std::path::PathBuf;
use thiserror::Error;
use webai_command_adapter::CommandError;
use webai_extractor::error::InputError;

/// Errors raised by the command-line front end.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file or stdin could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Path as given on the command line (`-` for stdin).
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The fragment or schema was rejected before extraction started.
    #[error(transparent)]
    Input(#[from] InputError),

    /// The model command could not be located.
    #[error("Model command error: {0}")]
    Command(#[from] CommandError),

    /// Flags that parse individually but do not fit together.
    #[error("Invalid arguments: {0}")]
    Usage(String),
}
