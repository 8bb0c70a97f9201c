//! Runs a local model command as a [`ModelClient`].
//!
//! Each invocation spawns the configured executable, hands it the prompt on
//! stdin or as an argument, and returns its stdout. The child is owned by
//! the invocation and is terminated when the invocation times out or is
//! cancelled.

pub mod cmd;
pub mod discovery;
pub mod error;
pub mod process;
pub mod types;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use webai_extractor::client::{ModelClient, ModelError};

pub use discovery::{discover_command, DEFAULT_PROGRAM, MODEL_BIN_ENV_VAR};
pub use error::CommandError;
pub use process::run_command;
pub use types::*;

/// A model reachable through a local executable.
#[derive(Debug, Clone)]
pub struct CommandModelClient {
    path: PathBuf,
    config: CommandConfig,
}

impl CommandModelClient {
    /// Creates a client for the executable at `path`.
    #[must_use]
    pub const fn new(path: PathBuf, config: CommandConfig) -> Self {
        Self { path, config }
    }

    /// Creates a client after locating the executable with [`discover_command`].
    ///
    /// # Errors
    /// Returns `CommandError::ExecutableNotFound` when discovery fails.
    pub fn discover(
        explicit_path: Option<PathBuf>,
        program: &str,
        config: CommandConfig,
    ) -> Result<Self, CommandError> {
        let path = discover_command(explicit_path, program)?;
        Ok(Self::new(path, config))
    }

    /// The resolved executable.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The command settings.
    #[must_use]
    pub const fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Runs the command once for the given prompt segments.
    ///
    /// # Errors
    /// See [`run_command`].
    pub async fn run(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<RunResult, CommandError> {
        let invocation = cmd::build_invocation(system_instruction, user_content, &self.config);
        run_command(&self.path, invocation, &self.config).await
    }
}

#[async_trait]
impl ModelClient for CommandModelClient {
    async fn invoke(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<String, ModelError> {
        let result = self.run(system_instruction, user_content).await?;
        Ok(result.stdout)
    }
}

impl From<CommandError> for ModelError {
    fn from(error: CommandError) -> Self {
        match error {
            CommandError::ExecutableNotFound(message) => Self::Unavailable(message),
            CommandError::SpawnFailed { ref source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::Unavailable(error.to_string())
            }
            CommandError::Timeout { elapsed, .. } => Self::Timeout(elapsed),
            CommandError::NonZeroExit {
                exit_code, stderr, ..
            } => Self::Invocation(format!("exit status {exit_code}: {}", stderr.trim())),
            other => Self::Invocation(other.to_string()),
        }
    }
}
