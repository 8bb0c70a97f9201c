use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use webai_extractor::prompt::DEFAULT_SENTINEL;

/// How the prompt text reaches the model process.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromptTransport {
    /// Written to the child's stdin, which is then closed.
    #[default]
    Stdin,
    /// Passed as the final command-line argument.
    Argument,
}

/// Settings for one model command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Extra arguments placed before any prompt arguments.
    pub args: Vec<String>,
    /// Where the prompt text goes.
    pub transport: PromptTransport,
    /// Flag that takes the system instruction as its value, e.g. `--system`.
    /// Without one, the system instruction is prepended to the user content.
    pub system_prompt_flag: Option<String>,
    /// Separator used when the two prompt segments are joined.
    pub sentinel: String,
    /// Working directory of the child.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub env_vars: Vec<(String, String)>,
    /// Hard limit for a single run.
    pub timeout: Duration,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            transport: PromptTransport::default(),
            system_prompt_flag: None,
            sentinel: DEFAULT_SENTINEL.to_string(),
            cwd: None,
            env_vars: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl CommandConfig {
    /// Set the extra arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the prompt transport.
    #[must_use]
    pub const fn with_transport(mut self, transport: PromptTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Pass the system instruction through a dedicated flag.
    #[must_use]
    pub fn with_system_prompt_flag(mut self, flag: impl Into<String>) -> Self {
        self.system_prompt_flag = Some(flag.into());
        self
    }

    /// Set the segment separator.
    #[must_use]
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set the per-run timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured outcome of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}
