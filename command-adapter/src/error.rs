use std::time::Duration;
use thiserror::Error;

/// Failures of a model command run.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Model command not found: {0}")]
    ExecutableNotFound(String),

    #[error("Process I/O failed during {stage}: {source}")]
    SpawnFailed {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Child process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("Child process has no PID")]
    NoPid,

    #[error("Output reader task failed during {stage}: {source}")]
    StreamFailed {
        stage: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("Output exceeded {limit_bytes} bytes ({captured_bytes} captured)")]
    OutputTruncated {
        captured_bytes: usize,
        limit_bytes: usize,
    },

    #[error("Failed to send {signal} to process {pid}: {reason}")]
    SignalFailed {
        signal: String,
        pid: u32,
        reason: String,
    },

    #[error("Process {pid} timed out after {elapsed:?}")]
    Timeout { elapsed: Duration, pid: u32 },

    #[error("Process exited with non-zero status: {exit_code}\nSTDOUT: {stdout}\nSTDERR: {stderr}")]
    NonZeroExit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}
