//! Subprocess execution and lifecycle management for model commands.

use crate::cmd::Invocation;
use crate::error::CommandError;
use crate::types::{CommandConfig, RunResult};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::debug;

const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024; // 10 MB
const GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Which stream, its collected lines, total byte count, and whether truncation occurred.
type StreamOutput = (Stream, Vec<String>, usize, bool);

/// Result of collecting all subprocess output: stdout lines, stderr lines, and exit status.
type CollectedOutput = (Vec<String>, Vec<String>, std::process::ExitStatus);

/// Timeout-wrapped result of the full collection phase.
type TimedCollectionResult =
    Result<Result<CollectedOutput, CommandError>, tokio::time::error::Elapsed>;

/// Spawns the model command, feeds it the prompt and collects its output.
///
/// The child is killed if the returned future is dropped before completion.
/// A non-zero exit status is reported as [`CommandError::NonZeroExit`].
///
/// # Errors
/// Returns a [`CommandError`] if the process cannot be spawned, times out,
/// produces truncated output, exits unsuccessfully, or encounters an I/O failure.
pub async fn run_command(
    path: &std::path::Path,
    invocation: Invocation,
    config: &CommandConfig,
) -> Result<RunResult, CommandError> {
    let start_time = Instant::now();

    let mut child = spawn_child(path, &invocation, config)?;

    let stdout = child.stdout.take().ok_or(CommandError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(CommandError::MissingPipe("stderr"))?;
    let pid = child.id().ok_or(CommandError::NoPid)?;
    debug!(pid, program = %path.display(), "model command spawned");

    if let Some(input) = invocation.stdin {
        let mut stdin = child.stdin.take().ok_or(CommandError::MissingPipe("stdin"))?;
        // Separate task so a child that stops reading cannot block the drain.
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                debug!(error = %e, "model command closed stdin early");
            }
            drop(stdin);
        });
    }

    let mut tasks = JoinSet::new();

    tasks.spawn(async move { drain_stream_bounded(stdout, Stream::Stdout).await });
    tasks.spawn(async move { drain_stream_bounded(stderr, Stream::Stderr).await });

    let process_result = timeout(config.timeout, collect_output(&mut child, &mut tasks)).await;
    let duration = start_time.elapsed();

    build_run_result(process_result, &mut child, pid, &mut tasks, duration).await
}

/// Spawns the child process with piped stdio.
fn spawn_child(
    path: &std::path::Path,
    invocation: &Invocation,
    config: &CommandConfig,
) -> Result<tokio::process::Child, CommandError> {
    let mut cmd = Command::new(path);
    cmd.args(&invocation.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if invocation.stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }

    if let Some(ref dir) = config.cwd {
        cmd.current_dir(dir);
    }

    for (k, v) in &config.env_vars {
        cmd.env(k, v);
    }

    cmd.spawn().map_err(|e| CommandError::SpawnFailed {
        stage: "spawn".to_string(),
        source: e,
    })
}

/// Collects stdout and stderr output from reader tasks and waits for the child.
async fn collect_output(
    child: &mut tokio::process::Child,
    tasks: &mut JoinSet<StreamOutput>,
) -> Result<CollectedOutput, CommandError> {
    let mut stdout_lines = Vec::new();
    let mut stderr_lines = Vec::new();

    while let Some(result) = tasks.join_next().await {
        let (stream, lines, bytes, truncated) =
            result.map_err(|e| CommandError::StreamFailed {
                stage: "join".to_string(),
                source: e,
            })?;

        if truncated {
            return Err(CommandError::OutputTruncated {
                captured_bytes: bytes,
                limit_bytes: MAX_OUTPUT_BYTES,
            });
        }

        match stream {
            Stream::Stdout => stdout_lines = lines,
            Stream::Stderr => stderr_lines = lines,
        }
    }

    let status = child.wait().await.map_err(|e| CommandError::SpawnFailed {
        stage: "wait".to_string(),
        source: e,
    })?;

    Ok((stdout_lines, stderr_lines, status))
}

/// Converts the raw process outcome into a [`RunResult`] or an appropriate error.
async fn build_run_result(
    process_result: TimedCollectionResult,
    child: &mut tokio::process::Child,
    pid: u32,
    tasks: &mut JoinSet<StreamOutput>,
    duration: Duration,
) -> Result<RunResult, CommandError> {
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

    match process_result {
        Ok(Ok((stdout_lines, stderr_lines, status))) => {
            let result = RunResult {
                stdout: stdout_lines.join("\n"),
                stderr: stderr_lines.join("\n"),
                exit_code: status.code().unwrap_or(-1),
                duration_ms,
            };
            debug!(pid, exit_code = result.exit_code, duration_ms, "model command finished");

            if status.success() {
                Ok(result)
            } else {
                Err(CommandError::NonZeroExit {
                    exit_code: result.exit_code,
                    stdout: result.stdout,
                    stderr: result.stderr,
                })
            }
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            // Timeout occurred -- graceful shutdown
            if let Err(e) = graceful_shutdown(child, pid, tasks).await {
                tracing::warn!(pid, error = %e, "shutdown after timeout failed");
            }

            Err(CommandError::Timeout {
                elapsed: duration,
                pid,
            })
        }
    }
}

/// Drains a stream line by line, keeping at most [`MAX_OUTPUT_BYTES`].
///
/// Lines are read as bytes and decoded lossily, so invalid UTF-8 in one line
/// does not end the drain.
async fn drain_stream_bounded(
    stream: impl tokio::io::AsyncRead + Unpin,
    kind: Stream,
) -> StreamOutput {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut total_bytes = 0usize;
    let mut truncated = false;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(stream = ?kind, error = %e, "model command stream read failed");
                break;
            }
        }

        let line = String::from_utf8_lossy(strip_line_ending(&buf)).into_owned();
        let line_bytes = line.len();
        if total_bytes + line_bytes <= MAX_OUTPUT_BYTES {
            lines.push(line);
            total_bytes += line_bytes;
        } else {
            truncated = true;
        }
    }

    (kind, lines, total_bytes, truncated)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Graceful shutdown: `SIGTERM`, wait grace period, then `SIGKILL`.
#[cfg(unix)]
async fn graceful_shutdown(
    child: &mut tokio::process::Child,
    pid: u32,
    tasks: &mut JoinSet<StreamOutput>,
) -> Result<(), CommandError> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw_pid = i32::try_from(pid).map_err(|_| CommandError::SignalFailed {
        signal: "SIGTERM".to_string(),
        pid,
        reason: "PID value exceeds i32::MAX".to_string(),
    })?;
    let nix_pid = Pid::from_raw(raw_pid);

    signal::kill(nix_pid, Signal::SIGTERM).map_err(|e| CommandError::SignalFailed {
        signal: "SIGTERM".to_string(),
        pid,
        reason: e.to_string(),
    })?;

    match timeout(GRACE_PERIOD, child.wait()).await {
        Ok(Ok(_status)) => {}
        Ok(Err(e)) => {
            return Err(CommandError::SpawnFailed {
                stage: "graceful_shutdown wait".to_string(),
                source: e,
            });
        }
        Err(_) => {
            child.kill().await.map_err(|e| CommandError::SpawnFailed {
                stage: "SIGKILL".to_string(),
                source: e,
            })?;
            child.wait().await.map_err(|e| CommandError::SpawnFailed {
                stage: "post-SIGKILL wait".to_string(),
                source: e,
            })?;
        }
    }

    tasks.abort_all();
    Ok(())
}

/// Windows: immediate termination, no graceful shutdown for console processes.
#[cfg(windows)]
async fn graceful_shutdown(
    child: &mut tokio::process::Child,
    _pid: u32,
    tasks: &mut JoinSet<StreamOutput>,
) -> Result<(), CommandError> {
    child.kill().await.map_err(|e| CommandError::SpawnFailed {
        stage: "TerminateProcess".to_string(),
        source: e,
    })?;
    child.wait().await.map_err(|e| CommandError::SpawnFailed {
        stage: "post-kill wait".to_string(),
        source: e,
    })?;
    tasks.abort_all();
    Ok(())
}
