//! Locates the model command on the host system.

use crate::error::CommandError;
use std::path::PathBuf;
use which::which;

/// Environment variable that overrides discovery of the model command.
pub const MODEL_BIN_ENV_VAR: &str = "WEBAI_MODEL_BIN";

/// Program looked up on `$PATH` when nothing else is configured.
pub const DEFAULT_PROGRAM: &str = "llm";

/// Locates the model command executable.
///
/// Resolution order:
/// 1. `explicit_path` if provided and the file exists.
/// 2. The path in the `WEBAI_MODEL_BIN` environment variable.
/// 3. `program` resolved via `$PATH`.
/// 4. Common install location fallbacks (platform-specific).
/// 5. Error naming every place searched.
///
/// # Errors
///
/// Returns `CommandError::ExecutableNotFound` when no valid executable can be
/// located.
pub fn discover_command(
    explicit_path: Option<PathBuf>,
    program: &str,
) -> Result<PathBuf, CommandError> {
    // 1. Explicit path
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(path);
        }
        return Err(CommandError::ExecutableNotFound(format!(
            "Explicit path does not exist: {}",
            path.display()
        )));
    }

    // 2. Environment variable
    if let Ok(path_str) = std::env::var(MODEL_BIN_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            path = %path.display(),
            "{MODEL_BIN_ENV_VAR} points to a missing file, continuing discovery"
        );
    }

    // 3. PATH lookup
    if let Ok(path) = which(program) {
        return Ok(path);
    }

    // 4. Common install locations
    if let Some(location) = fallback_locations(program).into_iter().find(|p| p.exists()) {
        return Ok(location);
    }

    // 5. Actionable error
    Err(CommandError::ExecutableNotFound(format!(
        "{program} not found. Pass --model-bin or set {MODEL_BIN_ENV_VAR}.\n\
         Searched: {MODEL_BIN_ENV_VAR}, PATH, common install locations."
    )))
}

#[cfg(unix)]
fn fallback_locations(program: &str) -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".local/bin").join(program));
        locations.push(home.join(".cargo/bin").join(program));
    }
    locations.push(PathBuf::from("/usr/local/bin").join(program));
    locations.push(PathBuf::from("/opt/homebrew/bin").join(program));
    locations
}

#[cfg(windows)]
fn fallback_locations(program: &str) -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".cargo/bin").join(format!("{program}.exe")));
        locations.push(
            home.join("AppData/Local/Programs")
                .join(program)
                .join(format!("{program}.exe")),
        );
    }
    locations
}
