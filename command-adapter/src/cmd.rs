//! Argument and stdin layout for a model command invocation.
//!
//! With a `system_prompt_flag`, the system instruction travels as
//! `<flag> <system>` and only the user content is the prompt text. Without
//! one, the prompt text is `system + sentinel + user`.

use crate::types::{CommandConfig, PromptTransport};
use std::ffi::OsString;
use webai_extractor::session::join_prompt;

/// Arguments and optional stdin payload for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<OsString>,
    pub stdin: Option<String>,
}

/// Builds the invocation for one model call.
#[must_use]
pub fn build_invocation(
    system_instruction: &str,
    user_content: &str,
    config: &CommandConfig,
) -> Invocation {
    let mut args: Vec<OsString> = config.args.iter().map(OsString::from).collect();

    let prompt = match config.system_prompt_flag {
        Some(ref flag) => {
            args.push(OsString::from(flag));
            args.push(OsString::from(system_instruction));
            user_content.to_string()
        }
        None => join_prompt(system_instruction, user_content, &config.sentinel),
    };

    match config.transport {
        PromptTransport::Argument => {
            args.push(OsString::from(prompt));
            Invocation { args, stdin: None }
        }
        PromptTransport::Stdin => Invocation {
            args,
            stdin: Some(prompt),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn strs(invocation: &Invocation) -> Vec<&str> {
        invocation.args.iter().filter_map(|s| s.to_str()).collect()
    }

    #[test]
    fn test_stdin_transport_joins_segments() {
        let config = CommandConfig::default().with_args(["-m", "local"]);
        let invocation = build_invocation("sys", "user", &config);

        assert_eq!(strs(&invocation), vec!["-m", "local"]);
        assert_eq!(invocation.stdin.as_deref(), Some("sys<ctrl23>user"));
    }

    #[test]
    fn test_argument_transport_appends_prompt_last() {
        let config = CommandConfig::default()
            .with_args(["prompt"])
            .with_transport(PromptTransport::Argument)
            .with_sentinel("\n\n");
        let invocation = build_invocation("sys", "user", &config);

        assert_eq!(strs(&invocation), vec!["prompt", "sys\n\nuser"]);
        assert!(invocation.stdin.is_none());
    }

    #[test]
    fn test_system_prompt_flag_splits_segments() {
        let config = CommandConfig::default().with_system_prompt_flag("--system");
        let invocation = build_invocation("sys", "user", &config);

        let args = strs(&invocation);
        assert!(
            args.windows(2).any(|w| w[0] == "--system" && w[1] == "sys"),
            "Expected '--system sys' but got: {args:?}",
        );
        assert_eq!(invocation.stdin.as_deref(), Some("user"));
    }

    #[test]
    fn test_system_flag_with_argument_transport() {
        let config = CommandConfig::default()
            .with_system_prompt_flag("-s")
            .with_transport(PromptTransport::Argument);
        let invocation = build_invocation("sys", "user", &config);

        assert_eq!(strs(&invocation), vec!["-s", "sys", "user"]);
    }
}
