//! Markup fragment to plain text.
//!
//! Rendering goes through `html2text` with the trivial decorator (no
//! emphasis markers, no link footnotes), followed by a whitespace pass that
//! makes the output stable for prompting: trailing spaces are dropped, runs
//! of blank lines collapse, and leading/trailing blank lines are removed.

use html2text::render::text_renderer::TrivialDecorator;

use crate::error::InputError;

/// Render width used when wrapping is disabled.
const UNWRAPPED_WIDTH: usize = 4096;

/// Narrowest wrap width the renderer accepts; anything smaller disables wrapping.
const MIN_WRAP_WIDTH: usize = 2;

/// Rendering ruleset for the text extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextConfig {
    /// Wrap lines at this many columns (default: 80). `None`, or a width
    /// below 2, disables wrapping.
    pub wrap_width: Option<usize>,
    /// Collapse consecutive blank lines into one (default: true).
    pub collapse_blank_lines: bool,
    /// Strip trailing whitespace from every line (default: true).
    pub trim_lines: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            wrap_width: Some(80),
            collapse_blank_lines: true,
            trim_lines: true,
        }
    }
}

impl TextConfig {
    /// Set the wrap width, or `None` to disable wrapping.
    #[must_use]
    pub const fn with_wrap_width(mut self, width: Option<usize>) -> Self {
        self.wrap_width = width;
        self
    }

    /// Set whether runs of blank lines are collapsed.
    #[must_use]
    pub const fn with_collapse_blank_lines(mut self, collapse: bool) -> Self {
        self.collapse_blank_lines = collapse;
        self
    }

    /// Set whether trailing whitespace is stripped from each line.
    #[must_use]
    pub const fn with_trim_lines(mut self, trim: bool) -> Self {
        self.trim_lines = trim;
        self
    }

    fn render_width(&self) -> usize {
        match self.wrap_width {
            Some(width) if width >= MIN_WRAP_WIDTH => width,
            _ => UNWRAPPED_WIDTH,
        }
    }
}

/// Converts a markup fragment into plain text in reading order.
///
/// Tags and attributes are dropped, block elements become line breaks, and
/// unknown elements contribute only their text content.
///
/// # Examples
///
/// ```
/// use webai_extractor::text::{html_to_text, TextConfig};
///
/// let text = html_to_text("<p>Hello <b>world</b></p>", &TextConfig::default()).unwrap();
/// assert_eq!(text, "Hello world");
/// ```
pub fn html_to_text(fragment: &str, config: &TextConfig) -> Result<String, InputError> {
    if fragment.trim().is_empty() {
        return Ok(String::new());
    }

    let rendered = html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(fragment.as_bytes(), config.render_width())
        .map_err(|e| InputError::Render(e.to_string()))?;

    Ok(normalize_whitespace(&rendered, config))
}

/// Like [`html_to_text`], for fragments that have not been decoded yet.
///
/// # Errors
///
/// Returns [`InputError::Undecodable`] when `bytes` are not valid UTF-8.
pub fn html_bytes_to_text(bytes: &[u8], config: &TextConfig) -> Result<String, InputError> {
    let fragment =
        std::str::from_utf8(bytes).map_err(|e| InputError::Undecodable(e.to_string()))?;
    html_to_text(fragment, config)
}

fn normalize_whitespace(rendered: &str, config: &TextConfig) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;

    for line in rendered.lines() {
        let line = if config.trim_lines { line.trim_end() } else { line };
        let blank = line.trim().is_empty();
        if blank && previous_blank && config.collapse_blank_lines {
            continue;
        }
        previous_blank = blank;
        lines.push(line);
    }

    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}
