//! Repair feedback builders for the retry loop.
//!
//! The model keeps no memory between calls, so every retry prompt carries
//! the previous output and a description of what was wrong with it.

use serde_json::Value;

use crate::schema::FieldError;

/// Build validation feedback for an output that parsed but did not conform.
///
/// Includes:
/// - Attempt counter (e.g., "Attempt 2/5")
/// - Every failing field with the reason
/// - The expected output format, when given
/// - The previous output, so the model can compare
///
/// # Examples
///
/// ```
/// use webai_extractor::extraction::build_validation_feedback;
/// use webai_extractor::schema::FieldError;
///
/// let errors = vec![FieldError::Missing { field: "price".to_string() }];
/// let feedback = build_validation_feedback(r#"{"code": "A-1"}"#, &errors, 1, 3, None, 500);
/// assert!(feedback.contains("Attempt 1/3"));
/// assert!(feedback.contains("field 'price' is missing"));
/// ```
#[must_use]
pub fn build_validation_feedback(
    raw_output: &str,
    errors: &[FieldError],
    attempt: usize,
    max_attempts: usize,
    format_line: Option<&str>,
    excerpt_chars: usize,
) -> String {
    let mut feedback =
        format!("Attempt {attempt}/{max_attempts}: your JSON did not match the required fields.\n\n");

    feedback.push_str("Errors:\n");
    for error in errors {
        feedback.push_str("  - ");
        feedback.push_str(&error.to_string());
        feedback.push('\n');
    }

    push_expected_format(&mut feedback, format_line);

    feedback.push_str("\nYour previous output:\n");
    feedback.push_str(&truncate_chars(raw_output.trim(), excerpt_chars));

    feedback.push_str("\n\nFix every listed field and output the complete JSON object again.");
    feedback
}

/// Build parse error feedback for an output with no usable JSON object.
///
/// # Examples
///
/// ```
/// use webai_extractor::extraction::feedback::build_parse_error_feedback;
///
/// let feedback = build_parse_error_feedback("Sorry, I can't.", "no JSON object found", 2, 3, None, 500);
/// assert!(feedback.contains("Attempt 2/3"));
/// assert!(feedback.contains("Sorry, I can't."));
/// ```
#[must_use]
pub fn build_parse_error_feedback(
    raw_output: &str,
    parse_error: &str,
    attempt: usize,
    max_attempts: usize,
    format_line: Option<&str>,
    excerpt_chars: usize,
) -> String {
    let mut feedback = format!(
        "Attempt {attempt}/{max_attempts}: your output was not valid JSON.\n\n"
    );

    feedback.push_str("Parse error: ");
    feedback.push_str(parse_error);
    feedback.push('\n');

    push_expected_format(&mut feedback, format_line);

    feedback.push_str(&format!("\nYour previous output (first {excerpt_chars} chars):\n"));
    feedback.push_str(&truncate_chars(raw_output.trim(), excerpt_chars));

    feedback.push_str("\n\nOutput only a JSON object beginning with { and ending with }.");
    feedback
}

/// Collect every JSON Schema violation of an already-coerced object.
///
/// Uses `iter_errors()` so all failures are reported, not just the first.
/// The field is taken from the instance path; object-level errors have an
/// empty field name.
///
/// # Examples
///
/// ```
/// use webai_extractor::extraction::feedback::collect_validation_errors;
/// use serde_json::json;
///
/// let schema = json!({
///     "type": "object",
///     "properties": {"price": {"type": "integer"}},
///     "required": ["price"]
/// });
/// let validator = jsonschema::Validator::new(&schema).unwrap();
///
/// let errors = collect_validation_errors(&validator, &json!({"price": "n/a"}));
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors[0].field(), "price");
/// ```
#[must_use]
pub fn collect_validation_errors(
    validator: &jsonschema::Validator,
    instance: &Value,
) -> Vec<FieldError> {
    validator
        .iter_errors(instance)
        .map(|error| {
            let path = error.instance_path.to_string();
            let field = path
                .trim_start_matches('/')
                .split('/')
                .next()
                .unwrap_or_default()
                .to_string();
            FieldError::Constraint {
                field,
                message: error.to_string(),
            }
        })
        .collect()
}

fn push_expected_format(feedback: &mut String, format_line: Option<&str>) {
    if let Some(line) = format_line {
        feedback.push_str("\nExpected format:\n");
        feedback.push_str(line);
        feedback.push('\n');
    }
}

/// Truncates to at most `max_chars` characters, marking the cut with `...`.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    #[test]
    fn test_build_validation_feedback() {
        let errors = vec![
            FieldError::Missing {
                field: "code".to_string(),
            },
            FieldError::TypeMismatch {
                field: "price".to_string(),
                expected: FieldType::Integer,
                found: "string \"cheap\"".to_string(),
            },
        ];
        let raw = r#"{"price": "cheap"}"#;

        let feedback = build_validation_feedback(raw, &errors, 1, 3, Some("FORMAT"), 500);

        assert!(feedback.contains("Attempt 1/3"));
        assert!(feedback.contains("Errors:"));
        assert!(feedback.contains("field 'code' is missing"));
        assert!(feedback.contains("field 'price' must be integer"));
        assert!(feedback.contains("Expected format:\nFORMAT"));
        assert!(feedback.contains(raw));
    }

    #[test]
    fn test_feedback_without_format_line() {
        let errors = vec![FieldError::Missing {
            field: "code".to_string(),
        }];
        let feedback = build_validation_feedback("{}", &errors, 1, 2, None, 500);
        assert!(!feedback.contains("Expected format"));
    }

    #[test]
    fn test_build_parse_error_feedback() {
        let feedback = build_parse_error_feedback(
            "This is not JSON!",
            "no JSON object found in model output",
            2,
            3,
            Some("FORMAT"),
            500,
        );

        assert!(feedback.contains("Attempt 2/3"));
        assert!(feedback.contains("not valid JSON"));
        assert!(feedback.contains("Parse error: no JSON object found"));
        assert!(feedback.contains("This is not JSON!"));
        assert!(feedback.contains("FORMAT"));
    }

    #[test]
    fn test_build_parse_error_feedback_truncates_long_text() {
        let raw_text = "x".repeat(1000);

        let feedback = build_parse_error_feedback(&raw_text, "error", 1, 3, None, 500);

        assert!(feedback.contains("..."));
        let response_section = feedback.split("Your previous output").nth(1).unwrap();
        assert!(response_section.matches('x').count() == 500);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let raw_text = "税込".repeat(400);
        let truncated = truncate_chars(&raw_text, 5);
        assert_eq!(truncated, "税込税込税...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_collect_validation_errors() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            },
            "required": ["name", "age"]
        });
        let validator = jsonschema::Validator::new(&schema).unwrap();

        let errors = collect_validation_errors(&validator, &json!({"age": -5}));

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field() == "age"));
        assert!(errors.iter().any(|e| e.field().is_empty() && e.to_string().contains("name")));
    }

    #[test]
    fn test_collect_validation_errors_accepts_conforming_object() {
        let schema = json!({"type": "object", "properties": {"code": {"type": "string"}}});
        let validator = jsonschema::Validator::new(&schema).unwrap();
        assert!(collect_validation_errors(&validator, &json!({"code": "A-1"})).is_empty());
    }
}
