//! Pure transforms from validation issues to LLM-facing corrective feedback.
//!
//! Everything here is a pure function of its arguments: the same issues and
//! attempt number always produce byte-identical output. The suggestion and
//! correction wording per issue category is the contract the model
//! self-corrects against, so changes here change extraction behavior.

use crate::error::{ValidationError, ValidationErrorCode, ValidationFeedback};
use crate::issue::{IssueCode, SizeOrigin, ValidationIssue};

/// How urgent a suggestion is for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeedbackPriority {
    /// Wrong output shape; fix first.
    Critical,
    /// Structural problems (enums, stray keys).
    High,
    /// Bounds and formats.
    Medium,
    /// Everything else.
    Low,
}

/// General suggestions appended whenever at least one issue exists.
pub const GENERAL_SUGGESTIONS: [&str; 3] = [
    "Double-check all field types and required fields",
    "Check for typos in field names and incorrect casing",
    "Verify the overall structure matches the schema exactly",
];

/// Hard directives added to JSON-parse feedback from the third attempt on.
pub const JSON_HARD_DIRECTIVES: [&str; 2] = [
    "Your response MUST start with '{' and end with '}'.",
    "Do NOT include any explanatory text before or after the JSON.",
];

const FINAL_ATTEMPT_WARNING: &str =
    "This is the final attempt. Respond with only the corrected JSON.";

/// Urgency prefix for the given attempt number.
///
/// Attempt 1 gets no prefix, attempt 2 an important marker, and attempt 3
/// onward a critical marker that plateaus (attempt 100 reads like attempt 3).
#[must_use]
pub const fn urgency_prefix(attempt: u32) -> &'static str {
    match attempt {
        0 | 1 => "",
        2 => "\u{26a0}\u{fe0f} IMPORTANT: ",
        _ => "\u{1f6a8} CRITICAL: ",
    }
}

/// Priority class for an issue category.
#[must_use]
pub const fn priority_for(code: IssueCode) -> FeedbackPriority {
    match code {
        IssueCode::InvalidType => FeedbackPriority::Critical,
        IssueCode::InvalidEnum | IssueCode::InvalidUnion | IssueCode::UnrecognizedKeys => {
            FeedbackPriority::High
        }
        IssueCode::TooSmall | IssueCode::TooBig | IssueCode::InvalidString => {
            FeedbackPriority::Medium
        }
        IssueCode::Custom => FeedbackPriority::Low,
    }
}

fn fmt_bound(bound: f64) -> String {
    if bound.fract() == 0.0 && bound.abs() < 1e15 {
        format!("{}", bound as i64)
    } else {
        format!("{bound}")
    }
}

/// Natural-language suggestion for one issue.
#[must_use]
pub fn suggestion_for_issue(issue: &ValidationIssue) -> String {
    let path = issue.dotted_path();
    match issue.code {
        IssueCode::InvalidType => {
            let expected = issue.expected.as_deref().unwrap_or("unknown");
            let received = issue.received.as_deref().unwrap_or("unknown");
            format!(
                "Field \"{path}\": Expected {expected}, but got {received}. \
                 Please ensure this field contains the correct data type."
            )
        }
        IssueCode::TooSmall => match (issue.origin, issue.minimum) {
            (Some(SizeOrigin::String), Some(min)) => {
                format!(
                    "Field \"{path}\": Text is too short. Minimum length: {}.",
                    fmt_bound(min)
                )
            }
            (Some(SizeOrigin::Array), Some(min)) => {
                format!(
                    "Field \"{path}\": Too few items. Minimum required: {}.",
                    fmt_bound(min)
                )
            }
            (_, Some(min)) => {
                format!(
                    "Field \"{path}\": Value is too small. Minimum: {}.",
                    fmt_bound(min)
                )
            }
            (_, None) => format!("Field \"{path}\": Value is too small."),
        },
        IssueCode::TooBig => match (issue.origin, issue.maximum) {
            (Some(SizeOrigin::String), Some(max)) => {
                format!(
                    "Field \"{path}\": Text is too long. Maximum length: {}.",
                    fmt_bound(max)
                )
            }
            (Some(SizeOrigin::Array), Some(max)) => {
                format!(
                    "Field \"{path}\": Too many items. Maximum allowed: {}.",
                    fmt_bound(max)
                )
            }
            (_, Some(max)) => {
                format!(
                    "Field \"{path}\": Value is too large. Maximum: {}.",
                    fmt_bound(max)
                )
            }
            (_, None) => format!("Field \"{path}\": Value is too large."),
        },
        IssueCode::InvalidEnum => issue.options.as_ref().map_or_else(
            || format!("Field \"{path}\": {}", issue.message),
            |options| format!("Field \"{path}\": Must be one of: {}", options.join(", ")),
        ),
        IssueCode::InvalidUnion => {
            format!("Field \"{path}\": Value doesn't match any of the expected types in the union.")
        }
        IssueCode::UnrecognizedKeys => {
            let keys = issue
                .keys
                .as_ref()
                .map_or_else(|| "unknown keys".to_string(), |keys| keys.join(", "));
            format!("Field \"{path}\": Contains unexpected keys: {keys}. Remove these fields.")
        }
        IssueCode::InvalidString => match issue.format.as_deref() {
            Some("email") => format!("Field \"{path}\": Must be a valid email address."),
            Some("url" | "uri") => format!("Field \"{path}\": Must be a valid URL."),
            Some("uuid") => format!("Field \"{path}\": Must be a valid UUID."),
            Some(other) => format!("Field \"{path}\": Must match the {other} format."),
            None => format!("Field \"{path}\": Invalid string format."),
        },
        IssueCode::Custom => issue.message.clone(),
    }
}

/// Concrete corrective instruction for one issue, when one exists.
#[must_use]
pub fn correction_for_issue(issue: &ValidationIssue) -> Option<String> {
    match issue.code {
        IssueCode::InvalidType => {
            let expected = issue.expected.as_deref().unwrap_or("unknown");
            let received = issue.received.as_deref().unwrap_or("unknown");
            Some(format!("Change from {received} to {expected}"))
        }
        IssueCode::TooSmall => issue.minimum.map(|min| match issue.origin {
            Some(SizeOrigin::Array) => format!("Add at least {} items", fmt_bound(min)),
            Some(SizeOrigin::String) => {
                format!("Increase length to at least {}", fmt_bound(min))
            }
            _ => format!("Increase value to at least {}", fmt_bound(min)),
        }),
        IssueCode::TooBig => issue.maximum.map(|max| match issue.origin {
            Some(SizeOrigin::Array) => format!("Remove items down to at most {}", fmt_bound(max)),
            Some(SizeOrigin::String) => format!("Reduce length to at most {}", fmt_bound(max)),
            _ => format!("Decrease value to at most {}", fmt_bound(max)),
        }),
        IssueCode::UnrecognizedKeys => {
            let keys = issue
                .keys
                .as_ref()
                .map_or_else(|| "unknown keys".to_string(), |keys| keys.join(", "));
            Some(format!("Remove unexpected fields: {keys}"))
        }
        IssueCode::Custom => Some(issue.message.clone()),
        IssueCode::InvalidEnum | IssueCode::InvalidUnion | IssueCode::InvalidString => None,
    }
}

/// Per-issue suggestions plus the general suggestions when issues exist.
#[must_use]
pub fn suggestions_for_issues(issues: &[ValidationIssue]) -> Vec<String> {
    let mut suggestions: Vec<String> = issues.iter().map(suggestion_for_issue).collect();
    if !issues.is_empty() {
        suggestions.extend(GENERAL_SUGGESTIONS.iter().map(ToString::to_string));
    }
    suggestions
}

/// All concrete corrections for a set of issues, in input order.
#[must_use]
pub fn corrections_for_issues(issues: &[ValidationIssue]) -> Vec<String> {
    issues.iter().filter_map(correction_for_issue).collect()
}

/// One `path: message` line per issue, in input order.
#[must_use]
pub fn format_validation_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.dotted_path(), issue.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Structured feedback block for a schema validation failure.
#[must_use]
pub fn structured_feedback(issues: &[ValidationIssue], attempt: u32) -> ValidationFeedback {
    ValidationFeedback {
        summary: format!("Schema Validation Failed (Attempt {attempt})"),
        issues: issues
            .iter()
            .map(|issue| format!("{}: {}", issue.dotted_path(), issue.message))
            .collect(),
        corrections: corrections_for_issues(issues),
    }
}

/// Renders the full schema-failure feedback text for the next prompt.
///
/// Layout: urgency-prefixed header, bulleted issue lines, a
/// "Specific Corrections Needed" block when corrections exist, a
/// "General Suggestions" block, and a standalone final-attempt warning
/// once the next attempt would be the last.
#[must_use]
pub fn render_schema_feedback(
    issues: &[ValidationIssue],
    attempt: u32,
    max_attempts: u32,
) -> String {
    let mut text = format!(
        "{}Schema Validation Failed (Attempt {attempt})\n",
        urgency_prefix(attempt)
    );

    for issue in issues {
        text.push_str("- ");
        text.push_str(&issue.dotted_path());
        text.push_str(": ");
        text.push_str(&issue.message);
        text.push('\n');
    }

    let corrections = corrections_for_issues(issues);
    if !corrections.is_empty() {
        text.push_str("\nSpecific Corrections Needed:\n");
        for correction in &corrections {
            text.push_str("- ");
            text.push_str(correction);
            text.push('\n');
        }
    }

    if !issues.is_empty() {
        text.push_str("\nGeneral Suggestions:\n");
        for suggestion in GENERAL_SUGGESTIONS {
            text.push_str("- ");
            text.push_str(suggestion);
            text.push('\n');
        }
    }

    if attempt + 1 >= max_attempts {
        text.push('\n');
        text.push_str(FINAL_ATTEMPT_WARNING);
        text.push('\n');
    }

    text
}

/// Renders feedback for output that was empty or failed to parse as JSON.
#[must_use]
pub fn render_parse_feedback(code: ValidationErrorCode, attempt: u32, max_attempts: u32) -> String {
    let (header, body) = if code == ValidationErrorCode::EmptyResponse {
        (
            "Empty Response",
            "Your previous response was empty. Respond with a single JSON object that matches the schema.",
        )
    } else {
        (
            "Response Was Not Valid JSON",
            "Your previous response could not be parsed as JSON. Respond with a single JSON object that matches the schema.",
        )
    };

    let mut text = format!(
        "{}{header} (Attempt {attempt})\n{body}\n",
        urgency_prefix(attempt)
    );

    if attempt >= 3 {
        for directive in JSON_HARD_DIRECTIVES {
            text.push_str("- ");
            text.push_str(directive);
            text.push('\n');
        }
    }

    if attempt + 1 >= max_attempts {
        text.push('\n');
        text.push_str(FINAL_ATTEMPT_WARNING);
        text.push('\n');
    }

    text
}

/// Suggestions attached to parse failures (which carry no issue list).
#[must_use]
pub fn parse_failure_suggestions(code: ValidationErrorCode) -> Vec<String> {
    let lead = if code == ValidationErrorCode::EmptyResponse {
        "Produce a non-empty response containing only JSON"
    } else {
        "Respond with valid JSON only, no surrounding prose"
    };
    vec![
        lead.to_string(),
        "Ensure the response starts with '{' and ends with '}'".to_string(),
    ]
}

/// Builds the [`ValidationError`] for a schema mismatch.
#[must_use]
pub fn schema_error(
    issues: Vec<ValidationIssue>,
    raw_output: String,
    retry_hint: crate::error::RetryHint,
    attempt: u32,
) -> ValidationError {
    let suggestions = suggestions_for_issues(&issues);
    let feedback = structured_feedback(&issues, attempt);
    ValidationError {
        code: ValidationErrorCode::SchemaMismatch,
        issues,
        raw_output,
        retry_hint,
        feedback,
        suggestions,
    }
}

/// Builds the [`ValidationError`] for empty or unparsable output.
#[must_use]
pub fn parse_error(code: ValidationErrorCode, raw_output: String, attempt: u32) -> ValidationError {
    let summary = if code == ValidationErrorCode::EmptyResponse {
        format!("Empty Response (Attempt {attempt})")
    } else {
        format!("Response Was Not Valid JSON (Attempt {attempt})")
    };
    ValidationError {
        code,
        issues: Vec::new(),
        raw_output,
        retry_hint: crate::error::RetryHint::DemandJsonFormat,
        feedback: ValidationFeedback {
            summary,
            issues: Vec::new(),
            corrections: JSON_HARD_DIRECTIVES.iter().map(ToString::to_string).collect(),
        },
        suggestions: parse_failure_suggestions(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetryHint;

    fn type_issue() -> ValidationIssue {
        ValidationIssue::new(
            vec!["age".into()],
            IssueCode::InvalidType,
            "expected number, received string",
        )
        .with_expected("number")
        .with_received("string")
    }

    #[test]
    fn urgency_prefix_escalates_and_plateaus() {
        assert_eq!(urgency_prefix(1), "");
        assert_eq!(urgency_prefix(2), "⚠️ IMPORTANT: ");
        assert_eq!(urgency_prefix(3), "🚨 CRITICAL: ");
        assert_eq!(urgency_prefix(100), "🚨 CRITICAL: ");
    }

    #[test]
    fn type_mismatch_templates() {
        let issue = type_issue();
        assert_eq!(
            suggestion_for_issue(&issue),
            "Field \"age\": Expected number, but got string. \
             Please ensure this field contains the correct data type."
        );
        assert_eq!(
            correction_for_issue(&issue).unwrap(),
            "Change from string to number"
        );
        assert_eq!(priority_for(issue.code), FeedbackPriority::Critical);
    }

    #[test]
    fn type_mismatch_unknown_received() {
        let issue = ValidationIssue::new(vec!["age".into()], IssueCode::InvalidType, "missing")
            .with_expected("number");
        assert!(suggestion_for_issue(&issue).contains("but got unknown"));
    }

    #[test]
    fn too_small_wording_differentiates_origin() {
        let s = ValidationIssue::new(vec!["name".into()], IssueCode::TooSmall, "too short")
            .with_minimum(3.0, SizeOrigin::String);
        let a = ValidationIssue::new(vec!["items".into()], IssueCode::TooSmall, "too few")
            .with_minimum(2.0, SizeOrigin::Array);
        let n = ValidationIssue::new(vec!["age".into()], IssueCode::TooSmall, "too small")
            .with_minimum(18.0, SizeOrigin::Number);

        assert_eq!(
            suggestion_for_issue(&s),
            "Field \"name\": Text is too short. Minimum length: 3."
        );
        assert_eq!(
            suggestion_for_issue(&a),
            "Field \"items\": Too few items. Minimum required: 2."
        );
        assert_eq!(
            suggestion_for_issue(&n),
            "Field \"age\": Value is too small. Minimum: 18."
        );
        assert_eq!(
            correction_for_issue(&s).unwrap(),
            "Increase length to at least 3"
        );
        assert_eq!(correction_for_issue(&a).unwrap(), "Add at least 2 items");
        assert_eq!(
            correction_for_issue(&n).unwrap(),
            "Increase value to at least 18"
        );
    }

    #[test]
    fn too_big_wording_differentiates_origin() {
        let s = ValidationIssue::new(vec!["bio".into()], IssueCode::TooBig, "too long")
            .with_maximum(80.0, SizeOrigin::String);
        let a = ValidationIssue::new(vec!["tags".into()], IssueCode::TooBig, "too many")
            .with_maximum(5.0, SizeOrigin::Array);
        assert_eq!(
            suggestion_for_issue(&s),
            "Field \"bio\": Text is too long. Maximum length: 80."
        );
        assert_eq!(
            suggestion_for_issue(&a),
            "Field \"tags\": Too many items. Maximum allowed: 5."
        );
        assert_eq!(
            correction_for_issue(&s).unwrap(),
            "Reduce length to at most 80"
        );
    }

    #[test]
    fn enum_and_union_templates() {
        let e = ValidationIssue::new(vec!["color".into()], IssueCode::InvalidEnum, "bad value")
            .with_options(vec!["red".into(), "green".into(), "blue".into()]);
        assert_eq!(
            suggestion_for_issue(&e),
            "Field \"color\": Must be one of: red, green, blue"
        );
        assert!(correction_for_issue(&e).is_none());

        let u = ValidationIssue::new(vec!["value".into()], IssueCode::InvalidUnion, "no match");
        assert_eq!(
            suggestion_for_issue(&u),
            "Field \"value\": Value doesn't match any of the expected types in the union."
        );
        assert_eq!(priority_for(u.code), FeedbackPriority::High);
    }

    #[test]
    fn unrecognized_keys_templates() {
        let k = ValidationIssue::new(vec![], IssueCode::UnrecognizedKeys, "extra keys")
            .with_keys(vec!["foo".into(), "bar".into()]);
        assert_eq!(
            suggestion_for_issue(&k),
            "Field \"root\": Contains unexpected keys: foo, bar. Remove these fields."
        );
        assert_eq!(
            correction_for_issue(&k).unwrap(),
            "Remove unexpected fields: foo, bar"
        );

        let anon = ValidationIssue::new(vec![], IssueCode::UnrecognizedKeys, "extra keys");
        assert!(suggestion_for_issue(&anon).contains("unknown keys"));
    }

    #[test]
    fn string_format_templates() {
        let email = ValidationIssue::new(vec!["contact".into()], IssueCode::InvalidString, "bad")
            .with_format("email");
        assert_eq!(
            suggestion_for_issue(&email),
            "Field \"contact\": Must be a valid email address."
        );
        let uuid = ValidationIssue::new(vec!["id".into()], IssueCode::InvalidString, "bad")
            .with_format("uuid");
        assert_eq!(
            suggestion_for_issue(&uuid),
            "Field \"id\": Must be a valid UUID."
        );
        let other = ValidationIssue::new(vec!["when".into()], IssueCode::InvalidString, "bad")
            .with_format("date-time");
        assert_eq!(
            suggestion_for_issue(&other),
            "Field \"when\": Must match the date-time format."
        );
    }

    #[test]
    fn custom_code_echoes_message_verbatim() {
        let issue = ValidationIssue::new(
            vec!["x".into()],
            IssueCode::Custom,
            "value must be divisible by 7",
        );
        assert_eq!(suggestion_for_issue(&issue), "value must be divisible by 7");
        assert_eq!(
            correction_for_issue(&issue).unwrap(),
            "value must be divisible by 7"
        );
        assert_eq!(priority_for(issue.code), FeedbackPriority::Low);
    }

    #[test]
    fn general_suggestions_appended_only_when_issues_exist() {
        assert!(suggestions_for_issues(&[]).is_empty());

        let suggestions = suggestions_for_issues(&[type_issue()]);
        assert_eq!(suggestions.len(), 1 + GENERAL_SUGGESTIONS.len());
        assert_eq!(suggestions[1], GENERAL_SUGGESTIONS[0]);
    }

    #[test]
    fn format_validation_issues_one_line_per_issue_in_order() {
        let issues = vec![
            ValidationIssue::new(vec!["b".into()], IssueCode::Custom, "second? no, first"),
            ValidationIssue::new(vec![], IssueCode::Custom, "root issue"),
            ValidationIssue::new(
                vec!["a".into(), "b".into()],
                IssueCode::Custom,
                "nested issue",
            ),
        ];
        let formatted = format_validation_issues(&issues);
        let lines: Vec<&str> = formatted.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "b: second? no, first");
        assert_eq!(lines[1], "root: root issue");
        assert_eq!(lines[2], "a.b: nested issue");
    }

    #[test]
    fn feedback_generation_is_pure() {
        let issues = vec![type_issue()];
        let first = render_schema_feedback(&issues, 2, 3);
        let second = render_schema_feedback(&issues, 2, 3);
        assert_eq!(first, second);
        assert_eq!(structured_feedback(&issues, 2), structured_feedback(&issues, 2));
    }

    #[test]
    fn schema_feedback_layout() {
        let text = render_schema_feedback(&[type_issue()], 2, 5);
        assert!(text.starts_with("⚠️ IMPORTANT: Schema Validation Failed (Attempt 2)"));
        assert!(text.contains("- age: expected number, received string"));
        assert!(text.contains("Specific Corrections Needed:\n- Change from string to number"));
        assert!(text.contains("General Suggestions:"));
        assert!(!text.contains("final attempt"));
    }

    #[test]
    fn final_attempt_warning_precedes_last_attempt() {
        let early = render_schema_feedback(&[type_issue()], 1, 3);
        assert!(!early.contains("This is the final attempt."));

        let late = render_schema_feedback(&[type_issue()], 2, 3);
        assert!(late.contains("This is the final attempt."));
    }

    #[test]
    fn parse_feedback_hard_directives_from_third_attempt() {
        let early = render_parse_feedback(ValidationErrorCode::InvalidJson, 1, 5);
        assert!(!early.contains("MUST start with '{'"));

        let late = render_parse_feedback(ValidationErrorCode::InvalidJson, 3, 5);
        assert!(late.starts_with("🚨 CRITICAL: Response Was Not Valid JSON (Attempt 3)"));
        assert!(late.contains("Your response MUST start with '{' and end with '}'."));
        assert!(late.contains("Do NOT include any explanatory text before or after the JSON."));
    }

    #[test]
    fn parse_error_carries_hint_and_suggestions() {
        let err = parse_error(ValidationErrorCode::EmptyResponse, String::new(), 1);
        assert_eq!(err.retry_hint, RetryHint::DemandJsonFormat);
        assert!(!err.suggestions.is_empty());
        assert!(err.feedback.summary.contains("Empty Response"));
    }

    #[test]
    fn schema_error_collects_suggestions_and_corrections() {
        let err = schema_error(
            vec![type_issue()],
            "{\"age\":\"twenty\"}".to_string(),
            RetryHint::AddExamples,
            1,
        );
        assert_eq!(err.code, ValidationErrorCode::SchemaMismatch);
        assert_eq!(err.suggestions.len(), 1 + GENERAL_SUGGESTIONS.len());
        assert_eq!(err.feedback.corrections, vec!["Change from string to number"]);
        assert_eq!(err.feedback.issues, vec!["age: expected number, received string"]);
    }
}
