//! Default schema capability backed by the `jsonschema` crate.
//!
//! Maps `jsonschema` validation errors into the [`ValidationIssue`]
//! taxonomy the feedback generator understands. The schema library itself
//! is consumed, never reimplemented; any schema source that compiles to
//! JSON Schema can sit behind this adapter.

use jsonschema::error::ValidationErrorKind;
use serde_json::Value;
use thiserror::Error;

use crate::capability::SchemaCapability;
use crate::issue::{IssueCode, SizeOrigin, ValidationIssue};

/// Schema failed to compile.
#[derive(Debug, Error)]
#[error("schema compilation failed: {0}")]
pub struct SchemaBuildError(String);

/// A compiled JSON Schema usable as a [`SchemaCapability`].
pub struct JsonSchemaValidator {
    schema: Value,
    validator: jsonschema::Validator,
}

impl JsonSchemaValidator {
    /// Compiles `schema`, failing early when it is invalid.
    pub fn new(schema: Value) -> Result<Self, SchemaBuildError> {
        let validator =
            jsonschema::Validator::new(&schema).map_err(|e| SchemaBuildError(e.to_string()))?;
        Ok(Self { schema, validator })
    }
}

impl SchemaCapability for JsonSchemaValidator {
    fn validate(&self, raw: &Value) -> Result<Value, Vec<ValidationIssue>> {
        // iter_errors reports ALL failures, not just the first.
        let issues: Vec<ValidationIssue> =
            self.validator.iter_errors(raw).map(|e| map_error(&e)).collect();
        if issues.is_empty() {
            Ok(raw.clone())
        } else {
            Err(issues)
        }
    }

    fn describe(&self) -> Option<Value> {
        Some(self.schema.clone())
    }
}

/// Splits a JSON pointer rendering (`/a/0/b`) into unescaped segments.
fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn map_error(error: &jsonschema::ValidationError<'_>) -> ValidationIssue {
    let path = pointer_segments(&error.instance_path.to_string());
    let message = error.to_string();

    match &error.kind {
        ValidationErrorKind::Type { .. } => {
            // The kind's type set is buried in crate-internal types; the
            // rendered message carries the same information.
            let expected = message
                .split("is not of type ")
                .nth(1)
                .map_or_else(|| "unknown".to_string(), |s| s.replace('"', ""));
            ValidationIssue::new(path, IssueCode::InvalidType, message.clone())
                .with_expected(expected)
                .with_received(json_type_name(&error.instance))
        }
        ValidationErrorKind::Required { property } => {
            let mut path = path;
            if let Some(name) = property.as_str() {
                path.push(name.to_string());
            }
            ValidationIssue::new(path, IssueCode::InvalidType, message.clone())
                .with_expected("a value")
                .with_received("undefined")
        }
        ValidationErrorKind::Minimum { limit } | ValidationErrorKind::ExclusiveMinimum { limit } => {
            let mut issue = ValidationIssue::new(path, IssueCode::TooSmall, message.clone());
            if let Some(limit) = limit.as_f64() {
                issue = issue.with_minimum(limit, SizeOrigin::Number);
            }
            issue
        }
        ValidationErrorKind::Maximum { limit } | ValidationErrorKind::ExclusiveMaximum { limit } => {
            let mut issue = ValidationIssue::new(path, IssueCode::TooBig, message.clone());
            if let Some(limit) = limit.as_f64() {
                issue = issue.with_maximum(limit, SizeOrigin::Number);
            }
            issue
        }
        ValidationErrorKind::MinLength { limit } => {
            ValidationIssue::new(path, IssueCode::TooSmall, message.clone())
                .with_minimum(*limit as f64, SizeOrigin::String)
        }
        ValidationErrorKind::MaxLength { limit } => {
            ValidationIssue::new(path, IssueCode::TooBig, message.clone())
                .with_maximum(*limit as f64, SizeOrigin::String)
        }
        ValidationErrorKind::MinItems { limit } => {
            ValidationIssue::new(path, IssueCode::TooSmall, message.clone())
                .with_minimum(*limit as f64, SizeOrigin::Array)
        }
        ValidationErrorKind::MaxItems { limit } => {
            ValidationIssue::new(path, IssueCode::TooBig, message.clone())
                .with_maximum(*limit as f64, SizeOrigin::Array)
        }
        ValidationErrorKind::Enum { options } => {
            let mut issue = ValidationIssue::new(path, IssueCode::InvalidEnum, message.clone());
            if let Some(options) = options.as_array() {
                issue = issue.with_options(
                    options
                        .iter()
                        .map(|o| {
                            o.as_str()
                                .map_or_else(|| o.to_string(), ToString::to_string)
                        })
                        .collect(),
                );
            }
            issue
        }
        ValidationErrorKind::Constant { .. } => {
            ValidationIssue::new(path, IssueCode::InvalidEnum, message.clone())
        }
        ValidationErrorKind::AnyOf { .. }
        | ValidationErrorKind::OneOfNotValid { .. }
        | ValidationErrorKind::OneOfMultipleValid { .. } => {
            ValidationIssue::new(path, IssueCode::InvalidUnion, message.clone())
        }
        ValidationErrorKind::AdditionalProperties { unexpected }
        | ValidationErrorKind::UnevaluatedProperties { unexpected } => {
            ValidationIssue::new(path, IssueCode::UnrecognizedKeys, message.clone())
                .with_keys(unexpected.clone())
        }
        ValidationErrorKind::Format { format } => {
            ValidationIssue::new(path, IssueCode::InvalidString, message.clone())
                .with_format(format.clone())
        }
        ValidationErrorKind::Pattern { .. } => {
            ValidationIssue::new(path, IssueCode::InvalidString, message.clone())
        }
        _ => ValidationIssue::new(path, IssueCode::Custom, message.clone()),
    }
}
