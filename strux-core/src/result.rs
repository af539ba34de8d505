//! The public result envelope and the processor that builds it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::EngineOutcome;
use crate::error::{
    ExtractError, ProviderError, ValidationError, ValidationErrorCode, ValidationFeedback,
};
use crate::feedback::GENERAL_SUGGESTIONS;

/// Timing and provenance attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Wall-clock duration of the run in milliseconds.
    pub execution_time_ms: u64,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
    /// Provider the run executed against.
    pub provider: String,
    /// Model used, when pinned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Error payload of a failed result, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultError {
    /// Validation-side failure.
    Validation(ValidationError),
    /// Provider-side failure.
    Provider(ProviderError),
}

impl ResultError {
    /// The wire-format code string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code.as_str(),
            Self::Provider(e) => e.code.as_str(),
        }
    }

    /// Whether the failure is worth retrying in a fresh run.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Provider(e) => e.retryable,
        }
    }

    /// Suggestions attached to this failure, if any.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Validation(e) => &e.suggestions,
            Self::Provider(_) => &[],
        }
    }
}

impl From<ExtractError> for ResultError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::Provider(e) => Self::Provider(e),
            ExtractError::Validation(e) => Self::Validation(e),
        }
    }
}

/// Public outcome of one extraction run.
///
/// `ok` is true only when the run succeeded AND produced a value; a failed
/// run always carries a populated `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Whether the run produced a conforming value.
    pub ok: bool,
    /// The conforming value, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// The failure, when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
    /// Number of attempts made.
    pub attempts: u32,
    /// Session id the run executed under, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Timing and provenance.
    pub metadata: ResultMetadata,
}

impl ExtractionResult {
    /// Deserializes the value into `T`, when the run succeeded.
    pub fn value_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.value {
            Some(value) => serde_json::from_value(value.clone()),
            None => Err(serde::de::Error::custom("result carries no value")),
        }
    }
}

/// Generic validation error backfilled when a failed run lost its error.
#[must_use]
pub fn unknown_failure() -> ValidationError {
    let mut suggestions: Vec<String> =
        GENERAL_SUGGESTIONS.iter().map(ToString::to_string).collect();
    suggestions.push("Retry the extraction; the failure had no specific diagnosis".to_string());
    ValidationError {
        code: ValidationErrorCode::UnknownError,
        issues: Vec::new(),
        raw_output: String::new(),
        retry_hint: crate::error::RetryHint::DemandJsonFormat,
        feedback: ValidationFeedback {
            summary: "Extraction failed without a specific error".to_string(),
            issues: Vec::new(),
            corrections: Vec::new(),
        },
        suggestions,
    }
}

/// Converts a raw engine outcome into the public envelope.
///
/// A "successful" outcome without a value is treated as a failure, and a
/// failed outcome without an error is backfilled with a generic
/// `unknown_error`, so `ok: false` always has a populated error.
#[must_use]
pub fn process(
    outcome: EngineOutcome,
    started_at: DateTime<Utc>,
    provider: &str,
    model: Option<String>,
    session_id: Option<String>,
) -> ExtractionResult {
    let completed_at = Utc::now();
    let execution_time_ms = (completed_at - started_at)
        .num_milliseconds()
        .try_into()
        .unwrap_or(0);

    let ok = outcome.error.is_none() && outcome.value.is_some();
    let error = if ok {
        None
    } else {
        Some(
            outcome
                .error
                .map_or_else(|| ResultError::Validation(unknown_failure()), Into::into),
        )
    };

    ExtractionResult {
        ok,
        value: if ok { outcome.value } else { None },
        error,
        attempts: outcome.attempts,
        session_id,
        metadata: ResultMetadata {
            execution_time_ms,
            started_at,
            completed_at,
            provider: provider.to_string(),
            model,
        },
    }
}

/// Builds the short-circuit envelope for a failure before any attempt ran.
#[must_use]
pub fn short_circuit(
    error: ProviderError,
    started_at: DateTime<Utc>,
    provider: &str,
    model: Option<String>,
    session_id: Option<String>,
) -> ExtractionResult {
    let completed_at = Utc::now();
    ExtractionResult {
        ok: false,
        value: None,
        error: Some(ResultError::Provider(error)),
        attempts: 0,
        session_id,
        metadata: ResultMetadata {
            execution_time_ms: (completed_at - started_at)
                .num_milliseconds()
                .try_into()
                .unwrap_or(0),
            started_at,
            completed_at,
            provider: provider.to_string(),
            model,
        },
    }
}
