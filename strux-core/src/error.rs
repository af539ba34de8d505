//! Error taxonomy for provider and validation failures.
//!
//! The retry loop branches on data carried here (codes, retryable flags,
//! retry hints), never on opaque exception shapes. Transient faults stay
//! inside the engine until the budget is exhausted; structural faults
//! short-circuit immediately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::issue::ValidationIssue;

/// Enumerated codes for provider-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    /// The provider rejected a prompt call.
    ProviderCallFailed,
    /// The provider failed while creating a native session.
    SessionCreationFailed,
    /// The provider claims session support but exposes no creation capability.
    SessionNotSupported,
    /// The provider throttled the call.
    RateLimited,
    /// The provider is temporarily unreachable.
    ProviderUnavailable,
    /// Credentials were rejected.
    AuthenticationFailed,
    /// The run configuration is invalid for this provider.
    InvalidConfiguration,
    /// An unexpected failure escaped the pipeline sequence.
    OrchestrationFailed,
    /// Session coordination failed before any attempt was made.
    SessionCoordinationFailed,
}

impl ProviderErrorCode {
    /// Whether this failure class is worth retrying by default.
    #[must_use]
    pub const fn default_retryable(self) -> bool {
        matches!(
            self,
            Self::ProviderCallFailed | Self::RateLimited | Self::ProviderUnavailable
        )
    }

    /// The wire-format code string for this variant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProviderCallFailed => "provider_call_failed",
            Self::SessionCreationFailed => "session_creation_failed",
            Self::SessionNotSupported => "session_not_supported",
            Self::RateLimited => "rate_limited",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::AuthenticationFailed => "authentication_failed",
            Self::InvalidConfiguration => "invalid_configuration",
            Self::OrchestrationFailed => "orchestration_failed",
            Self::SessionCoordinationFailed => "session_coordination_failed",
        }
    }
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by (or on behalf of) a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderError {
    /// Failure code.
    pub code: ProviderErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Name of the provider involved.
    pub provider: String,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
    /// Whether retrying the same call can succeed.
    pub retryable: bool,
    /// Provider-specific diagnostic payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ProviderError {
    /// Creates a provider error with the code's default retryable flag.
    #[must_use]
    pub fn new(
        code: ProviderErrorCode,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            provider: provider.into(),
            timestamp: Utc::now(),
            retryable: code.default_retryable(),
            details: None,
        }
    }

    /// Overrides the retryable flag.
    #[must_use]
    pub const fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attaches a diagnostic payload.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} provider error ({}): {}",
            self.provider, self.code, self.message
        )
    }
}

/// Enumerated codes for validation-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorCode {
    /// Output could not be parsed as JSON.
    InvalidJson,
    /// Output was empty or whitespace.
    EmptyResponse,
    /// Output parsed but did not conform to the schema.
    SchemaMismatch,
    /// Generic validation failure.
    ValidationFailed,
    /// Output suggests the model lost track of the conversation context.
    ContextConfusion,
    /// Output suggests the model misunderstood the requested format.
    FormatConfusion,
    /// A failure with no more specific classification.
    UnknownError,
}

impl ValidationErrorCode {
    /// The wire-format code string for this variant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::EmptyResponse => "empty_response",
            Self::SchemaMismatch => "schema_mismatch",
            Self::ValidationFailed => "validation_failed",
            Self::ContextConfusion => "context_confusion",
            Self::FormatConfusion => "format_confusion",
            Self::UnknownError => "unknown_error",
        }
    }
}

impl std::fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the next attempt should differ from the failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryHint {
    /// Include (or reiterate) an example output in the prompt.
    AddExamples,
    /// Demand bare JSON output with no surrounding prose.
    DemandJsonFormat,
    /// Discard the conversational session before retrying.
    SessionReset,
    /// Retrying will not help without a configuration change.
    ConfigurationChange,
}

/// Structured feedback derived from a failed validation, aimed at the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFeedback {
    /// One-line summary of what went wrong.
    pub summary: String,
    /// One `path: message` line per issue, in input order.
    pub issues: Vec<String>,
    /// Concrete corrective instructions.
    pub corrections: Vec<String>,
}

/// A failed validation attempt: issues, raw output, and corrective feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Failure code.
    pub code: ValidationErrorCode,
    /// Issues reported by the schema capability (empty for parse failures).
    pub issues: Vec<ValidationIssue>,
    /// The raw unparsed provider output.
    pub raw_output: String,
    /// Suggested retry strategy for this failure mode.
    pub retry_hint: RetryHint,
    /// Structured feedback for the next prompt.
    pub feedback: ValidationFeedback,
    /// Flat suggestion list for callers and recovery advice.
    pub suggestions: Vec<String>,
}

impl ValidationError {
    /// A short summary line for this error.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.feedback.summary
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "validation failed ({}): {} issue(s)",
            self.code,
            self.issues.len()
        )
    }
}

/// Any failure the engine or coordinator can produce for one run.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The provider failed.
    #[error("{0}")]
    Provider(ProviderError),
    /// The provider answered but the answer failed validation.
    #[error("{0}")]
    Validation(ValidationError),
}

impl ExtractError {
    /// Whether the failure is worth retrying within the same run.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.retryable,
            Self::Validation(_) => true,
        }
    }

    /// The wire-format code string for this failure.
    #[must_use]
    pub const fn code_str(&self) -> &'static str {
        match self {
            Self::Provider(e) => e.code.as_str(),
            Self::Validation(e) => e.code.as_str(),
        }
    }
}

impl From<ProviderError> for ExtractError {
    fn from(e: ProviderError) -> Self {
        Self::Provider(e)
    }
}

impl From<ValidationError> for ExtractError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_codes_serialize_snake_case() {
        let json = serde_json::to_value(ProviderErrorCode::SessionCreationFailed).unwrap();
        assert_eq!(json, serde_json::json!("session_creation_failed"));
        assert_eq!(
            ProviderErrorCode::SessionCreationFailed.to_string(),
            "session_creation_failed"
        );
    }

    #[test]
    fn default_retryable_follows_code() {
        assert!(ProviderError::new(ProviderErrorCode::RateLimited, "mock", "slow down").retryable);
        assert!(
            !ProviderError::new(ProviderErrorCode::AuthenticationFailed, "mock", "denied")
                .retryable
        );
    }

    #[test]
    fn extract_error_retryable_respects_flag() {
        let err: ExtractError =
            ProviderError::new(ProviderErrorCode::SessionNotSupported, "mock", "no sessions")
                .into();
        assert!(!err.is_retryable());
        assert_eq!(err.code_str(), "session_not_supported");
    }
}
