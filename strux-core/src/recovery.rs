//! Error classification and recovery advice.
//!
//! Pure decision table: error + provider session capability + attempt
//! number in, severity/category classification and a recovery strategy
//! out. No I/O and no state; the orchestrator and callers branch on the
//! returned data.

use serde::{Deserialize, Serialize};

use crate::error::{
    ExtractError, ProviderError, ProviderErrorCode, RetryHint, ValidationError,
    ValidationErrorCode,
};

/// Attempt number from which a still-failing run counts as persistent.
pub const PERSISTENT_FAILURE_THRESHOLD: u32 = 3;

/// How bad a failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected noise; retry quietly.
    Low,
    /// Worth noting.
    Medium,
    /// Needs attention.
    High,
}

/// What kind of failure this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Goes away on its own (rate limits, flaky backends).
    Transient,
    /// The model produced non-conforming output.
    Validation,
    /// The run or provider setup is wrong.
    Configuration,
    /// Nothing more specific applies.
    Unknown,
}

/// Classification of one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAssessment {
    /// How bad it is.
    pub severity: Severity,
    /// What kind of failure it is.
    pub category: ErrorCategory,
    /// Whether the run can still recover on its own.
    pub recoverable: bool,
    /// Whether a human has to change something.
    pub user_action_required: bool,
}

/// What to do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Try again with corrective feedback.
    Retry,
    /// Discard the session and start a fresh one.
    SessionReset,
    /// Change the run configuration before trying again.
    ConfigurationChange,
    /// A human must intervene.
    ManualIntervention,
}

/// Recovery recommendation for one failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    /// The recommended action.
    pub action: RecoveryAction,
    /// Why this action was chosen.
    pub reason: String,
    /// Concrete next steps.
    pub suggestions: Vec<String>,
    /// Whether an automatic retry is appropriate.
    pub retryable: bool,
}

/// Classifies a failure by severity and category.
#[must_use]
pub fn assess(error: &ExtractError, supports_sessions: bool, attempt: u32) -> ErrorAssessment {
    match error {
        ExtractError::Provider(e) => assess_provider(e, attempt),
        ExtractError::Validation(e) => assess_validation(e, supports_sessions, attempt),
    }
}

fn assess_provider(error: &ProviderError, attempt: u32) -> ErrorAssessment {
    match error.code {
        ProviderErrorCode::SessionCreationFailed
        | ProviderErrorCode::SessionNotSupported
        | ProviderErrorCode::AuthenticationFailed
        | ProviderErrorCode::InvalidConfiguration => ErrorAssessment {
            severity: Severity::High,
            category: ErrorCategory::Configuration,
            recoverable: false,
            user_action_required: true,
        },
        ProviderErrorCode::RateLimited | ProviderErrorCode::ProviderUnavailable => {
            ErrorAssessment {
                severity: Severity::Low,
                category: ErrorCategory::Transient,
                recoverable: true,
                user_action_required: false,
            }
        }
        ProviderErrorCode::ProviderCallFailed => {
            if attempt < PERSISTENT_FAILURE_THRESHOLD {
                ErrorAssessment {
                    severity: Severity::Medium,
                    category: ErrorCategory::Transient,
                    recoverable: true,
                    user_action_required: false,
                }
            } else {
                ErrorAssessment {
                    severity: Severity::High,
                    category: ErrorCategory::Transient,
                    recoverable: false,
                    user_action_required: true,
                }
            }
        }
        ProviderErrorCode::OrchestrationFailed
        | ProviderErrorCode::SessionCoordinationFailed => ErrorAssessment {
            severity: Severity::High,
            category: ErrorCategory::Unknown,
            recoverable: false,
            user_action_required: true,
        },
    }
}

fn assess_validation(
    error: &ValidationError,
    _supports_sessions: bool,
    attempt: u32,
) -> ErrorAssessment {
    let persistent = attempt >= PERSISTENT_FAILURE_THRESHOLD;
    ErrorAssessment {
        severity: if persistent {
            Severity::High
        } else {
            Severity::Medium
        },
        category: if error.code == ValidationErrorCode::UnknownError {
            ErrorCategory::Unknown
        } else {
            ErrorCategory::Validation
        },
        recoverable: !persistent,
        user_action_required: persistent,
    }
}

/// Recommends a recovery strategy for a failure.
#[must_use]
pub fn advise(error: &ExtractError, supports_sessions: bool, attempt: u32) -> RecoveryStrategy {
    match error {
        ExtractError::Provider(e) => advise_provider(e, attempt),
        ExtractError::Validation(e) => advise_validation(e, supports_sessions, attempt),
    }
}

fn advise_provider(error: &ProviderError, attempt: u32) -> RecoveryStrategy {
    match error.code {
        ProviderErrorCode::SessionCreationFailed | ProviderErrorCode::SessionNotSupported => {
            RecoveryStrategy {
                action: RecoveryAction::ConfigurationChange,
                reason: format!("session setup failed: {}", error.message),
                suggestions: vec![
                    "Run without a session, or switch to a session-capable provider".to_string(),
                    "Check the provider's session configuration".to_string(),
                ],
                retryable: false,
            }
        }
        ProviderErrorCode::RateLimited | ProviderErrorCode::ProviderUnavailable => {
            RecoveryStrategy {
                action: RecoveryAction::Retry,
                reason: "transient provider fault".to_string(),
                suggestions: vec!["Retry the call; the fault should clear on its own".to_string()],
                retryable: true,
            }
        }
        ProviderErrorCode::AuthenticationFailed | ProviderErrorCode::InvalidConfiguration => {
            RecoveryStrategy {
                action: RecoveryAction::ManualIntervention,
                reason: format!("provider configuration problem: {}", error.message),
                suggestions: vec![
                    "Verify credentials and provider settings".to_string(),
                    "Check the provider's account status".to_string(),
                ],
                retryable: false,
            }
        }
        ProviderErrorCode::ProviderCallFailed => {
            if attempt < PERSISTENT_FAILURE_THRESHOLD {
                RecoveryStrategy {
                    action: RecoveryAction::Retry,
                    reason: "provider call failed; likely transient".to_string(),
                    suggestions: vec!["Retry the call".to_string()],
                    retryable: true,
                }
            } else {
                RecoveryStrategy {
                    action: RecoveryAction::ManualIntervention,
                    reason: format!(
                        "provider calls keep failing after {attempt} attempts: {}",
                        error.message
                    ),
                    suggestions: vec![
                        "Check provider availability and network connectivity".to_string(),
                        "Inspect provider logs for a persistent fault".to_string(),
                    ],
                    retryable: false,
                }
            }
        }
        ProviderErrorCode::OrchestrationFailed
        | ProviderErrorCode::SessionCoordinationFailed => RecoveryStrategy {
            action: RecoveryAction::ManualIntervention,
            reason: format!("unexpected failure: {}", error.message),
            suggestions: vec![
                "Inspect logs for the underlying failure".to_string(),
                "Report the error if it persists".to_string(),
            ],
            retryable: false,
        },
    }
}

fn advise_validation(
    error: &ValidationError,
    supports_sessions: bool,
    attempt: u32,
) -> RecoveryStrategy {
    // Persistent validation failure: the conversation itself may be poisoned.
    if attempt >= PERSISTENT_FAILURE_THRESHOLD {
        return if supports_sessions {
            RecoveryStrategy {
                action: RecoveryAction::SessionReset,
                reason: format!(
                    "validation still failing at attempt {attempt}; the session context may be confusing the model"
                ),
                suggestions: vec![
                    "Reset the session and retry with a clean context".to_string(),
                    "Simplify the schema if resets do not help".to_string(),
                ],
                retryable: true,
            }
        } else {
            RecoveryStrategy {
                action: RecoveryAction::ConfigurationChange,
                reason: format!(
                    "validation still failing at attempt {attempt} and the provider has no sessions to reset"
                ),
                suggestions: vec![
                    "Simplify the schema or add an example output".to_string(),
                    "Try a more capable model".to_string(),
                ],
                retryable: false,
            }
        };
    }

    match error.retry_hint {
        RetryHint::AddExamples | RetryHint::DemandJsonFormat => RecoveryStrategy {
            action: RecoveryAction::Retry,
            reason: "validation failure with corrective feedback available".to_string(),
            suggestions: error.suggestions.clone(),
            retryable: true,
        },
        _ => match error.code {
            ValidationErrorCode::InvalidJson
            | ValidationErrorCode::EmptyResponse
            | ValidationErrorCode::SchemaMismatch => RecoveryStrategy {
                action: RecoveryAction::Retry,
                reason: "output format problem; clarify the expected format".to_string(),
                suggestions: vec![
                    "Demand a bare JSON object with no surrounding prose".to_string(),
                    "Restate the schema in the prompt".to_string(),
                ],
                retryable: true,
            },
            _ => RecoveryStrategy {
                action: RecoveryAction::Retry,
                reason: format!("validation failed ({})", error.code),
                suggestions: vec!["Retry with the generated feedback".to_string()],
                retryable: true,
            },
        },
    }
}
