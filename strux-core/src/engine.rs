//! The bounded retry loop: prompt, call, parse, validate, feed back.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::capability::{Provider, TokenUsage};
use crate::config::RunConfig;
use crate::error::{ExtractError, RetryHint, ValidationErrorCode};
use crate::feedback;
use crate::prompt;
use crate::recovery::PERSISTENT_FAILURE_THRESHOLD;

/// Record of one failed attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt: u32,
    /// The JSON submitted during this attempt, when it parsed.
    pub submitted: Option<Value>,
    /// Issue or error messages from this attempt.
    pub messages: Vec<String>,
    /// Raw provider output for this attempt.
    pub raw_output: String,
    /// Elapsed time since the run started.
    pub elapsed: Duration,
}

/// Raw outcome of one run: value XOR error, plus attempt accounting.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    /// The conforming value, on success.
    pub value: Option<Value>,
    /// The last failure, when the run did not succeed.
    pub error: Option<ExtractError>,
    /// Number of attempts actually made (bounded by `retries + 1`).
    pub attempts: u32,
    /// One record per failed attempt, in order.
    pub history: Vec<AttemptRecord>,
    /// Token usage accumulated across all attempts.
    pub token_usage: TokenUsage,
}

impl EngineOutcome {
    /// Whether the run produced a conforming value.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.value.is_some() && self.error.is_none()
    }
}

/// Estimate token count from text using the 4-chars-per-token heuristic.
///
/// Counts chars rather than bytes so multi-byte text is not overestimated;
/// ceiling division avoids underestimation.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}

/// Drives the attempt loop for one run.
///
/// Provider rejections and validation failures draw from the same retry
/// budget; the engine never pauses between attempts and never cancels an
/// attempt in flight. A non-retryable provider error ends the run at once.
pub struct ExecutionEngine<'a> {
    provider: &'a dyn Provider,
}

impl<'a> ExecutionEngine<'a> {
    /// Creates an engine bound to one provider.
    #[must_use]
    pub const fn new(provider: &'a dyn Provider) -> Self {
        Self { provider }
    }

    /// Runs the retry loop to completion.
    ///
    /// Attempt numbering starts at 1 and tops out at `config.retries() + 1`.
    /// Each failed attempt feeds its generated feedback into the next
    /// prompt; when the budget is gone the last error is returned.
    pub async fn run(&self, config: &RunConfig, session: Option<&str>) -> EngineOutcome {
        let start = Instant::now();
        let max_attempts = config.max_attempts();
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut token_usage = TokenUsage::default();
        let mut last_error: Option<ExtractError> = None;
        let mut feedback_block: Option<String> = None;

        for attempt in 1..=max_attempts {
            let prompt = prompt::build_prompt(config, attempt, feedback_block.as_deref());
            tracing::debug!(attempt, max_attempts, "sending extraction prompt");

            let response = match self
                .provider
                .send_prompt(session, &prompt, config.provider_options())
                .await
            {
                Ok(response) => response,
                Err(provider_error) => {
                    tracing::warn!(
                        attempt,
                        code = %provider_error.code,
                        retryable = provider_error.retryable,
                        "provider call failed"
                    );
                    history.push(AttemptRecord {
                        attempt,
                        submitted: None,
                        messages: vec![provider_error.message.clone()],
                        raw_output: String::new(),
                        elapsed: start.elapsed(),
                    });
                    let retryable = provider_error.retryable;
                    last_error = Some(provider_error.into());
                    if retryable {
                        // Failed but retriable: costs one attempt, no new feedback.
                        continue;
                    }
                    // Structural fault: retrying cannot fix it.
                    return EngineOutcome {
                        value: None,
                        error: last_error,
                        attempts: attempt,
                        history,
                        token_usage,
                    };
                }
            };

            token_usage.absorb(response.token_usage.unwrap_or(TokenUsage {
                input_tokens: estimate_tokens(&prompt),
                output_tokens: estimate_tokens(&response.content),
                total_tokens: estimate_tokens(&prompt) + estimate_tokens(&response.content),
            }));

            let parsed = match parse_payload(&response.content) {
                Ok(parsed) => parsed,
                Err(code) => {
                    history.push(AttemptRecord {
                        attempt,
                        submitted: None,
                        messages: vec![format!("output was not parseable JSON ({code})")],
                        raw_output: response.content.clone(),
                        elapsed: start.elapsed(),
                    });
                    last_error =
                        Some(feedback::parse_error(code, response.content, attempt).into());
                    if attempt < max_attempts {
                        feedback_block =
                            Some(feedback::render_parse_feedback(code, attempt, max_attempts));
                    }
                    continue;
                }
            };

            match config.schema().validate(&parsed) {
                Ok(value) => {
                    tracing::debug!(attempt, "extraction validated");
                    return EngineOutcome {
                        value: Some(value),
                        error: None,
                        attempts: attempt,
                        history,
                        token_usage,
                    };
                }
                Err(issues) => {
                    tracing::debug!(attempt, issues = issues.len(), "schema validation failed");
                    history.push(AttemptRecord {
                        attempt,
                        submitted: Some(parsed),
                        messages: issues.iter().map(|i| i.message.clone()).collect(),
                        raw_output: response.content.clone(),
                        elapsed: start.elapsed(),
                    });
                    let hint = self.mismatch_hint(config, attempt);
                    if attempt < max_attempts {
                        feedback_block = Some(feedback::render_schema_feedback(
                            &issues,
                            attempt,
                            max_attempts,
                        ));
                    }
                    last_error = Some(
                        feedback::schema_error(issues, response.content, hint, attempt).into(),
                    );
                }
            }
        }

        EngineOutcome {
            value: None,
            error: last_error,
            attempts: max_attempts,
            history,
            token_usage,
        }
    }

    /// Retry hint for a schema mismatch at the given attempt.
    ///
    /// Early failures steer the next prompt (examples or bare-JSON demand);
    /// persistent failures recommend escaping the loop entirely, through a
    /// session reset when the provider has sessions to reset.
    fn mismatch_hint(&self, config: &RunConfig, attempt: u32) -> RetryHint {
        if attempt >= PERSISTENT_FAILURE_THRESHOLD {
            if self.provider.supports_sessions() {
                RetryHint::SessionReset
            } else {
                RetryHint::ConfigurationChange
            }
        } else if config.example().is_none() {
            RetryHint::AddExamples
        } else {
            RetryHint::DemandJsonFormat
        }
    }
}

/// Parses provider output into JSON, tolerating markdown code fences.
fn parse_payload(content: &str) -> Result<Value, ValidationErrorCode> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationErrorCode::EmptyResponse);
    }
    let stripped = strip_code_fences(trimmed);
    serde_json::from_str(stripped).map_err(|_| ValidationErrorCode::InvalidJson)
}

/// Strips a single surrounding markdown code fence, if present.
fn strip_code_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag on the opening fence line.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.strip_suffix("```").map_or(body, str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        PromptResponse, Provider, ProviderOptions, SchemaCapability, SessionOptions,
    };
    use crate::error::{ProviderError, ProviderErrorCode};
    use crate::issue::{IssueCode, ValidationIssue};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Provider that replays a scripted sequence of responses.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicU32,
        sessions: bool,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicU32::new(0),
                sessions: false,
            }
        }

        fn with_sessions(mut self) -> Self {
            self.sessions = true;
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn supports_sessions(&self) -> bool {
            self.sessions
        }

        async fn send_prompt(
            &self,
            _session: Option<&str>,
            _prompt: &str,
            _options: &ProviderOptions,
        ) -> Result<PromptResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(content)) => Ok(PromptResponse::text(content)),
                Some(Err(e)) => Err(e),
                None => Ok(PromptResponse::text("")),
            }
        }

        async fn create_session(
            &self,
            _context: Option<&str>,
            _options: &SessionOptions,
        ) -> Result<String, ProviderError> {
            Ok("native-session".to_string())
        }
    }

    /// Schema requiring `{"name": string, "age": number}`.
    struct PersonSchema;

    impl SchemaCapability for PersonSchema {
        fn validate(
            &self,
            raw: &serde_json::Value,
        ) -> Result<serde_json::Value, Vec<ValidationIssue>> {
            let mut issues = Vec::new();
            if !raw["name"].is_string() {
                issues.push(
                    ValidationIssue::new(
                        vec!["name".into()],
                        IssueCode::InvalidType,
                        "expected string",
                    )
                    .with_expected("string"),
                );
            }
            if !raw["age"].is_number() {
                issues.push(
                    ValidationIssue::new(
                        vec!["age".into()],
                        IssueCode::InvalidType,
                        "expected number",
                    )
                    .with_expected("number")
                    .with_received("string"),
                );
            }
            if issues.is_empty() {
                Ok(raw.clone())
            } else {
                Err(issues)
            }
        }
    }

    fn person_config(retries: u32) -> RunConfig {
        RunConfig::builder(Arc::new(PersonSchema), json!("John is twenty-five"))
            .retries(retries)
            .build()
    }

    #[tokio::test]
    async fn at_most_retries_plus_one_calls() {
        let provider = ScriptedProvider::new(vec![
            Ok("not json".to_string()),
            Ok("not json".to_string()),
            Ok("not json".to_string()),
            Ok("not json".to_string()),
        ]);
        let outcome = ExecutionEngine::new(&provider)
            .run(&person_config(2), None)
            .await;

        assert_eq!(provider.calls(), 3);
        assert_eq!(outcome.attempts, 3);
        assert!(!outcome.is_success());
        assert_eq!(outcome.history.len(), 3);
        match outcome.error.unwrap() {
            ExtractError::Validation(e) => {
                assert_eq!(e.code, ValidationErrorCode::InvalidJson);
                assert_eq!(e.retry_hint, RetryHint::DemandJsonFormat);
            }
            ExtractError::Provider(_) => unreachable!("expected validation error"),
        }
    }

    #[tokio::test]
    async fn corrects_after_feedback() {
        let provider = ScriptedProvider::new(vec![
            Ok(r#"{"name":"John","age":"twenty"}"#.to_string()),
            Ok(r#"{"name":"John","age":25}"#.to_string()),
        ]);
        let outcome = ExecutionEngine::new(&provider)
            .run(&person_config(2), None)
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.value.unwrap(), json!({"name":"John","age":25}));
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history[0].attempt, 1);
    }

    #[tokio::test]
    async fn empty_response_classified() {
        let provider = ScriptedProvider::new(vec![Ok("   ".to_string())]);
        let outcome = ExecutionEngine::new(&provider)
            .run(&person_config(0), None)
            .await;

        assert_eq!(outcome.attempts, 1);
        match outcome.error.unwrap() {
            ExtractError::Validation(e) => assert_eq!(e.code, ValidationErrorCode::EmptyResponse),
            ExtractError::Provider(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn non_retryable_provider_error_short_circuits() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::new(
                ProviderErrorCode::AuthenticationFailed,
                "scripted",
                "bad credentials",
            )),
            Ok(r#"{"name":"John","age":25}"#.to_string()),
        ]);
        let outcome = ExecutionEngine::new(&provider)
            .run(&person_config(3), None)
            .await;

        assert_eq!(provider.calls(), 1);
        assert_eq!(outcome.attempts, 1);
        match outcome.error.unwrap() {
            ExtractError::Provider(e) => {
                assert_eq!(e.code, ProviderErrorCode::AuthenticationFailed);
            }
            ExtractError::Validation(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn provider_and_validation_failures_share_one_budget() {
        let provider = ScriptedProvider::new(vec![
            Err(ProviderError::new(
                ProviderErrorCode::ProviderCallFailed,
                "scripted",
                "blip",
            )),
            Ok("not json".to_string()),
        ]);
        let outcome = ExecutionEngine::new(&provider)
            .run(&person_config(1), None)
            .await;

        assert_eq!(provider.calls(), 2);
        assert_eq!(outcome.attempts, 2);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn mismatch_hint_escalates_by_attempt_and_capability() {
        // Persistent failures against a session-capable provider.
        let provider = ScriptedProvider::new(vec![
            Ok(r#"{"name":"John","age":"a"}"#.to_string()),
            Ok(r#"{"name":"John","age":"b"}"#.to_string()),
            Ok(r#"{"name":"John","age":"c"}"#.to_string()),
        ])
        .with_sessions();
        let outcome = ExecutionEngine::new(&provider)
            .run(&person_config(2), None)
            .await;

        match outcome.error.unwrap() {
            ExtractError::Validation(e) => assert_eq!(e.retry_hint, RetryHint::SessionReset),
            ExtractError::Provider(_) => unreachable!(),
        }

        // Early failure, no example configured: ask for one.
        let provider = ScriptedProvider::new(vec![Ok(r#"{"name":"J","age":"x"}"#.to_string())]);
        let outcome = ExecutionEngine::new(&provider)
            .run(&person_config(0), None)
            .await;
        match outcome.error.unwrap() {
            ExtractError::Validation(e) => assert_eq!(e.retry_hint, RetryHint::AddExamples),
            ExtractError::Provider(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn fenced_json_is_accepted() {
        let provider = ScriptedProvider::new(vec![Ok(
            "```json\n{\"name\":\"John\",\"age\":25}\n```".to_string()
        )]);
        let outcome = ExecutionEngine::new(&provider)
            .run(&person_config(0), None)
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn estimate_tokens_is_ceiling_char_division() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("你好"), 1);
    }
}
