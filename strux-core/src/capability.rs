//! Capability traits consumed by the engine and coordinator.
//!
//! Concrete providers (CLI-backed, SDK-backed, ...) and schema libraries
//! live outside this crate; the core depends only on these contracts.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProviderError, ProviderErrorCode};
use crate::issue::ValidationIssue;

/// Free-form options forwarded to the provider with each prompt.
pub type ProviderOptions = HashMap<String, Value>;

/// Token accounting reported by a provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens produced in the response.
    pub output_tokens: u64,
    /// Total tokens billed.
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Accumulates another usage sample into this one.
    pub fn absorb(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One provider response: text plus optional token accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    /// The raw text content returned by the provider.
    pub content: String,
    /// Token usage, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl PromptResponse {
    /// Creates a response with text content and no usage data.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            token_usage: None,
        }
    }
}

/// Options for creating a provider-native session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Sampling temperature to pin for the session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Model to pin for the session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Health report for a provider-native session handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHealth {
    /// Whether the session is still usable.
    pub valid: bool,
    /// Probe round-trip time in milliseconds, when measured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Failure description when the session is unusable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// External capability that turns a prompt into text, optionally over a
/// multi-turn session.
///
/// `send_prompt` fails by returning a [`ProviderError`]; the engine decides
/// from the error's code and retryable flag whether the attempt counts
/// against the retry budget or short-circuits the run.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable name of this provider (attached to errors and results).
    fn name(&self) -> &str;

    /// Whether this provider can carry conversational sessions at all.
    fn supports_sessions(&self) -> bool;

    /// Whether this provider can create new native sessions.
    ///
    /// A provider may support resuming externally supplied session ids
    /// without being able to mint new ones.
    fn supports_session_creation(&self) -> bool {
        false
    }

    /// Sends one prompt, optionally within a provider-native session.
    async fn send_prompt(
        &self,
        session: Option<&str>,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<PromptResponse, ProviderError>;

    /// Creates a provider-native session and returns its id.
    async fn create_session(
        &self,
        _context: Option<&str>,
        _options: &SessionOptions,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::new(
            ProviderErrorCode::SessionNotSupported,
            self.name(),
            "provider does not support session creation",
        ))
    }

    /// Probes a provider-native session handle.
    async fn validate_session(&self, _id: &str) -> SessionHealth {
        SessionHealth {
            valid: true,
            response_time_ms: None,
            error: None,
        }
    }
}

/// External capability that validates a raw JSON value against a schema.
///
/// On success returns the (possibly coerced) conforming value; on failure
/// returns every discovered issue, not just the first.
pub trait SchemaCapability: Send + Sync {
    /// Validates `raw`, returning the conforming value or all issues.
    fn validate(&self, raw: &Value) -> Result<Value, Vec<ValidationIssue>>;

    /// A JSON rendering of the schema for inclusion in prompts, if available.
    fn describe(&self) -> Option<Value> {
        None
    }
}

type FnProviderCallback =
    dyn Fn(Option<String>, String) -> BoxFuture<'static, Result<String, String>> + Send + Sync;

/// Session-less [`Provider`] backed by an async closure.
///
/// Useful for tests and for wrapping one-shot backends that have no notion
/// of sessions. A closure error string becomes a retryable
/// `provider_call_failed`.
pub struct FnProvider {
    name: String,
    callback: Box<FnProviderCallback>,
}

impl FnProvider {
    /// Wraps an async closure as a provider with the given name.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Option<String>, String) -> BoxFuture<'static, Result<String, String>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl Provider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_sessions(&self) -> bool {
        false
    }

    async fn send_prompt(
        &self,
        session: Option<&str>,
        prompt: &str,
        _options: &ProviderOptions,
    ) -> Result<PromptResponse, ProviderError> {
        let fut = (self.callback)(session.map(str::to_owned), prompt.to_owned());
        match fut.await {
            Ok(content) => Ok(PromptResponse::text(content)),
            Err(message) => Err(ProviderError::new(
                ProviderErrorCode::ProviderCallFailed,
                &self.name,
                message,
            )),
        }
    }
}
