//! Core retry/validation engine for structured LLM extraction.
//!
//! This crate drives a bounded prompt/parse/validate loop against a
//! non-deterministic text-generation provider, feeding corrective
//! validation feedback back into each retry until the output conforms
//! to a schema or the retry budget is exhausted:
//!
//! - [`ExecutionEngine`] - Async retry loop with validation feedback
//! - [`feedback`] - Pure validation-issue-to-suggestion transforms
//! - [`recovery`] - Error classification and recovery strategy table
//! - [`SessionCoordinator`] - Store-side / provider-side session identity resolution
//! - [`Pipeline`] - Top-level orchestrator producing the public result envelope
//!
//! Providers, schemas, and session stores are consumed through narrow
//! capability traits ([`Provider`], [`SchemaCapability`], [`SessionStore`]);
//! concrete adapters live outside this crate.

/// Capability traits for providers, schemas, and session stores.
pub mod capability;
/// Immutable per-run configuration.
pub mod config;
/// Session identity resolution across store-side and provider-side handles.
pub mod coordinator;
/// The bounded retry loop.
pub mod engine;
/// Error taxonomy for provider and validation failures.
pub mod error;
/// Pure validation-feedback generation.
pub mod feedback;
/// Validation issue model.
pub mod issue;
/// Top-level pipeline composition.
pub mod orchestrator;
/// Prompt construction with attempt-driven escalation.
pub mod prompt;
/// Error classification and recovery advice.
pub mod recovery;
/// Public result envelope and the processor that builds it.
pub mod result;
/// Default schema capability backed by the `jsonschema` crate.
pub mod schema;
/// Session records and the store contract.
pub mod session;

pub use capability::{
    FnProvider, PromptResponse, Provider, ProviderOptions, SchemaCapability, SessionHealth,
    SessionOptions, TokenUsage,
};
pub use config::{RunConfig, RunConfigBuilder};
pub use coordinator::{CoordinatedSession, SessionCoordinator};
pub use engine::{AttemptRecord, EngineOutcome, ExecutionEngine};
pub use error::{
    ExtractError, ProviderError, ProviderErrorCode, RetryHint, ValidationError,
    ValidationErrorCode, ValidationFeedback,
};
pub use issue::{IssueCode, SizeOrigin, ValidationIssue};
pub use orchestrator::Pipeline;
pub use recovery::{ErrorAssessment, ErrorCategory, RecoveryAction, RecoveryStrategy, Severity};
pub use result::{ExtractionResult, ResultError, ResultMetadata};
pub use schema::{JsonSchemaValidator, SchemaBuildError};
pub use session::{
    SessionMetadata, SessionPatch, SessionRecord, SessionStore, StoreError,
    PROVIDER_SESSION_ID_KEY,
};
