//! Top-level pipeline: configuration, session coordination, execution,
//! result processing.
//!
//! `Pipeline::run` always resolves to an [`ExtractionResult`]; failures at
//! any stage are folded into the envelope rather than propagated. Session
//! coordination failures short-circuit before the first attempt with
//! `attempts = 0`.

use std::sync::Arc;

use chrono::Utc;

use crate::capability::Provider;
use crate::config::RunConfig;
use crate::coordinator::SessionCoordinator;
use crate::engine::ExecutionEngine;
use crate::error::{ProviderError, ProviderErrorCode};
use crate::result::{self, ExtractionResult};
use crate::session::SessionStore;

/// Composes the session coordinator, execution engine, and result
/// processor over one provider and one session store.
///
/// Dependencies are explicit: there are no process-wide singletons here.
/// A thin default composition belongs at the outermost boundary, not in
/// this crate.
#[derive(Clone)]
pub struct Pipeline {
    provider: Arc<dyn Provider>,
    store: Arc<dyn SessionStore>,
}

impl Pipeline {
    /// Builds a pipeline over the given provider and session store.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, store: Arc<dyn SessionStore>) -> Self {
        Self { provider, store }
    }

    /// The provider this pipeline executes against.
    #[must_use]
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Runs one extraction, optionally within a logical session.
    ///
    /// Never panics and never returns early without an envelope: every
    /// failure mode lands in `ExtractionResult::error`.
    pub async fn run(&self, config: &RunConfig, session_id: Option<&str>) -> ExtractionResult {
        let started_at = Utc::now();
        let provider_name = self.provider.name().to_string();
        let model = config.model().map(str::to_string);

        let coordinator = SessionCoordinator::new(self.provider.as_ref(), self.store.as_ref());

        if let Err(error) = coordinator.validate_plan(session_id) {
            tracing::warn!(code = %error.code, "session plan rejected in pre-flight");
            return result::short_circuit(
                error,
                started_at,
                &provider_name,
                model,
                session_id.map(str::to_string),
            );
        }

        let session = match coordinator.resolve(session_id, config).await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(code = %error.code, "session coordination failed");
                let error = coordination_failure(error, &provider_name);
                return result::short_circuit(
                    error,
                    started_at,
                    &provider_name,
                    model,
                    session_id.map(str::to_string),
                );
            }
        };

        let engine = ExecutionEngine::new(self.provider.as_ref());
        let outcome = engine
            .run(config, session.provider_session_id.as_deref())
            .await;

        if outcome.is_success() {
            if let Some(record_id) = &session.record_id {
                coordinator
                    .record_turn(record_id, outcome.token_usage.total_tokens)
                    .await;
            }
        }

        let public_session = session
            .record_id
            .clone()
            .or_else(|| session.provider_session_id.clone())
            .or_else(|| session_id.map(str::to_string));

        result::process(outcome, started_at, &provider_name, model, public_session)
    }
}

/// Wraps a coordination-stage failure, preserving specific codes.
///
/// Session-specific codes pass through untouched; anything else (a store
/// fault surfacing as a provider error, for instance) is normalized to
/// `session_coordination_failed` with the original message attached.
fn coordination_failure(error: ProviderError, provider: &str) -> ProviderError {
    match error.code {
        ProviderErrorCode::SessionCreationFailed
        | ProviderErrorCode::SessionNotSupported
        | ProviderErrorCode::InvalidConfiguration => error,
        _ => {
            let message = if error.message.is_empty() {
                "Unknown error".to_string()
            } else {
                error.message.clone()
            };
            ProviderError::new(
                ProviderErrorCode::SessionCoordinationFailed,
                provider,
                message,
            )
        }
    }
}
