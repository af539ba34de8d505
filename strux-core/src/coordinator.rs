//! Session identity resolution across the store-side and provider-side
//! identity spaces.
//!
//! A caller-supplied session reference may be a store record id or an
//! already-provider-native handle; the coordinator figures out which and
//! translates where it can, falling back to the original id rather than
//! failing when the record belongs to a different provider.

use crate::capability::{Provider, SessionOptions};
use crate::config::RunConfig;
use crate::error::{ProviderError, ProviderErrorCode};
use crate::session::{SessionMetadata, SessionPatch, SessionStore};

/// The usable session identity resolved for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatedSession {
    /// Session id to hand to the provider, if the run has one.
    pub provider_session_id: Option<String>,
    /// Store record backing the session, when one is known.
    pub record_id: Option<String>,
}

impl CoordinatedSession {
    /// A run with no session at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            provider_session_id: None,
            record_id: None,
        }
    }
}

/// Resolves logical session references into usable provider sessions.
pub struct SessionCoordinator<'a> {
    provider: &'a dyn Provider,
    store: &'a dyn SessionStore,
}

impl<'a> SessionCoordinator<'a> {
    /// Creates a coordinator over one provider and one store.
    #[must_use]
    pub const fn new(provider: &'a dyn Provider, store: &'a dyn SessionStore) -> Self {
        Self { provider, store }
    }

    /// Pre-flight validation of the session plan. No I/O.
    ///
    /// Invalid plans: a supplied id with a session-incapable provider, and
    /// a session-capable provider that cannot create sessions when no id
    /// was supplied.
    pub fn validate_plan(&self, requested: Option<&str>) -> Result<(), ProviderError> {
        if requested.is_some() && !self.provider.supports_sessions() {
            return Err(ProviderError::new(
                ProviderErrorCode::InvalidConfiguration,
                self.provider.name(),
                "a session id was supplied but this provider does not support sessions",
            ));
        }
        if requested.is_none()
            && self.provider.supports_sessions()
            && !self.provider.supports_session_creation()
        {
            // Contract violation, not a transient fault.
            return Err(ProviderError::new(
                ProviderErrorCode::SessionNotSupported,
                self.provider.name(),
                "provider claims session support but exposes no creation capability",
            ));
        }
        Ok(())
    }

    /// Resolves the session identity for one run.
    pub async fn resolve(
        &self,
        requested: Option<&str>,
        config: &RunConfig,
    ) -> Result<CoordinatedSession, ProviderError> {
        match requested {
            Some(id) => Ok(self.translate(id).await),
            None if !self.provider.supports_sessions() => Ok(CoordinatedSession::none()),
            None => self.create(config).await,
        }
    }

    /// Translates a caller-supplied id into a provider-usable one.
    ///
    /// Unknown ids pass through unchanged: they are treated as already
    /// provider-native. A record owned by a different provider falls back
    /// to the original id; translation never fails the run.
    async fn translate(&self, id: &str) -> CoordinatedSession {
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "session store read failed; passing id through");
                None
            }
        };

        let Some(record) = record else {
            tracing::debug!(session_id = %id, "no store record; treating id as provider-native");
            return CoordinatedSession {
                provider_session_id: Some(id.to_string()),
                record_id: None,
            };
        };

        if record.metadata.provider != self.provider.name() {
            tracing::warn!(
                session_id = %id,
                recorded_provider = %record.metadata.provider,
                active_provider = %self.provider.name(),
                "session belongs to a different provider; using the original id"
            );
            return CoordinatedSession {
                provider_session_id: Some(id.to_string()),
                record_id: Some(record.id),
            };
        }

        let native = record
            .provider_session_id()
            .map_or_else(|| id.to_string(), str::to_string);
        CoordinatedSession {
            provider_session_id: Some(native),
            record_id: Some(record.id),
        }
    }

    /// Creates a fresh provider session and its backing store record.
    async fn create(&self, config: &RunConfig) -> Result<CoordinatedSession, ProviderError> {
        if !self.provider.supports_session_creation() {
            return Err(ProviderError::new(
                ProviderErrorCode::SessionNotSupported,
                self.provider.name(),
                "provider claims session support but exposes no creation capability",
            ));
        }

        let options = SessionOptions {
            temperature: config.temperature(),
            model: config.model().map(str::to_string),
        };
        let native_id = self
            .provider
            .create_session(config.context(), &options)
            .await
            .map_err(|e| {
                ProviderError::new(
                    ProviderErrorCode::SessionCreationFailed,
                    self.provider.name(),
                    format!("session creation failed: {}", e.message),
                )
            })?;

        // Store bookkeeping is best effort: a store fault must not lose the
        // freshly created provider session.
        let metadata = SessionMetadata::new(
            self.provider.name(),
            config.model().map(str::to_string),
        );
        let record_id = match self
            .store
            .create(config.context().map(str::to_string), metadata)
            .await
        {
            Ok(record) => {
                let patch = SessionPatch::provider_session_id(&native_id);
                if let Err(e) = self.store.update(&record.id, patch).await {
                    tracing::warn!(record_id = %record.id, error = %e, "failed to stash provider session id");
                }
                Some(record.id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to create session record; continuing without one");
                None
            }
        };

        Ok(CoordinatedSession {
            provider_session_id: Some(native_id),
            record_id,
        })
    }

    /// Records one completed turn against a session record. Best effort.
    pub async fn record_turn(&self, record_id: &str, tokens: u64) {
        let current = match self.store.get(record_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(record_id = %record_id, error = %e, "turn bookkeeping read failed");
                return;
            }
        };
        let patch = SessionPatch::turn(
            current.metadata.prompt_count + 1,
            current.metadata.total_tokens + tokens,
        );
        if let Err(e) = self.store.update(record_id, patch).await {
            tracing::warn!(record_id = %record_id, error = %e, "turn bookkeeping write failed");
        }
    }
}
