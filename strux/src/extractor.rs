//! Top-level extraction client.
//!
//! [`Extractor`] wires a [`Provider`] and a [`SessionStore`] into a
//! [`Pipeline`] and exposes the extraction entry points. The builder
//! defaults the store to an in-memory one so stateless callers need only
//! supply a provider.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use strux_core::{ExtractionResult, Pipeline, Provider, RunConfig, SessionStore};
use strux_store::MemorySessionStore;

/// High-level client for schema-conformant extraction.
///
/// Cheap to clone; clones share the underlying provider and store.
#[derive(Clone)]
pub struct Extractor {
    pipeline: Arc<Pipeline>,
}

impl Extractor {
    /// Starts building an extractor.
    #[must_use]
    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::default()
    }

    /// Runs a single stateless extraction.
    pub async fn extract(&self, config: &RunConfig) -> ExtractionResult {
        self.pipeline.run(config, None).await
    }

    /// Runs an extraction within a logical session.
    ///
    /// The session id may be a store record id, a provider-native id, or an
    /// id strux has never seen; unknown ids are passed through to the
    /// provider unchanged.
    pub async fn extract_in_session(
        &self,
        session_id: &str,
        config: &RunConfig,
    ) -> ExtractionResult {
        self.pipeline.run(config, Some(session_id)).await
    }

    /// Runs a stateless extraction and deserializes the value into `T`.
    ///
    /// # Errors
    ///
    /// Returns the full [`ExtractionResult`] envelope when the extraction
    /// failed or the value does not deserialize into `T`.
    pub async fn extract_typed<T: DeserializeOwned>(
        &self,
        config: &RunConfig,
    ) -> Result<T, Box<ExtractionResult>> {
        let result = self.extract(config).await;
        match result.value_as() {
            Ok(value) if result.ok => Ok(value),
            _ => Err(Box::new(result)),
        }
    }

    /// The provider this extractor runs against.
    #[must_use]
    pub fn provider(&self) -> &dyn Provider {
        self.pipeline.provider()
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("provider", &self.pipeline.provider().name())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Extractor`].
#[derive(Default)]
pub struct ExtractorBuilder {
    provider: Option<Arc<dyn Provider>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl ExtractorBuilder {
    /// Sets the provider to extract against. Required.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Sets the session store. Defaults to [`MemorySessionStore`].
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the extractor.
    ///
    /// # Panics
    ///
    /// Panics if no provider was set.
    #[must_use]
    #[allow(clippy::panic)]
    pub fn build(self) -> Extractor {
        let provider = self
            .provider
            .unwrap_or_else(|| panic!("ExtractorBuilder requires a provider"));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        Extractor {
            pipeline: Arc::new(Pipeline::new(provider, store)),
        }
    }
}

impl std::fmt::Debug for ExtractorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorBuilder")
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .field("store", &self.store.is_some())
            .finish()
    }
}
