//! Immutable per-run configuration.

use std::sync::Arc;

use serde_json::Value;

use crate::capability::{ProviderOptions, SchemaCapability};

/// Configuration for one extraction run.
///
/// Built once through [`RunConfig::builder`] and immutable afterwards.
/// Many concurrent runs may share the same configuration by cloning it;
/// the schema capability is reference-counted, not copied.
#[derive(Clone)]
pub struct RunConfig {
    schema: Arc<dyn SchemaCapability>,
    input: Value,
    context: Option<String>,
    lens: Option<String>,
    retries: u32,
    model: Option<String>,
    provider_options: ProviderOptions,
    example: Option<Value>,
}

impl RunConfig {
    /// Starts building a configuration for `input` validated by `schema`.
    #[must_use]
    pub fn builder(schema: Arc<dyn SchemaCapability>, input: Value) -> RunConfigBuilder {
        RunConfigBuilder {
            schema,
            input,
            context: None,
            lens: None,
            retries: 2,
            model: None,
            provider_options: ProviderOptions::new(),
            example: None,
        }
    }

    /// The schema capability for this run.
    #[must_use]
    pub fn schema(&self) -> &dyn SchemaCapability {
        self.schema.as_ref()
    }

    /// The input value to extract from.
    #[must_use]
    pub const fn input(&self) -> &Value {
        &self.input
    }

    /// Optional conversational context string.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Optional lens narrowing what to extract.
    #[must_use]
    pub fn lens(&self) -> Option<&str> {
        self.lens.as_deref()
    }

    /// Retry budget: failed attempts allowed beyond the first.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Maximum number of attempts (`retries + 1`).
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Model id to request from the provider, if pinned.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Free-form provider options.
    #[must_use]
    pub const fn provider_options(&self) -> &ProviderOptions {
        &self.provider_options
    }

    /// Example output to anchor the prompt, if supplied.
    #[must_use]
    pub const fn example(&self) -> Option<&Value> {
        self.example.as_ref()
    }

    /// Sampling temperature from `provider_options`, if set.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.provider_options
            .get("temperature")
            .and_then(Value::as_f64)
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("input", &self.input)
            .field("context", &self.context)
            .field("lens", &self.lens)
            .field("retries", &self.retries)
            .field("model", &self.model)
            .field("example", &self.example)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`RunConfig`].
pub struct RunConfigBuilder {
    schema: Arc<dyn SchemaCapability>,
    input: Value,
    context: Option<String>,
    lens: Option<String>,
    retries: u32,
    model: Option<String>,
    provider_options: ProviderOptions,
    example: Option<Value>,
}

impl RunConfigBuilder {
    /// Sets the conversational context string.
    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Sets the extraction lens.
    #[must_use]
    pub fn lens(mut self, lens: impl Into<String>) -> Self {
        self.lens = Some(lens.into());
        self
    }

    /// Sets the retry budget (failed attempts allowed beyond the first).
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Pins a model id.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Adds one provider option.
    #[must_use]
    pub fn provider_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.provider_options.insert(key.into(), value);
        self
    }

    /// Supplies an example output to anchor the prompt.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    /// Finalizes the configuration.
    #[must_use]
    pub fn build(self) -> RunConfig {
        RunConfig {
            schema: self.schema,
            input: self.input,
            context: self.context,
            lens: self.lens,
            retries: self.retries,
            model: self.model,
            provider_options: self.provider_options,
            example: self.example,
        }
    }
}
