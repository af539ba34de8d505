//! # strux
//!
//! Schema-conformant structured extraction from LLM providers with bounded
//! retry/validation feedback loops and multi-turn session coordination.
//!
//! A provider returns free text; strux prompts it, parses and validates the
//! output against a schema, and feeds corrective feedback back into the next
//! attempt until the output conforms or the retry budget runs out. Session
//! identity is coordinated across a durable store and provider-native
//! session handles.
//!
//! ## Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use strux::prelude::*;
//! # use serde_json::json;
//! # async fn example(provider: Arc<dyn Provider>) -> Result<(), Box<dyn std::error::Error>> {
//! let schema = JsonSchemaValidator::new(json!({
//!     "type": "object",
//!     "properties": {
//!         "name": {"type": "string"},
//!         "age": {"type": "number"}
//!     },
//!     "required": ["name", "age"]
//! }))?;
//!
//! let extractor = Extractor::builder().provider(provider).build();
//!
//! let config = RunConfig::builder(Arc::new(schema), json!("John is 25 years old"))
//!     .retries(2)
//!     .build();
//!
//! let result = extractor.extract(&config).await;
//! assert!(result.ok);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// The top-level extraction client.
pub mod extractor;

/// Commonly used types and traits.
pub mod prelude;

pub use extractor::{Extractor, ExtractorBuilder};
pub use strux_core::{
    ExtractionResult, JsonSchemaValidator, Pipeline, Provider, ResultError, RunConfig,
    SchemaCapability, SessionStore,
};
pub use strux_store::{FileSessionStore, MemorySessionStore};
