//! Convenience re-exports for typical usage.
//!
//! ```
//! use strux::prelude::*;
//! ```

pub use crate::extractor::{Extractor, ExtractorBuilder};
pub use strux_core::{
    ExtractError, ExtractionResult, FnProvider, JsonSchemaValidator, Provider, ProviderError,
    ProviderErrorCode, ResultError, RunConfig, SchemaCapability, SessionStore, ValidationError,
    ValidationErrorCode, ValidationIssue,
};
pub use strux_store::{FileSessionStore, MemorySessionStore};
