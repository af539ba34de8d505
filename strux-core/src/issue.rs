//! Validation issue model shared between schema capabilities and feedback generation.

use serde::{Deserialize, Serialize};

/// Category of a single schema non-conformance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// Value has the wrong JSON type.
    InvalidType,
    /// String too short, array with too few items, or number below a minimum.
    TooSmall,
    /// String too long, array with too many items, or number above a maximum.
    TooBig,
    /// Value is not one of an enumerated set of allowed values.
    InvalidEnum,
    /// Value matches none of the variants of a union.
    InvalidUnion,
    /// Object carries keys the schema does not declare.
    UnrecognizedKeys,
    /// String fails a format constraint (email, url, uuid, ...).
    InvalidString,
    /// Any issue outside the known taxonomy; the message is authoritative.
    Custom,
}

/// What kind of value a size constraint applies to.
///
/// Drives the "too short / too few items / too small" wording split in
/// feedback for [`IssueCode::TooSmall`] and [`IssueCode::TooBig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeOrigin {
    /// Length of a string.
    String,
    /// Number of items in an array.
    Array,
    /// Magnitude of a number.
    Number,
}

/// One discrete schema non-conformance reported by a schema capability.
///
/// Issues are ephemeral: they exist for the duration of one failed
/// validation call and feed the feedback generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Ordered field path from the root (empty for the root value itself).
    pub path: Vec<String>,
    /// Issue category.
    pub code: IssueCode,
    /// Human-readable description from the schema capability.
    pub message: String,
    /// Expected type or shape, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Received type or shape, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
    /// Lower bound for size constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Upper bound for size constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Allowed values for enum constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Offending keys for unrecognized-key constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    /// Value kind a size constraint applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<SizeOrigin>,
    /// Named string format for [`IssueCode::InvalidString`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ValidationIssue {
    /// Creates an issue with the given path, code, and message.
    #[must_use]
    pub fn new(path: Vec<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            path,
            code,
            message: message.into(),
            expected: None,
            received: None,
            minimum: None,
            maximum: None,
            options: None,
            keys: None,
            origin: None,
            format: None,
        }
    }

    /// Sets the expected type or shape.
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Sets the received type or shape.
    #[must_use]
    pub fn with_received(mut self, received: impl Into<String>) -> Self {
        self.received = Some(received.into());
        self
    }

    /// Sets the lower bound and its origin.
    #[must_use]
    pub const fn with_minimum(mut self, minimum: f64, origin: SizeOrigin) -> Self {
        self.minimum = Some(minimum);
        self.origin = Some(origin);
        self
    }

    /// Sets the upper bound and its origin.
    #[must_use]
    pub const fn with_maximum(mut self, maximum: f64, origin: SizeOrigin) -> Self {
        self.maximum = Some(maximum);
        self.origin = Some(origin);
        self
    }

    /// Sets the allowed enum options.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    /// Sets the offending object keys.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Sets the named string format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Dotted rendering of the field path; `root` when the path is empty.
    #[must_use]
    pub fn dotted_path(&self) -> String {
        if self.path.is_empty() {
            "root".to_string()
        } else {
            self.path.join(".")
        }
    }
}
