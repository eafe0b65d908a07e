//! Payload serialization.
//!
//! This module defines the [`PayloadSerializer`] trait which turns a
//! [`Payload`] map into text and back. [`JsonSerializer`] is the canonical
//! primary form: two structurally equal payloads always encode to the same
//! bytes. [`YamlSerializer`] is an independent alternate format and
//! [`AutoDetectSerializer`] sniffs incoming text to pick between them.

mod auto;
mod json;
mod yaml;

use std::fmt;

pub use auto::AutoDetectSerializer;
pub use json::{JsonSerializer, canonical_json};
pub use yaml::YamlSerializer;

use crate::Result;

/// Structured document carried across the channel.
///
/// Keys are kept in sorted order; identity is structural.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Converts payloads to text and back.
///
/// Implementations must round-trip: `decode(encode(p)) == p` for every
/// JSON-compatible payload, and `decode` must reject text whose root is not
/// a map.
pub trait PayloadSerializer: fmt::Debug + Send + Sync {
    /// Serialize `payload` into text.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Serialization`](crate::TruthError::Serialization)
    /// if the payload cannot be represented in this format.
    fn encode(&self, payload: &Payload) -> Result<String>;

    /// Parse `text` back into a payload.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Serialization`](crate::TruthError::Serialization)
    /// for invalid text or a non-map root.
    fn decode(&self, text: &str) -> Result<Payload>;

    /// Stable format identifier such as `"json"` or `"yaml"`.
    fn format_id(&self) -> &'static str;
}

/// Map a serializer format identifier to the MIME type of its text.
#[must_use]
pub fn mime_for(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        _ => "text/plain",
    }
}
