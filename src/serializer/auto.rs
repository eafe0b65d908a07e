use std::sync::Arc;

use super::{JsonSerializer, Payload, PayloadSerializer, YamlSerializer};
use crate::{Result, TruthError};

/// Serializer that sniffs incoming text to choose a decoder.
///
/// Encoding always goes through the primary serializer so output stays
/// deterministic. Decoding prefers the JSON-family candidate when the text
/// starts with `{` or `[`, the YAML-family candidate when it starts with
/// `---`, and otherwise tries every candidate in registration order.
#[derive(Debug, Clone)]
pub struct AutoDetectSerializer {
    primary: Arc<dyn PayloadSerializer>,
    candidates: Vec<Arc<dyn PayloadSerializer>>,
}

impl AutoDetectSerializer {
    /// Build a detector over `candidates`, encoding with the first one.
    ///
    /// Returns `None` when `candidates` is empty.
    #[must_use]
    pub fn new(candidates: Vec<Arc<dyn PayloadSerializer>>) -> Option<Self> {
        let primary = Arc::clone(candidates.first()?);
        Some(Self {
            primary,
            candidates,
        })
    }

    /// Build a detector with an explicit encoding serializer.
    ///
    /// Returns `None` when `candidates` is empty.
    #[must_use]
    pub fn with_primary(
        candidates: Vec<Arc<dyn PayloadSerializer>>,
        primary: Arc<dyn PayloadSerializer>,
    ) -> Option<Self> {
        if candidates.is_empty() {
            return None;
        }
        Some(Self {
            primary,
            candidates,
        })
    }

    /// Format identifiers of the decoding candidates, in registration order.
    #[must_use]
    pub fn candidate_formats(&self) -> Vec<&'static str> {
        self.candidates.iter().map(|s| s.format_id()).collect()
    }

    fn decode_order(&self, text: &str) -> Vec<&Arc<dyn PayloadSerializer>> {
        let trimmed = text.trim_start();
        let preferred = if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Some("json")
        } else if trimmed.starts_with("---") {
            Some("yaml")
        } else {
            None
        };

        let Some(preferred) = preferred else {
            return self.candidates.iter().collect();
        };
        let (mut front, rest): (Vec<_>, Vec<_>) = self
            .candidates
            .iter()
            .partition(|s| s.format_id() == preferred);
        front.extend(rest);
        front
    }
}

impl Default for AutoDetectSerializer {
    fn default() -> Self {
        let json: Arc<dyn PayloadSerializer> = Arc::new(JsonSerializer);
        let yaml: Arc<dyn PayloadSerializer> = Arc::new(YamlSerializer);
        Self {
            primary: Arc::clone(&json),
            candidates: vec![json, yaml],
        }
    }
}

impl PayloadSerializer for AutoDetectSerializer {
    fn encode(&self, payload: &Payload) -> Result<String> { self.primary.encode(payload) }

    fn decode(&self, text: &str) -> Result<Payload> {
        let mut attempts = Vec::new();
        for candidate in self.decode_order(text) {
            match candidate.decode(text) {
                Ok(payload) => return Ok(payload),
                Err(err) => attempts.push((candidate.format_id().to_owned(), err.to_string())),
            }
        }
        Err(TruthError::AutoDetectExhausted { attempts })
    }

    fn format_id(&self) -> &'static str { "auto" }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::AutoDetectSerializer;
    use crate::{
        TruthError,
        serializer::{JsonSerializer, PayloadSerializer, YamlSerializer},
    };

    #[test]
    fn decodes_json_and_yaml() {
        let auto = AutoDetectSerializer::default();
        let expected = json!({"a": 1});
        assert_eq!(
            auto.decode(r#"{"a":1}"#).expect("json"),
            *expected.as_object().expect("object")
        );
        assert_eq!(
            auto.decode("---\na: 1\n").expect("yaml"),
            *expected.as_object().expect("object")
        );
        assert_eq!(
            auto.decode("a: 1\n").expect("unsniffed yaml"),
            *expected.as_object().expect("object")
        );
    }

    #[test]
    fn encodes_with_primary() {
        let auto = AutoDetectSerializer::default();
        let payload = json!({"hello": "world"});
        assert_eq!(
            auto.encode(payload.as_object().expect("object")).expect("encode"),
            r#"{"hello":"world"}"#
        );
        assert_eq!(auto.format_id(), "auto");
    }

    #[test]
    fn explicit_primary_controls_encoding() {
        let yaml: Arc<dyn PayloadSerializer> = Arc::new(YamlSerializer);
        let auto = AutoDetectSerializer::with_primary(
            vec![Arc::new(JsonSerializer), Arc::clone(&yaml)],
            yaml,
        )
        .expect("candidates");
        let payload = json!({"a": 1});
        assert_eq!(
            auto.encode(payload.as_object().expect("object")).expect("encode"),
            "a: 1\n"
        );
    }

    #[test]
    fn sniffed_yaml_is_tried_first() {
        let auto = AutoDetectSerializer::new(vec![Arc::new(JsonSerializer), Arc::new(YamlSerializer)])
            .expect("candidates");
        let err = auto.decode("--- [1, 2]").expect_err("sequence root");
        let TruthError::AutoDetectExhausted { attempts } = err else {
            panic!("expected AutoDetectExhausted, got {err:?}");
        };
        let formats: Vec<_> = attempts.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(formats, ["yaml", "json"]);
    }

    #[test]
    fn aggregates_errors_when_every_candidate_fails() {
        let auto = AutoDetectSerializer::default();
        let err = auto.decode("[1, 2, 3]").expect_err("array root");
        let TruthError::AutoDetectExhausted { attempts } = err else {
            panic!("expected AutoDetectExhausted, got {err:?}");
        };
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].0, "json");
    }

    #[test]
    fn empty_candidates_are_rejected() {
        assert!(AutoDetectSerializer::new(Vec::new()).is_none());
    }
}
