use serde_json::Value;

use super::{Payload, PayloadSerializer};
use crate::{Result, TruthError};

/// YAML serializer backed by `serde_yaml`.
#[derive(Clone, Copy, Debug, Default)]
pub struct YamlSerializer;

impl PayloadSerializer for YamlSerializer {
    fn encode(&self, payload: &Payload) -> Result<String> {
        serde_yaml::to_string(payload).map_err(serialization_error)
    }

    fn decode(&self, text: &str) -> Result<Payload> {
        match serde_yaml::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(serialization_error("YAML payload must decode to a map")),
            Err(err) => Err(serialization_error(err)),
        }
    }

    fn format_id(&self) -> &'static str { "yaml" }
}

fn serialization_error(reason: impl ToString) -> TruthError {
    TruthError::Serialization {
        format: "yaml",
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::YamlSerializer;
    use crate::{TruthError, serializer::PayloadSerializer};

    #[test]
    fn round_trips_nested_payload() {
        let payload = json!({"a": 1, "b": [2, 3], "c": {"name": "Juan", "ok": false}});
        let map = payload.as_object().expect("object");
        let text = YamlSerializer.encode(map).expect("encode");
        assert!(text.contains("a: 1"));
        assert_eq!(&YamlSerializer.decode(&text).expect("decode"), map);
    }

    #[test]
    fn accepts_document_marker() {
        let decoded = YamlSerializer.decode("---\na: 1\n").expect("decode");
        assert_eq!(decoded.get("a"), Some(&json!(1)));
    }

    #[test]
    fn rejects_sequence_root() {
        let err = YamlSerializer.decode("- 1\n- 2\n").expect_err("sequence root");
        assert!(matches!(err, TruthError::Serialization { format: "yaml", .. }));
    }

    #[test]
    fn rejects_empty_document() {
        assert!(YamlSerializer.decode("").is_err());
    }
}
