use serde_json::Value;

use super::{Payload, PayloadSerializer};
use crate::{Result, TruthError};

/// Canonical JSON serializer.
///
/// Keys are sorted recursively and the output carries no insignificant
/// whitespace, so encoding is byte-stable for structurally equal payloads.
///
/// # Examples
///
/// ```
/// use truthframe::serializer::{JsonSerializer, PayloadSerializer};
///
/// let payload = serde_json::json!({"b": 2, "a": 1});
/// let text = JsonSerializer
///     .encode(payload.as_object().expect("object"))
///     .expect("encode");
/// assert_eq!(text, r#"{"a":1,"b":2}"#);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl PayloadSerializer for JsonSerializer {
    fn encode(&self, payload: &Payload) -> Result<String> {
        canonical_json(&Value::Object(payload.clone()))
    }

    fn decode(&self, text: &str) -> Result<Payload> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(serialization_error("JSON payload must decode to a map")),
            Err(err) => Err(serialization_error(err)),
        }
    }

    fn format_id(&self) -> &'static str { "json" }
}

/// Encode any JSON value with recursively sorted keys and compact spacing.
///
/// # Errors
///
/// Returns [`TruthError::Serialization`] if `serde_json` rejects the value.
pub fn canonical_json(value: &Value) -> Result<String> {
    serde_json::to_string(&sorted(value)).map_err(serialization_error)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn serialization_error(reason: impl ToString) -> TruthError {
    TruthError::Serialization {
        format: "json",
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::JsonSerializer;
    use crate::{TruthError, serializer::PayloadSerializer};

    #[test]
    fn encodes_nested_maps_with_sorted_keys() {
        let payload = json!({"z": {"b": [3, {"y": 1, "x": 2}], "a": null}, "m": "a/b"});
        let text = JsonSerializer
            .encode(payload.as_object().expect("object"))
            .expect("encode");
        assert_eq!(text, r#"{"m":"a/b","z":{"a":null,"b":[3,{"x":2,"y":1}]}}"#);
    }

    #[test]
    fn round_trips_payload() {
        let payload = json!({"a": 1, "b": [2, 3], "c": {"d": true, "e": 1.5}});
        let map = payload.as_object().expect("object");
        let text = JsonSerializer.encode(map).expect("encode");
        assert_eq!(&JsonSerializer.decode(&text).expect("decode"), map);
    }

    #[rstest]
    #[case(1.071_566_039_146_582_6e-75)]
    #[case(0.1 + 0.2)]
    #[case(f64::MAX)]
    #[case(f64::MIN_POSITIVE)]
    #[case(-2.225_073_858_507_201e-308)]
    fn floats_survive_a_round_trip(#[case] value: f64) {
        let payload = json!({"v": value});
        let map = payload.as_object().expect("object");
        let decoded = JsonSerializer
            .decode(&JsonSerializer.encode(map).expect("encode"))
            .expect("decode");
        assert_eq!(decoded["v"].as_f64().map(f64::to_bits), Some(value.to_bits()));
    }

    #[rstest]
    #[case("[1,2,3]")]
    #[case("42")]
    #[case("\"text\"")]
    #[case("{not json")]
    fn rejects_non_map_or_invalid_text(#[case] text: &str) {
        let err = JsonSerializer.decode(text).expect_err("must fail");
        assert!(matches!(err, TruthError::Serialization { format: "json", .. }));
    }
}
