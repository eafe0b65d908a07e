//! Payload fixtures shared by integration tests.

use rstest::fixture;
use serde_json::json;
use truthframe::Payload;

fn object(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

/// Small election-return style document.
#[fixture]
pub fn election_return() -> Payload {
    object(json!({
        "precinct": "0001A",
        "registered": 812,
        "turnout": 640,
        "tallies": {
            "president": {"ALPHA": 301, "BRAVO": 279, "CHARLIE": 60},
            "mayor": {"DELTA": 350, "ECHO": 290}
        },
        "remarks": "Count closed at 19:05 / no incidents",
        "signatories": ["chair", "poll clerk", "watcher"]
    }))
}

/// Document with non-ASCII text and nested arrays.
#[fixture]
pub fn unicode_payload() -> Payload {
    object(json!({
        "title": "Übersicht ✓",
        "rows": [[1, 2], [3, 4]],
        "note": null
    }))
}

/// Document large enough to need many frames at small sizes.
#[fixture]
pub fn bulky_payload() -> Payload {
    let rows: Vec<_> = (0..200)
        .map(|i| json!({"id": i, "label": format!("row-{i:03}"), "ok": i % 3 == 0}))
        .collect();
    object(json!({"rows": rows}))
}
