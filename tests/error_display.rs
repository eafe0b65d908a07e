//! Tests for Display implementations on error types.

use truthframe::TruthError;

#[test]
fn envelope_error_messages() {
    assert_eq!(
        TruthError::malformed("expected 5 '|' separated segments, found 2").to_string(),
        "malformed envelope: expected 5 '|' separated segments, found 2"
    );
    assert_eq!(
        TruthError::InvalidIndexTotal { index: 0, total: 3 }.to_string(),
        "invalid fragment index/total: 0/3"
    );
    let mismatch = TruthError::EnvelopeMismatch {
        field: "prefix",
        expected: "ER".into(),
        found: "XX".into(),
    };
    assert_eq!(mismatch.to_string(), "envelope prefix mismatch: expected \"ER\", found \"XX\"");
}

#[test]
fn assembly_error_messages() {
    let conflict = TruthError::TotalConflict {
        code: "DEMO-001".into(),
        expected: 5,
        found: 7,
    };
    assert_eq!(conflict.to_string(), "fragments for DEMO-001 disagree on total (5 vs 7)");
    assert_eq!(
        TruthError::Incomplete { code: "X".into() }.to_string(),
        "cannot assemble X: missing fragments"
    );
}

#[test]
fn auto_detect_without_candidates() {
    assert_eq!(
        TruthError::AutoDetectExhausted { attempts: Vec::new() }.to_string(),
        "auto-detect decode failed: no candidates"
    );
}

#[test]
fn registry_error_messages() {
    let err = TruthError::UnknownAlias {
        kind: "transport",
        name: "rot13".into(),
    };
    assert_eq!(err.to_string(), "transport \"rot13\" is not registered");
}
