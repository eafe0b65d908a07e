//! Behaviour every [`TruthStore`] backend must share.
//!
//! Each check takes a fresh store and a code unique to the call, so the
//! same functions drive the in-memory store and a live Redis instance.
//! [`run_conformance`] runs them all.

use truthframe::{TruthError, TruthStore, metrics::IngestOutcome};

/// Run every conformance check, deriving codes from `namespace`.
pub fn run_conformance(store: &dyn TruthStore, namespace: &str) {
    creates_once_and_rejects_other_totals(store, &format!("{namespace}-create"));
    stores_fragments_idempotently(store, &format!("{namespace}-idem"));
    rejects_conflicting_fragments(store, &format!("{namespace}-conflict"));
    rejects_out_of_range_indices(store, &format!("{namespace}-range"));
    requires_a_record_before_fragments(store, &format!("{namespace}-missing"));
    reports_progress_until_complete(store, &format!("{namespace}-status"));
    forgets_records(store, &format!("{namespace}-forget"));
}

/// `create_or_get` keeps the first total and rejects a different one.
pub fn creates_once_and_rejects_other_totals(store: &dyn TruthStore, code: &str) {
    let record = store.create_or_get(code, 3).expect("create");
    assert_eq!(record.total, 3);
    assert!(record.fragments.is_empty());

    let again = store.create_or_get(code, 3).expect("get");
    assert_eq!(again.created_at, record.created_at);

    assert_eq!(
        store.create_or_get(code, 4).expect_err("conflict"),
        TruthError::TotalConflict {
            code: code.to_owned(),
            expected: 3,
            found: 4,
        }
    );
    store.forget(code).expect("cleanup");
}

/// Identical re-ingest is reported as a duplicate and changes nothing.
pub fn stores_fragments_idempotently(store: &dyn TruthStore, code: &str) {
    let (first, _) = store.ingest(code, 1, 2, "abc").expect("first");
    let (second, status) = store.ingest(code, 1, 2, "abc").expect("second");
    assert_eq!(first, IngestOutcome::Accepted);
    assert_eq!(second, IngestOutcome::Duplicate);
    assert_eq!(status.received, 1);
    assert_eq!(status.missing, [2]);
    store.forget(code).expect("cleanup");
}

/// A different value at a filled index is rejected and the first kept.
pub fn rejects_conflicting_fragments(store: &dyn TruthStore, code: &str) {
    store.ingest(code, 2, 2, "keep").expect("first");
    assert_eq!(
        store.ingest(code, 2, 2, "other").expect_err("conflict"),
        TruthError::FragmentConflict {
            code: code.to_owned(),
            index: 2,
        }
    );
    let record = store.get(code).expect("get").expect("record");
    assert_eq!(record.fragments.get(&2).map(String::as_str), Some("keep"));

    assert!(matches!(
        store.ingest(code, 1, 5, "x"),
        Err(TruthError::TotalConflict { expected: 2, found: 5, .. })
    ));
    store.forget(code).expect("cleanup");
}

/// `put_fragment` rejects indices outside `1..=total`.
pub fn rejects_out_of_range_indices(store: &dyn TruthStore, code: &str) {
    store.create_or_get(code, 2).expect("create");
    assert_eq!(
        store.put_fragment(code, 3, "x").expect_err("range"),
        TruthError::InvalidIndexTotal { index: 3, total: 2 }
    );
    assert!(store.put_fragment(code, 0, "x").is_err());
    store.forget(code).expect("cleanup");
}

/// `put_fragment` without a record fails with `MissingRecord`.
pub fn requires_a_record_before_fragments(store: &dyn TruthStore, code: &str) {
    assert_eq!(
        store.put_fragment(code, 1, "x").expect_err("missing"),
        TruthError::MissingRecord {
            code: code.to_owned(),
        }
    );
}

/// `status` tracks received and missing indices through completion.
pub fn reports_progress_until_complete(store: &dyn TruthStore, code: &str) {
    assert_eq!(store.status(code).expect("status"), None);

    store.ingest(code, 3, 3, "c").expect("ingest");
    store.ingest(code, 1, 3, "a").expect("ingest");
    let status = store.status(code).expect("status").expect("record");
    assert_eq!((status.total, status.received), (3, 2));
    assert_eq!(status.missing, [2]);
    assert!(!status.complete);

    let (_, status) = store.ingest(code, 2, 3, "b").expect("ingest");
    assert!(status.complete);
    assert!(status.missing.is_empty());
    let record = store.get(code).expect("get").expect("record");
    assert_eq!(record.packed().as_deref(), Some("abc"));
    store.forget(code).expect("cleanup");
}

/// `forget` removes the record and ignores unknown codes.
pub fn forgets_records(store: &dyn TruthStore, code: &str) {
    store.ingest(code, 1, 1, "x").expect("ingest");
    store.forget(code).expect("forget");
    assert_eq!(store.get(code).expect("get"), None);
    store.forget(code).expect("forget unknown");
}
