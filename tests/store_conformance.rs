//! Every store backend satisfies the same contract.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use truthframe::{TruthStore, store::MemoryStore};
use truthframe_testing::run_conformance;

#[test]
fn memory_store_conforms() { run_conformance(&MemoryStore::new(), "mem"); }

#[test]
fn expiring_memory_store_conforms() {
    let store = MemoryStore::with_ttl(Some(std::time::Duration::from_secs(3600)));
    run_conformance(&store, "mem-ttl");
}

#[test]
fn expired_records_restart_from_empty() {
    let store = MemoryStore::with_ttl(Some(std::time::Duration::from_secs(60)));
    let start = Utc::now();
    store.ingest_at("EXP", 1, 3, "a", start).expect("ingest");

    let later = start + TimeDelta::seconds(61);
    assert_eq!(store.get_at("EXP", later), None);

    let (_, status) = store.ingest_at("EXP", 2, 5, "b", later).expect("fresh record");
    assert_eq!((status.total, status.received), (5, 1));
}

#[test]
fn stores_are_usable_as_trait_objects() {
    let store: Arc<dyn TruthStore> = Arc::new(MemoryStore::new());
    run_conformance(store.as_ref(), "dyn");
}

/// Runs against a live server only when `TRUTH_REDIS_URL` is set.
#[cfg(feature = "redis")]
#[test]
fn redis_store_conforms() {
    let Ok(url) = std::env::var("TRUTH_REDIS_URL") else {
        eprintln!("TRUTH_REDIS_URL not set; skipping redis conformance");
        return;
    };
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let store = truthframe::store::RedisStore::open(
        &url,
        format!("truthframe-test:{nonce}:"),
        Some(std::time::Duration::from_secs(60)),
    )
    .expect("redis client");
    run_conformance(&store, "redis");
}
