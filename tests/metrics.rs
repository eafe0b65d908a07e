//! Tests for `truthframe` metrics helpers.
//!
//! Counters are read back through `metrics_util::debugging::DebuggingRecorder`.
#![cfg(feature = "metrics")]

use std::sync::Arc;

use rstest::rstest;
use truthframe::{
    ASSEMBLIES_COMPLETED,
    Assembler,
    ERRORS_TOTAL,
    FRAGMENTS_INGESTED,
    FRAMES_PUBLISHED,
    LineEnvelope,
    Payload,
    Publisher,
    metrics::IngestOutcome,
    publish::PublishOptions,
    serializer::JsonSerializer,
    store::MemoryStore,
    transport::Base64UrlTransport,
};
use truthframe_testing::{counter_value, debugging_recorder_setup, election_return};

fn publisher() -> Publisher {
    Publisher::new(
        Arc::new(JsonSerializer),
        Arc::new(Base64UrlTransport),
        Arc::new(LineEnvelope::default()),
    )
}

fn assembler() -> Assembler {
    Assembler::new(
        Arc::new(MemoryStore::new()),
        Arc::new(JsonSerializer),
        Arc::new(Base64UrlTransport),
        vec![Arc::new(LineEnvelope::default())],
    )
}

#[rstest]
#[case(1)]
#[case(4)]
fn publish_counts_frames(election_return: Payload, #[case] count: usize) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        publisher()
            .publish(&election_return, "M", &PublishOptions::count(count))
            .expect("publish");
    });
    assert_eq!(
        counter_value(&snapshotter, FRAMES_PUBLISHED, &[]),
        count as u64
    );
}

#[rstest]
fn ingest_counts_outcomes_and_completion(election_return: Payload) {
    let lines = publisher()
        .publish(&election_return, "M", &PublishOptions::count(2))
        .expect("publish");
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        let assembler = assembler();
        assembler.ingest_line(&lines[0]).expect("first");
        assembler.ingest_line(&lines[0]).expect("duplicate");
        assembler.ingest_line(&lines[1]).expect("second");
        assembler.ingest_line(&lines[1]).expect("duplicate after completion");
    });

    let accepted = [("outcome", IngestOutcome::Accepted.as_str())];
    let duplicate = [("outcome", IngestOutcome::Duplicate.as_str())];
    assert_eq!(counter_value(&snapshotter, FRAGMENTS_INGESTED, &accepted), 2);
    assert_eq!(counter_value(&snapshotter, FRAGMENTS_INGESTED, &duplicate), 2);
    assert_eq!(counter_value(&snapshotter, ASSEMBLIES_COMPLETED, &[]), 1);
}

#[test]
fn rejected_frames_count_errors_by_kind() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        let assembler = assembler();
        let _ = assembler.ingest_line("ER|v1|M|0/3|x");
        assembler.ingest("M", 1, 2, "a").expect("first");
        let _ = assembler.ingest("M", 1, 3, "a");
    });

    let found = counter_value(&snapshotter, ERRORS_TOTAL, &[]);
    assert_eq!(found, 2);
    let conflicts = counter_value(&snapshotter, ERRORS_TOTAL, &[("kind", "total_conflict")]);
    assert_eq!(conflicts, 1);
}
