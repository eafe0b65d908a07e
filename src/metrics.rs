//! Metric helpers for `truthframe`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking published frames.
pub const FRAMES_PUBLISHED: &str = "truthframe_frames_published_total";
/// Name of the counter tracking ingested fragments.
pub const FRAGMENTS_INGESTED: &str = "truthframe_fragments_ingested_total";
/// Name of the counter tracking assemblies that reached completion.
pub const ASSEMBLIES_COMPLETED: &str = "truthframe_assemblies_completed_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "truthframe_errors_total";

/// Result of storing one fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The index was empty and now holds the fragment.
    Accepted,
    /// The same fragment was already stored at this index.
    Duplicate,
}

impl IngestOutcome {
    /// Label value used on [`FRAGMENTS_INGESTED`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Record `count` frames emitted by one publish call.
pub fn inc_frames_published(count: usize) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PUBLISHED).increment(u64::try_from(count).unwrap_or(u64::MAX));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record one ingested fragment.
pub fn inc_fragments_ingested(outcome: IngestOutcome) {
    #[cfg(feature = "metrics")]
    counter!(FRAGMENTS_INGESTED, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record an assembly observed complete for the first time.
pub fn inc_assemblies_completed() {
    #[cfg(feature = "metrics")]
    counter!(ASSEMBLIES_COMPLETED).increment(1);
}

/// Record an error occurrence labelled with [`TruthError::kind`].
///
/// [`TruthError::kind`]: crate::TruthError::kind
pub fn inc_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
