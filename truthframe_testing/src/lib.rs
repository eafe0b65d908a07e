//! Test support for `truthframe`.
//!
//! - [`logger`]: an `rstest` fixture capturing `log` records.
//! - [`store`]: conformance checks every [`TruthStore`](truthframe::TruthStore)
//!   backend must pass.
//! - [`fixtures`]: sample payloads.
//! - [`metrics`]: counter lookups over a `DebuggingRecorder`.

pub mod fixtures;
pub mod logging;
pub mod metrics;
pub mod store;

pub use fixtures::{bulky_payload, election_return, unicode_payload};
pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_value, debugging_recorder_setup};
pub use store::run_conformance;
