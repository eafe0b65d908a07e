#![doc(html_root_url = "https://docs.rs/truthframe/latest")]
//! Public API for the `truthframe` library.
//!
//! This crate splits a structured payload into self-describing text frames
//! small enough for a QR code or a link, and reassembles the payload from
//! those frames in any order. The publish side composes a serializer, a
//! transport codec, the chunker and an envelope; the receiving side
//! classifies scanned strings, records fragments in a store and decodes the
//! payload once every fragment has arrived.
//!
//! ```
//! use std::sync::Arc;
//!
//! use truthframe::{
//!     assembler::Assembler,
//!     publish::{PublishOptions, Publisher},
//!     registry::{EnvelopeParams, Registry},
//!     serializer::Payload,
//!     store::MemoryStore,
//! };
//!
//! let registry = Registry::with_defaults();
//! let params = EnvelopeParams::default();
//! let suite = registry
//!     .suite("json", "base64url", "line", &params)
//!     .expect("defaults are registered");
//!
//! let mut payload = Payload::new();
//! payload.insert("votes".into(), 42.into());
//!
//! let lines = Publisher::from(suite.clone())
//!     .publish(&payload, "DEMO-001", &PublishOptions::count(3))
//!     .expect("publish");
//!
//! let assembler = Assembler::from_suite(Arc::new(MemoryStore::new()), suite);
//! for line in lines.iter().rev() {
//!     assembler.ingest_line(line).expect("ingest");
//! }
//! assert_eq!(assembler.assemble("DEMO-001").expect("complete"), payload);
//! ```

pub mod assembler;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod publish;
pub mod registry;
pub mod serializer;
pub mod store;
pub mod transport;

pub use assembler::{Artifact, Assembler, DecodeReport};
pub use config::TruthConfig;
pub use envelope::{Envelope, Frame, LineEnvelope, TransportKind, UrlEnvelope};
pub use error::{Result, TruthError};
pub use metrics::{ASSEMBLIES_COMPLETED, ERRORS_TOTAL, FRAGMENTS_INGESTED, FRAMES_PUBLISHED};
pub use publish::{PublishOptions, PublishOutput, Publisher, Strategy};
pub use registry::{CodecSuite, Registry};
pub use serializer::{Payload, PayloadSerializer};
pub use store::{AssemblyStatus, MemoryStore, TruthStore};
pub use transport::TransportCodec;
