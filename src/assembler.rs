//! Decode-side state machine.
//!
//! [`Assembler`] feeds frames into a [`TruthStore`] and rebuilds the payload
//! once every fragment of a code has arrived. It keeps no state of its own:
//! everything lives in the store, so a durable backend lets ingestion resume
//! across restarts.
//!
//! Per code the lifecycle is Empty, then Partial while fragments are missing,
//! then Complete. Expiry or [`Assembler::forget`] return it to Empty.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::Serialize;

use crate::{
    Result,
    TruthError,
    classify::classify,
    envelope::{Envelope, Frame, validate_index_total},
    metrics::{self, IngestOutcome},
    registry::CodecSuite,
    serializer::{Payload, PayloadSerializer, mime_for},
    store::{AssemblyStatus, TruthStore},
    transport::TransportCodec,
};

/// Serialized document recovered from a complete assembly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// MIME type derived from the serializer format.
    pub content_type: &'static str,
    /// Serialized payload text, after transport decoding.
    pub content: String,
}

/// Outcome of [`Assembler::decode_batch`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DecodeReport {
    /// Latest status per code seen in the batch.
    pub per_code: BTreeMap<String, AssemblyStatus>,
    /// Rejected lines keyed by 1-based line number.
    pub errors: BTreeMap<usize, String>,
    /// Decoded payloads for codes that completed.
    pub payloads: BTreeMap<String, Payload>,
    /// Complete codes whose payload failed to decode.
    pub failed: BTreeMap<String, String>,
}

/// Ingests frames in any order and reconstructs payloads.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use truthframe::{
///     assembler::Assembler,
///     envelope::LineEnvelope,
///     serializer::JsonSerializer,
///     store::MemoryStore,
///     transport::IdentityTransport,
/// };
///
/// let assembler = Assembler::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(JsonSerializer),
///     Arc::new(IdentityTransport),
///     vec![Arc::new(LineEnvelope::default())],
/// );
/// assembler.ingest_line("ER|v1|X|2/2|:1}").expect("second");
/// let status = assembler.ingest_line(r#"ER|v1|X|1/2|{"a""#).expect("first");
/// assert!(status.complete);
///
/// let payload = assembler.try_complete("X").expect("decode").expect("complete");
/// assert_eq!(payload["a"], 1);
/// ```
#[derive(Clone)]
pub struct Assembler {
    store: Arc<dyn TruthStore>,
    serializer: Arc<dyn PayloadSerializer>,
    transport: Arc<dyn TransportCodec>,
    envelopes: Vec<Arc<dyn Envelope>>,
}

impl fmt::Debug for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembler")
            .field("serializer", &self.serializer)
            .field("transport", &self.transport)
            .field("envelopes", &self.envelopes)
            .finish_non_exhaustive()
    }
}

impl Assembler {
    /// Create an assembler over `store`.
    ///
    /// `envelopes` are the candidates tried, in order, by
    /// [`ingest_line`](Self::ingest_line).
    #[must_use]
    pub fn new(
        store: Arc<dyn TruthStore>,
        serializer: Arc<dyn PayloadSerializer>,
        transport: Arc<dyn TransportCodec>,
        envelopes: Vec<Arc<dyn Envelope>>,
    ) -> Self {
        Self {
            store,
            serializer,
            transport,
            envelopes,
        }
    }

    /// Create an assembler that parses with the suite's envelope only.
    #[must_use]
    pub fn from_suite(store: Arc<dyn TruthStore>, suite: CodecSuite) -> Self {
        Self::new(store, suite.serializer, suite.transport, vec![suite.envelope])
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TruthStore> { &self.store }

    /// Store one fragment and report progress.
    ///
    /// Re-ingesting an identical fragment changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::InvalidIndexTotal`],
    /// [`TruthError::TotalConflict`], [`TruthError::FragmentConflict`] or a
    /// backend error.
    pub fn ingest(&self, code: &str, index: u32, total: u32, fragment: &str) -> Result<AssemblyStatus> {
        let result = validate_index_total(u64::from(index), u64::from(total))
            .and_then(|_| self.store.ingest(code, index, total, fragment));
        let (outcome, status) = match result {
            Ok(ingested) => ingested,
            Err(err) => {
                if err.is_conflict() {
                    log::warn!("rejected fragment {index}/{total} for {code}: {err}");
                }
                metrics::inc_errors(err.kind());
                return Err(err);
            }
        };

        metrics::inc_fragments_ingested(outcome);
        if outcome == IngestOutcome::Accepted && status.complete {
            log::debug!("assembly {code} complete with {} fragment(s)", status.total);
            metrics::inc_assemblies_completed();
        }
        Ok(status)
    }

    /// [`ingest`](Self::ingest) a parsed frame.
    ///
    /// # Errors
    ///
    /// See [`ingest`](Self::ingest).
    pub fn ingest_frame(&self, frame: &Frame) -> Result<AssemblyStatus> {
        self.ingest(&frame.code, frame.index, frame.total, &frame.fragment)
    }

    /// Parse `raw` with the first candidate envelope that accepts it.
    ///
    /// `raw` is taken verbatim; callers reading line-oriented input strip
    /// the terminators themselves.
    ///
    /// # Errors
    ///
    /// Returns the last envelope error when no candidate accepts `raw`.
    pub fn parse_line(&self, raw: &str) -> Result<Frame> {
        classify(raw, &self.envelopes)
            .map(|(_, frame)| frame)
            .inspect_err(|err| {
                log::warn!("rejected scanned string: {err}");
                metrics::inc_errors(err.kind());
            })
    }

    /// Classify and ingest one scanned string.
    ///
    /// # Errors
    ///
    /// Any envelope or ingest error.
    pub fn ingest_line(&self, raw: &str) -> Result<AssemblyStatus> {
        let frame = self.parse_line(raw)?;
        self.ingest_frame(&frame)
    }

    /// Progress for `code`, `None` when no record exists.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    pub fn status(&self, code: &str) -> Result<Option<AssemblyStatus>> { self.store.status(code) }

    /// True when every fragment of `code` is present.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    pub fn is_complete(&self, code: &str) -> Result<bool> {
        Ok(self.status(code)?.is_some_and(|status| status.complete))
    }

    /// Drop all state for `code`.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    pub fn forget(&self, code: &str) -> Result<()> { self.store.forget(code) }

    /// Transport-decoded text of a complete assembly, `None` otherwise.
    fn blob(&self, code: &str) -> Result<Option<String>> {
        let Some(packed) = self.store.get(code)?.and_then(|record| record.packed()) else {
            return Ok(None);
        };
        self.transport.decode(&packed).map(Some)
    }

    /// Rebuild the payload once `code` is complete.
    ///
    /// The result is computed on every call and never stored.
    ///
    /// # Errors
    ///
    /// Returns transport or serializer errors for a complete assembly whose
    /// text does not decode.
    pub fn try_complete(&self, code: &str) -> Result<Option<Payload>> {
        let Some(blob) = self.blob(code)? else {
            return Ok(None);
        };
        self.serializer.decode(&blob).map(Some)
    }

    /// Rebuild the payload, failing when fragments are missing.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Incomplete`] before completion, otherwise as
    /// [`try_complete`](Self::try_complete).
    pub fn assemble(&self, code: &str) -> Result<Payload> {
        self.try_complete(code)?.ok_or_else(|| incomplete(code))
    }

    /// Serialized document and its MIME type for a complete assembly.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Incomplete`] before completion, or a transport
    /// error.
    pub fn artifact(&self, code: &str) -> Result<Artifact> {
        let content = self.blob(code)?.ok_or_else(|| incomplete(code))?;
        Ok(Artifact {
            content_type: mime_for(self.serializer.format_id()),
            content,
        })
    }

    /// Ingest a batch of scanned strings that may span several codes.
    ///
    /// Blank lines are skipped. Failures are recorded per line and never
    /// abort the batch. Every code that is complete afterwards is decoded.
    pub fn decode_batch<I, S>(&self, lines: I) -> DecodeReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = DecodeReport::default();
        for (position, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }
            match self.ingest_line(line) {
                Ok(status) => {
                    report.per_code.insert(status.code.clone(), status);
                }
                Err(err) => {
                    report.errors.insert(position + 1, err.to_string());
                }
            }
        }

        let complete: Vec<String> = report
            .per_code
            .values()
            .filter(|status| status.complete)
            .map(|status| status.code.clone())
            .collect();
        for code in complete {
            match self.try_complete(&code) {
                Ok(Some(payload)) => {
                    report.payloads.insert(code, payload);
                }
                Ok(None) => {}
                Err(err) => {
                    report.failed.insert(code, err.to_string());
                }
            }
        }
        report
    }
}

fn incomplete(code: &str) -> TruthError {
    TruthError::Incomplete {
        code: code.to_owned(),
    }
}
