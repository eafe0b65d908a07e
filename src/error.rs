//! Canonical error and result types for the crate.
//!
//! This module defines the single public [`TruthError`] surface shared by the
//! publish pipeline, the envelope parsers and the decode-side store and
//! assembler. Nothing in the core repairs a malformed frame; every variant
//! fails the call that produced it.

use thiserror::Error;

/// Top-level error type exposed by `truthframe`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TruthError {
    /// The wire string does not have the shape of the envelope syntax.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope {
        /// Human-readable description of the structural problem.
        reason: String,
    },
    /// The frame is well-formed but belongs to another prefix or version.
    #[error("envelope {field} mismatch: expected {expected:?}, found {found:?}")]
    EnvelopeMismatch {
        /// Either `"prefix"` or `"version"`.
        field: &'static str,
        /// Effective configured value.
        expected: String,
        /// Value carried by the frame.
        found: String,
    },
    /// `index < 1`, `total < 1` or `index > total`.
    #[error("invalid fragment index/total: {index}/{total}")]
    InvalidIndexTotal {
        /// Index carried by the frame.
        index: u64,
        /// Total carried by the frame.
        total: u64,
    },
    /// Two fragments for the same code disagree on the fragment total.
    #[error("fragments for {code} disagree on total ({expected} vs {found})")]
    TotalConflict {
        /// Assembly code.
        code: String,
        /// Total recorded by the first fragment.
        expected: u32,
        /// Total carried by the rejected fragment.
        found: u32,
    },
    /// The same index was re-ingested with a different fragment value.
    #[error("fragment {index} of {code} was already received with different content")]
    FragmentConflict {
        /// Assembly code.
        code: String,
        /// Conflicting 1-based index.
        index: u32,
    },
    /// A session locked to one code received a frame for another.
    #[error("mismatched code {found:?} for session code {expected:?}")]
    CodeMismatch {
        /// Code the session is locked to.
        expected: String,
        /// Code carried by the rejected frame.
        found: String,
    },
    /// Payload text could not be serialized or decoded into a map.
    #[error("{format} serialization failed: {reason}")]
    Serialization {
        /// Serializer format identifier.
        format: &'static str,
        /// Underlying failure.
        reason: String,
    },
    /// Text is not valid for the configured transport codec.
    #[error("{codec} transport failed: {reason}")]
    Transport {
        /// Transport codec identifier.
        codec: &'static str,
        /// Underlying failure.
        reason: String,
    },
    /// No auto-detect candidate decoded the text.
    #[error("auto-detect decode failed: {}", format_attempts(.attempts))]
    AutoDetectExhausted {
        /// `(format, error)` for every candidate tried, in order.
        attempts: Vec<(String, String)>,
    },
    /// A registry alias has no factory.
    #[error("{kind} {name:?} is not registered")]
    UnknownAlias {
        /// `"serializer"`, `"transport"` or `"envelope"`.
        kind: &'static str,
        /// Alias as supplied by the caller.
        name: String,
    },
    /// A fragment was stored for a code without an assembly record.
    #[error("no assembly record for {code}")]
    MissingRecord {
        /// Assembly code.
        code: String,
    },
    /// The assembly is not complete yet.
    #[error("cannot assemble {code}: missing fragments")]
    Incomplete {
        /// Assembly code.
        code: String,
    },
    /// The store backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
    /// The external QR writer failed.
    #[error("qr writer error: {0}")]
    Writer(String),
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "no candidates".to_owned();
    }
    attempts
        .iter()
        .map(|(format, error)| format!("{format}: {error}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

impl TruthError {
    /// Build a [`TruthError::MalformedEnvelope`] from any message.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised while parsing or building a frame.
    #[must_use]
    pub fn is_envelope_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedEnvelope { .. }
                | Self::EnvelopeMismatch { .. }
                | Self::InvalidIndexTotal { .. }
        )
    }

    /// Returns true for cross-fragment disagreements within one assembly.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::TotalConflict { .. } | Self::FragmentConflict { .. } | Self::CodeMismatch { .. }
        )
    }

    /// Short, stable label used for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope { .. } => "malformed_envelope",
            Self::EnvelopeMismatch { .. } => "envelope_mismatch",
            Self::InvalidIndexTotal { .. } => "invalid_index_total",
            Self::TotalConflict { .. } => "total_conflict",
            Self::FragmentConflict { .. } => "fragment_conflict",
            Self::CodeMismatch { .. } => "code_mismatch",
            Self::Serialization { .. } => "serialization",
            Self::Transport { .. } => "transport",
            Self::AutoDetectExhausted { .. } => "auto_detect_exhausted",
            Self::UnknownAlias { .. } => "unknown_alias",
            Self::MissingRecord { .. } => "missing_record",
            Self::Incomplete { .. } => "incomplete",
            Self::Backend(_) => "backend",
            Self::Writer(_) => "writer",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for TruthError {
    fn from(error: redis::RedisError) -> Self { Self::Backend(error.to_string()) }
}

/// Canonical result alias used by `truthframe` public APIs.
pub type Result<T> = std::result::Result<T, TruthError>;
