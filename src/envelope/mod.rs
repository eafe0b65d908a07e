//! Framing envelopes.
//!
//! An [`Envelope`] wraps one fragment with its routing metadata (prefix,
//! version, code, index and total) into a single wire string and parses such
//! strings back into a [`Frame`]. Two syntaxes exist:
//!
//! - [`LineEnvelope`]: `PREFIX|VERSION|CODE|i/N|fragment`
//! - [`UrlEnvelope`]: `truth://VERSION/PREFIX/CODE/i/N?c=fragment` or a web
//!   link carrying the same fields as query parameters.
//!
//! The effective prefix and version are resolved once at construction from
//! four tiers, highest first: the runtime value handed to the constructor,
//! the type-level [`EnvelopeProfile`] constants, the process configuration
//! ([`EnvelopeSettings`]) and the built-in defaults `"ER"` / `"v1"`.

mod line;
mod link;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::{
    line::LineEnvelope,
    link::{UrlEnvelope, UrlSettings},
};
use crate::{Result, TruthError};

/// Built-in logical family prefix.
pub const DEFAULT_PREFIX: &str = "ER";
/// Built-in envelope version.
pub const DEFAULT_VERSION: &str = "v1";

/// Wire syntax family used by an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Pipe-delimited text line.
    Line,
    /// Deep link or web URL.
    Url,
}

impl TransportKind {
    /// Lower-case name, `"line"` or `"url"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Url => "url",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Routing metadata and fragment carried by one wire string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Caller-chosen document code.
    pub code: String,
    /// 1-based fragment index.
    pub index: u32,
    /// Number of fragments in the document.
    pub total: u32,
    /// Opaque fragment text.
    pub fragment: String,
}

impl Frame {
    /// Construct a frame without validation.
    #[must_use]
    pub fn new(code: impl Into<String>, index: u32, total: u32, fragment: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            index,
            total,
            fragment: fragment.into(),
        }
    }
}

/// Prefix/version pair used for the configuration and runtime tiers.
///
/// Empty strings are treated the same as `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeSettings {
    /// Logical family prefix, for example `"ER"` or `"BAL"`.
    pub prefix: Option<String>,
    /// Envelope version, for example `"v1"`.
    pub version: Option<String>,
}

impl EnvelopeSettings {
    /// Settings carrying both values.
    #[must_use]
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            version: Some(version.into()),
        }
    }
}

/// Type-level prefix/version overrides.
///
/// Implement this on a marker type and use it as the envelope's type
/// parameter to pin a family without touching configuration:
///
/// ```
/// use truthframe::envelope::{
///     Envelope,
///     EnvelopeProfile,
///     EnvelopeSettings,
///     LineEnvelope,
/// };
///
/// #[derive(Clone, Debug)]
/// struct Ballot;
///
/// impl EnvelopeProfile for Ballot {
///     const PREFIX_OVERRIDE: Option<&'static str> = Some("BAL");
/// }
///
/// let envelope = LineEnvelope::<Ballot>::new(&EnvelopeSettings::default(), &EnvelopeSettings::default());
/// assert_eq!(envelope.effective_prefix(), "BAL");
/// assert_eq!(envelope.effective_version(), "v1");
/// ```
pub trait EnvelopeProfile: fmt::Debug + Clone + Send + Sync + 'static {
    /// Prefix pinned for every envelope of this profile.
    const PREFIX_OVERRIDE: Option<&'static str> = None;
    /// Version pinned for every envelope of this profile.
    const VERSION_OVERRIDE: Option<&'static str> = None;
}

/// Profile without type-level overrides.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardProfile;

impl EnvelopeProfile for StandardProfile {}

/// Pick the highest-precedence non-empty value.
///
/// # Examples
///
/// ```
/// use truthframe::envelope::resolve;
///
/// assert_eq!(resolve(None, Some("BAL"), Some("CFG"), "ER"), "BAL");
/// assert_eq!(resolve(Some(""), None, None, "ER"), "ER");
/// ```
#[must_use]
pub fn resolve<'a>(
    runtime_override: Option<&'a str>,
    static_override: Option<&'a str>,
    global_config: Option<&'a str>,
    default: &'a str,
) -> &'a str {
    [runtime_override, static_override, global_config]
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .unwrap_or(default)
}

/// Effective prefix and version for profile `P`.
pub(crate) fn resolve_identity<P: EnvelopeProfile>(
    config: &EnvelopeSettings,
    runtime: &EnvelopeSettings,
) -> (String, String) {
    let prefix = resolve(
        runtime.prefix.as_deref(),
        P::PREFIX_OVERRIDE,
        config.prefix.as_deref(),
        DEFAULT_PREFIX,
    );
    let version = resolve(
        runtime.version.as_deref(),
        P::VERSION_OVERRIDE,
        config.version.as_deref(),
        DEFAULT_VERSION,
    );
    (prefix.to_owned(), version.to_owned())
}

/// Frames fragments into wire strings and parses them back.
pub trait Envelope: fmt::Debug + Send + Sync {
    /// Build the wire string for fragment `index` of `total`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::InvalidIndexTotal`] unless
    /// `1 <= index <= total`, or [`TruthError::MalformedEnvelope`] when the
    /// code cannot be represented in this syntax.
    fn header(&self, code: &str, index: u32, total: u32, fragment: &str) -> Result<String>;

    /// Parse a wire string produced by this syntax.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::MalformedEnvelope`],
    /// [`TruthError::EnvelopeMismatch`] or [`TruthError::InvalidIndexTotal`].
    fn parse(&self, wire: &str) -> Result<Frame>;

    /// Built-in default prefix of this envelope type.
    fn prefix(&self) -> &str { DEFAULT_PREFIX }

    /// Built-in default version of this envelope type.
    fn version(&self) -> &str { DEFAULT_VERSION }

    /// Prefix after applying every precedence tier.
    fn effective_prefix(&self) -> &str;

    /// Version after applying every precedence tier.
    fn effective_version(&self) -> &str;

    /// Wire syntax family.
    fn transport_kind(&self) -> TransportKind;
}

/// Check `1 <= index <= total` and narrow both to `u32`.
///
/// # Errors
///
/// Returns [`TruthError::InvalidIndexTotal`] when the pair is out of range.
pub fn validate_index_total(index: u64, total: u64) -> Result<(u32, u32)> {
    let invalid = || TruthError::InvalidIndexTotal { index, total };
    if index < 1 || total < 1 || index > total {
        return Err(invalid());
    }
    let index = u32::try_from(index).map_err(|_| invalid())?;
    let total = u32::try_from(total).map_err(|_| invalid())?;
    Ok((index, total))
}

/// Parse an ASCII decimal field, rejecting signs, spaces and overflow.
pub(crate) fn parse_number(field: &'static str, raw: &str) -> Result<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TruthError::malformed(format!(
            "{field} must be a decimal number, got {raw:?}"
        )));
    }
    raw.parse::<u64>()
        .map_err(|_| TruthError::malformed(format!("{field} is out of range: {raw}")))
}

pub(crate) fn check_identity(
    expected_prefix: &str,
    expected_version: &str,
    prefix: &str,
    version: &str,
) -> Result<()> {
    if prefix != expected_prefix {
        return Err(TruthError::EnvelopeMismatch {
            field: "prefix",
            expected: expected_prefix.to_owned(),
            found: prefix.to_owned(),
        });
    }
    if version != expected_version {
        return Err(TruthError::EnvelopeMismatch {
            field: "version",
            expected: expected_version.to_owned(),
            found: version.to_owned(),
        });
    }
    Ok(())
}
