//! Pipe-delimited envelope: `PREFIX|VERSION|CODE|i/N|fragment`.

use std::{marker::PhantomData, sync::LazyLock};

use regex::Regex;

use super::{
    Envelope,
    EnvelopeProfile,
    EnvelopeSettings,
    Frame,
    StandardProfile,
    TransportKind,
    check_identity,
    parse_number,
    resolve_identity,
    validate_index_total,
};
use crate::{Result, TruthError};

static INDEX_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)/([0-9]+)$")
        .unwrap_or_else(|err| panic!("index/total pattern must compile: {err}"))
});

/// Line envelope.
///
/// The split is capped at five fields, so the fragment itself may contain
/// `|`. The code may not, since it sits in the middle of the line.
///
/// # Examples
///
/// ```
/// use truthframe::envelope::{Envelope, LineEnvelope};
///
/// let envelope = LineEnvelope::default();
/// let wire = envelope.header("DEMO-001", 2, 3, "abc|def").expect("header");
/// assert_eq!(wire, "ER|v1|DEMO-001|2/3|abc|def");
///
/// let frame = envelope.parse(&wire).expect("parse");
/// assert_eq!((frame.index, frame.total), (2, 3));
/// assert_eq!(frame.fragment, "abc|def");
/// ```
#[derive(Clone, Debug)]
pub struct LineEnvelope<P: EnvelopeProfile = StandardProfile> {
    prefix: String,
    version: String,
    _profile: PhantomData<P>,
}

impl<P: EnvelopeProfile> LineEnvelope<P> {
    /// Build an envelope from configuration and runtime overrides.
    #[must_use]
    pub fn new(config: &EnvelopeSettings, runtime: &EnvelopeSettings) -> Self {
        let (prefix, version) = resolve_identity::<P>(config, runtime);
        Self {
            prefix,
            version,
            _profile: PhantomData,
        }
    }
}

impl Default for LineEnvelope {
    fn default() -> Self { Self::new(&EnvelopeSettings::default(), &EnvelopeSettings::default()) }
}

impl<P: EnvelopeProfile> Envelope for LineEnvelope<P> {
    fn header(&self, code: &str, index: u32, total: u32, fragment: &str) -> Result<String> {
        validate_index_total(u64::from(index), u64::from(total))?;
        if code.contains('|') {
            return Err(TruthError::malformed(format!(
                "code {code:?} must not contain '|'"
            )));
        }
        Ok(format!(
            "{}|{}|{code}|{index}/{total}|{fragment}",
            self.prefix, self.version
        ))
    }

    fn parse(&self, wire: &str) -> Result<Frame> {
        let parts: Vec<&str> = wire.splitn(5, '|').collect();
        let [prefix, version, code, index_total, fragment] = parts.as_slice() else {
            return Err(TruthError::malformed(format!(
                "expected 5 '|' separated segments, found {}",
                parts.len()
            )));
        };

        check_identity(&self.prefix, &self.version, prefix, version)?;

        let Some(captures) = INDEX_TOTAL.captures(index_total) else {
            return Err(TruthError::malformed(format!(
                "invalid i/N segment {index_total:?}"
            )));
        };
        let index = parse_number("index", &captures[1])?;
        let total = parse_number("total", &captures[2])?;
        let (index, total) = validate_index_total(index, total)?;

        Ok(Frame::new(*code, index, total, *fragment))
    }

    fn effective_prefix(&self) -> &str { &self.prefix }

    fn effective_version(&self) -> &str { &self.version }

    fn transport_kind(&self) -> TransportKind { TransportKind::Line }
}
