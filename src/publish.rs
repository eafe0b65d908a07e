//! Publish pipeline: payload to an ordered list of framed wire strings.
//!
//! [`Publisher`] composes a serializer, a transport codec, the chunker and
//! an envelope. It holds no mutable state, so one instance can serve any
//! number of concurrent calls.

use std::{fmt, num::NonZeroUsize, str::FromStr, sync::Arc};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::{
    Result,
    TruthError,
    chunk::{split_by_count, split_by_size},
    envelope::{Envelope, TransportKind},
    metrics,
    registry::CodecSuite,
    serializer::{Payload, PayloadSerializer},
    transport::TransportCodec,
};

/// How the packed text is cut into fragments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// A fixed number of near-equal fragments.
    #[default]
    Count,
    /// Fragments of at most a fixed length.
    Size,
}

impl Strategy {
    /// Lower-case name, `"count"` or `"size"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Size => "size",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Strategy {
    type Err = TruthError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "size" => Ok(Self::Size),
            _ => Err(TruthError::UnknownAlias {
                kind: "strategy",
                name: raw.to_owned(),
            }),
        }
    }
}

/// Default number of fragments for [`Strategy::Count`].
pub const DEFAULT_COUNT: usize = 3;
/// Default fragment length for [`Strategy::Size`].
pub const DEFAULT_SIZE: usize = 800;

/// Chunking options for one publish call.
///
/// `count` and `size` are clamped to at least 1 when used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOptions {
    /// Chunking strategy. Also accepted as `strategy`.
    #[serde(alias = "strategy")]
    pub by: Strategy,
    /// Fragment count for [`Strategy::Count`].
    pub count: usize,
    /// Maximum fragment length for [`Strategy::Size`].
    pub size: usize,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            by: Strategy::Count,
            count: DEFAULT_COUNT,
            size: DEFAULT_SIZE,
        }
    }
}

/// Per-call overrides layered onto configured [`PublishOptions`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOverrides {
    /// Chunking strategy. Also accepted as `strategy`.
    #[serde(alias = "strategy")]
    pub by: Option<Strategy>,
    /// Fragment count.
    pub count: Option<usize>,
    /// Maximum fragment length.
    pub size: Option<usize>,
}

impl PublishOptions {
    /// Options using `strategy` and the default count and size.
    #[must_use]
    pub fn by(strategy: Strategy) -> Self {
        Self {
            by: strategy,
            ..Self::default()
        }
    }

    /// Options splitting into `count` fragments.
    #[must_use]
    pub fn count(count: usize) -> Self {
        Self {
            by: Strategy::Count,
            count,
            ..Self::default()
        }
    }

    /// Options splitting into fragments of at most `size` characters.
    #[must_use]
    pub fn size(size: usize) -> Self {
        Self {
            by: Strategy::Size,
            size,
            ..Self::default()
        }
    }

    /// Overlay `overrides` onto these options and clamp the numbers to 1.
    #[must_use]
    pub fn merge(&self, overrides: &PublishOverrides) -> Self {
        Self {
            by: overrides.by.unwrap_or(self.by),
            count: overrides.count.unwrap_or(self.count).max(1),
            size: overrides.size.unwrap_or(self.size).max(1),
        }
    }

    fn split(&self, packed: &str) -> Vec<String> {
        match self.by {
            Strategy::Count => split_by_count(packed, at_least_one(self.count)),
            Strategy::Size => split_by_size(packed, at_least_one(self.size)),
        }
    }
}

fn at_least_one(value: usize) -> NonZeroUsize { NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN) }

/// Renders frames into images. Implementations live outside this crate.
pub trait QrWriter: Send + Sync {
    /// Render one image per frame, in frame order.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Writer`] when rendering fails.
    fn write(&self, frames: &[String]) -> Result<Vec<Vec<u8>>>;
}

/// Writer that returns each frame's UTF-8 bytes unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullWriter;

impl QrWriter for NullWriter {
    fn write(&self, frames: &[String]) -> Result<Vec<Vec<u8>>> {
        Ok(frames.iter().map(|frame| frame.as_bytes().to_vec()).collect())
    }
}

/// One rendered image.
///
/// UTF-8 output such as SVG serializes as text, anything else as standard
/// base64.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QrImage {
    /// Textual image.
    Text(String),
    /// Binary image.
    Binary(Vec<u8>),
}

impl From<Vec<u8>> for QrImage {
    fn from(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Binary(err.into_bytes()),
        }
    }
}

impl Serialize for QrImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Binary(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        }
    }
}

/// Result of a publish call in its external JSON shape.
///
/// Serializes as `{code, by, lines}` for line envelopes and
/// `{code, by, urls}` for URL envelopes, plus `qr` once images were
/// rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOutput {
    /// Document code.
    pub code: String,
    /// Strategy used to cut fragments.
    pub by: Strategy,
    /// Wire strings in fragment order.
    pub frames: Vec<String>,
    /// Envelope syntax of `frames`.
    pub kind: TransportKind,
    /// Rendered images, in frame order.
    pub qr: Option<Vec<QrImage>>,
}

impl PublishOutput {
    /// JSON key holding the frames.
    #[must_use]
    pub fn frames_key(&self) -> &'static str {
        match self.kind {
            TransportKind::Line => "lines",
            TransportKind::Url => "urls",
        }
    }
}

impl Serialize for PublishOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = if self.qr.is_some() { 4 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("code", &self.code)?;
        map.serialize_entry("by", &self.by)?;
        map.serialize_entry(self.frames_key(), &self.frames)?;
        if let Some(qr) = &self.qr {
            map.serialize_entry("qr", qr)?;
        }
        map.end()
    }
}

/// Composes serializer, transport codec, chunker and envelope.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use truthframe::{
///     envelope::LineEnvelope,
///     publish::{PublishOptions, Publisher},
///     serializer::{JsonSerializer, Payload},
///     transport::Base64UrlTransport,
/// };
///
/// let publisher = Publisher::new(
///     Arc::new(JsonSerializer),
///     Arc::new(Base64UrlTransport),
///     Arc::new(LineEnvelope::default()),
/// );
/// let mut payload = Payload::new();
/// payload.insert("a".into(), 1.into());
///
/// let lines = publisher
///     .publish(&payload, "DEMO-001", &PublishOptions::count(2))
///     .expect("publish");
/// assert_eq!(lines.len(), 2);
/// assert!(lines[0].starts_with("ER|v1|DEMO-001|1/2|"));
/// ```
#[derive(Clone, Debug)]
pub struct Publisher {
    serializer: Arc<dyn PayloadSerializer>,
    transport: Arc<dyn TransportCodec>,
    envelope: Arc<dyn Envelope>,
}

impl From<CodecSuite> for Publisher {
    fn from(suite: CodecSuite) -> Self { Self::new(suite.serializer, suite.transport, suite.envelope) }
}

impl Publisher {
    /// Create a publisher from its three collaborators.
    #[must_use]
    pub fn new(
        serializer: Arc<dyn PayloadSerializer>,
        transport: Arc<dyn TransportCodec>,
        envelope: Arc<dyn Envelope>,
    ) -> Self {
        Self {
            serializer,
            transport,
            envelope,
        }
    }

    /// Envelope used to frame fragments.
    #[must_use]
    pub fn envelope(&self) -> &Arc<dyn Envelope> { &self.envelope }

    /// Serialize, pack, split and frame `payload`.
    ///
    /// The returned strings are ordered by fragment index.
    ///
    /// # Errors
    ///
    /// Propagates serializer, transport and envelope errors.
    pub fn publish(
        &self,
        payload: &Payload,
        code: &str,
        options: &PublishOptions,
    ) -> Result<Vec<String>> {
        let blob = self.serializer.encode(payload)?;
        let packed = self.transport.encode(&blob)?;
        let parts = options.split(&packed);
        let total = u32::try_from(parts.len()).map_err(|_| TruthError::InvalidIndexTotal {
            index: 1,
            total: parts.len() as u64,
        })?;

        let frames = (1..=total)
            .zip(&parts)
            .map(|(index, part)| self.envelope.header(code, index, total, part))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|err| metrics::inc_errors(err.kind()))?;

        log::debug!(
            "published {code} as {total} {} frame(s) by {}",
            self.envelope.transport_kind(),
            options.by
        );
        metrics::inc_frames_published(frames.len());
        Ok(frames)
    }

    /// Publish and wrap the frames in their external shape.
    ///
    /// # Errors
    ///
    /// Propagates [`publish`](Self::publish) errors.
    pub fn publish_output(
        &self,
        payload: &Payload,
        code: &str,
        options: &PublishOptions,
    ) -> Result<PublishOutput> {
        let frames = self.publish(payload, code, options)?;
        Ok(PublishOutput {
            code: code.to_owned(),
            by: options.by,
            frames,
            kind: self.envelope.transport_kind(),
            qr: None,
        })
    }

    /// Publish and render every frame with `writer`.
    ///
    /// # Errors
    ///
    /// Propagates [`publish`](Self::publish) errors and writer failures.
    pub fn publish_qr_images(
        &self,
        payload: &Payload,
        code: &str,
        writer: &dyn QrWriter,
        options: &PublishOptions,
    ) -> Result<PublishOutput> {
        let mut output = self.publish_output(payload, code, options)?;
        let images = writer.write(&output.frames)?;
        if images.len() != output.frames.len() {
            return Err(TruthError::Writer(format!(
                "writer returned {} image(s) for {} frame(s)",
                images.len(),
                output.frames.len()
            )));
        }
        output.qr = Some(images.into_iter().map(QrImage::from).collect());
        Ok(output)
    }
}
