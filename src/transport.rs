//! Reversible text transforms applied after serialization.
//!
//! A [`TransportCodec`] turns serialized payload text into a channel-friendly
//! string and back. Every codec must satisfy `decode(encode(x)) == x` for all
//! text `x`. The base64url codecs emit only URL-safe ASCII, so fragment
//! lengths measured in characters equal lengths in bytes.

use std::{
    fmt,
    io::{Read, Write},
};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use flate2::{
    Compression,
    read::{DeflateDecoder, GzDecoder},
    write::{DeflateEncoder, GzEncoder},
};

use crate::{Result, TruthError};

/// Reversible text-to-text transform.
pub trait TransportCodec: fmt::Debug + Send + Sync {
    /// Transform serialized text for the channel.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Transport`] if a compression stage fails.
    fn encode(&self, text: &str) -> Result<String>;

    /// Invert [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Transport`] if `text` is not valid for this
    /// codec.
    fn decode(&self, text: &str) -> Result<String>;

    /// Stable codec identifier.
    fn codec_id(&self) -> &'static str;
}

/// Pass-through codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityTransport;

impl TransportCodec for IdentityTransport {
    fn encode(&self, text: &str) -> Result<String> { Ok(text.to_owned()) }

    fn decode(&self, text: &str) -> Result<String> { Ok(text.to_owned()) }

    fn codec_id(&self) -> &'static str { "none" }
}

/// URL-safe base64 without padding.
///
/// The decoder tolerates missing padding and trailing `=` characters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64UrlTransport;

impl TransportCodec for Base64UrlTransport {
    fn encode(&self, text: &str) -> Result<String> { Ok(URL_SAFE_NO_PAD.encode(text)) }

    fn decode(&self, text: &str) -> Result<String> {
        let codec = self.codec_id();
        let raw = decode_base64url(codec, text)?;
        into_utf8(codec, raw)
    }

    fn codec_id(&self) -> &'static str { "base64url" }
}

/// Raw DEFLATE (level 9) followed by URL-safe base64.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64UrlDeflateTransport;

impl TransportCodec for Base64UrlDeflateTransport {
    fn encode(&self, text: &str) -> Result<String> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(text.as_bytes())
            .map_err(|err| transport_error(self.codec_id(), err))?;
        let deflated = encoder
            .finish()
            .map_err(|err| transport_error(self.codec_id(), err))?;
        Ok(URL_SAFE_NO_PAD.encode(deflated))
    }

    fn decode(&self, text: &str) -> Result<String> {
        let codec = self.codec_id();
        let compressed = decode_base64url(codec, text)?;
        let mut raw = Vec::new();
        DeflateDecoder::new(compressed.as_slice())
            .read_to_end(&mut raw)
            .map_err(|err| transport_error(codec, format!("invalid DEFLATE stream: {err}")))?;
        into_utf8(codec, raw)
    }

    fn codec_id(&self) -> &'static str { "base64url+deflate" }
}

/// Gzip (level 9) followed by URL-safe base64.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64UrlGzipTransport;

impl TransportCodec for Base64UrlGzipTransport {
    fn encode(&self, text: &str) -> Result<String> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder
            .write_all(text.as_bytes())
            .map_err(|err| transport_error(self.codec_id(), err))?;
        let gz = encoder
            .finish()
            .map_err(|err| transport_error(self.codec_id(), err))?;
        Ok(URL_SAFE_NO_PAD.encode(gz))
    }

    fn decode(&self, text: &str) -> Result<String> {
        let codec = self.codec_id();
        let compressed = decode_base64url(codec, text)?;
        let mut raw = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut raw)
            .map_err(|err| transport_error(codec, format!("invalid gzip stream: {err}")))?;
        into_utf8(codec, raw)
    }

    fn codec_id(&self) -> &'static str { "base64url+gzip" }
}

fn decode_base64url(codec: &'static str, text: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(text.trim_end_matches('='))
        .map_err(|err| transport_error(codec, format!("invalid base64url payload: {err}")))
}

fn into_utf8(codec: &'static str, raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw).map_err(|err| transport_error(codec, err))
}

fn transport_error(codec: &'static str, reason: impl ToString) -> TruthError {
    TruthError::Transport {
        codec,
        reason: reason.to_string(),
    }
}
