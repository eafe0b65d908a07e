//! Alias registry for serializers, transport codecs and envelopes.
//!
//! Aliases are matched case-insensitively. A [`Registry`] is an ordinary
//! value built at start-up and passed to whoever needs it; lookups for an
//! unknown alias fail with [`TruthError::UnknownAlias`].

use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    Result,
    TruthError,
    envelope::{Envelope, EnvelopeSettings, LineEnvelope, UrlEnvelope, UrlSettings},
    serializer::{AutoDetectSerializer, JsonSerializer, PayloadSerializer, YamlSerializer},
    transport::{
        Base64UrlDeflateTransport,
        Base64UrlGzipTransport,
        Base64UrlTransport,
        IdentityTransport,
        TransportCodec,
    },
};

/// Builds a serializer instance.
pub type SerializerFactory = fn() -> Arc<dyn PayloadSerializer>;
/// Builds a transport codec instance.
pub type TransportFactory = fn() -> Arc<dyn TransportCodec>;
/// Builds an envelope from its construction parameters.
pub type EnvelopeFactory = fn(&EnvelopeParams) -> Arc<dyn Envelope>;

/// Everything an envelope constructor may need.
#[derive(Clone, Debug, Default)]
pub struct EnvelopeParams {
    /// Configuration tier for prefix and version.
    pub config: EnvelopeSettings,
    /// Runtime tier for prefix and version.
    pub runtime: EnvelopeSettings,
    /// URL shape used by URL envelopes.
    pub url: UrlSettings,
}

/// A resolved serializer, transport and envelope triple.
#[derive(Clone, Debug)]
pub struct CodecSuite {
    /// Payload serializer.
    pub serializer: Arc<dyn PayloadSerializer>,
    /// Transport codec.
    pub transport: Arc<dyn TransportCodec>,
    /// Framing envelope.
    pub envelope: Arc<dyn Envelope>,
}

/// Alias to factory maps.
#[derive(Clone, Default)]
pub struct Registry {
    serializers: HashMap<String, SerializerFactory>,
    transports: HashMap<String, TransportFactory>,
    envelopes: HashMap<String, EnvelopeFactory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("serializers", &sorted_keys(&self.serializers))
            .field("transports", &sorted_keys(&self.transports))
            .field("envelopes", &sorted_keys(&self.envelopes))
            .finish()
    }
}

impl Registry {
    /// Registry without any aliases.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Registry holding every built-in codec and envelope.
    ///
    /// Serializers: `json`, `yaml`, `auto`. Transports: `none`, `identity`,
    /// `base64url`, `base64url+deflate`, `base64url+gzip`. Envelopes: `line`,
    /// `url`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register_serializer("json", || Arc::new(JsonSerializer))
            .register_serializer("yaml", || Arc::new(YamlSerializer))
            .register_serializer("auto", || Arc::new(AutoDetectSerializer::default()))
            .register_transport("none", || Arc::new(IdentityTransport))
            .register_transport("identity", || Arc::new(IdentityTransport))
            .register_transport("base64url", || Arc::new(Base64UrlTransport))
            .register_transport("base64url+deflate", || Arc::new(Base64UrlDeflateTransport))
            .register_transport("base64url+gzip", || Arc::new(Base64UrlGzipTransport))
            .register_envelope("line", |params| {
                Arc::new(LineEnvelope::<crate::envelope::StandardProfile>::new(
                    &params.config,
                    &params.runtime,
                ))
            })
            .register_envelope("url", |params| {
                Arc::new(UrlEnvelope::<crate::envelope::StandardProfile>::new(
                    &params.config,
                    &params.runtime,
                    params.url.clone(),
                ))
            });
        registry
    }

    /// Register or replace a serializer alias.
    pub fn register_serializer(&mut self, alias: &str, factory: SerializerFactory) -> &mut Self {
        self.serializers.insert(normalise(alias), factory);
        self
    }

    /// Register or replace a transport alias.
    pub fn register_transport(&mut self, alias: &str, factory: TransportFactory) -> &mut Self {
        self.transports.insert(normalise(alias), factory);
        self
    }

    /// Register or replace an envelope alias.
    pub fn register_envelope(&mut self, alias: &str, factory: EnvelopeFactory) -> &mut Self {
        self.envelopes.insert(normalise(alias), factory);
        self
    }

    /// Build the serializer registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::UnknownAlias`] for an unregistered alias.
    pub fn serializer(&self, alias: &str) -> Result<Arc<dyn PayloadSerializer>> {
        lookup(&self.serializers, "serializer", alias).map(|factory| factory())
    }

    /// Build the transport codec registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::UnknownAlias`] for an unregistered alias.
    pub fn transport(&self, alias: &str) -> Result<Arc<dyn TransportCodec>> {
        lookup(&self.transports, "transport", alias).map(|factory| factory())
    }

    /// Build the envelope registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::UnknownAlias`] for an unregistered alias.
    pub fn envelope(&self, alias: &str, params: &EnvelopeParams) -> Result<Arc<dyn Envelope>> {
        lookup(&self.envelopes, "envelope", alias).map(|factory| factory(params))
    }

    /// One instance of every registered envelope, ordered by alias.
    ///
    /// Used as the candidate list when classifying scanned strings.
    #[must_use]
    pub fn envelopes(&self, params: &EnvelopeParams) -> Vec<Arc<dyn Envelope>> {
        sorted_keys(&self.envelopes)
            .into_iter()
            .filter_map(|alias| self.envelopes.get(alias))
            .map(|factory| factory(params))
            .collect()
    }

    /// Resolve a full codec triple.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::UnknownAlias`] naming the first alias that is
    /// not registered.
    pub fn suite(
        &self,
        serializer: &str,
        transport: &str,
        envelope: &str,
        params: &EnvelopeParams,
    ) -> Result<CodecSuite> {
        Ok(CodecSuite {
            serializer: self.serializer(serializer)?,
            transport: self.transport(transport)?,
            envelope: self.envelope(envelope, params)?,
        })
    }
}

fn normalise(alias: &str) -> String { alias.trim().to_ascii_lowercase() }

fn lookup<F: Copy>(map: &HashMap<String, F>, kind: &'static str, alias: &str) -> Result<F> {
    map.get(&normalise(alias))
        .copied()
        .ok_or_else(|| TruthError::UnknownAlias {
            kind,
            name: alias.to_owned(),
        })
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::{EnvelopeParams, Registry};
    use crate::{
        TruthError,
        envelope::{EnvelopeSettings, TransportKind, UrlSettings},
        transport::IdentityTransport,
    };

    #[rstest]
    #[case("JSON", "json")]
    #[case(" yaml ", "yaml")]
    #[case("Auto", "auto")]
    fn serializer_aliases_ignore_case(#[case] alias: &str, #[case] format: &str) {
        let serializer = Registry::with_defaults().serializer(alias).expect("registered");
        assert_eq!(serializer.format_id(), format);
    }

    #[rstest]
    #[case("none", "none")]
    #[case("identity", "none")]
    #[case("BASE64URL", "base64url")]
    #[case("base64url+deflate", "base64url+deflate")]
    #[case("base64url+GZIP", "base64url+gzip")]
    fn transport_aliases_resolve(#[case] alias: &str, #[case] codec: &str) {
        let transport = Registry::with_defaults().transport(alias).expect("registered");
        assert_eq!(transport.codec_id(), codec);
    }

    #[test]
    fn unknown_alias_names_the_kind() {
        let err = Registry::with_defaults()
            .transport("rot13")
            .expect_err("unregistered");
        assert_eq!(
            err,
            TruthError::UnknownAlias {
                kind: "transport",
                name: "rot13".into(),
            }
        );
    }

    #[test]
    fn suite_threads_envelope_params() {
        let params = EnvelopeParams {
            config: EnvelopeSettings::new("BAL", "v2"),
            runtime: EnvelopeSettings::default(),
            url: UrlSettings::default(),
        };
        let suite = Registry::with_defaults()
            .suite("json", "base64url", "URL", &params)
            .expect("suite");
        assert_eq!(suite.envelope.transport_kind(), TransportKind::Url);
        assert_eq!(suite.envelope.effective_prefix(), "BAL");
        assert_eq!(suite.envelope.effective_version(), "v2");
    }

    #[test]
    fn callers_can_add_aliases() {
        let mut registry = Registry::with_defaults();
        registry.register_transport("plain", || Arc::new(IdentityTransport));
        assert_eq!(
            registry.transport("PLAIN").expect("registered").codec_id(),
            "none"
        );
    }

    #[test]
    fn envelopes_lists_every_syntax() {
        let kinds: Vec<_> = Registry::with_defaults()
            .envelopes(&EnvelopeParams::default())
            .iter()
            .map(|envelope| envelope.transport_kind())
            .collect();
        assert_eq!(kinds, [TransportKind::Line, TransportKind::Url]);
    }

    #[test]
    fn empty_registry_knows_nothing() {
        assert!(matches!(
            Registry::new().serializer("json"),
            Err(TruthError::UnknownAlias { kind: "serializer", .. })
        ));
    }
}
