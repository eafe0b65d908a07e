//! Process configuration.
//!
//! [`TruthConfig`] is read from an optional TOML file and then overlaid with
//! `TRUTH_*` environment variables. Every field has a default, so an empty
//! file or no file at all yields a working configuration. Invalid
//! environment values are logged and ignored.
//!
//! ```toml
//! [envelope]
//! prefix = "ER"
//! version = "v1"
//!
//! [url]
//! scheme = "truth"
//! web_base = "https://example.org/scan"
//!
//! [publish]
//! strategy = "size"
//! size = 600
//!
//! [codec]
//! serializer = "json"
//! transport = "base64url+deflate"
//! envelope = "url"
//!
//! [store]
//! driver = "memory"
//! ttl_secs = 3600
//! ```

use std::{fs, path::Path, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    TruthError,
    envelope::{EnvelopeSettings, UrlSettings},
    publish::{PublishOptions, Strategy},
    registry::{CodecSuite, EnvelopeParams, Registry},
    store::{MemoryStore, TruthStore},
};

/// Default record lifetime: one day.
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Aliases of the codec triple used by default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    /// Serializer alias.
    pub serializer: String,
    /// Transport codec alias.
    pub transport: String,
    /// Envelope alias.
    pub envelope: String,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            serializer: "json".to_owned(),
            transport: "base64url".to_owned(),
            envelope: "line".to_owned(),
        }
    }
}

/// Store backend selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    /// [`MemoryStore`].
    #[default]
    Memory,
    /// [`RedisStore`](crate::store::RedisStore).
    Redis,
}

impl std::str::FromStr for StoreDriver {
    type Err = TruthError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            _ => Err(TruthError::UnknownAlias {
                kind: "store driver",
                name: raw.to_owned(),
            }),
        }
    }
}

/// Store settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Backend.
    pub driver: StoreDriver,
    /// Record lifetime in seconds; 0 keeps records forever.
    pub ttl_secs: u64,
    /// Redis connection URL.
    pub redis_url: Option<String>,
    /// Redis key namespace.
    pub key_prefix: String,
    /// Seconds between background purges.
    pub purge_interval_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            driver: StoreDriver::Memory,
            ttl_secs: DEFAULT_TTL_SECS,
            redis_url: None,
            key_prefix: "truth:qr:".to_owned(),
            purge_interval_secs: 60,
        }
    }
}

impl StoreSettings {
    /// Record lifetime, `None` when records never expire.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    /// Interval of the background purge task, at least one second.
    #[must_use]
    pub fn purge_interval(&self) -> Duration { Duration::from_secs(self.purge_interval_secs.max(1)) }

    /// Build the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Config`] when Redis is selected without a URL
    /// or without the `redis` feature, or [`TruthError::Backend`] for an
    /// invalid URL.
    pub fn open(&self) -> Result<Arc<dyn TruthStore>> {
        match self.driver {
            StoreDriver::Memory => Ok(Arc::new(MemoryStore::with_ttl(self.ttl()))),
            StoreDriver::Redis => self.open_redis(),
        }
    }

    #[cfg(feature = "redis")]
    fn open_redis(&self) -> Result<Arc<dyn TruthStore>> {
        let url = self
            .redis_url
            .as_deref()
            .ok_or_else(|| TruthError::Config("store.redis_url is required for redis".into()))?;
        let store = crate::store::RedisStore::open(url, self.key_prefix.clone(), self.ttl())?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redis"))]
    fn open_redis(&self) -> Result<Arc<dyn TruthStore>> {
        Err(TruthError::Config(
            "redis store requested but the redis feature is disabled".into(),
        ))
    }
}

/// Complete process configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthConfig {
    /// Configuration tier of the envelope prefix and version.
    pub envelope: EnvelopeSettings,
    /// URL envelope shape.
    pub url: UrlSettings,
    /// Default chunking options.
    pub publish: PublishOptions,
    /// Default codec aliases.
    pub codec: CodecSettings,
    /// Store backend.
    pub store: StoreSettings,
}

impl TruthConfig {
    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Config`] for invalid TOML or field types.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| TruthError::Config(err.to_string()))
    }

    /// Read `path` when given, then apply the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::Config`] when the file cannot be read or
    /// parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|err| {
                    TruthError::Config(format!("failed to read {}: {err}", path.display()))
                })?;
                Self::from_toml_str(&text).map_err(|err| {
                    TruthError::Config(format!("failed to parse {}: {err}", path.display()))
                })?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Overlay `TRUTH_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) { self.apply_overrides_from(|key| std::env::var(key).ok()); }

    /// Overlay `TRUTH_*` variables resolved through `lookup`.
    ///
    /// Blank values are ignored; values that fail to parse are logged and
    /// ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = var("TRUTH_ENVELOPE_PREFIX") {
            self.envelope.prefix = Some(value);
        }
        if let Some(value) = var("TRUTH_ENVELOPE_VERSION") {
            self.envelope.version = Some(value);
        }

        if let Some(value) = var("TRUTH_URL_SCHEME") {
            self.url.scheme = value;
        }
        if let Some(value) = var("TRUTH_URL_WEB_BASE") {
            self.url.web_base = Some(value);
        }
        if let Some(value) = var("TRUTH_URL_PAYLOAD_PARAM") {
            self.url.payload_param = value;
        }
        if let Some(value) = var("TRUTH_URL_VERSION_PARAM") {
            self.url.version_param = value;
        }

        if let Some(by) = parsed::<Strategy>(&var, "TRUTH_PUBLISH_STRATEGY") {
            self.publish.by = by;
        }
        if let Some(count) = parsed::<usize>(&var, "TRUTH_PUBLISH_COUNT") {
            self.publish.count = count.max(1);
        }
        if let Some(size) = parsed::<usize>(&var, "TRUTH_PUBLISH_SIZE") {
            self.publish.size = size.max(1);
        }

        if let Some(value) = var("TRUTH_SERIALIZER") {
            self.codec.serializer = value;
        }
        if let Some(value) = var("TRUTH_TRANSPORT") {
            self.codec.transport = value;
        }
        if let Some(value) = var("TRUTH_ENVELOPE") {
            self.codec.envelope = value;
        }

        if let Some(driver) = parsed::<StoreDriver>(&var, "TRUTH_STORE") {
            self.store.driver = driver;
        }
        if let Some(ttl) = parsed::<u64>(&var, "TRUTH_TTL") {
            self.store.ttl_secs = ttl;
        }
        if let Some(value) = var("TRUTH_REDIS_URL") {
            self.store.redis_url = Some(value);
        }
        if let Some(value) = var("TRUTH_REDIS_PREFIX") {
            self.store.key_prefix = value;
        }
    }

    /// Envelope construction parameters with `runtime` as the top tier.
    #[must_use]
    pub fn envelope_params(&self, runtime: EnvelopeSettings) -> EnvelopeParams {
        EnvelopeParams {
            config: self.envelope.clone(),
            runtime,
            url: self.url.clone(),
        }
    }

    /// Resolve the configured codec triple.
    ///
    /// # Errors
    ///
    /// Returns [`TruthError::UnknownAlias`] for an unregistered alias.
    pub fn suite(&self, registry: &Registry, runtime: EnvelopeSettings) -> Result<CodecSuite> {
        registry.suite(
            &self.codec.serializer,
            &self.codec.transport,
            &self.codec.envelope,
            &self.envelope_params(runtime),
        )
    }
}

fn parsed<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("invalid {key}={raw:?}, ignoring: {err}");
            None
        }
    }
}
