//! URL envelope in its deep-link and web-link forms.

use std::{collections::HashMap, marker::PhantomData};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;

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

/// RFC 3986 unreserved characters pass through, everything else is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Query key that carries the version in web links.
const WEB_VERSION_KEY: &str = "truth";

/// Shape of the URLs produced by [`UrlEnvelope`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlSettings {
    /// Deep-link scheme.
    pub scheme: String,
    /// When set, emit web links rooted here instead of deep links.
    pub web_base: Option<String>,
    /// Query key carrying the fragment.
    pub payload_param: String,
    /// Fallback query key for the version when `truth` is absent.
    pub version_param: String,
}

impl Default for UrlSettings {
    fn default() -> Self {
        Self {
            scheme: "truth".to_owned(),
            web_base: None,
            payload_param: "c".to_owned(),
            version_param: "v".to_owned(),
        }
    }
}

impl UrlSettings {
    /// Default settings emitting web links under `base`.
    #[must_use]
    pub fn web(base: impl Into<String>) -> Self {
        Self {
            web_base: Some(base.into()),
            ..Self::default()
        }
    }

    fn web_base(&self) -> Option<&str> { self.web_base.as_deref().filter(|base| !base.is_empty()) }
}

/// URL envelope.
///
/// Without a web base it emits
/// `truth://VERSION/PREFIX/CODE/i/N?c=fragment`; with one it emits
/// `BASE?truth=VERSION&prefix=PREFIX&code=CODE&i=i&n=N&c=fragment`. Parsing
/// accepts both forms regardless of which one this instance emits.
///
/// ```
/// use truthframe::envelope::{Envelope, UrlEnvelope};
///
/// let envelope = UrlEnvelope::default();
/// let wire = envelope.header("DEMO 1", 1, 2, "eyJh").expect("header");
/// assert_eq!(wire, "truth://v1/ER/DEMO%201/1/2?c=eyJh");
/// assert_eq!(envelope.parse(&wire).expect("parse").code, "DEMO 1");
/// ```
#[derive(Clone, Debug)]
pub struct UrlEnvelope<P: EnvelopeProfile = StandardProfile> {
    prefix: String,
    version: String,
    settings: UrlSettings,
    _profile: PhantomData<P>,
}

impl<P: EnvelopeProfile> UrlEnvelope<P> {
    /// Build an envelope from configuration, runtime overrides and URL
    /// settings.
    #[must_use]
    pub fn new(config: &EnvelopeSettings, runtime: &EnvelopeSettings, settings: UrlSettings) -> Self {
        let (prefix, version) = resolve_identity::<P>(config, runtime);
        Self {
            prefix,
            version,
            settings,
            _profile: PhantomData,
        }
    }

    /// URL settings in effect.
    #[must_use]
    pub fn settings(&self) -> &UrlSettings { &self.settings }

    fn deep_link(&self, code: &str, index: u32, total: u32, fragment: &str) -> String {
        format!(
            "{}://{}/{}/{}/{index}/{total}?{}={}",
            self.settings.scheme,
            encode(&self.version),
            encode(&self.prefix),
            encode(code),
            encode(&self.settings.payload_param),
            encode(fragment),
        )
    }

    fn web_link(&self, base: &str, code: &str, index: u32, total: u32, fragment: &str) -> String {
        let base = base.trim_end_matches('/');
        let joiner = if base.contains('?') { '&' } else { '?' };
        format!(
            "{base}{joiner}{WEB_VERSION_KEY}={}&prefix={}&code={}&i={index}&n={total}&{}={}",
            encode(&self.version),
            encode(&self.prefix),
            encode(code),
            encode(&self.settings.payload_param),
            encode(fragment),
        )
    }

    fn parse_deep_link(&self, url: &Url) -> Result<Frame> {
        let host = url
            .host_str()
            .ok_or_else(|| TruthError::malformed("deep link has no host segment"))?;
        let segments = std::iter::once(host)
            .chain(url.path_segments().into_iter().flatten())
            .filter(|segment| !segment.is_empty())
            .map(decode)
            .collect::<Result<Vec<_>>>()?;
        let [version, prefix, code, index, total, ..] = segments.as_slice() else {
            return Err(TruthError::malformed(format!(
                "deep link needs 5 path segments, found {}",
                segments.len()
            )));
        };

        check_identity(&self.prefix, &self.version, prefix, version)?;

        let query = query_map(url);
        let fragment = query.get(self.settings.payload_param.as_str()).ok_or_else(|| {
            TruthError::malformed(format!(
                "deep link has no {:?} query parameter",
                self.settings.payload_param
            ))
        })?;
        let (index, total) =
            validate_index_total(parse_number("index", index)?, parse_number("total", total)?)?;
        Ok(Frame::new(code.as_str(), index, total, fragment.as_str()))
    }

    fn parse_web_link(&self, url: &Url) -> Result<Frame> {
        let query = query_map(url);
        let version = query
            .get(WEB_VERSION_KEY)
            .or_else(|| query.get(self.settings.version_param.as_str()))
            .ok_or_else(|| TruthError::malformed("web link is missing the version"))?;
        let prefix = required(&query, "prefix")?;
        let code = required(&query, "code")?;
        let index = parse_number("index", required(&query, "i")?)?;
        let total = parse_number("total", required(&query, "n")?)?;
        let fragment = required(&query, &self.settings.payload_param)?;

        check_identity(&self.prefix, &self.version, prefix, version)?;
        let (index, total) = validate_index_total(index, total)?;
        Ok(Frame::new(code, index, total, fragment))
    }
}

impl Default for UrlEnvelope {
    fn default() -> Self {
        Self::new(
            &EnvelopeSettings::default(),
            &EnvelopeSettings::default(),
            UrlSettings::default(),
        )
    }
}

impl<P: EnvelopeProfile> Envelope for UrlEnvelope<P> {
    fn header(&self, code: &str, index: u32, total: u32, fragment: &str) -> Result<String> {
        validate_index_total(u64::from(index), u64::from(total))?;
        Ok(match self.settings.web_base() {
            Some(base) => self.web_link(base, code, index, total, fragment),
            None => self.deep_link(code, index, total, fragment),
        })
    }

    fn parse(&self, wire: &str) -> Result<Frame> {
        let url = Url::parse(wire)
            .map_err(|err| TruthError::malformed(format!("not a URL envelope: {err}")))?;
        match url.scheme() {
            scheme if scheme.eq_ignore_ascii_case(&self.settings.scheme) => {
                self.parse_deep_link(&url)
            }
            "http" | "https" => self.parse_web_link(&url),
            other => Err(TruthError::malformed(format!(
                "unsupported URL scheme {other:?}"
            ))),
        }
    }

    fn effective_prefix(&self) -> &str { &self.prefix }

    fn effective_version(&self) -> &str { &self.version }

    fn transport_kind(&self) -> TransportKind { TransportKind::Url }
}

fn encode(component: &str) -> String { utf8_percent_encode(component, COMPONENT).to_string() }

fn decode(segment: &str) -> Result<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|err| TruthError::malformed(format!("segment {segment:?} is not UTF-8: {err}")))
}

fn required<'q>(query: &'q HashMap<String, String>, key: &str) -> Result<&'q str> {
    query
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| TruthError::malformed(format!("web link is missing {key:?}")))
}

/// Query parameters with the last occurrence of a key winning.
fn query_map(url: &Url) -> HashMap<String, String> { url.query_pairs().into_owned().collect() }

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{UrlEnvelope, UrlSettings};
    use crate::{
        TruthError,
        envelope::{Envelope, EnvelopeSettings, Frame, TransportKind},
    };

    fn deep() -> UrlEnvelope { UrlEnvelope::default() }

    fn web() -> UrlEnvelope {
        UrlEnvelope::new(
            &EnvelopeSettings::default(),
            &EnvelopeSettings::default(),
            UrlSettings::web("https://example.org/truth/"),
        )
    }

    #[test]
    fn deep_link_is_bit_exact() {
        let wire = deep().header("DEMO-001", 2, 3, "eyJh_-").expect("header");
        assert_eq!(wire, "truth://v1/ER/DEMO-001/2/3?c=eyJh_-");
        assert_eq!(
            deep().parse(&wire).expect("parse"),
            Frame::new("DEMO-001", 2, 3, "eyJh_-")
        );
        assert_eq!(deep().transport_kind(), TransportKind::Url);
    }

    #[test]
    fn web_link_is_bit_exact() {
        let wire = web().header("DEMO-001", 1, 3, "abc").expect("header");
        assert_eq!(
            wire,
            "https://example.org/truth?truth=v1&prefix=ER&code=DEMO-001&i=1&n=3&c=abc"
        );
        assert_eq!(
            web().parse(&wire).expect("parse"),
            Frame::new("DEMO-001", 1, 3, "abc")
        );
    }

    #[test]
    fn web_base_with_query_is_extended() {
        let envelope = UrlEnvelope::<crate::envelope::StandardProfile>::new(
            &EnvelopeSettings::default(),
            &EnvelopeSettings::default(),
            UrlSettings::web("https://example.org/scan?lang=en"),
        );
        let wire = envelope.header("A", 1, 1, "x").expect("header");
        assert!(wire.starts_with("https://example.org/scan?lang=en&truth=v1&"));
        assert_eq!(envelope.parse(&wire).expect("parse").fragment, "x");
    }

    #[test]
    fn both_forms_parse_with_either_instance() {
        let from_web = web().header("A", 1, 1, "x").expect("header");
        let from_deep = deep().header("A", 1, 1, "x").expect("header");
        assert_eq!(deep().parse(&from_web), web().parse(&from_deep));
    }

    #[test]
    fn reserved_characters_survive() {
        let code = "ER/2025 #7?&";
        let fragment = r#"{"a":"b+c d"}|"#;
        for envelope in [deep(), web()] {
            let wire = envelope.header(code, 1, 1, fragment).expect("header");
            let frame = envelope.parse(&wire).expect("parse");
            assert_eq!((frame.code.as_str(), frame.fragment.as_str()), (code, fragment));
        }
    }

    #[test]
    fn version_param_is_a_fallback_key() {
        let frame = web()
            .parse("https://example.org/?v=v1&prefix=ER&code=Z&i=1&n=1&c=q")
            .expect("parse");
        assert_eq!(frame.code, "Z");
    }

    #[rstest]
    #[case::too_few_segments("truth://v1/ER/DEMO/1?c=x")]
    #[case::missing_payload("truth://v1/ER/DEMO/1/3")]
    #[case::non_numeric_index("truth://v1/ER/DEMO/one/3?c=x")]
    #[case::web_missing_code("https://h/?truth=v1&prefix=ER&i=1&n=3&c=x")]
    #[case::web_missing_version("https://h/?prefix=ER&code=A&i=1&n=3&c=x")]
    #[case::web_bad_total("https://h/?truth=v1&prefix=ER&code=A&i=1&n=x&c=x")]
    #[case::other_scheme("ftp://v1/ER/DEMO/1/3?c=x")]
    #[case::not_a_url("ER|v1|DEMO|1/3|x")]
    fn malformed_urls_are_rejected(#[case] wire: &str) {
        let err = deep().parse(wire).expect_err("malformed");
        assert!(matches!(err, TruthError::MalformedEnvelope { .. }), "{err:?}");
    }

    #[rstest]
    #[case("truth://v2/ER/DEMO/1/3?c=x", "version")]
    #[case("truth://v1/BAL/DEMO/1/3?c=x", "prefix")]
    #[case("https://h/?truth=v1&prefix=BAL&code=A&i=1&n=3&c=x", "prefix")]
    fn foreign_family_is_a_mismatch(#[case] wire: &str, #[case] expected_field: &str) {
        let err = deep().parse(wire).expect_err("mismatch");
        assert!(
            matches!(err, TruthError::EnvelopeMismatch { field, .. } if field == expected_field),
            "{err:?}"
        );
    }

    #[rstest]
    #[case("truth://v1/ER/DEMO/0/3?c=x")]
    #[case("https://h/?truth=v1&prefix=ER&code=A&i=4&n=3&c=x")]
    fn out_of_range_index_is_rejected(#[case] wire: &str) {
        assert!(matches!(
            deep().parse(wire),
            Err(TruthError::InvalidIndexTotal { .. })
        ));
    }

    #[test]
    fn custom_scheme_and_payload_param() {
        let settings = UrlSettings {
            scheme: "tally".into(),
            payload_param: "p".into(),
            ..UrlSettings::default()
        };
        let envelope: UrlEnvelope = UrlEnvelope::new(
            &EnvelopeSettings::new("BAL", "v2"),
            &EnvelopeSettings::default(),
            settings,
        );
        let wire = envelope.header("X", 1, 2, "zz").expect("header");
        assert_eq!(wire, "tally://v2/BAL/X/1/2?p=zz");
        assert_eq!(envelope.parse(&wire).expect("parse"), Frame::new("X", 1, 2, "zz"));
    }
}
