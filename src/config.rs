//! Configuration Module
//!
//! Handles the cache spec and the gateway's environment-driven settings.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::AdmissionPolicy;
use crate::error::{GatewayError, Result};

/// Default entry lifetime, also used when the configured one is malformed.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(10);

/// Default ceiling on a stored body.
pub const DEFAULT_MAX_ENTRY_BYTES: u32 = 1024 * 1024;

// == Cache Spec ==
/// Process-wide cache settings, read-only once the cache is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSpec {
    /// Entry lifetime as a duration string, e.g. `"50ms"`, `"1s"`, `"1m 30s"`
    pub expiration: String,
    /// Largest body, in bytes, that will be stored
    pub max_entry_bytes: u32,
    /// Response status codes eligible for storage
    pub codes: Vec<u16>,
    /// Request methods eligible for load and store
    pub methods: Vec<String>,
}

impl Default for CacheSpec {
    fn default() -> Self {
        Self {
            expiration: "10s".to_string(),
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            codes: vec![200],
            methods: vec!["GET".to_string(), "HEAD".to_string()],
        }
    }
}

impl CacheSpec {
    /// Checks the spec before it reaches the cache.
    ///
    /// A malformed `expiration` is deliberately not rejected here; the cache
    /// falls back to [`DEFAULT_EXPIRATION`] instead.
    pub fn validate(&self) -> Result<()> {
        if self.max_entry_bytes == 0 {
            return Err(GatewayError::InvalidConfig(
                "maxEntryBytes must be at least 1".to_string(),
            ));
        }

        if self.codes.is_empty() {
            return Err(GatewayError::InvalidConfig("codes must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for &code in &self.codes {
            if !(100..=599).contains(&code) {
                return Err(GatewayError::InvalidConfig(format!(
                    "{} is not an HTTP status code",
                    code
                )));
            }
            if !seen.insert(code) {
                return Err(GatewayError::InvalidConfig(format!("duplicate code {}", code)));
            }
        }

        if self.methods.is_empty() {
            return Err(GatewayError::InvalidConfig("methods must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for method in &self.methods {
            let Some(canonical) = canonical_method(method) else {
                return Err(GatewayError::InvalidConfig(format!(
                    "{:?} is not an HTTP method",
                    method
                )));
            };
            if !seen.insert(canonical) {
                return Err(GatewayError::InvalidConfig(format!(
                    "duplicate method {}",
                    method
                )));
            }
        }

        Ok(())
    }

    /// Parses the configured expiration.
    pub fn expiration(&self) -> std::result::Result<Duration, humantime::DurationError> {
        humantime::parse_duration(self.expiration.trim())
    }

    /// Parses the configured expiration, falling back to the default.
    pub fn expiration_or_default(&self) -> Duration {
        match self.expiration() {
            Ok(expiration) => expiration,
            Err(err) => {
                warn!(
                    expiration = %self.expiration,
                    error = %err,
                    "invalid cache expiration, using default of {:?}",
                    DEFAULT_EXPIRATION
                );
                DEFAULT_EXPIRATION
            }
        }
    }

    /// Builds the whitelists; entries that do not parse are left out.
    ///
    /// Method names are matched case-insensitively.
    pub fn admission_policy(&self) -> AdmissionPolicy {
        let methods = self
            .methods
            .iter()
            .filter_map(|m| canonical_method(m))
            .collect();
        let codes = self
            .codes
            .iter()
            .filter_map(|&c| StatusCode::from_u16(c).ok())
            .collect();
        AdmissionPolicy::new(methods, codes)
    }
}

// == Gateway Config ==
/// Gateway configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Origin that cache misses are forwarded to
    pub upstream_url: String,
    /// Response cache settings
    pub cache: CacheSpec,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `UPSTREAM_URL` - Origin base URL (default: http://127.0.0.1:8080)
    /// - `CACHE_EXPIRATION` - Entry lifetime (default: 10s)
    /// - `CACHE_MAX_ENTRY_BYTES` - Largest cached body (default: 1048576)
    /// - `CACHE_CODES` - Comma separated status codes (default: 200)
    /// - `CACHE_METHODS` - Comma separated methods (default: GET,HEAD)
    pub fn from_env() -> Self {
        let defaults = CacheSpec::default();

        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            upstream_url: env::var("UPSTREAM_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            cache: CacheSpec {
                expiration: env::var("CACHE_EXPIRATION").unwrap_or(defaults.expiration),
                max_entry_bytes: env::var("CACHE_MAX_ENTRY_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_entry_bytes),
                codes: env::var("CACHE_CODES")
                    .ok()
                    .and_then(|v| parse_list(&v, |s| s.parse().ok()))
                    .unwrap_or(defaults.codes),
                methods: env::var("CACHE_METHODS")
                    .ok()
                    .and_then(|v| parse_list(&v, |s| Some(s.to_ascii_uppercase())))
                    .unwrap_or(defaults.methods),
            },
        }
    }

    /// Validates everything the gateway cannot start without.
    pub fn validate(&self) -> Result<()> {
        if !(self.upstream_url.starts_with("http://") || self.upstream_url.starts_with("https://"))
        {
            return Err(GatewayError::InvalidConfig(format!(
                "upstream url {:?} must be http(s)",
                self.upstream_url
            )));
        }
        self.cache.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            upstream_url: "http://127.0.0.1:8080".to_string(),
            cache: CacheSpec::default(),
        }
    }
}

/// Parses `raw` as a method token in its canonical upper-case form.
fn canonical_method(raw: &str) -> Option<Method> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes()).ok()
}

/// Parses a comma separated list; any bad item discards the whole list.
fn parse_list<T>(raw: &str, parse: impl Fn(&str) -> Option<T>) -> Option<Vec<T>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse)
        .collect::<Option<Vec<T>>>()
        .filter(|items| !items.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> CacheSpec {
        CacheSpec {
            expiration: "1s".to_string(),
            max_entry_bytes: 1024,
            codes: vec![200],
            methods: vec!["GET".to_string()],
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.upstream_url, "http://127.0.0.1:8080");
        assert_eq!(config.cache, CacheSpec::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        for var in [
            "SERVER_PORT",
            "UPSTREAM_URL",
            "CACHE_EXPIRATION",
            "CACHE_MAX_ENTRY_BYTES",
            "CACHE_CODES",
            "CACHE_METHODS",
        ] {
            env::remove_var(var);
        }

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cache, CacheSpec::default());
    }

    #[test]
    fn test_spec_deserialize_camel_case() {
        let json = r#"{"expiration":"1s","maxEntryBytes":1024,"codes":[200],"methods":["GET"]}"#;
        let parsed: CacheSpec = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, spec());
    }

    #[test]
    fn test_spec_validate_ok() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn test_spec_validate_rejects_bad_values() {
        let cases = [
            CacheSpec { max_entry_bytes: 0, ..spec() },
            CacheSpec { codes: vec![], ..spec() },
            CacheSpec { codes: vec![200, 200], ..spec() },
            CacheSpec { codes: vec![42], ..spec() },
            CacheSpec { methods: vec![], ..spec() },
            CacheSpec { methods: vec!["GET".into(), "GET".into()], ..spec() },
            CacheSpec { methods: vec!["GET".into(), "get".into()], ..spec() },
            CacheSpec { methods: vec!["NOT A METHOD".into()], ..spec() },
        ];
        for case in cases {
            assert!(
                matches!(case.validate(), Err(GatewayError::InvalidConfig(_))),
                "{:?} should be rejected",
                case
            );
        }
    }

    #[test]
    fn test_spec_malformed_expiration_is_not_a_validation_error() {
        let bad = CacheSpec { expiration: "soon".to_string(), ..spec() };
        assert!(bad.validate().is_ok());
        assert!(bad.expiration().is_err());
        assert_eq!(bad.expiration_or_default(), DEFAULT_EXPIRATION);
    }

    #[test]
    fn test_spec_expiration_formats() {
        for (raw, expected) in [
            ("50ms", Duration::from_millis(50)),
            ("1s", Duration::from_secs(1)),
            ("1m 30s", Duration::from_secs(90)),
            ("2h", Duration::from_secs(7200)),
        ] {
            let parsed = CacheSpec { expiration: raw.to_string(), ..spec() };
            assert_eq!(parsed.expiration().unwrap(), expected, "{}", raw);
        }
    }

    #[test]
    fn test_admission_policy_from_spec() {
        let policy = spec().admission_policy();
        assert_eq!(policy.methods(), &[Method::GET]);
        assert_eq!(policy.codes(), &[StatusCode::OK]);
    }

    #[test]
    fn test_admission_policy_normalises_method_case() {
        let lower = CacheSpec { methods: vec!["get".into(), " Head ".into()], ..spec() };
        assert!(lower.validate().is_ok());

        let policy = lower.admission_policy();
        assert_eq!(policy.methods(), &[Method::GET, Method::HEAD]);
        assert!(policy.admits_method(&Method::GET));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("200, 301", |s| s.parse::<u16>().ok()), Some(vec![200, 301]));
        assert_eq!(parse_list("200,abc", |s| s.parse::<u16>().ok()), None);
        assert_eq!(parse_list(" , ", |s| s.parse::<u16>().ok()), None);
    }

    #[test]
    fn test_config_rejects_non_http_upstream() {
        let config = Config {
            upstream_url: "ftp://origin".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
