//! Dossier API client configuration.
//!
//! Points at a single dossier service. Override via environment variables
//! or explicit construction for staging and tests.

use url::Url;

/// Default service URL for local development.
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for connecting to the dossier service.
///
/// Custom `Debug` implementation redacts the `api_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the dossier service.
    pub base_url: Url,
    /// Bearer token, `role:actor_uuid[:expires]:secret`.
    pub api_token: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Build a configuration from an explicit URL and token.
    pub fn new(base_url: &str, api_token: impl Into<String>) -> Result<Self, ConfigError> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(Self {
            base_url: parse_url("base_url", base_url)?,
            api_token,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `DOSSIER_API_URL` (default: `http://127.0.0.1:8080`)
    /// - `DOSSIER_API_TOKEN` (required)
    /// - `DOSSIER_API_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_token = lookup("DOSSIER_API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let raw_url = lookup("DOSSIER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            base_url: parse_url("DOSSIER_API_URL", &raw_url)?,
            api_token,
            timeout_secs: lookup("DOSSIER_API_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Override the request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs.max(1);
        self
    }
}

fn parse_url(what: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(what.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(
            what.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DOSSIER_API_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let cfg = ClientConfig::from_lookup(lookup(&[("DOSSIER_API_TOKEN", "exporter:x:y")])).unwrap();
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn token_is_required() {
        let err = ClientConfig::from_lookup(lookup(&[("DOSSIER_API_URL", "http://h")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));
        assert!(ClientConfig::new("http://h", "  ").is_err());
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[
            ("DOSSIER_API_TOKEN", "t"),
            ("DOSSIER_API_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(ref var, _) if var == "DOSSIER_API_URL"));
        assert!(ClientConfig::new("ftp://files.example", "t").is_err());
    }

    #[test]
    fn bad_timeout_falls_back() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("DOSSIER_API_TOKEN", "t"),
            ("DOSSIER_API_TIMEOUT_SECS", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = ClientConfig::new("https://dossier.example", "exporter:abc:topsecret").unwrap();
        let out = format!("{cfg:?}");
        assert!(!out.contains("topsecret"));
        assert!(out.contains("[REDACTED]"));
    }
}
