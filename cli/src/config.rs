//! Configuration management for the binary.

use std::env;
use std::path::PathBuf;

/// Default endpoint of the Diigo v2 API.
pub const DEFAULT_BASE_URL: &str = "https://secure.diigo.com/api/v2";

/// Largest page the service hands out.
pub const MAX_PAGE_SIZE: usize = 100;

/// Configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Diigo API key
    pub api_key: String,
    /// Diigo user name
    pub user: String,
    /// Diigo password, used for basic auth
    pub password: String,
    /// API root, without a trailing slash
    pub base_url: String,
    /// Directory holding the org files
    pub dir: PathBuf,
    /// Records requested per page
    pub page_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let api_key = required("DIIGO_API_KEY")?;
        let user = required("DIIGO_USER")?;
        let password = required("DIIGO_PASSWORD")?;

        let base_url = lookup("DIIGO_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let dir = lookup("MARKSYNC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let page_size = match lookup("MARKSYNC_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|size| (1..=MAX_PAGE_SIZE).contains(size))
                .ok_or(ConfigError::InvalidPageSize(raw))?,
            None => MAX_PAGE_SIZE,
        };

        Ok(Self {
            api_key,
            user,
            password,
            base_url,
            dir,
            page_size,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid MARKSYNC_PAGE_SIZE value {0:?}, expected 1 to 100")]
    InvalidPageSize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        ("DIIGO_API_KEY", "key"),
        ("DIIGO_USER", "alice"),
        ("DIIGO_PASSWORD", "secret"),
    ];

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&CREDENTIALS)).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.dir, PathBuf::from("."));
    }

    #[test]
    fn missing_credentials_are_named() {
        let err = Config::from_lookup(lookup(&CREDENTIALS[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DIIGO_PASSWORD")));
    }

    #[test]
    fn overrides_are_read() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("DIIGO_BASE_URL", "http://localhost:8080/api/"));
        pairs.push(("MARKSYNC_DIR", "/tmp/marks"));
        pairs.push(("MARKSYNC_PAGE_SIZE", "25"));

        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.dir, PathBuf::from("/tmp/marks"));
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn page_size_is_bounded() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("MARKSYNC_PAGE_SIZE", "500"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidPageSize(_))
        ));
    }
}
