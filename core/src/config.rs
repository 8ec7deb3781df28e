//! Client configuration.

use serde::{Deserialize, Serialize};

/// Environment variable read by [`ClientConfig::from_env`].
pub const API_URL_ENV: &str = "FORMDESK_API_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Where the API lives and which headers every request carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Merged into every request after `content-type` and before any
    /// per-call headers.
    #[serde(default)]
    pub default_headers: Vec<(String, String)>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Build a config from `FORMDESK_API_URL`, falling back to
    /// `http://localhost:3000`.
    pub fn from_env() -> Self {
        Self::from_api_url(std::env::var(API_URL_ENV).ok())
    }

    fn from_api_url(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Self::new(url),
            _ => Self::default(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url, "http://localhost:3000");
    }

    #[test]
    fn deserializes_headers_as_pairs() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url":"https://api.example.com","default_headers":[["x-client","web"]]}"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(
            config.default_headers,
            vec![("x-client".to_string(), "web".to_string())]
        );
    }

    #[test]
    fn api_url_overrides_default() {
        let config = ClientConfig::from_api_url(Some("https://forms.example.com/api".to_string()));
        assert_eq!(config.base_url, "https://forms.example.com/api");
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn missing_or_blank_api_url_falls_back() {
        assert_eq!(ClientConfig::from_api_url(None), ClientConfig::default());
        assert_eq!(ClientConfig::from_api_url(Some("  ".to_string())), ClientConfig::default());
    }

    #[test]
    fn with_header_appends() {
        let config = ClientConfig::new("http://api").with_header("x-a", "1").with_header("x-b", "2");
        assert_eq!(config.default_headers.len(), 2);
        assert_eq!(config.default_headers[1].0, "x-b");
    }
}
