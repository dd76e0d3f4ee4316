use serde::Deserialize;
use std::path::Path;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the directory holding news.json, sources.json and update.txt
    pub api_base: String,
    /// Refresh interval in minutes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_export_prefix")]
    pub export_prefix: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Minimum vertical swipe, in pixels, that triggers a pull-down refresh
    #[serde(default = "default_pull_refresh_threshold")]
    pub pull_refresh_threshold: u32,
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_export_prefix() -> String {
    "news".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_pull_refresh_threshold() -> u32 {
    100
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let base = Url::parse(&self.api_base)
            .map_err(|e| anyhow::anyhow!("invalid api_base '{}': {}", self.api_base, e))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("api_base '{}' cannot be used as a base URL", self.api_base);
        }
        if self.refresh_interval == 0 {
            anyhow::bail!("refresh_interval must be at least one minute");
        }
        Ok(())
    }

    /// `api_base` with a trailing slash, so relative joins stay inside it
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        let base = format!("{}/", self.api_base.trim_end_matches('/'));
        Ok(Url::parse(&base)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::from_str(r#"api_base = "https://example.com/api""#).unwrap();

        assert_eq!(config.refresh_interval, 5);
        assert_eq!(config.request_timeout, 30);
        assert_eq!(config.export_prefix, "news");
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.pull_refresh_threshold, 100);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            api_base = "https://example.github.io/economy/api"
            refresh_interval = 10
            request_timeout = 5
            export_prefix = "economy-news"
            bind_address = "127.0.0.1:8080"
            pull_refresh_threshold = 120
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.api_base, "https://example.github.io/economy/api");
        assert_eq!(config.refresh_interval, 10);
        assert_eq!(config.request_timeout, 5);
        assert_eq!(config.export_prefix, "economy-news");
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.pull_refresh_threshold, 120);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/newsdesk.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"this is not valid toml {{{").unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_api_base() {
        let result = Config::from_str("refresh_interval = 5");
        assert!(result.is_err());
    }

    #[test]
    fn test_relative_api_base_rejected() {
        let result = Config::from_str(r#"api_base = "api""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_refresh_interval_rejected() {
        let content = r#"
            api_base = "https://example.com/api"
            refresh_interval = 0
        "#;
        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_api_base_url_gets_trailing_slash() {
        let config = Config::from_str(r#"api_base = "https://example.com/api""#).unwrap();
        let base = config.api_base_url().unwrap();
        assert_eq!(base.as_str(), "https://example.com/api/");
        assert_eq!(
            base.join("news.json").unwrap().as_str(),
            "https://example.com/api/news.json"
        );
    }

    #[test]
    fn test_api_base_url_keeps_single_slash() {
        let config = Config::from_str(r#"api_base = "https://example.com/api/""#).unwrap();
        assert_eq!(
            config.api_base_url().unwrap().as_str(),
            "https://example.com/api/"
        );
    }
}
