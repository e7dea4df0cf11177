use anyhow::Context;
use cache::CacheConfig;
use net::HttpConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stream::ConsumerConfig;

/// Settings read from `livepatch.toml`. Every section and field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub generator: GeneratorSection,
    pub cache: CacheSection,
    pub stream: StreamSection,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorSection {
    pub endpoint: String,
    pub connect_timeout_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            endpoint: http.endpoint,
            connect_timeout_ms: http.connect_timeout.as_millis() as u64,
            user_agent: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl_secs: u64,
    pub max_entries: usize,
    /// Byte budget for stored entries; `None` leaves the directory unbounded.
    pub quota_bytes: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            enabled: true,
            dir: PathBuf::from(".livepatch-cache"),
            ttl_secs: defaults.ttl.as_secs(),
            max_entries: defaults.max_entries,
            quota_bytes: Some(5 * 1024 * 1024),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSection {
    pub read_buffer_bytes: usize,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            read_buffer_bytes: ConsumerConfig::default().read_buffer_bytes,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)
                .with_context(|| format!("invalid config file {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to read config file {}", path.display()))
            }
        }
    }

    pub fn http(&self) -> HttpConfig {
        let mut http = HttpConfig {
            endpoint: self.generator.endpoint.clone(),
            connect_timeout: Duration::from_millis(self.generator.connect_timeout_ms),
            ..HttpConfig::default()
        };
        if let Some(agent) = &self.generator.user_agent {
            http.user_agent = agent.clone();
        }
        http
    }

    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            max_entries: self.cache.max_entries,
        }
    }

    pub fn consumer(&self) -> ConsumerConfig {
        ConsumerConfig {
            read_buffer_bytes: self.stream.read_buffer_bytes.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.http().endpoint, HttpConfig::default().endpoint);
        assert_eq!(config.cache(), CacheConfig::default());
        assert_eq!(config.consumer(), ConsumerConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml(
            r#"
            [generator]
            endpoint = "https://gen.example.com/v1/generate"
            connect_timeout_ms = 2500
            user_agent = "bakery-site/2"

            [cache]
            dir = "/tmp/lp"
            ttl_secs = 60
            max_entries = 3
            quota_bytes = 4096

            [stream]
            read_buffer_bytes = 0
            "#,
        )
        .unwrap();

        let http = config.http();
        assert_eq!(http.endpoint, "https://gen.example.com/v1/generate");
        assert_eq!(http.connect_timeout, Duration::from_millis(2500));
        assert_eq!(http.user_agent, "bakery-site/2");
        assert_eq!(
            config.cache(),
            CacheConfig {
                ttl: Duration::from_secs(60),
                max_entries: 3,
            }
        );
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/lp"));
        assert_eq!(config.cache.quota_bytes, Some(4096));
        assert!(config.cache.enabled);
        assert_eq!(config.consumer().read_buffer_bytes, 1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("[cache]\nttl = 5\n").is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
