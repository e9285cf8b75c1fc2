use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::logger::LogConfig;

pub const LISTEN_ADDRESS: &str = "PROXY_LISTEN_ADDRESS";
pub const REQUEST_TIMEOUT_MS: &str = "PROXY_REQUEST_TIMEOUT_MS";
pub const MAX_FRAME_BYTES: &str = "PROXY_MAX_FRAME_BYTES";
pub const LOG_LEVEL: &str = "PROXY_LOG_LEVEL";
pub const LOG_DIR: &str = "PROXY_LOG_DIR";
pub const OTEL_ENDPOINT: &str = "PROXY_OTEL_ENDPOINT";

/// A read-only key/value source of settings.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
}

/// Process environment, backed by a `.env` file for keys the environment
/// does not set.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    file: HashMap<String, String>,
}

impl EnvConfig {
    pub fn new(env_file: &Path) -> Self {
        if !env_file.exists() {
            return Self::default();
        }
        let entries = match dotenvy::from_path_iter(env_file) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("could not load .env from {}: {err}", env_file.display());
                return Self::default();
            }
        };
        let mut file = HashMap::new();
        for entry in entries {
            match entry {
                Ok((key, value)) => {
                    file.insert(key, value);
                }
                Err(err) => warn!("skipping .env line in {}: {err}", env_file.display()),
            }
        }
        info!("Loaded .env from {}", env_file.display());
        Self { file }
    }
}

#[async_trait]
impl ConfigSource for EnvConfig {
    async fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().or_else(|| self.file.get(key).cloned())
    }
}

/// Fixed settings, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    map: HashMap<String, String>,
}

impl MapConfig {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { map }
    }
}

#[async_trait]
impl ConfigSource for MapConfig {
    async fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }
}

/// Everything the proxy needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub listen_address: String,
    /// Deadline for proxy to library requests.
    pub request_timeout: Duration,
    pub max_frame_bytes: usize,
    pub log: LogConfig,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:5000".to_string(),
            request_timeout: Duration::from_secs(30),
            max_frame_bytes: 16 * 1024 * 1024,
            log: LogConfig::default(),
        }
    }
}

impl ProxySettings {
    /// Reads the `PROXY_*` keys, falling back to defaults for missing or
    /// unparseable values.
    pub async fn load(source: &dyn ConfigSource) -> Self {
        let defaults = Self::default();
        Self {
            listen_address: source.get(LISTEN_ADDRESS).await.unwrap_or(defaults.listen_address),
            request_timeout: parsed(source, REQUEST_TIMEOUT_MS)
                .await
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            max_frame_bytes: parsed(source, MAX_FRAME_BYTES)
                .await
                .unwrap_or(defaults.max_frame_bytes),
            log: LogConfig {
                log_level: source.get(LOG_LEVEL).await.unwrap_or(defaults.log.log_level),
                log_dir: source.get(LOG_DIR).await.filter(|d| !d.is_empty()).map(PathBuf::from),
                otel_endpoint: source.get(OTEL_ENDPOINT).await.filter(|e| !e.is_empty()),
            },
        }
    }
}

async fn parsed<T: FromStr>(source: &dyn ConfigSource, key: &str) -> Option<T> {
    let raw = source.get(key).await?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::write;
    use tempfile::tempdir;

    #[tokio::test]
    async fn env_file_fills_in_keys_the_environment_lacks() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        write(&env_path, "CADENCE_PROXY_TEST_API_KEY=abc123\n# comment\n").unwrap();

        let config = EnvConfig::new(&env_path);
        assert_eq!(
            config.get("CADENCE_PROXY_TEST_API_KEY").await,
            Some("abc123".to_string())
        );
        // reading the file leaves the process environment alone
        assert!(env::var("CADENCE_PROXY_TEST_API_KEY").is_err());
        assert_eq!(config.get("CADENCE_PROXY_TEST_MISSING").await, None);
    }

    #[tokio::test]
    async fn environment_wins_over_the_env_file() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        write(&env_path, "CARGO_PKG_NAME=from-file\n").unwrap();

        // cargo exports the package name to test processes
        let expected = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "from-file".to_string());
        let config = EnvConfig::new(&env_path);
        assert_eq!(config.get("CARGO_PKG_NAME").await, Some(expected));
    }

    #[tokio::test]
    async fn missing_env_file_is_empty() {
        let dir = tempdir().unwrap();
        let config = EnvConfig::new(&dir.path().join("absent.env"));
        assert!(config.file.is_empty());
    }

    #[tokio::test]
    async fn settings_fall_back_to_defaults() {
        let config = MapConfig::default();
        assert_eq!(ProxySettings::load(&config).await, ProxySettings::default());
    }

    #[tokio::test]
    async fn settings_read_proxy_keys() {
        let config = MapConfig::from_pairs([
            (LISTEN_ADDRESS, "0.0.0.0:7000"),
            (REQUEST_TIMEOUT_MS, "250"),
            (MAX_FRAME_BYTES, "not-a-number"),
            (LOG_LEVEL, "debug"),
            (LOG_DIR, "/var/log/proxy"),
            (OTEL_ENDPOINT, ""),
        ]);
        let settings = ProxySettings::load(&config).await;
        assert_eq!(settings.listen_address, "0.0.0.0:7000");
        assert_eq!(settings.request_timeout, Duration::from_millis(250));
        assert_eq!(settings.max_frame_bytes, ProxySettings::default().max_frame_bytes);
        assert_eq!(settings.log.log_level, "debug");
        assert_eq!(settings.log.log_dir, Some(PathBuf::from("/var/log/proxy")));
        assert_eq!(settings.log.otel_endpoint, None);
    }
}
