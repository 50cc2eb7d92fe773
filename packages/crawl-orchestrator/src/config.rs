use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub service_url: String,
    pub database_url: String,
    pub output_dir: PathBuf,
    pub request_timeout: Duration,
    pub sync_concurrency: usize,
    pub sync_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:5000".to_string(),
            database_url: "sqlite://crawl_sessions.db?mode=rwc".to_string(),
            output_dir: PathBuf::from("./crawl_output"),
            request_timeout: Duration::from_secs(30),
            sync_concurrency: 4,
            sync_interval: Duration::from_secs(15),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let sync_concurrency = match lookup("CRAWL_SYNC_CONCURRENCY") {
            Some(raw) => raw
                .parse()
                .context("CRAWL_SYNC_CONCURRENCY must be a valid number")?,
            None => defaults.sync_concurrency,
        };
        if sync_concurrency == 0 {
            bail!("CRAWL_SYNC_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            service_url: lookup("CRAWL_SERVICE_URL").unwrap_or(defaults.service_url),
            database_url: lookup("CRAWL_DATABASE_URL").unwrap_or(defaults.database_url),
            output_dir: lookup("CRAWL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            request_timeout: seconds(&lookup, "CRAWL_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            sync_concurrency,
            sync_interval: seconds(&lookup, "CRAWL_SYNC_INTERVAL_SECS", defaults.sync_interval)?,
        })
    }
}

fn seconds<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{key} must be a valid number of seconds"))?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<OrchestratorConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OrchestratorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.service_url, "http://localhost:5000");
        assert_eq!(config.sync_concurrency, 4);
        assert_eq!(config.sync_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CRAWL_SERVICE_URL", "http://crawler:8000"),
            ("CRAWL_SYNC_CONCURRENCY", "8"),
            ("CRAWL_REQUEST_TIMEOUT_SECS", "5"),
            ("CRAWL_OUTPUT_DIR", "/var/crawls"),
        ])
        .unwrap();
        assert_eq!(config.service_url, "http://crawler:8000");
        assert_eq!(config.sync_concurrency, 8);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.output_dir, PathBuf::from("/var/crawls"));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(config_from(&[("CRAWL_SYNC_CONCURRENCY", "many")]).is_err());
        assert!(config_from(&[("CRAWL_SYNC_CONCURRENCY", "0")]).is_err());
        assert!(config_from(&[("CRAWL_SYNC_INTERVAL_SECS", "-1")]).is_err());
    }
}
