//! Daemon configuration from `CONTACTSYNC_*` environment variables

use anyhow::{anyhow, Context, Result};
use contactsync_api_rpc::RpcServerConfig;
use contactsync_core::application::{KeylessPolicy, PipelineConfig, ReconcileOptions, RetryPolicy};
use contactsync_infra_notion::NotionConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_UPLOAD_DIR: &str = "~/.contactsync/uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub rpc: RpcServerConfig,
    pub upload_dir: PathBuf,
    pub pipeline: PipelineConfig,
    pub notion: NotionConfig,
    pub log_format: LogFormat,
    /// Daily rolling log file directory, when set
    pub log_dir: Option<PathBuf>,
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = PipelineConfig::default();
        let notion_defaults = NotionConfig::default();

        let rpc = RpcServerConfig {
            host: lookup("CONTACTSYNC_RPC_HOST").unwrap_or_else(|| RpcServerConfig::default().host),
            port: parsed(&lookup, "CONTACTSYNC_RPC_PORT", RpcServerConfig::default().port)?,
        };

        let upload_dir = lookup("CONTACTSYNC_UPLOAD_DIR")
            .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string());
        let upload_dir = PathBuf::from(shellexpand::tilde(&upload_dir).into_owned());

        let queue_capacity: usize = parsed(&lookup, "CONTACTSYNC_QUEUE_CAPACITY", defaults.queue_capacity)?;
        if queue_capacity == 0 {
            return Err(anyhow!("CONTACTSYNC_QUEUE_CAPACITY must be at least 1"));
        }
        let max_attempts = parsed(
            &lookup,
            "CONTACTSYNC_MAX_ATTEMPTS",
            defaults.retry_policy.max_attempts,
        )?;
        let base_delay_ms = parsed(
            &lookup,
            "CONTACTSYNC_RETRY_BASE_DELAY_MS",
            defaults.retry_policy.base_delay.as_millis() as u64,
        )?;
        let sync_timeout = parsed(
            &lookup,
            "CONTACTSYNC_SYNC_TIMEOUT_SECS",
            defaults.sync_timeout.as_secs(),
        )?;
        let session_ttl = parsed(
            &lookup,
            "CONTACTSYNC_SESSION_TTL_SECS",
            defaults.session_ttl.as_secs(),
        )?;
        let watchdog_interval = parsed(
            &lookup,
            "CONTACTSYNC_WATCHDOG_INTERVAL_SECS",
            defaults.watchdog_interval.as_secs(),
        )?;
        let keyless: KeylessPolicy = parsed(&lookup, "CONTACTSYNC_KEYLESS_POLICY", KeylessPolicy::Skip)?;

        let pipeline = PipelineConfig {
            queue_capacity,
            retry_policy: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
            reconcile: ReconcileOptions { keyless },
            sync_timeout: Duration::from_secs(sync_timeout),
            session_ttl: Duration::from_secs(session_ttl),
            watchdog_interval: Duration::from_secs(watchdog_interval.max(1)),
            ..defaults
        };

        let notion = NotionConfig {
            base_url: lookup("CONTACTSYNC_NOTION_BASE_URL").unwrap_or(notion_defaults.base_url),
            timeout: Duration::from_secs(parsed(
                &lookup,
                "CONTACTSYNC_HTTP_TIMEOUT_SECS",
                notion_defaults.timeout.as_secs(),
            )?),
            ..notion_defaults
        };

        let log_format = match lookup("CONTACTSYNC_LOG_FORMAT")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let log_dir = lookup("CONTACTSYNC_LOG_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()));

        Ok(Self {
            rpc,
            upload_dir,
            pipeline,
            notion,
            log_format,
            log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.rpc.host, "127.0.0.1");
        assert_eq!(config.rpc.port, 9630);
        assert!(config.upload_dir.ends_with(".contactsync/uploads"));
        assert!(!config.upload_dir.starts_with("~"));
        assert_eq!(config.pipeline.queue_capacity, 10);
        assert_eq!(config.pipeline.retry_policy.max_attempts, 3);
        assert_eq!(config.pipeline.sync_timeout, Duration::from_secs(600));
        assert_eq!(config.pipeline.session_ttl, Duration::from_secs(900));
        assert_eq!(config.pipeline.reconcile.keyless, KeylessPolicy::Skip);
        assert_eq!(config.notion.base_url, "https://api.notion.com");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("CONTACTSYNC_RPC_PORT", "9999"),
            ("CONTACTSYNC_QUEUE_CAPACITY", "2"),
            ("CONTACTSYNC_MAX_ATTEMPTS", "5"),
            ("CONTACTSYNC_RETRY_BASE_DELAY_MS", "50"),
            ("CONTACTSYNC_KEYLESS_POLICY", "add"),
            ("CONTACTSYNC_NOTION_BASE_URL", "http://localhost:8080"),
            ("CONTACTSYNC_LOG_FORMAT", "json"),
            ("CONTACTSYNC_UPLOAD_DIR", "/tmp/uploads"),
            ("CONTACTSYNC_SESSION_TTL_SECS", "120"),
        ])
        .unwrap();
        assert_eq!(config.rpc.port, 9999);
        assert_eq!(config.pipeline.queue_capacity, 2);
        assert_eq!(config.pipeline.retry_policy.max_attempts, 5);
        assert_eq!(config.pipeline.retry_policy.base_delay, Duration::from_millis(50));
        assert_eq!(config.pipeline.reconcile.keyless, KeylessPolicy::Add);
        assert_eq!(config.notion.base_url, "http://localhost:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.pipeline.session_ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_log_format_ignores_case() {
        for raw in ["JSON", " Json "] {
            let config = config(&[("CONTACTSYNC_LOG_FORMAT", raw)]).unwrap();
            assert_eq!(config.log_format, LogFormat::Json, "{:?}", raw);
        }
        let config = config(&[("CONTACTSYNC_LOG_FORMAT", "text")]).unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = config(&[("CONTACTSYNC_RPC_PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("CONTACTSYNC_RPC_PORT"));

        assert!(config(&[("CONTACTSYNC_QUEUE_CAPACITY", "0")]).is_err());
        assert!(config(&[("CONTACTSYNC_KEYLESS_POLICY", "maybe")]).is_err());
    }
}
