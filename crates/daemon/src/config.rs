//! Agent configuration from environment variables
//!
//! | variable | default |
//! |---|---|
//! | `HOSTMON_LOG_FORMAT` | `pretty` (`json` for structured output) |
//! | `HOSTMON_LOG_DIR` | unset (no log file) |
//! | `HOSTMON_STEP_SECS` | `30` |
//! | `HOSTMON_FLUSH_SECS` | `0` (discovery refresh disabled) |
//! | `HOSTMON_JMX_LOCAL_ATTACH` | `false` |
//! | `HOSTMON_JMX_USER` / `HOSTMON_JMX_PASSWORD` | unset |
//! | `HOSTMON_JMX_SERVERS` | unset |
//! | `HOSTMON_PING_TARGETS` | unset |
//! | `HOSTMON_ACTIVATION` | `auto` |

use anyhow::{Context, Result};
use std::path::PathBuf;

use hostmon_core::application::ConnectionCacheConfig;
use hostmon_core::domain::ActivationPolicy;
use hostmon_core::port::Credentials;
use hostmon_infra_system::BoundedExecutorConfig;

const DEFAULT_STEP_SECS: u32 = 30;
const DEFAULT_FLUSH_SECS: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
    pub step_secs: u32,
    pub flush_secs: u32,
    pub jmx_local_attach: bool,
    pub credentials: Option<Credentials>,
    /// Comma-separated display-name identifiers
    pub jmx_servers: Option<String>,
    pub ping_targets: Vec<String>,
    pub activation: ActivationPolicy,
    pub executor: BoundedExecutorConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let log_format = match get("HOSTMON_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let log_dir = get("HOSTMON_LOG_DIR")
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()));

        let step_secs = parse_or(get("HOSTMON_STEP_SECS"), DEFAULT_STEP_SECS)
            .context("HOSTMON_STEP_SECS must be a number of seconds")?;
        let flush_secs = parse_or(get("HOSTMON_FLUSH_SECS"), DEFAULT_FLUSH_SECS)
            .context("HOSTMON_FLUSH_SECS must be a number of seconds")?;
        let jmx_local_attach = parse_or(get("HOSTMON_JMX_LOCAL_ATTACH"), false)
            .context("HOSTMON_JMX_LOCAL_ATTACH must be true or false")?;

        let credentials = match (get("HOSTMON_JMX_USER"), get("HOSTMON_JMX_PASSWORD")) {
            (Some(user), Some(password)) => Some(Credentials::new(user, password)),
            (Some(user), None) => Some(Credentials::new(user, "")),
            _ => None,
        };

        let ping_targets = get("HOSTMON_PING_TARGETS")
            .map(|targets| {
                targets
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let activation = match get("HOSTMON_ACTIVATION") {
            Some(policy) => policy
                .parse::<ActivationPolicy>()
                .context("HOSTMON_ACTIVATION must be auto or force")?,
            None => ActivationPolicy::Auto,
        };

        Ok(Self {
            log_format,
            log_dir,
            step_secs,
            flush_secs,
            jmx_local_attach,
            credentials,
            jmx_servers: get("HOSTMON_JMX_SERVERS"),
            ping_targets,
            activation,
            executor: BoundedExecutorConfig::default(),
        })
    }

    pub fn cache_config(&self) -> ConnectionCacheConfig {
        ConnectionCacheConfig {
            local_attach: self.jmx_local_attach,
            ..ConnectionCacheConfig::default()
        }
    }
}

fn parse_or<T>(value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => Ok(v.parse()?),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AgentConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = tokio_test::assert_ok!(config(&[]));

        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.step_secs, 30);
        assert_eq!(cfg.flush_secs, 0);
        assert!(!cfg.jmx_local_attach);
        assert!(cfg.credentials.is_none());
        assert!(cfg.jmx_servers.is_none());
        assert!(cfg.ping_targets.is_empty());
        assert_eq!(cfg.activation, ActivationPolicy::Auto);
        assert_eq!(cfg.executor.max_workers, 200);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("HOSTMON_LOG_FORMAT", "json"),
            ("HOSTMON_STEP_SECS", "60"),
            ("HOSTMON_FLUSH_SECS", "300"),
            ("HOSTMON_JMX_LOCAL_ATTACH", "true"),
            ("HOSTMON_JMX_USER", "monitor"),
            ("HOSTMON_JMX_PASSWORD", "secret"),
            ("HOSTMON_JMX_SERVERS", "logstash,kafka"),
            ("HOSTMON_PING_TARGETS", "10.0.0.1, ,10.0.0.2"),
            ("HOSTMON_ACTIVATION", "force"),
        ])
        .unwrap();

        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.step_secs, 60);
        assert_eq!(cfg.flush_secs, 300);
        assert!(cfg.cache_config().local_attach);
        assert_eq!(cfg.credentials, Some(Credentials::new("monitor", "secret")));
        assert_eq!(cfg.jmx_servers.as_deref(), Some("logstash,kafka"));
        assert_eq!(cfg.ping_targets, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(cfg.activation, ActivationPolicy::Force);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        assert!(config(&[("HOSTMON_STEP_SECS", "soon")]).is_err());
        assert!(config(&[("HOSTMON_ACTIVATION", "sometimes")]).is_err());
    }

    #[test]
    fn test_log_dir_expands_tilde() {
        let cfg = config(&[("HOSTMON_LOG_DIR", "~/hostmon-logs")]).unwrap();
        let dir = cfg.log_dir.unwrap();
        assert!(dir.ends_with("hostmon-logs"));
        assert!(!dir.starts_with("~"));
    }
}
