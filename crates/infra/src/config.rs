//! Configuration loading and representation.
//!
//! Everything comes from `CONNECTOR_*` environment variables with defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use connector_jobs::JobsConfig;

pub const BIND_ADDR: &str = "CONNECTOR_BIND_ADDR";
pub const MAX_CONCURRENT: &str = "CONNECTOR_MAX_CONCURRENT";
pub const JOB_TIMEOUT_SECS: &str = "CONNECTOR_JOB_TIMEOUT_SECS";
pub const RESULT_TTL_SECS: &str = "CONNECTOR_RESULT_TTL_SECS";
pub const SWEEP_INTERVAL_SECS: &str = "CONNECTOR_SWEEP_INTERVAL_SECS";
pub const RESOURCE_DIR: &str = "CONNECTOR_RESOURCE_DIR";
pub const DATASET: &str = "CONNECTOR_DATASET";
pub const QUERY_DELAY_MS: &str = "CONNECTOR_QUERY_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            message: message.into(),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub bind_addr: SocketAddr,
    pub jobs: JobsConfig,
    /// Directory holding `config.json`, `schema.xml` and `charting-schemes.xml`
    pub resource_dir: PathBuf,
    /// Dataset served by the built-in query capability
    pub dataset: Option<PathBuf>,
    /// Simulated latency of the built-in query capability
    pub query_delay: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jobs: JobsConfig::default(),
            resource_dir: PathBuf::from("resources"),
            dataset: None,
            query_delay: Duration::ZERO,
        }
    }
}

impl ConnectorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get(BIND_ADDR) {
            Some(raw) => parse(BIND_ADDR, &raw)?,
            None => defaults.bind_addr,
        };

        let max_concurrent = match get(MAX_CONCURRENT) {
            Some(raw) => parse::<usize>(MAX_CONCURRENT, &raw)?,
            None => defaults.jobs.executor.max_concurrent,
        };
        if max_concurrent == 0 {
            return Err(ConfigError::invalid(MAX_CONCURRENT, "must be at least 1"));
        }

        // Zero disables the timeout.
        let job_timeout = match get(JOB_TIMEOUT_SECS) {
            Some(raw) => Some(parse::<u64>(JOB_TIMEOUT_SECS, &raw)?)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            None => defaults.jobs.executor.job_timeout,
        };

        let result_ttl = match get(RESULT_TTL_SECS) {
            Some(raw) => Duration::from_secs(parse(RESULT_TTL_SECS, &raw)?),
            None => defaults.jobs.result_ttl,
        };

        let sweep_interval = match get(SWEEP_INTERVAL_SECS) {
            Some(raw) => Duration::from_secs(parse(SWEEP_INTERVAL_SECS, &raw)?),
            None => defaults.jobs.sweep_interval,
        };
        if sweep_interval.is_zero() {
            return Err(ConfigError::invalid(SWEEP_INTERVAL_SECS, "must be at least 1"));
        }

        let query_delay = match get(QUERY_DELAY_MS) {
            Some(raw) => Duration::from_millis(parse(QUERY_DELAY_MS, &raw)?),
            None => defaults.query_delay,
        };

        Ok(Self {
            bind_addr,
            jobs: defaults
                .jobs
                .with_max_concurrent(max_concurrent)
                .with_job_timeout(job_timeout)
                .with_result_ttl(result_ttl)
                .with_sweep_interval(sweep_interval),
            resource_dir: get(RESOURCE_DIR).map(PathBuf::from).unwrap_or(defaults.resource_dir),
            dataset: get(DATASET).map(PathBuf::from),
            query_delay,
        })
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::invalid(var, format!("{raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ConnectorConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConnectorConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.jobs.executor.max_concurrent, 4);
        assert_eq!(config.jobs.executor.job_timeout, None);
        assert_eq!(config.jobs.result_ttl, Duration::from_secs(300));
        assert_eq!(config.jobs.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.resource_dir, PathBuf::from("resources"));
        assert!(config.dataset.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            (BIND_ADDR, "127.0.0.1:9000"),
            (MAX_CONCURRENT, "8"),
            (JOB_TIMEOUT_SECS, "120"),
            (RESULT_TTL_SECS, "60"),
            (SWEEP_INTERVAL_SECS, "5"),
            (DATASET, "/data/people.json"),
            (QUERY_DELAY_MS, "250"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.jobs.executor.max_concurrent, 8);
        assert_eq!(config.jobs.executor.job_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.jobs.result_ttl, Duration::from_secs(60));
        assert_eq!(config.jobs.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.dataset, Some(PathBuf::from("/data/people.json")));
        assert_eq!(config.query_delay, Duration::from_millis(250));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = load(&[(JOB_TIMEOUT_SECS, "0")]).unwrap();
        assert_eq!(config.jobs.executor.job_timeout, None);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[(MAX_CONCURRENT, "lots")]).unwrap_err();
        assert!(err.to_string().contains(MAX_CONCURRENT));

        let err = load(&[(MAX_CONCURRENT, "0")]).unwrap_err();
        assert_eq!(err, ConfigError::invalid(MAX_CONCURRENT, "must be at least 1"));

        let err = load(&[(SWEEP_INTERVAL_SECS, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == SWEEP_INTERVAL_SECS));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[(RESULT_TTL_SECS, "  ")]).unwrap();
        assert_eq!(config.jobs.result_ttl, Duration::from_secs(300));
    }
}
