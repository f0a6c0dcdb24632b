//! Runtime configuration from the environment.
//!
//! | variable                  | default                              |
//! |---------------------------|--------------------------------------|
//! | `CADENCE_DB`              | `<config dir>/cadence/cadence.db`    |
//! | `CADENCE_MAX_RETRIES`     | `3`                                  |
//! | `CADENCE_BUSY_TIMEOUT_MS` | `5000`                               |

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SchedError};
use crate::service::DEFAULT_MAX_RETRIES;

pub const DEFAULT_DB_NAME: &str = "cadence.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub const ENV_DB: &str = "CADENCE_DB";
pub const ENV_MAX_RETRIES: &str = "CADENCE_MAX_RETRIES";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CADENCE_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub max_retries: u32,
    pub busy_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup(ENV_DB)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let max_retries = parse_var(&lookup, ENV_MAX_RETRIES)?.unwrap_or(DEFAULT_MAX_RETRIES);
        let busy_timeout_ms: u64 =
            parse_var(&lookup, ENV_BUSY_TIMEOUT_MS)?.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

        Ok(Self {
            db_path,
            max_retries,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        })
    }

    pub fn with_db_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.db_path = path;
        }
        self
    }

    /// Create the database's parent directory if it does not exist yet.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SchedError::Storage(Box::new(e)))?;
            }
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            SchedError::Config(format!(
                "{} must be a non-negative integer, got '{}'",
                key, raw
            ))
        }),
    }
}

fn default_db_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadence")
        .join(DEFAULT_DB_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.db_path.ends_with("cadence/cadence.db"));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.busy_timeout, Duration::from_millis(5_000));
    }

    #[test]
    fn env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_DB, "/tmp/test_cadence.db"),
            (ENV_MAX_RETRIES, "7"),
            (ENV_BUSY_TIMEOUT_MS, " 250 "),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/test_cadence.db"));
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn blank_db_path_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[(ENV_DB, "  ")])).unwrap();
        assert!(config.db_path.ends_with(DEFAULT_DB_NAME));
    }

    #[test]
    fn invalid_number_is_config_error() {
        let err = Config::from_lookup(lookup_from(&[(ENV_MAX_RETRIES, "-1")])).unwrap_err();
        assert!(matches!(err, SchedError::Config(_)));
        assert!(err.to_string().contains(ENV_MAX_RETRIES));
    }

    #[test]
    fn cli_path_takes_precedence() {
        let config = Config::from_lookup(lookup_from(&[(ENV_DB, "/tmp/a.db")]))
            .unwrap()
            .with_db_path(Some(PathBuf::from("/tmp/b.db")));
        assert_eq!(config.db_path, PathBuf::from("/tmp/b.db"));

        let config = config.with_db_path(None);
        assert_eq!(config.db_path, PathBuf::from("/tmp/b.db"));
    }
}
