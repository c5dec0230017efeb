use std::path::PathBuf;

use crate::db::DEFAULT_LOG_CAPACITY;
use crate::error::AppError;

/// Runtime settings, read from the environment (and `.env` via dotenv)
///
/// | Variable | Default |
/// |---|---|
/// | `MASTERY_DATA_DIR` | `./data` |
/// | `MASTERY_LOG_DIR` | `./logs` |
/// | `MASTERY_LATENCY_MS` | `0` |
/// | `MASTERY_ACTIVITY_LOG_CAPACITY` | `200` |
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub latency_ms: u64,
    pub activity_log_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("./data"),
            log_dir: PathBuf::from("./logs"),
            latency_ms: 0,
            activity_log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl Config {
    pub fn init() -> Result<Config, AppError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Config, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let data_dir = lookup("MASTERY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let log_dir = lookup("MASTERY_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);
        let latency_ms = match lookup("MASTERY_LATENCY_MS") {
            Some(raw) => parse_number("MASTERY_LATENCY_MS", &raw)?,
            None => defaults.latency_ms,
        };
        let activity_log_capacity = match lookup("MASTERY_ACTIVITY_LOG_CAPACITY") {
            Some(raw) => parse_number("MASTERY_ACTIVITY_LOG_CAPACITY", &raw)?,
            None => defaults.activity_log_capacity,
        };

        Ok(Config {
            data_dir,
            log_dir,
            latency_ms,
            activity_log_capacity,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::malformed_input(format!("{} must be a whole number, got {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_keys_fall_back_to_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])).unwrap(), Config::default());
    }

    #[test]
    fn values_are_read_and_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("MASTERY_DATA_DIR", "/var/lib/mastery"),
            ("MASTERY_LATENCY_MS", " 800 "),
            ("MASTERY_ACTIVITY_LOG_CAPACITY", "50"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/mastery"));
        assert_eq!(config.latency_ms, 800);
        assert_eq!(config.activity_log_capacity, 50);
    }

    #[test]
    fn garbage_number_is_malformed_input() {
        let err = Config::from_lookup(lookup(&[("MASTERY_LATENCY_MS", "slow")])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);
    }
}
