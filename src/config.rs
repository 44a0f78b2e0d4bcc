use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DAY: u64 = 86_400;
const HOUR: u64 = 3_600;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutotrustConfig {
    /// Anchor files maintained with RFC 5011
    pub anchor_files: Vec<PathBuf>,

    /// Time a new key must be seen before it becomes valid (seconds)
    #[serde(deserialize_with = "de_duration")]
    pub add_holddown: u64,

    /// Time a missing key is kept before removal (seconds)
    #[serde(deserialize_with = "de_duration")]
    pub remove_holddown: u64,

    /// Time a revoked key is kept in the file before removal (seconds)
    #[serde(deserialize_with = "de_duration")]
    pub revoke_age: u64,

    /// Lower bound for the probe interval (seconds)
    #[serde(deserialize_with = "de_duration")]
    pub min_query_interval: u64,

    /// Upper bound for the probe interval and the retry backoff (seconds)
    #[serde(deserialize_with = "de_duration")]
    pub max_query_interval: u64,

    /// Retry time before a successful probe established one (seconds)
    #[serde(deserialize_with = "de_duration")]
    pub initial_retry_time: u64,

    /// Number of probes run concurrently by the driver
    pub probe_workers: usize,

    /// Write anchor files back after each probe
    pub write_anchor_files: bool,
}

impl Default for AutotrustConfig {
    fn default() -> Self {
        Self {
            anchor_files: Vec::new(),
            add_holddown: 30 * DAY,
            remove_holddown: 30 * DAY,
            revoke_age: 30 * DAY,
            min_query_interval: HOUR,
            max_query_interval: 15 * DAY,
            initial_retry_time: HOUR,
            probe_workers: 4,
            write_anchor_files: true,
        }
    }
}

impl AutotrustConfig {
    /// Defaults overridden by `AUTOTRUST_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `AUTOTRUST_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(files) = std::env::var("AUTOTRUST_ANCHOR_FILES") {
            self.anchor_files = files
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        let durations: [(&str, &mut u64); 6] = [
            ("AUTOTRUST_ADD_HOLDDOWN", &mut self.add_holddown),
            ("AUTOTRUST_REMOVE_HOLDDOWN", &mut self.remove_holddown),
            ("AUTOTRUST_REVOKE_AGE", &mut self.revoke_age),
            ("AUTOTRUST_MIN_QUERY_INTERVAL", &mut self.min_query_interval),
            ("AUTOTRUST_MAX_QUERY_INTERVAL", &mut self.max_query_interval),
            ("AUTOTRUST_INITIAL_RETRY_TIME", &mut self.initial_retry_time),
        ];
        for (var, field) in durations {
            if let Ok(value) = std::env::var(var) {
                *field = parse_duration(&value)?;
            }
        }

        if let Ok(workers) = std::env::var("AUTOTRUST_PROBE_WORKERS") {
            self.probe_workers = workers
                .parse()
                .map_err(|_| ConfigError::InvalidWorkers(workers.clone()))?;
        }

        if let Ok(write) = std::env::var("AUTOTRUST_WRITE_ANCHOR_FILES") {
            self.write_anchor_files = parse_bool(&write, self.write_anchor_files);
        }

        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("add_holddown", self.add_holddown),
            ("remove_holddown", self.remove_holddown),
            ("revoke_age", self.revoke_age),
            ("min_query_interval", self.min_query_interval),
            ("max_query_interval", self.max_query_interval),
            ("initial_retry_time", self.initial_retry_time),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidDuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.min_query_interval > self.max_query_interval {
            return Err(ConfigError::InvalidInterval(format!(
                "min_query_interval ({}) exceeds max_query_interval ({})",
                self.min_query_interval, self.max_query_interval
            )));
        }

        if self.initial_retry_time > self.max_query_interval {
            return Err(ConfigError::InvalidInterval(format!(
                "initial_retry_time ({}) exceeds max_query_interval ({})",
                self.initial_retry_time, self.max_query_interval
            )));
        }

        if self.probe_workers == 0 || self.probe_workers > 1024 {
            return Err(ConfigError::InvalidWorkers(
                "probe_workers must be between 1 and 1024".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a duration in seconds, with an optional s, m, h, d or w suffix
pub fn parse_duration(s: &str) -> Result<u64, ConfigError> {
    let s = s.trim().to_lowercase();
    let (digits, multiplier) = match s.as_bytes().last() {
        Some(b's') => (&s[..s.len() - 1], 1),
        Some(b'm') => (&s[..s.len() - 1], 60),
        Some(b'h') => (&s[..s.len() - 1], HOUR),
        Some(b'd') => (&s[..s.len() - 1], DAY),
        Some(b'w') => (&s[..s.len() - 1], 7 * DAY),
        _ => (s.as_str(), 1),
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| ConfigError::InvalidDuration(s.clone()))
}

fn de_duration<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(secs),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
