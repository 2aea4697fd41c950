use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Pre-compiled pattern for `EnvFilter` directive strings (compiled once at first use)
static LOG_DIRECTIVE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_:=,\.\-\[\]\{\}\s]+$").unwrap());

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub scheduler: Option<SchedulerSection>,
    #[serde(default)]
    pub cache: Option<CacheSection>,
    #[serde(default)]
    pub storage: Option<StorageSection>,
    #[serde(default)]
    pub recognition: Option<RecognitionSection>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SchedulerSection {
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    #[serde(default)]
    pub eviction_interval_secs: Option<u64>,
    #[serde(default)]
    pub status_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CacheSection {
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub assets_directory: Option<String>,
    #[serde(default)]
    pub output_directory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecognitionSection {
    #[serde(default)]
    pub min_confidence: Option<f32>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub recognition: RecognitionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub max_concurrent: usize,
    /// Zero disables the per-job timeout.
    pub job_timeout_secs: u64,
    pub eviction_interval_secs: u64,
    pub status_interval_secs: u64,
}

impl SchedulerConfig {
    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[inline]
    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }

    #[inline]
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    #[inline]
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheConfig {
    pub max_age_secs: u64,
}

impl CacheConfig {
    #[inline]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageConfig {
    pub assets_directory: String,
    pub output_directory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionConfig {
    pub min_confidence: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            scheduler: SchedulerConfig {
                interval_secs: 5,
                max_concurrent: 3,
                job_timeout_secs: 300,
                eviction_interval_secs: 600,
                status_interval_secs: 60,
            },
            cache: CacheConfig { max_age_secs: 3600 },
            storage: StorageConfig {
                assets_directory: "./assets".to_string(),
                output_directory: "./composites".to_string(),
            },
            recognition: RecognitionConfig {
                min_confidence: 0.5,
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    let bytes = s.as_bytes();
    match bytes {
        b"1" | b"true" | b"TRUE" | b"True" | b"yes" | b"YES" | b"Yes" | b"y" | b"Y" => Ok(true),
        b"0" | b"false" | b"FALSE" | b"False" | b"no" | b"NO" | b"No" | b"n" | b"N" => Ok(false),
        _ => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Ok(true),
            "false" | "no" | "n" => Ok(false),
            _ => Err(()),
        },
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        apply_raw(&mut cfg, raw);
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw(cfg: &mut Config, raw: RawConfigFile) {
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
    if let Some(s) = raw.scheduler {
        apply_opt!(cfg.scheduler.interval_secs, s.interval_secs);
        apply_opt!(cfg.scheduler.max_concurrent, s.max_concurrent);
        apply_opt!(cfg.scheduler.job_timeout_secs, s.job_timeout_secs);
        apply_opt!(cfg.scheduler.eviction_interval_secs, s.eviction_interval_secs);
        apply_opt!(cfg.scheduler.status_interval_secs, s.status_interval_secs);
    }
    if let Some(cache) = raw.cache {
        apply_opt!(cfg.cache.max_age_secs, cache.max_age_secs);
    }
    if let Some(storage) = raw.storage {
        apply_opt!(cfg.storage.assets_directory, storage.assets_directory);
        apply_opt!(cfg.storage.output_directory, storage.output_directory);
    }
    if let Some(r) = raw.recognition {
        apply_opt!(cfg.recognition.min_confidence, r.min_confidence);
    }
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Logging
    if let Some(v) = env_str("COLLAGE_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("COLLAGE_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Scheduler
    if let Some(v) = env_parse::<u64>("COLLAGE_SCHEDULER_INTERVAL_SECS")? {
        cfg.scheduler.interval_secs = v;
    }
    if let Some(v) = env_parse::<usize>("COLLAGE_SCHEDULER_MAX_CONCURRENT")? {
        cfg.scheduler.max_concurrent = v;
    }
    if let Some(v) = env_parse::<u64>("COLLAGE_SCHEDULER_JOB_TIMEOUT_SECS")? {
        cfg.scheduler.job_timeout_secs = v;
    }
    if let Some(v) = env_parse::<u64>("COLLAGE_SCHEDULER_EVICTION_INTERVAL_SECS")? {
        cfg.scheduler.eviction_interval_secs = v;
    }
    if let Some(v) = env_parse::<u64>("COLLAGE_SCHEDULER_STATUS_INTERVAL_SECS")? {
        cfg.scheduler.status_interval_secs = v;
    }

    // Cache
    if let Some(v) = env_parse::<u64>("COLLAGE_CACHE_MAX_AGE_SECS")? {
        cfg.cache.max_age_secs = v;
    }

    // Storage
    if let Some(v) = env_str("COLLAGE_ASSETS_DIRECTORY") {
        cfg.storage.assets_directory = v;
    }
    if let Some(v) = env_str("COLLAGE_OUTPUT_DIRECTORY") {
        cfg.storage.output_directory = v;
    }

    // Recognition
    if let Some(v) = env_parse::<f32>("COLLAGE_RECOGNITION_MIN_CONFIDENCE")? {
        cfg.recognition.min_confidence = v;
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.logging.level.trim().is_empty() || !LOG_DIRECTIVE_REGEX.is_match(&cfg.logging.level) {
        return Err(ConfigError::Validation(format!(
            "invalid logging.level: {:?}",
            cfg.logging.level
        )));
    }

    if cfg.scheduler.interval_secs == 0 {
        return Err(ConfigError::Validation(
            "scheduler.interval_secs must be > 0".into(),
        ));
    }
    if cfg.scheduler.max_concurrent == 0 {
        return Err(ConfigError::Validation(
            "scheduler.max_concurrent must be > 0".into(),
        ));
    }
    if cfg.scheduler.eviction_interval_secs == 0 || cfg.scheduler.status_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "scheduler cadence intervals must be > 0".into(),
        ));
    }

    if cfg.storage.assets_directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.assets_directory must not be empty".into(),
        ));
    }
    if cfg.storage.output_directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.output_directory must not be empty".into(),
        ));
    }

    let confidence = cfg.recognition.min_confidence;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ConfigError::Validation(format!(
            "recognition.min_confidence must be within [0, 1], got {}",
            confidence
        )));
    }

    Ok(())
}
