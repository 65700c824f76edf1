//! # Simulator Configuration
//!
//! Rate limits, retry policy, furnace timing, clock pacing and the local
//! fleet are read from a single TOML file. Every key is optional; missing
//! keys take the defaults below.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! seed = 42
//!
//! [limits]
//! default_quota = 20
//! catalog_quota = 8
//! period_ms = 1000
//!
//! [retry]
//! max_attempts = 10
//! initial_backoff_ms = 100
//! max_backoff_ms = 2000
//!
//! [furnace]
//! measurement_interval_secs = 5.0
//! min_idle_secs = 20.0
//! idle_rate = 0.0333
//!
//! [clock]
//! realtime = true
//! factor = 1.0
//! strict = false
//!
//! [fleet]
//! model_id = "furnace"
//!
//! [[fleet.assets]]
//! name = "Furnace 1"
//! setpoint = 760.0
//! ```

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration file read when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "furnace.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the simulator.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub furnace: FurnaceConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    /// Master seed for every random draw; a random seed is chosen (and
    /// logged) when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Outbound call quotas, shared by every furnace.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_quota")]
    pub default_quota: u32,
    /// Quota for catalog listing, which the platform treats as heavier.
    #[serde(default = "default_catalog_quota")]
    pub catalog_quota: u32,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

impl LimitsConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_quota: default_quota(),
            catalog_quota: default_catalog_quota(),
            period_ms: default_period_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per call, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Furnace timing, in virtual seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FurnaceConfig {
    #[serde(default = "default_measurement_interval")]
    pub measurement_interval_secs: f64,
    #[serde(default = "default_min_idle")]
    pub min_idle_secs: f64,
    /// Rate of the exponential idle-time draw, per second.
    #[serde(default = "default_idle_rate")]
    pub idle_rate: f64,
}

impl FurnaceConfig {
    pub fn measurement_interval(&self) -> Duration {
        Duration::from_secs_f64(self.measurement_interval_secs)
    }

    pub fn min_idle(&self) -> Duration {
        Duration::from_secs_f64(self.min_idle_secs)
    }
}

impl Default for FurnaceConfig {
    fn default() -> Self {
        Self {
            measurement_interval_secs: default_measurement_interval(),
            min_idle_secs: default_min_idle(),
            idle_rate: default_idle_rate(),
        }
    }
}

/// Pacing of virtual time against the wall clock.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClockConfig {
    /// When false the clock advances as fast as the furnaces can be stepped.
    #[serde(default = "default_realtime")]
    pub realtime: bool,
    /// Real seconds per virtual second.
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Fail instead of catching up when the simulation falls behind.
    #[serde(default)]
    pub strict: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            realtime: default_realtime(),
            factor: default_factor(),
            strict: false,
        }
    }
}

/// Assets served by the in-process platform.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FleetConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub assets: Vec<FleetAsset>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            page_size: default_page_size(),
            assets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FleetAsset {
    pub name: String,
    /// Fixed asset id; a random UUID is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Current Setpoint value; the furnace falls back to 1000 when absent.
    #[serde(default)]
    pub setpoint: Option<f64>,
}

impl Config {
    /// Reject values the simulator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.limits.default_quota == 0 || self.limits.catalog_quota == 0 {
            return invalid("limits quotas must be at least 1");
        }
        if self.limits.period_ms == 0 {
            return invalid("limits.period_ms must be positive");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return invalid("retry.initial_backoff_ms must not exceed retry.max_backoff_ms");
        }
        if !positive(self.furnace.measurement_interval_secs) {
            return invalid("furnace.measurement_interval_secs must be positive");
        }
        if !(self.furnace.min_idle_secs.is_finite() && self.furnace.min_idle_secs >= 0.0) {
            return invalid("furnace.min_idle_secs must not be negative");
        }
        if !positive(self.furnace.idle_rate) {
            return invalid("furnace.idle_rate must be positive");
        }
        if !positive(self.clock.factor) {
            return invalid("clock.factor must be positive");
        }
        if self.fleet.page_size == 0 {
            return invalid("fleet.page_size must be at least 1");
        }
        if let Some(asset) = self
            .fleet
            .assets
            .iter()
            .find(|a| a.setpoint.is_some_and(|s| !positive(s)))
        {
            return Err(ConfigError::Invalid(format!(
                "fleet asset '{}' has a non-positive setpoint",
                asset.name
            )));
        }
        Ok(())
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// Load and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields [`Config::default`].
/// Any other read, parse or validation failure is still an error.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    match load_config(path) {
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(Config::default())
        }
        other => other,
    }
}

fn default_quota() -> u32 {
    20
}
fn default_catalog_quota() -> u32 {
    8
}
fn default_period_ms() -> u64 {
    1000
}
fn default_max_attempts() -> u32 {
    10
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    2000
}
fn default_measurement_interval() -> f64 {
    5.0
}
fn default_min_idle() -> f64 {
    20.0
}
fn default_idle_rate() -> f64 {
    1.0 / 30.0
}
fn default_realtime() -> bool {
    true
}
fn default_factor() -> f64 {
    1.0
}
fn default_model_id() -> String {
    "furnace".to_string()
}
fn default_page_size() -> usize {
    250
}
