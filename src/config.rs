// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact relay.
//!
//! Values are read once at startup: an optional file first, then environment
//! variables prefixed `RELAY__` (nested keys separated by `__`), e.g.
//! `RELAY__RATE_LIMIT__MAX_REQUESTS=3`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Longest admission window accepted (one week).
const MAX_WINDOW_MINUTES: u64 = 7 * 24 * 60;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the contact relay service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path of the submission endpoint (default: /api/contact)
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,

    /// Take the client address from `X-Forwarded-For` (default: false)
    #[serde(default)]
    pub trust_forwarded_for: bool,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub bot_check: BotCheckConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Cross-origin settings for browser clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty means any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// What a submitter's quota is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Client network address
    Ip,
    /// Trimmed, lowercased submitter email
    Email,
}

/// Where admission state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory, exact sliding window
    Memory,
    /// Redis counter with key expiry, fixed window per key
    Redis,
}

/// Admission (rate limiting) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Admissions allowed per identifier within one window (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in minutes (default: 15)
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,

    /// Identifier strategy (default: ip)
    #[serde(default = "default_key_strategy")]
    pub key: KeyStrategy,

    /// Backing store (default: memory)
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Redis connection URL, required when `backend = "redis"`
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Interval between sweeps of stale in-memory entries (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Whether a whitespace-only honeypot value counts as filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoneypotPolicy {
    /// Any non-empty raw value triggers, whitespace included
    Raw,
    /// Only values that are non-empty after trimming trigger
    Trimmed,
}

/// Validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_honeypot_policy")]
    pub honeypot: HoneypotPolicy,
}

/// Bot-score verification configuration. Disabled while `secret` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotCheckConfig {
    #[serde(default)]
    pub secret: Option<String>,

    /// Minimum accepted score (default: 0.5)
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,

    #[serde(default = "default_verify_url")]
    pub verify_url: String,

    /// Reject submissions without a token once a secret is set (default: true)
    #[serde(default = "default_true")]
    pub require_token: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Email provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Sender address
    #[serde(default)]
    pub from: Option<String>,

    /// Recipient address
    #[serde(default)]
    pub to: Option<String>,

    /// Subject line; the submitter's name is appended
    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_endpoint_path() -> String {
    "/api/contact".to_string()
}

fn default_max_requests() -> u32 {
    5
}

fn default_window_minutes() -> u64 {
    15
}

fn default_key_strategy() -> KeyStrategy {
    KeyStrategy::Ip
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_honeypot_policy() -> HoneypotPolicy {
    HoneypotPolicy::Raw
}

fn default_score_threshold() -> f64 {
    0.5
}

fn default_verify_url() -> String {
    "https://www.google.com/recaptcha/api/siteverify".to_string()
}

fn default_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_subject() -> String {
    "New contact form submission".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            endpoint_path: default_endpoint_path(),
            trust_forwarded_for: false,
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            bot_check: BotCheckConfig::default(),
            delivery: DeliveryConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_minutes: default_window_minutes(),
            key: default_key_strategy(),
            backend: default_backend(),
            redis_url: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            honeypot: default_honeypot_policy(),
        }
    }
}

impl Default for BotCheckConfig {
    fn default() -> Self {
        Self {
            secret: None,
            score_threshold: default_score_threshold(),
            verify_url: default_verify_url(),
            require_token: default_true(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            from: None,
            to: None,
            subject: default_subject(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file overlaid with `RELAY__*`
    /// environment variables, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "endpoint_path must start with '/': {}",
                self.endpoint_path
            )));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.max_requests must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.window_minutes == 0 || self.rate_limit.window_minutes > MAX_WINDOW_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.window_minutes must be between 1 and {MAX_WINDOW_MINUTES}"
            )));
        }
        if self.rate_limit.backend == StoreBackend::Redis && self.rate_limit.redis_url.is_none() {
            return Err(ConfigError::Invalid(
                "rate_limit.redis_url is required for the redis backend".to_string(),
            ));
        }
        if self.bot_check.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "bot_check.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.delivery.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "delivery.timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.bot_check.score_threshold) {
            return Err(ConfigError::Invalid(format!(
                "bot_check.score_threshold must be within 0.0..=1.0, got {}",
                self.bot_check.score_threshold
            )));
        }
        Ok(())
    }
}

impl RateLimitConfig {
    /// Get the admission window
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.window_minutes as i64)
    }

    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl BotCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
