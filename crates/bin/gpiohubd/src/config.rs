//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `gpiohub.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.

use chrono::FixedOffset;
use serde::Deserialize;

use gpiohub_adapter_gpio::{Backend, DEFAULT_SYSFS_ROOT};
use gpiohub_app::scheduler::SchedulerSettings;
use gpiohub_domain::pin::Polarity;

const MINUTES_PER_DAY: i32 = 24 * 60;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Output line settings.
    pub gpio: GpioConfig,
    /// Scheduler tuning.
    pub scheduler: SchedulerConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub backend: Backend,
    /// Relay boards switch on when the line is pulled low.
    pub active_low: bool,
    /// Root of the sysfs GPIO tree, only read by the `sysfs` backend.
    pub sysfs_root: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How late a firing may start before it is skipped.
    pub misfire_grace_seconds: i64,
    /// Offset from UTC that cron expressions are evaluated in.
    pub utc_offset_minutes: i32,
}

impl Config {
    /// Load configuration from `gpiohub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("gpiohub.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("GPIOHUB_HOST") {
            self.server.host = val;
        }
        if let Some(val) = var("GPIOHUB_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("GPIOHUB_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = var("GPIOHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("GPIOHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("GPIOHUB_GPIO_BACKEND") {
            self.gpio.backend = val.parse().map_err(ConfigError::Validation)?;
        }
        if let Some(val) = var("GPIOHUB_ACTIVE_LOW") {
            let val = val.trim();
            self.gpio.active_low = val == "1" || val.eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.scheduler.misfire_grace_seconds < 0 {
            return Err(ConfigError::Validation(
                "misfire_grace_seconds must not be negative".to_string(),
            ));
        }
        if self.scheduler.utc_offset_minutes.abs() >= MINUTES_PER_DAY {
            return Err(ConfigError::Validation(format!(
                "utc_offset_minutes must be within ±{MINUTES_PER_DAY}, got {}",
                self.scheduler.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn polarity(&self) -> Polarity {
        Polarity::from_active_low(self.gpio.active_low)
    }

    /// Scheduler settings derived from the `[scheduler]` section.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the UTC offset is out of range.
    pub fn scheduler_settings(&self) -> Result<SchedulerSettings, ConfigError> {
        let minutes = self.scheduler.utc_offset_minutes;
        let utc_offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
            ConfigError::Validation(format!("utc_offset_minutes out of range: {minutes}"))
        })?;
        Ok(SchedulerSettings {
            misfire_grace: chrono::Duration::seconds(self.scheduler.misfire_grace_seconds.max(0)),
            utc_offset,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:gpiohub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "gpiohubd=info,gpiohub=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            active_low: true,
            sysfs_root: DEFAULT_SYSFS_ROOT.to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            misfire_grace_seconds: 30,
            utc_offset_minutes: 0,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
