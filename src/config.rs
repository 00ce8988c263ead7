use crate::thresholds::Thresholds;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Starting values for the five admin-tunable thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            thresholds: Thresholds::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SWAPDECK_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SWAPDECK_THRESHOLDS__MAX_MEETING_EDITS, etc.)
            .add_source(
                Environment::with_prefix("SWAPDECK")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.thresholds.max_incomplete_trades == 0 {
            errors.push("max_incomplete_trades must be at least 1".to_string());
        }

        if self.thresholds.max_weekly_transactions == 0 {
            errors.push("max_weekly_transactions must be at least 1".to_string());
        }

        if self.thresholds.max_meeting_late_days < 1 {
            errors.push("max_meeting_late_days must be at least 1".to_string());
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => errors.push(format!("unknown log level: {other}")),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
