// Configuration management with layered configuration (file, env)

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub railway: RailwayConfig,
    pub telegram: TelegramConfig,
    pub scheduler: SchedulerSettings,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RailwayConfig {
    pub base_url: String,
    /// XSRF token expected by the e-ticket API
    pub api_token: String,
    pub timeout_seconds: u64,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "uz".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_telegram_api")]
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub tick_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub check_timeout_seconds: u64,
    pub max_concurrent_checks: usize,
    pub error_backoff_seconds: u64,
    pub shutdown_grace_seconds: u64,
    pub timezone: String,
}

impl SchedulerSettings {
    pub fn timezone(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| format!("Invalid scheduler timezone '{}': {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default = "default_json_logs")]
    pub json_logs: bool,
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_json_logs() -> bool {
    true
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let defaults = Config::try_from(&Settings::default())?;

        let builder = Config::builder()
            // Start with built-in defaults
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.railway.base_url.is_empty() {
            return Err("Railway base_url cannot be empty".to_string());
        }
        if self.railway.api_token.is_empty() {
            return Err("Railway api_token cannot be empty".to_string());
        }
        if self.railway.timeout_seconds == 0 {
            return Err("Railway timeout_seconds must be greater than 0".to_string());
        }

        if self.telegram.bot_token.is_empty() {
            return Err("Telegram bot_token cannot be empty".to_string());
        }

        let scheduler = &self.scheduler;
        if scheduler.tick_seconds == 0 {
            return Err("Scheduler tick_seconds must be greater than 0".to_string());
        }
        if scheduler.cleanup_interval_seconds < scheduler.tick_seconds {
            return Err("Scheduler cleanup_interval_seconds must not be shorter than the tick".to_string());
        }
        if scheduler.max_concurrent_checks == 0 {
            return Err("Scheduler max_concurrent_checks must be greater than 0".to_string());
        }
        if scheduler.check_timeout_seconds == 0 {
            return Err("Scheduler check_timeout_seconds must be greater than 0".to_string());
        }
        if scheduler.check_timeout_seconds >= scheduler.shutdown_grace_seconds {
            return Err(
                "Scheduler check_timeout_seconds must be shorter than shutdown_grace_seconds"
                    .to_string(),
            );
        }
        scheduler.timezone()?;

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/railwatch".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_seconds: 30,
            },
            railway: RailwayConfig {
                base_url: "https://e-ticket.railway.uz".to_string(),
                api_token: String::new(),
                timeout_seconds: 15,
                language: default_language(),
            },
            telegram: TelegramConfig {
                bot_token: String::new(),
                api_base_url: default_telegram_api(),
                timeout_seconds: 10,
            },
            scheduler: SchedulerSettings {
                tick_seconds: 30,
                cleanup_interval_seconds: 3600,
                check_timeout_seconds: 20,
                max_concurrent_checks: 8,
                error_backoff_seconds: 60,
                shutdown_grace_seconds: 30,
                timezone: "Asia/Tashkent".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: default_json_logs(),
                metrics_port: None,
            },
        }
    }
}
