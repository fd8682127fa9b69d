use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub monitor: MonitorSettings,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between scheduler ticks.
    pub check_interval_secs: u64,
    /// Upper bound on a single page fetch.
    pub request_timeout_secs: u64,
    /// Sleep before retrying after a whole-tick failure.
    pub error_retry_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    pub use_tls: bool,
}

impl MonitorSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "RESTOCK"
            .add_source(Environment::with_prefix("RESTOCK").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".into(),
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message("Database url must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.monitor.check_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Monitor check_interval_secs must be greater than 0".into(),
            ));
        }

        if self.monitor.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Monitor request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.monitor.error_retry_secs == 0 {
            return Err(ConfigError::Message(
                "Monitor error_retry_secs must be greater than 0".into(),
            ));
        }

        if self.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                url: "sqlite:restock_watcher.db".to_string(),
                max_connections: 5,
                acquire_timeout: 30,
            },
            monitor: MonitorSettings {
                check_interval_secs: 300,
                request_timeout_secs: 10,
                error_retry_secs: 30,
                user_agent: "RestockWatcher/1.0".to_string(),
            },
            smtp: SmtpConfig {
                host: "smtp.gmail.com".to_string(),
                port: 587,
                username: None,
                password: None,
                from_address: None,
                from_name: "Restock Watcher".to_string(),
                use_tls: true,
            },
        }
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = valid_config();
        config.server.port = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("port must be greater than 0")
        );
    }

    #[test]
    fn test_config_validation_empty_database_url() {
        let mut config = valid_config();
        config.database.url = "  ".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("url must not be empty"));
    }

    #[test]
    fn test_config_validation_zero_interval() {
        let mut config = valid_config();
        config.monitor.check_interval_secs = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("check_interval_secs")
        );
    }

    #[test]
    fn test_config_validation_zero_request_timeout() {
        let mut config = valid_config();
        config.monitor.request_timeout_secs = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_smtp_port() {
        let mut config = valid_config();
        config.smtp.port = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("SMTP port"));
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = valid_config();
        assert_eq!(config.monitor.request_timeout(), Duration::from_secs(10));
    }
}
