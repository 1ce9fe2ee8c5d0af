// config.rs
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{AppError, Result};

/// Longest accepted OTP lifetime (one day).
pub const MAX_OTP_TTL_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailProvider {
    /// Write the code to the service log only.
    Log,
    Http {
        api_url: String,
        api_key: String,
        from: String,
    },
}

#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub ttl_minutes: i64,
    pub max_attempts: i32,
    pub require_on_reset: bool,
}

impl OtpSettings {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_OTP_TTL_MINUTES).contains(&self.ttl_minutes) {
            return Err(AppError::configuration(format!(
                "OTP_TTL_MINUTES must be between 1 and {}, got {}",
                MAX_OTP_TTL_MINUTES, self.ttl_minutes
            )));
        }
        if self.max_attempts < 1 {
            return Err(AppError::configuration("OTP_MAX_ATTEMPTS must be at least 1"));
        }
        Ok(())
    }
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: 5,
            max_attempts: 3,
            require_on_reset: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl DispatchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AppError::configuration("DISPATCH_MAX_ATTEMPTS must be at least 1"));
        }
        Ok(())
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub database_name: String,
    /// `email:password` accounts created at startup by the memory backend.
    pub seed_accounts: Vec<(String, String)>,
    pub bcrypt_cost: u32,
    pub otp: OtpSettings,
    pub mail: MailProvider,
    pub dispatch: DispatchSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let storage = match env_or("STORAGE_BACKEND", "mongodb").as_str() {
            "mongodb" => StorageBackend::MongoDb,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(AppError::configuration(format!(
                    "STORAGE_BACKEND must be 'mongodb' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::MongoDb && database_url.is_none() {
            return Err(AppError::configuration(
                "DATABASE_URL must be set when STORAGE_BACKEND=mongodb",
            ));
        }

        let mail = match env_or("MAIL_PROVIDER", "log").as_str() {
            "log" => MailProvider::Log,
            "http" => MailProvider::Http {
                api_url: required("MAIL_API_URL")?,
                api_key: required("MAIL_API_KEY")?,
                from: required("MAIL_FROM")?,
            },
            other => {
                return Err(AppError::configuration(format!(
                    "MAIL_PROVIDER must be 'log' or 'http', got '{}'",
                    other
                )))
            }
        };

        let config = AppConfig {
            host: env_or("HOST", "0.0.0.0"),
            port: parsed("PORT", 10000)?,
            storage,
            database_url,
            database_name: env_or("DATABASE_NAME", "admin_app"),
            seed_accounts: parse_seed_accounts(&env_or("MEMORY_SEED_ACCOUNTS", ""))?,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            otp: OtpSettings {
                ttl_minutes: parsed("OTP_TTL_MINUTES", 5)?,
                max_attempts: parsed("OTP_MAX_ATTEMPTS", 3)?,
                require_on_reset: parsed("REQUIRE_OTP_ON_RESET", false)?,
            },
            mail,
            dispatch: DispatchSettings {
                max_attempts: parsed("DISPATCH_MAX_ATTEMPTS", 3)?,
                backoff: Duration::from_millis(parsed("DISPATCH_BACKOFF_MS", 500)?),
            },
        };

        config.otp.validate()?;
        config.dispatch.validate()?;

        Ok(config)
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "storage": format!("{:?}", self.storage),
            "database_name": self.database_name,
            "otp_ttl_minutes": self.otp.ttl_minutes,
            "otp_max_attempts": self.otp.max_attempts,
            "require_otp_on_reset": self.otp.require_on_reset,
            "mail_provider": match self.mail {
                MailProvider::Log => "log",
                MailProvider::Http { .. } => "http",
            },
            "port": self.port,
            "host": self.host,
        })
    }
}

pub fn parse_seed_accounts(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((email, password)) if !email.is_empty() && !password.is_empty() => {
                Ok((email.trim().to_lowercase(), password.to_string()))
            }
            _ => Err(AppError::configuration(format!(
                "MEMORY_SEED_ACCOUNTS entry '{}' is not email:password",
                entry
            ))),
        })
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::configuration(format!("{} must be set", key)))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::configuration(format!("{} has an invalid value: '{}'", key, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_accounts_parse_pairs() {
        let accounts = parse_seed_accounts(" Admin@x.com:secret1, b@x.com:pa:ss ").unwrap();
        assert_eq!(
            accounts,
            vec![
                ("admin@x.com".to_string(), "secret1".to_string()),
                ("b@x.com".to_string(), "pa:ss".to_string()),
            ]
        );
    }

    #[test]
    fn empty_seed_list_is_allowed() {
        assert!(parse_seed_accounts("").unwrap().is_empty());
    }

    #[test]
    fn malformed_seed_entry_is_a_configuration_error() {
        let err = parse_seed_accounts("no-password").unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));
    }

    #[test]
    fn defaults_match_reset_policy() {
        let otp = OtpSettings::default();
        assert_eq!(otp.ttl_minutes, 5);
        assert_eq!(otp.max_attempts, 3);
        assert!(!otp.require_on_reset);
        assert_eq!(DispatchSettings::default().max_attempts, 3);
    }

    #[test]
    fn otp_ttl_outside_one_day_is_rejected() {
        for ttl_minutes in [0, -5, MAX_OTP_TTL_MINUTES + 1, i64::MAX] {
            let otp = OtpSettings {
                ttl_minutes,
                ..OtpSettings::default()
            };
            let err = otp.validate().unwrap_err();
            assert!(matches!(err, AppError::ConfigurationError(_)));
        }

        let otp = OtpSettings {
            ttl_minutes: MAX_OTP_TTL_MINUTES,
            ..OtpSettings::default()
        };
        assert!(otp.validate().is_ok());
    }

    #[test]
    fn attempt_budgets_must_be_positive() {
        let otp = OtpSettings {
            max_attempts: 0,
            ..OtpSettings::default()
        };
        assert!(otp.validate().is_err());

        let dispatch = DispatchSettings {
            max_attempts: 0,
            ..DispatchSettings::default()
        };
        assert!(dispatch.validate().is_err());

        assert!(OtpSettings::default().validate().is_ok());
        assert!(DispatchSettings::default().validate().is_ok());
    }
}
