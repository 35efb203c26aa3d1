use serde::Deserialize;
use service_core::config::{get_env, get_env_parsed};
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub port: u16,
    pub log_level: String,
    pub allowed_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub target: TargetDefaults,
    pub limits: QueryLimits,
    pub password_policy: PasswordPolicyConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string of the master catalog database.
    pub master_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Base64-encoded 32-byte AES-256-GCM key for the crypto vault.
    pub encryption_key: String,
    /// Process-wide salt appended to API keys before hashing.
    pub api_key_salt: String,
}

/// Defaults used when composing admin connection strings for target clusters.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetDefaults {
    pub host: Option<String>,
    pub port: u16,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub ssl_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryLimits {
    pub max_query_time_seconds: u64,
    pub max_rows_per_query: i64,
    pub default_page_size: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicyConfig {
    pub expiry_days: i64,
    pub reset_token_expiry_hours: i64,
    /// How many previous hashes a new password is checked against.
    pub history_depth: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender_email: Option<String>,
    pub sender_name: String,
    /// Base URL embedded in reset links sent to users.
    pub public_base_url: String,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let config = AccessConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("access-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            port: get_env_parsed("PORT", 8080u16, is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            database: DatabaseConfig {
                master_url: get_env("MASTER_DB_URL", None, is_prod)?,
                max_connections: get_env_parsed("MAX_POOL_SIZE", 5u32, is_prod)?,
                min_connections: get_env_parsed("MIN_POOL_SIZE", 1u32, is_prod)?,
            },
            security: SecurityConfig {
                encryption_key: get_env("ENCRYPTION_KEY", None, is_prod)?,
                api_key_salt: get_env("API_KEY_SALT", None, is_prod)?,
            },
            target: TargetDefaults {
                host: env::var("TARGET_DB_HOST").ok(),
                port: get_env_parsed("TARGET_DB_PORT", 5432u16, is_prod)?,
                admin_username: env::var("TARGET_DB_ADMIN_USER").ok(),
                admin_password: env::var("TARGET_DB_ADMIN_PASSWORD").ok(),
                ssl_mode: get_env("TARGET_DB_SSL_MODE", Some("require"), is_prod)?,
            },
            limits: QueryLimits {
                max_query_time_seconds: get_env_parsed("MAX_QUERY_TIME_SECONDS", 30u64, is_prod)?,
                max_rows_per_query: get_env_parsed("MAX_ROWS_PER_QUERY", 10_000i64, is_prod)?,
                default_page_size: get_env_parsed("DEFAULT_PAGE_SIZE", 100i64, is_prod)?,
            },
            password_policy: PasswordPolicyConfig {
                expiry_days: get_env_parsed("PASSWORD_EXPIRY_DAYS", 90i64, is_prod)?,
                reset_token_expiry_hours: get_env_parsed(
                    "PASSWORD_RESET_TOKEN_EXPIRY_HOURS",
                    24i64,
                    is_prod,
                )?,
                history_depth: get_env_parsed("PASSWORD_HISTORY_DEPTH", 5i64, is_prod)?,
            },
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").ok(),
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                sender_email: env::var("SMTP_SENDER_EMAIL").ok(),
                sender_name: get_env("SMTP_SENDER_NAME", Some("Vibe Access"), is_prod)?,
                public_base_url: get_env(
                    "PUBLIC_BASE_URL",
                    Some("http://localhost:8080"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.limits.max_query_time_seconds == 0 || self.limits.max_query_time_seconds > 60 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAX_QUERY_TIME_SECONDS must be between 1 and 60"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MIN_POOL_SIZE must not exceed MAX_POOL_SIZE"
            )));
        }

        if self.password_policy.expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PASSWORD_EXPIRY_DAYS must be positive"
            )));
        }

        if self.environment == Environment::Prod
            && self.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }

    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.limits.max_query_time_seconds)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("DEV".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn timeout_cap_is_enforced() {
        let mut config = test_config();
        config.limits.max_query_time_seconds = 90;
        assert!(config.validate().is_err());
        config.limits.max_query_time_seconds = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn prod_rejects_wildcard_origin() {
        let mut config = test_config();
        config.environment = Environment::Prod;
        config.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    fn test_config() -> AccessConfig {
        AccessConfig {
            environment: Environment::Dev,
            service_name: "access-service".into(),
            service_version: "0.0.0".into(),
            port: 8080,
            log_level: "info".into(),
            allowed_origins: vec!["http://localhost:3000".into()],
            database: DatabaseConfig {
                master_url: "postgres://localhost/master_db".into(),
                max_connections: 5,
                min_connections: 1,
            },
            security: SecurityConfig {
                encryption_key: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".into(),
                api_key_salt: "salt".into(),
            },
            target: TargetDefaults {
                host: None,
                port: 5432,
                admin_username: None,
                admin_password: None,
                ssl_mode: "require".into(),
            },
            limits: QueryLimits {
                max_query_time_seconds: 30,
                max_rows_per_query: 10_000,
                default_page_size: 100,
            },
            password_policy: PasswordPolicyConfig {
                expiry_days: 90,
                reset_token_expiry_hours: 24,
                history_depth: 5,
            },
            smtp: SmtpConfig {
                host: None,
                username: None,
                password: None,
                sender_email: None,
                sender_name: "Vibe Access".into(),
                public_base_url: "http://localhost:8080".into(),
            },
        }
    }
}
