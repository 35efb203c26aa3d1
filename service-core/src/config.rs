//! Environment-variable configuration helpers.

use crate::error::AppError;
use std::env;

/// Read an environment variable with an optional default.
///
/// In production every variable without a default is mandatory; in dev the
/// default (when present) is used so the service starts with a bare `.env`.
pub fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

/// Parse an env var into any `FromStr` type, falling back to a default.
pub fn get_env_parsed<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + ToString,
{
    let raw = get_env(key, Some(&default.to_string()), is_prod)?;
    raw.parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!(format!("{} has an invalid value: {}", key, raw)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_used_when_unset_in_dev() {
        let val = get_env("SERVICE_CORE_TEST_UNSET_VAR", Some("fallback"), false).unwrap();
        assert_eq!(val, "fallback");
    }

    #[test]
    fn missing_without_default_errors() {
        assert!(get_env("SERVICE_CORE_TEST_UNSET_VAR2", None, false).is_err());
    }

    #[test]
    fn prod_rejects_unset_even_with_default() {
        assert!(get_env("SERVICE_CORE_TEST_UNSET_VAR3", Some("x"), true).is_err());
    }

    #[test]
    fn parsed_values_round_trip() {
        let n: u16 = get_env_parsed("SERVICE_CORE_TEST_UNSET_PORT", 8080u16, false).unwrap();
        assert_eq!(n, 8080);
    }
}
