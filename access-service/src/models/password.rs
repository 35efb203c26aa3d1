//! Password reset flow request shapes.

use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RequestPasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(custom(function = validate_password_strength))]
    pub new_password: String,
}

/// At least 8 chars with one upper, one lower, and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), validator::ValidationError> {
    if password.len() < 8 {
        return Err(validator::ValidationError::new("password_too_short"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(validator::ValidationError::new("password_needs_uppercase"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(validator::ValidationError::new("password_needs_lowercase"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(validator::ValidationError::new("password_needs_digit"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_strength_rules() {
        assert!(validate_password_strength("Short1").is_err());
        assert!(validate_password_strength("alllowercase1").is_err());
        assert!(validate_password_strength("ALLUPPERCASE1").is_err());
        assert!(validate_password_strength("NoDigitsHere").is_err());
        assert!(validate_password_strength("GoodPass1").is_ok());
    }
}
