use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a control-plane user password with Argon2id.
///
/// Salt is generated per call, so hashing the same password twice yields
/// different strings; use [`verify_password`] for comparisons.
pub fn hash_password(password: &str) -> Result<String, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored hash; true on match.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(password_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("mySecurePassword123").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("mySecurePassword123", &hash));
        assert!(!verify_password("wrongPassword", &hash));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let hash1 = hash_password("mySecurePassword123").unwrap();
        let hash2 = hash_password("mySecurePassword123").unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("mySecurePassword123", &hash1));
        assert!(verify_password("mySecurePassword123", &hash2));
    }

    #[test]
    fn test_garbage_hash_fails_verification() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
    }
}
