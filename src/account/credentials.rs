/// Password hashing and verification
use crate::error::{AppError, AppResult};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Passwords need at least six characters and one digit
pub fn validate_password_strength(raw: &str) -> AppResult<()> {
    if raw.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if !raw.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Password must contain at least one number".to_string(),
        ));
    }

    Ok(())
}

/// Hash a password into an argon2id PHC string
pub fn hash_password(raw: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored hash.
///
/// Fails closed: no stored hash or an unparseable one never verifies.
pub fn verify_password(stored: Option<&str>, raw: &str) -> bool {
    let Some(stored) = stored else {
        return false;
    };

    let parsed = match PasswordHash::new(stored) {
        Ok(p) => p,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}

/// Hash to persist when setting a password.
///
/// Returns `None` when `candidate` is the stored hash itself, so re-saving
/// an account never double-hashes its password.
pub fn hash_for_update(candidate: &str, stored: Option<&str>) -> AppResult<Option<String>> {
    if stored == Some(candidate) {
        return Ok(None);
    }

    hash_password(candidate).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("secret123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("secret123"));
        assert!(verify_password(Some(&hash), "secret123"));
        assert!(!verify_password(Some(&hash), "secret124"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("secret123").unwrap();
        let b = hash_password("secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_fails_closed() {
        assert!(!verify_password(None, "anything1"));
        assert!(!verify_password(Some("not-a-phc-string"), "anything1"));
        assert!(!verify_password(Some(""), ""));
    }

    #[test]
    fn test_hash_for_update_skips_stored_hash() {
        let hash = hash_password("secret123").unwrap();

        assert_eq!(hash_for_update(&hash, Some(&hash)).unwrap(), None);

        let updated = hash_for_update("newpass1", Some(&hash)).unwrap().unwrap();
        assert!(verify_password(Some(&updated), "newpass1"));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("abc12").is_err());
        assert!(validate_password_strength("abcdef").is_err());
        assert!(validate_password_strength("abcde1").is_ok());
    }
}
