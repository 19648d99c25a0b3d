//! Shared utility functions

use rand::Rng;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Numeric payment reference accepted by every gateway (PayOS needs an integer order code)
pub fn generate_reference() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: i64 = rand::thread_rng().gen_range(0..1000);
    (millis * 1000 + suffix).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_reference_is_numeric() {
        let reference = generate_reference();
        assert!(reference.parse::<i64>().is_ok());
        assert!(reference.len() >= 16);
    }
}
