//! Argon2id password hashing (PHC string format).

use std::sync::LazyLock;

use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::debug;
use uuid::Uuid;

/// Verified against when the account does not exist, so unknown emails
/// cost the same argon2 work as wrong passwords.
static PLACEHOLDER_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("slotwise placeholder password").unwrap_or_default());

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    // A v4 UUID carries 122 random bits, plenty for a salt.
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes()).map_err(|e| anyhow!("salt encoding failed: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC hash. A malformed hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Check a login attempt. With no stored hash the password is still run
/// through argon2 against a placeholder and the attempt always fails.
pub fn verify_login(password: &str, stored_hash: Option<&str>) -> bool {
    match stored_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            debug!("no such account; verifying against placeholder hash");
            let _ = verify_password(password, &PLACEHOLDER_HASH);
            false
        }
    }
}

/// Run [`hash_password`] off the async runtime.
pub async fn hash_password_blocking(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// Run [`verify_login`] off the async runtime.
pub async fn verify_login_blocking(password: String, stored_hash: Option<String>) -> anyhow::Result<bool> {
    let span = tracing::Span::current();
    Ok(tokio::task::spawn_blocking(move || span.in_scope(|| verify_login(&password, stored_hash.as_deref()))).await?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("Correct horse battery staple", &hash));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn garbage_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn placeholder_is_a_real_argon2id_hash() {
        let parsed = PasswordHash::new(&PLACEHOLDER_HASH).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(verify_password("slotwise placeholder password", &PLACEHOLDER_HASH));
    }

    #[test]
    fn missing_account_never_logs_in() {
        assert!(!verify_login("slotwise placeholder password", None));
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_login("hunter22", Some(&hash)));
        assert!(!verify_login("hunter23", Some(&hash)));
    }
}
