//! Password and token hashing, and the short codes used to reset a forgotten password.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::Rng;

use crate::identity::User;
use crate::{CoreError, CoreResult};

pub fn hash_secret(secret: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::InternalError(format!("hashing failed: {}", e)))
}

pub fn verify_secret(secret: &str, hash: &str) -> CoreResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| CoreError::InternalError(format!("stored hash is unreadable: {}", e)))?;
    Ok(Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok())
}

/// A freshly issued six digit reset code. Only its hash is stored.
#[derive(Debug, Clone)]
pub struct ResetCode {
    pub code: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetCode {
    pub fn issue(now: DateTime<Utc>, valid_for_minutes: i64) -> CoreResult<Self> {
        let code = format!("{:06}", OsRng.gen_range(0..1_000_000));
        let hash = hash_secret(&code)?;
        Ok(Self {
            code,
            hash,
            expires_at: now + Duration::minutes(valid_for_minutes),
        })
    }

    pub fn attach(&self, user: &mut User) {
        user.reset_code_hash = Some(self.hash.clone());
        user.reset_code_expires_at = Some(self.expires_at);
        user.reset_attempts = 0;
    }
}

/// Wrong codes tolerated before the pending code is thrown away.
pub const MAX_RESET_ATTEMPTS: i32 = 5;

/// Checks a submitted reset code against the one pending on `user`. A wrong code counts
/// against the user and the pending code is dropped once `MAX_RESET_ATTEMPTS` is reached,
/// so the caller must persist `user` on failure too.
pub fn check_reset_code(user: &mut User, code: &str, now: DateTime<Utc>) -> CoreResult<()> {
    let (hash, expires_at) = match (&user.reset_code_hash, user.reset_code_expires_at) {
        (Some(hash), Some(expires_at)) => (hash, expires_at),
        _ => return Err(CoreError::ValidationError("Invalid or expired reset code".into())),
    };
    if now > expires_at {
        return Err(CoreError::ValidationError("Reset code has expired".into()));
    }
    if !verify_secret(code, hash)? {
        user.reset_attempts += 1;
        if user.reset_attempts >= MAX_RESET_ATTEMPTS {
            clear_reset_code(user);
            return Err(CoreError::ValidationError(
                "Too many invalid attempts; request a new reset code".into(),
            ));
        }
        return Err(CoreError::ValidationError("Invalid reset code".into()));
    }
    Ok(())
}

pub fn clear_reset_code(user: &mut User) {
    user.reset_code_hash = None;
    user.reset_code_expires_at = None;
    user.reset_attempts = 0;
}
