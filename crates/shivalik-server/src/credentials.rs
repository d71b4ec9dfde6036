//! Password hashing behind a small trait, so the store only ever sees an
//! opaque credential string.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::error::ServerError;

pub trait CredentialHasher: Send + Sync {
    /// Produce the opaque credential stored for `password`.
    fn hash(&self, password: &str) -> Result<String, ServerError>;

    /// Check `password` against a credential produced by [`CredentialHasher::hash`].
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// Argon2id with a random salt, stored as a PHC string
/// (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`).
///
/// Verification reads the cost parameters back from the stored string, so
/// raising the cost only affects new credentials.
#[derive(Debug, Clone)]
pub struct Argon2CredentialHasher {
    params: Params,
}

impl Default for Argon2CredentialHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2CredentialHasher {
    /// Custom cost: memory in KiB, iterations, lanes.
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, ServerError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| ServerError::Internal(format!("invalid argon2 params: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2CredentialHasher {
    fn hash(&self, password: &str) -> Result<String, ServerError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServerError::Internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> Argon2CredentialHasher {
    Argon2CredentialHasher::with_cost(256, 1, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = cheap_hasher();
        let stored = hasher.hash("hunter2").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(hasher.verify("hunter2", &stored));
        assert!(!hasher.verify("hunter3", &stored));
        assert!(!stored.contains("hunter2"));
    }

    #[test]
    fn salts_differ() {
        let hasher = cheap_hasher();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn verify_uses_stored_cost() {
        let stored = cheap_hasher().hash("pw").unwrap();
        assert!(Argon2CredentialHasher::default().verify("pw", &stored));
    }

    #[test]
    fn malformed_credentials_never_verify() {
        let hasher = cheap_hasher();
        assert!(!hasher.verify("pw", ""));
        assert!(!hasher.verify("pw", "pw"));
        assert!(!hasher.verify("pw", "zz$zz"));
        assert!(!hasher.verify("pw", "$argon2id$v=19$m=256,t=1,p=1$bad"));
    }
}
