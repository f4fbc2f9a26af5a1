use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{Error, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::PalisadeError;

/// Memory-hard KDF parameters: 64 MiB, 4 passes, 3 lanes.
const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 4;
const ARGON2_LANES: u32 = 3;

fn kdf() -> Result<Argon2<'static>, PalisadeError> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_LANES, None)
        .map_err(|e| PalisadeError::PasswordHash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str) -> Result<String, PalisadeError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(kdf()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PalisadeError::PasswordHash(e.to_string()))?
        .to_string())
}

pub fn verify_password_hash(password: &str, hash: &str) -> Result<bool, PalisadeError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PalisadeError::PasswordHash(e.to_string()))?;
    match kdf()?.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(Error::Password) => Ok(false),
        Err(e) => Err(PalisadeError::PasswordHash(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_roundtrip() {
        let hash = hash_password("Tr0ub4dor&3").unwrap();
        assert!(verify_password_hash("Tr0ub4dor&3", &hash).unwrap());
        assert!(!verify_password_hash("Tr0ub4dor&4", &hash).unwrap());
    }
}
