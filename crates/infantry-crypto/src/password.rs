use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Salt and Argon2id hash produced together. The hash is a PHC string that
/// embeds the salt, so verification only needs `hash`.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    pub hash: String,
    pub salt: String,
}

// Keep secrets out of logs and panic messages.
impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordDigest(..)")
    }
}

/// Hash a plaintext password under a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<PasswordDigest> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?
        .to_string();

    Ok(PasswordDigest {
        hash,
        salt: salt.as_str().to_string(),
    })
}

/// Recompute the hash of `candidate` with the stored salt and compare in
/// constant time. A malformed stored hash never verifies.
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

/// Hash of a throwaway password under the same parameters as real hashes.
static DECOY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password("infantry-decoy")
        .map(|digest| digest.hash)
        .unwrap_or_default()
});

/// Like [`verify_password`], but `None` (no such account) still pays for a
/// full Argon2 verification before failing.
pub fn verify_stored(stored_hash: Option<&str>, candidate: &str) -> bool {
    match stored_hash {
        Some(hash) => verify_password(hash, candidate),
        None => {
            let _ = verify_password(&DECOY_HASH, candidate);
            false
        }
    }
}
