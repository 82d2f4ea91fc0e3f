/// Infantry Crypto Library
///
/// Password hashing (Argon2id with a per-credential random salt) and opaque
/// bearer token issuance. All randomness comes from the OS CSPRNG.

pub mod password;
pub mod token;
