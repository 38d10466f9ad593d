use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A freshly generated refresh token. `value` goes to the client exactly
/// once; stores only ever see `hash`.
#[derive(Debug, Clone)]
pub struct RefreshTokenSecret {
    pub value: String,
    pub hash: String,
}

/// Generates an opaque refresh token from 32 bytes of OS randomness.
pub fn generate_refresh_token() -> RefreshTokenSecret {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let value = hex::encode(bytes);
    let hash = hash_refresh_token(&value);
    RefreshTokenSecret { value, hash }
}

/// SHA-256 hex digest of a refresh token. Deterministic, so the digest
/// doubles as the lookup key during rotation.
pub fn hash_refresh_token(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
