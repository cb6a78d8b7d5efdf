use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// The number of random bytes in a session token (144 bits of entropy).
const TOKEN_BYTES: usize = 18;

/// Generates an opaque session bearer token.
///
/// The token is the client-held credential; it is never persisted
/// server-side in raw form.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Derives the deterministic store lookup key for a token.
///
/// The key is the lowercase hex SHA-256 of the token, so a compromised
/// session store never yields usable bearer credentials.
pub fn derive_lookup_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
