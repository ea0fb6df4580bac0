use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate the CSRF-binding `state` value for a login initiation.
///
/// 16 random bytes, base64url-encoded without padding (22 chars).
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a PKCE code verifier.
///
/// 32 random bytes, base64url-encoded without padding (43 chars) —
/// within the 43-128 char range RFC 7636 requires.
pub fn generate_code_verifier() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge for a verifier:
/// `base64url(SHA-256(verifier))`, unpadded.
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
