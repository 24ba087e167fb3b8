//! CSRF state token generation
//!
//! The state parameter binds a login attempt to the browser session that
//! initiated it. The authorization server returns it unchanged in the
//! callback, where it is compared byte-for-byte against the stored value.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Generate a cryptographically random CSRF state token.
///
/// Produces 32 random bytes encoded as URL-safe base64 (no padding),
/// 43 characters. The value is opaque: nothing is derived from it and it
/// is single-use, cleared from storage as soon as a redemption matches.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
