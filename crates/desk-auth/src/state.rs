//! State-token generation for CSRF protection

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;

/// Generate a cryptographically secure state token
///
/// 32 bytes of randomness, base64url-encoded without padding (43 characters).
/// The token is round-tripped through the authorization URL and redirect to
/// correlate an in-flight attempt and detect cross-site request forgery.
pub fn generate_state_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    URL_SAFE_NO_PAD.encode(bytes)
}
