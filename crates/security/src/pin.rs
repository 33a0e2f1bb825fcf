//! Shared-PIN verification.
//!
//! The configured PIN is never compared byte-by-byte. Both sides are run
//! through HMAC-SHA256 under a random per-process key and the MACs are
//! compared in constant time via `verify_slice`.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Checks candidate PINs against the configured one.
pub struct PinVerifier {
    key: [u8; 32],
    expected: Vec<u8>,
}

impl std::fmt::Debug for PinVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinVerifier").finish_non_exhaustive()
    }
}

impl PinVerifier {
    pub fn new(pin: &str) -> Self {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        let expected = mac(&key, pin.as_bytes()).finalize().into_bytes().to_vec();
        Self { key, expected }
    }

    /// Whether `candidate` equals the configured PIN. Surrounding
    /// whitespace is ignored on the candidate.
    pub fn verify(&self, candidate: &str) -> bool {
        mac(&self.key, candidate.trim().as_bytes())
            .verify_slice(&self.expected)
            .is_ok()
    }
}

fn mac(key: &[u8], data: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac
}
