//! Request tokens exchanged between shard peers.
//!
//! The core only needs a yes/no verdict for inbound requests and a token to
//! attach to outbound ones; [`HmacTokens`] is the bundled scheme.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decides whether `token` was issued for `subject`.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, subject: &str, token: &str) -> bool;
}

/// Mints tokens for outbound peer calls.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, subject: &str) -> String;
}

/// HMAC-SHA256 over the subject, hex encoded.
#[derive(Clone)]
pub struct HmacTokens {
    secret: Vec<u8>,
}

impl HmacTokens {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).expect("hmac key of any size")
    }
}

impl TokenIssuer for HmacTokens {
    fn issue(&self, subject: &str) -> String {
        let mut mac = self.mac();
        mac.update(subject.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl TokenVerifier for HmacTokens {
    fn verify(&self, subject: &str, token: &str) -> bool {
        let Ok(expected) = hex::decode(token) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(subject.as_bytes());
        // constant-time comparison
        mac.verify_slice(&expected).is_ok()
    }
}
