use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC-SHA256 signer and verifier for webhook bodies.
#[derive(Clone)]
pub struct WebhookVerifier {
    mac: HmacSha256,
}

impl WebhookVerifier {
    pub fn new(secret: &[u8]) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Lowercase hex signature of `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Checks a hex signature, optionally prefixed with `sha256=`, in constant time.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> bool {
        let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
            return false;
        };
        let hex_digest = signature
            .strip_prefix(SIGNATURE_PREFIX)
            .unwrap_or(signature);
        let Ok(expected) = hex::decode(hex_digest) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}
