use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// No secret configured or no signature sent.
    Skipped,
    Valid,
    Invalid,
}

impl SignatureCheck {
    pub fn is_rejected(self) -> bool {
        self == SignatureCheck::Invalid
    }
}

/// Checks `x-body-signature` against HMAC-SHA256(secret, body).
///
/// The MAC is computed over the exact body bytes and, failing that, over the
/// compact JSON serialization of the parsed body, which is what the platform
/// signs when it re-encodes the payload.
pub fn verify_signature(body: &[u8], signature: Option<&str>, secret: Option<&str>) -> SignatureCheck {
    let (signature, secret) = match (signature, secret) {
        (Some(sig), Some(secret)) if !secret.is_empty() && !sig.trim().is_empty() => {
            (sig.trim(), secret)
        }
        _ => return SignatureCheck::Skipped,
    };

    let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let provided = match hex::decode(hex_sig) {
        Ok(v) => v,
        Err(_) => return SignatureCheck::Invalid,
    };

    if mac_matches(secret, body, &provided) {
        return SignatureCheck::Valid;
    }

    let compact = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_vec(&v).ok());
    match compact {
        Some(bytes) if bytes != body && mac_matches(secret, &bytes, &provided) => {
            SignatureCheck::Valid
        }
        _ => SignatureCheck::Invalid,
    }
}

pub fn sign_hex(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn mac_matches(secret: &str, body: &[u8], provided: &[u8]) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    expected.as_slice().ct_eq(provided).into()
}
