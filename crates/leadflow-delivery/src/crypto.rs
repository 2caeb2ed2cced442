//! Payload signing for webhook delivery.
//!
//! HMAC-SHA256 over the exact serialized body bytes, formatted as
//! `sha256=<hex>`. Shared by the dispatcher and the test-send endpoint.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every signature value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the signature for a payload: `sha256=<hex(hmac-sha256(body))>`.
///
/// The signature covers the byte sequence exactly as sent on the wire, so
/// callers must sign the serialized body, not re-serialize it afterwards.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a `sha256=<hex>` signature using constant-time comparison.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let computed = sign_payload(secret, body);
    constant_time_eq(signature.as_bytes(), computed.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_deterministic() {
        let sig1 = sign_payload("secret", b"payload");
        let sig2 = sign_payload("secret", b"payload");
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_signature_format() {
        let sig = sign_payload("secret", b"payload");
        assert!(sig.starts_with("sha256="));
        // SHA256 = 32 bytes = 64 hex chars after the prefix
        let hex_part = &sig["sha256=".len()..];
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_changes_with_secret() {
        assert_ne!(
            sign_payload("secret1", b"payload"),
            sign_payload("secret2", b"payload")
        );
    }

    #[test]
    fn test_signature_changes_with_body() {
        assert_ne!(
            sign_payload("secret", b"payload1"),
            sign_payload("secret", b"payload2")
        );
    }

    #[test]
    fn test_verify_roundtrip() {
        let secret = "whsec_form_secret_123";
        let body = br#"{"event":"lead.created"}"#;
        let sig = sign_payload(secret, body);
        assert!(verify_signature(secret, body, &sig));
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let secret = "whsec_form_secret_123";
        let body = b"original body".to_vec();
        let sig = sign_payload(secret, &body);

        let mut tampered = body.clone();
        tampered[0] ^= 0x01;
        assert!(!verify_signature(secret, &tampered, &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let sig = sign_payload("secret", b"payload");
        assert!(!verify_signature("other", b"payload", &sig));
    }

    #[test]
    fn test_verify_rejects_malformed_signature() {
        assert!(!verify_signature("secret", b"payload", "not-a-signature"));
        assert!(!verify_signature("secret", b"payload", ""));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hi"));
    }
}
