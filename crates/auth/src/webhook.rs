//! HMAC-SHA256 verification of inbound webhook payloads.
//!
//! Always verify the raw request body as received. Re-serialized JSON is not
//! guaranteed to be byte-identical to what the sender signed.

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    tracing::warn,
};

use crate::error::{AuthError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verify `signature_header` (`sha256=<hex>` or bare hex) over `body`.
///
/// The digest comparison is constant-time.
pub fn verify_signature(body: &[u8], signature_header: &str, secret: &[u8]) -> Result<()> {
    if secret.is_empty() {
        warn!("webhook secret is empty, rejecting payload");
        return Err(AuthError::InvalidSignature);
    }
    let encoded = signature_header.trim();
    let encoded = encoded.strip_prefix("sha256=").unwrap_or(encoded);
    let Ok(expected) = hex::decode(encoded) else {
        warn!("webhook signature is not valid hex");
        return Err(AuthError::InvalidSignature);
    };

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| AuthError::InvalidSignature)
}

/// Boolean form of [`verify_signature`].
pub fn is_valid_signature(body: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    verify_signature(body, signature_header, secret).is_ok()
}

/// Compute the `sha256=<hex>` header value for `body`.
pub fn sign(body: &[u8], secret: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::Internal(format!("hmac key: {e}")))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"action":"opened","number":7}"#;
    const SECRET: &[u8] = b"It's a Secret to Everybody";

    #[test]
    fn valid_signature_passes() {
        let sig = sign(BODY, SECRET).unwrap();
        assert!(sig.starts_with("sha256="));
        verify_signature(BODY, &sig, SECRET).unwrap();
    }

    #[test]
    fn bare_hex_is_accepted() {
        let sig = sign(BODY, SECRET).unwrap();
        let bare = sig.strip_prefix("sha256=").unwrap();
        assert!(is_valid_signature(BODY, bare, SECRET));
    }

    #[test]
    fn known_github_vector() {
        // Example from GitHub's webhook documentation.
        assert!(is_valid_signature(
            b"Hello, World!",
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17",
            SECRET,
        ));
    }

    #[test]
    fn flipping_any_byte_fails() {
        let sig = sign(BODY, SECRET).unwrap();
        for i in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[i] ^= 0x01;
            assert!(
                matches!(
                    verify_signature(&tampered, &sig, SECRET),
                    Err(AuthError::InvalidSignature)
                ),
                "byte {i} flip was accepted"
            );
        }
    }

    #[test]
    fn other_secret_fails() {
        let sig = sign(BODY, b"some other secret").unwrap();
        assert!(!is_valid_signature(BODY, &sig, SECRET));
    }

    #[test]
    fn malformed_headers_fail() {
        assert!(!is_valid_signature(BODY, "", SECRET));
        assert!(!is_valid_signature(BODY, "sha256=zz", SECRET));
        assert!(!is_valid_signature(BODY, "sha256=abcd", SECRET));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let sig = sign(BODY, b"").unwrap();
        assert!(!is_valid_signature(BODY, &sig, b""));
    }
}
