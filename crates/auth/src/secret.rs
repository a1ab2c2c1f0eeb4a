//! Plaintext credential generation and one-way digests.
//!
//! A credential looks like `wk_` followed by 64 lowercase hex characters
//! (256 bits from the OS RNG). Only [`digest`] and [`display_prefix`] of it
//! are ever persisted.

use {
    rand::RngCore,
    secrecy::Secret,
    sha2::{Digest, Sha256},
};

/// Fixed tag every issued credential starts with.
pub const CREDENTIAL_TAG: &str = "wk_";

/// Characters of the plaintext kept in clear for listings.
pub const DISPLAY_PREFIX_LEN: usize = 12;

const SECRET_BYTES: usize = 32;

/// Generate a new plaintext credential.
pub fn generate() -> Secret<String> {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    Secret::new(format!("{CREDENTIAL_TAG}{}", hex::encode(bytes)))
}

/// SHA-256 of the full plaintext, lowercase hex.
pub fn digest(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// First [`DISPLAY_PREFIX_LEN`] characters, for human identification only.
pub fn display_prefix(plaintext: &str) -> String {
    plaintext.chars().take(DISPLAY_PREFIX_LEN).collect()
}

/// Cheap pre-check run before any hashing or lookup.
pub fn has_credential_format(value: &str) -> bool {
    value.starts_with(CREDENTIAL_TAG)
}

/// 256-bit HS256 signing key as hex, for `auth.token_secret`.
pub fn generate_signing_secret() -> Secret<String> {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    Secret::new(hex::encode(bytes))
}

/// 32 random bytes, URL-safe base64. Used for browser session tokens.
pub(crate) fn generate_token() -> String {
    use base64::Engine;

    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, std::collections::HashSet};

    #[test]
    fn generated_secret_has_tag_and_256_bits() {
        let secret = generate();
        let plain = secret.expose_secret();
        assert!(has_credential_format(plain));
        let body = plain.strip_prefix(CREDENTIAL_TAG).unwrap();
        assert_eq!(body.len(), 64);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn digest_is_deterministic() {
        let h = digest("wk_abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, digest("wk_abc"));
        assert_ne!(h, digest("wk_abd"));
    }

    #[test]
    fn digest_matches_known_vector() {
        assert_eq!(
            digest("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn no_digest_collisions_across_ten_thousand_secrets() {
        let digests: HashSet<String> = (0..10_000)
            .map(|_| digest(generate().expose_secret()))
            .collect();
        assert_eq!(digests.len(), 10_000);
    }

    #[test]
    fn display_prefix_is_twelve_chars() {
        let secret = generate();
        let plain = secret.expose_secret();
        let prefix = display_prefix(plain);
        assert_eq!(prefix.len(), DISPLAY_PREFIX_LEN);
        assert!(plain.starts_with(&prefix));
        assert_eq!(display_prefix("wk_1"), "wk_1");
    }

    #[test]
    fn format_check_rejects_other_tags() {
        assert!(!has_credential_format("mk_0123"));
        assert!(!has_credential_format("WK_0123"));
        assert!(!has_credential_format(""));
    }

    #[test]
    fn signing_secret_is_long_enough_for_hs256() {
        let secret = generate_signing_secret();
        assert_eq!(secret.expose_secret().len(), 64);
        assert!(!has_credential_format(secret.expose_secret()));
    }

    #[test]
    fn session_tokens_are_unique() {
        let a = generate_token();
        assert_ne!(a, generate_token());
        assert_eq!(a.len(), 43);
    }
}
