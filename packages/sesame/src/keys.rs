//! Signing and verification keys for v2 tokens.
//!
//! Keys are derived from the application secret, the additional key material
//! and a fingerprint of the settings that change how tokens are laid out.
//! Changing one of these settings changes the keys, which invalidates tokens
//! that a different layout could misread: a timestamp read as part of a
//! primary key, or a primary key read by another packer.

use blake2b_simd::Params;
use std::fmt;
use zeroize::Zeroizing;

/// Size of derived keys in bytes
pub const KEY_SIZE: usize = 64;

const PERSONALIZATION: &[u8] = b"sesame.settings";

/// Settings that affect the token layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint<'a> {
    /// Whether tokens carry a timestamp; the max age itself may change freely
    pub max_age_enabled: bool,
    /// Name of the custom packer, if any
    pub packer: Option<&'a str>,
    /// Identifier field stored in tokens
    pub primary_key_field: &'a str,
}

/// A derived 64-byte key, wiped on drop
#[derive(Clone)]
pub struct DerivedKey(Zeroizing<[u8; KEY_SIZE]>);

impl DerivedKey {
    /// Raw key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derive a key from a secret, additional key material and settings
#[must_use]
pub fn derive_key(secret: &str, key: &str, fingerprint: &Fingerprint<'_>) -> DerivedKey {
    let material = Zeroizing::new(
        [
            secret,
            key,
            if fingerprint.max_age_enabled {
                "max_age"
            } else {
                ""
            },
            fingerprint.packer.unwrap_or(""),
            fingerprint.primary_key_field,
        ]
        .join("|"),
    );
    let hash = Params::new()
        .hash_length(KEY_SIZE)
        .personal(PERSONALIZATION)
        .hash(material.as_bytes());
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    bytes.copy_from_slice(hash.as_bytes());
    DerivedKey(bytes)
}

/// Key used to sign new tokens plus keys accepted when verifying
#[derive(Debug, Clone)]
pub struct KeySet {
    signing: DerivedKey,
    fallbacks: Vec<DerivedKey>,
}

impl KeySet {
    /// Derive keys for the primary secret and every fallback secret
    #[must_use]
    pub fn derive(
        secret: &str,
        fallbacks: &[String],
        key: &str,
        fingerprint: &Fingerprint<'_>,
    ) -> Self {
        Self {
            signing: derive_key(secret, key, fingerprint),
            fallbacks: fallbacks
                .iter()
                .map(|s| derive_key(s, key, fingerprint))
                .collect(),
        }
    }

    /// Key for signing, derived from the primary secret
    #[must_use]
    pub fn signing(&self) -> &DerivedKey {
        &self.signing
    }

    /// Keys for verification, signing key first
    pub fn verification(&self) -> impl Iterator<Item = &DerivedKey> {
        std::iter::once(&self.signing).chain(self.fallbacks.iter())
    }
}
