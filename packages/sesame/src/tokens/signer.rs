//! Salted HMAC-SHA1 signer for v1 tokens.
//!
//! Signed values look like `value:signature`, or `value:timestamp:signature`
//! when timestamps are enabled. The signature is the unpadded URL-safe base64
//! encoding of `HMAC-SHA1(SHA1(salt + "signer" + secret), signed part)`,
//! always 27 characters. Timestamps are Unix seconds in base62.

use super::encoding::{b62_decode, b62_encode, b64_encode};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type HmacSha1 = Hmac<Sha1>;

const SEPARATOR: char = ':';

/// Length of an encoded signature
pub const SIGNATURE_LEN: usize = 27;

/// Why a signed value was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsignError {
    /// No separator, or no secret produces the signature
    BadSignature,
    /// Valid signature, but older than the maximum age
    Expired {
        /// Age in seconds
        age: i64,
    },
    /// Valid signature, but the timestamp can't be read
    MalformedTimestamp,
}

/// Signer holding one HMAC key per accepted secret
#[derive(Clone)]
pub struct Signer {
    signing: Zeroizing<Vec<u8>>,
    fallbacks: Vec<Zeroizing<Vec<u8>>>,
    timestamped: bool,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("keys", &(1 + self.fallbacks.len()))
            .field("timestamped", &self.timestamped)
            .finish()
    }
}

fn hmac_key(salt: &str, secret: &str) -> Zeroizing<Vec<u8>> {
    let mut hasher = Sha1::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"signer");
    hasher.update(secret.as_bytes());
    Zeroizing::new(hasher.finalize().to_vec())
}

impl Signer {
    /// Signer for `secret`, also accepting signatures made with `fallbacks`
    #[must_use]
    pub fn new(salt: &str, secret: &str, fallbacks: &[String], timestamped: bool) -> Self {
        Self {
            signing: hmac_key(salt, secret),
            fallbacks: fallbacks.iter().map(|s| hmac_key(salt, s)).collect(),
            timestamped,
        }
    }

    fn signature(key: &[u8], value: &str) -> String {
        // HMAC accepts keys of any length.
        let mut mac = match HmacSha1::new_from_slice(key) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(value.as_bytes());
        b64_encode(&mac.finalize().into_bytes())
    }

    /// Sign `value` with the primary secret
    #[must_use]
    pub fn sign(&self, value: &str, now: DateTime<Utc>) -> String {
        let value = if self.timestamped {
            format!("{value}{SEPARATOR}{}", b62_encode(now.timestamp()))
        } else {
            value.to_string()
        };
        let signature = Self::signature(&self.signing, &value);
        format!("{value}{SEPARATOR}{signature}")
    }

    /// Check the signature of `signed` and return the original value
    ///
    /// `max_age` is only checked when timestamps are enabled.
    ///
    /// # Errors
    ///
    /// Returns an [`UnsignError`] describing the first check that failed.
    pub fn unsign<'a>(
        &self,
        signed: &'a str,
        max_age: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<&'a str, UnsignError> {
        let (value, signature) = signed
            .rsplit_once(SEPARATOR)
            .ok_or(UnsignError::BadSignature)?;
        let matched = std::iter::once(&self.signing)
            .chain(self.fallbacks.iter())
            .any(|key| {
                let expected = Self::signature(key, value);
                bool::from(expected.as_bytes().ct_eq(signature.as_bytes()))
            });
        if !matched {
            return Err(UnsignError::BadSignature);
        }
        if !self.timestamped {
            return Ok(value);
        }

        let (value, timestamp) = value
            .rsplit_once(SEPARATOR)
            .ok_or(UnsignError::MalformedTimestamp)?;
        let timestamp = b62_decode(timestamp).ok_or(UnsignError::MalformedTimestamp)?;
        if let Some(max_age) = max_age {
            let age = now.timestamp().saturating_sub(timestamp);
            if age > max_age.num_seconds() {
                return Err(UnsignError::Expired { age });
            }
        }
        Ok(value)
    }
}
