//! Revocation keys.
//!
//! A revocation key is derived from the mutable state of a user. When that
//! state changes, tokens issued before the change stop verifying:
//!
//! - the password hash, so that changing the password revokes tokens;
//! - optionally the email, so that changing the email revokes tokens;
//! - for one-time tokens, the last login time, so that logging in revokes
//!   every token issued before.
//!
//! The material is stretched with PBKDF2 under a fixed salt.

use crate::settings::Digest;
use crate::user::User;
use chrono::{DateTime, SecondsFormat, Utc};
use md5::Md5;
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

/// Which parts of the user state feed the revocation key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationPolicy {
    /// Include the password hash
    pub password: bool,
    /// Include the email
    pub email: bool,
    /// Include the last login time
    pub last_login: bool,
    /// PBKDF2 salt
    pub salt: String,
    /// PBKDF2 digest
    pub digest: Digest,
    /// PBKDF2 iterations
    pub iterations: u32,
}

impl RevocationPolicy {
    /// Concatenate the selected user state, in a fixed order
    pub fn material<U: User + ?Sized>(&self, user: &U) -> Zeroizing<String> {
        let mut data = Zeroizing::new(String::new());
        if self.password {
            data.push_str(user.password().unwrap_or(""));
        }
        if self.email {
            data.push_str(user.email().unwrap_or(""));
        }
        if self.last_login {
            if let Some(last_login) = user.last_login() {
                data.push_str(&format_last_login(last_login));
            }
        }
        data
    }

    /// Derive the revocation key of a user
    pub fn derive<U: User + ?Sized>(&self, user: &U) -> Vec<u8> {
        let material = self.material(user);
        let mut key = vec![0u8; self.digest.output_size()];
        let (password, salt) = (material.as_bytes(), self.salt.as_bytes());
        let rounds = self.iterations;
        match self.digest {
            Digest::Md5 => pbkdf2_hmac::<Md5>(password, salt, rounds, &mut key),
            Digest::Sha1 => pbkdf2_hmac::<Sha1>(password, salt, rounds, &mut key),
            Digest::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut key),
            Digest::Sha512 => pbkdf2_hmac::<Sha512>(password, salt, rounds, &mut key),
        }
        key
    }
}

/// Serialize a last login time: RFC 3339, UTC, microsecond precision
#[must_use]
pub fn format_last_login(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
