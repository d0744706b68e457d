//! Settings recognized by the token codecs.
//!
//! [`Settings`] is plain data with defaults. It can be built in code with the
//! `with_*` methods or read from JSON. Turning it into a usable
//! [`Config`](crate::config::Config) derives keys, selects the packer and
//! rejects insecure or inconsistent combinations.

use crate::error::ConfigError;
use crate::tokens::TokenVersion;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default query string parameter carrying the token
pub const DEFAULT_TOKEN_NAME: &str = "sesame";

/// Digest used by PBKDF2 when deriving revocation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Digest {
    /// MD5, the historical default; it keeps v1 tokens short
    #[default]
    Md5,
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
}

impl Digest {
    /// Output size in bytes, which is also the revocation key size
    #[must_use]
    pub fn output_size(self) -> usize {
        match self {
            Digest::Md5 => 16,
            Digest::Sha1 => 20,
            Digest::Sha256 => 32,
            Digest::Sha512 => 64,
        }
    }
}

/// Token settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name of the query string parameter carrying the token
    pub token_name: String,
    /// Maximum token age in seconds; `None` disables expiry
    pub max_age: Option<i64>,
    /// Revoke tokens when the user logs in
    pub one_time: bool,
    /// Revoke tokens when the password hash changes
    pub invalidate_on_password_change: bool,
    /// Revoke tokens when the email changes
    pub invalidate_on_email_change: bool,
    /// Name of a custom packer registered in the packer registry
    pub packer: Option<String>,
    /// Identifier field stored in tokens; `pk` is the primary key
    pub primary_key_field: String,
    /// Enabled token formats; the first one creates tokens
    pub tokens: Vec<TokenVersion>,
    /// Application secret
    pub secret_key: String,
    /// Previous application secrets, still accepted for verification
    pub secret_key_fallbacks: Vec<String>,
    /// Additional key material mixed into v2 keys
    pub key: String,
    /// Size of v2 signatures in bytes
    pub signature_size: usize,
    /// Salt for v1 signatures and revocation keys
    pub salt: String,
    /// PBKDF2 digest for revocation keys
    pub digest: Digest,
    /// PBKDF2 iterations for revocation keys
    pub iterations: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token_name: DEFAULT_TOKEN_NAME.to_string(),
            max_age: None,
            one_time: false,
            invalidate_on_password_change: true,
            invalidate_on_email_change: false,
            packer: None,
            primary_key_field: "pk".to_string(),
            tokens: vec![TokenVersion::V2, TokenVersion::V1],
            secret_key: String::new(),
            secret_key_fallbacks: Vec::new(),
            key: String::new(),
            // A 10-byte signature has about 1.2e24 possible values.
            signature_size: 10,
            salt: "sesame".to_string(),
            digest: Digest::Md5,
            iterations: 10_000,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token_name", &self.token_name)
            .field("max_age", &self.max_age)
            .field("one_time", &self.one_time)
            .field(
                "invalidate_on_password_change",
                &self.invalidate_on_password_change,
            )
            .field("invalidate_on_email_change", &self.invalidate_on_email_change)
            .field("packer", &self.packer)
            .field("primary_key_field", &self.primary_key_field)
            .field("tokens", &self.tokens)
            .field("secret_key", &"[REDACTED]")
            .field("secret_key_fallbacks", &self.secret_key_fallbacks.len())
            .field("key", &"[REDACTED]")
            .field("signature_size", &self.signature_size)
            .field("salt", &self.salt)
            .field("digest", &self.digest)
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl Settings {
    /// Default settings with the given application secret
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            ..Self::default()
        }
    }

    /// Read settings from JSON; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] when the JSON doesn't
    /// describe settings.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::invalid(e.to_string()))
    }

    /// Maximum token age as a duration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] when the number of
    /// seconds doesn't fit in a duration.
    pub fn max_age_duration(&self) -> Result<Option<Duration>, ConfigError> {
        self.max_age
            .map(|seconds| {
                Duration::try_seconds(seconds)
                    .ok_or_else(|| ConfigError::invalid("max_age is out of range"))
            })
            .transpose()
    }

    /// Set the query string parameter name
    #[must_use]
    pub fn with_token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = name.into();
        self
    }

    /// Set the maximum token age
    #[must_use]
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age.map(|d| d.num_seconds());
        self
    }

    /// Set the maximum token age in seconds
    #[must_use]
    pub fn with_max_age_secs(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Enable or disable one-time tokens
    #[must_use]
    pub fn with_one_time(mut self, one_time: bool) -> Self {
        self.one_time = one_time;
        self
    }

    /// Revoke tokens on password change
    #[must_use]
    pub fn with_invalidate_on_password_change(mut self, enabled: bool) -> Self {
        self.invalidate_on_password_change = enabled;
        self
    }

    /// Revoke tokens on email change
    #[must_use]
    pub fn with_invalidate_on_email_change(mut self, enabled: bool) -> Self {
        self.invalidate_on_email_change = enabled;
        self
    }

    /// Use a custom packer registered under `name`
    #[must_use]
    pub fn with_packer(mut self, name: impl Into<String>) -> Self {
        self.packer = Some(name.into());
        self
    }

    /// Store another unique field than the primary key in tokens
    #[must_use]
    pub fn with_primary_key_field(mut self, field: impl Into<String>) -> Self {
        self.primary_key_field = field.into();
        self
    }

    /// Set enabled token formats, in order of preference
    #[must_use]
    pub fn with_tokens(mut self, tokens: Vec<TokenVersion>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Set the application secret
    #[must_use]
    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = secret_key.into();
        self
    }

    /// Set previous application secrets accepted for verification
    #[must_use]
    pub fn with_secret_key_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
        self.secret_key_fallbacks = fallbacks;
        self
    }

    /// Set additional key material for v2 tokens
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the size of v2 signatures in bytes
    #[must_use]
    pub fn with_signature_size(mut self, size: usize) -> Self {
        self.signature_size = size;
        self
    }

    /// Set the salt for v1 signatures and revocation keys
    #[must_use]
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    /// Set the PBKDF2 digest for revocation keys
    #[must_use]
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = digest;
        self
    }

    /// Set the PBKDF2 iterations for revocation keys
    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }
}
