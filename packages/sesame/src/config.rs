//! Loaded, validated configuration.
//!
//! A [`Config`] is immutable. It holds everything derived from [`Settings`]
//! once, at load time: signing keys, the packer, the revocation policy and
//! the v1 signer. Changing settings means loading a new `Config` and
//! publishing it through [`Sesame::reload`](crate::Sesame::reload).

use crate::error::ConfigError;
use crate::keys::{Fingerprint, KeySet};
use crate::packers::{Packer, PackerRegistry};
use crate::revocation::RevocationPolicy;
use crate::settings::Settings;
use crate::tokens::signer::{Signer, SIGNATURE_LEN};
use crate::tokens::TokenVersion;
use crate::user::UserSchema;
use chrono::Duration;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Largest v2 signature, which is the BLAKE2b output size
pub const MAX_SIGNATURE_SIZE: usize = 64;

/// Validated configuration with derived keys
#[derive(Clone)]
pub struct Config {
    settings: Settings,
    max_age: Option<Duration>,
    packer: Arc<dyn Packer>,
    keys: KeySet,
    revocation: RevocationPolicy,
    signer: Signer,
    v1_pattern: Regex,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("settings", &self.settings)
            .field("packer", &self.packer)
            .field("keys", &self.keys)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Validate settings against the user schema and derive keys
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InsecureConfiguration`] when tokens would neither
    ///   expire nor be revoked on password change
    /// - [`ConfigError::UnsupportedKeyType`] when no packer handles the
    ///   identifier field
    /// - [`ConfigError::InvalidConfiguration`] for inconsistent settings
    pub fn load(
        settings: Settings,
        schema: &UserSchema,
        registry: &PackerRegistry,
    ) -> Result<Self, ConfigError> {
        if settings.tokens.is_empty() {
            return Err(ConfigError::invalid(
                "tokens must enable at least one token version",
            ));
        }
        if settings.secret_key.is_empty() {
            return Err(ConfigError::invalid("secret_key must not be empty"));
        }
        if !(1..=MAX_SIGNATURE_SIZE).contains(&settings.signature_size) {
            return Err(ConfigError::invalid(format!(
                "signature_size must be between 1 and {MAX_SIGNATURE_SIZE} bytes, got {}",
                settings.signature_size
            )));
        }
        if settings.iterations == 0 {
            return Err(ConfigError::invalid("iterations must be positive"));
        }
        if settings.max_age.is_none() && !settings.invalidate_on_password_change {
            return Err(ConfigError::InsecureConfiguration);
        }
        if settings.invalidate_on_email_change && !schema.has_email_field() {
            return Err(ConfigError::invalid(format!(
                "invalidate_on_email_change requires an email field on {}",
                schema.label
            )));
        }

        let field = schema
            .field(&settings.primary_key_field)
            .ok_or_else(|| {
                ConfigError::invalid(format!(
                    "{} has no field {}",
                    schema.label, settings.primary_key_field
                ))
            })?;
        if !field.unique {
            return Err(ConfigError::invalid(format!(
                "{}.{} must be unique",
                schema.label, field.name
            )));
        }

        let packer = match settings.packer.as_deref() {
            Some(name) => registry.custom(name)?,
            None => registry.for_type_name(&field.type_name)?,
        };

        let max_age = settings.max_age_duration()?;
        let keys = KeySet::derive(
            &settings.secret_key,
            &settings.secret_key_fallbacks,
            &settings.key,
            &Fingerprint {
                max_age_enabled: max_age.is_some(),
                packer: settings.packer.as_deref(),
                primary_key_field: &settings.primary_key_field,
            },
        );
        let revocation = RevocationPolicy {
            password: settings.invalidate_on_password_change,
            email: settings.invalidate_on_email_change,
            last_login: settings.one_time,
            salt: settings.salt.clone(),
            digest: settings.digest,
            iterations: settings.iterations,
        };
        let signer = Signer::new(
            &settings.salt,
            &settings.secret_key,
            &settings.secret_key_fallbacks,
            max_age.is_some(),
        );
        let v1_pattern = v1_pattern(max_age.is_some())?;

        tracing::info!(
            tokens = ?settings.tokens,
            max_age = ?settings.max_age,
            one_time = settings.one_time,
            packer = ?packer,
            fallbacks = settings.secret_key_fallbacks.len(),
            "Loaded token configuration"
        );

        Ok(Self {
            settings,
            max_age,
            packer,
            keys,
            revocation,
            signer,
            v1_pattern,
        })
    }

    /// Settings this configuration was loaded from
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Name of the query string parameter carrying the token
    #[must_use]
    pub fn token_name(&self) -> &str {
        &self.settings.token_name
    }

    /// Configured maximum age; `None` when tokens carry no timestamp
    #[must_use]
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Whether tokens are revoked by logging in
    #[must_use]
    pub fn one_time(&self) -> bool {
        self.settings.one_time
    }

    /// Identifier field stored in tokens
    #[must_use]
    pub fn primary_key_field(&self) -> &str {
        &self.settings.primary_key_field
    }

    /// Enabled token versions, creation format first
    #[must_use]
    pub fn tokens(&self) -> &[TokenVersion] {
        &self.settings.tokens
    }

    /// Format of newly created tokens
    #[must_use]
    pub fn creation_version(&self) -> TokenVersion {
        self.settings
            .tokens
            .first()
            .copied()
            .unwrap_or(TokenVersion::V2)
    }

    /// Size of v2 signatures in bytes
    #[must_use]
    pub fn signature_size(&self) -> usize {
        self.settings.signature_size
    }

    /// Packer for the identifier field
    #[must_use]
    pub fn packer(&self) -> &dyn Packer {
        self.packer.as_ref()
    }

    /// Keys for v2 tokens
    #[must_use]
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Revocation key derivation
    #[must_use]
    pub fn revocation(&self) -> &RevocationPolicy {
        &self.revocation
    }

    pub(crate) fn signer(&self) -> &Signer {
        &self.signer
    }

    pub(crate) fn v1_pattern(&self) -> &Regex {
        &self.v1_pattern
    }
}

/// Structural pattern of v1 tokens; the primary key and revocation key are at
/// least 3 bytes, so 4 base64 characters
fn v1_pattern(timestamped: bool) -> Result<Regex, ConfigError> {
    let pattern = if timestamped {
        // Six base62 digits cover every timestamp from 1999 to 3769.
        format!(r"^[A-Za-z0-9_-]{{4,}}:[0-9A-Za-z]{{6}}:[A-Za-z0-9_-]{{{SIGNATURE_LEN}}}$")
    } else {
        format!(r"^[A-Za-z0-9_-]{{4,}}:[A-Za-z0-9_-]{{{SIGNATURE_LEN}}}$")
    };
    Regex::new(&pattern).map_err(|e| ConfigError::invalid(e.to_string()))
}
