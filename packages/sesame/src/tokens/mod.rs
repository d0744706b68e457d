//! Token formats and the dispatcher between them.
//!
//! New tokens use the first enabled version. Incoming tokens are routed by
//! shape: v1 tokens contain colons, v2 tokens don't. A token no enabled
//! version recognizes is rejected before any cryptographic work.

mod encoding;
pub(crate) mod signer;
pub mod v1;
pub mod v2;

use crate::config::Config;
use crate::error::{BadTokenReason, PackError, Result, TokenError};
use crate::logging::redact;
use crate::packers::PrimaryKey;
use crate::user::User;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenVersion {
    /// Legacy colon-delimited format
    #[serde(rename = "v1", alias = "sesame.tokens_v1")]
    V1,
    /// Compact binary format
    #[serde(rename = "v2", alias = "sesame.tokens_v2")]
    V2,
}

impl fmt::Display for TokenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenVersion::V1 => f.write_str("v1"),
            TokenVersion::V2 => f.write_str("v2"),
        }
    }
}

impl TokenVersion {
    /// Tell whether `token` has the shape of this version
    #[must_use]
    pub fn detect(self, config: &Config, token: &str) -> bool {
        match self {
            TokenVersion::V1 => v1::detect_token(config, token),
            TokenVersion::V2 => v2::detect_token(config, token),
        }
    }

    /// Create a token of this version
    ///
    /// # Errors
    ///
    /// See [`v1::create_token`] and [`v2::create_token`].
    pub fn create<U: User + ?Sized>(
        self,
        config: &Config,
        user: &U,
        primary_key: &PrimaryKey,
        scope: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        match self {
            TokenVersion::V1 => v1::create_token(config, user, primary_key, scope, now),
            TokenVersion::V2 => v2::create_token(config, user, primary_key, scope, now),
        }
    }

    /// Verify a token of this version
    ///
    /// # Errors
    ///
    /// See [`v1::verify_token`] and [`v2::verify_token`].
    pub fn verify<U, F>(
        self,
        config: &Config,
        token: &str,
        get_user: F,
        scope: &str,
        max_age: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<U>
    where
        U: User,
        F: FnOnce(&PrimaryKey) -> Option<U>,
    {
        match self {
            TokenVersion::V1 => v1::verify_token(config, token, get_user, scope, max_age, now),
            TokenVersion::V2 => v2::verify_token(config, token, get_user, scope, max_age, now),
        }
    }
}

/// Create a token in the first enabled format
///
/// The token identifies the user by `primary_key` when given, else by the
/// value of the configured identifier field.
///
/// # Errors
///
/// Returns [`TokenError::MissingPrimaryKey`] when the user has no identifier,
/// and any error of the selected format.
pub fn create_token<U: User + ?Sized>(
    config: &Config,
    user: &U,
    scope: &str,
    primary_key: Option<&PrimaryKey>,
    now: DateTime<Utc>,
) -> Result<String> {
    let owned;
    let primary_key = match primary_key {
        Some(primary_key) => primary_key,
        None => {
            owned = user
                .identifier(config.primary_key_field())
                .ok_or_else(|| TokenError::MissingPrimaryKey(config.primary_key_field().into()))?;
            &owned
        }
    };
    config
        .creation_version()
        .create(config, user, primary_key, scope, now)
}

/// Verify a token in any enabled format
///
/// # Errors
///
/// Returns [`BadTokenReason::UnsupportedFormat`] when no enabled format
/// recognizes the token, else the error of the matching format.
pub fn verify_token<U, F>(
    config: &Config,
    token: &str,
    get_user: F,
    scope: &str,
    max_age: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<U>
where
    U: User,
    F: FnOnce(&PrimaryKey) -> Option<U>,
{
    match config
        .tokens()
        .iter()
        .find(|version| version.detect(config, token))
    {
        Some(version) => version.verify(config, token, get_user, scope, max_age, now),
        None => {
            tracing::debug!(
                token = %redact(token),
                "Bad token: doesn't match a supported format"
            );
            Err(TokenError::bad_token(BadTokenReason::UnsupportedFormat))
        }
    }
}

/// Maximum age for one verification: the caller's override, else the
/// configured value. Tokens carry no timestamp when max_age isn't configured,
/// so an override can't apply then.
pub(crate) fn effective_max_age(config: &Config, max_age: Option<Duration>) -> Option<Duration> {
    match (config.max_age(), max_age) {
        (None, Some(_)) => {
            tracing::warn!("Ignoring max_age argument; it isn't supported when max_age is disabled");
            None
        }
        (configured, max_age) => max_age.or(configured),
    }
}

pub(crate) fn describe_scope(scope: &str) -> String {
    if scope.is_empty() {
        "default scope".to_string()
    } else {
        format!("scope {scope}")
    }
}

/// Unpack the primary key at the start of a token
pub(crate) fn unpack_primary_key<'a>(
    config: &Config,
    data: &'a [u8],
    token_prefix: &str,
) -> Result<(PrimaryKey, &'a [u8])> {
    config.packer().unpack_pk(data).map_err(|err| match err {
        PackError::Truncated { .. } => {
            tracing::debug!(token = %token_prefix, "Bad token: cannot extract primary key");
            TokenError::bad_token(BadTokenReason::CannotExtractPrimaryKey)
        }
        err => {
            tracing::warn!(
                token = %token_prefix,
                error = %err,
                "Bad token: unexpected primary key; if you changed packer or \
                 primary_key_field, you must regenerate tokens"
            );
            TokenError::bad_token(BadTokenReason::UnexpectedPrimaryKey)
        }
    })
}
