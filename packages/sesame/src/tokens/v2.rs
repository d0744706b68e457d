//! v2 tokens.
//!
//! A v2 token is the unpadded URL-safe base64 encoding of:
//!
//! ```text
//! [primary key][timestamp, if max_age is set][scope salt, if scoped][signature]
//! ```
//!
//! There are no separators. The primary key length is known to the packer,
//! the timestamp is a signed 4-byte big-endian number of seconds since
//! 2020-01-01T00:00:00Z, the scope salt takes [`SCOPE_SALT_SIZE`] bytes and
//! the signature takes the configured signature size.
//!
//! The signature is a keyed BLAKE2b MAC over the token prefix, the revocation
//! key of the user and the scope. The revocation key never appears in the
//! token, which is why the user is looked up before the signature is checked.

use super::encoding::{b64_decode, b64_encode};
use super::{effective_max_age, describe_scope, unpack_primary_key};
use crate::config::Config;
use crate::error::{BadTokenReason, Result, TokenError};
use crate::keys::DerivedKey;
use crate::logging::redact;
use crate::packers::PrimaryKey;
use crate::user::User;
use blake2b_simd::Params;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::LazyLock;
use subtle::ConstantTimeEq;

/// Unix timestamp of 2020-01-01T00:00:00Z, the origin of token timestamps
pub const TIMESTAMP_OFFSET: i64 = 1_577_836_800;

/// Size of the timestamp in bytes
pub const TIMESTAMP_SIZE: usize = 4;

/// Size of the scope salt in bytes
pub const SCOPE_SALT_SIZE: usize = 4;

const SIGNATURE_PERSONALIZATION: &[u8] = b"sesame.tokens_v2";
const SCOPE_PERSONALIZATION: &[u8] = b"sesame.scope";

static TOKEN_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").ok());

/// Tell whether `token` may be a v2 token: URL-safe base64, long enough to
/// hold the smallest primary key, the timestamp if any, and a signature
#[must_use]
pub fn detect_token(config: &Config, token: &str) -> bool {
    token.len() >= min_token_len(config)
        && TOKEN_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(token))
}

/// Length of the shortest unscoped token, in base64 characters
fn min_token_len(config: &Config) -> usize {
    let timestamp = if config.max_age().is_some() {
        TIMESTAMP_SIZE
    } else {
        0
    };
    let bytes = config.packer().min_packed_size() + timestamp + config.signature_size();
    (bytes * 4).div_ceil(3)
}

/// Salt identifying a scope inside a token
#[must_use]
pub fn scope_salt(scope: &str) -> [u8; SCOPE_SALT_SIZE] {
    let hash = Params::new()
        .hash_length(SCOPE_SALT_SIZE)
        .personal(SCOPE_PERSONALIZATION)
        .hash(scope.as_bytes());
    let mut salt = [0u8; SCOPE_SALT_SIZE];
    salt.copy_from_slice(hash.as_bytes());
    salt
}

fn pack_timestamp(now: DateTime<Utc>) -> Result<[u8; TIMESTAMP_SIZE]> {
    let offset = now.timestamp().saturating_sub(TIMESTAMP_OFFSET);
    let timestamp = i32::try_from(offset).map_err(|_| TokenError::TimestampOutOfRange)?;
    Ok(timestamp.to_be_bytes())
}

fn unpack_timestamp(data: &[u8]) -> Option<(i64, &[u8])> {
    let (head, rest) = data.split_at_checked(TIMESTAMP_SIZE)?;
    let timestamp = i32::from_be_bytes(head.try_into().ok()?);
    Some((i64::from(timestamp) + TIMESTAMP_OFFSET, rest))
}

fn signature(
    key: &DerivedKey,
    size: usize,
    prefix: &[u8],
    revocation_key: &[u8],
    scope: &str,
) -> Vec<u8> {
    Params::new()
        .hash_length(size)
        .key(key.as_bytes())
        .personal(SIGNATURE_PERSONALIZATION)
        .to_state()
        .update(prefix)
        .update(revocation_key)
        .update(scope.as_bytes())
        .finalize()
        .as_bytes()
        .to_vec()
}

/// Create a v2 token for `user`, identified by `primary_key`
///
/// # Errors
///
/// Fails when the packer rejects the primary key or when the clock can't be
/// encoded in a timestamp.
pub fn create_token<U: User + ?Sized>(
    config: &Config,
    user: &U,
    primary_key: &PrimaryKey,
    scope: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let mut data = config.packer().pack_pk(primary_key)?;
    if config.max_age().is_some() {
        data.extend_from_slice(&pack_timestamp(now)?);
    }
    if !scope.is_empty() {
        data.extend_from_slice(&scope_salt(scope));
    }
    let revocation_key = config.revocation().derive(user);
    let signature = signature(
        config.keys().signing(),
        config.signature_size(),
        &data,
        &revocation_key,
        scope,
    );
    data.extend_from_slice(&signature);
    Ok(b64_encode(&data))
}

/// Verify a v2 token and return its user
///
/// # Errors
///
/// Returns the kind of the first check that failed.
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
    let token_prefix = redact(token);

    let data = b64_decode(token).map_err(|err| {
        tracing::debug!(token = %token_prefix, error = %err, "Bad token: cannot decode");
        TokenError::bad_token(BadTokenReason::CannotDecode)
    })?;

    let (primary_key, rest) = unpack_primary_key(config, &data, &token_prefix)?;

    let (timestamp, rest) = if config.max_age().is_some() {
        let (timestamp, rest) = unpack_timestamp(rest).ok_or_else(|| {
            tracing::debug!(token = %token_prefix, "Bad token: cannot extract timestamp");
            TokenError::bad_token(BadTokenReason::CannotExtractTimestamp)
        })?;
        (Some(timestamp), rest)
    } else {
        (None, rest)
    };

    // A token for another kind of scope, default or named, differs from the
    // expected length by exactly one scope salt.
    let unscoped_len = config.signature_size();
    let scoped_len = unscoped_len + SCOPE_SALT_SIZE;
    let (expected_len, other_len) = if scope.is_empty() {
        (unscoped_len, scoped_len)
    } else {
        (scoped_len, unscoped_len)
    };
    let scope_mismatch = if rest.len() == expected_len {
        false
    } else if rest.len() == other_len {
        true
    } else if !scope.is_empty() && rest.len() < SCOPE_SALT_SIZE {
        tracing::debug!(token = %token_prefix, "Bad token: cannot extract scope");
        return Err(TokenError::bad_token(BadTokenReason::CannotExtractScope));
    } else {
        tracing::debug!(token = %token_prefix, "Bad token: cannot extract signature");
        return Err(TokenError::bad_token(BadTokenReason::CannotExtractSignature));
    };

    if let (Some(timestamp), Some(max_age)) = (timestamp, effective_max_age(config, max_age)) {
        let age = now.timestamp().saturating_sub(timestamp);
        if age > max_age.num_seconds() {
            tracing::debug!(token = %token_prefix, "Expired token: age = {age} seconds");
            return Err(TokenError::ExpiredToken {
                age: Duration::seconds(age),
            });
        }
    }

    let Some(user) = get_user(&primary_key).filter(User::is_active) else {
        tracing::debug!(token = %token_prefix, "Unknown or inactive user: pk = {primary_key}");
        return Err(TokenError::UnknownOrInactiveUser);
    };

    let signature_matches = !scope_mismatch && {
        let (signed, token_signature) = data.split_at(data.len() - config.signature_size());
        let salt = &signed[signed.len() - (expected_len - unscoped_len)..];
        let scope_matches = scope.is_empty() || bool::from(salt.ct_eq(&scope_salt(scope)));
        let revocation_key = config.revocation().derive(&user);
        scope_matches
            && config.keys().verification().any(|key| {
                let expected = signature(
                    key,
                    config.signature_size(),
                    signed,
                    &revocation_key,
                    scope,
                );
                bool::from(expected.ct_eq(token_signature))
            })
    };
    if !signature_matches {
        tracing::debug!(
            token = %token_prefix,
            "Invalid token for user {primary_key} in {}",
            describe_scope(scope)
        );
        return Err(TokenError::InvalidToken);
    }

    tracing::debug!(
        token = %token_prefix,
        "Valid token for user {primary_key} in {}",
        describe_scope(scope)
    );
    Ok(user)
}
