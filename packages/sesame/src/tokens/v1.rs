//! v1 tokens.
//!
//! A v1 token is the base64 encoding of the packed primary key followed by
//! the revocation key, signed with [`Signer`](super::signer::Signer):
//! `payload:signature`, or `payload:timestamp:signature` when max_age is set.
//! v1 tokens don't support scopes.

use super::encoding::{b64_decode, b64_encode};
use super::signer::UnsignError;
use super::{effective_max_age, unpack_primary_key};
use crate::config::Config;
use crate::error::{BadTokenReason, Result, TokenError};
use crate::logging::redact;
use crate::packers::PrimaryKey;
use crate::user::User;
use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;

/// Tell whether `token` may be a v1 token under this configuration
#[must_use]
pub fn detect_token(config: &Config, token: &str) -> bool {
    config.v1_pattern().is_match(token)
}

fn reject_scope(scope: &str) -> Result<()> {
    if scope.is_empty() {
        Ok(())
    } else {
        tracing::error!(scope, "v1 tokens don't support scope");
        Err(TokenError::ScopeNotSupported)
    }
}

/// Create a v1 token for `user`, identified by `primary_key`
///
/// # Errors
///
/// Returns [`TokenError::ScopeNotSupported`] for a non-empty scope and
/// [`TokenError::Pack`] when the packer rejects the primary key.
pub fn create_token<U: User + ?Sized>(
    config: &Config,
    user: &U,
    primary_key: &PrimaryKey,
    scope: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    reject_scope(scope)?;
    let mut data = config.packer().pack_pk(primary_key)?;
    data.extend_from_slice(&config.revocation().derive(user));
    Ok(config.signer().sign(&b64_encode(&data), now))
}

/// Verify a v1 token and return its user
///
/// # Errors
///
/// Returns [`TokenError::ScopeNotSupported`] for a non-empty scope, else the
/// kind of the first check that failed.
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
    reject_scope(scope)?;
    let token_prefix = redact(token);

    let max_age = effective_max_age(config, max_age);
    let payload = match config.signer().unsign(token, max_age, now) {
        Ok(payload) => payload,
        Err(UnsignError::BadSignature) => {
            tracing::debug!(token = %token_prefix, "Bad token: bad signature");
            return Err(TokenError::bad_token(BadTokenReason::BadSignature));
        }
        Err(UnsignError::Expired { age }) => {
            tracing::debug!(token = %token_prefix, "Expired token: age = {age} seconds");
            return Err(TokenError::ExpiredToken {
                age: Duration::seconds(age),
            });
        }
        Err(UnsignError::MalformedTimestamp) => return Err(unexpected_payload(&token_prefix)),
    };
    let data = b64_decode(payload).map_err(|_| unexpected_payload(&token_prefix))?;

    let (primary_key, revocation_key) = unpack_primary_key(config, &data, &token_prefix)?;

    let Some(user) = get_user(&primary_key).filter(User::is_active) else {
        tracing::debug!(token = %token_prefix, "Unknown or inactive user: pk = {primary_key}");
        return Err(TokenError::UnknownOrInactiveUser);
    };

    let expected = config.revocation().derive(&user);
    if !bool::from(expected.ct_eq(revocation_key)) {
        tracing::debug!(token = %token_prefix, "Invalid token for user {primary_key}");
        return Err(TokenError::InvalidToken);
    }

    tracing::debug!(token = %token_prefix, "Valid token for user {primary_key}");
    Ok(user)
}

fn unexpected_payload(token_prefix: &str) -> TokenError {
    tracing::error!(
        token = %token_prefix,
        "Valid signature but unexpected token; if you enabled or disabled max_age, \
         you must regenerate tokens"
    );
    TokenError::bad_token(BadTokenReason::UnexpectedPayload)
}
