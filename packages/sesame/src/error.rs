//! Error types for token creation, parsing and configuration loading.
//!
//! Per-request failures ([`TokenError`]) are recovered by `parse_token` and
//! reported through logs only. Configuration failures ([`ConfigError`]) are
//! raised once, when settings are loaded, and are never swallowed.

use chrono::Duration;
use std::fmt;
use thiserror::Error;

/// Result type for token operations
pub type Result<T> = std::result::Result<T, TokenError>;

/// Why a token was rejected before any cryptographic check succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadTokenReason {
    /// Not valid base64url
    CannotDecode,
    /// Too short to contain the primary key
    CannotExtractPrimaryKey,
    /// Too short to contain the timestamp
    CannotExtractTimestamp,
    /// Too short to contain the scope salt
    CannotExtractScope,
    /// Remaining bytes don't match the signature size
    CannotExtractSignature,
    /// Primary key bytes were rejected by the packer
    UnexpectedPrimaryKey,
    /// Signature of a v1 token is malformed or doesn't match
    BadSignature,
    /// Signature is valid but the payload doesn't have the expected shape
    UnexpectedPayload,
    /// No enabled token format recognizes the token
    UnsupportedFormat,
}

impl fmt::Display for BadTokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::CannotDecode => "cannot decode",
            Self::CannotExtractPrimaryKey => "cannot extract primary key",
            Self::CannotExtractTimestamp => "cannot extract timestamp",
            Self::CannotExtractScope => "cannot extract scope",
            Self::CannotExtractSignature => "cannot extract signature",
            Self::UnexpectedPrimaryKey => "unexpected primary key",
            Self::BadSignature => "bad signature",
            Self::UnexpectedPayload => "unexpected payload",
            Self::UnsupportedFormat => "doesn't match a supported format",
        };
        f.write_str(reason)
    }
}

/// Token creation and verification errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed, undecodable or structurally wrong token
    #[error("Bad token: {0}")]
    BadToken(BadTokenReason),

    /// Valid signature, but older than the effective max age
    #[error("Expired token: age = {} seconds", .age.num_seconds())]
    ExpiredToken {
        /// Age of the token when it was checked
        age: Duration,
    },

    /// Well-formed token whose signature, scope or revocation key doesn't match
    #[error("Invalid token")]
    InvalidToken,

    /// The primary key doesn't resolve to an active user
    #[error("Unknown or inactive user")]
    UnknownOrInactiveUser,

    /// v1 tokens can't carry a scope
    #[error("v1 tokens don't support scope")]
    ScopeNotSupported,

    /// The user has no value for the configured identifier field
    #[error("User has no value for field {0}")]
    MissingPrimaryKey(String),

    /// The clock is outside the range a token timestamp can encode
    #[error("Current time can't be encoded in a token timestamp")]
    TimestampOutOfRange,

    /// The primary key couldn't be packed
    #[error(transparent)]
    Pack(#[from] PackError),
}

impl TokenError {
    /// Create a bad token error
    #[inline]
    #[must_use]
    pub fn bad_token(reason: BadTokenReason) -> Self {
        TokenError::BadToken(reason)
    }

    /// Tell whether this error comes from the caller rather than from the token
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            TokenError::ScopeNotSupported
                | TokenError::MissingPrimaryKey(_)
                | TokenError::TimestampOutOfRange
                | TokenError::Pack(_)
        )
    }
}

/// Primary key packing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// The value doesn't fit the encoding
    #[error("primary key is out of range: {0}")]
    ValueOutOfRange(String),

    /// The value has a type this packer doesn't handle
    #[error("packer {packer} can't pack {value}")]
    TypeMismatch {
        /// Packer name
        packer: &'static str,
        /// Offending value
        value: String,
    },

    /// Not enough bytes to unpack a value
    #[error("not enough data to unpack primary key: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// String primary key isn't valid UTF-8
    #[error("primary key isn't valid UTF-8")]
    InvalidUtf8,

    /// A custom packer rejected its input
    #[error("{0}")]
    Invalid(String),
}

/// Configuration errors, raised when settings are loaded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No packer exists for the identifier's storage type
    #[error("{0} primary keys aren't supported")]
    UnsupportedKeyType(String),

    /// Tokens would never expire nor be revoked
    #[error(
        "insecure configuration: set max_age to a low value \
         or set invalidate_on_password_change to true"
    )]
    InsecureConfiguration,

    /// Settings are inconsistent with each other or with the user schema
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ConfigError {
    /// Create an invalid configuration error
    #[inline]
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::InvalidConfiguration(msg.into())
    }
}
