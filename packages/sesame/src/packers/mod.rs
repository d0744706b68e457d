//! Primary key packers.
//!
//! A packer turns a user identifier into a short byte string and back. The
//! packer is chosen once, when settings are loaded, from the storage type of
//! the identifier field or from an explicitly registered custom packer.

mod fixed;
mod variable;

pub use fixed::{
    LongLongPacker, LongPacker, ShortPacker, UnsignedLongLongPacker, UnsignedLongPacker,
    UnsignedShortPacker, UuidPacker,
};
pub use variable::{BytesPacker, StrPacker};

use crate::error::{ConfigError, PackError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Value of a user identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimaryKey {
    /// 2-byte signed integer
    SmallInt(i16),
    /// 2-byte unsigned integer
    PositiveSmallInt(u16),
    /// 4-byte signed integer
    Int(i32),
    /// 4-byte unsigned integer
    PositiveInt(u32),
    /// 8-byte signed integer
    BigInt(i64),
    /// 8-byte unsigned integer
    PositiveBigInt(u64),
    /// UUID
    Uuid(Uuid),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Text
    Str(String),
}

impl PrimaryKey {
    /// Integer value, whatever the width
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::SmallInt(v) => Some(v.into()),
            Self::PositiveSmallInt(v) => Some(v.into()),
            Self::Int(v) => Some(v.into()),
            Self::PositiveInt(v) => Some(v.into()),
            Self::BigInt(v) => Some(v.into()),
            Self::PositiveBigInt(v) => Some(v.into()),
            _ => None,
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallInt(v) => write!(f, "{v}"),
            Self::PositiveSmallInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::PositiveInt(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::PositiveBigInt(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i16> for PrimaryKey {
    fn from(v: i16) -> Self {
        Self::SmallInt(v)
    }
}

impl From<u16> for PrimaryKey {
    fn from(v: u16) -> Self {
        Self::PositiveSmallInt(v)
    }
}

impl From<i32> for PrimaryKey {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for PrimaryKey {
    fn from(v: u32) -> Self {
        Self::PositiveInt(v)
    }
}

impl From<i64> for PrimaryKey {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<u64> for PrimaryKey {
    fn from(v: u64) -> Self {
        Self::PositiveBigInt(v)
    }
}

impl From<Uuid> for PrimaryKey {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<Vec<u8>> for PrimaryKey {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<String> for PrimaryKey {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for PrimaryKey {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// Bidirectional encoding of a primary key.
///
/// `unpack_pk` receives the whole remainder of a token and must consume
/// exactly the bytes `pack_pk` produced, returning the rest untouched.
///
/// Implement this trait and register it with
/// [`PackerRegistry::register_custom`] to support identifiers the built-in
/// packers don't cover.
pub trait Packer: Send + Sync + fmt::Debug {
    /// Create a short representation of a primary key
    ///
    /// # Errors
    ///
    /// Returns [`PackError::ValueOutOfRange`] when the value doesn't fit and
    /// [`PackError::TypeMismatch`] when the packer doesn't handle its type.
    fn pack_pk(&self, pk: &PrimaryKey) -> Result<Vec<u8>, PackError>;

    /// Extract a primary key from the start of `data`
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Truncated`] when `data` is too short.
    fn unpack_pk<'a>(&self, data: &'a [u8]) -> Result<(PrimaryKey, &'a [u8]), PackError>;

    /// Smallest number of bytes `pack_pk` can produce
    ///
    /// Tokens too short to hold this many bytes are rejected before decoding.
    /// The default never rejects anything.
    fn min_packed_size(&self) -> usize {
        0
    }
}

/// Storage types with a built-in packer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// 2-byte signed integer
    SmallInt,
    /// 2-byte unsigned integer
    PositiveSmallInt,
    /// 4-byte signed integer
    Int,
    /// 4-byte unsigned integer
    PositiveInt,
    /// 8-byte signed integer
    BigInt,
    /// 8-byte unsigned integer
    PositiveBigInt,
    /// 16-byte UUID
    Uuid,
    /// Variable-length bytes
    Binary,
    /// Variable-length text
    Text,
}

impl KeyType {
    /// Map a field storage type name to a key type
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        let key_type = match name {
            "SmallAutoField" | "SmallIntegerField" => Self::SmallInt,
            "PositiveSmallIntegerField" => Self::PositiveSmallInt,
            "AutoField" | "IntegerField" => Self::Int,
            "PositiveIntegerField" => Self::PositiveInt,
            "BigAutoField" | "BigIntegerField" => Self::BigInt,
            "PositiveBigIntegerField" => Self::PositiveBigInt,
            "UUIDField" => Self::Uuid,
            "BinaryField" => Self::Binary,
            "CharField" | "TextField" => Self::Text,
            _ => return None,
        };
        Some(key_type)
    }

    /// Built-in packer for this key type
    #[must_use]
    pub fn packer(self) -> Arc<dyn Packer> {
        match self {
            Self::SmallInt => Arc::new(ShortPacker),
            Self::PositiveSmallInt => Arc::new(UnsignedShortPacker),
            Self::Int => Arc::new(LongPacker),
            Self::PositiveInt => Arc::new(UnsignedLongPacker),
            Self::BigInt => Arc::new(LongLongPacker),
            Self::PositiveBigInt => Arc::new(UnsignedLongLongPacker),
            Self::Uuid => Arc::new(UuidPacker),
            Self::Binary => Arc::new(BytesPacker),
            Self::Text => Arc::new(StrPacker),
        }
    }
}

/// Resolves the packer for a configuration
#[derive(Debug, Clone, Default)]
pub struct PackerRegistry {
    custom: HashMap<String, Arc<dyn Packer>>,
}

impl PackerRegistry {
    /// Registry with only the built-in packers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom packer under `name`
    #[must_use]
    pub fn register_custom(mut self, name: impl Into<String>, packer: Arc<dyn Packer>) -> Self {
        self.custom.insert(name.into(), packer);
        self
    }

    /// Built-in packer for a storage type name
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedKeyType`] naming the type when no
    /// built-in packer handles it.
    pub fn for_type_name(&self, type_name: &str) -> Result<Arc<dyn Packer>, ConfigError> {
        KeyType::from_type_name(type_name)
            .map(KeyType::packer)
            .ok_or_else(|| ConfigError::UnsupportedKeyType(type_name.to_string()))
    }

    /// Custom packer registered under `name`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] when nothing is registered
    /// under that name.
    pub fn custom(&self, name: &str) -> Result<Arc<dyn Packer>, ConfigError> {
        self.custom
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::invalid(format!("packer {name} isn't registered")))
    }
}
