//! Fixed-width packers: big-endian integers and raw UUIDs

use super::{Packer, PrimaryKey};
use crate::error::PackError;
use uuid::Uuid;

macro_rules! int_packer {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $variant:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl $name {
            /// Encoded size in bytes
            pub const SIZE: usize = std::mem::size_of::<$ty>();
        }

        impl Packer for $name {
            fn pack_pk(&self, pk: &PrimaryKey) -> Result<Vec<u8>, PackError> {
                let value = pk.as_i128().ok_or_else(|| PackError::TypeMismatch {
                    packer: stringify!($name),
                    value: pk.to_string(),
                })?;
                let value = <$ty>::try_from(value).map_err(|_| {
                    PackError::ValueOutOfRange(format!(
                        "{value} doesn't fit in {}",
                        stringify!($ty)
                    ))
                })?;
                Ok(value.to_be_bytes().to_vec())
            }

            fn unpack_pk<'a>(&self, data: &'a [u8]) -> Result<(PrimaryKey, &'a [u8]), PackError> {
                if data.len() < Self::SIZE {
                    return Err(PackError::Truncated {
                        expected: Self::SIZE,
                        actual: data.len(),
                    });
                }
                let (head, rest) = data.split_at(Self::SIZE);
                let bytes = head.try_into().map_err(|_| PackError::Truncated {
                    expected: Self::SIZE,
                    actual: head.len(),
                })?;
                Ok((PrimaryKey::$variant(<$ty>::from_be_bytes(bytes)), rest))
            }

            fn min_packed_size(&self) -> usize {
                Self::SIZE
            }
        }
    };
}

int_packer!(
    /// 2-byte signed integers
    ShortPacker,
    i16,
    SmallInt
);
int_packer!(
    /// 2-byte unsigned integers
    UnsignedShortPacker,
    u16,
    PositiveSmallInt
);
int_packer!(
    /// 4-byte signed integers, the default for auto-increment keys
    LongPacker,
    i32,
    Int
);
int_packer!(
    /// 4-byte unsigned integers
    UnsignedLongPacker,
    u32,
    PositiveInt
);
int_packer!(
    /// 8-byte signed integers
    LongLongPacker,
    i64,
    BigInt
);
int_packer!(
    /// 8-byte unsigned integers
    UnsignedLongLongPacker,
    u64,
    PositiveBigInt
);

/// 16-byte raw UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidPacker;

impl UuidPacker {
    /// Encoded size in bytes
    pub const SIZE: usize = 16;
}

impl Packer for UuidPacker {
    fn pack_pk(&self, pk: &PrimaryKey) -> Result<Vec<u8>, PackError> {
        match pk {
            PrimaryKey::Uuid(uuid) => Ok(uuid.as_bytes().to_vec()),
            other => Err(PackError::TypeMismatch {
                packer: "UuidPacker",
                value: other.to_string(),
            }),
        }
    }

    fn unpack_pk<'a>(&self, data: &'a [u8]) -> Result<(PrimaryKey, &'a [u8]), PackError> {
        if data.len() < Self::SIZE {
            return Err(PackError::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let (head, rest) = data.split_at(Self::SIZE);
        let uuid = Uuid::from_slice(head).map_err(|e| PackError::Invalid(e.to_string()))?;
        Ok((PrimaryKey::Uuid(uuid), rest))
    }

    fn min_packed_size(&self) -> usize {
        Self::SIZE
    }
}
