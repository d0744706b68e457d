//! Length-prefixed packers

use super::{Packer, PrimaryKey};
use crate::error::PackError;

/// Byte strings from 0 to 255 bytes, behind a 1-byte length prefix
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesPacker;

impl Packer for BytesPacker {
    fn pack_pk(&self, pk: &PrimaryKey) -> Result<Vec<u8>, PackError> {
        match pk {
            PrimaryKey::Bytes(bytes) => with_length_prefix(bytes, "bytes"),
            other => Err(PackError::TypeMismatch {
                packer: "BytesPacker",
                value: other.to_string(),
            }),
        }
    }

    fn unpack_pk<'a>(&self, data: &'a [u8]) -> Result<(PrimaryKey, &'a [u8]), PackError> {
        let (value, rest) = split_length_prefixed(data)?;
        Ok((PrimaryKey::Bytes(value.to_vec()), rest))
    }

    fn min_packed_size(&self) -> usize {
        1
    }
}

/// Strings from 0 to 255 UTF-8 encoded bytes, behind a 1-byte length prefix
#[derive(Debug, Clone, Copy, Default)]
pub struct StrPacker;

impl Packer for StrPacker {
    fn pack_pk(&self, pk: &PrimaryKey) -> Result<Vec<u8>, PackError> {
        match pk {
            PrimaryKey::Str(text) => with_length_prefix(text.as_bytes(), "UTF-8 bytes"),
            other => Err(PackError::TypeMismatch {
                packer: "StrPacker",
                value: other.to_string(),
            }),
        }
    }

    fn unpack_pk<'a>(&self, data: &'a [u8]) -> Result<(PrimaryKey, &'a [u8]), PackError> {
        let (value, rest) = split_length_prefixed(data)?;
        let text = std::str::from_utf8(value).map_err(|_| PackError::InvalidUtf8)?;
        Ok((PrimaryKey::Str(text.to_string()), rest))
    }

    fn min_packed_size(&self) -> usize {
        1
    }
}

fn with_length_prefix(value: &[u8], unit: &str) -> Result<Vec<u8>, PackError> {
    let length = u8::try_from(value.len()).map_err(|_| {
        PackError::ValueOutOfRange(format!(
            "primary key is too large ({} {unit})",
            value.len()
        ))
    })?;
    let mut data = Vec::with_capacity(value.len() + 1);
    data.push(length);
    data.extend_from_slice(value);
    Ok(data)
}

fn split_length_prefixed(data: &[u8]) -> Result<(&[u8], &[u8]), PackError> {
    let Some((&length, rest)) = data.split_first() else {
        return Err(PackError::Truncated {
            expected: 1,
            actual: 0,
        });
    };
    let length = usize::from(length);
    if rest.len() < length {
        return Err(PackError::Truncated {
            expected: length + 1,
            actual: data.len(),
        });
    }
    Ok(rest.split_at(length))
}
