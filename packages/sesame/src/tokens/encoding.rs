//! Text encodings used in tokens.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

/// URL-safe base64 without padding.
///
/// Decoding accepts padded input and non-zero trailing bits, like the
/// standard library decoders that produced tokens in the past.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Base64 URL-safe encoding without padding
#[inline]
pub(crate) fn b64_encode(input: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(input)
}

/// Base64 URL-safe decoding, padding optional
#[inline]
pub(crate) fn b64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(input)
}

/// Base62 encoding of an integer, with a leading `-` when negative
pub(crate) fn b62_encode(value: i64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut n = value.unsigned_abs();
    let mut digits = Vec::new();
    while n > 0 {
        let digit = (n % 62) as usize;
        digits.push(BASE62_ALPHABET[digit]);
        n /= 62;
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.iter().rev().map(|&b| char::from(b)).collect()
}

/// Inverse of [`b62_encode`]; `None` on invalid digits or overflow
pub(crate) fn b62_decode(input: &str) -> Option<i64> {
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    if digits.is_empty() {
        return None;
    }
    let mut value: i64 = 0;
    for c in digits.bytes() {
        let digit = BASE62_ALPHABET.iter().position(|&b| b == c)?;
        value = value.checked_mul(62)?.checked_add(i64::try_from(digit).ok()?)?;
    }
    Some(if negative { -value } else { value })
}
