//! Wire primitives shared with the backend's stack-dump parser.
//!
//! All multi-byte values are big-endian. Compressed integers use the top bits of
//! the first byte to carry their own length, so a reader never needs a separate
//! length field.

use crate::query::error::EncodeError;

/// Largest value accepted by [`put_compressed_positive`].
pub const MAX_COMPRESSED_POSITIVE: u32 = (1 << 30) - 1;

/// Largest magnitude accepted by [`put_compressed_number`].
pub const MAX_COMPRESSED_NUMBER: i32 = (1 << 29) - 1;

/// Encode a non-negative integer in 1, 2 or 4 bytes.
///
/// `0xxxxxxx` holds 7 bits, `10xxxxxx xxxxxxxx` 14 bits and
/// `11xxxxxx` followed by three bytes 30 bits.
pub fn put_compressed_positive(value: u32, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    if value < 0x80 {
        buf.push(value as u8);
    } else if value < 0x4000 {
        buf.extend_from_slice(&((value | 0x8000) as u16).to_be_bytes());
    } else if value < 0x4000_0000 {
        buf.extend_from_slice(&(value | 0xC000_0000).to_be_bytes());
    } else {
        return Err(EncodeError::NumberTooLarge(i64::from(value)));
    }
    Ok(())
}

/// Decode a non-negative compressed integer.
/// Returns (value, bytes_consumed)
pub fn get_compressed_positive(buf: &[u8]) -> Option<(u32, usize)> {
    let first = *buf.first()?;
    match first >> 6 {
        0 | 1 => Some((u32::from(first), 1)),
        2 => {
            let bytes: [u8; 2] = buf.get(..2)?.try_into().ok()?;
            Some((u32::from(u16::from_be_bytes(bytes) & 0x3FFF), 2))
        }
        _ => {
            let bytes: [u8; 4] = buf.get(..4)?.try_into().ok()?;
            Some((u32::from_be_bytes(bytes) & 0x3FFF_FFFF, 4))
        }
    }
}

/// Encode a signed integer in 1, 2 or 4 bytes.
///
/// Bit 7 of the first byte is the sign. Bit 6 clear means a 1-byte value with
/// 6 magnitude bits; otherwise bit 5 clear means 2 bytes (13 bits) and bit 5
/// set means 4 bytes (29 bits).
pub fn put_compressed_number(value: i32, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    let negative = value < 0;
    let magnitude = value.unsigned_abs();
    let sign: u32 = if negative { 0x80 } else { 0 };

    if magnitude < (1 << 6) {
        buf.push((magnitude | sign) as u8);
    } else if magnitude < (1 << 13) {
        let word = magnitude | 0x4000 | (sign << 8);
        buf.extend_from_slice(&(word as u16).to_be_bytes());
    } else if magnitude < (1 << 29) {
        let word = magnitude | 0x6000_0000 | (sign << 24);
        buf.extend_from_slice(&word.to_be_bytes());
    } else {
        return Err(EncodeError::NumberTooLarge(i64::from(value)));
    }
    Ok(())
}

/// Decode a signed compressed integer.
/// Returns (value, bytes_consumed)
pub fn get_compressed_number(buf: &[u8]) -> Option<(i32, usize)> {
    let first = *buf.first()?;
    let negative = first & 0x80 != 0;
    let (magnitude, consumed) = if first & 0x40 == 0 {
        (u32::from(first & 0x3F), 1)
    } else if first & 0x20 == 0 {
        let bytes: [u8; 2] = buf.get(..2)?.try_into().ok()?;
        (u32::from(u16::from_be_bytes(bytes) & 0x1FFF), 2)
    } else {
        let bytes: [u8; 4] = buf.get(..4)?.try_into().ok()?;
        (u32::from_be_bytes(bytes) & 0x1FFF_FFFF, 4)
    };
    let value = magnitude as i32;
    Some((if negative { -value } else { value }, consumed))
}

/// Write a length-prefixed UTF-8 string
pub fn put_string(value: &str, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
    let len = u32::try_from(value.len())
        .map_err(|_| EncodeError::NumberTooLarge(value.len() as i64))?;
    put_compressed_positive(len, buf)?;
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Read a length-prefixed UTF-8 string.
/// Returns (string, bytes_consumed)
pub fn get_string(buf: &[u8]) -> Option<(&str, usize)> {
    let (len, header) = get_compressed_positive(buf)?;
    let end = header.checked_add(len as usize)?;
    let bytes = buf.get(header..end)?;
    let text = std::str::from_utf8(bytes).ok()?;
    Some((text, end))
}

/// Write an i64 in big-endian format
#[inline]
pub fn put_i64(value: i64, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Write a u64 in big-endian format
#[inline]
pub fn put_u64(value: u64, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Write an f64 in big-endian IEEE 754 format
#[inline]
pub fn put_f64(value: f64, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_bits().to_be_bytes());
}

/// Read an i64 in big-endian format
pub fn get_i64(buf: &[u8]) -> Option<i64> {
    let bytes: [u8; 8] = buf.get(..8)?.try_into().ok()?;
    Some(i64::from_be_bytes(bytes))
}

/// Read a u64 in big-endian format
pub fn get_u64(buf: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = buf.get(..8)?.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Read an f64 in big-endian format
pub fn get_f64(buf: &[u8]) -> Option<f64> {
    get_u64(buf).map(f64::from_bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive(value: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        put_compressed_positive(value, &mut buf).unwrap();
        buf
    }

    fn signed(value: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        put_compressed_number(value, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_positive_byte_lengths() {
        assert_eq!(positive(0), vec![0x00]);
        assert_eq!(positive(127), vec![0x7F]);
        assert_eq!(positive(128), vec![0x80, 0x80]);
        assert_eq!(positive(0x3FFF), vec![0xBF, 0xFF]);
        assert_eq!(positive(0x4000), vec![0xC0, 0x00, 0x40, 0x00]);
    }

    #[test]
    fn test_positive_roundtrip() {
        let values = [0, 1, 127, 128, 16383, 16384, MAX_COMPRESSED_POSITIVE];
        for value in values {
            let buf = positive(value);
            let (decoded, consumed) = get_compressed_positive(&buf).unwrap();
            assert_eq!(value, decoded);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_positive_too_large() {
        let mut buf = Vec::new();
        assert!(put_compressed_positive(1 << 30, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_signed_byte_lengths() {
        assert_eq!(signed(100), vec![0x40, 100]);
        assert_eq!(signed(63), vec![63]);
        assert_eq!(signed(-1), vec![0x81]);
        assert_eq!(signed(-100), vec![0xC0, 100]);
        assert_eq!(signed(8192), vec![0x60, 0x00, 0x20, 0x00]);
    }

    #[test]
    fn test_signed_roundtrip() {
        let values = [0, 1, -1, 63, -63, 64, -64, 8191, -8191, 8192, -8192, MAX_COMPRESSED_NUMBER];
        for value in values {
            let buf = signed(value);
            let (decoded, consumed) = get_compressed_number(&buf).unwrap();
            assert_eq!(value, decoded, "value {value} bytes {buf:?}");
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_signed_too_large() {
        let mut buf = Vec::new();
        assert!(put_compressed_number(1 << 29, &mut buf).is_err());
        assert!(put_compressed_number(i32::MIN, &mut buf).is_err());
    }

    #[test]
    fn test_string_layout() {
        let mut buf = Vec::new();
        put_string("abc", &mut buf).unwrap();
        assert_eq!(buf, vec![3, b'a', b'b', b'c']);
        assert_eq!(get_string(&buf), Some(("abc", 4)));
        assert_eq!(get_string(&buf[..2]), None);
    }

    #[test]
    fn test_fixed_width() {
        let mut buf = Vec::new();
        put_i64(-2, &mut buf);
        put_f64(0.5, &mut buf);
        assert_eq!(get_i64(&buf), Some(-2));
        assert_eq!(get_f64(&buf[8..]), Some(0.5));
        assert_eq!(get_u64(&buf[12..]), None);
    }
}
