//! Restricted CBOR buffer codec.
//!
//! The macaroon wire format uses a deliberately small slice of CBOR
//! (RFC 8949): unsigned integers up to 32 bits, byte strings, text strings
//! and array length headers. Nothing else is emitted or accepted.
//!
//! ## Contract
//!
//! - **Canonical emission**: integers always use the minimal-length header —
//!   values below 24 live in the type byte, one extra byte up to `0xFF`
//!   (info 24), two up to `0xFFFF` (info 25), four otherwise (info 26). The
//!   8-byte form (info 27) is never emitted and is rejected on decode, as are
//!   the reserved and indefinite forms (28-31).
//! - **No partial writes**: every encoder checks capacity up front and either
//!   writes the complete item or fails leaving the buffer untouched.
//! - **Exact accounting**: encoders return the number of bytes written,
//!   decoders the number consumed, so callers can walk a buffer item by item.
//!
//! Decoders validate the major-type tag before consuming a value and fail on
//! structurally short input. Non-minimal integer headers are accepted on
//! decode; minimality is the encoder's obligation.

use crate::error::{Error, Result};

const MAJOR_UINT: u8 = 0;
const MAJOR_BYTE_STR: u8 = 2;
const MAJOR_TEXT_STR: u8 = 3;
const MAJOR_ARRAY: u8 = 4;

const INFO_U8: u8 = 24;
const INFO_U16: u8 = 25;
const INFO_U32: u8 = 26;

/// Largest possible item header: type byte plus a 4-byte length.
pub const MAX_HEAD_LEN: usize = 5;

fn major_name(major: u8) -> &'static str {
    match major {
        MAJOR_UINT => "unsigned integer",
        MAJOR_BYTE_STR => "byte string",
        MAJOR_TEXT_STR => "text string",
        MAJOR_ARRAY => "array",
        _ => "unsupported",
    }
}

/// Encoded length of a minimal integer header carrying `value`.
pub fn uint_encoded_len(value: u32) -> usize {
    if value < 24 {
        1
    } else if value <= 0xFF {
        2
    } else if value <= 0xFFFF {
        3
    } else {
        5
    }
}

/// Encoded length of a complete byte string item of `len` payload bytes.
///
/// Payloads past the 32-bit length limit cannot be encoded at all; their
/// header size saturates at [`MAX_HEAD_LEN`] so the helper never
/// under-reports.
pub fn byte_str_encoded_len(len: usize) -> usize {
    let head = u32::try_from(len).map_or(MAX_HEAD_LEN, uint_encoded_len);
    head + len
}

/// Encoded length of an array length header for `len` elements.
pub fn array_len_encoded_len(len: u32) -> usize {
    uint_encoded_len(len)
}

fn encode_head(major: u8, value: u32, buf: &mut [u8]) -> Result<usize> {
    let needed = uint_encoded_len(value);
    if buf.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            capacity: buf.len(),
        });
    }
    let tag = major << 5;
    match needed {
        1 => buf[0] = tag | value as u8,
        2 => {
            buf[0] = tag | INFO_U8;
            buf[1] = value as u8;
        }
        3 => {
            buf[0] = tag | INFO_U16;
            buf[1..3].copy_from_slice(&(value as u16).to_be_bytes());
        }
        _ => {
            buf[0] = tag | INFO_U32;
            buf[1..5].copy_from_slice(&value.to_be_bytes());
        }
    }
    Ok(needed)
}

fn decode_head(expected_major: u8, buf: &[u8]) -> Result<(u32, usize)> {
    let first = *buf.first().ok_or(Error::TruncatedInput {
        needed: 1,
        available: 0,
    })?;
    let major = first >> 5;
    if major != expected_major {
        return Err(Error::UnexpectedMajorType {
            expected: major_name(expected_major),
            found: major,
        });
    }
    let info = first & 0x1F;
    let extra = match info {
        0..=23 => return Ok((u32::from(info), 1)),
        INFO_U8 => 1,
        INFO_U16 => 2,
        INFO_U32 => 4,
        _ => return Err(Error::UnsupportedAdditionalInfo(info)),
    };
    if buf.len() < 1 + extra {
        return Err(Error::TruncatedInput {
            needed: 1 + extra,
            available: buf.len(),
        });
    }
    let mut value = 0u32;
    for &b in &buf[1..1 + extra] {
        value = (value << 8) | u32::from(b);
    }
    Ok((value, 1 + extra))
}

/// Encode an unsigned integer. Returns the number of bytes written.
pub fn encode_uint(value: u32, buf: &mut [u8]) -> Result<usize> {
    encode_head(MAJOR_UINT, value, buf)
}

/// Encode an array length header. The caller encodes the elements after it.
pub fn encode_array_len(len: u32, buf: &mut [u8]) -> Result<usize> {
    encode_head(MAJOR_ARRAY, len, buf)
}

/// Encode a byte string length header without its payload.
///
/// Used when the payload is assembled elsewhere, e.g. when feeding a
/// length-prefixed message into a MAC without copying it.
pub fn encode_byte_str_len(len: u32, buf: &mut [u8]) -> Result<usize> {
    encode_head(MAJOR_BYTE_STR, len, buf)
}

/// Encode a complete byte string item. Zero-length strings are valid.
pub fn encode_byte_str(data: &[u8], buf: &mut [u8]) -> Result<usize> {
    let len = u32::try_from(data.len())
        .map_err(|_| Error::InvalidParameter("byte string exceeds 32-bit length"))?;
    let needed = byte_str_encoded_len(data.len());
    if buf.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            capacity: buf.len(),
        });
    }
    let head = encode_head(MAJOR_BYTE_STR, len, buf)?;
    buf[head..head + data.len()].copy_from_slice(data);
    Ok(needed)
}

/// Encode a complete text string item.
pub fn encode_text_str(text: &str, buf: &mut [u8]) -> Result<usize> {
    let data = text.as_bytes();
    let len = u32::try_from(data.len())
        .map_err(|_| Error::InvalidParameter("text string exceeds 32-bit length"))?;
    let needed = byte_str_encoded_len(data.len());
    if buf.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            capacity: buf.len(),
        });
    }
    let head = encode_head(MAJOR_TEXT_STR, len, buf)?;
    buf[head..head + data.len()].copy_from_slice(data);
    Ok(needed)
}

/// Decode an unsigned integer. Returns `(value, bytes_consumed)`.
pub fn decode_uint(buf: &[u8]) -> Result<(u32, usize)> {
    decode_head(MAJOR_UINT, buf)
}

/// Decode an array length header. Returns `(element_count, bytes_consumed)`.
pub fn decode_array_len(buf: &[u8]) -> Result<(u32, usize)> {
    decode_head(MAJOR_ARRAY, buf)
}

/// Decode a byte string. Returns the payload as a zero-copy view into `buf`
/// along with the total number of bytes consumed (header plus payload).
pub fn decode_byte_str(buf: &[u8]) -> Result<(&[u8], usize)> {
    let (len, head) = decode_head(MAJOR_BYTE_STR, buf)?;
    let total = head + len as usize;
    if buf.len() < total {
        return Err(Error::TruncatedInput {
            needed: total,
            available: buf.len(),
        });
    }
    Ok((&buf[head..total], total))
}

/// Decode a text string. Returns the payload and the bytes consumed.
pub fn decode_text_str(buf: &[u8]) -> Result<(&str, usize)> {
    let (len, head) = decode_head(MAJOR_TEXT_STR, buf)?;
    let total = head + len as usize;
    if buf.len() < total {
        return Err(Error::TruncatedInput {
            needed: total,
            available: buf.len(),
        });
    }
    let text = std::str::from_utf8(&buf[head..total]).map_err(|_| Error::InvalidTextString)?;
    Ok((text, total))
}

/// Length of the first item in `buf`, letting callers skip over it.
///
/// For integers this is the header alone (the value lives in the header).
/// For byte and text strings it includes the payload. For arrays it is only
/// the length header; the elements are separate items.
pub fn item_len(buf: &[u8]) -> Result<usize> {
    let first = *buf.first().ok_or(Error::TruncatedInput {
        needed: 1,
        available: 0,
    })?;
    let major = first >> 5;
    match major {
        MAJOR_UINT | MAJOR_ARRAY => {
            let (_, head) = decode_head(major, buf)?;
            Ok(head)
        }
        MAJOR_BYTE_STR | MAJOR_TEXT_STR => {
            let (len, head) = decode_head(major, buf)?;
            let total = head + len as usize;
            if buf.len() < total {
                return Err(Error::TruncatedInput {
                    needed: total,
                    available: buf.len(),
                });
            }
            Ok(total)
        }
        _ => Err(Error::UnsupportedMajorType(major)),
    }
}
