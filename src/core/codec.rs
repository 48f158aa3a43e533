//! # Value Codec
//!
//! Byte-level encoding of [`Value`] payloads, used by hash-array persistence.
//!
//! ## Wire Format
//! ```text
//! Integer: [i32 BE]
//! Text:    [Length(4)] [UTF-8 bytes]        (no terminator on the wire)
//! Blob:    [Length(4)] [bytes]
//! ```
//!
//! All readers are bounds-checked: a length that runs past the end of the
//! input is reported as `CorruptData` before anything is allocated.

use bytes::{Buf, BufMut, BytesMut};

use crate::core::value::{Value, ValueKind, INT_SIZE};
use crate::error::{constants, LipcError, Result};

/// Encoder/decoder for value payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec;

impl ValueCodec {
    /// Encode a value payload into a fresh buffer
    pub fn encode(value: &Value) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::encoded_len(value));
        Self::encode_into(value, &mut buf);
        buf.to_vec()
    }

    /// Append a value payload to `dst`
    pub fn encode_into(value: &Value, dst: &mut BytesMut) {
        match value {
            Value::Integer(v) => dst.put_i32(*v),
            Value::Text(s) => put_bytes(dst, s.as_bytes()),
            Value::Blob(b) => put_bytes(dst, b),
        }
    }

    /// Number of bytes `encode` produces for `value`
    pub fn encoded_len(value: &Value) -> usize {
        match value {
            Value::Integer(_) => INT_SIZE,
            Value::Text(s) => 4 + s.len(),
            Value::Blob(b) => 4 + b.len(),
        }
    }

    /// Decode a complete payload of the given kind. Leftover bytes are an error.
    pub fn decode(mut src: &[u8], kind: ValueKind) -> Result<Value> {
        let value = Self::decode_from(&mut src, kind)?;
        if src.has_remaining() {
            return Err(LipcError::CorruptData(
                constants::ERR_TRAILING_BYTES.to_string(),
            ));
        }
        Ok(value)
    }

    /// Decode one payload of the given kind, advancing `src` past it
    pub fn decode_from(src: &mut &[u8], kind: ValueKind) -> Result<Value> {
        match kind {
            ValueKind::Integer => {
                ensure_remaining(src, INT_SIZE)?;
                Ok(Value::Integer(src.get_i32()))
            }
            ValueKind::Text => get_text(src).map(Value::Text),
            ValueKind::Blob => get_bytes(src).map(Value::Blob),
        }
    }
}

/// Append a length-prefixed byte string
pub(crate) fn put_bytes(dst: &mut BytesMut, bytes: &[u8]) {
    dst.put_u32(bytes.len() as u32);
    dst.put_slice(bytes);
}

/// Read a length-prefixed byte string
pub(crate) fn get_bytes(src: &mut &[u8]) -> Result<Vec<u8>> {
    let len = get_u32(src)? as usize;
    ensure_remaining(src, len)?;
    let bytes = src[..len].to_vec();
    src.advance(len);
    Ok(bytes)
}

/// Read a length-prefixed UTF-8 string
pub(crate) fn get_text(src: &mut &[u8]) -> Result<String> {
    let bytes = get_bytes(src)?;
    String::from_utf8(bytes)
        .map_err(|_| LipcError::CorruptData(constants::ERR_INVALID_UTF8.to_string()))
}

pub(crate) fn get_u32(src: &mut &[u8]) -> Result<u32> {
    ensure_remaining(src, 4)?;
    Ok(src.get_u32())
}

pub(crate) fn get_u8(src: &mut &[u8]) -> Result<u8> {
    ensure_remaining(src, 1)?;
    Ok(src.get_u8())
}

#[inline]
pub(crate) fn ensure_remaining(src: &[u8], needed: usize) -> Result<()> {
    if src.remaining() < needed {
        return Err(LipcError::CorruptData(constants::ERR_TRUNCATED.to_string()));
    }
    Ok(())
}
