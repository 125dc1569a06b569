//! Document encoder.
//!
//! Documents are stored as a deterministic subset of CBOR (RFC 8949):
//! shortest-form integer heads, definite lengths only, 64-bit floats, and
//! arrays kept in insertion order. Lists (keys `0..n`) encode as CBOR arrays;
//! every other array encodes as a CBOR map.

use crate::error::{CodecError, CodecResult};
use crate::value::{ArrayKey, ArrayMap, Value};

/// Maximum nesting depth accepted by the encoder and decoder.
pub const MAX_DEPTH: usize = 128;

/// Encode a value into document bytes.
///
/// # Errors
///
/// Returns an error if the value contains a resource handle or nests deeper
/// than [`MAX_DEPTH`].
pub fn to_document(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = DocumentEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A document encoder writing into an owned buffer.
pub struct DocumentEncoder {
    buffer: Vec<u8>,
    depth: usize,
}

impl DocumentEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            depth: 0,
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Int(n) => self.encode_integer(*n),
            Value::Real(r) => {
                self.buffer.push(0xfb);
                self.buffer.extend_from_slice(&r.to_bits().to_be_bytes());
            }
            Value::String(s) => self.encode_string(s),
            Value::Array(map) => self.encode_array(map)?,
            Value::Resource(_) => {
                return Err(CodecError::encoding_failed(
                    "resource handles cannot be stored",
                ))
            }
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_head(0, n as u64);
        } else {
            // CBOR negative integers encode -(n+1)
            let abs_minus_one = (-(n + 1)) as u64;
            self.encode_head(1, abs_minus_one);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_head(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_string(&mut self, bytes: &[u8]) {
        // Valid UTF-8 goes out as a text string, anything else as a byte string.
        let major = if std::str::from_utf8(bytes).is_ok() { 3 } else { 2 };
        self.encode_head(major, bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    fn encode_key(&mut self, key: &ArrayKey) {
        match key {
            ArrayKey::Int(i) => self.encode_integer(*i),
            ArrayKey::Str(s) => self.encode_string(s),
        }
    }

    fn encode_array(&mut self, map: &ArrayMap) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::TooDeep { max: MAX_DEPTH });
        }
        self.depth += 1;
        if map.is_list() {
            self.encode_head(4, map.len() as u64);
            for item in map.values() {
                self.encode(item)?;
            }
        } else {
            self.encode_head(5, map.len() as u64);
            for (key, item) in map.iter() {
                self.encode_key(key);
                self.encode(item)?;
            }
        }
        self.depth -= 1;
        Ok(())
    }
}

impl Default for DocumentEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_scalars() {
        assert_eq!(to_document(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_document(&Value::Bool(false)).unwrap(), vec![0xf4]);
        assert_eq!(to_document(&Value::Bool(true)).unwrap(), vec![0xf5]);
        assert_eq!(to_document(&Value::Int(23)).unwrap(), vec![0x17]);
        assert_eq!(to_document(&Value::Int(24)).unwrap(), vec![0x18, 24]);
        assert_eq!(to_document(&Value::Int(-1)).unwrap(), vec![0x20]);
        assert_eq!(to_document(&Value::Int(-25)).unwrap(), vec![0x38, 24]);
        assert_eq!(
            to_document(&Value::Int(1000)).unwrap(),
            vec![0x19, 0x03, 0xe8]
        );
    }

    #[test]
    fn encode_extreme_integers() {
        let max = to_document(&Value::Int(i64::MAX)).unwrap();
        assert_eq!(max[0], 0x1b);
        let min = to_document(&Value::Int(i64::MIN)).unwrap();
        assert_eq!(min, vec![0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn encode_float_as_f64() {
        let bytes = to_document(&Value::Real(1.5)).unwrap();
        assert_eq!(bytes[0], 0xfb);
        assert_eq!(&bytes[1..], &1.5f64.to_bits().to_be_bytes());
    }

    #[test]
    fn encode_text_and_bytes() {
        assert_eq!(to_document(&Value::str("a")).unwrap(), vec![0x61, b'a']);
        assert_eq!(
            to_document(&Value::bytes(vec![0xff])).unwrap(),
            vec![0x41, 0xff]
        );
    }

    #[test]
    fn list_encodes_as_cbor_array() {
        let bytes = to_document(&Value::list([Value::Int(1), Value::Int(2)])).unwrap();
        assert_eq!(bytes, vec![0x82, 0x01, 0x02]);
    }

    #[test]
    fn map_keeps_insertion_order() {
        let mut map = ArrayMap::new();
        map.insert("b".into(), Value::Int(1));
        map.insert("a".into(), Value::Int(2));
        let bytes = to_document(&Value::array(map)).unwrap();
        assert_eq!(bytes, vec![0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02]);
    }

    #[test]
    fn resource_is_rejected() {
        assert!(matches!(
            to_document(&Value::Resource(3)),
            Err(CodecError::EncodingFailed { .. })
        ));
    }

    #[test]
    fn nesting_limit_is_enforced() {
        let mut v = Value::Null;
        for _ in 0..=MAX_DEPTH {
            v = Value::list([v]);
        }
        assert!(matches!(to_document(&v), Err(CodecError::TooDeep { .. })));
    }
}
