//! Document decoder.

use crate::encoder::MAX_DEPTH;
use crate::error::{CodecError, CodecResult};
use crate::value::{ArrayKey, ArrayMap, Value};
use bytes::Bytes;

/// Decode a complete document.
///
/// # Errors
///
/// Returns an error if the bytes are not a well-formed document or if bytes
/// remain after the top-level item.
pub fn from_document(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = DocumentDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// A streaming document decoder over a byte slice.
pub struct DocumentDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

/// Maximum allowed element count for arrays and maps.
/// This prevents allocation-based DoS from corrupt input.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

impl<'a> DocumentDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next value.
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(Value::Int)
                    .map_err(|_| CodecError::invalid_structure("integer out of range"))
            }
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                // Negative integer: value is -(n+1)
                i64::try_from(n)
                    .map(|n| Value::Int(-n - 1))
                    .map_err(|_| CodecError::invalid_structure("integer out of range"))
            }
            2 => {
                let bytes = self.decode_string_bytes(additional_info)?;
                Ok(Value::String(Bytes::copy_from_slice(bytes)))
            }
            3 => {
                let bytes = self.decode_string_bytes(additional_info)?;
                if std::str::from_utf8(bytes).is_err() {
                    return Err(CodecError::invalid_structure("invalid UTF-8 in text string"));
                }
                Ok(Value::String(Bytes::copy_from_slice(bytes)))
            }
            4 => self.decode_list(additional_info),
            5 => self.decode_map(additional_info),
            6 => {
                // Tagged value - skip the tag and decode the value
                let _tag = self.decode_unsigned(additional_info)?;
                self.decode()
            }
            _ => self.decode_simple(additional_info),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        if self.pos >= self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => Ok(u64::from(self.read_byte()?)),
            25 => Ok(u64::from(u16::from_be_bytes(self.read_array()?))),
            26 => Ok(u64::from(u32::from_be_bytes(self.read_array()?))),
            27 => Ok(u64::from_be_bytes(self.read_array()?)),
            31 => Err(CodecError::IndefiniteLength),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn decode_length(&mut self, additional_info: u8, max: u64) -> CodecResult<usize> {
        let len = self.decode_unsigned(additional_info)?;
        if len > max {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: max,
            });
        }
        Ok(len as usize)
    }

    fn decode_string_bytes(&mut self, additional_info: u8) -> CodecResult<&'a [u8]> {
        let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
        self.read_bytes(len)
    }

    fn enter(&mut self) -> CodecResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::TooDeep { max: MAX_DEPTH });
        }
        self.depth += 1;
        Ok(())
    }

    fn decode_list(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        self.enter()?;
        let mut map = ArrayMap::new();
        for _ in 0..len {
            map.push(self.decode()?);
        }
        self.depth -= 1;
        Ok(Value::array(map))
    }

    fn decode_map(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        self.enter()?;
        let mut map = ArrayMap::new();
        for _ in 0..len {
            let key = match self.decode()? {
                Value::Int(i) => ArrayKey::Int(i),
                Value::String(s) => ArrayKey::from_bytes(s),
                other => {
                    return Err(CodecError::invalid_structure(format!(
                        "map key of type {}",
                        other.type_name()
                    )))
                }
            };
            let value = self.decode()?;
            if map.insert(key, value).is_some() {
                return Err(CodecError::invalid_structure("duplicate map key"));
            }
        }
        self.depth -= 1;
        Ok(Value::array(map))
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 | 23 => Ok(Value::Null),
            26 => Ok(Value::Real(f64::from(f32::from_be_bytes(self.read_array()?)))),
            27 => Ok(Value::Real(f64::from_bits(u64::from_be_bytes(
                self.read_array()?,
            )))),
            25 => Err(CodecError::unsupported_type("half-precision float")),
            31 => Err(CodecError::IndefiniteLength),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}
