//! The binary wire codec.
//!
//! The wire is a stream of tagged tokens: the first byte of every token (the
//! *wire tag*) selects its encoding. See the module-level constants below for
//! the full tag table.
//!
//! This module operates purely on byte buffers supplied by the caller
//! (a `&mut Vec<u8>` for writing, a `&[u8]` cursor for reading) -- there is
//! no I/O here, just numeric encode/decode routines over an owned buffer.

use crate::error::WireError;

/// 0..=231 is reserved for literal small non-negative integers (value == tag).
pub const TAG_SMALL_INT_MAX: u8 = 231;
pub const TAG_UINT16: u8 = 232;
pub const TAG_UINT32: u8 = 233;
pub const TAG_UINT64: u8 = 234;
pub const TAG_NEG_INT8: u8 = 235;
pub const TAG_NEG_INT16: u8 = 236;
pub const TAG_INT32: u8 = 237;
pub const TAG_INT64: u8 = 238;
/// Also used for timestamps.
pub const TAG_INT64_ALT: u8 = 239;
pub const TAG_FLOAT32: u8 = 240;
pub const TAG_FLOAT64: u8 = 241;
pub const TAG_EMPTY_STRING: u8 = 242;
pub const TAG_STRING: u8 = 243;
pub const TAG_EMPTY_BYTES: u8 = 244;
pub const TAG_BYTES: u8 = 245;
pub const TAG_ARRAY_EMPTY: u8 = 246;
pub const TAG_ARRAY_1: u8 = 247;
pub const TAG_ARRAY_2: u8 = 248;
pub const TAG_ARRAY_3: u8 = 249;
pub const TAG_ARRAY_N: u8 = 250;
/// 251..=254: enum value-variant tag-number embedded (number 1..=4 inline with
/// the payload). This crate's writer never emits these -- it always uses the
/// `[n, payload]` 2-element array form -- but the reader accepts them so that
/// wire produced by another binding of the same format round-trips.
pub const TAG_ENUM_INLINE_MIN: u8 = 251;
pub const TAG_ENUM_INLINE_MAX: u8 = 254;

/// Appends wire tokens to an owned byte buffer.
pub struct WireWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        WireWriter { buf }
    }

    #[inline]
    pub fn write_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Writes a length prefix: a single byte for `n < 232`, tag 232 + u16 LE
    /// for `n < 65536`, tag 233 + u32 LE for `n < 2^32`. Lengths that do not
    /// fit fail with [`WireError::LengthOverflow`].
    pub fn write_length_prefix(&mut self, n: usize) -> Result<(), WireError> {
        if n < TAG_SMALL_INT_MAX as usize + 1 {
            self.buf.push(n as u8);
        } else if n < 1 << 16 {
            self.buf.push(TAG_UINT16);
            self.buf.extend_from_slice(&(n as u16).to_le_bytes());
        } else if n <= u32::MAX as usize {
            self.buf.push(TAG_UINT32);
            self.buf.extend_from_slice(&(n as u32).to_le_bytes());
        } else {
            return Err(WireError::LengthOverflow);
        }
        Ok(())
    }

    /// Writes an array header for `len` upcoming elements: the compact tags
    /// 246..249 for lengths 0..3, otherwise tag 250 followed by a length
    /// prefix.
    pub fn write_array_header(&mut self, len: usize) -> Result<(), WireError> {
        match len {
            0 => self.write_tag(TAG_ARRAY_EMPTY),
            1 => self.write_tag(TAG_ARRAY_1),
            2 => self.write_tag(TAG_ARRAY_2),
            3 => self.write_tag(TAG_ARRAY_3),
            n => {
                self.write_tag(TAG_ARRAY_N);
                self.write_length_prefix(n)?;
            }
        }
        Ok(())
    }

    /// `encode_uint64`: literal / uint16 / uint32 / uint64, whichever is
    /// narrowest.
    pub fn write_uint64(&mut self, v: u64) {
        if v <= TAG_SMALL_INT_MAX as u64 {
            self.buf.push(v as u8);
        } else if v < 1 << 16 {
            self.buf.push(TAG_UINT16);
            self.buf.extend_from_slice(&(v as u16).to_le_bytes());
        } else if v < 1 << 32 {
            self.buf.push(TAG_UINT32);
            self.buf.extend_from_slice(&(v as u32).to_le_bytes());
        } else {
            self.buf.push(TAG_UINT64);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// `encode_int32`: the narrowest of the tag ranges in the table that fits
    /// `v`.
    pub fn write_int32(&mut self, v: i32) {
        if v >= 0 {
            self.write_uint64(v as u64);
            return;
        }
        if v >= -256 {
            self.buf.push(TAG_NEG_INT8);
            self.buf.push((v + 256) as u8);
        } else if v >= -65536 {
            self.buf.push(TAG_NEG_INT16);
            self.buf
                .extend_from_slice(&((v + 65536) as u16).to_le_bytes());
        } else {
            self.buf.push(TAG_INT32);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// `encode_int64`: uses the int32 encoding when `v` fits in signed
    /// 32-bit, otherwise tag 238 followed by the raw little-endian `i64`.
    pub fn write_int64(&mut self, v: i64) {
        if let Ok(v32) = i32::try_from(v) {
            self.write_int32(v32);
        } else {
            self.buf.push(TAG_INT64);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Timestamps share the int64 encoding but always use tag 239 when they
    /// don't fit the int32 range, so that a reader can special-case them if
    /// it wants to (this crate's reader doesn't need to).
    pub fn write_timestamp_millis(&mut self, v: i64) {
        if let Ok(v32) = i32::try_from(v) {
            self.write_int32(v32);
        } else {
            self.buf.push(TAG_INT64_ALT);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Floats use tag 0 for exact zero (both kinds), else tag 240/241.
    pub fn write_float32(&mut self, v: f32) {
        if v == 0.0 && v.is_sign_positive() {
            self.buf.push(0);
        } else {
            self.buf.push(TAG_FLOAT32);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn write_float64(&mut self, v: f64) {
        if v == 0.0 && v.is_sign_positive() {
            self.buf.push(0);
        } else {
            self.buf.push(TAG_FLOAT64);
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn write_string(&mut self, s: &str) {
        if s.is_empty() {
            self.buf.push(TAG_EMPTY_STRING);
        } else {
            self.buf.push(TAG_STRING);
            // Length prefix failure is unreachable for realistic string
            // lengths: a `usize` that doesn't fit a `u32` can't legitimately
            // occur on a 64-bit host.
            let _ = self.write_length_prefix(s.len());
            self.buf.extend_from_slice(s.as_bytes());
        }
    }

    pub fn write_bytes(&mut self, b: &[u8]) {
        if b.is_empty() {
            self.buf.push(TAG_EMPTY_BYTES);
        } else {
            self.buf.push(TAG_BYTES);
            let _ = self.write_length_prefix(b.len());
            self.buf.extend_from_slice(b);
        }
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// Reads wire tokens from a byte slice, advancing an internal cursor.
pub struct WireReader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        WireReader { input, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.pos + n > self.input.len() {
            #[cfg(feature = "log")]
            log::trace!("wire read ran past end of buffer at position {}", self.pos);
            return Err(WireError::Eof);
        }
        let slice = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_tag(&mut self) -> Result<u8, WireError> {
        let b = self.take(1)?;
        Ok(b[0])
    }

    /// Reads a length prefix written by [`WireWriter::write_length_prefix`].
    pub fn read_length_prefix(&mut self) -> Result<usize, WireError> {
        let tag = self.read_tag()?;
        match tag {
            0..=TAG_SMALL_INT_MAX => Ok(tag as usize),
            TAG_UINT16 => Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()) as usize),
            TAG_UINT32 => Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()) as usize),
            other => Err(WireError::UnsupportedTag(other)),
        }
    }

    /// Reads an array header (246..250) and returns the element count.
    pub fn read_array_header(&mut self) -> Result<usize, WireError> {
        let tag = self.read_tag()?;
        match tag {
            TAG_ARRAY_EMPTY => Ok(0),
            TAG_ARRAY_1 => Ok(1),
            TAG_ARRAY_2 => Ok(2),
            TAG_ARRAY_3 => Ok(3),
            TAG_ARRAY_N => self.read_length_prefix(),
            other => Err(WireError::UnsupportedTag(other)),
        }
    }

    /// Clamping number decode, parameterized over the target's min/max.
    /// Floats are truncated toward zero; integers widen/narrow by clamping.
    fn read_number_raw(&mut self) -> Result<RawNumber, WireError> {
        let tag = self.read_tag()?;
        self.read_number_from_tag(tag)
    }

    fn read_number_from_tag(&mut self, tag: u8) -> Result<RawNumber, WireError> {
        Ok(match tag {
            0..=TAG_SMALL_INT_MAX => RawNumber::Int(tag as i128),
            TAG_UINT16 => RawNumber::Int(u16::from_le_bytes(self.take(2)?.try_into().unwrap()) as i128),
            TAG_UINT32 => RawNumber::Int(u32::from_le_bytes(self.take(4)?.try_into().unwrap()) as i128),
            TAG_UINT64 => RawNumber::Int(u64::from_le_bytes(self.take(8)?.try_into().unwrap()) as i128),
            TAG_NEG_INT8 => RawNumber::Int(self.take(1)?[0] as i128 - 256),
            TAG_NEG_INT16 => {
                RawNumber::Int(u16::from_le_bytes(self.take(2)?.try_into().unwrap()) as i128 - 65536)
            }
            TAG_INT32 => RawNumber::Int(i32::from_le_bytes(self.take(4)?.try_into().unwrap()) as i128),
            TAG_INT64 | TAG_INT64_ALT => {
                RawNumber::Int(i64::from_le_bytes(self.take(8)?.try_into().unwrap()) as i128)
            }
            TAG_FLOAT32 => RawNumber::Float(f32::from_le_bytes(self.take(4)?.try_into().unwrap()) as f64),
            TAG_FLOAT64 => RawNumber::Float(f64::from_le_bytes(self.take(8)?.try_into().unwrap())),
            other => return Err(WireError::UnsupportedTag(other)),
        })
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(match self.read_number_raw()? {
            RawNumber::Int(n) => n != 0,
            RawNumber::Float(f) => f != 0.0,
        })
    }

    pub fn read_int32(&mut self) -> Result<i32, WireError> {
        Ok(clamp_i128(self.read_number_raw()?, i32::MIN as i128, i32::MAX as i128) as i32)
    }

    pub fn read_int64(&mut self) -> Result<i64, WireError> {
        Ok(clamp_i128(self.read_number_raw()?, i64::MIN as i128, i64::MAX as i128) as i64)
    }

    pub fn read_uint64(&mut self) -> Result<u64, WireError> {
        Ok(clamp_i128(self.read_number_raw()?, 0, u64::MAX as i128) as u64)
    }

    pub fn read_float32(&mut self) -> Result<f32, WireError> {
        Ok(match self.read_number_raw()? {
            RawNumber::Int(n) => n as f32,
            RawNumber::Float(f) => f as f32,
        })
    }

    pub fn read_float64(&mut self) -> Result<f64, WireError> {
        Ok(match self.read_number_raw()? {
            RawNumber::Int(n) => n as f64,
            RawNumber::Float(f) => f,
        })
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let tag = self.read_tag()?;
        match tag {
            TAG_EMPTY_STRING => Ok(String::new()),
            TAG_STRING => {
                let len = self.read_length_prefix()?;
                let bytes = self.take(len)?;
                String::from_utf8(bytes.to_vec()).map_err(|_| WireError::UnsupportedTag(TAG_STRING))
            }
            other => Err(WireError::UnsupportedTag(other)),
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, WireError> {
        let tag = self.read_tag()?;
        match tag {
            TAG_EMPTY_BYTES => Ok(Vec::new()),
            TAG_BYTES => {
                let len = self.read_length_prefix()?;
                Ok(self.take(len)?.to_vec())
            }
            other => Err(WireError::UnsupportedTag(other)),
        }
    }

    /// Consumes exactly one token of arbitrary type, recursing across
    /// composite tags, and returns the exact bytes it consumed so the caller
    /// can preserve them verbatim (unrecognized-field retention).
    pub fn read_raw_token(&mut self) -> Result<Vec<u8>, WireError> {
        let start = self.pos;
        self.skip_one()?;
        Ok(self.input[start..self.pos].to_vec())
    }

    /// `skip_unused`: consumes exactly one token without retaining it.
    pub fn skip_unused(&mut self) -> Result<(), WireError> {
        self.skip_one()
    }

    fn skip_one(&mut self) -> Result<(), WireError> {
        let tag = self.read_tag()?;
        match tag {
            0..=TAG_SMALL_INT_MAX => {}
            TAG_UINT16 | TAG_NEG_INT16 => {
                self.take(2)?;
            }
            TAG_UINT32 | TAG_INT32 | TAG_FLOAT32 => {
                self.take(4)?;
            }
            TAG_UINT64 | TAG_INT64 | TAG_INT64_ALT | TAG_FLOAT64 => {
                self.take(8)?;
            }
            TAG_NEG_INT8 => {
                self.take(1)?;
            }
            TAG_EMPTY_STRING | TAG_EMPTY_BYTES => {}
            TAG_STRING | TAG_BYTES => {
                let len = self.read_length_prefix()?;
                self.take(len)?;
            }
            TAG_ARRAY_EMPTY => {}
            TAG_ARRAY_1 => self.skip_one()?,
            TAG_ARRAY_2 => {
                self.skip_one()?;
                self.skip_one()?;
            }
            TAG_ARRAY_3 => {
                self.skip_one()?;
                self.skip_one()?;
                self.skip_one()?;
            }
            TAG_ARRAY_N => {
                let len = self.read_length_prefix()?;
                for _ in 0..len {
                    self.skip_one()?;
                }
            }
            TAG_ENUM_INLINE_MIN..=TAG_ENUM_INLINE_MAX => self.skip_one()?,
            other => return Err(WireError::UnsupportedTag(other)),
        }
        Ok(())
    }
}

enum RawNumber {
    Int(i128),
    Float(f64),
}

/// Distinguishes an enum's two wire shapes: a bare number for a constant, or
/// a `[number, payload]` pair (or an inline 251..254 tag) for a value
/// variant. Returned by [`WireReader::read_enum_header`]; the payload, if
/// any, is left for the caller to read next.
pub enum EnumHeader {
    Constant(u32),
    ValueVariant(u32),
}

impl<'a> WireReader<'a> {
    /// Reads the tag that opens an enum token and classifies it. On
    /// `ValueVariant`, the payload token immediately follows and has not yet
    /// been consumed.
    pub fn read_enum_header(&mut self) -> Result<EnumHeader, WireError> {
        let tag = self.read_tag()?;
        match tag {
            TAG_ARRAY_2 => {
                let number = match self.read_number_raw()? {
                    RawNumber::Int(n) => n.clamp(0, u32::MAX as i128) as u32,
                    RawNumber::Float(f) => f.max(0.0) as u32,
                };
                Ok(EnumHeader::ValueVariant(number))
            }
            TAG_ENUM_INLINE_MIN..=TAG_ENUM_INLINE_MAX => {
                Ok(EnumHeader::ValueVariant((tag - TAG_ENUM_INLINE_MIN + 1) as u32))
            }
            other => {
                let number = match self.read_number_from_tag(other)? {
                    RawNumber::Int(n) => n.clamp(0, u32::MAX as i128) as u32,
                    RawNumber::Float(f) => f.max(0.0) as u32,
                };
                Ok(EnumHeader::Constant(number))
            }
        }
    }
}

fn clamp_i128(n: RawNumber, min: i128, max: i128) -> i128 {
    match n {
        RawNumber::Int(v) => v.clamp(min, max),
        // decoding a float wire token into an integer target: truncate
        // toward zero, then clamp.
        RawNumber::Float(f) => {
            let truncated = f.trunc();
            if truncated.is_nan() {
                0
            } else if truncated <= min as f64 {
                min
            } else if truncated >= max as f64 {
                max
            } else {
                truncated as i128
            }
        }
    }
}

/// Decodes one wire token into a type-oblivious [`serde_json::Value`],
/// without knowing the schema type that produced it. Used to preserve
/// unrecognized (removed-field / unknown-enum-number) data across a
/// binary-to-JSON re-representation; see [`crate::value::RawToken`].
pub fn decode_generic_json(reader: &mut WireReader) -> Result<serde_json::Value, WireError> {
    let start = reader.pos;
    let tag = reader.read_tag()?;
    reader.pos = start;
    match tag {
        0..=TAG_NEG_INT16 | TAG_INT32 | TAG_INT64 | TAG_INT64_ALT => {
            let n = match reader.read_number_raw()? {
                RawNumber::Int(n) => n,
                RawNumber::Float(_) => unreachable!(),
            };
            Ok(serde_json::Value::Number(serde_json::Number::from(n as i64)))
        }
        TAG_FLOAT32 | TAG_FLOAT64 => {
            let f = match reader.read_number_raw()? {
                RawNumber::Float(f) => f,
                RawNumber::Int(_) => unreachable!(),
            };
            Ok(serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null))
        }
        TAG_EMPTY_STRING | TAG_STRING => Ok(serde_json::Value::String(reader.read_string()?)),
        TAG_EMPTY_BYTES | TAG_BYTES => {
            use base64::Engine;
            let bytes = reader.read_bytes()?;
            Ok(serde_json::Value::String(
                base64::engine::general_purpose::STANDARD.encode(bytes),
            ))
        }
        TAG_ARRAY_EMPTY | TAG_ARRAY_1 | TAG_ARRAY_2 | TAG_ARRAY_3 | TAG_ARRAY_N => {
            let len = reader.read_array_header()?;
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(decode_generic_json(reader)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        TAG_ENUM_INLINE_MIN..=TAG_ENUM_INLINE_MAX => {
            reader.read_tag()?;
            let number = (tag - TAG_ENUM_INLINE_MIN + 1) as i64;
            let payload = decode_generic_json(reader)?;
            Ok(serde_json::Value::Array(vec![
                serde_json::Value::Number(number.into()),
                payload,
            ]))
        }
        other => Err(WireError::UnsupportedTag(other)),
    }
}

/// The inverse of [`decode_generic_json`]: writes a type-oblivious JSON value
/// back onto the wire using the narrowest applicable tag. Best-effort --
/// strings and base64-encoded-bytes are indistinguishable once a field has
/// been forgotten by the schema, which is unavoidable (that's precisely the
/// information a removed field has lost).
pub fn encode_generic_json(value: &serde_json::Value, writer: &mut WireWriter) {
    match value {
        serde_json::Value::Null => writer.write_tag(0),
        serde_json::Value::Bool(b) => writer.write_uint64(if *b { 1 } else { 0 }),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                writer.write_int64(i);
            } else if let Some(u) = n.as_u64() {
                writer.write_uint64(u);
            } else {
                writer.write_float64(n.as_f64().unwrap_or(0.0));
            }
        }
        serde_json::Value::String(s) => writer.write_string(s),
        serde_json::Value::Array(items) => {
            let _ = writer.write_array_header(items.len());
            for item in items {
                encode_generic_json(item, writer);
            }
        }
        // Objects have no generic wire shape; this only arises from a
        // readable-JSON-origin tail being re-encoded to binary, which this
        // crate does not need to support losslessly.
        serde_json::Value::Object(_) => writer.write_tag(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_int64(v: i64) {
        let mut buf = Vec::new();
        WireWriter::new(&mut buf).write_int64(v);
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_int64().unwrap(), v);
    }

    #[test]
    fn int64_roundtrip() {
        for v in [0, 1, -1, 231, 232, -256, -257, -65536, -65537, i32::MAX as i64, i32::MIN as i64, i64::MAX, i64::MIN] {
            roundtrip_int64(v);
        }
    }

    #[test]
    fn clamping_on_decode() {
        let mut buf = Vec::new();
        WireWriter::new(&mut buf).write_int64(100_000);
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_int32().unwrap(), 100_000);

        let mut buf = Vec::new();
        WireWriter::new(&mut buf).write_uint64(u64::MAX);
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_int32().unwrap(), i32::MAX);
    }

    #[test]
    fn float_truncates_toward_zero_into_int() {
        let mut buf = Vec::new();
        WireWriter::new(&mut buf).write_float64(1.9);
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_int32().unwrap(), 1);

        let mut buf = Vec::new();
        WireWriter::new(&mut buf).write_float64(-1.9);
        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_int32().unwrap(), -1);
    }

    #[test]
    fn empty_array_is_single_byte() {
        let mut buf = Vec::new();
        WireWriter::new(&mut buf).write_array_header(0).unwrap();
        assert_eq!(buf, vec![TAG_ARRAY_EMPTY]);
    }

    #[test]
    fn skip_unused_consumes_exactly_one_token() {
        let mut buf = Vec::new();
        {
            let mut w = WireWriter::new(&mut buf);
            w.write_int32(42);
            w.write_string("tail");
        }
        let mut reader = WireReader::new(&buf);
        reader.skip_unused().unwrap();
        assert_eq!(reader.read_string().unwrap(), "tail");
    }
}
