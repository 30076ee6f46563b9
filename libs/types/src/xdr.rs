//! Binary codec for main-ledger structures
//!
//! Big-endian, 4-byte aligned encoding in the style of RFC 4506:
//! ```text
//! int32/uint32       4 bytes
//! int64/uint64       8 bytes
//! bool               uint32 0 or 1
//! opaque[n]          n bytes, zero-padded to a multiple of 4
//! opaque<max>        uint32 length, bytes, zero padding
//! string<max>        same as opaque<max>, UTF-8
//! optional T         bool present flag, then T
//! ```
//! The encoding is canonical: decoding rejects non-zero padding and
//! trailing bytes, so equal values always have equal bytes. Asset
//! descriptors are persisted in this form (`asset_xdr`).

use crate::errors::XdrError;

/// Types with a canonical binary encoding
pub trait XdrEncode {
    fn encode(&self, w: &mut XdrWriter);

    fn to_xdr(&self) -> Vec<u8> {
        let mut w = XdrWriter::new();
        self.encode(&mut w);
        w.into_bytes()
    }
}

/// Types decodable from the canonical binary encoding
pub trait XdrDecode: Sized {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError>;

    /// Decode a complete value; trailing bytes are an error.
    fn from_xdr(bytes: &[u8]) -> Result<Self, XdrError> {
        let mut r = XdrReader::new(bytes);
        let value = Self::decode(&mut r)?;
        r.finish()?;
        Ok(value)
    }
}

impl XdrEncode for u32 {
    fn encode(&self, w: &mut XdrWriter) {
        w.write_u32(*self);
    }
}

impl XdrDecode for u32 {
    fn decode(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        r.read_u32()
    }
}

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

#[derive(Debug, Default)]
pub struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u32(v as u32);
    }

    /// Fixed-length opaque data
    pub fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.buf.extend(std::iter::repeat(0u8).take(padding(bytes.len())));
    }

    /// Variable-length opaque data with a length prefix
    pub fn write_var(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.write_fixed(bytes);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_var(s.as_bytes());
    }

    pub fn write_option<T: XdrEncode>(&mut self, v: Option<&T>) {
        match v {
            Some(inner) => {
                self.write_bool(true);
                inner.encode(self);
            }
            None => self.write_bool(false),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct XdrReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], XdrError> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(XdrError::UnexpectedEof {
                needed: n,
                available,
            });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], XdrError> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    pub fn read_i32(&mut self) -> Result<i32, XdrError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, XdrError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, XdrError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, XdrError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, XdrError> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(XdrError::UnknownDiscriminant {
                kind: "bool",
                value: v as i32,
            }),
        }
    }

    fn skip_padding(&mut self, len: usize) -> Result<(), XdrError> {
        let pad = self.take(padding(len))?;
        if pad.iter().any(|b| *b != 0) {
            return Err(XdrError::NonZeroPadding);
        }
        Ok(())
    }

    pub fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], XdrError> {
        let arr = self.take_array::<N>()?;
        self.skip_padding(N)?;
        Ok(arr)
    }

    pub fn read_var(&mut self, kind: &'static str, limit: usize) -> Result<Vec<u8>, XdrError> {
        let len = self.read_u32()? as usize;
        if len > limit {
            return Err(XdrError::LengthExceeded { kind, len, limit });
        }
        let bytes = self.take(len)?.to_vec();
        self.skip_padding(len)?;
        Ok(bytes)
    }

    pub fn read_string(&mut self, kind: &'static str, limit: usize) -> Result<String, XdrError> {
        let bytes = self.read_var(kind, limit)?;
        String::from_utf8(bytes).map_err(|_| XdrError::InvalidUtf8)
    }

    pub fn read_option<T: XdrDecode>(&mut self) -> Result<Option<T>, XdrError> {
        if self.read_bool()? {
            Ok(Some(T::decode(self)?))
        } else {
            Ok(None)
        }
    }

    /// Current offset into the input
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes consumed since `start`, a prior `position()`.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start.min(self.pos)..self.pos]
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn finish(&self) -> Result<(), XdrError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(XdrError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_opaque_is_padded() {
        let mut w = XdrWriter::new();
        w.write_var(b"abcde");
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 4 + 8);
        assert_eq!(&bytes[..4], &[0, 0, 0, 5]);
        assert_eq!(&bytes[9..], &[0, 0, 0]);
    }

    #[test]
    fn test_reader_rejects_nonzero_padding() {
        let bytes = [0, 0, 0, 1, b'a', 0, 1, 0];
        let mut r = XdrReader::new(&bytes);
        assert_eq!(r.read_var("test", 10), Err(XdrError::NonZeroPadding));
    }

    #[test]
    fn test_reader_enforces_limit() {
        let bytes = [0, 0, 0, 40];
        let mut r = XdrReader::new(&bytes);
        assert!(matches!(
            r.read_var("memo text", 28),
            Err(XdrError::LengthExceeded { len: 40, .. })
        ));
    }

    #[test]
    fn test_reader_eof() {
        let mut r = XdrReader::new(&[0, 0]);
        assert_eq!(
            r.read_u32(),
            Err(XdrError::UnexpectedEof {
                needed: 4,
                available: 2
            })
        );
    }
}
