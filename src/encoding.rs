//! Bounded big-endian reader/writer and CRC-32 for TTDB telegrams
//!
//! Every multi-byte field on the wire is big-endian. All decoders go through
//! [`WireReader`], which fails closed with [`TtiError::Malformed`] instead of
//! reading past the end of the received buffer.

use crate::core::{CstUuid, Label, Version};
use crate::error::{Result, TtiError};
use crate::iec61375::{LABEL_LEN, UUID_LEN};

/// Standard CRC-32 (IEEE polynomial, seed all-ones)
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verify a payload whose last four bytes carry a big-endian CRC over the rest
///
/// Returns the protected part of the payload on success.
pub fn verify_trailing_crc(payload: &[u8]) -> Result<&[u8]> {
    if payload.len() < 4 {
        return Err(TtiError::malformed(format!(
            "Payload of {} bytes cannot carry a CRC",
            payload.len()
        )));
    }
    let (body, tail) = payload.split_at(payload.len() - 4);
    let expected = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = crc32(body);
    if computed != expected {
        return Err(TtiError::checksum(expected, computed));
    }
    Ok(body)
}

/// Cursor over a received buffer that never reads past its end
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        WireReader { data, pos: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail unless at least `len` bytes are left
    pub fn ensure(&self, len: usize, what: &str) -> Result<()> {
        if self.remaining() < len {
            return Err(TtiError::malformed(format!(
                "{}: need {} bytes at offset {}, only {} left",
                what,
                len,
                self.pos,
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Fail unless `count` elements of `elem_size` bytes fit into the rest
    pub fn ensure_array(&self, count: usize, elem_size: usize, what: &str) -> Result<()> {
        match count.checked_mul(elem_size) {
            Some(len) => self.ensure(len, what),
            None => Err(TtiError::malformed(format!("{}: array length overflow", what))),
        }
    }

    /// Take the next `len` bytes
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len, "field")?;
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Skip `len` bytes
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(|_| ())
    }

    /// Read a fixed-size byte array
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    /// Read one byte
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    /// Read a big-endian u16
    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    /// Read a big-endian u32
    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Read a version/release pair
    pub fn version(&mut self) -> Result<Version> {
        Ok(Version::new(self.u8()?, self.u8()?))
    }

    /// Read a 16-byte label
    pub fn label(&mut self) -> Result<Label> {
        Ok(Label(self.array::<LABEL_LEN>()?))
    }

    /// Read a 16-byte consist UUID
    pub fn uuid(&mut self) -> Result<CstUuid> {
        Ok(CstUuid(self.array::<UUID_LEN>()?))
    }
}

/// Big-endian encoder, the mirror image of [`WireReader`]
#[derive(Debug, Clone, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        WireWriter { buf: Vec::new() }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing was written yet
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Written bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Append raw bytes
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Append `len` zero bytes
    pub fn zeros(&mut self, len: usize) -> &mut Self {
        self.buf.resize(self.buf.len() + len, 0);
        self
    }

    /// Append one byte
    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Append a big-endian u16
    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_be_bytes())
    }

    /// Append a big-endian u32
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_be_bytes())
    }

    /// Append a version/release pair
    pub fn version(&mut self, version: Version) -> &mut Self {
        self.u8(version.ver).u8(version.rel)
    }

    /// Append a 16-byte label
    pub fn label(&mut self, label: &Label) -> &mut Self {
        self.bytes(&label.0)
    }

    /// Append a 16-byte UUID
    pub fn uuid(&mut self, uuid: &CstUuid) -> &mut Self {
        self.bytes(&uuid.0)
    }

    /// Append the CRC-32 of everything written since `start`
    pub fn crc_from(&mut self, start: usize) -> &mut Self {
        let crc = crc32(&self.buf[start..]);
        self.u32(crc)
    }

    /// Finish and return the encoded bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        // standard CRC-32 check value
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_reader_big_endian() -> Result<()> {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE];
        let mut reader = WireReader::new(&data);
        assert_eq!(reader.u16()?, 0x1234);
        assert_eq!(reader.u32()?, 0x5678_9ABC);
        assert_eq!(reader.u8()?, 0xDE);
        assert_eq!(reader.remaining(), 0);
        Ok(())
    }

    #[test]
    fn test_reader_fails_closed() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = WireReader::new(&data);
        assert!(matches!(reader.u32(), Err(TtiError::Malformed(_))));
        // a failed read consumes nothing
        assert_eq!(reader.position(), 0);
        assert!(reader.ensure_array(usize::MAX, 2, "list").is_err());
    }

    #[test]
    fn test_trailing_crc() -> Result<()> {
        let mut writer = WireWriter::new();
        writer.u32(0xDEAD_BEEF).u16(7).crc_from(0);
        let payload = writer.into_vec();
        assert_eq!(verify_trailing_crc(&payload)?.len(), 6);

        let mut corrupted = payload.clone();
        corrupted[2] ^= 0x10;
        assert!(matches!(
            verify_trailing_crc(&corrupted),
            Err(TtiError::Checksum { .. })
        ));
        assert!(verify_trailing_crc(&[1, 2, 3]).is_err());
        Ok(())
    }
}
