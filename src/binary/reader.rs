//! Byte-level input of the binary codec.

use super::writer::Tag;
use crate::{Error, Result};

/// Reads what [`BinaryWriter`](super::BinaryWriter) wrote, bounds-checked.
///
/// ```rust
/// use propbag::binary::BinaryReader;
///
/// let mut reader = BinaryReader::new(&[0xAC, 0x02, 2, b'h', b'i']);
/// assert_eq!(reader.read_varint().unwrap(), 300);
/// assert_eq!(reader.read_str().unwrap(), "hi");
/// assert!(reader.is_at_end());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        BinaryReader { data, position: 0 }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.position == self.data.len()
    }

    fn truncated(&self, expected: &str) -> Error {
        Error::unexpected_eof(1, self.position + 1, expected)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.truncated(&format!("{len} bytes")));
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::type_mismatch("bool byte", &other.to_string())),
        }
    }

    pub fn read_tag(&mut self) -> Result<Tag> {
        let byte = self.read_u8()?;
        Tag::from_u8(byte).ok_or_else(|| Error::type_mismatch("value tag", &byte.to_string()))
    }

    /// Reads a tag without consuming it.
    pub fn peek_tag(&self) -> Result<Tag> {
        self.clone().read_tag()
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0_u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::custom(format!(
            "varint longer than 10 bytes at offset {}",
            self.position
        )))
    }

    pub fn read_varint_signed(&mut self) -> Result<i64> {
        let raw = self.read_varint()?;
        Ok((raw >> 1) as i64 ^ -((raw & 1) as i64))
    }

    pub fn read_len(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        usize::try_from(len).map_err(|_| Error::type_mismatch("length", &len.to_string()))
    }

    /// A varint that must fit `u32`: ids and versions.
    pub fn read_u32_varint(&mut self) -> Result<u32> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| Error::type_mismatch("u32", &value.to_string()))
    }

    pub fn read_str(&mut self) -> Result<&'a str> {
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|e| Error::custom(format!("invalid UTF-8: {e}")))
    }
}

macro_rules! read_le {
    ($($name:ident: $t:ty),* $(,)?) => {
        impl BinaryReader<'_> {
            $(
                pub fn $name(&mut self) -> Result<$t> {
                    Ok(<$t>::from_le_bytes(self.read_array()?))
                }
            )*
        }
    };
}

read_le!(
    read_i8: i8,
    read_i16: i16,
    read_i32: i32,
    read_i64: i64,
    read_u16: u16,
    read_u32: u32,
    read_u64: u64,
    read_f32: f32,
    read_f64: f64,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryWriter;

    #[test]
    fn test_reads_what_was_written() {
        let mut writer = BinaryWriter::new();
        writer.write_varint(u64::MAX);
        writer.write_varint_signed(i64::MIN);
        writer.write_i16(-2);
        writer.write_f64(0.25);
        writer.write_tag(Tag::Ref);
        let bytes = writer.into_bytes();

        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_varint().unwrap(), u64::MAX);
        assert_eq!(reader.read_varint_signed().unwrap(), i64::MIN);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_f64().unwrap(), 0.25);
        assert_eq!(reader.peek_tag().unwrap(), Tag::Ref);
        assert_eq!(reader.read_tag().unwrap(), Tag::Ref);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_truncated_input() {
        let mut reader = BinaryReader::new(&[0x80]);
        assert!(matches!(reader.read_varint(), Err(Error::UnexpectedEof { .. })));

        let mut reader = BinaryReader::new(&[5, b'a']);
        assert!(reader.read_str().is_err());
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(BinaryReader::new(&[2]).read_bool().is_err());
        assert!(BinaryReader::new(&[7]).read_tag().is_err());
        assert!(BinaryReader::new(&[1, 0xFF]).read_str().is_err());
    }
}
