//! Byte-level output of the binary codec.

/// Leading byte of values that may be absent, shared or polymorphic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    /// An absent `Option` or nullable value.
    Null = 0,
    /// A value written in full, no metadata follows.
    None = 1,
    /// Followed by the id of an object written earlier.
    Ref = 2,
    /// Followed by the runtime type name, then the value.
    Polymorphic = 3,
}

impl Tag {
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Tag> {
        match byte {
            0 => Some(Tag::Null),
            1 => Some(Tag::None),
            2 => Some(Tag::Ref),
            3 => Some(Tag::Polymorphic),
            _ => None,
        }
    }
}

/// Appends little-endian primitives to a growable buffer.
///
/// Lengths, counts, ids and versions are LEB128 varints; fixed-width
/// numbers are little-endian; strings are a varint byte length followed by
/// UTF-8.
///
/// ```rust
/// use propbag::binary::BinaryWriter;
///
/// let mut writer = BinaryWriter::new();
/// writer.write_varint(300);
/// writer.write_str("hi");
/// assert_eq!(writer.as_bytes(), &[0xAC, 0x02, 2, b'h', b'i']);
/// ```
#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn write_tag(&mut self, tag: Tag) {
        self.buffer.push(tag as u8);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buffer.push(byte);
                return;
            }
            self.buffer.push(byte | 0x80);
        }
    }

    /// Zigzag-encoded signed varint.
    pub fn write_varint_signed(&mut self, value: i64) {
        self.write_varint(((value << 1) ^ (value >> 63)) as u64);
    }

    pub fn write_len(&mut self, len: usize) {
        self.write_varint(len as u64);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_len(value.len());
        self.write_bytes(value.as_bytes());
    }
}

macro_rules! write_le {
    ($($name:ident: $t:ty),* $(,)?) => {
        impl BinaryWriter {
            $(
                pub fn $name(&mut self, value: $t) {
                    self.buffer.extend_from_slice(&value.to_le_bytes());
                }
            )*
        }
    };
}

write_le!(
    write_i8: i8,
    write_i16: i16,
    write_i32: i32,
    write_i64: i64,
    write_u16: u16,
    write_u32: u32,
    write_u64: u64,
    write_f32: f32,
    write_f64: f64,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varints() {
        let mut writer = BinaryWriter::new();
        writer.write_varint(0);
        writer.write_varint(127);
        writer.write_varint(128);
        assert_eq!(writer.as_bytes(), &[0, 0x7F, 0x80, 0x01]);

        let mut writer = BinaryWriter::new();
        writer.write_varint_signed(-1);
        writer.write_varint_signed(1);
        writer.write_varint_signed(-64);
        assert_eq!(writer.as_bytes(), &[1, 2, 0x7F]);
    }

    #[test]
    fn test_little_endian() {
        let mut writer = BinaryWriter::new();
        writer.write_u32(0x0102_0304);
        writer.write_f32(1.5);
        assert_eq!(writer.as_bytes(), &[4, 3, 2, 1, 0, 0, 0xC0, 0x3F]);
    }

    #[test]
    fn test_tags() {
        for tag in [Tag::Null, Tag::None, Tag::Ref, Tag::Polymorphic] {
            assert_eq!(Tag::from_u8(tag as u8), Some(tag));
        }
        assert_eq!(Tag::from_u8(9), None);
    }
}
