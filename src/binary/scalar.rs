//! Binary encoding of the built-in value types.

use super::reader::BinaryReader;
use super::writer::BinaryWriter;
use crate::{Error, Result, TypeInfo};
use chrono::{DateTime, TimeDelta, Utc};
use num_bigint::BigInt;
use std::any::Any;
use std::path::PathBuf;

macro_rules! write_fixed {
    ($writer:ident, $value:ident; $($t:ty => $method:ident),* $(,)?) => {
        $(
            if let Some(v) = $value.downcast_ref::<$t>() {
                $writer.$method(*v);
                return Ok(());
            }
        )*
    };
}

pub(crate) fn write(writer: &mut BinaryWriter, value: &dyn Any, ty: TypeInfo) -> Result<()> {
    write_fixed!(writer, value;
        bool => write_bool, u8 => write_u8,
        i8 => write_i8, i16 => write_i16, i32 => write_i32, i64 => write_i64,
        u16 => write_u16, u32 => write_u32, u64 => write_u64,
        f32 => write_f32, f64 => write_f64,
    );
    if let Some(v) = value.downcast_ref::<String>() {
        writer.write_str(v);
    } else if let Some(v) = value.downcast_ref::<char>() {
        writer.write_u32(u32::from(*v));
    } else if let Some(v) = value.downcast_ref::<PathBuf>() {
        writer.write_str(&v.to_string_lossy());
    } else if let Some(v) = value.downcast_ref::<DateTime<Utc>>() {
        writer.write_i64(v.timestamp());
        writer.write_u32(v.timestamp_subsec_nanos());
    } else if let Some(v) = value.downcast_ref::<TimeDelta>() {
        writer.write_i64(v.num_seconds());
        writer.write_i32(v.subsec_nanos());
    } else if let Some(v) = value.downcast_ref::<BigInt>() {
        let bytes = v.to_signed_bytes_le();
        writer.write_len(bytes.len());
        writer.write_bytes(&bytes);
    } else {
        return Err(Error::type_mismatch(ty.name(), "a different value type"));
    }
    Ok(())
}

pub(crate) fn read(reader: &mut BinaryReader<'_>, ty: TypeInfo) -> Result<Box<dyn Any>> {
    let value: Box<dyn Any> = if ty.is::<bool>() {
        Box::new(reader.read_bool()?)
    } else if ty.is::<u8>() {
        Box::new(reader.read_u8()?)
    } else if ty.is::<i8>() {
        Box::new(reader.read_i8()?)
    } else if ty.is::<i16>() {
        Box::new(reader.read_i16()?)
    } else if ty.is::<i32>() {
        Box::new(reader.read_i32()?)
    } else if ty.is::<i64>() {
        Box::new(reader.read_i64()?)
    } else if ty.is::<u16>() {
        Box::new(reader.read_u16()?)
    } else if ty.is::<u32>() {
        Box::new(reader.read_u32()?)
    } else if ty.is::<u64>() {
        Box::new(reader.read_u64()?)
    } else if ty.is::<f32>() {
        Box::new(reader.read_f32()?)
    } else if ty.is::<f64>() {
        Box::new(reader.read_f64()?)
    } else if ty.is::<String>() {
        Box::new(reader.read_str()?.to_string())
    } else if ty.is::<char>() {
        let code = reader.read_u32()?;
        let c = char::from_u32(code)
            .ok_or_else(|| Error::type_mismatch("char", &format!("code point {code:#x}")))?;
        Box::new(c)
    } else if ty.is::<PathBuf>() {
        Box::new(PathBuf::from(reader.read_str()?))
    } else if ty.is::<DateTime<Utc>>() {
        let (secs, nanos) = (reader.read_i64()?, reader.read_u32()?);
        let at = DateTime::from_timestamp(secs, nanos)
            .ok_or_else(|| Error::custom(format!("timestamp {secs}.{nanos:09} out of range")))?;
        Box::new(at)
    } else if ty.is::<TimeDelta>() {
        let (secs, nanos) = (reader.read_i64()?, reader.read_i32()?);
        let delta = TimeDelta::try_seconds(secs)
            .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(i64::from(nanos))))
            .ok_or_else(|| Error::custom(format!("duration of {secs}s out of range")))?;
        Box::new(delta)
    } else if ty.is::<BigInt>() {
        let len = reader.read_len()?;
        Box::new(BigInt::from_signed_bytes_le(reader.read_bytes(len)?))
    } else {
        return Err(Error::type_mismatch(ty.name(), "a different value type"));
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn round_trip<T: Any + Clone>(value: T) -> T {
        let mut writer = BinaryWriter::new();
        write(&mut writer, &value, TypeInfo::of::<T>()).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = BinaryReader::new(&bytes);
        let back = read(&mut reader, TypeInfo::of::<T>()).unwrap();
        assert!(reader.is_at_end());
        back.downcast_ref::<T>().cloned().unwrap()
    }

    #[test]
    fn test_extended_builtins() {
        assert_eq!(round_trip('\u{1F600}'), '\u{1F600}');
        assert_eq!(round_trip(PathBuf::from("/tmp/x")), PathBuf::from("/tmp/x"));
        let delta = TimeDelta::milliseconds(-1500);
        assert_eq!(round_trip(delta), delta);
        let at = DateTime::from_timestamp(1_700_000_000, 123).unwrap();
        assert_eq!(round_trip(at), at);
        let big = BigInt::from_str("-98765432109876543210").unwrap();
        assert_eq!(round_trip(big.clone()), big);
    }

    #[test]
    fn test_fixed_width_layout() {
        let mut writer = BinaryWriter::new();
        write(&mut writer, &-2_i16, TypeInfo::of::<i16>()).unwrap();
        write(&mut writer, &true, TypeInfo::of::<bool>()).unwrap();
        assert_eq!(writer.as_bytes(), &[0xFE, 0xFF, 1]);
    }
}
