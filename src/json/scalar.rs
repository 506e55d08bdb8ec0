//! JSON encoding of the built-in value types.

use super::writer::JsonWriter;
use crate::parser::{SerializedPrimitiveView, SerializedValueView};
use crate::{Error, Result, TypeInfo};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use num_bigint::BigInt;
use std::any::Any;
use std::path::PathBuf;
use std::str::FromStr;

fn mismatch(ty: TypeInfo) -> Error {
    Error::type_mismatch(ty.name(), "a different value type")
}

macro_rules! write_integers {
    ($writer:ident, $value:ident; $($t:ty => $method:ident),* $(,)?) => {
        $(
            if let Some(v) = $value.downcast_ref::<$t>() {
                $writer.$method((*v).into());
                return Ok(());
            }
        )*
    };
}

/// Writes a built-in value.
pub(crate) fn write(writer: &mut JsonWriter, value: &dyn Any, ty: TypeInfo) -> Result<()> {
    write_integers!(writer, value;
        i8 => write_i64, i16 => write_i64, i32 => write_i64, i64 => write_i64,
        u8 => write_u64, u16 => write_u64, u32 => write_u64, u64 => write_u64,
    );
    if let Some(v) = value.downcast_ref::<bool>() {
        writer.write_bool(*v);
    } else if let Some(v) = value.downcast_ref::<f32>() {
        writer.write_f32(*v);
    } else if let Some(v) = value.downcast_ref::<f64>() {
        writer.write_f64(*v);
    } else if let Some(v) = value.downcast_ref::<String>() {
        writer.write_str(v);
    } else if let Some(v) = value.downcast_ref::<char>() {
        let mut buf = [0; 4];
        writer.write_str(v.encode_utf8(&mut buf));
    } else if let Some(v) = value.downcast_ref::<PathBuf>() {
        writer.write_str(&v.to_string_lossy());
    } else if let Some(v) = value.downcast_ref::<DateTime<Utc>>() {
        writer.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    } else if let Some(v) = value.downcast_ref::<TimeDelta>() {
        let nanos = v
            .num_nanoseconds()
            .ok_or_else(|| Error::custom(format!("duration {v} overflows i64 nanoseconds")))?;
        writer.write_i64(nanos);
    } else if let Some(v) = value.downcast_ref::<BigInt>() {
        writer.write_raw(&v.to_string());
    } else {
        return Err(mismatch(ty));
    }
    Ok(())
}

fn primitive<'a>(
    view: SerializedValueView<'a>,
    expected: &str,
) -> Result<SerializedPrimitiveView<'a>> {
    view.as_primitive()
        .filter(|p| !p.is_null())
        .ok_or_else(|| Error::type_mismatch(expected, view.kind_name()))
}

fn text<'a>(view: SerializedValueView<'a>, expected: &str) -> Result<std::borrow::Cow<'a, str>> {
    match view.as_string() {
        Some(s) => s.to_str(),
        None => Err(Error::type_mismatch(expected, view.kind_name())),
    }
}

fn integer<T: TryFrom<i64>>(view: SerializedValueView<'_>) -> Result<T> {
    let value = primitive(view, "integer")?.as_i64()?;
    T::try_from(value).map_err(|_| {
        Error::type_mismatch(std::any::type_name::<T>(), &format!("out of range value {value}"))
    })
}

fn special_float(view: SerializedValueView<'_>) -> Result<f64> {
    match text(view, "number")?.as_ref() {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        other => Err(Error::type_mismatch("number", other)),
    }
}

fn float(view: SerializedValueView<'_>) -> Result<f64> {
    if view.as_string().is_some() {
        return special_float(view);
    }
    primitive(view, "number")?.as_f64()
}

fn float32(view: SerializedValueView<'_>) -> Result<f32> {
    if view.as_string().is_some() {
        return special_float(view).map(|f| f as f32);
    }
    let text = primitive(view, "number")?.as_str()?;
    text.parse::<f32>()
        .map_err(|_| Error::type_mismatch("number", text))
}

/// Reads a built-in value of type `ty`.
pub(crate) fn read(view: SerializedValueView<'_>, ty: TypeInfo) -> Result<Box<dyn Any>> {
    let value: Box<dyn Any> = if ty.is::<bool>() {
        Box::new(primitive(view, "boolean")?.as_bool()?)
    } else if ty.is::<i8>() {
        Box::new(integer::<i8>(view)?)
    } else if ty.is::<i16>() {
        Box::new(integer::<i16>(view)?)
    } else if ty.is::<i32>() {
        Box::new(integer::<i32>(view)?)
    } else if ty.is::<i64>() {
        Box::new(integer::<i64>(view)?)
    } else if ty.is::<u8>() {
        Box::new(integer::<u8>(view)?)
    } else if ty.is::<u16>() {
        Box::new(integer::<u16>(view)?)
    } else if ty.is::<u32>() {
        Box::new(integer::<u32>(view)?)
    } else if ty.is::<u64>() {
        Box::new(primitive(view, "unsigned integer")?.as_u64()?)
    } else if ty.is::<f32>() {
        Box::new(float32(view)?)
    } else if ty.is::<f64>() {
        Box::new(float(view)?)
    } else if ty.is::<String>() {
        Box::new(text(view, "string")?.into_owned())
    } else if ty.is::<char>() {
        let s = text(view, "char")?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Box::new(c),
            _ => return Err(Error::type_mismatch("single character", &s)),
        }
    } else if ty.is::<PathBuf>() {
        Box::new(PathBuf::from(text(view, "path")?.as_ref()))
    } else if ty.is::<DateTime<Utc>>() {
        let s = text(view, "RFC 3339 timestamp")?;
        let parsed = DateTime::parse_from_rfc3339(&s)
            .map_err(|e| Error::custom(format!("invalid timestamp `{s}`: {e}")))?;
        Box::new(parsed.with_timezone(&Utc))
    } else if ty.is::<TimeDelta>() {
        Box::new(TimeDelta::nanoseconds(integer::<i64>(view)?))
    } else if ty.is::<BigInt>() {
        let digits = primitive(view, "integer")?.as_str()?;
        Box::new(BigInt::from_str(digits).map_err(|_| Error::type_mismatch("integer", digits))?)
    } else {
        return Err(mismatch(ty));
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonWriterOptions, SerializedObjectReader, SerializedObjectReaderConfig};

    fn written<T: Any>(value: T) -> String {
        let mut writer = JsonWriter::new(JsonWriterOptions::new());
        write(&mut writer, &value, TypeInfo::of::<T>()).unwrap();
        writer.into_string()
    }

    fn read_back<T: Any + Clone>(json: &str) -> Result<T> {
        let mut reader =
            SerializedObjectReader::from_str(json, SerializedObjectReaderConfig::default())?;
        let view = reader.read_value()?.ok_or_else(|| Error::custom("empty"))?;
        let value = read(view, TypeInfo::of::<T>())?;
        Ok(value.downcast_ref::<T>().cloned().unwrap())
    }

    #[test]
    fn test_write_builtins() {
        assert_eq!(written(-3_i8), "-3");
        assert_eq!(written(u64::MAX), "18446744073709551615");
        assert_eq!(written(1.5_f32), "1.5");
        assert_eq!(written('x'), r#""x""#);
        assert_eq!(written(PathBuf::from("a/b")), r#""a/b""#);
        assert_eq!(written(TimeDelta::milliseconds(2)), "2000000");
        assert_eq!(
            written(BigInt::from_str("123456789012345678901234567890").unwrap()),
            "123456789012345678901234567890"
        );
    }

    #[test]
    fn test_read_builtins() {
        assert_eq!(read_back::<u8>("200").unwrap(), 200);
        assert!(read_back::<u8>("300").is_err());
        assert!(read_back::<i32>("\"1\"").is_err());
        assert!(read_back::<f64>("\"NaN\"").unwrap().is_nan());
        assert_eq!(read_back::<f32>("0.1").unwrap(), 0.1_f32);
        assert_eq!(read_back::<char>("\"\\u00e9\"").unwrap(), '\u{e9}');
        assert!(read_back::<char>("\"ab\"").is_err());
    }

    #[test]
    fn test_timestamp_round_trip() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:30:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = written(at);
        assert_eq!(json, r#""2024-05-01T12:30:00.250Z""#);
        assert_eq!(read_back::<DateTime<Utc>>(&json).unwrap(), at);
    }
}
