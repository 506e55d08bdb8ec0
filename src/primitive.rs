//! The built-in value types handled by the internal adapters of both codecs.

use crate::TypeInfo;
use chrono::{DateTime, TimeDelta, Utc};
use num_bigint::BigInt;
use std::path::PathBuf;

/// Every type the internal adapters (de)serialize without a property bag.
#[must_use]
pub fn builtin_types() -> [TypeInfo; 17] {
    [
        TypeInfo::of::<bool>(),
        TypeInfo::of::<char>(),
        TypeInfo::of::<i8>(),
        TypeInfo::of::<i16>(),
        TypeInfo::of::<i32>(),
        TypeInfo::of::<i64>(),
        TypeInfo::of::<u8>(),
        TypeInfo::of::<u16>(),
        TypeInfo::of::<u32>(),
        TypeInfo::of::<u64>(),
        TypeInfo::of::<f32>(),
        TypeInfo::of::<f64>(),
        TypeInfo::of::<String>(),
        TypeInfo::of::<PathBuf>(),
        TypeInfo::of::<DateTime<Utc>>(),
        TypeInfo::of::<TimeDelta>(),
        TypeInfo::of::<BigInt>(),
    ]
}

#[must_use]
pub fn is_builtin(ty: &TypeInfo) -> bool {
    builtin_types().contains(ty)
}

/// Built-ins that are written as JSON strings.
#[must_use]
pub fn is_string_like(ty: &TypeInfo) -> bool {
    ty.is::<String>() || ty.is::<char>() || ty.is::<PathBuf>() || ty.is::<DateTime<Utc>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_membership() {
        assert!(is_builtin(&TypeInfo::of::<u16>()));
        assert!(is_builtin(&TypeInfo::of::<BigInt>()));
        assert!(!is_builtin(&TypeInfo::of::<Vec<u16>>()));
        assert!(!is_builtin(&TypeInfo::of::<Option<u16>>()));
    }
}
