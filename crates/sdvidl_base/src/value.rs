//! Typed constant values decoded from literal tokens.
//!
//! The front end does not evaluate IDL type expressions; it only decodes a
//! literal's text into the *smallest native type the value fits*, which is
//! the one portable property a platform-independent compiler can know.
//! [`ConstValue`] is the tagged union holding that result.
//!
//! Integer literals bucket into 8/16/32/64-bit signed or unsigned variants,
//! floating-point literals into `f32`/`f64` by range, strings into the
//! sequence type matching their prefix.

use std::fmt;

/// A literal constant in its smallest fitting native representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// 8-bit signed integer.
    I8(i8),
    /// 16-bit signed integer.
    I16(i16),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 8-bit unsigned integer.
    U8(u8),
    /// 16-bit unsigned integer.
    U16(u16),
    /// 32-bit unsigned integer.
    U32(u32),
    /// 64-bit unsigned integer.
    U64(u64),
    /// Single-precision floating point.
    F32(f32),
    /// Double-precision floating point (the largest portable bucket).
    F64(f64),
    /// Boolean constant (`true`/`TRUE`/`false`/`FALSE` or integer 0/1).
    Bool(bool),
    /// Null constant (`nullptr`, `NULL`, integer 0); always the value 0.
    Null,
    /// ASCII or UTF-8 string.
    Str(String),
    /// UTF-16 code unit sequence (`u"..."` literals).
    Str16(Vec<u16>),
    /// UTF-32 code unit sequence (`U"..."` and wide `L"..."` literals).
    Str32(Vec<u32>),
}

impl ConstValue {
    /// Buckets a signed integer into the smallest fitting variant.
    pub fn from_signed(value: i64) -> Self {
        if let Ok(v) = i8::try_from(value) {
            ConstValue::I8(v)
        } else if let Ok(v) = i16::try_from(value) {
            ConstValue::I16(v)
        } else if let Ok(v) = i32::try_from(value) {
            ConstValue::I32(v)
        } else {
            ConstValue::I64(value)
        }
    }

    /// Buckets an unsigned integer into the smallest fitting variant.
    pub fn from_unsigned(value: u64) -> Self {
        if let Ok(v) = u8::try_from(value) {
            ConstValue::U8(v)
        } else if let Ok(v) = u16::try_from(value) {
            ConstValue::U16(v)
        } else if let Ok(v) = u32::try_from(value) {
            ConstValue::U32(v)
        } else {
            ConstValue::U64(value)
        }
    }

    /// Buckets a floating-point value by range: `f32` when the magnitude is
    /// representable as a single, `f64` otherwise.
    pub fn from_float(value: f64) -> Self {
        let magnitude = value.abs();
        let fits_single = magnitude <= f32::MAX as f64
            && (value == 0.0 || magnitude >= f32::MIN_POSITIVE as f64);
        if fits_single {
            ConstValue::F32(value as f32)
        } else {
            ConstValue::F64(value)
        }
    }

    /// Returns the value as a signed 64-bit integer when it is integral.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ConstValue::I8(v) => Some(v as i64),
            ConstValue::I16(v) => Some(v as i64),
            ConstValue::I32(v) => Some(v as i64),
            ConstValue::I64(v) => Some(v),
            ConstValue::U8(v) => Some(v as i64),
            ConstValue::U16(v) => Some(v as i64),
            ConstValue::U32(v) => Some(v as i64),
            ConstValue::U64(v) => i64::try_from(v).ok(),
            ConstValue::Bool(v) => Some(v as i64),
            ConstValue::Null => Some(0),
            _ => None,
        }
    }

    /// Returns the value as a float when it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ConstValue::F32(v) => Some(v as f64),
            ConstValue::F64(v) => Some(v),
            ConstValue::U64(v) => Some(v as f64),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Returns the contained boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ConstValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Name of the contained native type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstValue::I8(_) => "int8",
            ConstValue::I16(_) => "int16",
            ConstValue::I32(_) => "int32",
            ConstValue::I64(_) => "int64",
            ConstValue::U8(_) => "uint8",
            ConstValue::U16(_) => "uint16",
            ConstValue::U32(_) => "uint32",
            ConstValue::U64(_) => "uint64",
            ConstValue::F32(_) => "float",
            ConstValue::F64(_) => "double",
            ConstValue::Bool(_) => "boolean",
            ConstValue::Null => "null",
            ConstValue::Str(_) => "string",
            ConstValue::Str16(_) => "u16string",
            ConstValue::Str32(_) => "u32string",
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::I8(v) => write!(f, "{v}"),
            ConstValue::I16(v) => write!(f, "{v}"),
            ConstValue::I32(v) => write!(f, "{v}"),
            ConstValue::I64(v) => write!(f, "{v}"),
            ConstValue::U8(v) => write!(f, "{v}"),
            ConstValue::U16(v) => write!(f, "{v}"),
            ConstValue::U32(v) => write!(f, "{v}"),
            ConstValue::U64(v) => write!(f, "{v}"),
            ConstValue::F32(v) => write!(f, "{v}"),
            ConstValue::F64(v) => write!(f, "{v}"),
            ConstValue::Bool(v) => write!(f, "{v}"),
            ConstValue::Null => write!(f, "null"),
            ConstValue::Str(v) => write!(f, "{v}"),
            ConstValue::Str16(v) => {
                write!(f, "{}", String::from_utf16_lossy(v))
            }
            ConstValue::Str32(v) => {
                for unit in v {
                    write!(f, "{}", char::from_u32(*unit).unwrap_or('\u{fffd}'))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_bucketing_picks_smallest_type() {
        assert_eq!(ConstValue::from_signed(5), ConstValue::I8(5));
        assert_eq!(ConstValue::from_signed(-128), ConstValue::I8(-128));
        assert_eq!(ConstValue::from_signed(300), ConstValue::I16(300));
        assert_eq!(ConstValue::from_signed(70_000), ConstValue::I32(70_000));
        assert_eq!(
            ConstValue::from_signed(5_000_000_000),
            ConstValue::I64(5_000_000_000)
        );
    }

    #[test]
    fn unsigned_bucketing_picks_smallest_type() {
        assert_eq!(ConstValue::from_unsigned(255), ConstValue::U8(255));
        assert_eq!(ConstValue::from_unsigned(256), ConstValue::U16(256));
        assert_eq!(ConstValue::from_unsigned(1 << 20), ConstValue::U32(1 << 20));
        assert_eq!(
            ConstValue::from_unsigned(u64::MAX),
            ConstValue::U64(u64::MAX)
        );
    }

    #[test]
    fn float_bucketing_by_range() {
        assert_eq!(ConstValue::from_float(1.5), ConstValue::F32(1.5));
        match ConstValue::from_float(1e100) {
            ConstValue::F64(v) => assert_eq!(v, 1e100),
            other => panic!("expected F64, got {other:?}"),
        }
        assert_eq!(ConstValue::from_float(0.0), ConstValue::F32(0.0));
    }

    #[test]
    fn integral_conversions() {
        assert_eq!(ConstValue::I16(-4).as_i64(), Some(-4));
        assert_eq!(ConstValue::Null.as_i64(), Some(0));
        assert_eq!(ConstValue::Bool(true).as_i64(), Some(1));
        assert_eq!(ConstValue::Str(String::new()).as_i64(), None);
    }
}
