//! Scan：把结果集里的单个列值写入 Rust 字段。
//!
//! `FromValue` 是“单值解析”能力：自定义类型实现它之后会被当作叶子列，
//! 映射器不会再尝试展开它的内部字段。`FieldValue` 在此基础上区分可空与不可空字段。

use crate::value::SqlValue;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// 扫描/转换错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("cannot assign NULL to non-optional type {0}")]
    Null(&'static str),
    #[error("cannot convert {from} into {to}")]
    Convert { from: &'static str, to: &'static str },
    #[error("value {value} is out of range for {to}")]
    OutOfRange { value: String, to: &'static str },
    #[error("failed to parse {value:?} as {to}")]
    Parse { value: String, to: &'static str },
}

fn variant_name(v: &SqlValue) -> &'static str {
    match v {
        SqlValue::Null => "NULL",
        SqlValue::Bool(_) => "bool",
        SqlValue::I64(_) => "i64",
        SqlValue::U64(_) => "u64",
        SqlValue::F64(_) => "f64",
        SqlValue::String(_) => "string",
        SqlValue::Bytes(_) => "bytes",
        SqlValue::DateTime(_) => "datetime",
    }
}

fn convert_err(v: &SqlValue, to: &'static str) -> ScanError {
    ScanError::Convert {
        from: variant_name(v),
        to,
    }
}

/// 从单个非空列值构造自身。
///
/// 调用方保证传入的值不是 `SqlValue::Null`；空值由 [`FieldValue`] 处理。
pub trait FromValue: Sized {
    fn from_value(value: SqlValue) -> Result<Self, ScanError>;
}

/// 可以接收一个（可能为空的）列值的字段。
///
/// 普通字段遇到 NULL 报错；`Option<T>` 字段遇到 NULL 置为 `None`。
pub trait FieldValue {
    fn assign(&mut self, value: SqlValue) -> Result<(), ScanError>;
}

impl<T: FromValue> FieldValue for T {
    fn assign(&mut self, value: SqlValue) -> Result<(), ScanError> {
        if value.is_null() {
            return Err(ScanError::Null(std::any::type_name::<T>()));
        }
        *self = T::from_value(value)?;
        Ok(())
    }
}

impl<T: FromValue> FieldValue for Option<T> {
    fn assign(&mut self, value: SqlValue) -> Result<(), ScanError> {
        *self = match value {
            SqlValue::Null => None,
            v => Some(T::from_value(v)?),
        };
        Ok(())
    }
}

fn text_of(value: &SqlValue) -> Option<&str> {
    match value {
        SqlValue::String(s) => Some(&**s),
        SqlValue::Bytes(b) => std::str::from_utf8(b).ok(),
        _ => None,
    }
}

macro_rules! from_value_int {
    ($($t:ty),+ $(,)?) => {
        $(impl FromValue for $t {
            fn from_value(value: SqlValue) -> Result<Self, ScanError> {
                let to = stringify!($t);
                let out_of_range = |v: String| ScanError::OutOfRange { value: v, to };
                match &value {
                    SqlValue::I64(n) => <$t>::try_from(*n).map_err(|_| out_of_range(n.to_string())),
                    SqlValue::U64(n) => <$t>::try_from(*n).map_err(|_| out_of_range(n.to_string())),
                    SqlValue::F64(f) if f.fract() == 0.0 => {
                        let n = *f as i128;
                        <$t>::try_from(n).map_err(|_| out_of_range(f.to_string()))
                    }
                    _ => match text_of(&value) {
                        Some(s) => s.trim().parse::<$t>().map_err(|_| ScanError::Parse {
                            value: s.to_string(),
                            to,
                        }),
                        None => Err(convert_err(&value, to)),
                    },
                }
            }
        })+
    };
}

from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! from_value_float {
    ($($t:ty),+ $(,)?) => {
        $(impl FromValue for $t {
            fn from_value(value: SqlValue) -> Result<Self, ScanError> {
                let to = stringify!($t);
                match &value {
                    SqlValue::F64(f) => Ok(*f as $t),
                    SqlValue::I64(n) => Ok(*n as $t),
                    SqlValue::U64(n) => Ok(*n as $t),
                    _ => match text_of(&value) {
                        Some(s) => s.trim().parse::<$t>().map_err(|_| ScanError::Parse {
                            value: s.to_string(),
                            to,
                        }),
                        None => Err(convert_err(&value, to)),
                    },
                }
            }
        })+
    };
}

from_value_float!(f32, f64);

impl FromValue for bool {
    fn from_value(value: SqlValue) -> Result<Self, ScanError> {
        match &value {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::I64(n) => Ok(*n != 0),
            SqlValue::U64(n) => Ok(*n != 0),
            _ => match text_of(&value) {
                Some("true" | "TRUE" | "True" | "t" | "1") => Ok(true),
                Some("false" | "FALSE" | "False" | "f" | "0") => Ok(false),
                Some(s) => Err(ScanError::Parse {
                    value: s.to_string(),
                    to: "bool",
                }),
                None => Err(convert_err(&value, "bool")),
            },
        }
    }
}

impl FromValue for String {
    fn from_value(value: SqlValue) -> Result<Self, ScanError> {
        match value {
            SqlValue::String(s) => Ok(s.into_owned()),
            SqlValue::Bytes(b) => String::from_utf8(b).map_err(|e| ScanError::Parse {
                value: format!("{:?}", e.as_bytes()),
                to: "String",
            }),
            SqlValue::Bool(b) => Ok(b.to_string()),
            SqlValue::I64(n) => Ok(n.to_string()),
            SqlValue::U64(n) => Ok(n.to_string()),
            SqlValue::F64(f) => Ok(f.to_string()),
            SqlValue::DateTime(dt) => dt
                .format(&Rfc3339)
                .map_err(|_| convert_err(&SqlValue::DateTime(dt), "String")),
            SqlValue::Null => Err(ScanError::Null("String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: SqlValue) -> Result<Self, ScanError> {
        match value {
            SqlValue::Bytes(b) => Ok(b),
            SqlValue::String(s) => Ok(s.into_owned().into_bytes()),
            other => Err(convert_err(&other, "Vec<u8>")),
        }
    }
}

impl FromValue for OffsetDateTime {
    fn from_value(value: SqlValue) -> Result<Self, ScanError> {
        match value {
            SqlValue::DateTime(dt) => Ok(dt),
            SqlValue::I64(ts) => OffsetDateTime::from_unix_timestamp(ts).map_err(|_| {
                ScanError::OutOfRange {
                    value: ts.to_string(),
                    to: "OffsetDateTime",
                }
            }),
            other => Err(convert_err(&other, "OffsetDateTime")),
        }
    }
}

impl FromValue for SqlValue {
    fn from_value(value: SqlValue) -> Result<Self, ScanError> {
        Ok(value)
    }
}
