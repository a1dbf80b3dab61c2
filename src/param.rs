//! 调用参数：运行时的值树 `Param` 与静态类型树 `ParamType`。
//!
//! Rust 没有运行时反射；参数类型通过 [`ToParam`] 在编译期描述自身，
//! 模板编译器据此判断路径是否合法、占位符是否需要按切片展开。

use crate::value::{ScalarKind, SqlValue};
use crate::valuer::SqlValuer;
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;

/// 参数的静态类型描述。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Scalar(ScalarKind),
    /// 自行序列化为单个驱动值的类型，永远按标量处理。
    Valuer,
    /// 可空包装（`Option<T>`），路径解析时透明。
    Optional(Box<ParamType>),
    /// 有序集合（`Vec<T>`、`[T; N]`）。
    Slice(Box<ParamType>),
    /// 映射；值类型只能在运行时确定时为 `Scalar(Value)`。
    Map {
        string_keys: bool,
        value: Box<ParamType>,
    },
    Struct {
        name: &'static str,
        fields: Vec<(&'static str, ParamType)>,
    },
}

impl ParamType {
    /// 去掉外层的 `Optional`。
    pub fn unwrap_optional(&self) -> &ParamType {
        let mut cur = self;
        while let ParamType::Optional(inner) = cur {
            cur = inner;
        }
        cur
    }

    /// 是否需要在 SQL 中展开为逗号分隔的多个占位符。
    ///
    /// 字节序列与 Valuer 永远是标量。
    pub fn is_expandable(&self) -> bool {
        match self.unwrap_optional() {
            ParamType::Slice(elem) => !matches!(
                elem.unwrap_optional(),
                ParamType::Scalar(ScalarKind::U8) | ParamType::Valuer
            ),
            _ => false,
        }
    }

    /// 是否可以在其上继续解析 `.field` / `.0` 路径。
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.unwrap_optional(),
            ParamType::Map { .. } | ParamType::Struct { .. } | ParamType::Slice(_)
        )
    }
}

/// 运行时参数值。
#[derive(Debug, Clone)]
pub enum Param {
    Value(SqlValue),
    Valuer(Box<dyn SqlValuer>),
    List(Vec<Param>),
    Map(Vec<(SqlValue, Param)>),
    Struct(Vec<(&'static str, Param)>),
}

impl Param {
    pub fn null() -> Self {
        Param::Value(SqlValue::Null)
    }

    /// 从运行时值推断静态类型，供动态查询使用。
    ///
    /// 空列表与 map 的值类型无法推断，记为 `Scalar(Value)`。
    pub fn infer_type(&self) -> ParamType {
        match self {
            Param::Value(SqlValue::Null) => {
                ParamType::Optional(Box::new(ParamType::Scalar(ScalarKind::Value)))
            }
            Param::Value(v) => ParamType::Scalar(v.kind()),
            Param::Valuer(_) => ParamType::Valuer,
            Param::List(items) => ParamType::Slice(Box::new(
                items
                    .first()
                    .map(Param::infer_type)
                    .unwrap_or(ParamType::Scalar(ScalarKind::Value)),
            )),
            Param::Map(entries) => ParamType::Map {
                string_keys: entries
                    .iter()
                    .all(|(k, _)| matches!(k, SqlValue::String(_))),
                value: Box::new(ParamType::Scalar(ScalarKind::Value)),
            },
            Param::Struct(fields) => ParamType::Struct {
                name: "",
                fields: fields
                    .iter()
                    .map(|(name, p)| (*name, p.infer_type()))
                    .collect(),
            },
        }
    }
}

impl From<SqlValue> for Param {
    fn from(v: SqlValue) -> Self {
        Param::Value(v)
    }
}

/// 可以作为绑定函数参数的类型。
pub trait ToParam {
    fn param_type() -> ParamType
    where
        Self: Sized;

    fn to_param(&self) -> Param;

    /// `Vec<Self>` 的静态类型；`u8` 覆盖为字节序列。
    fn slice_param_type() -> ParamType
    where
        Self: Sized,
    {
        ParamType::Slice(Box::new(Self::param_type()))
    }

    /// `[Self]` 的运行时值；`u8` 覆盖为字节序列。
    fn slice_param(items: &[Self]) -> Param
    where
        Self: Sized,
    {
        Param::List(items.iter().map(ToParam::to_param).collect())
    }
}

macro_rules! to_param_scalar {
    ($($t:ty => $kind:ident),+ $(,)?) => {
        $(impl ToParam for $t {
            fn param_type() -> ParamType {
                ParamType::Scalar(ScalarKind::$kind)
            }

            fn to_param(&self) -> Param {
                Param::Value(SqlValue::from(self.clone()))
            }
        })+
    };
}

to_param_scalar!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    &'static str => String,
    OffsetDateTime => Time,
);

impl ToParam for u8 {
    fn param_type() -> ParamType {
        ParamType::Scalar(ScalarKind::U8)
    }

    fn to_param(&self) -> Param {
        Param::Value(SqlValue::from(*self))
    }

    fn slice_param_type() -> ParamType {
        ParamType::Scalar(ScalarKind::Bytes)
    }

    fn slice_param(items: &[Self]) -> Param {
        Param::Value(SqlValue::Bytes(items.to_vec()))
    }
}

impl ToParam for SqlValue {
    fn param_type() -> ParamType {
        ParamType::Scalar(ScalarKind::Value)
    }

    fn to_param(&self) -> Param {
        Param::Value(self.clone())
    }
}

impl ToParam for Box<dyn SqlValuer> {
    fn param_type() -> ParamType {
        ParamType::Valuer
    }

    fn to_param(&self) -> Param {
        Param::Valuer(self.clone())
    }
}

impl<T: ToParam> ToParam for Option<T> {
    fn param_type() -> ParamType {
        ParamType::Optional(Box::new(T::param_type()))
    }

    fn to_param(&self) -> Param {
        match self {
            Some(v) => v.to_param(),
            // 缺失的列表按空列表传递。
            None if T::param_type().is_expandable() => Param::List(Vec::new()),
            None => Param::null(),
        }
    }
}

impl<T: ToParam> ToParam for Vec<T> {
    fn param_type() -> ParamType {
        T::slice_param_type()
    }

    fn to_param(&self) -> Param {
        T::slice_param(self)
    }
}

impl<T: ToParam, const N: usize> ToParam for [T; N] {
    fn param_type() -> ParamType {
        T::slice_param_type()
    }

    fn to_param(&self) -> Param {
        T::slice_param(self)
    }
}

/// 可以作为 map 键的类型。
pub trait MapKey {
    const IS_STRING: bool;

    fn key_value(&self) -> SqlValue;
}

impl MapKey for String {
    const IS_STRING: bool = true;

    fn key_value(&self) -> SqlValue {
        SqlValue::from(self.clone())
    }
}

impl MapKey for &'static str {
    const IS_STRING: bool = true;

    fn key_value(&self) -> SqlValue {
        SqlValue::from(*self)
    }
}

macro_rules! map_key_int {
    ($($t:ty),+ $(,)?) => {
        $(impl MapKey for $t {
            const IS_STRING: bool = false;

            fn key_value(&self) -> SqlValue {
                SqlValue::from(*self)
            }
        })+
    };
}

map_key_int!(bool, i8, i16, i32, i64, u8, u16, u32, u64);

fn map_param<'a, K, V>(entries: impl Iterator<Item = (&'a K, &'a V)>) -> Param
where
    K: MapKey + 'a,
    V: ToParam + 'a,
{
    Param::Map(entries.map(|(k, v)| (k.key_value(), v.to_param())).collect())
}

impl<K: MapKey, V: ToParam, S> ToParam for HashMap<K, V, S> {
    fn param_type() -> ParamType {
        ParamType::Map {
            string_keys: K::IS_STRING,
            value: Box::new(V::param_type()),
        }
    }

    fn to_param(&self) -> Param {
        map_param(self.iter())
    }
}

impl<K: MapKey, V: ToParam> ToParam for BTreeMap<K, V> {
    fn param_type() -> ParamType {
        ParamType::Map {
            string_keys: K::IS_STRING,
            value: Box::new(V::param_type()),
        }
    }

    fn to_param(&self) -> Param {
        map_param(self.iter())
    }
}

/// 由 `param_struct!` 使用：通过字段访问闭包拿到字段的静态类型。
#[doc(hidden)]
pub fn field_type<T, F: ToParam>(_access: impl Fn(&T) -> &F) -> ParamType {
    F::param_type()
}

/// 为结构体实现 [`ToParam`]，使其字段可以通过 `:p.field:` 路径引用。
///
/// ```ignore
/// param_struct! {
///     impl Person {
///         name,
///         age,
///     }
/// }
/// ```
#[macro_export]
macro_rules! param_struct {
    (
        impl $ty:ty {
            $($field:ident),* $(,)?
        }
    ) => {
        impl $crate::param::ToParam for $ty {
            fn param_type() -> $crate::param::ParamType {
                $crate::param::ParamType::Struct {
                    name: stringify!($ty),
                    fields: vec![
                        $(
                            (
                                stringify!($field),
                                $crate::param::field_type(|v: &$ty| &v.$field),
                            )
                        ),*
                    ],
                }
            }

            fn to_param(&self) -> $crate::param::Param {
                $crate::param::Param::Struct(vec![
                    $(
                        (
                            stringify!($field),
                            $crate::param::ToParam::to_param(&self.$field),
                        )
                    ),*
                ])
            }
        }
    };
}
