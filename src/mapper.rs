//! 结果映射：把结果集的行转换为声明的返回类型。
//!
//! 支持的形状：
//! - 标量（`i64`、`String`、`f64`、`Vec<u8>`、`OffsetDateTime` 等）：只取第一列；
//! - `row_struct!` 声明的结构体：按列名写入字段，未匹配的列被忽略；
//! - `HashMap<String, V>` / `BTreeMap<String, V>`：列名到值，NULL 列被跳过；
//! - `Option<T>`：NULL 或无结果时为 `None`；
//! - `Vec<T>`：逐行映射直到结果集耗尽，保持行顺序。
//!
//! `u8` 单独不能作为返回类型，`Vec<u8>` 表示字节序列。

use crate::api::{ExecResult, Rows, StaticResult};
use crate::error::Error;
use crate::scan::{FromValue, ScanError};
use crate::signature::OutputType;
use crate::value::{ScalarKind, SqlValue};
use std::any::{TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::sync::{Arc, OnceLock, RwLock};
use time::OffsetDateTime;

/// 结果映射错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("attempting to return nil for non-pointer type {0}")]
    NilForNonPointer(&'static str),
    #[error("nested collections are not supported: {0}")]
    NestedCollection(&'static str),
    #[error("{0} cannot be built from a result row")]
    Unsupported(&'static str),
    #[error("{0} cannot be returned from an Executor")]
    NotExecOutput(&'static str),
    #[error("error mapping column {column}: {source}")]
    Column { column: String, source: ScanError },
    #[error("no field at path {0}")]
    UnknownField(String),
}

type BuildFn<T> = dyn Fn(&[String], Vec<SqlValue>) -> Result<Option<T>, MapError> + Send + Sync;

/// 单行构造器：列名 + 列值 -> 实例；`None` 表示这一行对应 NULL。
pub struct RowBuilder<T>(Arc<BuildFn<T>>);

impl<T> RowBuilder<T> {
    pub fn new(
        f: impl Fn(&[String], Vec<SqlValue>) -> Result<Option<T>, MapError> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    pub fn build(&self, columns: &[String], values: Vec<SqlValue>) -> Result<Option<T>, MapError> {
        (self.0)(columns, values)
    }
}

impl<T> Clone for RowBuilder<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for RowBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowBuilder<{}>", type_name::<T>())
    }
}

/// 读取下一行的结果。
#[derive(Debug, PartialEq)]
pub enum Next<T> {
    Row(Option<T>),
    /// 结果集已耗尽；与错误区分开。
    Done,
}

/// 读取并映射一行。
pub fn map_row<T>(rows: &mut (dyn Rows + '_), builder: &RowBuilder<T>) -> Result<Next<T>, Error> {
    if !rows.next_row() {
        if let Some(err) = rows.err() {
            return Err(Error::Driver(err));
        }
        return Ok(Next::Done);
    }
    let columns = rows.columns().map_err(Error::Driver)?;
    let mut values = vec![SqlValue::Null; columns.len()];
    rows.scan(&mut values).map_err(Error::Driver)?;
    tracing::trace!(columns = columns.len(), "row.scanned");
    Ok(Next::Row(builder.build(&columns, values)?))
}

/// 可以作为绑定函数返回值的类型。
pub trait Mapped: Sized + 'static {
    /// 单行构造出的类型；集合与可空包装取其元素类型。
    type Row: 'static;

    fn output_type() -> OutputType;

    fn make_builder() -> Result<RowBuilder<Self::Row>, MapError>;

    /// 由单行结果构造自身；`None` 表示 NULL。
    fn from_row(row: Option<Self::Row>) -> Result<Self, MapError>;

    /// 没有结果行时的返回值。
    fn zero() -> Self;

    /// 从结果集构造自身。默认只读第一行，没有行时返回 [`Mapped::zero`]。
    fn collect(rows: &mut (dyn Rows + '_), builder: &RowBuilder<Self::Row>) -> Result<Self, Error> {
        match map_row(rows, builder)? {
            Next::Row(row) => Ok(Self::from_row(row)?),
            Next::Done => Ok(Self::zero()),
        }
    }

    /// 从写操作的结果句柄构造自身。
    fn from_exec(result: Box<dyn ExecResult>) -> Result<Self, Error> {
        drop(result);
        Err(MapError::NotExecOutput(type_name::<Self>()).into())
    }
}

/// 映射整个结果集，之后关闭游标。
pub fn handle_mapping<T: Mapped>(
    mut rows: Box<dyn Rows + '_>,
    builder: &RowBuilder<T::Row>,
) -> Result<T, Error> {
    let out = T::collect(rows.as_mut(), builder);
    if let Err(err) = rows.close() {
        tracing::warn!(error = %err, "rows.close_failed");
    }
    out
}

fn scalar_builder<T: FromValue + 'static>() -> RowBuilder<T> {
    RowBuilder::new(|columns: &[String], values: Vec<SqlValue>| {
        match values.into_iter().next() {
            None | Some(SqlValue::Null) => Ok(None),
            Some(v) => T::from_value(v).map(Some).map_err(|source| MapError::Column {
                column: columns.first().cloned().unwrap_or_default(),
                source,
            }),
        }
    })
}

macro_rules! mapped_scalar {
    ($($t:ty => $kind:ident, $zero:expr);+ $(;)?) => {
        $(impl Mapped for $t {
            type Row = $t;

            fn output_type() -> OutputType {
                OutputType::Scalar(ScalarKind::$kind)
            }

            fn make_builder() -> Result<RowBuilder<$t>, MapError> {
                Ok(scalar_builder::<$t>())
            }

            fn from_row(row: Option<$t>) -> Result<Self, MapError> {
                row.ok_or(MapError::NilForNonPointer(type_name::<$t>()))
            }

            fn zero() -> Self {
                $zero
            }
        })+
    };
}

mapped_scalar!(
    bool => Bool, false;
    i8 => I8, 0;
    i16 => I16, 0;
    i32 => I32, 0;
    u16 => U16, 0;
    u32 => U32, 0;
    u64 => U64, 0;
    f32 => F32, 0.0;
    f64 => F64, 0.0;
    String => String, String::new();
    Vec<u8> => Bytes, Vec::new();
    OffsetDateTime => Time, OffsetDateTime::UNIX_EPOCH;
    SqlValue => Value, SqlValue::Null;
);

/// `i64` 同时是写操作的行数返回值。
impl Mapped for i64 {
    type Row = i64;

    fn output_type() -> OutputType {
        OutputType::Scalar(ScalarKind::I64)
    }

    fn make_builder() -> Result<RowBuilder<i64>, MapError> {
        Ok(scalar_builder::<i64>())
    }

    fn from_row(row: Option<i64>) -> Result<Self, MapError> {
        row.ok_or(MapError::NilForNonPointer("i64"))
    }

    fn zero() -> Self {
        0
    }

    fn from_exec(result: Box<dyn ExecResult>) -> Result<Self, Error> {
        result.rows_affected().map_err(Error::Driver)
    }
}

impl Mapped for Box<dyn ExecResult> {
    type Row = ();

    fn output_type() -> OutputType {
        OutputType::ResultHandle
    }

    fn make_builder() -> Result<RowBuilder<()>, MapError> {
        Err(MapError::Unsupported("result handle"))
    }

    fn from_row(_row: Option<()>) -> Result<Self, MapError> {
        Err(MapError::Unsupported("result handle"))
    }

    fn zero() -> Self {
        Box::new(StaticResult::default())
    }

    fn from_exec(result: Box<dyn ExecResult>) -> Result<Self, Error> {
        Ok(result)
    }
}

impl<T: Mapped<Row = T>> Mapped for Option<T> {
    type Row = T;

    fn output_type() -> OutputType {
        OutputType::Optional(Box::new(T::output_type()))
    }

    fn make_builder() -> Result<RowBuilder<T>, MapError> {
        T::make_builder()
    }

    fn from_row(row: Option<T>) -> Result<Self, MapError> {
        Ok(row)
    }

    fn zero() -> Self {
        None
    }
}

impl<T: Mapped> Mapped for Vec<T> {
    type Row = T::Row;

    fn output_type() -> OutputType {
        OutputType::List(Box::new(T::output_type()))
    }

    fn make_builder() -> Result<RowBuilder<T::Row>, MapError> {
        if let OutputType::List(_) = T::output_type() {
            return Err(MapError::NestedCollection(type_name::<Self>()));
        }
        T::make_builder()
    }

    fn from_row(row: Option<T::Row>) -> Result<Self, MapError> {
        Ok(vec![T::from_row(row)?])
    }

    fn zero() -> Self {
        Vec::new()
    }

    fn collect(rows: &mut (dyn Rows + '_), builder: &RowBuilder<T::Row>) -> Result<Self, Error> {
        let mut out = Vec::new();
        while let Next::Row(row) = map_row(rows, builder)? {
            out.push(T::from_row(row)?);
        }
        Ok(out)
    }
}

fn map_builder<M, V>(insert: fn(&mut M, String, V)) -> RowBuilder<M>
where
    M: Default + 'static,
    V: FromValue + 'static,
{
    RowBuilder::new(move |columns: &[String], values: Vec<SqlValue>| {
        let mut out = M::default();
        for (column, value) in columns.iter().zip(values) {
            if value.is_null() {
                continue;
            }
            let v = V::from_value(value).map_err(|source| MapError::Column {
                column: column.clone(),
                source,
            })?;
            insert(&mut out, column.clone(), v);
        }
        Ok(Some(out))
    })
}

impl<V, S> Mapped for HashMap<String, V, S>
where
    V: FromValue + 'static,
    S: BuildHasher + Default + 'static,
{
    type Row = Self;

    fn output_type() -> OutputType {
        OutputType::Map { string_keys: true }
    }

    fn make_builder() -> Result<RowBuilder<Self>, MapError> {
        Ok(map_builder::<Self, V>(|m, k, v| {
            m.insert(k, v);
        }))
    }

    fn from_row(row: Option<Self>) -> Result<Self, MapError> {
        row.ok_or(MapError::NilForNonPointer(type_name::<Self>()))
    }

    fn zero() -> Self {
        Self::default()
    }
}

impl<V: FromValue + 'static> Mapped for BTreeMap<String, V> {
    type Row = Self;

    fn output_type() -> OutputType {
        OutputType::Map { string_keys: true }
    }

    fn make_builder() -> Result<RowBuilder<Self>, MapError> {
        Ok(map_builder::<Self, V>(|m, k, v| {
            m.insert(k, v);
        }))
    }

    fn from_row(row: Option<Self>) -> Result<Self, MapError> {
        row.ok_or(MapError::NilForNonPointer(type_name::<Self>()))
    }

    fn zero() -> Self {
        Self::new()
    }
}

/// 结构体字段的元数据。
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Rust 字段名
    pub rust: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    /// 叶子列；`key` 标记主键（仅作信息用途）。
    Column { name: &'static str, key: bool },
    /// 嵌入的结构体，其列直接参与映射。
    Embed(fn() -> Vec<FieldSpec>),
}

/// 由 `row_struct!` 实现：可以按列名写入字段的结构体。
pub trait RowStruct: Default + 'static {
    fn fields() -> Vec<FieldSpec>;

    /// 按字段路径写入一个列值。
    fn set_field(&mut self, path: &[&'static str], value: SqlValue) -> Result<(), MapError>;

    /// 主键列名（含嵌入结构体）。
    fn key_columns() -> Vec<&'static str> {
        fn walk(fields: &[FieldSpec], out: &mut Vec<&'static str>) {
            for f in fields {
                match &f.kind {
                    FieldKind::Column { name, key: true } => out.push(*name),
                    FieldKind::Column { .. } => {}
                    FieldKind::Embed(inner) => walk(&inner(), out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&Self::fields(), &mut out);
        out
    }
}

/// 列名 -> 字段路径。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFieldMap {
    columns: HashMap<&'static str, Vec<&'static str>>,
}

impl ColumnFieldMap {
    /// 遍历字段（含嵌入结构体）建立映射；同名列以后出现的为准。
    pub fn build(fields: &[FieldSpec]) -> Self {
        fn walk(
            fields: &[FieldSpec],
            prefix: &mut Vec<&'static str>,
            out: &mut HashMap<&'static str, Vec<&'static str>>,
        ) {
            for f in fields {
                prefix.push(f.rust);
                match &f.kind {
                    FieldKind::Column { name, .. } => {
                        out.insert(*name, prefix.clone());
                    }
                    FieldKind::Embed(inner) => walk(&inner(), prefix, out),
                }
                prefix.pop();
            }
        }
        let mut columns = HashMap::new();
        walk(fields, &mut Vec::new(), &mut columns);
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&[&'static str]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

static COLUMN_MAPS: OnceLock<RwLock<HashMap<TypeId, Arc<ColumnFieldMap>>>> = OnceLock::new();

/// 类型 `T` 的列映射；每个类型只构建一次。
pub fn column_field_map<T: RowStruct>() -> Arc<ColumnFieldMap> {
    let cache = COLUMN_MAPS.get_or_init(|| RwLock::new(HashMap::new()));
    let id = TypeId::of::<T>();
    if let Some(map) = cache.read().unwrap_or_else(|e| e.into_inner()).get(&id) {
        return Arc::clone(map);
    }
    let mut guard = cache.write().unwrap_or_else(|e| e.into_inner());
    let map = guard
        .entry(id)
        .or_insert_with(|| Arc::new(ColumnFieldMap::build(&T::fields())));
    Arc::clone(map)
}

/// `row_struct!` 生成的 [`Mapped::make_builder`] 使用的构造器。
pub fn struct_builder<T: RowStruct>() -> RowBuilder<T> {
    let map = column_field_map::<T>();
    RowBuilder::new(move |columns: &[String], values: Vec<SqlValue>| {
        let mut out = T::default();
        for (column, value) in columns.iter().zip(values) {
            let Some(path) = map.get(column) else {
                continue;
            };
            out.set_field(path, value)?;
        }
        Ok(Some(out))
    })
}

/// 由 `row_struct!` 使用：通过字段访问闭包拿到嵌入结构体的字段表。
#[doc(hidden)]
pub fn embed_of<T, E: RowStruct>(_access: impl Fn(&T) -> &E) -> FieldKind {
    FieldKind::Embed(E::fields)
}

/// 为结构体实现 [`RowStruct`] 与 [`Mapped`]。
///
/// 字段写法：
/// - `id: { column: "id", key }`：列，`key` 可选；字段类型实现 `FieldValue`
///   （`FromValue` 类型或其 `Option`）；
/// - `audit: { embed }`：嵌入另一个 `row_struct!` 结构体。
///
/// 结构体需要实现 `Default`。
#[macro_export]
macro_rules! row_struct {
    (
        impl $ty:ty {
            $($field:ident : { $($spec:tt)* }),* $(,)?
        }
    ) => {
        impl $crate::mapper::RowStruct for $ty {
            fn fields() -> Vec<$crate::mapper::FieldSpec> {
                vec![
                    $(
                        $crate::mapper::FieldSpec {
                            rust: stringify!($field),
                            kind: $crate::__row_field_kind!($ty, $field; $($spec)*),
                        }
                    ),*
                ]
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                path: &[&'static str],
                value: $crate::value::SqlValue,
            ) -> Result<(), $crate::mapper::MapError> {
                let Some((head, rest)) = path.split_first() else {
                    return Err($crate::mapper::MapError::UnknownField(String::new()));
                };
                match *head {
                    $(
                        stringify!($field) => {
                            $crate::__row_field_set!((&mut self.$field), rest, value; $($spec)*)
                        }
                    )*
                    other => Err($crate::mapper::MapError::UnknownField(other.to_string())),
                }
            }
        }

        impl $crate::mapper::Mapped for $ty {
            type Row = $ty;

            fn output_type() -> $crate::signature::OutputType {
                $crate::signature::OutputType::Struct(stringify!($ty))
            }

            fn make_builder()
            -> Result<$crate::mapper::RowBuilder<$ty>, $crate::mapper::MapError> {
                Ok($crate::mapper::struct_builder::<$ty>())
            }

            fn from_row(row: Option<$ty>) -> Result<Self, $crate::mapper::MapError> {
                row.ok_or($crate::mapper::MapError::NilForNonPointer(stringify!($ty)))
            }

            fn zero() -> Self {
                <$ty as Default>::default()
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __row_field_kind {
    ($ty:ty, $field:ident; column: $col:literal, key) => {
        $crate::mapper::FieldKind::Column {
            name: $col,
            key: true,
        }
    };
    ($ty:ty, $field:ident; column: $col:literal) => {
        $crate::mapper::FieldKind::Column {
            name: $col,
            key: false,
        }
    };
    ($ty:ty, $field:ident; embed) => {
        $crate::mapper::embed_of(|v: &$ty| &v.$field)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __row_field_set {
    ($target:expr, $rest:ident, $value:ident; column: $col:literal $(, key)?) => {
        $crate::scan::FieldValue::assign($target, $value).map_err(|source| {
            $crate::mapper::MapError::Column {
                column: $col.to_string(),
                source,
            }
        })
    };
    ($target:expr, $rest:ident, $value:ident; embed) => {
        $crate::mapper::RowStruct::set_field($target, $rest, $value)
    };
}
