//! 路径解析：在参数的静态类型或运行时值上按 `a.b.0` 这样的路径取出末端。
//!
//! 路径的第一段对应传入的根本身，后续每段依次是字段名、map 键或下标。

use crate::param::{Param, ParamType};
use crate::value::ScalarKind;
use crate::valuer::ValuerError;

/// 路径解析错误。所有越界、空值、缺键都以错误返回，不会 panic。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot extract value; no path remaining")]
    NoPathRemaining,
    #[error("cannot extract type; no path remaining")]
    NoTypePathRemaining,
    #[error("cannot extract value; only maps and structs can have contained values")]
    NotContainer,
    #[error(
        "cannot find the type for the subfield of anything other than a map, struct, slice, or array"
    )]
    NotContainerType,
    #[error("cannot extract value; map does not have a string key")]
    MapKeyNotString,
    #[error("cannot extract value; no such map key {0}")]
    NoSuchMapKey(String),
    #[error("cannot extract value; no such field {0}")]
    NoSuchField(String),
    #[error("cannot find the type; no such field {0}")]
    NoSuchTypeField(String),
    #[error("invalid index: {0}")]
    InvalidIndex(String),
    #[error("cannot extract value; {0} is nil")]
    Nil(String),
    #[error("{0}")]
    Valuer(#[from] ValuerError),
}

fn parse_index(seg: &str) -> Result<usize, ExtractError> {
    seg.parse::<usize>()
        .map_err(|_| ExtractError::InvalidIndex(seg.to_string()))
}

/// 解析路径末端的静态类型。
///
/// map 的值类型未知（动态 map）时直接返回，不再继续向下解析。
pub fn extract_type(root: &ParamType, path: &[&str]) -> Result<ParamType, ExtractError> {
    let Some((_, rest)) = path.split_first() else {
        return Err(ExtractError::NoTypePathRemaining);
    };
    let cur = root.unwrap_optional();
    let Some(next) = rest.first() else {
        return Ok(cur.clone());
    };
    match cur {
        ParamType::Map { string_keys, value } => {
            if !string_keys {
                return Err(ExtractError::MapKeyNotString);
            }
            if matches!(**value, ParamType::Scalar(ScalarKind::Value)) {
                return Ok((**value).clone());
            }
            extract_type(value, rest)
        }
        ParamType::Struct { fields, .. } => match fields.iter().find(|(name, _)| name == next) {
            Some((_, ty)) => extract_type(ty, rest),
            None => Err(ExtractError::NoSuchTypeField(next.to_string())),
        },
        ParamType::Slice(elem) => {
            parse_index(next)?;
            extract_type(elem, rest)
        }
        ParamType::Scalar(ScalarKind::Value) => Ok(cur.clone()),
        _ => Err(ExtractError::NotContainerType),
    }
}

/// 在运行时值上解析路径；末端如果是 Valuer，会被求值为普通值。
pub fn extract(root: &Param, path: &[&str]) -> Result<Param, ExtractError> {
    let Some((head, rest)) = path.split_first() else {
        return Err(ExtractError::NoPathRemaining);
    };
    let Some(next) = rest.first() else {
        return match root {
            Param::Valuer(v) => Ok(Param::Value(v.value()?)),
            other => Ok(other.clone()),
        };
    };
    match root {
        Param::Map(entries) => {
            if entries.iter().any(|(k, _)| k.as_str().is_none()) {
                return Err(ExtractError::MapKeyNotString);
            }
            match entries.iter().find(|(k, _)| k.as_str() == Some(*next)) {
                Some((_, v)) => extract(v, rest),
                None => Err(ExtractError::NoSuchMapKey(next.to_string())),
            }
        }
        Param::Struct(fields) => match fields.iter().find(|(name, _)| name == next) {
            Some((_, v)) => extract(v, rest),
            None => Err(ExtractError::NoSuchField(next.to_string())),
        },
        Param::List(items) => {
            let pos = parse_index(next)?;
            match items.get(pos) {
                Some(v) => extract(v, rest),
                None => Err(ExtractError::InvalidIndex(next.to_string())),
            }
        }
        Param::Value(v) if v.is_null() => Err(ExtractError::Nil(head.to_string())),
        Param::Value(_) | Param::Valuer(_) => Err(ExtractError::NotContainer),
    }
}
