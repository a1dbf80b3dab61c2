//! 查询模板编译：把 `:name:` 占位符替换为方言的位置占位符，并生成参数计划。
//!
//! 语法：
//! - `:path:` 声明一个占位符，`path` 按 [`validate_identifier`] 校验；
//! - `\x` 输出字符 `x` 本身（用于转义 `:` 与 `\`）；
//! - 解析到切片类型的占位符在调用时按实际长度展开为 `?, ?, ?`。
//!
//! 不含切片占位符的查询在编译期就渲染完毕（[`QueryTemplate::Simple`]）；
//! 否则保留分段结构，每次调用按参数长度重新渲染。

use crate::extract::{ExtractError, extract, extract_type};
use crate::flavor::ParamAdapter;
use crate::ident::{IdentError, validate_identifier};
use crate::param::{Param, ParamType};
use crate::string_builder::StringBuilder;
use crate::value::SqlValue;
use std::borrow::Cow;
use std::collections::HashMap;

/// 参数名 -> 函数参数位置。
pub type NameOrderMap = HashMap<String, usize>;

/// 模板编译/绑定错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("empty variable declaration at position {position}")]
    EmptyVariable { position: usize },
    #[error("missing a closing : somewhere: {0}")]
    MissingClosingDelimiter(String),
    #[error("query parameter {0} cannot be found in the incoming parameters")]
    ParameterNotFound(String),
    #[error("query parameter {0} has a path, but the incoming parameter is not a map or a struct")]
    PathOnScalar(String),
    #[error("query parameter {name} refers to position {position}, which is not a value parameter")]
    PositionOutOfRange { name: String, position: usize },
    #[error("query parameter {0} must resolve to a single value")]
    NotScalar(String),
    #[error("query parameter {0} must resolve to a list")]
    NotSlice(String),
    #[error("expected {expected} parameter bindings, got {actual}")]
    BindingCount { expected: usize, actual: usize },
    #[error(transparent)]
    Ident(#[from] IdentError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// 按位置查询参数静态类型的能力。
///
/// 绑定函数的签名与动态查询的参数列表都实现它；非值参数（执行器、Context）返回 `None`。
pub trait ParamTypes {
    fn param_type(&self, position: usize) -> Option<&ParamType>;

    /// 占位符路径末端的类型，`ty` 是 `position` 处的参数类型。
    fn path_type(
        &self,
        ty: &ParamType,
        _position: usize,
        path: &[&str],
    ) -> Result<ParamType, ExtractError> {
        extract_type(ty, path)
    }
}

impl ParamTypes for [ParamType] {
    fn param_type(&self, position: usize) -> Option<&ParamType> {
        self.get(position)
    }
}

impl ParamTypes for Vec<ParamType> {
    fn param_type(&self, position: usize) -> Option<&ParamType> {
        self.get(position)
    }
}

/// 由实参值推断类型的参数列表，供动态查询使用。
///
/// 带路径的占位符沿实参解析到末端后再推断，map 中的列表因此也能展开。
pub struct RuntimeTypes<'a> {
    values: &'a [Param],
    types: Vec<ParamType>,
}

impl<'a> RuntimeTypes<'a> {
    pub fn new(values: &'a [Param]) -> Self {
        Self {
            values,
            types: values.iter().map(Param::infer_type).collect(),
        }
    }
}

impl ParamTypes for RuntimeTypes<'_> {
    fn param_type(&self, position: usize) -> Option<&ParamType> {
        self.types.get(position)
    }

    fn path_type(
        &self,
        ty: &ParamType,
        position: usize,
        path: &[&str],
    ) -> Result<ParamType, ExtractError> {
        match self.values.get(position) {
            Some(value) if path.len() > 1 => extract(value, path).map(|p| p.infer_type()),
            _ => extract_type(ty, path),
        }
    }
}

/// 参数计划中的一项：占位符路径、对应的函数参数位置、是否按切片展开。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub position: usize,
    pub is_slice: bool,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, position: usize, is_slice: bool) -> Self {
        Self {
            name: name.into(),
            position,
            is_slice,
        }
    }
}

/// 模板片段：原样文本，或参数计划中第 N 项的占位符。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Param(usize),
}

/// 编译后的查询。
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTemplate {
    /// 已完全渲染的查询。
    Simple(String),
    /// 含切片占位符，需要在每次调用时按参数长度渲染。
    Templated {
        segments: Vec<Segment>,
        adapter: ParamAdapter,
    },
}

/// 调用时从实参中解析出的单个占位符的值。
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBinding {
    Scalar(SqlValue),
    Slice(Vec<SqlValue>),
}

impl ParameterBinding {
    /// 该占位符会占用的位置参数个数。
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Slice(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 可以直接交给执行器的查询与位置参数。
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

fn render(
    segments: &[Segment],
    adapter: &ParamAdapter,
    len_of: impl Fn(usize) -> usize,
) -> String {
    let mut out = StringBuilder::new();
    let mut pos = 1;
    for seg in segments {
        match seg {
            Segment::Text(s) => out.write_str(s),
            Segment::Param(idx) => {
                let n = len_of(*idx);
                out.write_joined((pos..pos + n).map(|i| adapter.render(i)), ", ");
                pos += n;
            }
        }
    }
    out.into_string()
}

/// 编译查询模板。
///
/// `names` 把占位符路径的首段映射到函数参数位置，`types` 提供该位置的静态类型。
/// 同一个名字出现多次时，每次出现都占用一个新的位置。
pub fn compile(
    query: &str,
    names: &NameOrderMap,
    types: &(impl ParamTypes + ?Sized),
    adapter: &ParamAdapter,
) -> Result<(QueryTemplate, Vec<ParamInfo>), TemplateError> {
    let mut segments = Vec::new();
    let mut plan: Vec<ParamInfo> = Vec::new();
    let mut text = StringBuilder::with_capacity(query.len());
    let mut cur_var = String::new();
    let mut in_escape = false;
    let mut in_var = false;
    let mut has_slice = false;

    for (pos, c) in query.char_indices() {
        if in_escape {
            if in_var {
                cur_var.push(c);
            } else {
                text.write_char(c);
            }
            in_escape = false;
            continue;
        }
        match c {
            '\\' => in_escape = true,
            ':' if in_var => {
                if cur_var.is_empty() {
                    return Err(TemplateError::EmptyVariable { position: pos });
                }
                let id = validate_identifier(&cur_var)?;
                let path: Vec<&str> = id.split('.').collect();
                let name = path.first().copied().unwrap_or_default();
                let Some(&position) = names.get(name) else {
                    return Err(TemplateError::ParameterNotFound(name.to_string()));
                };
                let Some(ty) = types.param_type(position) else {
                    return Err(TemplateError::PositionOutOfRange {
                        name: name.to_string(),
                        position,
                    });
                };
                if path.len() > 1 && !ty.is_aggregate() {
                    return Err(TemplateError::PathOnScalar(name.to_string()));
                }
                let is_slice = types.path_type(ty, position, &path)?.is_expandable();
                has_slice |= is_slice;

                if !text.is_empty() {
                    segments.push(Segment::Text(text.take()));
                }
                segments.push(Segment::Param(plan.len()));
                plan.push(ParamInfo::new(id, position, is_slice));

                in_var = false;
                cur_var.clear();
            }
            ':' => in_var = true,
            _ if in_var => cur_var.push(c),
            _ => text.write_char(c),
        }
    }
    if in_var || in_escape {
        return Err(TemplateError::MissingClosingDelimiter(query.to_string()));
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.take()));
    }

    tracing::debug!(query, params = plan.len(), has_slice, "template.compiled");
    if !has_slice {
        let simple = render(&segments, adapter, |_| 1);
        return Ok((QueryTemplate::Simple(simple), plan));
    }
    Ok((
        QueryTemplate::Templated {
            segments,
            adapter: adapter.clone(),
        },
        plan,
    ))
}

impl QueryTemplate {
    /// 按绑定结果渲染最终查询；`Simple` 直接返回已渲染的字符串。
    pub fn finalize(&self, bindings: &[ParameterBinding]) -> Result<Cow<'_, str>, TemplateError> {
        match self {
            Self::Simple(s) => Ok(Cow::Borrowed(s.as_str())),
            Self::Templated { segments, adapter } => {
                let expected = segments
                    .iter()
                    .filter(|s| matches!(s, Segment::Param(_)))
                    .count();
                if bindings.len() != expected {
                    return Err(TemplateError::BindingCount {
                        expected,
                        actual: bindings.len(),
                    });
                }
                let len_of = |idx: usize| bindings.get(idx).map_or(0, ParameterBinding::len);
                Ok(Cow::Owned(render(segments, adapter, len_of)))
            }
        }
    }

    /// 解析实参、渲染查询并展开位置参数。
    ///
    /// `offset` 是第一个值参数在函数签名中的位置（跳过 Context 与执行器）。
    pub fn bind(
        &self,
        plan: &[ParamInfo],
        args: &[Param],
        offset: usize,
    ) -> Result<BoundQuery, TemplateError> {
        let bindings = bind_parameters(plan, args, offset)?;
        let sql = self.finalize(&bindings)?.into_owned();
        Ok(BoundQuery {
            sql,
            args: flatten(bindings),
        })
    }
}

fn scalar_of(p: Param, name: &str) -> Result<SqlValue, TemplateError> {
    match p {
        Param::Value(v) => Ok(v),
        Param::Valuer(v) => v
            .value()
            .map_err(|e| TemplateError::Extract(ExtractError::Valuer(e))),
        _ => Err(TemplateError::NotScalar(name.to_string())),
    }
}

/// 按参数计划从实参中取值。
pub fn bind_parameters(
    plan: &[ParamInfo],
    args: &[Param],
    offset: usize,
) -> Result<Vec<ParameterBinding>, TemplateError> {
    plan.iter()
        .map(|info| -> Result<ParameterBinding, TemplateError> {
            let root = info
                .position
                .checked_sub(offset)
                .and_then(|i| args.get(i))
                .ok_or_else(|| TemplateError::PositionOutOfRange {
                    name: info.name.clone(),
                    position: info.position,
                })?;
            let path: Vec<&str> = info.name.split('.').collect();
            let value = extract(root, &path)?;
            if !info.is_slice {
                return scalar_of(value, &info.name).map(ParameterBinding::Scalar);
            }
            match value {
                Param::List(items) => items
                    .into_iter()
                    .map(|p| scalar_of(p, &info.name))
                    .collect::<Result<Vec<_>, _>>()
                    .map(ParameterBinding::Slice),
                Param::Value(SqlValue::Null) => Ok(ParameterBinding::Slice(Vec::new())),
                _ => Err(TemplateError::NotSlice(info.name.clone())),
            }
        })
        .collect()
}

/// 把绑定结果展开为位置参数，切片按元素顺序展开。
pub fn flatten(bindings: Vec<ParameterBinding>) -> Vec<SqlValue> {
    let mut out = Vec::with_capacity(bindings.iter().map(ParameterBinding::len).sum());
    for b in bindings {
        match b {
            ParameterBinding::Scalar(v) => out.push(v),
            ParameterBinding::Slice(items) => out.extend(items),
        }
    }
    out
}

/// 由逗号分隔的参数名列表构建名称映射，位置从 `start` 开始。
pub fn build_name_order_map(param_order: &str, start: usize) -> NameOrderMap {
    build_names_map(param_order.split(','), start)
}

/// 由参数名列表构建名称映射，位置从 `start` 开始；名字两侧空白会被去掉。
pub fn build_names_map<'a>(names: impl IntoIterator<Item = &'a str>, start: usize) -> NameOrderMap {
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i + start))
        .collect()
}

/// 没有声明参数名时，用 `$1..$N` 作为 `start..count` 位置参数的别名。
pub fn build_dummy_parameters(count: usize, start: usize) -> NameOrderMap {
    (start..count)
        .map(|i| (format!("${}", i - start + 1), i))
        .collect()
}
