//! 错误类型汇总。

use crate::api::DriverError;
use crate::mapper::MapError;
use crate::signature::{Convention, SignatureError};
use crate::template::TemplateError;

/// 本库对外的错误类型。
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("no query found for name {0}")]
    QueryNotFound(String),
    #[error("function has not been bound")]
    Unbound,
    #[error("connection does not match the {0} calling convention")]
    ConnectionMismatch(Convention),
    /// 外部执行器/查询器返回的错误，原样透传。
    #[error("{0}")]
    Driver(#[source] DriverError),
    #[error(transparent)]
    Bind(#[from] BindErrors),
}

/// 构建 DAO 时单个字段的失败。
#[derive(Debug, thiserror::Error)]
#[error("error in field #{ordinal} ({field}): {source}")]
pub struct BindError {
    pub field: &'static str,
    pub ordinal: usize,
    pub source: Box<Error>,
}

impl BindError {
    pub fn new(field: &'static str, ordinal: usize, source: impl Into<Error>) -> Self {
        Self {
            field,
            ordinal,
            source: Box::new(source.into()),
        }
    }
}

fn join_errors(errors: &[BindError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 一次构建中收集到的全部字段错误。
#[derive(Debug, Default, thiserror::Error)]
#[error("{}", join_errors(.0))]
pub struct BindErrors(Vec<BindError>);

impl BindErrors {
    pub fn push(&mut self, err: BindError) {
        self.0.push(err);
    }

    /// 合并嵌入结构体的错误。
    pub fn append(&mut self, mut other: BindErrors) {
        self.0.append(&mut other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BindError> {
        self.0.iter()
    }

    /// 出错的字段名，按发生顺序。
    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }

    pub fn into_vec(self) -> Vec<BindError> {
        self.0
    }
}

impl<'a> IntoIterator for &'a BindErrors {
    type Item = &'a BindError;
    type IntoIter = std::slice::Iter<'a, BindError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
