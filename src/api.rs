//! 外部协作方接口：执行器、查询器、结果集与命名查询表。
//!
//! 本库自身不做任何 I/O；驱动适配层实现这些 trait，绑定出的函数通过它们发起调用。

use crate::context::Context;
use crate::value::SqlValue;
use std::collections::{BTreeMap, HashMap};

/// 外部执行器/查询器返回的错误，原样透传给调用方。
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 写操作的结果句柄。
pub trait ExecResult {
    fn rows_affected(&self) -> Result<i64, DriverError>;

    fn last_insert_id(&self) -> Result<i64, DriverError>;
}

/// 逐行读取的结果集游标。
pub trait Rows {
    /// 前进到下一行；没有更多行（或出错）时返回 false。
    fn next_row(&mut self) -> bool;

    /// 迭代过程中遇到的错误。
    fn err(&mut self) -> Option<DriverError>;

    fn columns(&self) -> Result<Vec<String>, DriverError>;

    /// 把当前行的值写入 `dest`，长度与列数一致。
    fn scan(&mut self, dest: &mut [SqlValue]) -> Result<(), DriverError>;

    /// 关闭游标；重复调用无副作用。
    fn close(&mut self) -> Result<(), DriverError>;
}

/// 执行写操作的能力。
pub trait Executor {
    fn exec(&self, query: &str, args: &[SqlValue]) -> Result<Box<dyn ExecResult>, DriverError>;
}

/// 执行读操作的能力。
pub trait Querier {
    fn query(&self, query: &str, args: &[SqlValue]) -> Result<Box<dyn Rows + '_>, DriverError>;
}

/// 带上下文的写操作能力。
pub trait ContextExecutor {
    fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[SqlValue],
    ) -> Result<Box<dyn ExecResult>, DriverError>;
}

/// 带上下文的读操作能力。
pub trait ContextQuerier {
    fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[SqlValue],
    ) -> Result<Box<dyn Rows + '_>, DriverError>;
}

/// 命名查询表：`q:name` 形式的查询通过它解析；返回 `None` 或空串表示未找到。
pub trait QueryMapper: Send + Sync {
    fn map(&self, name: &str) -> Option<String>;
}

impl<S: std::hash::BuildHasher + Send + Sync> QueryMapper for HashMap<String, String, S> {
    fn map(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl QueryMapper for BTreeMap<String, String> {
    fn map(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// 仅记录行数的结果句柄；无结果可返回时使用。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticResult {
    pub rows_affected: i64,
    pub last_insert_id: i64,
}

impl ExecResult for StaticResult {
    fn rows_affected(&self) -> Result<i64, DriverError> {
        Ok(self.rows_affected)
    }

    fn last_insert_id(&self) -> Result<i64, DriverError> {
        Ok(self.last_insert_id)
    }
}
