//! 批量执行：把多次写操作合并为一条语句，一次发给执行器。

use crate::api::{DriverError, ExecResult, Executor, StaticResult};
use crate::error::Error;
use crate::value::SqlValue;
use std::cell::RefCell;

/// 收集语句与参数，不做任何 I/O。
#[derive(Debug, Default)]
struct Collector {
    query: RefCell<String>,
    args: RefCell<Vec<SqlValue>>,
}

impl Executor for Collector {
    fn exec(&self, query: &str, args: &[SqlValue]) -> Result<Box<dyn ExecResult>, DriverError> {
        let mut buf = self.query.borrow_mut();
        buf.push_str(query);
        buf.push(';');
        self.args.borrow_mut().extend_from_slice(args);
        Ok(Box::new(StaticResult::default()))
    }
}

/// 在收集器上运行 `f`，再把收集到的语句（各以 `;` 结尾）一次性交给 `exec` 执行。
///
/// `f` 返回错误时不执行任何语句。返回影响的行数。
pub fn batch<F>(exec: &dyn Executor, f: F) -> Result<i64, Error>
where
    F: FnOnce(&dyn Executor) -> Result<(), Error>,
{
    let collector = Collector::default();
    f(&collector)?;
    let query = collector.query.into_inner();
    let args = collector.args.into_inner();
    tracing::debug!(sql = %query, args = ?args, "batch.flush");
    exec.exec(&query, &args)
        .map_err(Error::Driver)?
        .rows_affected()
        .map_err(Error::Driver)
}
