//! 测试用的内存执行器：记录每次调用，回放预设的结果行。

use crate::api::{
    ContextExecutor, ContextQuerier, DriverError, ExecResult, Executor, Querier, Rows,
    StaticResult,
};
use crate::context::Context;
use crate::value::SqlValue;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Default)]
pub(crate) struct MockDb {
    calls: RefCell<Vec<(String, Vec<SqlValue>)>>,
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    result: StaticResult,
    exec_error: Option<String>,
    query_error: Option<String>,
    row_error: Option<String>,
    closed: Rc<Cell<usize>>,
}

impl MockDb {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub(crate) fn with_row(mut self, row: Vec<SqlValue>) -> Self {
        self.rows.push(row);
        self
    }

    pub(crate) fn with_rows_affected(mut self, n: i64) -> Self {
        self.result.rows_affected = n;
        self
    }

    pub(crate) fn with_last_insert_id(mut self, id: i64) -> Self {
        self.result.last_insert_id = id;
        self
    }

    pub(crate) fn with_exec_error(mut self, msg: &str) -> Self {
        self.exec_error = Some(msg.to_string());
        self
    }

    pub(crate) fn with_query_error(mut self, msg: &str) -> Self {
        self.query_error = Some(msg.to_string());
        self
    }

    /// 所有行读完后报告的迭代错误。
    pub(crate) fn with_row_error(mut self, msg: &str) -> Self {
        self.row_error = Some(msg.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.calls.borrow().clone()
    }

    pub(crate) fn last_call(&self) -> Option<(String, Vec<SqlValue>)> {
        self.calls.borrow().last().cloned()
    }

    /// 已关闭的结果集个数。
    pub(crate) fn closed(&self) -> usize {
        self.closed.get()
    }

    fn record(&self, query: &str, args: &[SqlValue]) {
        self.calls
            .borrow_mut()
            .push((query.to_string(), args.to_vec()));
    }

    fn do_exec(&self, query: &str, args: &[SqlValue]) -> Result<Box<dyn ExecResult>, DriverError> {
        self.record(query, args);
        match &self.exec_error {
            Some(msg) => Err(msg.clone().into()),
            None => Ok(Box::new(self.result)),
        }
    }

    fn do_query(&self, query: &str, args: &[SqlValue]) -> Result<Box<dyn Rows + '_>, DriverError> {
        self.record(query, args);
        if let Some(msg) = &self.query_error {
            return Err(msg.clone().into());
        }
        Ok(Box::new(MockRows {
            columns: self.columns.clone(),
            pending: self.rows.iter().cloned().collect(),
            current: None,
            error: self.row_error.clone(),
            closed: false,
            close_count: Rc::clone(&self.closed),
        }))
    }
}

impl Executor for MockDb {
    fn exec(&self, query: &str, args: &[SqlValue]) -> Result<Box<dyn ExecResult>, DriverError> {
        self.do_exec(query, args)
    }
}

impl Querier for MockDb {
    fn query(&self, query: &str, args: &[SqlValue]) -> Result<Box<dyn Rows + '_>, DriverError> {
        self.do_query(query, args)
    }
}

impl ContextExecutor for MockDb {
    fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[SqlValue],
    ) -> Result<Box<dyn ExecResult>, DriverError> {
        if ctx.is_done() {
            return Err("context canceled".into());
        }
        self.do_exec(query, args)
    }
}

impl ContextQuerier for MockDb {
    fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[SqlValue],
    ) -> Result<Box<dyn Rows + '_>, DriverError> {
        if ctx.is_done() {
            return Err("context canceled".into());
        }
        self.do_query(query, args)
    }
}

#[derive(Debug)]
struct MockRows {
    columns: Vec<String>,
    pending: VecDeque<Vec<SqlValue>>,
    current: Option<Vec<SqlValue>>,
    error: Option<String>,
    closed: bool,
    close_count: Rc<Cell<usize>>,
}

impl Rows for MockRows {
    fn next_row(&mut self) -> bool {
        self.current = self.pending.pop_front();
        self.current.is_some()
    }

    fn err(&mut self) -> Option<DriverError> {
        self.error.take().map(Into::into)
    }

    fn columns(&self) -> Result<Vec<String>, DriverError> {
        Ok(self.columns.clone())
    }

    fn scan(&mut self, dest: &mut [SqlValue]) -> Result<(), DriverError> {
        let row = self.current.as_ref().ok_or("scan called without a current row")?;
        if row.len() != dest.len() {
            return Err(format!("expected {} values, got {}", dest.len(), row.len()).into());
        }
        dest.clone_from_slice(row);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            self.closed = true;
            self.close_count.set(self.close_count.get() + 1);
        }
        Ok(())
    }
}
