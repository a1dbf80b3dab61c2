//! 绑定函数的运行时：解析实参、渲染查询、调用执行器并映射结果。

use crate::api::{ExecResult, Rows};
use crate::error::Error;
use crate::func::{BoundFn, Conn, Returns};
use crate::mapper::{Mapped, RowBuilder, handle_mapping};
use crate::param::Param;
use crate::signature::{Convention, OutputType};
use crate::template::{BoundQuery, ParamInfo, QueryTemplate};
use std::sync::Arc;
use tracing::Dispatch;

fn bound_fn<V, F>(f: F) -> BoundFn<V>
where
    F: for<'a> Fn(Conn<'a>, Vec<Param>) -> Result<Option<V>, Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 返回形状是否需要构造值（而不仅是错误）。
fn wants_value<R: Returns>() -> bool {
    matches!(R::output_types().first(), Some(t) if *t != OutputType::Error)
}

/// 为已编译的查询生成函数实现。
///
/// 行构造器在这里一次性准备好；返回类型无法映射时绑定直接失败。
pub(crate) fn implement<R: Returns>(
    convention: Convention,
    template: QueryTemplate,
    plan: Vec<ParamInfo>,
    dispatch: Dispatch,
) -> Result<BoundFn<R::Value>, Error> {
    let wants = wants_value::<R>();
    let builder = if wants && !convention.is_exec() {
        Some(<R::Value as Mapped>::make_builder()?)
    } else {
        None
    };
    let offset = convention.start();

    Ok(bound_fn(move |conn: Conn<'_>, args: Vec<Param>| {
        tracing::dispatcher::with_default(&dispatch, || -> Result<Option<R::Value>, Error> {
            let bound = template.bind(&plan, &args, offset)?;
            tracing::debug!(
                convention = %convention,
                sql = %bound.sql,
                args = ?bound.args,
                "query.bound"
            );
            match (conn, convention) {
                (Conn::Exec(exec), Convention::Exec) => {
                    let res = exec.exec(&bound.sql, &bound.args).map_err(Error::Driver)?;
                    finish_exec::<R::Value>(res, wants)
                }
                (Conn::ContextExec(ctx, exec), Convention::ContextExec) => {
                    let res = exec
                        .exec_context(ctx, &bound.sql, &bound.args)
                        .map_err(Error::Driver)?;
                    finish_exec::<R::Value>(res, wants)
                }
                (Conn::Query(query), Convention::Query) => {
                    let rows = query.query(&bound.sql, &bound.args).map_err(Error::Driver)?;
                    finish_query::<R::Value>(rows, builder.as_ref())
                }
                (Conn::ContextQuery(ctx, query), Convention::ContextQuery) => {
                    let rows = query
                        .query_context(ctx, &bound.sql, &bound.args)
                        .map_err(Error::Driver)?;
                    finish_query::<R::Value>(rows, builder.as_ref())
                }
                _ => Err(Error::ConnectionMismatch(convention)),
            }
        })
    }))
}

fn finish_exec<V: Mapped>(res: Box<dyn ExecResult>, wants: bool) -> Result<Option<V>, Error> {
    if !wants {
        return Ok(None);
    }
    V::from_exec(res).map(Some)
}

fn finish_query<V: Mapped>(
    mut rows: Box<dyn Rows + '_>,
    builder: Option<&RowBuilder<V::Row>>,
) -> Result<Option<V>, Error> {
    match builder {
        Some(builder) => handle_mapping::<V>(rows, builder).map(Some),
        None => {
            close_rows(rows.as_mut());
            Ok(None)
        }
    }
}

pub(crate) fn close_rows(rows: &mut (dyn Rows + '_)) {
    if let Err(err) = rows.close() {
        tracing::warn!(error = %err, "rows.close_failed");
    }
}

/// 记录一次动态调用绑定出的查询。
pub(crate) fn trace_bound(bound: &BoundQuery) {
    tracing::debug!(sql = %bound.sql, args = ?bound.args, "query.bound");
}
