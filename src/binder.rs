//! 绑定器：把查询模板编译为函数实现并安装到 DAO 的函数槽中。
//!
//! 构建按层进行：同一层（一个 DAO 结构体）的所有字段先全部编译，
//! 收集所有错误；只有整层没有错误时才统一安装。嵌入的 DAO 单独成一层，
//! 其错误并入外层。
//!
//! 另外提供不需要声明函数的动态调用：[`Binder::exec`]、[`Binder::exec_result`]、
//! [`Binder::query`]，参数以名称 -> 值的 map 传入。

use crate::api::{ContextExecutor, ContextQuerier, ExecResult, QueryMapper};
use crate::context::Context;
use crate::error::{BindErrors, Error};
use crate::flavor::ParamAdapter;
use crate::func::{Bindable, Func, Staged};
use crate::mapper::{Mapped, handle_mapping};
use crate::param::Param;
use crate::runtime::{implement, trace_bound};
use crate::signature::validate;
use crate::template::{
    BoundQuery, NameOrderMap, RuntimeTypes, build_dummy_parameters, build_name_order_map,
    build_names_map, compile,
};
use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::Dispatch;

/// 命名查询的前缀：`q:name` 通过 [`QueryMapper`] 解析。
pub const NAMED_QUERY_PREFIX: &str = "q:";

/// 可以由 [`Binder`] 构建的 DAO；通常由 `dao!` 实现。
pub trait Dao {
    /// 构建本层的全部函数槽；有任何错误时不安装任何实现。
    fn build_level(&mut self, binder: &Binder) -> Result<(), BindErrors>;
}

enum Names<'a> {
    Csv(&'a str),
    List(&'a [&'a str]),
}

/// 查询绑定器。
#[derive(Clone)]
pub struct Binder {
    adapter: ParamAdapter,
    mappers: Vec<Arc<dyn QueryMapper>>,
    dispatch: Dispatch,
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("adapter", &self.adapter)
            .field("mappers", &self.mappers.len())
            .finish()
    }
}

impl Binder {
    pub fn new(adapter: ParamAdapter) -> Self {
        Self {
            adapter,
            mappers: Vec::new(),
            dispatch: Dispatch::none(),
        }
    }

    /// 追加一个命名查询表；多个表按添加顺序查找。
    pub fn with_mapper(mut self, mapper: impl QueryMapper + 'static) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    pub fn with_mappers(mut self, mappers: impl IntoIterator<Item = Arc<dyn QueryMapper>>) -> Self {
        self.mappers.extend(mappers);
        self
    }

    /// 日志输出目标；默认不输出。
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn adapter(&self) -> &ParamAdapter {
        &self.adapter
    }

    /// 解析 `q:name` 形式的命名查询；其他查询原样返回。
    pub fn lookup_query(&self, query: &str) -> Result<String, Error> {
        let Some(name) = query.strip_prefix(NAMED_QUERY_PREFIX) else {
            return Ok(query.to_string());
        };
        self.mappers
            .iter()
            .filter_map(|m| m.map(name))
            .find(|q| !q.is_empty())
            .ok_or_else(|| Error::QueryNotFound(name.to_string()))
    }

    fn stage<S: Bindable>(&self, query: &str, names: Names<'_>) -> Result<Staged<S>, Error> {
        tracing::dispatcher::with_default(&self.dispatch, || -> Result<Staged<S>, Error> {
            let sig = S::signature();
            let convention = validate(&sig)?;
            let query = self.lookup_query(query)?;
            let count = sig.inputs.len();
            let start = convention.start();
            let name_map: NameOrderMap = match names {
                Names::Csv(csv) if csv.trim().is_empty() => build_dummy_parameters(count, start),
                Names::Csv(csv) => build_name_order_map(csv, start),
                Names::List([]) => build_dummy_parameters(count, start),
                Names::List(list) => build_names_map(list.iter().copied(), start),
            };
            let (template, plan) = compile(&query, &name_map, &sig, &self.adapter)?;
            let imp = implement::<S::Ret>(convention, template, plan, self.dispatch.clone())?;
            Ok(Staged::new(imp))
        })
    }

    /// 编译一个函数槽的实现，但不安装。`params` 为逗号分隔的参数名，空串表示使用 `$1..$N`。
    pub fn stage_slot<S: Bindable>(
        &self,
        _slot: &Func<S>,
        query: &str,
        params: &str,
    ) -> Result<Staged<S>, Error> {
        self.stage(query, Names::Csv(params))
    }

    /// 构建嵌入的 DAO：在新实例上构建，成功后由外层整体替换。
    pub fn stage_embedded<T: Dao + Default>(&self, _current: &T) -> Result<T, BindErrors> {
        let mut fresh = T::default();
        fresh.build_level(self)?;
        Ok(fresh)
    }

    /// 为单个函数槽绑定查询；`names` 为空时使用 `$1..$N`。
    pub fn build_function<S: Bindable>(
        &self,
        slot: &mut Func<S>,
        query: &str,
        names: &[&str],
    ) -> Result<(), Error> {
        self.stage(query, Names::List(names))?.install(slot);
        Ok(())
    }

    /// 构建整个 DAO；任何字段失败时返回全部错误，且不安装任何实现。
    pub fn build<D: Dao>(&self, dao: &mut D) -> Result<(), Error> {
        let result = dao.build_level(self);
        tracing::dispatcher::with_default(&self.dispatch, || match result {
            Ok(()) => {
                tracing::debug!(dao = type_name::<D>(), "dao.built");
                Ok(())
            }
            Err(errors) => {
                for err in &errors {
                    tracing::warn!(
                        dao = type_name::<D>(),
                        field = err.field,
                        ordinal = err.ordinal,
                        error = %err.source,
                        "dao.field_skipped"
                    );
                }
                Err(Error::Bind(errors))
            }
        })
    }

    fn bind_dynamic(&self, query: &str, params: &BTreeMap<String, Param>) -> Result<BoundQuery, Error> {
        let query = self.lookup_query(query)?;
        let names = build_names_map(params.keys().map(String::as_str), 0);
        let args: Vec<Param> = params.values().cloned().collect();
        let (template, plan) = compile(&query, &names, &RuntimeTypes::new(&args), &self.adapter)?;
        let bound = template.bind(&plan, &args, 0)?;
        trace_bound(&bound);
        Ok(bound)
    }

    /// 动态执行写操作，返回影响的行数。
    pub fn exec(
        &self,
        ctx: &Context,
        exec: &dyn ContextExecutor,
        query: &str,
        params: &BTreeMap<String, Param>,
    ) -> Result<i64, Error> {
        self.exec_result(ctx, exec, query, params)?
            .rows_affected()
            .map_err(Error::Driver)
    }

    /// 动态执行写操作，返回结果句柄。
    pub fn exec_result(
        &self,
        ctx: &Context,
        exec: &dyn ContextExecutor,
        query: &str,
        params: &BTreeMap<String, Param>,
    ) -> Result<Box<dyn ExecResult>, Error> {
        tracing::dispatcher::with_default(&self.dispatch, || -> Result<Box<dyn ExecResult>, Error> {
            let bound = self.bind_dynamic(query, params)?;
            exec.exec_context(ctx, &bound.sql, &bound.args)
                .map_err(Error::Driver)
        })
    }

    /// 动态执行读操作，结果映射为 `T`。
    pub fn query<T: Mapped>(
        &self,
        ctx: &Context,
        query: &dyn ContextQuerier,
        sql: &str,
        params: &BTreeMap<String, Param>,
    ) -> Result<T, Error> {
        tracing::dispatcher::with_default(&self.dispatch, || -> Result<T, Error> {
            let builder = T::make_builder()?;
            let bound = self.bind_dynamic(sql, params)?;
            let rows = query
                .query_context(ctx, &bound.sql, &bound.args)
                .map_err(Error::Driver)?;
            handle_mapping::<T>(rows, &builder)
        })
    }
}

/// 用给定的方言与命名查询表构建 DAO。
pub fn build<D: Dao>(
    dao: &mut D,
    adapter: ParamAdapter,
    mappers: impl IntoIterator<Item = Arc<dyn QueryMapper>>,
) -> Result<(), Error> {
    Binder::new(adapter).with_mappers(mappers).build(dao)
}

/// 为 DAO 结构体实现 [`Dao`]。
///
/// ```ignore
/// dao! {
///     impl ProductDao {
///         find_by_id: { query: "select * from Product where id = :id:", params: "id" },
///         insert: { query: "q:insert_product", params: "p" },
///         count: { query: "select count(*) from Product" },
///         base: { embed },
///     }
/// }
/// ```
///
/// 省略 `params` 时参数以 `$1..$N` 引用。字段序号从 0 开始，按声明顺序计数。
#[macro_export]
macro_rules! dao {
    (
        impl $ty:ty {
            $($field:ident : { $($spec:tt)* }),* $(,)?
        }
    ) => {
        impl $crate::binder::Dao for $ty {
            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn build_level(
                &mut self,
                binder: &$crate::binder::Binder,
            ) -> Result<(), $crate::error::BindErrors> {
                let mut errors = $crate::error::BindErrors::default();
                let mut installs: Vec<Box<dyn FnOnce(&mut $ty)>> = Vec::new();
                let mut ordinal = 0usize;
                $(
                    $crate::__dao_field!(
                        $ty, self, $field, binder, errors, installs, ordinal; $($spec)*
                    );
                    ordinal += 1;
                )*
                if !errors.is_empty() {
                    return Err(errors);
                }
                for install in installs {
                    install(self);
                }
                Ok(())
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __dao_field {
    ($ty:ty, $this:ident, $field:ident, $binder:ident, $errors:ident, $installs:ident, $ordinal:ident;
        query: $query:expr, params: $params:expr $(,)?) => {
        match $binder.stage_slot(&$this.$field, $query, $params) {
            Ok(staged) => $installs.push(Box::new(move |d: &mut $ty| staged.install(&mut d.$field))),
            Err(err) => $errors.push($crate::error::BindError::new(stringify!($field), $ordinal, err)),
        }
    };
    ($ty:ty, $this:ident, $field:ident, $binder:ident, $errors:ident, $installs:ident, $ordinal:ident;
        query: $query:expr $(,)?) => {
        $crate::__dao_field!($ty, $this, $field, $binder, $errors, $installs, $ordinal;
            query: $query, params: "")
    };
    ($ty:ty, $this:ident, $field:ident, $binder:ident, $errors:ident, $installs:ident, $ordinal:ident;
        embed) => {
        match $binder.stage_embedded(&$this.$field) {
            Ok(built) => $installs.push(Box::new(move |d: &mut $ty| d.$field = built)),
            Err(errs) => $errors.append(errs),
        }
    };
}
