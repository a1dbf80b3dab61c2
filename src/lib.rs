//! halo-proteus：把带命名占位符的 SQL 模板绑定为类型化的函数。

pub mod api;
pub mod batch;
pub mod binder;
#[cfg(test)]
mod binder_tests;
pub mod context;
pub mod error;
pub mod extract;
pub mod flavor;
pub mod func;
pub mod ident;
pub mod macros;
pub mod mapper;
pub mod param;
mod runtime;
pub mod scan;
pub mod signature;
mod string_builder;
pub mod template;
#[cfg(test)]
mod template_tests;
#[cfg(test)]
mod testing;
pub mod value;
pub mod valuer;

pub use crate::api::{
    ContextExecutor, ContextQuerier, DriverError, ExecResult, Executor, Querier, QueryMapper,
    Rows, StaticResult,
};
pub use crate::batch::batch;
pub use crate::binder::{Binder, Dao, build};
pub use crate::context::Context;
pub use crate::error::{BindError, BindErrors, Error};
pub use crate::extract::ExtractError;
pub use crate::flavor::{Flavor, ParamAdapter, mysql, oracle, postgres, sqlite};
pub use crate::func::{Ctx, Exec, Func, Query};
pub use crate::ident::{IdentError, validate_identifier};
pub use crate::mapper::{MapError, Mapped, RowStruct};
pub use crate::param::{Param, ParamType, ToParam};
pub use crate::scan::{FieldValue, FromValue, ScanError};
pub use crate::signature::{Convention, Signature, SignatureError};
pub use crate::template::TemplateError;
pub use crate::value::SqlValue;
pub use crate::valuer::{SqlValuer, ValuerError};

/// 便捷命名空间：允许 `use halo_proteus::proteus::{...}` 形式导入。
pub mod proteus {
    pub use crate::*;
}
