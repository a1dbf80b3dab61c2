//! SQL Flavor（方言）：决定位置占位符的写法。

use std::fmt;
use std::sync::{Arc, OnceLock};

/// 占位符渲染函数：输入从 1 开始的位置，返回该方言的占位符文本。
#[derive(Clone)]
pub struct ParamAdapter(Arc<dyn Fn(usize) -> String + Send + Sync + 'static>);

impl ParamAdapter {
    pub fn new(f: impl Fn(usize) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn render(&self, pos: usize) -> String {
        (self.0)(pos)
    }
}

impl fmt::Debug for ParamAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamAdapter(..)")
    }
}

/// 同一个渲染函数实例才相等。
impl PartialEq for ParamAdapter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// 内置方言。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    MySQL,
    SQLite,
    PostgreSQL,
    Oracle,
    SQLServer,
}

static MYSQL: OnceLock<ParamAdapter> = OnceLock::new();
static SQLITE: OnceLock<ParamAdapter> = OnceLock::new();
static POSTGRES: OnceLock<ParamAdapter> = OnceLock::new();
static ORACLE: OnceLock<ParamAdapter> = OnceLock::new();
static SQLSERVER: OnceLock<ParamAdapter> = OnceLock::new();

impl Flavor {
    /// 该方言的占位符渲染函数（进程内缓存，多次调用返回同一实例）。
    pub fn adapter(self) -> ParamAdapter {
        let cell = match self {
            Self::MySQL => &MYSQL,
            Self::SQLite => &SQLITE,
            Self::PostgreSQL => &POSTGRES,
            Self::Oracle => &ORACLE,
            Self::SQLServer => &SQLSERVER,
        };
        cell.get_or_init(|| match self {
            Self::MySQL | Self::SQLite => ParamAdapter::new(|_| "?".to_string()),
            Self::PostgreSQL => ParamAdapter::new(|pos| format!("${pos}")),
            Self::Oracle => ParamAdapter::new(|pos| format!(":{pos}")),
            Self::SQLServer => ParamAdapter::new(|pos| format!("@p{pos}")),
        })
        .clone()
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
            Self::PostgreSQL => "PostgreSQL",
            Self::Oracle => "Oracle",
            Self::SQLServer => "SQLServer",
        };
        f.write_str(s)
    }
}

/// MySQL：总是 `?`。
pub fn mysql() -> ParamAdapter {
    Flavor::MySQL.adapter()
}

/// SQLite：总是 `?`。
pub fn sqlite() -> ParamAdapter {
    Flavor::SQLite.adapter()
}

/// PostgreSQL：`$N`。
pub fn postgres() -> ParamAdapter {
    Flavor::PostgreSQL.adapter()
}

/// Oracle：`:N`。
pub fn oracle() -> ParamAdapter {
    Flavor::Oracle.adapter()
}
