//! SqlValuer：能把自身序列化成单个驱动值的参数类型。
//!
//! 实现了该 trait 的参数在模板编译时总是被当作标量，即使它内部是一个集合；
//! 真正的值在绑定参数时才计算。

use crate::value::SqlValue;

/// Valuer 错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sql valuer error: {0}")]
pub struct ValuerError(pub String);

/// 可在调用时动态计算实际值的参数。
pub trait SqlValuer: dyn_clone::DynClone + std::fmt::Debug + Send + Sync {
    fn value(&self) -> Result<SqlValue, ValuerError>;
}

dyn_clone::clone_trait_object!(SqlValuer);

#[cfg(test)]
mod tests {
    use super::{SqlValuer, ValuerError};
    use crate::value::SqlValue;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Tags(Vec<&'static str>);

    impl SqlValuer for Tags {
        fn value(&self) -> Result<SqlValue, ValuerError> {
            if self.0.is_empty() {
                return Err(ValuerError("no tags".into()));
            }
            Ok(SqlValue::from(self.0.join(",")))
        }
    }

    #[test]
    fn boxed_valuer_clones_and_evaluates() {
        let v: Box<dyn SqlValuer> = Box::new(Tags(vec!["a", "b"]));
        let cloned = v.clone();
        assert_eq!(cloned.value(), Ok(SqlValue::from("a,b")));
        let empty: Box<dyn SqlValuer> = Box::new(Tags(vec![]));
        assert_eq!(
            empty.value().map_err(|e| e.to_string()),
            Err("sql valuer error: no tags".to_string())
        );
    }
}
