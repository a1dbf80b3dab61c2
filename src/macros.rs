//! 宏集合：动态调用的参数表。

/// 构造动态调用使用的 `BTreeMap<String, Param>`。
///
/// ```ignore
/// let params = params! { "id" => 10_i64, "names" => vec!["a", "b"] };
/// binder.query::<Vec<Product>>(&ctx, &db, "select * from Product where id = :id:", &params)?;
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::collections::BTreeMap::<String, $crate::param::Param>::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = ::std::collections::BTreeMap::<String, $crate::param::Param>::new();
        $(
            params.insert(
                ::std::string::ToString::to_string($name),
                $crate::param::ToParam::to_param(&$value),
            );
        )+
        params
    }};
}
