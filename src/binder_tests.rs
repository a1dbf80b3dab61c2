#[cfg(test)]
mod tests {
    use crate::api::ExecResult;
    use crate::binder::{Binder, build};
    use crate::context::Context;
    use crate::error::Error;
    use crate::flavor::{mysql, postgres};
    use crate::func::{Ctx, Exec, Func, Query};
    use crate::signature::SignatureError;
    use crate::template::TemplateError;
    use crate::testing::MockDb;
    use crate::value::SqlValue;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Product {
        id: i64,
        name: String,
        cost: Option<f64>,
    }

    crate::row_struct! {
        impl Product {
            id: { column: "id", key },
            name: { column: "name" },
            cost: { column: "cost" },
        }
    }

    #[derive(Debug, Clone)]
    struct NewProduct {
        name: String,
        cost: f64,
    }

    crate::param_struct! {
        impl NewProduct {
            name,
            cost,
        }
    }

    #[derive(Debug, Default)]
    struct Base {
        count: Func<fn(Query) -> Result<i64, Error>>,
    }

    crate::dao! {
        impl Base {
            count: { query: "select count(*) from Product" },
        }
    }

    #[derive(Debug, Default)]
    struct ProductDao {
        find_by_id: Func<fn(Query, i64) -> Result<Option<Product>, Error>>,
        find_by_ids: Func<fn(Query, Vec<i64>) -> Result<Vec<Product>, Error>>,
        insert: Func<fn(Exec, NewProduct) -> Result<i64, Error>>,
        insert_result: Func<fn(Exec, String, f64) -> Result<Box<dyn ExecResult>, Error>>,
        touch: Func<fn(Exec, i64)>,
        find_ctx: Func<fn(Ctx, Query, String) -> Result<Vec<Product>, Error>>,
        delete_ctx: Func<fn(Ctx, Exec, i64) -> i64>,
        base: Base,
    }

    crate::dao! {
        impl ProductDao {
            find_by_id: { query: "select * from Product where id = :id:", params: "id" },
            find_by_ids: { query: "select * from Product where id in (:ids:)", params: "ids" },
            insert: { query: "q:insert", params: "p" },
            insert_result: { query: "insert into Product (name, cost) values (:$1:, :$2:)" },
            touch: { query: "update Product set touched = 1 where id = :id:", params: "id" },
            find_ctx: { query: "select * from Product where name = :name:", params: "name" },
            delete_ctx: { query: "delete from Product where id = :id:", params: "id" },
            base: { embed },
        }
    }

    fn queries() -> HashMap<String, String> {
        HashMap::from([(
            "insert".to_string(),
            "insert into Product (name, cost) values (:p.name:, :p.cost:)".to_string(),
        )])
    }

    fn built(adapter: crate::flavor::ParamAdapter) -> ProductDao {
        let mut dao = ProductDao::default();
        Binder::new(adapter)
            .with_mapper(queries())
            .build(&mut dao)
            .unwrap();
        dao
    }

    fn product_rows() -> MockDb {
        MockDb::new()
            .with_columns(&["id", "name", "cost"])
            .with_row(vec![SqlValue::I64(1), SqlValue::from("a"), SqlValue::F64(1.5)])
            .with_row(vec![SqlValue::I64(3), SqlValue::from("c"), SqlValue::Null])
    }

    #[test]
    fn querier_functions_map_rows() {
        let dao = built(postgres());
        let db = product_rows();

        let got = dao.find_by_id.call(&db, 1).unwrap();
        assert_eq!(got.map(|p| p.name), Some("a".to_string()));
        assert_eq!(
            db.last_call(),
            Some((
                "select * from Product where id = $1".to_string(),
                vec![SqlValue::I64(1)]
            ))
        );

        let all = dao.find_by_ids.call(&db, vec![1, 3]).unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(all[1].cost, None);
        assert_eq!(
            db.last_call(),
            Some((
                "select * from Product where id in ($1, $2)".to_string(),
                vec![SqlValue::I64(1), SqlValue::I64(3)]
            ))
        );
        assert_eq!(db.closed(), 2);
    }

    #[test]
    fn executor_functions_report_rows_affected() {
        let dao = built(mysql());
        let db = MockDb::new().with_rows_affected(1).with_last_insert_id(42);

        let n = dao
            .insert
            .call(
                &db,
                NewProduct {
                    name: "pen".into(),
                    cost: 0.5,
                },
            )
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(
            db.last_call(),
            Some((
                "insert into Product (name, cost) values (?, ?)".to_string(),
                vec![SqlValue::from("pen"), SqlValue::F64(0.5)]
            ))
        );

        let res = dao.insert_result.call(&db, "ink".to_string(), 2.0).unwrap();
        assert_eq!(res.last_insert_id().unwrap(), 42);

        dao.touch.call(&db, 9);
        assert_eq!(
            db.last_call().map(|c| c.0),
            Some("update Product set touched = 1 where id = ?".to_string())
        );
    }

    #[test]
    fn context_functions_forward_the_context() {
        let dao = built(postgres());
        let db = product_rows().with_rows_affected(2);
        let ctx = Context::background().with_timeout(Duration::from_secs(30));

        let found = dao.find_ctx.call(&ctx, &db, "a".to_string()).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(dao.delete_ctx.call(&ctx, &db, 5), 2);

        ctx.cancel();
        let err = dao.find_ctx.call(&ctx, &db, "a".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "context canceled");
        assert_eq!(dao.delete_ctx.call(&ctx, &db, 5), 0);
    }

    #[test]
    fn embedded_dao_is_built() {
        let dao = built(mysql());
        let db = MockDb::new()
            .with_columns(&["count(*)"])
            .with_row(vec![SqlValue::I64(7)]);
        assert_eq!(dao.base.count.call(&db).unwrap(), 7);
    }

    #[test]
    fn driver_errors_pass_through() {
        let dao = built(mysql());
        let db = MockDb::new().with_exec_error("duplicate key");
        let err = dao
            .insert_result
            .call(&db, "x".to_string(), 1.0)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Driver(_)));
        assert_eq!(err.to_string(), "duplicate key");
    }

    #[test]
    fn unbound_functions_do_not_panic() {
        let dao = ProductDao::default();
        let db = MockDb::new();
        assert!(!dao.find_by_id.is_bound());
        assert!(matches!(dao.find_by_id.call(&db, 1), Err(Error::Unbound)));
        assert_eq!(dao.delete_ctx.call(&Context::background(), &db, 1), 0);
        dao.touch.call(&db, 1);
        assert!(db.calls().is_empty());
    }

    #[derive(Debug, Default)]
    struct Broken {
        good: Func<fn(Query, i64) -> Result<i64, Error>>,
        bad_name: Func<fn(Query, i64) -> Result<i64, Error>>,
        no_conn: Func<fn(i64) -> Result<i64, Error>>,
        missing: Func<fn(Exec) -> Result<i64, Error>>,
        base: Base,
    }

    crate::dao! {
        impl Broken {
            good: { query: "select :id:", params: "id" },
            bad_name: { query: "select :nope:", params: "id" },
            no_conn: { query: "select :id:", params: "id" },
            missing: { query: "q:does_not_exist" },
            base: { embed },
        }
    }

    #[test]
    fn build_failure_installs_nothing_and_reports_every_field() {
        let mut dao = Broken::default();
        let err = build(&mut dao, mysql(), Vec::new()).unwrap_err();
        let Error::Bind(errors) = err else {
            panic!("expected bind errors");
        };
        assert_eq!(errors.fields(), vec!["bad_name", "no_conn", "missing"]);
        let ordinals: Vec<usize> = errors.iter().map(|e| e.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert!(matches!(
            *errors.iter().next().unwrap().source,
            Error::Template(TemplateError::ParameterNotFound(ref n)) if n == "nope"
        ));
        assert!(matches!(
            *errors.iter().nth(1).unwrap().source,
            Error::Signature(SignatureError::InvalidLeadingParameter)
        ));
        assert_eq!(
            errors.iter().nth(2).unwrap().to_string(),
            "error in field #3 (missing): no query found for name does_not_exist"
        );

        assert!(!dao.good.is_bound());
        assert!(!dao.base.count.is_bound());
    }

    #[derive(Debug, Default)]
    struct Outer {
        ok: Func<fn(Query) -> Result<i64, Error>>,
        inner: Broken,
    }

    crate::dao! {
        impl Outer {
            ok: { query: "select 1" },
            inner: { embed },
        }
    }

    #[test]
    fn embedded_errors_fail_the_outer_level() {
        let mut dao = Outer::default();
        let err = Binder::new(mysql()).build(&mut dao).unwrap_err();
        let Error::Bind(errors) = err else {
            panic!("expected bind errors");
        };
        assert_eq!(errors.len(), 3);
        assert!(!dao.ok.is_bound());
    }

    #[test]
    fn build_function_binds_a_single_slot() {
        let binder = Binder::new(postgres()).with_mapper(queries());

        let mut find: Func<fn(Query, String, i64) -> Result<Vec<Product>, Error>> = Func::new();
        binder
            .build_function(
                &mut find,
                "select * from Product where name = :name: and id > :min:",
                &["name", "min"],
            )
            .unwrap();
        let db = product_rows();
        assert_eq!(find.call(&db, "a".to_string(), 0).unwrap().len(), 2);
        assert_eq!(
            db.last_call(),
            Some((
                "select * from Product where name = $1 and id > $2".to_string(),
                vec![SqlValue::from("a"), SqlValue::I64(0)]
            ))
        );

        let mut by_alias: Func<fn(Query, i64) -> Option<i64>> = Func::new();
        binder
            .build_function(&mut by_alias, "select id from Product where id = :$1:", &[])
            .unwrap();
        assert_eq!(by_alias.call(&product_rows(), 1), Some(1));

        let mut bad: Func<fn(Exec, i64) -> Result<i32, Error>> = Func::new();
        let err = binder
            .build_function(&mut bad, "update t set a = :$1:", &[])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Signature(SignatureError::ExecutorOutput)
        ));
        assert!(!bad.is_bound());
    }

    #[test]
    fn named_queries_are_looked_up_in_order() {
        let empty: HashMap<String, String> =
            HashMap::from([("insert".to_string(), String::new())]);
        let binder = Binder::new(mysql())
            .with_mapper(empty)
            .with_mapper(queries());
        assert_eq!(
            binder.lookup_query("q:insert").unwrap(),
            "insert into Product (name, cost) values (:p.name:, :p.cost:)"
        );
        assert_eq!(binder.lookup_query("select 1").unwrap(), "select 1");
        assert!(matches!(
            binder.lookup_query("q:other"),
            Err(Error::QueryNotFound(ref n)) if n == "other"
        ));

        let mut dao = ProductDao::default();
        let mappers: Vec<Arc<dyn crate::api::QueryMapper>> = vec![Arc::new(queries())];
        build(&mut dao, mysql(), mappers).unwrap();
        assert!(dao.insert.is_bound());
    }
}
