#[cfg(test)]
mod tests {
    use crate::extract::ExtractError;
    use crate::flavor::{mysql, postgres};
    use crate::ident::IdentError;
    use crate::param::{Param, ParamType, ToParam};
    use crate::signature::{InputType, Signature};
    use crate::template::{
        BoundQuery, NameOrderMap, ParamInfo, ParameterBinding, QueryTemplate, Segment,
        TemplateError, build_dummy_parameters, build_name_order_map, compile,
    };
    use crate::value::{ScalarKind, SqlValue};
    use crate::valuer::{SqlValuer, ValuerError};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Person {
        name: String,
        age: i32,
    }

    crate::param_struct! {
        impl Person {
            name,
            age,
        }
    }

    #[derive(Debug, Clone)]
    struct Csv(Vec<i64>);

    impl SqlValuer for Csv {
        fn value(&self) -> Result<SqlValue, ValuerError> {
            let parts: Vec<String> = self.0.iter().map(i64::to_string).collect();
            Ok(SqlValue::from(parts.join(",")))
        }
    }

    fn querier_sig(values: Vec<ParamType>) -> Signature {
        let mut inputs = vec![InputType::Querier];
        inputs.extend(values.into_iter().map(InputType::Value));
        Signature::new(inputs, vec![])
    }

    fn names(csv: &str) -> NameOrderMap {
        build_name_order_map(csv, 1)
    }

    #[test]
    fn scalar_placeholder_compiles_to_simple_query() {
        let sig = querier_sig(vec![i64::param_type()]);
        let (tpl, plan) = compile(
            "select * from PERSON where id = :id:",
            &names("id"),
            &sig,
            &mysql(),
        )
        .unwrap();
        assert_eq!(
            tpl,
            QueryTemplate::Simple("select * from PERSON where id = ?".into())
        );
        assert_eq!(plan, vec![ParamInfo::new("id", 1, false)]);

        let bound = tpl.bind(&plan, &[10_i64.to_param()], 1).unwrap();
        assert_eq!(
            bound,
            BoundQuery {
                sql: "select * from PERSON where id = ?".into(),
                args: vec![SqlValue::I64(10)],
            }
        );
    }

    #[test]
    fn slice_placeholder_expands_per_call() {
        let sig = querier_sig(vec![String::param_type(), Vec::<i64>::param_type()]);
        let (tpl, plan) = compile(
            "select * from Product where name = :name: and id in (:ids:) and name <> :name:",
            &names("name,ids"),
            &sig,
            &postgres(),
        )
        .unwrap();
        assert!(matches!(tpl, QueryTemplate::Templated { .. }));
        assert_eq!(
            plan,
            vec![
                ParamInfo::new("name", 1, false),
                ParamInfo::new("ids", 2, true),
                ParamInfo::new("name", 1, false),
            ]
        );

        let args = [String::from("x").to_param(), vec![1_i64, 3, 5].to_param()];
        let bound = tpl.bind(&plan, &args, 1).unwrap();
        assert_eq!(
            bound.sql,
            "select * from Product where name = $1 and id in ($2, $3, $4) and name <> $5"
        );
        assert_eq!(
            bound.args,
            vec![
                SqlValue::from("x"),
                SqlValue::I64(1),
                SqlValue::I64(3),
                SqlValue::I64(5),
                SqlValue::from("x"),
            ]
        );

        let args = [String::from("y").to_param(), vec![7_i64].to_param()];
        let bound = tpl.bind(&plan, &args, 1).unwrap();
        assert_eq!(
            bound.sql,
            "select * from Product where name = $1 and id in ($2) and name <> $3"
        );
    }

    #[test]
    fn missing_slice_expands_to_nothing() {
        let sig = querier_sig(vec![Option::<Vec<i64>>::param_type()]);
        let (tpl, plan) =
            compile("delete from t where id in (:ids:)", &names("ids"), &sig, &mysql()).unwrap();
        let bound = tpl.bind(&plan, &[None::<Vec<i64>>.to_param()], 1).unwrap();
        assert_eq!(bound.sql, "delete from t where id in ()");
        assert!(bound.args.is_empty());
    }

    #[test]
    fn byte_slices_and_valuers_stay_scalar() {
        let sig = querier_sig(vec![Vec::<u8>::param_type(), ParamType::Valuer]);
        let (tpl, plan) = compile(
            "insert into blobs (data, tags) values (:data:, :tags:)",
            &names("data,tags"),
            &sig,
            &mysql(),
        )
        .unwrap();
        assert!(matches!(tpl, QueryTemplate::Simple(_)));
        assert_eq!(
            plan,
            vec![
                ParamInfo::new("data", 1, false),
                ParamInfo::new("tags", 2, false),
            ]
        );
        let valuer: Box<dyn SqlValuer> = Box::new(Csv(vec![1, 2]));
        let bound = tpl
            .bind(&plan, &[vec![1_u8, 2, 3].to_param(), valuer.to_param()], 1)
            .unwrap();
        assert_eq!(
            bound.args,
            vec![SqlValue::Bytes(vec![1, 2, 3]), SqlValue::from("1,2")]
        );
    }

    #[test]
    fn struct_paths_resolve_fields() {
        let sig = querier_sig(vec![Person::param_type()]);
        let (tpl, plan) = compile(
            "insert into person (name, age) values (:p.name:, :p . age:)",
            &names("p"),
            &sig,
            &mysql(),
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![
                ParamInfo::new("p.name", 1, false),
                ParamInfo::new("p.age", 1, false),
            ]
        );
        let p = Person {
            name: "fred".into(),
            age: 30,
        };
        let bound = tpl.bind(&plan, &[p.to_param()], 1).unwrap();
        assert_eq!(bound.sql, "insert into person (name, age) values (?, ?)");
        assert_eq!(bound.args, vec![SqlValue::from("fred"), SqlValue::from(30_i32)]);
    }

    #[test]
    fn slice_index_paths() {
        let sig = querier_sig(vec![Vec::<String>::param_type()]);
        let (tpl, plan) =
            compile("select :names.1:", &names("names"), &sig, &mysql()).unwrap();
        assert_eq!(plan, vec![ParamInfo::new("names.1", 1, false)]);

        let args = [vec![String::from("a"), String::from("b")].to_param()];
        assert_eq!(
            tpl.bind(&plan, &args, 1).unwrap().args,
            vec![SqlValue::from("b")]
        );

        let short = [vec![String::from("a")].to_param()];
        assert_eq!(
            tpl.bind(&plan, &short, 1).unwrap_err(),
            TemplateError::Extract(ExtractError::InvalidIndex("1".into()))
        );
    }

    #[test]
    fn escapes_are_emitted_literally() {
        let sig = querier_sig(vec![i64::param_type()]);
        let (tpl, _) = compile(
            r"select '\:literal\:', 'a\\b' from t where id = :id:",
            &names("id"),
            &sig,
            &mysql(),
        )
        .unwrap();
        assert_eq!(
            tpl,
            QueryTemplate::Simple(r"select ':literal:', 'a\b' from t where id = ?".into())
        );
    }

    #[test]
    fn compilation_is_deterministic() {
        let sig = querier_sig(vec![Vec::<i64>::param_type()]);
        let query = "select * from t where id in (:ids:) and x = 1";
        let first = compile(query, &names("ids"), &sig, &postgres()).unwrap();
        let second = compile(query, &names("ids"), &sig, &postgres()).unwrap();
        assert_eq!(first, second);
        let QueryTemplate::Templated { segments, .. } = first.0 else {
            panic!("expected a templated query");
        };
        assert_eq!(
            segments,
            vec![
                Segment::Text("select * from t where id in (".into()),
                Segment::Param(0),
                Segment::Text(") and x = 1".into()),
            ]
        );
    }

    #[test]
    fn compile_errors() {
        let sig = querier_sig(vec![f64::param_type(), String::param_type()]);
        let n = names("cost,name");

        assert_eq!(
            compile(
                "select * from Product where name=:: and cost=:cost",
                &n,
                &sig,
                &mysql()
            ),
            Err(TemplateError::EmptyVariable { position: 34 })
        );
        let unterminated = "select * from Product where cost = :cost";
        assert_eq!(
            compile(unterminated, &n, &sig, &mysql()),
            Err(TemplateError::MissingClosingDelimiter(unterminated.into()))
        );
        assert_eq!(
            compile(r"select 1 \", &n, &sig, &mysql()),
            Err(TemplateError::MissingClosingDelimiter(r"select 1 \".into()))
        );
        assert_eq!(
            compile("select :id:", &n, &sig, &mysql()),
            Err(TemplateError::ParameterNotFound("id".into()))
        );
        assert_eq!(
            compile("select :name.len:", &n, &sig, &mysql()),
            Err(TemplateError::PathOnScalar("name".into()))
        );
        assert_eq!(
            compile("select :a..b:", &n, &sig, &mysql()),
            Err(TemplateError::Ident(IdentError::LeadingOrDoublePeriod(
                "a..b".into()
            )))
        );
        assert_eq!(
            compile("select :q:", &build_name_order_map("q", 0), &sig, &mysql()),
            Err(TemplateError::PositionOutOfRange {
                name: "q".into(),
                position: 0,
            })
        );
    }

    #[test]
    fn extraction_failures_surface_at_bind_time() {
        let sig = querier_sig(vec![Option::<Person>::param_type()]);
        let (tpl, plan) = compile("select :p.name:", &names("p"), &sig, &mysql()).unwrap();
        assert_eq!(
            tpl.bind(&plan, &[None::<Person>.to_param()], 1),
            Err(TemplateError::Extract(ExtractError::Nil("p".into())))
        );
        assert_eq!(
            tpl.bind(&plan, &[], 1),
            Err(TemplateError::PositionOutOfRange {
                name: "p.name".into(),
                position: 1,
            })
        );
    }

    #[test]
    fn dummy_parameters_alias_value_positions() {
        let map = build_dummy_parameters(4, 2);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("$1"), Some(&2));
        assert_eq!(map.get("$2"), Some(&3));

        let sig = Signature::new(
            vec![
                InputType::Context,
                InputType::Querier,
                InputType::Value(ParamType::Scalar(ScalarKind::String)),
                InputType::Value(Person::param_type()),
            ],
            vec![],
        );
        let (tpl, plan) =
            compile("select :$1:, :$2.age:", &map, &sig, &postgres()).unwrap();
        assert_eq!(tpl, QueryTemplate::Simple("select $1, $2".into()));
        let p = Person {
            name: "n".into(),
            age: 4,
        };
        let bound = tpl
            .bind(&plan, &[Param::from(SqlValue::from("s")), p.to_param()], 2)
            .unwrap();
        assert_eq!(bound.args, vec![SqlValue::from("s"), SqlValue::from(4_i32)]);
    }

    #[test]
    fn finalize_checks_binding_count() {
        let sig = querier_sig(vec![Vec::<i64>::param_type()]);
        let (tpl, _) = compile("select :ids:", &names("ids"), &sig, &mysql()).unwrap();
        assert_eq!(
            tpl.finalize(&[]),
            Err(TemplateError::BindingCount {
                expected: 1,
                actual: 0,
            })
        );
        assert_eq!(
            tpl.finalize(&[ParameterBinding::Slice(vec![
                SqlValue::I64(1),
                SqlValue::I64(2)
            ])])
            .unwrap(),
            "select ?, ?"
        );
    }
}
