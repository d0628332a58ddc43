//! Planner-boundary AST: the sub-queries steps carry, rendered to SQL for the local
//! executor and for data nodes that speak SQL.

pub mod expr;
pub mod render;
pub mod statement;
pub mod traverse;

pub use expr::{Constant, Expr, Identifier};
pub use render::{quote_ident, render_join_condition, render_value};
pub use statement::{Delete, Insert, Join, JoinType, OrderBy, Select, Statement, TableExpr, Update};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_set::Value;
    use chrono::NaiveDate;

    #[test]
    fn renders_select_with_quoting() {
        let mut q = Select::star_from(TableExpr::aliased("sales.orders", "o"));
        q.targets = vec![Expr::col("o.id"), Expr::func("sum", vec![Expr::col("amount")]).alias("total")];
        q.where_clause = Some(Expr::and(
            Expr::binary(">", Expr::col("amount"), Expr::lit(10)),
            Expr::binary("like", Expr::col("name"), Expr::lit("O'N%")),
        ));
        q.group_by = vec![Expr::col("o.id")];
        q.limit = Some(Expr::lit(5));
        assert_eq!(
            q.to_string(),
            "SELECT \"o\".\"id\", sum(\"amount\") AS \"total\" FROM \"sales\".\"orders\" AS \"o\" \
             WHERE ((\"amount\" > 10) AND (\"name\" LIKE 'O''N%')) GROUP BY \"o\".\"id\" LIMIT 5"
        );
    }

    #[test]
    fn join_on_condition_has_no_outer_parentheses() {
        let single = Expr::equals(Expr::col("a.x"), Expr::col("b.y"));
        assert_eq!(render_join_condition(&single), "\"a\".\"x\" = \"b\".\"y\"");
        let both = Expr::and(single.clone(), Expr::equals(Expr::col("a.z"), Expr::col("b.w")));
        assert_eq!(
            render_join_condition(&both),
            "(\"a\".\"x\" = \"b\".\"y\") AND (\"a\".\"z\" = \"b\".\"w\")"
        );
        let join = Join {
            left: TableExpr::table("a"),
            right: TableExpr::table("b"),
            join_type: JoinType::Left,
            condition: Some(single),
        };
        assert!(join.to_string().ends_with(" ON \"a\".\"x\" = \"b\".\"y\""));
    }

    #[test]
    fn renders_temporal_constants_as_casts() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(render_value(&Value::Date(d)), "CAST('2024-01-02' AS DATE)");
        let dt = d.and_hms_opt(3, 4, 5).unwrap();
        assert_eq!(render_value(&Value::DateTime(dt)), "CAST('2024-01-02 03:04:05' AS TIMESTAMP)");
        assert_eq!(render_value(&Value::List(vec![Value::Int(1), Value::from("a")])), "(1, 'a')");
    }

    #[test]
    fn try_transform_rewrites_without_touching_source() {
        let e = Expr::equals(Expr::col("t.a"), Expr::Parameter { step_num: 0 });
        let out = e.try_transform(&mut |n| Ok(match n {
            Expr::Parameter { .. } => Some(Expr::lit(3)),
            _ => None,
        })).unwrap();
        assert_eq!(out.to_string(), "(\"t\".\"a\" = 3)");
        assert!(matches!(e, Expr::BinaryOp { ref right, .. } if matches!(**right, Expr::Parameter { .. })));
    }

    #[test]
    fn visit_reaches_nested_subquery() {
        let inner = Select { where_clause: Some(Expr::col("deep")), ..Default::default() };
        let e = Expr::binary("in", Expr::col("x"), Expr::Subquery { query: Box::new(inner) });
        let mut names = Vec::new();
        e.visit(&mut |n| if let Expr::Identifier(i) = n { names.push(i.joined()); });
        assert_eq!(names, vec!["x", "deep"]);
    }

    #[test]
    fn plan_json_shape() {
        let json = r#"{"type":"binary_op","op":"=","left":{"type":"identifier","parts":["a"]},
                       "right":{"type":"constant","value":"$var[x]"}}"#;
        let e: Expr = serde_json::from_str(json).unwrap();
        assert_eq!(e.to_string(), "(\"a\" = '$var[x]')");
    }
}
