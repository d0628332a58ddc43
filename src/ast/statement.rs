use serde::{Deserialize, Serialize};

use super::expr::{Expr, Identifier};
use crate::result_set::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    /// Unqualified `JOIN`; prediction joins pick a side from it.
    #[default]
    Join,
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn sql(&self) -> &'static str {
        match self {
            JoinType::Join => "JOIN",
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub left: TableExpr,
    pub right: TableExpr,
    #[serde(default)]
    pub join_type: JoinType,
    #[serde(default)]
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableExpr {
    Table {
        name: Identifier,
        #[serde(default)]
        alias: Option<String>,
    },
    Subquery {
        query: Box<Select>,
        #[serde(default)]
        alias: Option<String>,
    },
    Join(Box<Join>),
}

impl TableExpr {
    pub fn table(name: &str) -> TableExpr { TableExpr::Table { name: Identifier::from_dotted(name), alias: None } }

    pub fn aliased(name: &str, alias: &str) -> TableExpr {
        TableExpr::Table { name: Identifier::from_dotted(name), alias: Some(alias.to_string()) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub expr: Expr,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Select {
    pub targets: Vec<Expr>,
    pub distinct: bool,
    pub from_table: Option<TableExpr>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

impl Select {
    pub fn star_from(table: TableExpr) -> Select {
        Select { targets: vec![Expr::Star], from_table: Some(table), ..Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub table: Identifier,
    pub update_columns: Vec<(String, Expr)>,
    #[serde(default)]
    pub where_clause: Option<Expr>,
    /// Key columns; when set, the update runs once per input row matched on these keys.
    #[serde(default)]
    pub keys: Option<Vec<Identifier>>,
    /// Alias of the `FROM (select)` source whose rows feed the placeholders.
    #[serde(default)]
    pub from_select_alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub table: Identifier,
    #[serde(default)]
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub table: Identifier,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum Statement {
    Select(Select),
    Update(Update),
    Delete(Delete),
    Insert(Insert),
}
