use serde::{Deserialize, Serialize};

use super::statement::Select;
use crate::result_set::Value;

/// Dotted name; a `*` last part selects all columns of the qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub parts: Vec<String>,
}

impl Identifier {
    pub fn new<S: Into<String>>(parts: impl IntoIterator<Item = S>) -> Self {
        Self { parts: parts.into_iter().map(Into::into).collect() }
    }

    /// Split on `.`; no quoting rules.
    pub fn from_dotted(path: &str) -> Self { Self::new(path.split('.')) }

    pub fn last(&self) -> &str { self.parts.last().map(|s| s.as_str()).unwrap_or("") }

    pub fn first(&self) -> &str { self.parts.first().map(|s| s.as_str()).unwrap_or("") }

    pub fn joined(&self) -> String { self.parts.join(".") }

    pub fn is_star(&self) -> bool { self.last() == "*" }
}

/// Literal leaf. `var_name` remembers the `$var[...]` text while a substitution is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_name: Option<String>,
}

impl Constant {
    pub fn new(value: impl Into<Value>) -> Self { Self { value: value.into(), var_name: None } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    Identifier(Identifier),
    Star,
    Constant(Constant),
    /// Value taken from a prior step's result.
    Parameter { step_num: usize },
    /// Named bind slot filled per input row (update templates).
    Placeholder { name: String },
    /// Resolved per group to the latest observed order value.
    Latest,
    BinaryOp { op: String, left: Box<Expr>, right: Box<Expr> },
    UnaryOp { op: String, arg: Box<Expr> },
    Between { arg: Box<Expr>, low: Box<Expr>, high: Box<Expr> },
    Function {
        name: String,
        args: Vec<Expr>,
        #[serde(default)]
        distinct: bool,
    },
    Tuple { items: Vec<Expr> },
    Aliased { expr: Box<Expr>, alias: String },
    Subquery { query: Box<Select> },
}

impl Expr {
    pub fn ident<S: Into<String>>(parts: impl IntoIterator<Item = S>) -> Expr { Expr::Identifier(Identifier::new(parts)) }

    pub fn col(name: &str) -> Expr { Expr::Identifier(Identifier::from_dotted(name)) }

    pub fn lit(v: impl Into<Value>) -> Expr { Expr::Constant(Constant::new(v)) }

    pub fn binary(op: &str, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp { op: op.to_string(), left: Box::new(left), right: Box::new(right) }
    }

    pub fn equals(left: Expr, right: Expr) -> Expr { Expr::binary("=", left, right) }

    pub fn and(left: Expr, right: Expr) -> Expr { Expr::binary("and", left, right) }

    pub fn func(name: &str, args: Vec<Expr>) -> Expr { Expr::Function { name: name.to_string(), args, distinct: false } }

    pub fn alias(self, alias: &str) -> Expr { Expr::Aliased { expr: Box::new(self), alias: alias.to_string() } }

    /// AND-fold; `None` for an empty list.
    pub fn conjunction(mut exprs: Vec<Expr>) -> Option<Expr> {
        let first = if exprs.is_empty() { return None } else { exprs.remove(0) };
        Some(exprs.into_iter().fold(first, Expr::and))
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self { Expr::Identifier(i) => Some(i), _ => None }
    }

    /// Display name of a projected expression: alias, else identifier last part, else rendered text.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Aliased { alias, .. } => alias.clone(),
            Expr::Identifier(i) => i.last().to_string(),
            other => other.to_string(),
        }
    }
}
