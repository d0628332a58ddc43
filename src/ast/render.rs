//! SQL text for AST nodes. Identifiers are always double-quoted so hashed names with
//! arbitrary characters survive; temporal constants render as explicit casts.

use std::fmt::{Display, Formatter, Result as FmtResult};

use super::expr::{Constant, Expr, Identifier};
use super::statement::{Delete, Insert, Join, OrderBy, Select, Statement, TableExpr, Update};
use crate::result_set::Value;

pub fn quote_ident(s: &str) -> String {
    if s == "*" { return s.to_string(); }
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub fn render_value(v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE".into() } else { "FALSE".into() },
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format!("{:?}", f),
        Value::Float(_) => "NULL".to_string(),
        Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Date(d) => format!("CAST('{}' AS DATE)", d.format("%Y-%m-%d")),
        Value::DateTime(dt) => format!("CAST('{}' AS TIMESTAMP)", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::List(items) => format!("({})", items.iter().map(render_value).collect::<Vec<_>>().join(", ")),
    }
}

fn join_list<T: Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

/// Word operators are upper-cased; symbols stay as given.
fn render_op(op: &str) -> String {
    if op.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') { op.to_ascii_uppercase() } else { op.to_string() }
}

/// Join constraint text: the top-level comparison is written bare, as polars SQL
/// refuses a parenthesized `ON (...)`. Nested operands keep their parentheses.
pub fn render_join_condition(cond: &Expr) -> String {
    match cond {
        Expr::BinaryOp { op, left, right } => format!("{} {} {}", left, render_op(op), right),
        other => other.to_string(),
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let parts: Vec<String> = self.parts.iter().map(|p| quote_ident(p)).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult { write!(f, "{}", render_value(&self.value)) }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Expr::Identifier(i) => write!(f, "{}", i),
            Expr::Star => write!(f, "*"),
            Expr::Constant(c) => write!(f, "{}", c),
            Expr::Parameter { step_num } => write!(f, ":step{}", step_num),
            Expr::Placeholder { name } => write!(f, ":{}", name),
            Expr::Latest => write!(f, "LATEST"),
            Expr::BinaryOp { op, left, right } => write!(f, "({} {} {})", left, render_op(op), right),
            Expr::UnaryOp { op, arg } => match op.to_ascii_lowercase().as_str() {
                "not" => write!(f, "NOT ({})", arg),
                "-" => write!(f, "-({})", arg),
                "is null" | "is not null" => write!(f, "({} {})", arg, render_op(op)),
                _ => write!(f, "{} ({})", render_op(op), arg),
            },
            Expr::Between { arg, low, high } => write!(f, "({} BETWEEN {} AND {})", arg, low, high),
            Expr::Function { name, args, distinct } => {
                write!(f, "{}({}{})", name, if *distinct { "DISTINCT " } else { "" }, join_list(args))
            }
            Expr::Tuple { items } => write!(f, "({})", join_list(items)),
            Expr::Aliased { expr, alias } => write!(f, "{} AS {}", expr, quote_ident(alias)),
            Expr::Subquery { query } => write!(f, "({})", query),
        }
    }
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} {} {}", self.left, self.join_type.sql(), self.right)?;
        if let Some(c) = &self.condition { write!(f, " ON {}", render_join_condition(c))?; }
        Ok(())
    }
}

impl Display for TableExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TableExpr::Table { name, alias } => {
                write!(f, "{}", name)?;
                if let Some(a) = alias { write!(f, " AS {}", quote_ident(a))?; }
                Ok(())
            }
            TableExpr::Subquery { query, alias } => {
                write!(f, "({})", query)?;
                if let Some(a) = alias { write!(f, " AS {}", quote_ident(a))?; }
                Ok(())
            }
            TableExpr::Join(j) => write!(f, "{}", j),
        }
    }
}

impl Display for OrderBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}{}", self.expr, if self.descending { " DESC" } else { "" })
    }
}

impl Display for Select {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "SELECT ")?;
        if self.distinct { write!(f, "DISTINCT ")?; }
        if self.targets.is_empty() { write!(f, "*")?; } else { write!(f, "{}", join_list(&self.targets))?; }
        if let Some(t) = &self.from_table { write!(f, " FROM {}", t)?; }
        if let Some(w) = &self.where_clause { write!(f, " WHERE {}", w)?; }
        if !self.group_by.is_empty() { write!(f, " GROUP BY {}", join_list(&self.group_by))?; }
        if let Some(h) = &self.having { write!(f, " HAVING {}", h)?; }
        if !self.order_by.is_empty() { write!(f, " ORDER BY {}", join_list(&self.order_by))?; }
        if let Some(l) = &self.limit { write!(f, " LIMIT {}", l)?; }
        if let Some(o) = &self.offset { write!(f, " OFFSET {}", o)?; }
        Ok(())
    }
}

impl Display for Update {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let sets: Vec<String> = self.update_columns.iter().map(|(c, e)| format!("{} = {}", quote_ident(c), e)).collect();
        write!(f, "UPDATE {} SET {}", self.table, sets.join(", "))?;
        if let Some(w) = &self.where_clause { write!(f, " WHERE {}", w)?; }
        Ok(())
    }
}

impl Display for Delete {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "DELETE FROM {}", self.table)?;
        if let Some(w) = &self.where_clause { write!(f, " WHERE {}", w)?; }
        Ok(())
    }
}

impl Display for Insert {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "INSERT INTO {}", self.table)?;
        if !self.columns.is_empty() {
            write!(f, " ({})", self.columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "))?;
        }
        let rows: Vec<String> = self.values.iter()
            .map(|r| format!("({})", r.iter().map(render_value).collect::<Vec<_>>().join(", ")))
            .collect();
        write!(f, " VALUES {}", rows.join(", "))
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Statement::Select(s) => write!(f, "{}", s),
            Statement::Update(u) => write!(f, "{}", u),
            Statement::Delete(d) => write!(f, "{}", d),
            Statement::Insert(i) => write!(f, "{}", i),
        }
    }
}
