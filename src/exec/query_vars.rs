//! `$var[name]` substitution for map-reduce templates.
//! Only binary and unary operators are descended; every other node is left alone.

use crate::ast::Expr;
use crate::result_set::Value;

const VAR_PREFIX: &str = "$var[";

pub fn var_placeholder(name: &str) -> String { format!("$var[{}]", name) }

/// Tag constants whose text is a `$var[...]` placeholder.
pub fn mark_query_var(e: &mut Expr) {
    match e {
        Expr::BinaryOp { left, right, .. } => { mark_query_var(left); mark_query_var(right); }
        Expr::UnaryOp { arg, .. } => mark_query_var(arg),
        Expr::Constant(c) => {
            let text = c.value.to_string();
            if text.starts_with(VAR_PREFIX) { c.var_name = Some(text); }
        }
        _ => {}
    }
}

/// Restore marked constants to their placeholder text and drop the tag.
pub fn unmark_query_var(e: &mut Expr) {
    match e {
        Expr::BinaryOp { left, right, .. } => { unmark_query_var(left); unmark_query_var(right); }
        Expr::UnaryOp { arg, .. } => unmark_query_var(arg),
        Expr::Constant(c) => {
            if let Some(name) = c.var_name.take() { c.value = Value::Str(name); }
        }
        _ => {}
    }
}

/// Overwrite marked constants still holding `$var[name]` with `value`.
pub fn replace_query_var(e: &mut Expr, value: &Value, name: &str) {
    match e {
        Expr::BinaryOp { left, right, .. } => { replace_query_var(left, value, name); replace_query_var(right, value, name); }
        Expr::UnaryOp { arg, .. } => replace_query_var(arg, value, name),
        Expr::Constant(c) => {
            let placeholder = var_placeholder(name);
            if c.var_name.as_deref() == Some(placeholder.as_str()) && c.value.as_str() == Some(placeholder.as_str()) {
                c.value = value.clone();
            }
        }
        _ => {}
    }
}
