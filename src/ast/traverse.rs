//! Pre-order rewrite and visit helpers. The callback sees a node before its children;
//! returning `Some(replacement)` substitutes the node and skips its subtree.

use anyhow::Result;

use super::expr::Expr;
use super::statement::{Delete, Join, OrderBy, Select, TableExpr, Update};

fn boxed<F>(e: &Expr, f: &mut F) -> Result<Box<Expr>>
where
    F: FnMut(&Expr) -> Result<Option<Expr>>,
{
    Ok(Box::new(e.try_transform(f)?))
}

impl Expr {
    pub fn try_transform<F>(&self, f: &mut F) -> Result<Expr>
    where
        F: FnMut(&Expr) -> Result<Option<Expr>>,
    {
        if let Some(replaced) = f(self)? { return Ok(replaced); }
        let out = match self {
            Expr::BinaryOp { op, left, right } => Expr::BinaryOp { op: op.clone(), left: boxed(left, f)?, right: boxed(right, f)? },
            Expr::UnaryOp { op, arg } => Expr::UnaryOp { op: op.clone(), arg: boxed(arg, f)? },
            Expr::Between { arg, low, high } => Expr::Between { arg: boxed(arg, f)?, low: boxed(low, f)?, high: boxed(high, f)? },
            Expr::Function { name, args, distinct } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|a| a.try_transform(f)).collect::<Result<Vec<_>>>()?,
                distinct: *distinct,
            },
            Expr::Tuple { items } => Expr::Tuple { items: items.iter().map(|a| a.try_transform(f)).collect::<Result<Vec<_>>>()? },
            Expr::Aliased { expr, alias } => Expr::Aliased { expr: boxed(expr, f)?, alias: alias.clone() },
            Expr::Subquery { query } => Expr::Subquery { query: Box::new(query.try_transform_exprs(f)?) },
            leaf => leaf.clone(),
        };
        Ok(out)
    }

    pub fn transform<F>(&self, f: &mut F) -> Expr
    where
        F: FnMut(&Expr) -> Option<Expr>,
    {
        let mut wrapped = |e: &Expr| -> Result<Option<Expr>> { Ok(f(e)) };
        match self.try_transform(&mut wrapped) {
            Ok(e) => e,
            Err(_) => self.clone(),
        }
    }

    pub fn visit<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Expr::BinaryOp { left, right, .. } => { left.visit(f); right.visit(f); }
            Expr::UnaryOp { arg, .. } => arg.visit(f),
            Expr::Between { arg, low, high } => { arg.visit(f); low.visit(f); high.visit(f); }
            Expr::Function { args, .. } => args.iter().for_each(|a| a.visit(f)),
            Expr::Tuple { items } => items.iter().for_each(|a| a.visit(f)),
            Expr::Aliased { expr, .. } => expr.visit(f),
            Expr::Subquery { query } => query.visit_exprs(f),
            _ => {}
        }
    }
}

fn opt<F>(e: &Option<Expr>, f: &mut F) -> Result<Option<Expr>>
where
    F: FnMut(&Expr) -> Result<Option<Expr>>,
{
    e.as_ref().map(|e| e.try_transform(f)).transpose()
}

fn list<F>(items: &[Expr], f: &mut F) -> Result<Vec<Expr>>
where
    F: FnMut(&Expr) -> Result<Option<Expr>>,
{
    items.iter().map(|e| e.try_transform(f)).collect()
}

impl TableExpr {
    pub fn try_transform_exprs<F>(&self, f: &mut F) -> Result<TableExpr>
    where
        F: FnMut(&Expr) -> Result<Option<Expr>>,
    {
        Ok(match self {
            TableExpr::Table { .. } => self.clone(),
            TableExpr::Subquery { query, alias } => TableExpr::Subquery { query: Box::new(query.try_transform_exprs(f)?), alias: alias.clone() },
            TableExpr::Join(j) => TableExpr::Join(Box::new(Join {
                left: j.left.try_transform_exprs(f)?,
                right: j.right.try_transform_exprs(f)?,
                join_type: j.join_type,
                condition: opt(&j.condition, f)?,
            })),
        })
    }

    fn visit_exprs<F: FnMut(&Expr)>(&self, f: &mut F) {
        match self {
            TableExpr::Table { .. } => {}
            TableExpr::Subquery { query, .. } => query.visit_exprs(f),
            TableExpr::Join(j) => {
                j.left.visit_exprs(f);
                j.right.visit_exprs(f);
                if let Some(c) = &j.condition { c.visit(f); }
            }
        }
    }
}

impl Select {
    pub fn try_transform_exprs<F>(&self, f: &mut F) -> Result<Select>
    where
        F: FnMut(&Expr) -> Result<Option<Expr>>,
    {
        Ok(Select {
            targets: list(&self.targets, f)?,
            distinct: self.distinct,
            from_table: self.from_table.as_ref().map(|t| t.try_transform_exprs(f)).transpose()?,
            where_clause: opt(&self.where_clause, f)?,
            group_by: list(&self.group_by, f)?,
            having: opt(&self.having, f)?,
            order_by: self.order_by.iter()
                .map(|o| Ok(OrderBy { expr: o.expr.try_transform(f)?, descending: o.descending }))
                .collect::<Result<Vec<_>>>()?,
            limit: opt(&self.limit, f)?,
            offset: opt(&self.offset, f)?,
        })
    }

    pub fn visit_exprs<F: FnMut(&Expr)>(&self, f: &mut F) {
        self.targets.iter().for_each(|e| e.visit(f));
        if let Some(t) = &self.from_table { t.visit_exprs(f); }
        if let Some(w) = &self.where_clause { w.visit(f); }
        self.group_by.iter().for_each(|e| e.visit(f));
        if let Some(h) = &self.having { h.visit(f); }
        self.order_by.iter().for_each(|o| o.expr.visit(f));
        if let Some(l) = &self.limit { l.visit(f); }
        if let Some(o) = &self.offset { o.visit(f); }
    }
}

impl Update {
    pub fn try_transform_exprs<F>(&self, f: &mut F) -> Result<Update>
    where
        F: FnMut(&Expr) -> Result<Option<Expr>>,
    {
        Ok(Update {
            table: self.table.clone(),
            update_columns: self.update_columns.iter()
                .map(|(c, e)| Ok((c.clone(), e.try_transform(f)?)))
                .collect::<Result<Vec<_>>>()?,
            where_clause: opt(&self.where_clause, f)?,
            keys: self.keys.clone(),
            from_select_alias: self.from_select_alias.clone(),
        })
    }

    pub fn visit_exprs<F: FnMut(&Expr)>(&self, f: &mut F) {
        self.update_columns.iter().for_each(|(_, e)| e.visit(f));
        if let Some(w) = &self.where_clause { w.visit(f); }
    }
}

impl Delete {
    pub fn try_transform_exprs<F>(&self, f: &mut F) -> Result<Delete>
    where
        F: FnMut(&Expr) -> Result<Option<Expr>>,
    {
        Ok(Delete { table: self.table.clone(), where_clause: opt(&self.where_clause, f)? })
    }
}
