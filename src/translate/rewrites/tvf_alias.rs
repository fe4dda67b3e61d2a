//! Stage 3 in execution order (spec §4.1.4 in document order; run before
//! join qualification per spec §9's ordering note — see [`super`]):
//! table-valued-function column aliasing.
//!
//! `generate_series(...) AS alias` exposes its single output column as
//! `alias` under PostgreSQL's naming rules; DuckDB exposes it as
//! `alias.generate_series`. Bare references to `alias` in the surrounding
//! select are rewritten accordingly before join qualification gets a
//! chance to treat `alias` as an ordinary ambiguous column name.

use std::collections::HashSet;

use sqlparser::ast::{Expr, Ident, Select, SelectItem, TableFactor};

const TVF_OUTPUT_COLUMN: &str = "generate_series";

pub fn apply(select: &mut Select) -> bool {
    let mut aliases = Vec::new();
    for twj in &select.from {
        collect_alias(&twj.relation, &mut aliases);
        for j in &twj.joins {
            collect_alias(&j.relation, &mut aliases);
        }
    }
    if aliases.is_empty() {
        return false;
    }
    let names: HashSet<String> = aliases.into_iter().collect();

    let mut modified = false;
    if let Some(selection) = &mut select.selection {
        modified |= rewrite_expr(selection, &names);
    }
    if let Some(having) = &mut select.having {
        modified |= rewrite_expr(having, &names);
    }
    for item in &mut select.projection {
        modified |= rewrite_select_item(item, &names);
    }
    modified
}

fn collect_alias(tf: &TableFactor, out: &mut Vec<String>) {
    if let TableFactor::Table {
        name,
        alias: Some(alias),
        args: Some(_),
        ..
    } = tf
    {
        if name.to_string().eq_ignore_ascii_case(TVF_OUTPUT_COLUMN) {
            out.push(alias.name.value.clone());
        }
    }
}

fn rewrite_select_item(item: &mut SelectItem, names: &HashSet<String>) -> bool {
    match item {
        SelectItem::UnnamedExpr(expr) => rewrite_expr(expr, names),
        SelectItem::ExprWithAlias { expr, .. } => rewrite_expr(expr, names),
        _ => false,
    }
}

fn rewrite_expr(expr: &mut Expr, names: &HashSet<String>) -> bool {
    if let Expr::Identifier(id) = expr {
        if names.contains(&id.value) {
            *expr = Expr::CompoundIdentifier(vec![id.clone(), Ident::new(TVF_OUTPUT_COLUMN)]);
            return true;
        }
        return false;
    }

    let mut modified = false;
    match expr {
        Expr::BinaryOp { left, right, .. } => {
            modified |= rewrite_expr(left, names);
            modified |= rewrite_expr(right, names);
        }
        Expr::UnaryOp { expr: inner, .. } | Expr::Nested(inner) => {
            modified |= rewrite_expr(inner, names);
        }
        Expr::InList { expr: inner, list, .. } => {
            modified |= rewrite_expr(inner, names);
            for item in list {
                modified |= rewrite_expr(item, names);
            }
        }
        Expr::Between { expr: inner, low, high, .. } => {
            modified |= rewrite_expr(inner, names);
            modified |= rewrite_expr(low, names);
            modified |= rewrite_expr(high, names);
        }
        _ => {}
    }
    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql;
    use sqlparser::ast::{SetExpr, Statement};

    fn as_select(stmt: &mut Statement) -> &mut sqlparser::ast::Select {
        let Statement::Query(query) = stmt else {
            panic!("expected a query")
        };
        let SetExpr::Select(select) = query.body.as_mut() else {
            panic!("expected a select")
        };
        select
    }

    #[test]
    fn aliases_bare_reference_to_tvf_output() {
        let mut stmt = sql::parse_one(
            "SELECT s FROM generate_series(1, 10) AS s WHERE s > 5",
        )
        .unwrap();
        let select = as_select(&mut stmt);
        assert!(apply(select));
        let rendered = sql::to_sql(&stmt);
        assert!(rendered.contains("s.generate_series"));
    }

    #[test]
    fn leaves_unrelated_selects_alone() {
        let mut stmt = sql::parse_one("SELECT * FROM t WHERE a = 1").unwrap();
        let select = as_select(&mut stmt);
        assert!(!apply(select));
    }
}
