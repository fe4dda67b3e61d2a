//! AST rewrite pipeline (spec §4.1): ordered, idempotent tree visitors,
//! walked recursively into every nested select (CTE bodies, derived-table
//! subqueries, scalar subqueries, set-operation arms).
//!
//! Execution order: array operator lowering, set-operation WITH hoisting,
//! table-valued-function aliasing, join-column qualification. The last two
//! are reordered relative to their numbering in spec §4.1 per the design
//! note in spec §9: table-function aliasing must claim its bare names
//! before join qualification's default-qualifier pass would otherwise
//! swallow them.

mod array_ops;
mod join_qualify;
mod tvf_alias;
mod with_hoist;

use sqlparser::ast::{Expr, Query, SetExpr, Statement, TableFactor};

/// Run the full pipeline over a parsed statement. `rewrite_array_ops` gates
/// stage 1 only (spec §6 `rewrite_arrays`); the other three stages always
/// run. Returns whether any stage modified the tree.
pub fn apply(stmt: &mut Statement) -> bool {
    apply_with_options(stmt, true)
}

pub fn apply_with_options(stmt: &mut Statement, rewrite_array_ops: bool) -> bool {
    let mut modified = false;
    match stmt {
        Statement::Query(query) => walk_query(query, rewrite_array_ops, &mut modified),
        Statement::Insert(insert) => {
            // INSERT-with-SELECT forwards to the embedded select (spec
            // §4.1.3).
            if let Some(source) = insert.source.as_mut() {
                walk_query(source, rewrite_array_ops, &mut modified);
            }
        }
        Statement::Update { table, from, selection, .. } => {
            modified |= join_qualify::apply_update(table, from, selection);
            if let Some(selection) = selection {
                walk_expr_subqueries(selection, rewrite_array_ops, &mut modified);
            }
        }
        Statement::Delete(delete) => {
            modified |= join_qualify::apply_delete(delete);
            if let Some(selection) = &mut delete.selection {
                walk_expr_subqueries(selection, rewrite_array_ops, &mut modified);
            }
        }
        _ => {}
    }
    modified
}

fn walk_query(query: &mut Query, rewrite_array_ops: bool, modified: &mut bool) {
    if let Some(with) = &mut query.with {
        for cte in &mut with.cte_tables {
            walk_query(&mut cte.query, rewrite_array_ops, modified);
        }
    }

    *modified |= with_hoist::apply(query);

    walk_set_expr(&mut query.body, rewrite_array_ops, modified);

    if let SetExpr::Select(select) = query.body.as_mut() {
        if rewrite_array_ops {
            *modified |= array_ops::apply_select(select);
        }
        *modified |= tvf_alias::apply(select);
        let outcome = join_qualify::apply_select(select);
        *modified |= outcome.modified;
        if let Some(order_by) = &mut query.order_by {
            *modified |= join_qualify::apply_order_by(
                order_by,
                &outcome.ambiguous,
                outcome.default_qualifier.as_ref(),
            );
        }
    }
}

fn walk_set_expr(expr: &mut SetExpr, rewrite_array_ops: bool, modified: &mut bool) {
    match expr {
        SetExpr::Select(select) => walk_select_subqueries(select, rewrite_array_ops, modified),
        SetExpr::Query(q) => walk_query(q, rewrite_array_ops, modified),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr(left, rewrite_array_ops, modified);
            walk_set_expr(right, rewrite_array_ops, modified);
        }
        _ => {}
    }
}

fn walk_select_subqueries(select: &mut sqlparser::ast::Select, rewrite_array_ops: bool, modified: &mut bool) {
    for twj in &mut select.from {
        walk_table_factor(&mut twj.relation, rewrite_array_ops, modified);
        for join in &mut twj.joins {
            walk_table_factor(&mut join.relation, rewrite_array_ops, modified);
        }
    }
    if let Some(selection) = &mut select.selection {
        walk_expr_subqueries(selection, rewrite_array_ops, modified);
    }
    if let Some(having) = &mut select.having {
        walk_expr_subqueries(having, rewrite_array_ops, modified);
    }
}

fn walk_table_factor(tf: &mut TableFactor, rewrite_array_ops: bool, modified: &mut bool) {
    if let TableFactor::Derived { subquery, .. } = tf {
        walk_query(subquery, rewrite_array_ops, modified);
    }
}

fn walk_expr_subqueries(expr: &mut Expr, rewrite_array_ops: bool, modified: &mut bool) {
    match expr {
        Expr::Subquery(q) => walk_query(q, rewrite_array_ops, modified),
        Expr::Exists { subquery, .. } => walk_query(subquery, rewrite_array_ops, modified),
        Expr::InSubquery { expr: inner, subquery, .. } => {
            walk_expr_subqueries(inner, rewrite_array_ops, modified);
            walk_query(subquery, rewrite_array_ops, modified);
        }
        Expr::BinaryOp { left, right, .. } => {
            walk_expr_subqueries(left, rewrite_array_ops, modified);
            walk_expr_subqueries(right, rewrite_array_ops, modified);
        }
        Expr::UnaryOp { expr: inner, .. } | Expr::Nested(inner) => {
            walk_expr_subqueries(inner, rewrite_array_ops, modified);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql;

    #[test]
    fn pipeline_is_idempotent() {
        let sqls = [
            "SELECT * FROM t WHERE tags @> ARRAY[1, 2]",
            r#"SELECT * FROM "a" LEFT JOIN "b" ON "id" = "id""#,
            "(WITH x AS (SELECT 1) SELECT * FROM x) UNION (WITH y AS (SELECT 2) SELECT * FROM y)",
            "SELECT s FROM generate_series(1, 10) AS s WHERE s > 5",
        ];
        for sql in sqls {
            let mut stmt = sql::parse_one(sql).unwrap();
            assert!(apply(&mut stmt), "first pass should modify: {sql}");
            let once = sql::to_sql(&stmt);

            let mut reparsed = sql::parse_one(&once).unwrap();
            let modified_again = apply(&mut reparsed);
            assert!(!modified_again, "second pass should be a no-op: {sql}");
            assert_eq!(sql::to_sql(&reparsed), once);
        }
    }

    #[test]
    fn qualifies_update_from_clause() {
        let mut stmt = sql::parse_one(
            r#"UPDATE "a" SET "x" = 1 FROM "b" WHERE "id" = "id""#,
        )
        .unwrap();
        assert!(apply(&mut stmt));
        let rendered = sql::to_sql(&stmt);
        assert!(rendered.contains(r#""a"."id""#));
        assert!(rendered.contains(r#""b"."id""#));
    }

    #[test]
    fn qualifies_delete_using_clause() {
        let mut stmt = sql::parse_one(
            r#"DELETE FROM "a" USING "b" WHERE "id" = "id""#,
        )
        .unwrap();
        assert!(apply(&mut stmt));
        let rendered = sql::to_sql(&stmt);
        assert!(rendered.contains(r#""a"."id""#));
        assert!(rendered.contains(r#""b"."id""#));
    }

    #[test]
    fn recurses_into_derived_table_subqueries() {
        let mut stmt =
            sql::parse_one(r#"SELECT * FROM (SELECT * FROM "a" LEFT JOIN "b" ON "id" = "id") sub"#)
                .unwrap();
        assert!(apply(&mut stmt));
        let rendered = sql::to_sql(&stmt);
        assert!(rendered.contains(r#""a"."id""#));
    }
}
