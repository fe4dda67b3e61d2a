//! Stage 1 (spec §4.1.1): array operator lowering.
//!
//! `@>` / `<@` / `&&` are PostgreSQL array/range containment and overlap
//! operators with no DuckDB equivalent; they're replaced with the
//! equivalent DuckDB list functions.

use sqlparser::ast::{BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArgumentList, FunctionArguments, ObjectName, Select, SelectItem};

/// Run stage 1 across every expression reachable from a select (WHERE,
/// HAVING, projection). Join ON-clauses are walked separately by
/// [`crate::translate::rewrites::join_qualify`] and are not touched here —
/// containment operators inside ON clauses are rare and this pipeline only
/// needs to handle the documented scenario (WHERE-clause containment).
pub fn apply_select(select: &mut Select) -> bool {
    let mut modified = false;

    if let Some(selection) = &mut select.selection {
        modified |= rewrite_expr(selection);
    }
    if let Some(having) = &mut select.having {
        modified |= rewrite_expr(having);
    }
    for item in &mut select.projection {
        modified |= rewrite_select_item(item);
    }

    modified
}

fn rewrite_select_item(item: &mut SelectItem) -> bool {
    match item {
        SelectItem::UnnamedExpr(expr) => rewrite_expr(expr),
        SelectItem::ExprWithAlias { expr, .. } => rewrite_expr(expr),
        _ => false,
    }
}

fn rewrite_expr(expr: &mut Expr) -> bool {
    let mut modified = false;

    if let Expr::BinaryOp { left, op, right } = expr {
        modified |= rewrite_expr(left);
        modified |= rewrite_expr(right);

        if let Some(call) = lower_containment(op, left, right) {
            *expr = call;
            return true;
        }
        return modified;
    }

    match expr {
        Expr::UnaryOp { expr: inner, .. } | Expr::Nested(inner) => {
            modified |= rewrite_expr(inner);
        }
        Expr::InList { expr: inner, list, .. } => {
            modified |= rewrite_expr(inner);
            for item in list {
                modified |= rewrite_expr(item);
            }
        }
        Expr::Between { expr: inner, low, high, .. } => {
            modified |= rewrite_expr(inner);
            modified |= rewrite_expr(low);
            modified |= rewrite_expr(high);
        }
        Expr::Case { operand, conditions, results, else_result, .. } => {
            if let Some(o) = operand {
                modified |= rewrite_expr(o);
            }
            for c in conditions {
                modified |= rewrite_expr(c);
            }
            for r in results {
                modified |= rewrite_expr(r);
            }
            if let Some(e) = else_result {
                modified |= rewrite_expr(e);
            }
        }
        Expr::Cast { expr: inner, .. } => {
            modified |= rewrite_expr(inner);
        }
        _ => {}
    }

    modified
}

/// Build the replacement call for one of the three containment/overlap
/// operators, or `None` if `op` is none of them.
fn lower_containment(op: &BinaryOperator, left: &Expr, right: &Expr) -> Option<Expr> {
    let (fn_name, args) = match op {
        BinaryOperator::AtArrow => ("array_has_all", [left.clone(), right.clone()]),
        BinaryOperator::ArrowAt => ("array_has_all", [right.clone(), left.clone()]),
        BinaryOperator::Overlap => ("array_has_any", [left.clone(), right.clone()]),
        _ => return None,
    };
    Some(call(fn_name, args))
}

fn call(name: &str, args: [Expr; 2]) -> Expr {
    Expr::Function(Function {
        name: ObjectName(vec![sqlparser::ast::Ident::new(name)]),
        uses_odbc_syntax: false,
        parameters: FunctionArguments::None,
        args: FunctionArguments::List(FunctionArgumentList {
            duplicate_treatment: None,
            args: args
                .into_iter()
                .map(|e| FunctionArg::Unnamed(FunctionArgExpr::Expr(e)))
                .collect(),
            clauses: vec![],
        }),
        filter: None,
        null_treatment: None,
        over: None,
        within_group: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql;

    #[test]
    fn lowers_contains_operator() {
        let mut stmt = sql::parse_one("SELECT * FROM t WHERE tags @> ARRAY[1, 2]").unwrap();
        let sqlparser::ast::Statement::Query(query) = &mut stmt else {
            panic!("expected a query")
        };
        let sqlparser::ast::SetExpr::Select(select) = query.body.as_mut() else {
            panic!("expected a select")
        };
        assert!(apply_select(select));
        let rendered = sql::to_sql(&stmt);
        assert!(rendered.contains("array_has_all("));
        assert!(!rendered.contains("@>"));
    }

    #[test]
    fn lowers_overlap_operator() {
        let mut stmt = sql::parse_one("SELECT * FROM t WHERE tags && ARRAY[1, 2]").unwrap();
        let sqlparser::ast::Statement::Query(query) = &mut stmt else {
            panic!("expected a query")
        };
        let sqlparser::ast::SetExpr::Select(select) = query.body.as_mut() else {
            panic!("expected a select")
        };
        assert!(apply_select(select));
        assert!(sql::to_sql(&stmt).contains("array_has_any("));
    }

    #[test]
    fn leaves_unrelated_expressions_alone() {
        let mut stmt = sql::parse_one("SELECT * FROM t WHERE a = 1").unwrap();
        let sqlparser::ast::Statement::Query(query) = &mut stmt else {
            panic!("expected a query")
        };
        let sqlparser::ast::SetExpr::Select(select) = query.body.as_mut() else {
            panic!("expected a select")
        };
        assert!(!apply_select(select));
    }
}
