//! Stage 4 in execution order (spec §4.1.3; see [`super`] for why it runs
//! after table-valued-function aliasing): join-column qualification.
//!
//! DuckDB's binder resolves bare column names differently than PostgreSQL
//! once a schema-qualified table is joined against a CTE or another
//! relation sharing a column name. This stage qualifies equality
//! conditions in JOIN ON clauses and then every other still-ambiguous bare
//! reference in the select (projection, WHERE, ORDER BY) with a default
//! qualifier.
//!
//! This is the "later, more complete" variant referenced in spec §9 (early
//! exit, USING-clause folding, UPDATE/DELETE/INSERT-SELECT coverage).

use std::collections::HashSet;

use sqlparser::ast::{
    Delete, Expr, FromTable, Ident, Join, JoinConstraint, JoinOperator, OrderBy, OrderByExpr,
    Select, SelectItem, TableFactor, TableWithJoins, UpdateTableFromKind,
};

/// Result of qualifying one select: whether anything changed, the set of
/// column names that became ambiguous (and so need default qualification
/// wherever else they appear unqualified), and the default qualifier (the
/// first FROM source).
pub struct QualifyOutcome {
    pub modified: bool,
    pub ambiguous: HashSet<String>,
    pub default_qualifier: Option<Ident>,
}

/// Run stage 4 on one select. Returns the outcome so the caller can also
/// qualify an enclosing query's ORDER BY, which sqlparser attaches to
/// `Query` rather than `Select`.
pub fn apply_select(select: &mut Select) -> QualifyOutcome {
    let qualifiers = source_qualifiers(&select.from);
    if qualifiers.len() < 2 {
        return QualifyOutcome {
            modified: false,
            ambiguous: HashSet::new(),
            default_qualifier: None,
        };
    }

    if !any_on_clause_has_unqualified_column(&select.from) {
        return QualifyOutcome {
            modified: false,
            ambiguous: HashSet::new(),
            default_qualifier: None,
        };
    }

    let mut modified = false;
    let mut ambiguous = HashSet::new();

    let mut idx = 0usize;
    for twj in &mut select.from {
        idx += 1;
        for join in &mut twj.joins {
            let preceding = qualifiers.get(idx - 1).cloned().flatten();
            let current = qualifiers.get(idx).cloned().flatten();
            idx += 1;
            modified |= qualify_join(join, preceding.as_ref(), current.as_ref(), &mut ambiguous);
        }
    }

    let default_qualifier = qualifiers.first().cloned().flatten();

    if let Some(selection) = &mut select.selection {
        modified |= qualify_ambiguous(selection, &ambiguous, default_qualifier.as_ref());
    }
    for item in &mut select.projection {
        modified |= qualify_select_item(item, &ambiguous, default_qualifier.as_ref());
    }

    QualifyOutcome {
        modified,
        ambiguous,
        default_qualifier,
    }
}

/// Apply default qualification to an enclosing ORDER BY using the outcome
/// of [`apply_select`] for the same select.
pub fn apply_order_by(
    order_by: &mut OrderBy,
    ambiguous: &HashSet<String>,
    default_qualifier: Option<&Ident>,
) -> bool {
    if ambiguous.is_empty() {
        return false;
    }
    let mut modified = false;
    for item in order_by_exprs_mut(order_by) {
        modified |= qualify_ambiguous(&mut item.expr, ambiguous, default_qualifier);
    }
    modified
}

fn order_by_exprs_mut(order_by: &mut OrderBy) -> &mut [OrderByExpr] {
    &mut order_by.exprs
}

/// UPDATE's auxiliary FROM clause qualification (spec §4.1.3: "The same
/// qualification applies to UPDATE and DELETE statements that have an
/// auxiliary FROM list"). The statement's own target table is the default
/// qualifier (slot 0); the auxiliary FROM sources follow it, matching the
/// select-list ordering [`apply_select`] uses.
pub fn apply_update(
    table: &TableWithJoins,
    from: &mut Option<UpdateTableFromKind>,
    selection: &mut Option<Expr>,
) -> bool {
    let Some(from_kind) = from.as_mut() else {
        return false;
    };
    let primary_qualifier = source_qualifier(&table.relation);
    let aux = match from_kind {
        UpdateTableFromKind::BeforeSet(twj) => std::slice::from_mut(twj),
        UpdateTableFromKind::AfterSet(twj) => std::slice::from_mut(twj),
    };
    apply_auxiliary(primary_qualifier, aux, selection)
}

/// DELETE's `USING` clause qualification, same contract as
/// [`apply_update`].
pub fn apply_delete(delete: &mut Delete) -> bool {
    let primary_qualifier = primary_qualifier_from_delete_from(&delete.from);
    let Some(using) = delete.using.as_mut() else {
        return false;
    };
    apply_auxiliary(primary_qualifier, using.as_mut_slice(), &mut delete.selection)
}

fn primary_qualifier_from_delete_from(from: &FromTable) -> Option<Ident> {
    let tables = match from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    tables.first().and_then(|twj| source_qualifier(&twj.relation))
}

/// Shared core for UPDATE/DELETE qualification: `primary_qualifier` is the
/// statement's own target table (always the default qualifier, slot 0),
/// `aux_from` is the auxiliary FROM/USING list (slots 1..). Mirrors
/// [`apply_select`]'s walk over `select.from`.
fn apply_auxiliary(
    primary_qualifier: Option<Ident>,
    aux_from: &mut [TableWithJoins],
    selection: &mut Option<Expr>,
) -> bool {
    let mut qualifiers = vec![primary_qualifier];
    qualifiers.extend(source_qualifiers(aux_from));
    if qualifiers.len() < 2 {
        return false;
    }
    if !any_on_clause_has_unqualified_column(aux_from) {
        return false;
    }

    let mut modified = false;
    let mut ambiguous = HashSet::new();

    let mut idx = 0usize;
    for twj in aux_from.iter_mut() {
        idx += 1;
        for join in &mut twj.joins {
            let preceding = qualifiers.get(idx - 1).cloned().flatten();
            let current = qualifiers.get(idx).cloned().flatten();
            idx += 1;
            modified |= qualify_join(join, preceding.as_ref(), current.as_ref(), &mut ambiguous);
        }
    }

    let default_qualifier = qualifiers.first().cloned().flatten();
    if let Some(sel) = selection {
        modified |= qualify_ambiguous(sel, &ambiguous, default_qualifier.as_ref());
    }
    modified
}

fn source_qualifiers(from: &[TableWithJoins]) -> Vec<Option<Ident>> {
    let mut out = Vec::new();
    for twj in from {
        out.push(source_qualifier(&twj.relation));
        for join in &twj.joins {
            out.push(source_qualifier(&join.relation));
        }
    }
    out
}

fn source_qualifier(tf: &TableFactor) -> Option<Ident> {
    match tf {
        TableFactor::Table { name, alias, .. } => Some(
            alias
                .as_ref()
                .map(|a| a.name.clone())
                .unwrap_or_else(|| last_ident(name)),
        ),
        TableFactor::Derived { alias, .. } => alias.as_ref().map(|a| a.name.clone()),
        TableFactor::TableFunction { alias, .. } => alias.as_ref().map(|a| a.name.clone()),
        _ => None,
    }
}

fn last_ident(name: &sqlparser::ast::ObjectName) -> Ident {
    let text = name.to_string();
    let last_part = text.rsplit('.').next().unwrap_or(&text);
    Ident::new(last_part.trim_matches('"'))
}

fn any_on_clause_has_unqualified_column(from: &[TableWithJoins]) -> bool {
    from.iter().any(|twj| {
        twj.joins.iter().any(|j| {
            join_constraint(&j.join_operator)
                .map(|c| match c {
                    JoinConstraint::On(expr) => expr_has_unqualified_column(expr),
                    JoinConstraint::Using(_) => true,
                    _ => false,
                })
                .unwrap_or(false)
        })
    })
}

fn expr_has_unqualified_column(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(_) => true,
        Expr::CompoundIdentifier(_) => false,
        Expr::BinaryOp { left, right, .. } => {
            expr_has_unqualified_column(left) || expr_has_unqualified_column(right)
        }
        Expr::UnaryOp { expr: inner, .. } | Expr::Nested(inner) => {
            expr_has_unqualified_column(inner)
        }
        _ => true, // conservative: never under-approximate
    }
}

fn join_constraint(op: &JoinOperator) -> Option<&JoinConstraint> {
    use JoinOperator::*;
    match op {
        Inner(c) | LeftOuter(c) | RightOuter(c) | FullOuter(c) => Some(c),
        _ => None,
    }
}

fn join_constraint_mut(op: &mut JoinOperator) -> Option<&mut JoinConstraint> {
    use JoinOperator::*;
    match op {
        Inner(c) | LeftOuter(c) | RightOuter(c) | FullOuter(c) => Some(c),
        _ => None,
    }
}

fn qualify_join(
    join: &mut Join,
    preceding: Option<&Ident>,
    current: Option<&Ident>,
    ambiguous: &mut HashSet<String>,
) -> bool {
    let Some(constraint) = join_constraint_mut(&mut join.join_operator) else {
        return false;
    };
    match constraint {
        JoinConstraint::On(expr) => qualify_equalities(expr, preceding, current, ambiguous),
        JoinConstraint::Using(cols) => {
            for c in cols.iter() {
                ambiguous.insert(c.value.clone());
            }
            false
        }
        _ => false,
    }
}

fn bare_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Identifier(id) => Some(id.value.as_str()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.as_str()),
        _ => None,
    }
}

fn is_qualified(expr: &Expr) -> bool {
    matches!(expr, Expr::CompoundIdentifier(_))
}

fn qualify(expr: &mut Expr, qualifier: &Ident) {
    if let Expr::Identifier(id) = expr {
        *expr = Expr::CompoundIdentifier(vec![qualifier.clone(), id.clone()]);
    }
}

/// Walk AND/OR chains, qualifying bare-name equalities whose two sides
/// share a bare column name (spec §4.1.3, steps 1-2).
fn qualify_equalities(
    expr: &mut Expr,
    preceding: Option<&Ident>,
    current: Option<&Ident>,
    ambiguous: &mut HashSet<String>,
) -> bool {
    use sqlparser::ast::BinaryOperator;

    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        }
        | Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => {
            let l = qualify_equalities(left, preceding, current, ambiguous);
            let r = qualify_equalities(right, preceding, current, ambiguous);
            l || r
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            let (Some(ln), Some(rn)) = (bare_name(left), bare_name(right)) else {
                return false;
            };
            if ln != rn {
                return false;
            }
            let name = ln.to_string();
            let (left_qualified, right_qualified) = (is_qualified(left), is_qualified(right));
            if left_qualified && right_qualified {
                return false;
            }
            if !left_qualified {
                if let Some(q) = preceding {
                    qualify(left, q);
                }
            }
            if !right_qualified {
                if let Some(q) = current {
                    qualify(right, q);
                }
            }
            ambiguous.insert(name);
            true
        }
        Expr::Nested(inner) => qualify_equalities(inner, preceding, current, ambiguous),
        _ => false,
    }
}

fn qualify_select_item(
    item: &mut SelectItem,
    ambiguous: &HashSet<String>,
    default_qualifier: Option<&Ident>,
) -> bool {
    match item {
        SelectItem::UnnamedExpr(expr) => qualify_ambiguous(expr, ambiguous, default_qualifier),
        SelectItem::ExprWithAlias { expr, .. } => {
            qualify_ambiguous(expr, ambiguous, default_qualifier)
        }
        _ => false,
    }
}

/// Default-qualify any bare reference to a name already known to be
/// ambiguous within this select's scope (spec §4.1.3, step 3).
fn qualify_ambiguous(
    expr: &mut Expr,
    ambiguous: &HashSet<String>,
    default_qualifier: Option<&Ident>,
) -> bool {
    let Some(default_qualifier) = default_qualifier else {
        return false;
    };

    if let Expr::Identifier(id) = expr {
        if ambiguous.contains(&id.value) {
            qualify(expr, default_qualifier);
            return true;
        }
        return false;
    }

    let mut modified = false;
    match expr {
        Expr::BinaryOp { left, right, .. } => {
            modified |= qualify_ambiguous(left, ambiguous, Some(default_qualifier));
            modified |= qualify_ambiguous(right, ambiguous, Some(default_qualifier));
        }
        Expr::UnaryOp { expr: inner, .. } | Expr::Nested(inner) => {
            modified |= qualify_ambiguous(inner, ambiguous, Some(default_qualifier));
        }
        Expr::InList { expr: inner, list, .. } => {
            modified |= qualify_ambiguous(inner, ambiguous, Some(default_qualifier));
            for item in list {
                modified |= qualify_ambiguous(item, ambiguous, Some(default_qualifier));
            }
        }
        Expr::Between { expr: inner, low, high, .. } => {
            modified |= qualify_ambiguous(inner, ambiguous, Some(default_qualifier));
            modified |= qualify_ambiguous(low, ambiguous, Some(default_qualifier));
            modified |= qualify_ambiguous(high, ambiguous, Some(default_qualifier));
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

    fn as_select(stmt: &mut Statement) -> &mut Select {
        let Statement::Query(query) = stmt else {
            panic!("expected a query")
        };
        let SetExpr::Select(select) = query.body.as_mut() else {
            panic!("expected a select")
        };
        select
    }

    #[test]
    fn qualifies_matching_bare_columns_in_on_clause() {
        let mut stmt =
            sql::parse_one(r#"SELECT * FROM "a" LEFT JOIN "b" ON "id" = "id""#).unwrap();
        let select = as_select(&mut stmt);
        let outcome = apply_select(select);
        assert!(outcome.modified);
        let rendered = sql::to_sql(&stmt);
        assert!(rendered.contains(r#""a"."id""#));
        assert!(rendered.contains(r#""b"."id""#));
    }

    #[test]
    fn leaves_single_source_selects_alone() {
        let mut stmt = sql::parse_one("SELECT * FROM t WHERE a = 1").unwrap();
        let select = as_select(&mut stmt);
        let outcome = apply_select(select);
        assert!(!outcome.modified);
    }

    #[test]
    fn leaves_already_qualified_joins_alone() {
        let mut stmt =
            sql::parse_one(r#"SELECT * FROM "a" LEFT JOIN "b" ON "a"."id" = "b"."id""#).unwrap();
        let select = as_select(&mut stmt);
        let outcome = apply_select(select);
        assert!(!outcome.modified);
    }
}
