//! Stage 2 (spec §4.1.2): set-operation WITH hoisting.
//!
//! DuckDB's binder rejects per-arm `WITH` clauses on some set-operation
//! shapes that PostgreSQL accepts; when it's safe (no name collisions)
//! every arm's CTEs are merged onto the query's own `WITH` and cleared from
//! the arms.

use std::collections::HashSet;

use sqlparser::ast::{Query, SetExpr, With};

/// Run stage 2 on one query. Only touches `query.with` / the arms reachable
/// through `query.body`; does not recurse into nested queries — the caller
/// (`rewrites::walk_query`) applies this at every query level it visits.
pub fn apply(query: &mut Query) -> bool {
    let mut arms = Vec::new();
    collect_arms(&mut query.body, &mut arms);
    if arms.len() < 2 {
        return false;
    }

    let mut seen = HashSet::new();
    let mut has_any_with = false;
    for arm in arms.iter_mut() {
        if let Some(with) = arm_with(arm) {
            has_any_with = true;
            for cte in &with.cte_tables {
                if !seen.insert(cte.alias.name.value.clone()) {
                    // Name collision across arms: leave the tree alone.
                    return false;
                }
            }
        }
    }
    if !has_any_with {
        return false;
    }

    // Preserve whatever shape `With` carries in this sqlparser version by
    // cloning an existing instance and only replacing `cte_tables`, rather
    // than constructing one field-by-field.
    let mut template: Option<With> = query.with.clone();
    let mut merged = template
        .as_ref()
        .map(|w| w.cte_tables.clone())
        .unwrap_or_default();

    for arm in arms.iter_mut() {
        if let Some(with_slot) = arm_with(arm) {
            if let Some(w) = with_slot.take() {
                if template.is_none() {
                    template = Some(w.clone());
                }
                merged.extend(w.cte_tables);
            }
        }
    }

    let Some(mut with) = template else {
        return false;
    };
    with.cte_tables = merged;
    query.with = Some(with);

    true
}

fn collect_arms<'a>(expr: &'a mut SetExpr, arms: &mut Vec<&'a mut SetExpr>) {
    match expr {
        SetExpr::SetOperation { left, right, .. } => {
            collect_arms(left, arms);
            collect_arms(right, arms);
        }
        other => arms.push(other),
    }
}

fn arm_with(arm: &mut SetExpr) -> Option<&mut Option<With>> {
    match arm {
        SetExpr::Query(q) => Some(&mut q.with),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql;
    use sqlparser::ast::Statement;

    fn as_query(stmt: &mut Statement) -> &mut Query {
        match stmt {
            Statement::Query(q) => q,
            _ => panic!("expected a query"),
        }
    }

    #[test]
    fn hoists_ctes_from_non_first_arm() {
        let mut stmt = sql::parse_one(
            "(WITH x AS (SELECT 1) SELECT * FROM x) UNION (WITH y AS (SELECT 2) SELECT * FROM y)",
        )
        .unwrap();
        let query = as_query(&mut stmt);
        assert!(apply(query));
        assert!(query.with.is_some());
        assert_eq!(query.with.as_ref().unwrap().cte_tables.len(), 2);

        let mut arms = Vec::new();
        collect_arms(&mut query.body, &mut arms);
        for arm in arms {
            if let Some(with) = arm_with(arm) {
                assert!(with.is_none());
            }
        }
    }

    #[test]
    fn aborts_on_name_collision() {
        let mut stmt = sql::parse_one(
            "(WITH x AS (SELECT 1) SELECT * FROM x) UNION (WITH x AS (SELECT 2) SELECT * FROM x)",
        )
        .unwrap();
        let query = as_query(&mut stmt);
        assert!(!apply(query));
    }

    #[test]
    fn no_op_without_set_operation() {
        let mut stmt = sql::parse_one("WITH x AS (SELECT 1) SELECT * FROM x").unwrap();
        let query = as_query(&mut stmt);
        assert!(!apply(query));
    }
}
