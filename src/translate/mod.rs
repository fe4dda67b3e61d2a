//! SQL dialect translation pipeline (spec §4.1): parse, rewrite, re-print,
//! cached.

mod cache;
mod rewrites;

use cache::{TranslationCache, TranslationEntry};

use crate::config::RewriteArraysMode;
use crate::sql;

/// Tokens whose presence makes a rewrite possible. The prefilter in
/// [`needs_translation`] may over-approximate (false positives just cost a
/// wasted parse) but must never under-approximate.
const TRIGGER_TOKENS: &[&str] = &[
    "@>",
    "<@",
    "&&",
    "JOIN",
    "UNION",
    "INTERSECT",
    "EXCEPT",
    "generate_series",
];

/// Cheap substring prefilter (spec §4.1).
pub fn needs_translation(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    TRIGGER_TOKENS.iter().any(|tok| {
        if tok.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
            upper.contains(&tok.to_uppercase())
        } else {
            sql.contains(tok)
        }
    })
}

/// Result of translating one statement.
pub struct Translated {
    pub sql: String,
    pub modified: bool,
}

/// The translation pipeline, with its cache and the `rewrite_arrays` gate
/// from spec §6.
pub struct Translator {
    cache: TranslationCache,
    rewrite_arrays: RewriteArraysMode,
}

impl Translator {
    pub fn new(cache_capacity: usize, rewrite_arrays: RewriteArraysMode) -> Self {
        Self {
            cache: TranslationCache::new(cache_capacity),
            rewrite_arrays,
        }
    }

    /// `translate(sql) -> (sql', modified)` (spec §4.1). Pure, thread-safe,
    /// bounded-LRU-cached. On parse failure returns the input unchanged
    /// with `modified = false` — it never raises.
    pub fn translate(&self, sql_text: &str) -> Translated {
        if let Some(entry) = self.cache.get(sql_text) {
            return Translated {
                sql: entry.rewritten,
                modified: entry.modified,
            };
        }

        let should_attempt = match self.rewrite_arrays {
            RewriteArraysMode::Never => contains_non_array_trigger(sql_text),
            RewriteArraysMode::Always => true,
            RewriteArraysMode::Auto => needs_translation(sql_text),
        };

        if !should_attempt {
            return Translated {
                sql: sql_text.to_string(),
                modified: false,
            };
        }

        let Ok(mut stmt) = sql::parse_one(sql_text) else {
            return Translated {
                sql: sql_text.to_string(),
                modified: false,
            };
        };

        let rewrite_array_ops = !matches!(self.rewrite_arrays, RewriteArraysMode::Never);
        let modified = rewrites::apply_with_options(&mut stmt, rewrite_array_ops);
        let rewritten = if modified {
            sql::to_sql(&stmt)
        } else {
            sql_text.to_string()
        };

        if modified {
            self.cache.record(
                sql_text.to_string(),
                TranslationEntry {
                    rewritten: rewritten.clone(),
                    modified: true,
                },
            );
        }

        Translated {
            sql: rewritten,
            modified,
        }
    }
}

/// Whether `sql_text` needs translation for reasons other than the array
/// operators (used when `rewrite_arrays = never` still needs the other
/// three stages to run).
fn contains_non_array_trigger(sql_text: &str) -> bool {
    const NON_ARRAY_TOKENS: &[&str] = &["JOIN", "UNION", "INTERSECT", "EXCEPT", "generate_series"];
    let upper = sql_text.to_uppercase();
    NON_ARRAY_TOKENS
        .iter()
        .any(|tok| upper.contains(&tok.to_uppercase()))
}
