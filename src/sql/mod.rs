//! Parser facade (spec §2, §4.1): text → AST and AST → text, nothing more.
//!
//! This is deliberately thin. All dialect-specific SQL *generation* lives in
//! the `translate` module's rewrite pipeline; this module only owns the
//! parse/print boundary so the rest of the crate never touches `sqlparser`
//! directly.

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::{Parser, ParserError};

/// Parse a single PostgreSQL-dialect SQL statement.
///
/// Returns an error if the input does not parse as exactly one statement;
/// callers that need the "swallow parse errors" behavior of spec §4.1 handle
/// that at the `translate` layer, not here — this facade reports failure
/// honestly.
pub fn parse_one(sql: &str) -> Result<Statement, ParserError> {
    let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)?;
    match statements.len() {
        1 => Ok(statements.remove(0)),
        0 => Err(ParserError::ParserError("empty statement".to_string())),
        _ => Err(ParserError::ParserError(
            "expected exactly one statement".to_string(),
        )),
    }
}

/// Re-serialize a statement back to SQL text.
///
/// `sqlparser`'s AST nodes already implement `Display` with a faithful
/// text rendering, so printing is just that.
pub fn to_sql(stmt: &Statement) -> String {
    stmt.to_string()
}
