//! Migration driver (spec §4.5): journal-driven, hash-tracked,
//! transactional application of pending migration scripts.
//!
//! File layout follows drizzle-orm's on-disk journal format, which is what
//! spec §6 "Migration files on disk" describes: a `meta/_journal.json`
//! listing ordered entries (`{ idx, version, when, tag, breakpoints }`) and
//! one `<tag>.sql` file per entry, with individual statements separated by
//! a `-- statement-breakpoint` marker line.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{DuckPgError, DuckPgResult};
use crate::session::Session;

const STATEMENT_BREAKPOINT: &str = "-- statement-breakpoint";
const DEFAULT_SCHEMA: &str = "drizzle";
const DEFAULT_TABLE: &str = "__drizzle_migrations";

/// One migration loaded from disk, ready to apply.
#[derive(Debug, Clone)]
pub struct Migration {
    /// The journal entry's `tag`, used only for diagnostics.
    pub name: String,
    /// The journal entry's `when` field — the "folderMillis" spec §4.5
    /// refers to, used to order and to filter against the max applied so
    /// far.
    pub folder_millis: i64,
    /// SHA-256 hex digest of the migration file's full text, recorded in
    /// the metadata table so re-running `migrate()` is a no-op.
    pub hash: String,
    /// Individual statements, split on `-- statement-breakpoint`.
    pub statements: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    entries: Vec<JournalEntry>,
}

#[derive(Debug, Deserialize)]
struct JournalEntry {
    tag: String,
    when: i64,
}

/// Where the metadata schema/table/sequence live (spec §4.5 "default name
/// `drizzle`").
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub schema: String,
    pub table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self { schema: schema.into(), table: table.into() }
    }

    fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    fn sequence_name(&self) -> String {
        format!("{}.{}_id_seq", self.schema, self.table)
    }

    /// Legacy alias (spec §4.5, design note resolved in DESIGN.md): only
    /// emitted when this config is the default table, matching the
    /// original driver's compatibility shim for migrations generated
    /// before the sequence was schema-qualified.
    fn legacy_sequence_alias(&self) -> Option<String> {
        (self.table == DEFAULT_TABLE).then(|| format!("{}.__drizzle_migrations_id_seq", self.schema))
    }
}

/// Read `meta/_journal.json` under `folder` and each entry's `<tag>.sql`
/// file, in journal order.
pub fn load_migrations(folder: &Path) -> DuckPgResult<Vec<Migration>> {
    let journal_path = folder.join("meta").join("_journal.json");
    let journal_text = std::fs::read_to_string(&journal_path).map_err(|source| DuckPgError::MigrationIo {
        path: journal_path.display().to_string(),
        source,
    })?;
    let journal: Journal = serde_json::from_str(&journal_text).map_err(|e| DuckPgError::MigrationIo {
        path: journal_path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    journal
        .entries
        .into_iter()
        .map(|entry| load_one(folder, entry))
        .collect()
}

fn load_one(folder: &Path, entry: JournalEntry) -> DuckPgResult<Migration> {
    let sql_path = folder.join(format!("{}.sql", entry.tag));
    let text = std::fs::read_to_string(&sql_path).map_err(|source| DuckPgError::MigrationIo {
        path: sql_path.display().to_string(),
        source,
    })?;

    Ok(Migration {
        name: entry.tag,
        folder_millis: entry.when,
        hash: hash_migration(&text),
        statements: split_statements(&text),
    })
}

fn hash_migration(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)
}

fn split_statements(text: &str) -> Vec<String> {
    text.lines()
        .fold(vec![String::new()], |mut acc, line| {
            if line.trim() == STATEMENT_BREAKPOINT {
                acc.push(String::new());
            } else {
                let current = acc.last_mut().expect("always at least one buffer");
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(line);
            }
            acc
        })
        .into_iter()
        .map(|stmt| stmt.trim().to_string())
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

fn ensure_metadata_ddl(config: &MigrationConfig) -> Vec<String> {
    let mut statements = vec![
        format!("CREATE SCHEMA IF NOT EXISTS {}", config.schema),
        format!("CREATE SEQUENCE IF NOT EXISTS {}", config.sequence_name()),
    ];
    if let Some(alias) = config.legacy_sequence_alias() {
        statements.push(format!("CREATE SEQUENCE IF NOT EXISTS {alias}"));
    }
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY DEFAULT nextval('{}'), hash TEXT NOT NULL, created_at BIGINT)",
        config.qualified_table(),
        config.sequence_name(),
    ));
    statements
}

/// Apply every migration in `migrations` whose `folder_millis` exceeds the
/// most recently recorded `created_at`, in order, inside one transaction
/// (spec §4.5, invariant 6: re-running is idempotent).
pub async fn migrate(
    session: &mut Session,
    config: &MigrationConfig,
    migrations: &[Migration],
) -> DuckPgResult<u32> {
    for stmt in ensure_metadata_ddl(config) {
        session.execute(&stmt, &[]).await?;
    }

    let max_applied = latest_applied_millis(session, config).await?;
    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| m.folder_millis > max_applied)
        .collect();

    if pending.is_empty() {
        return Ok(0);
    }

    let table = config.qualified_table();
    let applied = session
        .transaction(|tx| {
            let table = table.clone();
            let pending = pending.clone();
            async move {
                for migration in &pending {
                    for stmt in &migration.statements {
                        tx.execute(stmt, &[]).await.map_err(|e| DuckPgError::Migration {
                            name: migration.name.clone(),
                            source: Box::new(e),
                        })?;
                    }
                    tx.execute(
                        &format!("INSERT INTO {table} (hash, created_at) VALUES (?, ?)"),
                        &[
                            crate::codec::Value::Text(migration.hash.clone()),
                            crate::codec::Value::Int(migration.folder_millis),
                        ],
                    )
                    .await
                    .map_err(|e| DuckPgError::Migration {
                        name: migration.name.clone(),
                        source: Box::new(e),
                    })?;
                }
                Ok(pending.len() as u32)
            }
        })
        .await?;

    Ok(applied)
}

async fn latest_applied_millis(session: &mut Session, config: &MigrationConfig) -> DuckPgResult<i64> {
    let rows = session
        .all(
            &format!(
                "SELECT created_at FROM {} ORDER BY created_at DESC LIMIT 1",
                config.qualified_table()
            ),
            &[],
        )
        .await?;

    Ok(match rows.into_iter().next().and_then(|mut row| row.pop()) {
        Some(crate::codec::Value::Int(millis)) => millis,
        _ => i64::MIN,
    })
}

/// Convenience wrapper combining [`load_migrations`] and [`migrate`].
pub async fn migrate_from_folder(
    session: &mut Session,
    config: &MigrationConfig,
    folder: impl Into<PathBuf>,
) -> DuckPgResult<u32> {
    let migrations = load_migrations(&folder.into())?;
    migrate(session, config, &migrations).await
}
