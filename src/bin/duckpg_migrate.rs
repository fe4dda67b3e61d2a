//! CLI front-end for the migration driver (SPEC_FULL.md §0): applies a
//! folder of drizzle-orm-style migrations to a DuckDB/MotherDuck target.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use duckpg::config::Options;
use duckpg::migrate::{migrate_from_folder, MigrationConfig};
use duckpg::Driver;

/// Apply pending DuckDB migrations from a drizzle-orm-style journal folder.
#[derive(Parser, Debug)]
#[command(name = "duckpg-migrate", version, about)]
struct Cli {
    /// Database path: a file path, `:memory:`, or `md:<database>`.
    #[arg(long)]
    database: String,

    /// MotherDuck token, required when `--database` starts with `md:`.
    #[arg(long, env = "MOTHERDUCK_TOKEN")]
    motherduck_token: Option<String>,

    /// Folder containing `meta/_journal.json` and the migration `.sql` files.
    #[arg(long)]
    migrations: PathBuf,

    /// Metadata schema name (spec §4.5 default "drizzle").
    #[arg(long, default_value = "drizzle")]
    schema: String,

    /// Metadata table name (spec §4.5 default "__drizzle_migrations").
    #[arg(long, default_value = "__drizzle_migrations")]
    table: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut options = Options::new(cli.database);
    if let Some(token) = cli.motherduck_token {
        options.motherduck_token = Some(token);
    }

    let driver = Driver::open(options);
    let mut session = match driver.session().await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "failed to open a session");
            return ExitCode::FAILURE;
        }
    };

    let config = MigrationConfig::new(cli.schema, cli.table);
    match migrate_from_folder(&mut session, &config, cli.migrations).await {
        Ok(applied) => {
            tracing::info!(applied, "migrations applied");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "migration run failed");
            ExitCode::FAILURE
        }
    }
}
