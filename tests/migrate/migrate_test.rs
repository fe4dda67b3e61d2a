//! Migration driver idempotence (spec §8 invariant 6): running `migrate`
//! twice over the same folder applies everything once and nothing the
//! second time.

use std::fs;
use std::path::Path;

use duckpg::config::Options;
use duckpg::migrate::{migrate_from_folder, MigrationConfig};
use duckpg::Driver;

fn write_fixture(root: &Path) {
    fs::create_dir_all(root.join("meta")).unwrap();
    fs::write(
        root.join("meta").join("_journal.json"),
        r#"{
            "entries": [
                { "idx": 0, "version": "1", "when": 1000, "tag": "0000_init" },
                { "idx": 1, "version": "1", "when": 2000, "tag": "0001_add_column" }
            ]
        }"#,
    )
    .unwrap();
    fs::write(
        root.join("0000_init.sql"),
        "CREATE TABLE widgets (id INTEGER, name TEXT);\n-- statement-breakpoint\nINSERT INTO widgets VALUES (1, 'a');",
    )
    .unwrap();
    fs::write(
        root.join("0001_add_column.sql"),
        "ALTER TABLE widgets ADD COLUMN qty INTEGER DEFAULT 0;",
    )
    .unwrap();
}

#[tokio::test]
async fn running_migrate_twice_applies_nothing_the_second_time() {
    let folder = std::env::temp_dir().join(format!("duckpg_migrate_test_{}", std::process::id()));
    let _ = fs::remove_dir_all(&folder);
    write_fixture(&folder);

    let driver = Driver::open(Options::new(":memory:"));
    let mut session = driver.session().await.unwrap();
    let config = MigrationConfig::default();

    let first = migrate_from_folder(&mut session, &config, folder.clone()).await.unwrap();
    assert_eq!(first, 2);

    let second = migrate_from_folder(&mut session, &config, folder.clone()).await.unwrap();
    assert_eq!(second, 0);

    let rows = session.all("SELECT id, qty FROM widgets", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);

    fs::remove_dir_all(&folder).ok();
}
