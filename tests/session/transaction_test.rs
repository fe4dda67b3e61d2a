//! Nested transaction rollback (spec §8 scenario S6): an error raised
//! inside a nested `transaction()` call aborts the outer transaction too.

use duckpg::codec::Value;
use duckpg::config::Options;
use duckpg::error::DuckPgError;
use duckpg::Driver;

#[tokio::test]
async fn nested_transaction_failure_rolls_back_the_outer_transaction() {
    let driver = Driver::open(Options::new(":memory:"));
    let mut session = driver.session().await.unwrap();
    session.execute("CREATE TABLE t (id INTEGER)", &[]).await.unwrap();

    let result = session
        .transaction(|tx| async move {
            tx.execute("INSERT INTO t VALUES (?)", &[Value::Int(1)]).await?;

            tx.transaction(|nested| async move {
                nested.execute("INSERT INTO t VALUES (?)", &[Value::Int(2)]).await?;
                Err::<(), DuckPgError>(DuckPgError::NestedTransactionUnsupported)
            })
            .await
        })
        .await;

    assert!(result.is_err());

    let rows = session.all("SELECT id FROM t", &[]).await.unwrap();
    assert!(rows.is_empty(), "outer transaction should have rolled back: {rows:?}");
}

#[tokio::test]
async fn committed_transaction_is_visible_after_commit() {
    let driver = Driver::open(Options::new(":memory:"));
    let mut session = driver.session().await.unwrap();
    session.execute("CREATE TABLE t (id INTEGER)", &[]).await.unwrap();

    session
        .transaction(|tx| async move { tx.execute("INSERT INTO t VALUES (1)", &[]).await })
        .await
        .unwrap();

    let rows = session.all("SELECT id FROM t", &[]).await.unwrap();
    assert_eq!(rows, vec![vec![Value::Int(1)]]);
}
