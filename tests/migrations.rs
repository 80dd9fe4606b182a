use lexicon_ingest::test_support::TestDatabase;
use sqlx::migrate::Migrator;

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn table_count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .expect("lookup succeeded")
}

#[tokio::test]
async fn migrations_apply_and_revert_cleanly() {
    let test_db = TestDatabase::new().await.expect("provision test database");
    let pool = test_db.pool_clone();

    TEST_MIGRATOR.run(&pool).await.expect("migrations rerun");

    TEST_MIGRATOR
        .undo(&pool, 0)
        .await
        .expect("migrations revert");

    assert_eq!(
        table_count(&pool, "staging_entries").await,
        0,
        "staging_entries should be dropped after revert"
    );
    assert_eq!(table_count(&pool, "dictionary_entries").await, 0);

    TEST_MIGRATOR.run(&pool).await.expect("migrations reapply");

    assert_eq!(table_count(&pool, "staging_entries").await, 1);
    assert_eq!(table_count(&pool, "dictionary_entries").await, 1);
    assert_eq!(table_count(&pool, "entry_etymologies").await, 1);

    test_db.close().await;
}
