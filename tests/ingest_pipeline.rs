//! Container-backed end-to-end tests for the ingestion pipeline:
//! dispatch into staging, per-source merge semantics, and the full
//! producers-to-production path.

use lexicon_ingest::config::IngestConfig;
use lexicon_ingest::ingest::{
    BulkDispatcher, EntryRecord, Etymology, IngestPipeline, MergeExecutor, SealedBatch,
    build_payload, freeze,
};
use lexicon_ingest::test_support::TestDatabase;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

fn plain_record(parent: i64, title: &str, sense: i32, source: &str) -> EntryRecord {
    EntryRecord::new(parent, title, format!("definition of {}", title), sense, source)
}

fn rich_record(parent: i64, title: &str, sense: i32, source: &str) -> EntryRecord {
    let mut record = plain_record(parent, title, sense, source);
    record.raw_fragment = format!("<entry>{}</entry>", title);
    record.push_alias(format!("{} (alias)", title));
    record.push_alias(format!("{} (archaic)", title));
    record.push_synonym("counterpart");
    record.push_example(format!("a sentence using {}", title));
    record.push_cross_reference("elsewhere", None);
    record.push_etymology(Etymology {
        text: "from Middle English".to_string(),
        language_code: "enm".to_string(),
        uncertain: false,
        reconstructed: false,
    });
    record
}

async fn dispatch_records(pool: &PgPool, records: Vec<EntryRecord>) {
    let dispatcher = BulkDispatcher::new(pool.clone());
    let frozen = freeze(&SealedBatch::new(records));
    let payload = build_payload(&frozen);
    dispatcher.dispatch(&payload).await.expect("dispatch succeeds");
}

async fn staged_entries(pool: &PgPool, source: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM staging_entries WHERE source_code = $1")
        .bind(source)
        .fetch_one(pool)
        .await
        .expect("staging count")
}

async fn production_entries(pool: &PgPool, source: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM dictionary_entries WHERE source_code = $1")
        .bind(source)
        .fetch_one(pool)
        .await
        .expect("production count")
}

#[tokio::test]
async fn dispatch_lands_payload_in_staging() {
    let test_db = TestDatabase::new().await.expect("provision test database");
    let pool = test_db.pool_clone();

    let dispatcher = BulkDispatcher::new(pool.clone());
    let frozen = freeze(&SealedBatch::new(vec![
        rich_record(1, "lantern", 1, "oed-html"),
        plain_record(2, "lattice", 1, "oed-html"),
    ]));
    let payload = build_payload(&frozen);
    let stats = dispatcher.dispatch(&payload).await.expect("dispatch succeeds");

    assert_eq!(stats.batches, 1);
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.aliases, 2);
    assert_eq!(stats.synonyms, 1);
    assert_eq!(stats.examples, 1);
    assert_eq!(stats.cross_references, 1);
    assert_eq!(stats.etymologies, 1);

    assert_eq!(staged_entries(&pool, "oed-html").await, 2);

    // Unspecified cross-reference kinds land as the generic tag.
    let kind: String =
        sqlx::query_scalar("SELECT ref_kind FROM staging_cross_references LIMIT 1")
            .fetch_one(&pool)
            .await
            .expect("ref kind");
    assert_eq!(kind, "see");

    // Absent optionals are SQL NULL, not empty strings.
    let null_refs: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM staging_entries WHERE foreign_text_ref IS NULL",
    )
    .fetch_one(&pool)
    .await
    .expect("null count");
    assert_eq!(null_refs, 2);

    // Staging admits duplicates across dispatches.
    dispatch_records(&pool, vec![plain_record(1, "lantern", 1, "oed-html")]).await;
    assert_eq!(staged_entries(&pool, "oed-html").await, 3);

    test_db.close().await;
}

#[tokio::test]
async fn merge_deduplicates_promotes_and_clears() {
    let test_db = TestDatabase::new().await.expect("provision test database");
    let pool = test_db.pool_clone();

    dispatch_records(&pool, vec![rich_record(1, "harbor", 1, "webster-json")]).await;
    dispatch_records(&pool, vec![rich_record(1, "harbor", 1, "webster-json")]).await;
    dispatch_records(&pool, vec![plain_record(9, "quay", 1, "webster-json")]).await;

    let report = MergeExecutor::new(pool.clone())
        .merge_source("webster-json")
        .await
        .expect("merge succeeds");

    assert_eq!(report.staged_total, 3);
    assert_eq!(report.unique_keys, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.cleared, 3);

    assert_eq!(production_entries(&pool, "webster-json").await, 2);
    assert_eq!(staged_entries(&pool, "webster-json").await, 0);

    // Children arrive once, from the selected representative only.
    let aliases: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM entry_aliases a
           JOIN dictionary_entries e ON e.id = a.entry_id
           WHERE e.normalized_key = 'harbor'"#,
    )
    .fetch_one(&pool)
    .await
    .expect("alias count");
    assert_eq!(aliases, 2);

    test_db.close().await;
}

#[tokio::test]
async fn merge_is_idempotent() {
    let test_db = TestDatabase::new().await.expect("provision test database");
    let pool = test_db.pool_clone();

    dispatch_records(
        &pool,
        vec![
            rich_record(1, "ember", 1, "oed-html"),
            plain_record(2, "ember", 2, "oed-html"),
        ],
    )
    .await;

    let executor = MergeExecutor::new(pool.clone());
    executor.merge_source("oed-html").await.expect("first merge");
    let after_first = production_entries(&pool, "oed-html").await;

    let second = executor.merge_source("oed-html").await.expect("second merge");
    assert_eq!(second.staged_total, 0);
    assert_eq!(second.inserted, 0);

    assert_eq!(production_entries(&pool, "oed-html").await, after_first);

    test_db.close().await;
}

#[tokio::test]
async fn merge_tie_break_prefers_latest_staged_row() {
    let test_db = TestDatabase::new().await.expect("provision test database");
    let pool = test_db.pool_clone();

    let mut stale = plain_record(1, "mill", 1, "grimm-flat");
    stale.definition = "stale definition".to_string();
    let mut fresh = plain_record(1, "mill", 1, "grimm-flat");
    fresh.definition = "fresh definition".to_string();

    dispatch_records(&pool, vec![stale]).await;
    dispatch_records(&pool, vec![fresh]).await;

    // Make the ordering unambiguous regardless of clock resolution.
    sqlx::query(
        "UPDATE staging_entries SET created_at = NOW() - INTERVAL '1 hour' WHERE definition = 'stale definition'",
    )
    .execute(&pool)
    .await
    .expect("age stale row");

    MergeExecutor::new(pool.clone())
        .merge_source("grimm-flat")
        .await
        .expect("merge succeeds");

    let definition: String = sqlx::query_scalar(
        "SELECT definition FROM dictionary_entries WHERE source_code = 'grimm-flat' AND normalized_key = 'mill'",
    )
    .fetch_one(&pool)
    .await
    .expect("promoted definition");
    assert_eq!(definition, "fresh definition");

    test_db.close().await;
}

#[tokio::test]
async fn failed_merge_preserves_staging_and_production() {
    let test_db = TestDatabase::new().await.expect("provision test database");
    let pool = test_db.pool_clone();

    dispatch_records(&pool, vec![rich_record(1, "fjord", 1, "norse-json")]).await;

    // Break child promotion mid-transaction; the whole merge must roll back.
    sqlx::query("ALTER TABLE entry_aliases RENAME TO entry_aliases_hidden")
        .execute(&pool)
        .await
        .expect("hide child table");

    let executor = MergeExecutor::new(pool.clone());
    assert!(executor.merge_source("norse-json").await.is_none());

    assert_eq!(staged_entries(&pool, "norse-json").await, 1);
    assert_eq!(production_entries(&pool, "norse-json").await, 0);

    sqlx::query("ALTER TABLE entry_aliases_hidden RENAME TO entry_aliases")
        .execute(&pool)
        .await
        .expect("restore child table");

    // Staging survived intact, so the re-run completes the merge.
    let report = executor.merge_source("norse-json").await.expect("re-run succeeds");
    assert_eq!(report.inserted, 1);
    assert_eq!(production_entries(&pool, "norse-json").await, 1);
    assert_eq!(staged_entries(&pool, "norse-json").await, 0);

    test_db.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_end_to_end() {
    let test_db = TestDatabase::new().await.expect("provision test database");
    let pool = test_db.pool_clone();

    let pipeline = IngestPipeline::new(pool.clone(), IngestConfig::new(10, 2));
    let cancel = CancellationToken::new();
    let workers = pipeline.spawn_workers(&cancel);

    let producers: Vec<_> = (0..3i64)
        .map(|producer| {
            let collector = pipeline.collector();
            std::thread::spawn(move || {
                for i in 0..4i64 {
                    let title = format!("word-{}-{}", producer, i);
                    let mut record = plain_record(producer * 100 + i, &title, 1, "wiki-dump");
                    record.push_alias("spelling variant");
                    collector.add(record);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer thread");
    }

    let stats = pipeline.run_to_completion(workers, &cancel).await;
    assert_eq!(stats.entries, 12);
    assert_eq!(stats.aliases, 12);
    assert_eq!(stats.failures, 0);

    let reports = MergeExecutor::new(pool.clone())
        .merge_sources(&["wiki-dump".to_string()], &cancel)
        .await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].staged_total, 12);
    assert_eq!(reports[0].inserted, 12);

    assert_eq!(production_entries(&pool, "wiki-dump").await, 12);
    assert_eq!(staged_entries(&pool, "wiki-dump").await, 0);

    test_db.close().await;
}
