//! End-to-end tests of the core operations against a real SQLite file.

use std::collections::HashSet;
use std::time::Duration;

use nlq_engine::config::Config;
use nlq_engine::models::{IngestJob, QueryPayload, RawFile, Route, SearchHit};
use nlq_engine::service::QueryService;
use nlq_engine::{db, migrate};
use serde_json::json;
use tempfile::TempDir;

async fn setup_with(demo: bool, configure: impl FnOnce(&mut Config)) -> (TempDir, QueryService) {
    let tmp = TempDir::new().unwrap();
    let mut cfg = Config::minimal(tmp.path().join("data/nlq.sqlite"));
    configure(&mut cfg);

    let pool = db::connect(&cfg).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    if demo {
        migrate::seed_demo_dataset(&pool).await.unwrap();
    }
    let service = QueryService::with_pool(pool, &cfg).await.unwrap();
    (tmp, service)
}

async fn setup(demo: bool) -> (TempDir, QueryService) {
    setup_with(demo, |_| {}).await
}

async fn wait_for_job(service: &QueryService, job_id: &str) -> IngestJob {
    for _ in 0..400 {
        let job = service.ingestion_status(job_id).expect("job registered");
        if job.done {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("ingestion job {} did not finish", job_id);
}

async fn ingest(service: &QueryService, files: Vec<RawFile>) -> IngestJob {
    let job_id = service.start_ingestion(files);
    wait_for_job(service, &job_id).await
}

fn hits(payload: &QueryPayload) -> &[SearchHit] {
    match payload {
        QueryPayload::Documents(hits) => hits,
        other => panic!("expected document hits, got {:?}", other),
    }
}

fn rows(payload: &QueryPayload) -> &[serde_json::Map<String, serde_json::Value>] {
    match payload {
        QueryPayload::Rows(rows) => rows,
        other => panic!("expected rows, got {:?}", other),
    }
}

#[tokio::test]
async fn ingested_terms_are_searchable() {
    let (_tmp, service) = setup(false).await;
    let job = ingest(&service, vec![RawFile::new("alice.txt", "Python Engineer NY")]).await;
    assert_eq!(job.processed, 1);
    assert_eq!(job.failed, 0);

    for term in ["engineer", "PYTHON", "ny"] {
        let result = service.run_query(term).await;
        let found = hits(&result.results);
        assert_eq!(found.len(), 1, "term {} not indexed", term);
        assert_eq!(found[0].doc_name, "alice.txt");
        assert_eq!(found[0].snippet, "Python Engineer NY");
        assert_eq!(found[0].score, 1);
    }
}

#[tokio::test]
async fn ranks_by_distinct_term_overlap() {
    let (_tmp, service) = setup(false).await;
    ingest(
        &service,
        vec![
            RawFile::new("one.txt", "Rust and more rust, rust everywhere"),
            RawFile::new("none.txt", "Java only"),
            RawFile::new("three.txt", "Rust\nPython\nSQL"),
        ],
    )
    .await;

    let result = service.run_query("rust python sql").await;
    assert_eq!(result.route, Route::Hybrid);
    let found = hits(&result.results);
    let names: Vec<&str> = found.iter().map(|h| h.doc_name.as_str()).collect();
    assert_eq!(names, vec!["three.txt", "one.txt"]);
    assert_eq!(found[0].score, 3);
    assert_eq!(found[1].score, 1);
    assert_eq!(found[0].snippet, "Rust Python SQL");
}

#[tokio::test]
async fn ties_keep_ingestion_order_and_respect_top_k() {
    let (_tmp, service) = setup(false).await;
    let files: Vec<RawFile> = (0..7)
        .map(|i| RawFile::new(format!("doc{}.txt", i), "kubernetes operator"))
        .collect();
    ingest(&service, files).await;

    let result = service.run_query("kubernetes").await;
    let names: Vec<&str> = hits(&result.results)
        .iter()
        .map(|h| h.doc_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["doc0.txt", "doc1.txt", "doc2.txt", "doc3.txt", "doc4.txt"]
    );
}

#[tokio::test]
async fn text_route_for_resume_queries() {
    let (_tmp, service) = setup(false).await;
    ingest(
        &service,
        vec![
            RawFile::new("bob.txt", "Go developer"),
            RawFile::new("carol.txt", "Python data scientist"),
        ],
    )
    .await;

    let result = service.run_query("Find resumes with Python skill").await;
    assert_eq!(result.route, Route::Text);
    assert!(result.sql.is_none());
    let found = hits(&result.results);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].doc_name, "carol.txt");
}

#[tokio::test]
async fn punctuation_only_query_returns_no_hits() {
    let (_tmp, service) = setup(false).await;
    ingest(&service, vec![RawFile::new("a.txt", "anything")]).await;

    let result = service.run_query("?!").await;
    assert!(hits(&result.results).is_empty());
}

#[tokio::test]
async fn structured_count_all() {
    let (_tmp, service) = setup(true).await;

    let result = service.run_query("How many employees do we have?").await;
    assert_eq!(result.route, Route::Structured);
    assert_eq!(
        result.sql.as_deref(),
        Some("SELECT COUNT(*) AS total FROM employees")
    );
    assert_eq!(rows(&result.results)[0]["total"], json!(5));
}

#[tokio::test]
async fn structured_top_n_highest_paid() {
    let (_tmp, service) = setup(true).await;

    let result = service.run_query("Top 3 highest paid employees").await;
    let found = rows(&result.results);
    assert_eq!(found.len(), 3);
    assert_eq!(found[0]["full_name"], json!("Charlie Lee"));
    assert_eq!(found[0]["annual_salary"], json!(130000.0));
    assert_eq!(found[1]["full_name"], json!("Alice Johnson"));
    assert_eq!(found[2]["full_name"], json!("Diana Prince"));
}

#[tokio::test]
async fn structured_average_by_department() {
    let (_tmp, service) = setup(true).await;

    let result = service.run_query("Average salary by department").await;
    let found = rows(&result.results);
    assert_eq!(found.len(), 3);
    let engineering = found
        .iter()
        .find(|r| r["dept_name"] == json!("Engineering"))
        .expect("engineering row");
    let avg = engineering["avg_salary"].as_f64().unwrap();
    assert!((avg - 101_666.666).abs() < 1.0, "avg was {}", avg);
}

#[tokio::test]
async fn unmatched_structured_query_lists_employees() {
    let (_tmp, service) = setup(true).await;

    let result = service.run_query("employees in the NY office").await;
    assert_eq!(result.route, Route::Structured);
    assert_eq!(rows(&result.results).len(), 5);
}

#[tokio::test]
async fn second_identical_query_is_cache_hit() {
    let (_tmp, service) = setup(true).await;

    let first = service.run_query("How many employees do we have?").await;
    let second = service.run_query("How many employees do we have?").await;
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.results, second.results);
    assert_eq!(first.route, second.route);
    assert_eq!(first.sql, second.sql);

    // Whitespace and case differences share the entry.
    let third = service.run_query("how many   EMPLOYEES do we have?").await;
    assert!(third.cached);
    assert_eq!(service.engine().cache().len(), 1);
}

#[tokio::test]
async fn execution_error_is_captured_not_cached() {
    let (_tmp, service) = setup(false).await;

    let first = service.run_query("How many employees do we have?").await;
    match &first.results {
        QueryPayload::Error { error } => assert!(error.contains("no such table"), "{}", error),
        other => panic!("expected error payload, got {:?}", other),
    }
    let second = service.run_query("How many employees do we have?").await;
    assert!(!second.cached);
    assert!(service.engine().cache().is_empty());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let (_tmp, service) = setup(false).await;
    assert!(service.ingestion_status("no-such-job").is_none());
}

#[tokio::test]
async fn job_progress_is_monotonic() {
    let (_tmp, service) = setup(false).await;
    let files: Vec<RawFile> = (0..20)
        .map(|i| RawFile::new(format!("f{}.txt", i), format!("document number {}", i)))
        .collect();

    let job_id = service.start_ingestion(files);
    let mut last_processed = 0;
    loop {
        let job = service.ingestion_status(&job_id).unwrap();
        assert_eq!(job.total, 20);
        assert!(job.processed >= last_processed);
        assert!(job.processed <= job.total);
        if job.done {
            assert_eq!(job.processed, job.total);
            break;
        }
        last_processed = job.processed;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn empty_batch_completes() {
    let (_tmp, service) = setup(false).await;
    let job = ingest(&service, Vec::new()).await;
    assert_eq!(job.total, 0);
    assert_eq!(job.processed, 0);
    assert!(job.done);
}

#[tokio::test]
async fn concurrent_batches_do_not_collide() {
    let (_tmp, service) = setup_with(false, |cfg| cfg.search.top_k = 100).await;

    let job_ids: Vec<String> = (0..4)
        .map(|batch| {
            let files = (0..5)
                .map(|i| RawFile::new(format!("b{}-{}.txt", batch, i), "shared corpus text"))
                .collect();
            service.start_ingestion(files)
        })
        .collect();

    for job_id in &job_ids {
        let job = wait_for_job(&service, job_id).await;
        assert_eq!(job.processed, 5);
        assert_eq!(job.failed, 0);
    }

    let result = service.run_query("shared").await;
    let found = hits(&result.results);
    assert_eq!(found.len(), 20);
    let ids: HashSet<&str> = found.iter().map(|h| h.doc_id.as_str()).collect();
    assert_eq!(ids.len(), 20);
}

#[tokio::test]
async fn csv_content_column_is_indexed() {
    let (_tmp, service) = setup(false).await;
    let csv = "candidate,content\nzelda,Rust systems programmer\nyuri,\n";
    ingest(&service, vec![RawFile::new("candidates.csv", csv)]).await;

    assert_eq!(hits(&service.run_query("programmer").await.results).len(), 1);
    assert!(hits(&service.run_query("zelda").await.results).is_empty());
}

#[tokio::test]
async fn invalid_utf8_is_still_ingested() {
    let (_tmp, service) = setup(false).await;
    let job = ingest(
        &service,
        vec![RawFile::new("latin.txt", b"caf\xe9 barista".to_vec())],
    )
    .await;
    assert_eq!(job.failed, 0);

    let result = service.run_query("barista").await;
    let found = hits(&result.results);
    assert_eq!(found.len(), 1);

    let doc = service
        .get_document(&found[0].doc_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.content, "caf barista");
    assert_eq!(doc.name, "latin.txt");
}

#[tokio::test]
async fn schema_snapshot_of_demo_dataset() {
    let (_tmp, service) = setup(true).await;
    let schema = service.schema_snapshot();

    let names: Vec<&str> = schema.tables.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["departments", "employees"]);

    let employees = &schema.tables["employees"];
    assert_eq!(employees.columns.len(), 7);
    assert_eq!(employees.columns[0].name, "emp_id");
    assert_eq!(employees.columns[4].declared_type, "REAL");
    assert_eq!(employees.sample.len(), 3);
    assert_eq!(employees.sample[0]["full_name"], json!("Alice Johnson"));
    let refs: Vec<(&str, &str)> = employees
        .relationships
        .iter()
        .map(|r| (r.column.as_str(), r.likely_ref_table.as_str()))
        .collect();
    assert_eq!(refs, vec![("dept_id", "dept")]);

    let departments = &schema.tables["departments"];
    assert_eq!(departments.sample.len(), 3);
    let refs: Vec<(&str, &str)> = departments
        .relationships
        .iter()
        .map(|r| (r.column.as_str(), r.likely_ref_table.as_str()))
        .collect();
    assert_eq!(refs, vec![("manager_id", "manager")]);
}

#[tokio::test]
async fn schema_is_empty_without_user_tables() {
    let (_tmp, service) = setup(false).await;
    assert!(service.schema_snapshot().tables.is_empty());
}

#[tokio::test]
async fn unreadable_table_keeps_columns_with_empty_sample() {
    let tmp = TempDir::new().unwrap();
    let cfg = Config::minimal(tmp.path().join("data/nlq.sqlite"));

    let pool = db::connect(&cfg).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    migrate::seed_demo_dataset(&pool).await.unwrap();
    {
        // Redeclare a table with a generated column that fails on its
        // stored value, so every `SELECT *` against it errors.
        let mut conn = pool.acquire().await.unwrap();
        for sql in [
            "CREATE TABLE broken (a TEXT)",
            "INSERT INTO broken VALUES ('{bad')",
            "PRAGMA writable_schema = ON",
            "UPDATE sqlite_master SET sql = 'CREATE TABLE broken (a TEXT, b AS (json(a)) VIRTUAL)' \
             WHERE type = 'table' AND name = 'broken'",
            "PRAGMA writable_schema = OFF",
        ] {
            sqlx::query(sql).execute(&mut *conn).await.unwrap();
        }
    }
    pool.close().await;

    let pool = db::connect(&cfg).await.unwrap();
    assert!(sqlx::query("SELECT * FROM broken")
        .fetch_all(&pool)
        .await
        .is_err());

    let schema = nlq_engine::schema::analyze(&pool).await.unwrap();
    let names: Vec<&str> = schema.tables.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["broken", "departments", "employees"]);

    let broken = &schema.tables["broken"];
    let columns: Vec<&str> = broken.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["a", "b"]);
    assert!(broken.sample.is_empty());

    assert_eq!(schema.tables["employees"].sample.len(), 3);
    assert_eq!(schema.tables["departments"].sample.len(), 3);
}
