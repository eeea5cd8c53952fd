//! Document ingestion and inverted-index maintenance.
//!
//! Each file of a batch is decoded, reduced to its text content, stored in
//! `documents`, and indexed as one `doc_index` row per distinct term. Files
//! are processed in input order; progress goes to the shared
//! [`IngestJobTracker`].
//!
//! # Write path
//!
//! SQLite allows a single writer at a time. All batches share one
//! [`DocumentIndexer`], whose async mutex serializes the per-document write
//! transaction, so concurrent uploads queue up instead of failing with
//! `SQLITE_BUSY`. Reads (search, schema) go straight to the WAL pool.
//!
//! # Failure policy
//!
//! Best-effort: a document that cannot be stored is logged, counted in the
//! job's `failed` total, and the batch moves on. Documents already written
//! are kept.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::jobs::IngestJobTracker;
use crate::models::{Document, IngestJob, RawFile};
use crate::tokenize::term_set;

/// Index rows per INSERT statement (two bind parameters each).
const TERM_BATCH: usize = 400;

pub struct DocumentIndexer {
    pool: SqlitePool,
    jobs: Arc<IngestJobTracker>,
    content_column: String,
    write_lock: Mutex<()>,
}

impl DocumentIndexer {
    pub fn new(pool: SqlitePool, jobs: Arc<IngestJobTracker>, content_column: &str) -> Self {
        Self {
            pool,
            jobs,
            content_column: content_column.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ingests `files` as batch `job_id` and returns the final job state.
    pub async fn ingest(&self, files: Vec<RawFile>, job_id: &str) -> Option<IngestJob> {
        self.jobs.start(job_id, files.len());
        info!(job_id, documents = files.len(), "ingestion started");

        for file in files {
            match self.ingest_one(&file).await {
                Ok(doc) => debug!(job_id, doc_id = %doc.id, name = %doc.name, "document indexed"),
                Err(e) => {
                    warn!(job_id, name = %file.name, error = %e, "document failed to ingest");
                    self.jobs.record_failure(job_id);
                }
            }
            self.jobs.advance(job_id);
            tokio::task::yield_now().await;
        }

        self.jobs.complete(job_id);
        let job = self.jobs.status(job_id);
        if let Some(ref job) = job {
            info!(
                job_id,
                processed = job.processed,
                failed = job.failed,
                "ingestion finished"
            );
        }
        job
    }

    async fn ingest_one(&self, file: &RawFile) -> Result<Document> {
        let text = decode_text(&file.bytes);
        let content = extract_content(&file.name, &text, &self.content_column);

        let doc = Document {
            id: Uuid::new_v4().to_string(),
            name: file.name.clone(),
            content,
            ingested_at: Utc::now().timestamp(),
        };
        let terms: Vec<String> = term_set(&doc.content).into_iter().collect();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO documents (id, name, content, ingested_at) VALUES (?, ?, ?, ?)")
            .bind(&doc.id)
            .bind(&doc.name)
            .bind(&doc.content)
            .bind(doc.ingested_at)
            .execute(&mut *tx)
            .await?;

        for batch in terms.chunks(TERM_BATCH) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO doc_index (term, doc_id) ");
            qb.push_values(batch, |mut row, term| {
                row.push_bind(term.as_str()).push_bind(doc.id.as_str());
            });
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(doc)
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row: Option<(String, String, String, i64)> =
            sqlx::query_as("SELECT id, name, content, ingested_at FROM documents WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, name, content, ingested_at)| Document {
            id,
            name,
            content,
            ingested_at,
        }))
    }
}

/// Decodes UTF-8, dropping invalid byte sequences instead of failing.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.utf8_chunks().map(|chunk| chunk.valid()).collect(),
    };
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

/// Reduces a decoded file to the text worth indexing.
///
/// CSV files contribute the non-empty values of `content_column`, one per
/// line, or every line when that column is absent. Anything else, or a CSV
/// that fails to parse, is used as is.
pub fn extract_content(name: &str, text: &str, content_column: &str) -> String {
    if !is_csv(name) {
        return text.to_string();
    }

    match csv_column_values(text, content_column) {
        Ok(Some(values)) => values.join("\n"),
        Ok(None) => text.lines().collect::<Vec<_>>().join("\n"),
        Err(e) => {
            debug!(name, error = %e, "csv parse failed, indexing raw text");
            text.to_string()
        }
    }
}

fn is_csv(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn csv_column_values(text: &str, column: &str) -> Result<Option<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let Some(idx) = reader.headers()?.iter().position(|h| h.trim() == column) else {
        return Ok(None);
    };

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(idx).filter(|v| !v.is_empty()) {
            values.push(value.to_string());
        }
    }
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_valid_utf8() {
        assert_eq!(decode_text("naïve résumé".as_bytes()), "naïve résumé");
    }

    #[test]
    fn drops_invalid_sequences() {
        let bytes = b"Python \xff\xfeEngineer";
        assert_eq!(decode_text(bytes), "Python Engineer");
    }

    #[test]
    fn strips_bom() {
        assert_eq!(decode_text(b"\xef\xbb\xbfcontent\nhello"), "content\nhello");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(
            extract_content("notes.txt", "line one\nline two", "content"),
            "line one\nline two"
        );
    }

    #[test]
    fn csv_content_column_extracted() {
        let csv = "name,content\nalice,Rust developer\nbob,\ncarol,Go developer\n";
        assert_eq!(
            extract_content("resumes.CSV", csv, "content"),
            "Rust developer\nGo developer"
        );
    }

    #[test]
    fn csv_without_content_column_keeps_lines() {
        let csv = "name,skill\r\nalice,rust\r\n";
        assert_eq!(
            extract_content("skills.csv", csv, "content"),
            "name,skill\nalice,rust"
        );
    }

    #[test]
    fn csv_quoted_multiline_value() {
        let csv = "id,content\n1,\"first line\nsecond line\"\n";
        assert_eq!(
            extract_content("a.csv", csv, "content"),
            "first line\nsecond line"
        );
    }
}
