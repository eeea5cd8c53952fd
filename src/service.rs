//! The entry points the transport layer calls.
//!
//! [`QueryService`] owns the pool, the schema snapshot taken at startup, the
//! job tracker, the indexer, and the query engine. The HTTP server and the
//! CLI both go through it; nothing in the crate keeps process-wide state.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::cache::ResultCache;
use crate::config::Config;
use crate::db;
use crate::engine::QueryEngine;
use crate::indexer::DocumentIndexer;
use crate::jobs::IngestJobTracker;
use crate::migrate;
use crate::models::{Document, IngestJob, QueryResult, RawFile};
use crate::schema::{self, SchemaSnapshot};
use crate::search::SearchEngine;

pub struct QueryService {
    pool: SqlitePool,
    schema: SchemaSnapshot,
    jobs: Arc<IngestJobTracker>,
    indexer: Arc<DocumentIndexer>,
    engine: QueryEngine,
}

impl QueryService {
    /// Connects, creates the document tables if needed, and discovers the
    /// schema once.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config)
            .await
            .with_context(|| format!("Failed to open database: {}", config.db.path.display()))?;
        migrate::run_migrations(&pool).await?;
        Self::with_pool(pool, config).await
    }

    /// Builds the service over an already migrated pool.
    pub async fn with_pool(pool: SqlitePool, config: &Config) -> Result<Self> {
        let schema = schema::analyze(&pool)
            .await
            .context("Schema discovery failed")?;
        info!(tables = schema.tables.len(), "schema discovered");

        let jobs = Arc::new(IngestJobTracker::new());
        let indexer = Arc::new(DocumentIndexer::new(
            pool.clone(),
            Arc::clone(&jobs),
            &config.ingest.content_column,
        ));
        let search = SearchEngine::new(pool.clone(), config.search.snippet_chars);
        let engine = QueryEngine::new(
            pool.clone(),
            search,
            ResultCache::new(config.cache.capacity),
            config.search.top_k,
        );

        Ok(Self {
            pool,
            schema,
            jobs,
            indexer,
            engine,
        })
    }

    /// Registers a batch and spawns its ingestion; returns the job id at once.
    ///
    /// Must be called from within a tokio runtime. The job is visible to
    /// [`ingestion_status`](Self::ingestion_status) before this returns.
    pub fn start_ingestion(&self, files: Vec<RawFile>) -> String {
        let job_id = Uuid::new_v4().to_string();
        self.jobs.start(&job_id, files.len());

        let indexer = Arc::clone(&self.indexer);
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            indexer.ingest(files, &task_job_id).await;
        });

        job_id
    }

    pub fn ingestion_status(&self, job_id: &str) -> Option<IngestJob> {
        self.jobs.status(job_id)
    }

    pub async fn run_query(&self, text: &str) -> QueryResult {
        self.engine.answer(text).await
    }

    pub fn schema_snapshot(&self) -> &SchemaSnapshot {
        &self.schema
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.indexer.get_document(id).await
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
