//! Query orchestration: classify, consult the cache, then answer from SQL or
//! from the document index.
//!
//! [`QueryEngine::answer`] never fails. Store and SQL errors come back as an
//! `{ "error": ... }` payload so one bad query cannot take the caller down.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::cache::{CacheKey, ResultCache};
use crate::classify::QueryClassifier;
use crate::models::{CachedAnswer, QueryPayload, QueryResult, Route};
use crate::schema::row_to_json;
use crate::search::SearchEngine;
use crate::translate::{QueryTranslator, SqlParam, StructuredQuery};

pub struct QueryEngine {
    pool: SqlitePool,
    classifier: QueryClassifier,
    translator: QueryTranslator,
    search: SearchEngine,
    cache: ResultCache,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(pool: SqlitePool, search: SearchEngine, cache: ResultCache, top_k: usize) -> Self {
        Self {
            pool,
            classifier: QueryClassifier::new(),
            translator: QueryTranslator::new(),
            search,
            cache,
            top_k,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub async fn answer(&self, query: &str) -> QueryResult {
        let route = self.classifier.classify(query);
        let key = CacheKey::new(query, route);

        if let Some(hit) = self.cache.get(&key) {
            debug!(%route, query, "cache hit");
            return QueryResult::from_answer(query, hit, true);
        }

        let answer = self.compute(query, route).await;
        if answer.results.is_error() {
            // Store and SQL failures may be transient; retry them next time.
            debug!(%route, query, "not caching error answer");
        } else {
            self.cache.put(key, answer.clone());
        }

        QueryResult::from_answer(query, answer, false)
    }

    async fn compute(&self, query: &str, route: Route) -> CachedAnswer {
        match route {
            Route::Structured => {
                let structured = self.translator.translate(query);
                debug!(kind = ?structured.kind, sql = structured.sql, "translated query");
                let results = match self.execute(&structured).await {
                    Ok(rows) => QueryPayload::Rows(rows),
                    Err(e) => {
                        warn!(sql = structured.sql, error = %e, "structured query failed");
                        QueryPayload::error(e.to_string())
                    }
                };
                CachedAnswer {
                    route,
                    sql: Some(structured.sql.to_string()),
                    results,
                }
            }
            Route::Text | Route::Hybrid => {
                let results = match self.search.search(query, self.top_k).await {
                    Ok(hits) => QueryPayload::Documents(hits),
                    Err(e) => {
                        warn!(error = %e, "document search failed");
                        QueryPayload::error(e.to_string())
                    }
                };
                CachedAnswer {
                    route,
                    sql: None,
                    results,
                }
            }
        }
    }

    async fn execute(
        &self,
        structured: &StructuredQuery,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
        let mut q = sqlx::query(structured.sql);
        for param in &structured.params {
            q = match param {
                SqlParam::Int(n) => q.bind(*n),
                SqlParam::Text(s) => q.bind(s.clone()),
            };
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}
