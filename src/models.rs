//! Core data types shared by the indexer, the query engine, and the
//! transport layer.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// An uploaded file before decoding: the name it arrived with and its bytes.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A stored document. Immutable once ingested.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
    /// Unix seconds.
    pub ingested_at: i64,
}

/// Progress of one ingestion batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestJob {
    pub id: String,
    pub total: usize,
    pub processed: usize,
    /// Documents that were counted as processed but could not be stored.
    pub failed: usize,
    pub done: bool,
}

/// Which backend answers a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Structured,
    Text,
    Hybrid,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Structured => "structured",
            Route::Text => "text",
            Route::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked text-search match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub doc_name: String,
    pub snippet: String,
    /// Number of distinct query terms present in the document.
    pub score: i64,
}

/// The body of a query answer.
///
/// Serialized untagged, so clients see either a JSON array of rows/hits or
/// an `{"error": "..."}` object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryPayload {
    Rows(Vec<Map<String, Value>>),
    Documents(Vec<SearchHit>),
    Error { error: String },
}

impl QueryPayload {
    pub fn error(message: impl Into<String>) -> Self {
        QueryPayload::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryPayload::Error { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            QueryPayload::Rows(rows) => rows.len(),
            QueryPayload::Documents(hits) => hits.len(),
            QueryPayload::Error { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the result cache stores: everything in a [`QueryResult`] except the
/// caller's raw text and the provenance flag.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnswer {
    pub route: Route,
    pub sql: Option<String>,
    pub results: QueryPayload,
}

/// The answer returned to callers of `run_query`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub route: Route,
    /// The statement that produced `results`, for structured answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub results: QueryPayload,
    pub cached: bool,
}

impl QueryResult {
    pub fn from_answer(query: &str, answer: CachedAnswer, cached: bool) -> Self {
        Self {
            query: query.to_string(),
            route: answer.route,
            sql: answer.sql,
            results: answer.results,
            cached,
        }
    }
}
