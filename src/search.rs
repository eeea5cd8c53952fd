//! Term-presence ranking over the inverted index.
//!
//! A document's score is the number of distinct query terms it contains,
//! regardless of how often each occurs. Ties keep ingestion order.

use anyhow::Result;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::models::SearchHit;
use crate::tokenize::term_set;

#[derive(Clone)]
pub struct SearchEngine {
    pool: SqlitePool,
    snippet_chars: usize,
}

impl SearchEngine {
    pub fn new(pool: SqlitePool, snippet_chars: usize) -> Self {
        Self {
            pool,
            snippet_chars,
        }
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let terms = term_set(query);
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT d.id, d.name, d.content, COUNT(*) AS score \
             FROM doc_index i JOIN documents d ON d.id = i.doc_id \
             WHERE i.term IN (",
        );
        let mut separated = qb.separated(", ");
        for term in &terms {
            separated.push_bind(term.as_str());
        }
        separated.push_unseparated(") GROUP BY d.id ORDER BY score DESC, d.rowid ASC LIMIT ");
        qb.push_bind(top_k as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let content: String = row.get("content");
                SearchHit {
                    doc_id: row.get("id"),
                    doc_name: row.get("name"),
                    snippet: snippet(&content, self.snippet_chars),
                    score: row.get("score"),
                }
            })
            .collect())
    }
}

/// The first `max_chars` characters of `content`, with line breaks turned
/// into spaces.
pub fn snippet(content: &str, max_chars: usize) -> String {
    content
        .chars()
        .take(max_chars)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
