//! Schema discovery over the structured store.
//!
//! Produces a [`SchemaSnapshot`] describing every user table: its columns,
//! up to [`SAMPLE_ROWS`] sample rows, and foreign keys guessed from the
//! `_id` naming convention. The guess is a heuristic; it only has to be
//! deterministic for a given schema.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Maximum sample rows captured per table.
pub const SAMPLE_ROWS: i64 = 3;

/// Tables owned by the document store rather than the user dataset.
pub const RESERVED_TABLES: &[&str] = &["documents", "doc_index"];

const FOREIGN_KEY_SUFFIX: &str = "_id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, TableSchema>,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
    pub sample: Vec<Map<String, Value>>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(skip)]
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub column: String,
    pub likely_ref_table: String,
}

/// Inspects every user table in `pool`.
///
/// Only enumerating the tables can fail. A table whose columns or sample
/// cannot be read is still reported, with whatever could be gathered.
pub async fn analyze(pool: &SqlitePool) -> Result<SchemaSnapshot> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut tables = BTreeMap::new();
    for name in names {
        if RESERVED_TABLES.contains(&name.as_str()) {
            continue;
        }

        let columns = match table_columns(pool, &name).await {
            Ok(columns) => columns,
            Err(e) => {
                warn!(table = %name, error = %e, "failed to read table columns");
                Vec::new()
            }
        };

        let sample = match sample_rows(pool, &name).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table = %name, error = %e, "failed to sample table");
                Vec::new()
            }
        };

        let relationships = infer_relationships(&columns);
        debug!(
            table = %name,
            columns = columns.len(),
            relationships = relationships.len(),
            "discovered table"
        );

        tables.insert(
            name,
            TableSchema {
                columns,
                sample,
                relationships,
            },
        );
    }

    Ok(SchemaSnapshot {
        tables,
        discovered_at: Utc::now(),
    })
}

async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<ColumnInfo>> {
    // hidden: 0 = ordinary, 2 = virtual generated, 3 = stored generated.
    let rows: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT name, type, pk FROM pragma_table_xinfo(?) WHERE hidden IN (0, 2, 3) ORDER BY cid",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, declared_type, pk)| ColumnInfo {
            name,
            declared_type,
            primary_key: pk > 0,
        })
        .collect())
}

async fn sample_rows(pool: &SqlitePool, table: &str) -> Result<Vec<Map<String, Value>>> {
    let sql = format!("SELECT * FROM {} LIMIT ?", quote_ident(table));
    let rows = sqlx::query(&sql).bind(SAMPLE_ROWS).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

/// Guesses `<name>_id` columns as references to a `<name>` table. The
/// table's own primary key is never a reference.
pub fn infer_relationships(columns: &[ColumnInfo]) -> Vec<Relationship> {
    columns
        .iter()
        .filter(|c| !c.primary_key)
        .filter_map(|c| {
            let stem = c.name.strip_suffix(FOREIGN_KEY_SUFFIX)?;
            if stem.is_empty() {
                return None;
            }
            Some(Relationship {
                column: c.name.clone(),
                likely_ref_table: stem.to_string(),
            })
        })
        .collect()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Converts a dynamically typed SQLite row into a JSON object keyed by
/// column name.
pub fn row_to_json(row: &SqliteRow) -> Map<String, Value> {
    let mut obj = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        obj.insert(column.name().to_string(), column_value(row, i));
    }
    obj
}

fn column_value(row: &SqliteRow, i: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
        return v
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, pk: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            declared_type: "INTEGER".to_string(),
            primary_key: pk,
        }
    }

    #[test]
    fn infers_suffix_references() {
        let rels = infer_relationships(&[
            col("emp_id", true),
            col("full_name", false),
            col("dept_id", false),
        ]);
        assert_eq!(
            rels,
            vec![Relationship {
                column: "dept_id".to_string(),
                likely_ref_table: "dept".to_string(),
            }]
        );
    }

    #[test]
    fn primary_key_is_not_a_reference() {
        let rels = infer_relationships(&[col("dept_id", true), col("manager_id", false)]);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].column, "manager_id");
        assert_eq!(rels[0].likely_ref_table, "manager");
    }

    #[test]
    fn bare_suffix_ignored() {
        assert!(infer_relationships(&[col("_id", false), col("paid", false)]).is_empty());
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }
}
