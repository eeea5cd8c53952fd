//! Schema setup for the document store and the optional demo dataset.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_index (
            term TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            PRIMARY KEY (term, doc_id),
            FOREIGN KEY (doc_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_doc_index_doc_id ON doc_index(doc_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Creates and fills the `employees` / `departments` sample tables.
///
/// Does nothing when `employees` already exists, so running it twice never
/// duplicates rows. Returns whether anything was written.
pub async fn seed_demo_dataset(pool: &SqlitePool) -> Result<bool> {
    let existing: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='employees'",
    )
    .fetch_one(pool)
    .await?;

    if existing > 0 {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE employees (
            emp_id INTEGER PRIMARY KEY,
            full_name TEXT,
            dept_id INTEGER,
            position TEXT,
            annual_salary REAL,
            join_date TEXT,
            office_location TEXT
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE departments (
            dept_id INTEGER PRIMARY KEY,
            dept_name TEXT,
            manager_id INTEGER
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    let employees: [(i64, &str, i64, &str, f64, &str, &str); 5] = [
        (1, "Alice Johnson", 1, "Senior Engineer", 120000.0, "2023-02-15", "NY"),
        (2, "Bob Smith", 1, "Engineer", 90000.0, "2022-07-10", "NY"),
        (3, "Charlie Lee", 2, "Manager", 130000.0, "2020-11-01", "SF"),
        (4, "Diana Prince", 3, "Data Scientist", 115000.0, "2024-01-20", "Remote"),
        (5, "Evan Garcia", 1, "Engineer", 95000.0, "2021-06-30", "NY"),
    ];
    for (id, name, dept, position, salary, joined, office) in employees {
        sqlx::query("INSERT INTO employees VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(dept)
            .bind(position)
            .bind(salary)
            .bind(joined)
            .bind(office)
            .execute(&mut *tx)
            .await?;
    }

    let departments: [(i64, &str, i64); 3] =
        [(1, "Engineering", 3), (2, "Product", 3), (3, "Data", 4)];
    for (id, name, manager) in departments {
        sqlx::query("INSERT INTO departments VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(manager)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!(employees = 5, departments = 3, "seeded demo dataset");
    Ok(true)
}
