//! # NLQ Engine
//!
//! Answers free-text questions over a mixed corpus: a relational dataset in
//! SQLite and a collection of uploaded documents. Each question is routed by
//! keyword rules either to a generated SQL query or to a term-presence search
//! over an inverted index, and answers are kept in a bounded LRU cache.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────┐
//!  upload ──────▶ │ DocumentIndexer│──▶ documents + doc_index ◀─┐
//!     │           └───────┬───────┘                            │
//!     ▼                   ▼                                    │
//!  job id         IngestJobTracker                        SearchEngine
//!                                                              ▲
//!  query ──▶ QueryEngine ──▶ QueryClassifier ──┬── text/hybrid ┘
//!               │   ▲                          └── structured ──▶ QueryTranslator ──▶ SQL
//!               ▼   │
//!             ResultCache
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`tokenize`] | Term extraction |
//! | [`schema`] | Schema discovery |
//! | [`indexer`] | Document ingestion and inverted index |
//! | [`jobs`] | Ingestion progress tracking |
//! | [`search`] | Ranked document search |
//! | [`classify`] | Query routing rules |
//! | [`translate`] | Natural-language to SQL patterns |
//! | [`cache`] | LRU result cache |
//! | [`engine`] | Query orchestration |
//! | [`service`] | Entry points for the transport layer |
//! | [`server`] | HTTP server |
//! | [`files`] | Local file collection for the CLI |
//! | [`progress`] | CLI ingestion progress |
//! | [`db`] | Database connection |
//! | [`migrate`] | Tables and demo dataset |

pub mod cache;
pub mod classify;
pub mod config;
pub mod db;
pub mod engine;
pub mod files;
pub mod indexer;
pub mod jobs;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod schema;
pub mod search;
pub mod server;
pub mod service;
pub mod tokenize;
pub mod translate;
