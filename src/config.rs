//! TOML configuration.
//!
//! Every section except `[db]` may be omitted; missing keys fall back to the
//! defaults below. See `config/nlq.example.toml` for a full example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// CSV header whose values become the document text.
    #[serde(default = "default_content_column")]
    pub content_column: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            content_column: default_content_column(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_content_column() -> String {
    "content".to_string()
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.csv".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_snippet_chars() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl Config {
    /// A config with defaults everywhere, pointing at the given database file.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            ingest: IngestConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.top_k == 0 {
            anyhow::bail!("search.top_k must be >= 1");
        }
        if self.search.snippet_chars == 0 {
            anyhow::bail!("search.snippet_chars must be >= 1");
        }
        if self.cache.capacity == 0 {
            anyhow::bail!("cache.capacity must be >= 1");
        }
        if self.ingest.content_column.trim().is_empty() {
            anyhow::bail!("ingest.content_column must not be empty");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: Config = toml::from_str("[db]\npath = \"data/nlq.sqlite\"\n").unwrap();
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.search.snippet_chars, 150);
        assert_eq!(config.cache.capacity, 200);
        assert_eq!(config.ingest.content_column, "content");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        config.validate().unwrap();
    }

    #[test]
    fn zero_capacity_rejected() {
        let config: Config =
            toml::from_str("[db]\npath = \"x.sqlite\"\n[cache]\ncapacity = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.capacity"));
    }

    #[test]
    fn missing_db_section_fails_to_parse() {
        assert!(toml::from_str::<Config>("[search]\ntop_k = 3\n").is_err());
    }
}
