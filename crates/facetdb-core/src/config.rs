//! facetdb configuration.

use std::env;

/// Maximum keys per `BatchGetItem` request accepted by the store.
pub const MAX_BATCH_GET: usize = 100;

/// Maximum writes per `BatchWriteItem` request accepted by the store.
pub const MAX_BATCH_WRITE: usize = 25;

/// Runtime configuration shared by entities and services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetConfig {
    /// Table name overriding the one declared by the schema.
    pub table: Option<String>,
    /// Keys per `BatchGetItem` chunk.
    pub batch_get_chunk: usize,
    /// Writes per `BatchWriteItem` chunk.
    pub batch_write_chunk: usize,
    /// Upper bound on pages followed by `pages()`; `0` means unbounded.
    pub max_pages: usize,
}

impl FacetConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            table: env::var("FACETDB_TABLE").ok().filter(|t| !t.is_empty()),
            batch_get_chunk: env_usize("FACETDB_BATCH_GET_CHUNK", defaults.batch_get_chunk)
                .clamp(1, MAX_BATCH_GET),
            batch_write_chunk: env_usize("FACETDB_BATCH_WRITE_CHUNK", defaults.batch_write_chunk)
                .clamp(1, MAX_BATCH_WRITE),
            max_pages: env_usize("FACETDB_MAX_PAGES", defaults.max_pages),
        }
    }
}

impl Default for FacetConfig {
    fn default() -> Self {
        Self {
            table: None,
            batch_get_chunk: MAX_BATCH_GET,
            batch_write_chunk: MAX_BATCH_WRITE,
            max_pages: 0,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
