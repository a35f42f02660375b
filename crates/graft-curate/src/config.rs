//! Configuration for the graft-curate service.

use serde::Deserialize;

/// Top-level curator configuration.
///
/// Loaded from `graft.toml` `[curator]` section or `GRAFT_CURATE__`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct CuratorConfig {
    /// Root directory for the file-backed graph store.
    #[serde(default = "default_store_root")]
    pub store_root: String,

    /// Neighborhood radius used when a request does not specify one.
    #[serde(default = "default_hops")]
    pub default_hops: u32,

    /// Maximum curations running concurrently.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_curations: usize,
}

fn default_store_root() -> String {
    "./graphs".to_string()
}

fn default_hops() -> u32 {
    1
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            default_hops: default_hops(),
            max_concurrent_curations: default_max_concurrent(),
        }
    }
}
