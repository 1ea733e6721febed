//! Storage configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// SQLite storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file, or ":memory:".
    pub path: String,
    /// Maximum number of pooled connections.
    pub max_connections: Option<u32>,
    /// How long a writer waits for a locked database before failing.
    #[serde(default, with = "duration")]
    pub busy_timeout: Duration,
}
