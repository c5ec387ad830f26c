use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// `modules."core.database"` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    /// JSON file loaded in the `database.ready` hook and written at shutdown.
    pub snapshot: Option<PathBuf>,
    /// Entries present from the first moment the store exists.
    pub seed: BTreeMap<String, String>,
}
