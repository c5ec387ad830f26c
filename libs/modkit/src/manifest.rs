//! Module manifests and the descriptors built from them.
//!
//! A manifest is a `manifest.json` file living in a module directory. It names the
//! module by its *local* id; the fully-qualified id is composed at discovery time
//! from the category root, an optional group directory and the local id.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name every module directory must contain.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Marker file that excludes a directory (and its subtree) from discovery.
pub const DISABLED_MARKER: &str = ".disabled";

/// Entry point recorded when a manifest does not name one.
pub const DEFAULT_ENTRY_POINT: &str = "module.rs";

/// Module category. The declaration order is the scheduling rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Standard,
    Extension,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Core, Category::Standard, Category::Extension];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Standard => "standard",
            Category::Extension => "extension",
        }
    }

    /// Tie-break rank used by the scheduler: core < standard < extension.
    pub fn rank(&self) -> u8 {
        match self {
            Category::Core => 0,
            Category::Standard => 1,
            Category::Extension => 2,
        }
    }

    /// Parse a directory or id label. `extensions` is accepted as an alias.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "core" => Some(Category::Core),
            "standard" => Some(Category::Standard),
            "extension" | "extensions" => Some(Category::Extension),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest {path} has invalid id '{id}': must be non-empty and contain no '.'")]
    InvalidId { path: PathBuf, id: String },
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

/// On-disk manifest format. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Local identifier, without category or group prefix.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Fully-qualified ids of the modules this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl Manifest {
    /// Load and validate a manifest from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            ManifestError::Parse { source, .. } => ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ManifestError::InvalidId { id, .. } => ManifestError::InvalidId {
                path: path.to_path_buf(),
                id,
            },
            other => other,
        })
    }

    /// Parse a manifest from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest =
            serde_json::from_str(raw).map_err(|source| ManifestError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        let id = manifest.id.trim();
        if id.is_empty() || id.contains('.') {
            return Err(ManifestError::InvalidId {
                path: PathBuf::new(),
                id: manifest.id,
            });
        }
        Ok(manifest)
    }
}

/// Immutable record describing one discovered module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub dependencies: BTreeSet<String>,
    pub category: Category,
    pub disabled: bool,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub entry_point: String,
    pub requirements: Vec<String>,
    /// Directory the manifest was found in; `None` for programmatic descriptors.
    pub dir: Option<PathBuf>,
}

impl ModuleDescriptor {
    /// Build a descriptor directly from a fully-qualified id.
    ///
    /// The category is taken from the first id segment and falls back to
    /// `Extension` when the prefix is not a known category.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let category = id
            .split('.')
            .next()
            .and_then(Category::from_label)
            .unwrap_or(Category::Extension);
        Self {
            id,
            dependencies: BTreeSet::new(),
            category,
            disabled: false,
            name: None,
            version: None,
            description: None,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            requirements: Vec::new(),
            dir: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Build a descriptor from a parsed manifest found under `category` (and `group`).
    pub fn from_manifest(
        manifest: Manifest,
        category: Category,
        group: Option<&str>,
        dir: PathBuf,
    ) -> Self {
        let id = compose_id(category, group, manifest.id.trim());
        Self {
            id,
            dependencies: manifest.dependencies.into_iter().collect(),
            category,
            disabled: manifest.disabled,
            name: manifest.name,
            version: manifest.version,
            description: manifest.description,
            entry_point: manifest.entry_point,
            requirements: manifest.requirements,
            dir: Some(dir),
        }
    }

    /// Human-facing label: the manifest name when present, the id otherwise.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// `category.[group.]local`
pub fn compose_id(category: Category, group: Option<&str>, local: &str) -> String {
    match group {
        Some(g) => format!("{}.{}.{}", category.as_str(), g, local),
        None => format!("{}.{}", category.as_str(), local),
    }
}
