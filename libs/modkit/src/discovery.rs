//! Module discovery
//!
//! Scans category roots (`core`, `standard`, `extension`) for module directories
//! and turns their manifests into [`ModuleDescriptor`]s. One level of grouping is
//! supported: `root/{category}/{group}/{module}/manifest.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::manifest::{
    Category, Manifest, ManifestError, ModuleDescriptor, DISABLED_MARKER, MANIFEST_FILE,
};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Non-fatal: the directory is skipped and the error is kept in the report.
    #[error("invalid manifest in {dir}")]
    InvalidManifest {
        dir: PathBuf,
        #[source]
        source: ManifestError,
    },
    #[error("duplicate module id '{id}' found in {first} and {second}")]
    DuplicateModuleId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("failed to read module root {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One category directory to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRoot {
    pub path: PathBuf,
    pub category: Category,
}

impl DiscoveryRoot {
    pub fn new(path: impl Into<PathBuf>, category: Category) -> Self {
        Self {
            path: path.into(),
            category,
        }
    }
}

/// Build the category roots that exist under `base`.
///
/// `extensions/` is accepted when `extension/` is absent.
pub fn roots_under(base: &Path) -> Vec<DiscoveryRoot> {
    let mut roots = Vec::new();
    for category in Category::ALL {
        let labels: &[&str] = match category {
            Category::Extension => &["extension", "extensions"],
            _ => &[category.as_str()],
        };
        match labels.iter().map(|l| base.join(l)).find(|p| p.is_dir()) {
            Some(path) => roots.push(DiscoveryRoot::new(path, category)),
            None => debug!(base = %base.display(), category = %category, "no category root"),
        }
    }
    roots
}

/// Result of a discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub descriptors: Vec<ModuleDescriptor>,
    /// Skipped directories with a malformed manifest.
    pub invalid: Vec<DiscoveryError>,
}

/// Scanner over a fixed set of roots.
pub struct ModuleDiscovery {
    roots: Vec<DiscoveryRoot>,
}

impl ModuleDiscovery {
    pub fn new(roots: Vec<DiscoveryRoot>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[DiscoveryRoot] {
        &self.roots
    }

    /// Walk every root. Fails only on duplicate ids or an unreadable root.
    pub fn discover(&self) -> Result<DiscoveryReport, DiscoveryError> {
        let mut report = DiscoveryReport::default();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();

        for root in &self.roots {
            if !root.path.is_dir() {
                info!(root = %root.path.display(), "module root does not exist, skipping");
                continue;
            }
            debug!(root = %root.path.display(), category = %root.category, "scanning module root");

            let children = sorted_subdirs(&root.path).map_err(|source| DiscoveryError::Io {
                path: root.path.clone(),
                source,
            })?;

            for child in children {
                if is_disabled(&child) {
                    info!(dir = %child.display(), "directory disabled by marker, skipping");
                    continue;
                }
                if child.join(MANIFEST_FILE).is_file() {
                    self.load(&child, root.category, None, &mut seen, &mut report)?;
                    continue;
                }
                self.scan_group(&child, root.category, &mut seen, &mut report)?;
            }
        }

        info!(
            discovered = report.descriptors.len(),
            invalid = report.invalid.len(),
            "module discovery complete"
        );
        Ok(report)
    }

    fn scan_group(
        &self,
        group_dir: &Path,
        category: Category,
        seen: &mut HashMap<String, PathBuf>,
        report: &mut DiscoveryReport,
    ) -> Result<(), DiscoveryError> {
        let Some(group) = group_dir.file_name().and_then(|n| n.to_str()) else {
            warn!(dir = %group_dir.display(), "group directory name is not valid UTF-8, skipping");
            return Ok(());
        };
        if group.contains('.') {
            warn!(dir = %group_dir.display(), "group directory name contains '.', skipping");
            return Ok(());
        }

        let members = match sorted_subdirs(group_dir) {
            Ok(m) => m,
            Err(e) => {
                warn!(dir = %group_dir.display(), error = %e, "failed to read group directory, skipping");
                return Ok(());
            }
        };
        if members.is_empty() {
            debug!(dir = %group_dir.display(), "no {MANIFEST_FILE} found, skipping");
            return Ok(());
        }

        for member in members {
            if is_disabled(&member) {
                info!(dir = %member.display(), "directory disabled by marker, skipping");
                continue;
            }
            if !member.join(MANIFEST_FILE).is_file() {
                debug!(dir = %member.display(), "no {MANIFEST_FILE} found, skipping");
                continue;
            }
            self.load(&member, category, Some(group), seen, report)?;
        }
        Ok(())
    }

    fn load(
        &self,
        dir: &Path,
        category: Category,
        group: Option<&str>,
        seen: &mut HashMap<String, PathBuf>,
        report: &mut DiscoveryReport,
    ) -> Result<(), DiscoveryError> {
        let manifest = match Manifest::from_file(dir.join(MANIFEST_FILE)) {
            Ok(m) => m,
            Err(source) => {
                warn!(dir = %dir.display(), error = %source, "invalid manifest, skipping");
                report.invalid.push(DiscoveryError::InvalidManifest {
                    dir: dir.to_path_buf(),
                    source,
                });
                return Ok(());
            }
        };

        let descriptor = ModuleDescriptor::from_manifest(manifest, category, group, dir.to_path_buf());
        if let Some(first) = seen.get(&descriptor.id) {
            return Err(DiscoveryError::DuplicateModuleId {
                id: descriptor.id,
                first: first.clone(),
                second: dir.to_path_buf(),
            });
        }

        debug!(module = %descriptor.id, dir = %dir.display(), "discovered module");
        seen.insert(descriptor.id.clone(), dir.to_path_buf());
        report.descriptors.push(descriptor);
        Ok(())
    }
}

/// Discover descriptors under `roots`; malformed manifests are logged and dropped.
pub fn discover(roots: &[DiscoveryRoot]) -> Result<Vec<ModuleDescriptor>, DiscoveryError> {
    ModuleDiscovery::new(roots.to_vec())
        .discover()
        .map(|report| report.descriptors)
}

fn is_disabled(dir: &Path) -> bool {
    dir.join(DISABLED_MARKER).exists()
}

fn sorted_subdirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), body).unwrap();
    }

    fn ids(descriptors: &[ModuleDescriptor]) -> Vec<&str> {
        descriptors.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn discovers_flat_and_grouped_modules() {
        let tmp = TempDir::new().unwrap();
        write_manifest(&tmp.path().join("core/database"), r#"{"id":"database"}"#);
        write_manifest(
            &tmp.path().join("standard/ops/heartbeat"),
            r#"{"id":"heartbeat","dependencies":["core.database"]}"#,
        );

        let found = discover(&roots_under(tmp.path())).unwrap();
        assert_eq!(ids(&found), vec!["core.database", "standard.ops.heartbeat"]);
        assert_eq!(found[1].category, Category::Standard);
        assert!(found[1].dependencies.contains("core.database"));
    }

    #[test]
    fn directory_without_manifest_is_absent_and_not_an_error() {
        let tmp = TempDir::new().unwrap();
        write_manifest(&tmp.path().join("core/database"), r#"{"id":"database"}"#);
        fs::create_dir_all(tmp.path().join("core/empty")).unwrap();
        fs::create_dir_all(tmp.path().join("core/grp/nothing_here")).unwrap();

        let report = ModuleDiscovery::new(roots_under(tmp.path()))
            .discover()
            .unwrap();
        assert_eq!(ids(&report.descriptors), vec!["core.database"]);
        assert!(report.invalid.is_empty());
    }

    #[test]
    fn malformed_manifest_is_skipped_and_reported() {
        let tmp = TempDir::new().unwrap();
        write_manifest(&tmp.path().join("core/broken"), "{ not json");
        write_manifest(&tmp.path().join("core/dotted"), r#"{"id":"a.b"}"#);
        write_manifest(&tmp.path().join("core/ok"), r#"{"id":"ok"}"#);

        let report = ModuleDiscovery::new(roots_under(tmp.path()))
            .discover()
            .unwrap();
        assert_eq!(ids(&report.descriptors), vec!["core.ok"]);
        assert_eq!(report.invalid.len(), 2);
        assert!(report
            .invalid
            .iter()
            .all(|e| matches!(e, DiscoveryError::InvalidManifest { .. })));
    }

    #[test]
    fn disabled_marker_skips_module_and_group_subtree() {
        let tmp = TempDir::new().unwrap();
        write_manifest(&tmp.path().join("core/off"), r#"{"id":"off"}"#);
        fs::write(tmp.path().join("core/off").join(DISABLED_MARKER), "").unwrap();
        write_manifest(&tmp.path().join("standard/grp/a"), r#"{"id":"a"}"#);
        fs::write(tmp.path().join("standard/grp").join(DISABLED_MARKER), "").unwrap();
        write_manifest(&tmp.path().join("standard/b"), r#"{"id":"b"}"#);

        let found = discover(&roots_under(tmp.path())).unwrap();
        assert_eq!(ids(&found), vec!["standard.b"]);
    }

    #[test]
    fn manifest_disabled_flag_is_carried() {
        let tmp = TempDir::new().unwrap();
        write_manifest(&tmp.path().join("extension/x"), r#"{"id":"x","disabled":true}"#);

        let found = discover(&roots_under(tmp.path())).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].disabled);
    }

    #[test]
    fn duplicate_ids_are_fatal() {
        let tmp = TempDir::new().unwrap();
        write_manifest(&tmp.path().join("core/one"), r#"{"id":"same"}"#);
        write_manifest(&tmp.path().join("core/two"), r#"{"id":"same"}"#);

        match discover(&roots_under(tmp.path())) {
            Err(DiscoveryError::DuplicateModuleId { id, .. }) => assert_eq!(id, "core.same"),
            other => panic!("expected DuplicateModuleId, got {other:?}"),
        }
    }

    #[test]
    fn missing_roots_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let roots = vec![DiscoveryRoot::new(tmp.path().join("nope"), Category::Core)];
        assert!(discover(&roots).unwrap().is_empty());
    }

    #[test]
    fn extensions_alias_is_accepted() {
        let tmp = TempDir::new().unwrap();
        write_manifest(&tmp.path().join("extensions/x"), r#"{"id":"x"}"#);

        let roots = roots_under(tmp.path());
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].category, Category::Extension);
        assert_eq!(ids(&discover(&roots).unwrap()), vec!["extension.x"]);
    }
}
