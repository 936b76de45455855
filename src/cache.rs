//! Read-through cache of loaded datasets.
//!
//! An entry is keyed by the canonical data directory plus the configuration
//! that produced it, and stamped with a [`DirectorySignature`]. A lookup whose
//! current signature differs from the stored one reloads and replaces the
//! entry; nothing else ever invalidates it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use log::debug;

use crate::config::{DashboardConfig, GrowthDiscovery};
use crate::data::model::Datasets;
use crate::error::{PipelineError, Result};
use crate::pipeline;

/// Size and modification time of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: PathBuf) -> Result<Self> {
        let meta = std::fs::metadata(&path)?;
        Ok(FileStamp {
            len: meta.len(),
            modified: meta.modified().ok(),
            path,
        })
    }
}

/// Snapshot of everything a load reads: the directory's files plus any
/// explicitly configured files living elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySignature {
    root: PathBuf,
    files: Vec<FileStamp>,
}

impl DirectorySignature {
    /// Signature of `config.data_dir` and the config's explicit paths.
    pub fn of(config: &DashboardConfig) -> Result<Self> {
        let dir = &config.data_dir;
        let root = dir
            .canonicalize()
            .map_err(|_| PipelineError::FileNotFound {
                what: "data directory".to_string(),
                dir: dir.clone(),
            })?;

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(FileStamp::of(entry.path())?);
            }
        }

        let explicit = config
            .schools
            .iter()
            .filter_map(|s| s.environment_file.as_deref())
            .chain(match &config.growth {
                GrowthDiscovery::Path { path } => Some(path.as_path()),
                _ => None,
            });
        for path in explicit {
            let path = config.data_path(path);
            let Ok(path) = path.canonicalize() else {
                continue;
            };
            // Top-level files were stamped by the directory scan above.
            if path.is_file() && path.parent() != Some(root.as_path()) {
                files.push(FileStamp::of(path)?);
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(DirectorySignature { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    root: PathBuf,
    config: String,
}

struct CacheEntry {
    signature: DirectorySignature,
    datasets: Arc<Datasets>,
}

/// Loaded datasets by (directory, configuration).
#[derive(Default)]
pub struct DatasetCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached datasets for `config`, loading them through the pipeline when
    /// absent or when the directory changed since they were cached.
    pub fn get_or_load(&mut self, config: &DashboardConfig) -> Result<Arc<Datasets>> {
        self.get_or_load_with(config, pipeline::load_datasets)
    }

    /// Like [`get_or_load`](Self::get_or_load) with a custom loader.
    /// A failed load leaves any previous entry untouched.
    pub fn get_or_load_with<F>(
        &mut self,
        config: &DashboardConfig,
        load: F,
    ) -> Result<Arc<Datasets>>
    where
        F: FnOnce(&DashboardConfig) -> Result<Datasets>,
    {
        let signature = DirectorySignature::of(config)?;
        let key = CacheKey {
            root: signature.root.clone(),
            config: serde_json::to_string(config)?,
        };

        if let Some(entry) = self.entries.get(&key) {
            if entry.signature == signature {
                debug!("dataset cache hit for {}", signature.root.display());
                return Ok(Arc::clone(&entry.datasets));
            }
            debug!(
                "{} changed since it was cached, reloading",
                signature.root.display()
            );
        }

        let datasets = Arc::new(load(config)?);
        self.entries.insert(
            key,
            CacheEntry {
                signature,
                datasets: Arc::clone(&datasets),
            },
        );
        Ok(datasets)
    }

    /// Drop every entry loaded from `dir`.
    pub fn invalidate(&mut self, dir: &Path) {
        let root = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        self.entries.retain(|key, _| key.root != root);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::data::model::{EnvironmentDataset, GrowthDataset};

    fn empty() -> Datasets {
        Datasets {
            environment: EnvironmentDataset::new(),
            growth: GrowthDataset::new(),
        }
    }

    fn config_for(dir: &Path) -> DashboardConfig {
        DashboardConfig {
            data_dir: dir.to_path_buf(),
            ..DashboardConfig::default()
        }
    }

    #[test]
    fn unchanged_directory_is_a_hit() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.csv"), "time\n").unwrap();
        let config = config_for(tmp.path());
        let loads = Cell::new(0);
        let mut cache = DatasetCache::new();

        let first = cache
            .get_or_load_with(&config, |_| {
                loads.set(loads.get() + 1);
                Ok(empty())
            })
            .unwrap();
        let second = cache
            .get_or_load_with(&config, |_| {
                loads.set(loads.get() + 1);
                Ok(empty())
            })
            .unwrap();

        assert_eq!(loads.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn new_file_invalidates() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_for(tmp.path());
        let mut cache = DatasetCache::new();

        let first = cache.get_or_load_with(&config, |_| Ok(empty())).unwrap();
        std::fs::write(tmp.path().join("b.csv"), "time\n").unwrap();
        let second = cache.get_or_load_with(&config, |_| Ok(empty())).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_for(tmp.path());
        let mut cache = DatasetCache::new();

        let err = cache.get_or_load_with(&config, |_| {
            Err(PipelineError::EmptyDataset {
                what: "test".into(),
            })
        });
        assert!(err.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn explicit_invalidation() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_for(tmp.path());
        let mut cache = DatasetCache::new();

        cache.get_or_load_with(&config, |_| Ok(empty())).unwrap();
        cache.invalidate(tmp.path());
        assert!(cache.is_empty());
    }

    #[test]
    fn explicit_file_in_subdirectory_is_stamped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub").join("x.csv"), "time\n").unwrap();
        let mut config = config_for(tmp.path());
        config.schools[0].environment_file = Some(PathBuf::from("sub/x.csv"));

        let before = DirectorySignature::of(&config).unwrap();
        assert_eq!(before.file_count(), 1);
        std::fs::write(
            tmp.path().join("sub").join("x.csv"),
            "time\n2024-05-01\n2024-05-02\n2024-05-03\n",
        )
        .unwrap();
        let after = DirectorySignature::of(&config).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn explicit_top_level_file_is_stamped_once() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("x.csv"), "time\n").unwrap();
        let mut config = config_for(tmp.path());
        config.schools[0].environment_file = Some(PathBuf::from("x.csv"));

        let sig = DirectorySignature::of(&config).unwrap();
        assert_eq!(sig.file_count(), 1);
    }

    #[test]
    fn signature_counts_files_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.csv"), "x").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();

        let sig = DirectorySignature::of(&config_for(tmp.path())).unwrap();
        assert_eq!(sig.file_count(), 1);
    }
}
