use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::DatasetCache;
use crate::config::DashboardConfig;
use crate::data::filter::SchoolSelection;
use crate::data::model::Datasets;
use crate::error::Result;
use crate::export::{self, ExportFormat, GROWTH_EXPORT_FILE_NAME};
use crate::summary::{self, Summary};

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// Everything a dashboard session holds, independent of rendering.
pub struct DashboardState {
    pub config: DashboardConfig,

    /// Which schools per-school views (time series, exports) cover.
    pub selection: SchoolSelection,

    cache: DatasetCache,
}

impl DashboardState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            selection: SchoolSelection::All,
            cache: DatasetCache::new(),
        }
    }

    /// Both datasets, loaded on first use and reloaded when the data
    /// directory changes.
    pub fn datasets(&mut self) -> Result<Arc<Datasets>> {
        self.cache.get_or_load(&self.config)
    }

    pub fn summary(&mut self) -> Result<Summary> {
        let datasets = self.datasets()?;
        summary::summarize(&self.config, &datasets)
    }

    /// Export the environment table of every selected school into `out_dir`,
    /// one file per school. Returns the written paths.
    pub fn export_environment(
        &mut self,
        format: ExportFormat,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let datasets = self.datasets()?;
        let tables = self.selection.environment_tables(&self.config, &datasets)?;

        std::fs::create_dir_all(out_dir)?;
        let mut written = Vec::with_capacity(tables.len());
        for table in tables {
            let path = out_dir.join(export::environment_file_name(&table.name, format));
            export::write_environment(table, &path, format)?;
            written.push(path);
        }
        Ok(written)
    }

    /// Export every growth sheet to one workbook. `path` defaults to
    /// [`GROWTH_EXPORT_FILE_NAME`] in the current directory.
    pub fn export_growth(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let datasets = self.datasets()?;
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(GROWTH_EXPORT_FILE_NAME));
        let order: Vec<String> = self.config.schools.iter().map(|s| s.name.clone()).collect();
        export::write_growth(&datasets.growth, &order, &path)?;
        Ok(path)
    }
}
