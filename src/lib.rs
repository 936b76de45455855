//! Loading and comparison pipeline for a multi-school nutrient EC experiment.
//!
//! A flat data directory holds one environment file per school (sensor
//! readings over time) and one workbook with a growth sheet per school. The
//! pipeline finds and parses them into read-only [`Datasets`], and
//! [`summary`] compares the schools to find the EC level with the best
//! growth.

pub mod cache;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod state;
pub mod summary;

pub use cache::{DatasetCache, DirectorySignature};
pub use config::{
    ColumnConfig, DashboardConfig, EnvironmentDiscovery, GrowthDiscovery, SchoolConfig,
};
pub use data::filter::SchoolSelection;
pub use data::model::{
    CellValue, Datasets, EnvironmentDataset, EnvironmentRecord, EnvironmentTable, GrowthDataset,
    GrowthRecord, GrowthTable, Tabular,
};
pub use error::{PipelineError, Result};
pub use pipeline::load_datasets;
pub use state::DashboardState;
