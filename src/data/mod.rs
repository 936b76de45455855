//! Data layer: discovery, loading and the loaded table types.
//!
//! Architecture:
//! ```text
//!   data directory (.csv / .tsv / .parquet + one workbook)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  locate   │  NFC-normalized keyword / extension matching
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse files → EnvironmentTable / GrowthTable
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  model    │  Datasets: school → table, read-only
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  school selection for per-school views
//!   └──────────┘
//! ```

pub mod filter;
pub mod loader;
pub mod locate;
pub mod model;
pub mod normalize;
