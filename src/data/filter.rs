use std::convert::Infallible;
use std::str::FromStr;

use super::model::{Datasets, EnvironmentTable};
use super::normalize::nfc_string;
use crate::config::DashboardConfig;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// School selection: which schools a per-school view covers
// ---------------------------------------------------------------------------

/// Either every school or a single one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchoolSelection {
    #[default]
    All,
    School(String),
}

impl FromStr for SchoolSelection {
    type Err = Infallible;

    /// `all`, `전체` or an empty string select everything; anything else
    /// names a school (or one of its aliases).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = nfc_string(s.trim());
        if s.is_empty() || s == "전체" || s.eq_ignore_ascii_case("all") {
            Ok(SchoolSelection::All)
        } else {
            Ok(SchoolSelection::School(s))
        }
    }
}

impl SchoolSelection {
    /// Environment tables covered by the selection, in configuration order.
    ///
    /// A named school must be present in the environment dataset.
    pub fn environment_tables<'a>(
        &self,
        config: &DashboardConfig,
        datasets: &'a Datasets,
    ) -> Result<Vec<&'a EnvironmentTable>> {
        match self {
            SchoolSelection::All => Ok(config
                .schools
                .iter()
                .filter_map(|s| datasets.environment.get(&s.name))
                .collect()),
            SchoolSelection::School(name) => {
                let key = config
                    .resolve_school(name)
                    .map(|s| s.name.as_str())
                    .unwrap_or(name.as_str());
                datasets
                    .environment
                    .get(key)
                    .map(|t| vec![t])
                    .ok_or_else(|| PipelineError::MissingSchool {
                        school: name.clone(),
                        dataset: "environment".to_string(),
                    })
            }
        }
    }
}
