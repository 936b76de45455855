//! Dashboard configuration: the experiment's schools, where their files live,
//! and which columns the summaries read.
//!
//! Loaded from a JSON file; every field has a default so a partial file only
//! overrides what it names. [`DashboardConfig::default`] is the four-school
//! experiment the dashboard was built for.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::color;
use crate::data::normalize::{nfc_lower, nfc_string};
use crate::error::{PipelineError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Flat directory holding the environment files and the growth workbook.
    pub data_dir: PathBuf,
    /// Schools in display order.
    pub schools: Vec<SchoolConfig>,
    /// How environment files are assigned to schools.
    pub environment: EnvironmentDiscovery,
    /// How the growth workbook is located.
    pub growth: GrowthDiscovery,
    pub columns: ColumnConfig,
    /// Field delimiter for `.csv` environment files.
    pub delimiter: char,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let school = |name: &str, target_ec: f64, color: &str, alias: &str| SchoolConfig {
            name: name.to_string(),
            target_ec,
            color: Some(color.to_string()),
            aliases: vec![alias.to_string()],
            environment_file: None,
        };
        Self {
            data_dir: PathBuf::from("data"),
            schools: vec![
                school("송도고", 1.0, "#1f77b4", "songdo"),
                school("하늘고", 2.0, "#2ca02c", "haneul"),
                school("아라고", 4.0, "#ff7f0e", "ara"),
                school("동산고", 8.0, "#d62728", "dongsan"),
            ],
            environment: EnvironmentDiscovery::default(),
            growth: GrowthDiscovery::default(),
            columns: ColumnConfig::default(),
            delimiter: ',',
        }
    }
}

/// One experimental unit and its EC treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolConfig {
    pub name: String,
    /// Target nutrient-solution EC (dS/m).
    pub target_ec: f64,
    /// Display colour as `#rrggbb`; generated when absent.
    #[serde(default)]
    pub color: Option<String>,
    /// Extra filename keywords identifying this school's files.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Explicit environment file, bypassing filename discovery.
    #[serde(default)]
    pub environment_file: Option<PathBuf>,
}

impl SchoolConfig {
    /// Name followed by aliases, in lookup order.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Environment discovery rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum EnvironmentDiscovery {
    /// For each school, the first file whose name contains the school name
    /// (or one of its aliases).
    Keyword,
    /// Every file with `extension`; the school key is the filename's
    /// leading token before `separator`.
    Extension {
        #[serde(default = "default_env_extension")]
        extension: String,
        #[serde(default = "default_separator")]
        separator: char,
    },
}

impl Default for EnvironmentDiscovery {
    fn default() -> Self {
        EnvironmentDiscovery::Keyword
    }
}

fn default_env_extension() -> String {
    "csv".to_string()
}

fn default_separator() -> char {
    '_'
}

/// Growth workbook discovery rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum GrowthDiscovery {
    /// Use exactly this workbook.
    Path { path: PathBuf },
    /// First file whose name contains `keyword` and has `extension`.
    Keyword {
        keyword: String,
        #[serde(default = "default_growth_extension")]
        extension: String,
    },
    /// First file with `extension`.
    Extension {
        #[serde(default = "default_growth_extension")]
        extension: String,
    },
}

impl Default for GrowthDiscovery {
    fn default() -> Self {
        GrowthDiscovery::Extension {
            extension: default_growth_extension(),
        }
    }
}

fn default_growth_extension() -> String {
    "xlsx".to_string()
}

/// Column names read by aggregation and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub time: String,
    pub temperature: String,
    pub humidity: String,
    pub ph: String,
    pub ec: String,
    pub fresh_weight: String,
    pub leaf_count: String,
    pub shoot_length: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            time: "time".into(),
            temperature: "temperature".into(),
            humidity: "humidity".into(),
            ph: "ph".into(),
            ec: "ec".into(),
            fresh_weight: "생중량(g)".into(),
            leaf_count: "잎 수(장)".into(),
            shoot_length: "지상부 길이(mm)".into(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file, then normalize and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: DashboardConfig = serde_json::from_str(&text)?;
        config.normalized()
    }

    /// NFC-normalize every identifier, then validate.
    pub fn normalized(mut self) -> Result<Self> {
        for school in &mut self.schools {
            school.name = nfc_string(school.name.trim());
            school.aliases = school.aliases.iter().map(|a| nfc_string(a.trim())).collect();
        }
        let c = &mut self.columns;
        for column in [
            &mut c.time,
            &mut c.temperature,
            &mut c.humidity,
            &mut c.ph,
            &mut c.ec,
            &mut c.fresh_weight,
            &mut c.leaf_count,
            &mut c.shoot_length,
        ] {
            *column = nfc_string(column);
        }
        if let GrowthDiscovery::Keyword { keyword, .. } = &mut self.growth {
            *keyword = nfc_string(keyword);
        }
        self.validate()?;
        Ok(self)
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.schools.is_empty() {
            return Err(PipelineError::Config("no schools configured".into()));
        }
        let mut seen = BTreeSet::new();
        for school in &self.schools {
            if school.name.is_empty() {
                return Err(PipelineError::Config("school with empty name".into()));
            }
            if !seen.insert(nfc_string(&school.name)) {
                return Err(PipelineError::Config(format!(
                    "school '{}' is listed twice",
                    school.name
                )));
            }
            if !school.target_ec.is_finite() || school.target_ec <= 0.0 {
                return Err(PipelineError::Config(format!(
                    "school '{}': target EC must be a positive number, got {}",
                    school.name, school.target_ec
                )));
            }
            if let Some(hex) = &school.color {
                if color::parse_hex(hex).is_none() {
                    return Err(PipelineError::Config(format!(
                        "school '{}': colour '{hex}' is not #rrggbb",
                        school.name
                    )));
                }
            }
            if school.aliases.iter().any(|a| a.is_empty()) {
                return Err(PipelineError::Config(format!(
                    "school '{}' has an empty alias",
                    school.name
                )));
            }
        }
        if !self.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "delimiter '{}' is not an ASCII character",
                self.delimiter
            )));
        }
        if let EnvironmentDiscovery::Extension { extension, .. } = &self.environment {
            if extension.trim_start_matches('.').is_empty() {
                return Err(PipelineError::Config("empty environment extension".into()));
            }
        }
        match &self.growth {
            GrowthDiscovery::Keyword { keyword, extension } => {
                if keyword.is_empty() {
                    return Err(PipelineError::Config("empty growth keyword".into()));
                }
                if extension.trim_start_matches('.').is_empty() {
                    return Err(PipelineError::Config("empty growth extension".into()));
                }
            }
            GrowthDiscovery::Extension { extension } => {
                if extension.trim_start_matches('.').is_empty() {
                    return Err(PipelineError::Config("empty growth extension".into()));
                }
            }
            GrowthDiscovery::Path { .. } => {}
        }
        Ok(())
    }

    /// Find the configured school a filename key or sheet name refers to,
    /// by name or alias, ignoring case.
    pub fn resolve_school(&self, key: &str) -> Option<&SchoolConfig> {
        let key = nfc_lower(key);
        self.schools
            .iter()
            .find(|s| s.keywords().any(|k| nfc_lower(k) == key))
    }

    pub fn school(&self, name: &str) -> Option<&SchoolConfig> {
        let name = nfc_string(name);
        self.schools.iter().find(|s| s.name == name)
    }

    /// Resolve a possibly relative path against `data_dir`.
    pub fn data_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}
