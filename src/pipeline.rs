//! Locate and load both datasets for a configuration.
//!
//! Both datasets must load for the pipeline to produce anything. The first
//! failure is returned and no partial dataset is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::{DashboardConfig, EnvironmentDiscovery, GrowthDiscovery, SchoolConfig};
use crate::data::loader::{self, is_environment_file};
use crate::data::locate::{
    find_by_extension, has_extension, leading_token, list_files, normalize_extension, Candidate,
};
use crate::data::model::{Datasets, EnvironmentDataset, GrowthDataset};
use crate::data::normalize::nfc_string;
use crate::error::{PipelineError, Result};

/// Load the environment and growth datasets described by `config`.
pub fn load_datasets(config: &DashboardConfig) -> Result<Datasets> {
    let environment = load_environment_dataset(config)?;
    let growth = load_growth_dataset(config)?;
    info!(
        "loaded {} environment tables and {} growth sheets from {}",
        environment.len(),
        growth.len(),
        config.data_dir.display()
    );
    Ok(Datasets {
        environment,
        growth,
    })
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Environment file of every configured school, in configuration order.
pub fn locate_environment_files(config: &DashboardConfig) -> Result<Vec<(String, PathBuf)>> {
    ensure_dir(&config.data_dir)?;

    let discovered: BTreeMap<String, PathBuf> = match &config.environment {
        EnvironmentDiscovery::Keyword => by_keyword(config)?,
        EnvironmentDiscovery::Extension {
            extension,
            separator,
        } => by_leading_token(config, extension, *separator)?,
    };

    let mut located = Vec::with_capacity(config.schools.len());
    for school in &config.schools {
        let path = match &school.environment_file {
            Some(explicit) => {
                let path = config.data_path(explicit);
                if !path.is_file() {
                    return Err(PipelineError::FileNotFound {
                        what: format!("{} environment data ({})", school.name, explicit.display()),
                        dir: config.data_dir.clone(),
                    });
                }
                path
            }
            None => discovered
                .get(&school.name)
                .cloned()
                .ok_or_else(|| PipelineError::FileNotFound {
                    what: format!("{} environment data", school.name),
                    dir: config.data_dir.clone(),
                })?,
        };
        info!("{}: environment data {}", school.name, path.display());
        located.push((school.name.clone(), path));
    }
    Ok(located)
}

/// Locate and parse every school's environment file.
pub fn load_environment_dataset(config: &DashboardConfig) -> Result<EnvironmentDataset> {
    let delimiter = u8::try_from(config.delimiter).map_err(|_| {
        PipelineError::Config(format!("delimiter '{}' is not ASCII", config.delimiter))
    })?;

    let mut dataset = EnvironmentDataset::new();
    for (school, path) in locate_environment_files(config)? {
        let table = loader::load_environment(&path, &school, &config.columns.time, delimiter)?;
        dataset.insert(school, table);
    }
    Ok(dataset)
}

/// Keyword rule: a school's name, then its aliases, as filename substrings.
fn by_keyword(config: &DashboardConfig) -> Result<BTreeMap<String, PathBuf>> {
    let files: Vec<Candidate> = list_files(&config.data_dir)?
        .into_iter()
        .filter(|c| is_environment_file(&c.name))
        .collect();

    let mut found = BTreeMap::new();
    let mut claimed: BTreeMap<PathBuf, String> = BTreeMap::new();
    for school in config.schools.iter().filter(|s| s.environment_file.is_none()) {
        let Some(path) = keyword_match(&files, school, &config.schools) else {
            continue;
        };
        if let Some(other) = claimed.insert(path.clone(), school.name.clone()) {
            warn!(
                "{} matches both {other} and {}; check the file names",
                path.display(),
                school.name
            );
        }
        found.insert(school.name.clone(), path);
    }
    Ok(found)
}

/// First file containing one of `school`'s keywords, skipping files that
/// also contain a longer keyword of another school which itself contains
/// this one (so "ara" never claims a "tiara" school's file).
fn keyword_match(
    files: &[Candidate],
    school: &SchoolConfig,
    all: &[SchoolConfig],
) -> Option<PathBuf> {
    for keyword in school.keywords() {
        let keyword = nfc_string(keyword);
        let shadowing: Vec<String> = all
            .iter()
            .filter(|other| other.name != school.name)
            .flat_map(|other| other.keywords())
            .map(nfc_string)
            .filter(|k| k.len() > keyword.len() && k.contains(&keyword))
            .collect();

        let hit = files.iter().find(|c| {
            c.name.contains(&keyword) && !shadowing.iter().any(|k| c.name.contains(k.as_str()))
        });
        if let Some(c) = hit {
            return Some(c.path.clone());
        }
    }
    None
}

/// Extension rule: every file with `extension`, keyed by its leading token.
fn by_leading_token(
    config: &DashboardConfig,
    extension: &str,
    separator: char,
) -> Result<BTreeMap<String, PathBuf>> {
    let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in find_by_extension(&config.data_dir, extension)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let token = leading_token(&name, separator);

        let Some(school) = config.resolve_school(&token) else {
            warn!("{}: '{token}' is not a configured school, skipping", path.display());
            continue;
        };
        if school.environment_file.is_some() {
            continue;
        }
        if let Some(first) = found.get(&school.name) {
            return Err(PipelineError::DuplicateSource {
                school: school.name.clone(),
                first: first.clone(),
                second: path,
            });
        }
        found.insert(school.name.clone(), path);
    }
    Ok(found)
}

// ---------------------------------------------------------------------------
// Growth
// ---------------------------------------------------------------------------

/// Find the growth workbook according to the configured rule.
pub fn locate_growth_workbook(config: &DashboardConfig) -> Result<PathBuf> {
    let dir = &config.data_dir;
    let not_found = |what: String| PipelineError::FileNotFound {
        what,
        dir: dir.clone(),
    };

    let path = match &config.growth {
        GrowthDiscovery::Path { path } => {
            let path = config.data_path(path);
            if !path.is_file() {
                return Err(not_found(format!("growth workbook {}", path.display())));
            }
            path
        }
        GrowthDiscovery::Keyword { keyword, extension } => {
            ensure_dir(dir)?;
            let keyword = nfc_string(keyword);
            let target = normalize_extension(extension);
            list_files(dir)?
                .into_iter()
                .find(|c| c.name.contains(&keyword) && has_extension(&c.name, &target))
                .map(|c| c.path)
                .ok_or_else(|| {
                    not_found(format!("growth workbook containing '{keyword}' (.{target})"))
                })?
        }
        GrowthDiscovery::Extension { extension } => {
            ensure_dir(dir)?;
            find_by_extension(dir, extension)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    not_found(format!("growth workbook (.{})", normalize_extension(extension)))
                })?
        }
    };
    info!("growth workbook {}", path.display());
    Ok(path)
}

/// Locate and parse the growth workbook: one table per sheet.
pub fn load_growth_dataset(config: &DashboardConfig) -> Result<GrowthDataset> {
    let path = locate_growth_workbook(config)?;
    let dataset = loader::load_growth_workbook(&path)?;
    check_growth_dataset(config, &path, dataset)
}

/// Reject a workbook without sheets and warn about schools lacking one.
fn check_growth_dataset(
    config: &DashboardConfig,
    path: &Path,
    dataset: GrowthDataset,
) -> Result<GrowthDataset> {
    if dataset.is_empty() {
        return Err(PipelineError::EmptyDataset {
            what: format!("growth workbook {}", path.display()),
        });
    }
    for school in &config.schools {
        if !dataset.contains_key(&school.name) {
            warn!("growth workbook has no sheet named '{}'", school.name);
        }
    }
    Ok(dataset)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(PipelineError::FileNotFound {
            what: "data directory".to_string(),
            dir: dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school(name: &str, aliases: &[&str]) -> SchoolConfig {
        SchoolConfig {
            name: name.into(),
            target_ec: 1.0,
            color: None,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            environment_file: None,
        }
    }

    fn candidates(names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .map(|n| Candidate {
                path: PathBuf::from(n),
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn substring_school_does_not_steal_longer_name() {
        let schools = vec![school("ara", &[]), school("tiara", &[])];
        let files = candidates(&["ara_env.csv", "tiara_env.csv"]);

        assert_eq!(
            keyword_match(&files, &schools[0], &schools),
            Some(PathBuf::from("ara_env.csv"))
        );
        assert_eq!(
            keyword_match(&files, &schools[1], &schools),
            Some(PathBuf::from("tiara_env.csv"))
        );

        // Only the longer school's file exists: the shorter name finds nothing.
        let only_tiara = candidates(&["tiara_env.csv"]);
        assert_eq!(keyword_match(&only_tiara, &schools[0], &schools), None);
    }

    #[test]
    fn alias_is_tried_after_name() {
        let schools = vec![school("송도고", &["songdo"])];
        let files = candidates(&["haneul_env.csv", "songdo_env.csv"]);

        assert_eq!(
            keyword_match(&files, &schools[0], &schools),
            Some(PathBuf::from("songdo_env.csv"))
        );
    }

    #[test]
    fn workbook_without_sheets_is_an_empty_dataset() {
        let config = DashboardConfig::default();
        let err = check_growth_dataset(&config, Path::new("g.xlsx"), GrowthDataset::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset { .. }), "{err}");
    }

    #[test]
    fn missing_data_dir_is_file_not_found() {
        let config = DashboardConfig {
            data_dir: PathBuf::from("/definitely/not/here"),
            ..DashboardConfig::default()
        };
        assert!(matches!(
            locate_environment_files(&config),
            Err(PipelineError::FileNotFound { .. })
        ));
        assert!(matches!(
            locate_growth_workbook(&config),
            Err(PipelineError::FileNotFound { .. })
        ));
    }
}
