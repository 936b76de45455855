//! Cross-school comparison: per-school means and the best-growing school.
//!
//! This is where column names are first required, so a table without an
//! expected column fails here with `MissingColumn`, not at load time.

use std::fmt;

use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::color::SchoolColors;
use crate::config::DashboardConfig;
use crate::data::model::{Datasets, Tabular};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One line of the experiment overview table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchoolOverview {
    pub school: String,
    pub target_ec: f64,
    pub specimens: usize,
    pub color: String,
}

/// Experiment-wide figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub schools: Vec<SchoolOverview>,
    pub total_specimens: usize,
    pub mean_temperature: Option<f64>,
    pub mean_humidity: Option<f64>,
}

/// Mean environment readings of one school next to its target EC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentMeans {
    pub school: String,
    pub target_ec: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub ph: Option<f64>,
    pub ec: Option<f64>,
}

/// Growth outcome of one school.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthComparison {
    pub school: String,
    pub target_ec: f64,
    pub specimens: usize,
    pub fresh_weight: Option<f64>,
    pub fresh_weight_min: Option<f64>,
    pub fresh_weight_max: Option<f64>,
    pub leaf_count: Option<f64>,
    pub shoot_length: Option<f64>,
}

/// The school with the highest mean fresh weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestSchool {
    pub school: String,
    pub target_ec: f64,
    pub mean_fresh_weight: f64,
}

/// Everything the dashboard shows, minus the charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub overview: Overview,
    pub environment: Vec<EnvironmentMeans>,
    pub growth: Vec<GrowthComparison>,
    pub best: Option<BestSchool>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Arithmetic mean, `None` for no values.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean of the non-null cells of `column`.
pub fn column_mean<T: Tabular>(table: &T, column: &str) -> Result<Option<f64>> {
    Ok(mean(&table.numeric_values(column)?))
}

/// Build every section of the summary.
pub fn summarize(config: &DashboardConfig, datasets: &Datasets) -> Result<Summary> {
    let overview = overview(config, datasets)?;
    let environment = environment_means(config, datasets)?;
    let growth = growth_comparison(config, datasets)?;
    let best = best_school(&growth);
    Ok(Summary {
        overview,
        environment,
        growth,
        best,
    })
}

/// Specimen counts per school plus experiment-wide temperature and humidity.
pub fn overview(config: &DashboardConfig, datasets: &Datasets) -> Result<Overview> {
    let colors = SchoolColors::new(&config.schools);

    let schools: Vec<SchoolOverview> = config
        .schools
        .iter()
        .map(|s| SchoolOverview {
            school: s.name.clone(),
            target_ec: s.target_ec,
            specimens: datasets.growth.get(&s.name).map(|t| t.len()).unwrap_or(0),
            color: colors.hex_for(&s.name),
        })
        .collect();
    let total_specimens = schools.iter().map(|s| s.specimens).sum();

    let mut temperature = Vec::new();
    let mut humidity = Vec::new();
    for table in datasets.environment.values() {
        temperature.extend(table.numeric_values(&config.columns.temperature)?);
        humidity.extend(table.numeric_values(&config.columns.humidity)?);
    }

    Ok(Overview {
        schools,
        total_specimens,
        mean_temperature: mean(&temperature),
        mean_humidity: mean(&humidity),
    })
}

/// Mean temperature, humidity, pH and EC of every loaded school, in
/// configuration order.
pub fn environment_means(
    config: &DashboardConfig,
    datasets: &Datasets,
) -> Result<Vec<EnvironmentMeans>> {
    let columns = &config.columns;
    config
        .schools
        .iter()
        .filter_map(|s| datasets.environment.get(&s.name).map(|t| (s, t)))
        .map(|(school, table)| {
            Ok(EnvironmentMeans {
                school: school.name.clone(),
                target_ec: school.target_ec,
                temperature: column_mean(table, &columns.temperature)?,
                humidity: column_mean(table, &columns.humidity)?,
                ph: column_mean(table, &columns.ph)?,
                ec: column_mean(table, &columns.ec)?,
            })
        })
        .collect()
}

/// Growth means of every configured school. Each school needs a sheet.
pub fn growth_comparison(
    config: &DashboardConfig,
    datasets: &Datasets,
) -> Result<Vec<GrowthComparison>> {
    let columns = &config.columns;
    config
        .schools
        .iter()
        .map(|school| {
            let table = datasets.growth.get(&school.name).ok_or_else(|| {
                PipelineError::MissingSchool {
                    school: school.name.clone(),
                    dataset: "growth".to_string(),
                }
            })?;
            let weights = table.numeric_values(&columns.fresh_weight)?;
            Ok(GrowthComparison {
                school: school.name.clone(),
                target_ec: school.target_ec,
                specimens: table.len(),
                fresh_weight: mean(&weights),
                fresh_weight_min: weights.iter().copied().reduce(f64::min),
                fresh_weight_max: weights.iter().copied().reduce(f64::max),
                leaf_count: column_mean(table, &columns.leaf_count)?,
                shoot_length: column_mean(table, &columns.shoot_length)?,
            })
        })
        .collect()
}

/// Highest mean fresh weight; the earlier school wins a tie.
pub fn best_school(growth: &[GrowthComparison]) -> Option<BestSchool> {
    growth
        .iter()
        .filter_map(|g| g.fresh_weight.map(|w| (g, w)))
        .fold(None, |best: Option<(&GrowthComparison, f64)>, (g, w)| match best {
            Some((_, best_w)) if best_w >= w => best,
            _ => Some((g, w)),
        })
        .map(|(g, w)| BestSchool {
            school: g.school.clone(),
            target_ec: g.target_ec,
            mean_fresh_weight: w,
        })
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

/// Left-aligned in a number of terminal columns; wide characters count two.
struct Name<'a>(&'a str, usize);

impl fmt::Display for Name<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pad = self.1.saturating_sub(self.0.width());
        write!(f, "{}{:pad$}", self.0, "")
    }
}

struct Num(Option<f64>);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v:>10.2}"),
            None => write!(f, "{:>10}", "-"),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Experiment overview")?;
        for s in &self.overview.schools {
            writeln!(
                f,
                "  {} EC {:>4.1}  {:>4} specimens  {}",
                Name(&s.school, 12),
                s.target_ec,
                s.specimens,
                s.color
            )?;
        }
        writeln!(f, "  total specimens   {}", self.overview.total_specimens)?;
        writeln!(f, "  mean temperature {}", Num(self.overview.mean_temperature))?;
        writeln!(f, "  mean humidity    {}", Num(self.overview.mean_humidity))?;
        writeln!(f)?;

        writeln!(f, "Environment means")?;
        writeln!(
            f,
            "  {:<12} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "school", "temp", "humidity", "pH", "EC", "target EC"
        )?;
        for e in &self.environment {
            writeln!(
                f,
                "  {} {} {} {} {} {}",
                Name(&e.school, 12),
                Num(e.temperature),
                Num(e.humidity),
                Num(e.ph),
                Num(e.ec),
                Num(Some(e.target_ec))
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Growth by EC")?;
        writeln!(
            f,
            "  {:<12} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "school", "EC", "fresh (g)", "leaves", "shoot (mm)", "count"
        )?;
        for g in &self.growth {
            let marker = match &self.best {
                Some(best) if best.school == g.school => "  <- best",
                _ => "",
            };
            writeln!(
                f,
                "  {} {} {} {} {} {:>10}{marker}",
                Name(&g.school, 12),
                Num(Some(g.target_ec)),
                Num(g.fresh_weight),
                Num(g.leaf_count),
                Num(g.shoot_length),
                g.specimens
            )?;
        }
        if let Some(best) = &self.best {
            writeln!(f)?;
            writeln!(
                f,
                "Optimal EC: {:.1} ({}, mean fresh weight {:.2} g)",
                best.target_ec, best.school, best.mean_fresh_weight
            )?;
        }
        Ok(())
    }
}
