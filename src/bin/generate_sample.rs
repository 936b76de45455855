use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Format, Workbook};

use ec_dashboard::DashboardConfig;

/// Seeded measurement noise (splitmix64 + Box-Muller). Same seed, same files.
struct Noise(u64);

impl Noise {
    fn uniform(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        ((z ^ (z >> 31)) >> 11) as f64 / (1u64 << 53) as f64
    }

    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let radius = (-2.0 * self.uniform().max(1e-15).ln()).sqrt();
        let angle = std::f64::consts::TAU * self.uniform();
        mean + std_dev * radius * angle.cos()
    }
}

/// Growth response peaking at EC 2.0 and falling off on a log scale.
fn expected_fresh_weight(ec: f64) -> f64 {
    let x = (ec / 2.0).ln();
    4.0 + 10.0 * (-(x * x) / 0.8).exp()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

const HOURS: i64 = 24 * 14;

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    std::fs::create_dir_all(&out_dir).context("creating output directory")?;

    let config = DashboardConfig::default();
    let columns = &config.columns;
    let mut rng = Noise(42);
    let start = NaiveDate::from_ymd_opt(2025, 5, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid start date")?;

    // Environment: hourly readings for two weeks, one CSV per school.
    for school in &config.schools {
        let alias = school.aliases.first().unwrap_or(&school.name);
        let path = out_dir.join(format!("{alias}_env.csv"));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record([
            &columns.time,
            &columns.temperature,
            &columns.humidity,
            &columns.ph,
            &columns.ec,
        ])?;

        for hour in 0..HOURS {
            let ts = start + Duration::hours(hour);
            let daily = (2.0 * std::f64::consts::PI * (hour % 24) as f64 / 24.0).sin();
            writer.write_record([
                ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                round2(21.0 + 3.0 * daily + rng.gauss(0.0, 0.4)).to_string(),
                round2(62.0 - 8.0 * daily + rng.gauss(0.0, 2.0)).to_string(),
                round2(rng.gauss(6.1, 0.15)).to_string(),
                round2(rng.gauss(school.target_ec, school.target_ec * 0.05)).to_string(),
            ])?;
        }
        writer.flush()?;
        println!("Wrote {HOURS} readings to {}", path.display());
    }

    // Growth: one sheet per school, 20 specimens each.
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    for school in &config.schools {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&school.name)?;
        for (col, header) in [
            "개체번호",
            columns.fresh_weight.as_str(),
            columns.leaf_count.as_str(),
            columns.shoot_length.as_str(),
        ]
        .into_iter()
        .enumerate()
        {
            sheet.write_string_with_format(0, col as u16, header, &bold)?;
        }

        let base = expected_fresh_weight(school.target_ec);
        for specimen in 1..=20u32 {
            let weight = rng.gauss(base, base * 0.12).max(0.5);
            let leaves = (weight * 0.9 + rng.gauss(3.0, 1.0)).round().max(1.0);
            let shoot = weight * 6.5 + rng.gauss(20.0, 4.0);
            sheet.write_number(specimen, 0, specimen)?;
            sheet.write_number(specimen, 1, round2(weight))?;
            sheet.write_number(specimen, 2, leaves)?;
            sheet.write_number(specimen, 3, round2(shoot))?;
        }
    }
    let growth_path = out_dir.join("growth_results.xlsx");
    workbook
        .save(&growth_path)
        .with_context(|| format!("writing {}", growth_path.display()))?;
    println!(
        "Wrote {} growth sheets to {}",
        config.schools.len(),
        growth_path.display()
    );
    Ok(())
}
