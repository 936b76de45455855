//! Fixture directories for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

pub const SCHOOLS: [(&str, &str); 4] = [
    ("송도고", "songdo"),
    ("하늘고", "haneul"),
    ("아라고", "ara"),
    ("동산고", "dongsan"),
];

/// Fresh weights per sheet, in [`SCHOOLS`] order.
pub const FRESH_WEIGHTS: [&[f64]; 4] = [
    &[5.1, 6.3, 4.8],
    &[12.4, 13.9, 11.2, 14.05],
    &[9.0, 8.5],
    &[3.3, 2.9, 3.6],
];

pub const ENV_ROWS: usize = 3;

pub fn env_csv(ec: f64) -> String {
    format!(
        "time,temperature,humidity,ph,ec\n\
         2025-05-01 00:00:00,20.1,61.0,6.1,{ec}\n\
         2025-05-01 01:00:00,19.8,63.5,6.0,{ec}\n\
         2025-05-01 02:00:00,19.5,64.0,6.2,{ec}\n"
    )
}

pub fn write_growth_workbook(path: &Path, sheets: &[(&str, &[f64])]) {
    let mut workbook = Workbook::new();
    for (name, weights) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        sheet.write_string(0, 0, "개체번호").unwrap();
        sheet.write_string(0, 1, "생중량(g)").unwrap();
        sheet.write_string(0, 2, "잎 수(장)").unwrap();
        sheet.write_string(0, 3, "지상부 길이(mm)").unwrap();
        for (i, w) in weights.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_number(row, 0, row).unwrap();
            sheet.write_number(row, 1, *w).unwrap();
            sheet.write_number(row, 2, 7 + i as u32).unwrap();
            sheet.write_number(row, 3, 80.5 + i as f64).unwrap();
        }
    }
    workbook.save(path).unwrap();
}

/// `songdo_env.csv`, `haneul_env.csv`, `ara_env.csv`, `dongsan_env.csv` and
/// `growth_results.xlsx` with one sheet per school.
pub fn scenario_dir() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    for (i, (_, alias)) in SCHOOLS.iter().enumerate() {
        let ec = [1.0, 2.0, 4.0, 8.0][i];
        std::fs::write(tmp.path().join(format!("{alias}_env.csv")), env_csv(ec)).unwrap();
    }
    let sheets: Vec<(&str, &[f64])> = SCHOOLS
        .iter()
        .zip(FRESH_WEIGHTS)
        .map(|((name, _), weights)| (*name, weights))
        .collect();
    write_growth_workbook(&growth_path(tmp.path()), &sheets);
    tmp
}

pub fn growth_path(dir: &Path) -> PathBuf {
    dir.join("growth_results.xlsx")
}
