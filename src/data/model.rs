use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a loaded table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell keeping the literal type found in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Guess the literal type of a text cell: integer, float, bool, string.
    /// Empty (or whitespace-only) text is `Null`.
    pub fn from_text(s: &str) -> CellValue {
        let s = s.trim();
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        match s {
            "true" | "TRUE" | "True" => CellValue::Bool(true),
            "false" | "FALSE" | "False" => CellValue::Bool(false),
            _ => CellValue::String(s.to_string()),
        }
    }

    /// Numeric view of the cell. Booleans and text are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// One row: column name → value.
pub type Row = BTreeMap<String, CellValue>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One timestamped sensor reading (temperature, humidity, pH, EC, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentRecord {
    pub timestamp: NaiveDateTime,
    /// Every column except the time column.
    pub values: Row,
}

/// One specimen's measurements (fresh weight, leaf count, shoot length, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthRecord {
    pub values: Row,
}

// ---------------------------------------------------------------------------
// Column access shared by both table kinds
// ---------------------------------------------------------------------------

/// Read access to a loaded table by column name.
///
/// Columns are not checked at load time; a missing column surfaces here,
/// when aggregation or export first asks for it.
pub trait Tabular {
    /// Table label used in error messages (usually the school name).
    fn name(&self) -> &str;
    /// Column names in source order.
    fn columns(&self) -> &[String];
    /// Number of rows.
    fn len(&self) -> usize;
    /// Cell at `row` for `column`, `None` when the row has no such cell.
    fn cell(&self, row: usize, column: &str) -> Option<&CellValue>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has_column(&self, column: &str) -> bool {
        self.columns().iter().any(|c| c == column)
    }

    /// All non-null values of `column` as `f64`.
    ///
    /// Fails with `MissingColumn` if the column does not exist and with
    /// `NonNumeric` on the first text or boolean cell.
    fn numeric_values(&self, column: &str) -> Result<Vec<f64>> {
        if !self.has_column(column) {
            return Err(PipelineError::missing_column(self.name(), column));
        }
        let mut out = Vec::with_capacity(self.len());
        for row in 0..self.len() {
            match self.cell(row, column) {
                None | Some(CellValue::Null) => {}
                Some(value) => match value.as_f64() {
                    Some(v) if v.is_nan() => {}
                    Some(v) => out.push(v),
                    None => {
                        return Err(PipelineError::NonNumeric {
                            table: self.name().to_string(),
                            column: column.to_string(),
                            row,
                            value: value.to_string(),
                        })
                    }
                },
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// All environment readings of one school.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentTable {
    pub name: String,
    /// Name of the column parsed into [`EnvironmentRecord::timestamp`].
    pub time_column: String,
    /// All column names in source order, the time column included.
    pub columns: Vec<String>,
    pub records: Vec<EnvironmentRecord>,
}

impl Tabular for EnvironmentTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.records.get(row).and_then(|r| r.values.get(column))
    }
}

/// All specimens of one school (one workbook sheet).
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthTable {
    pub name: String,
    pub columns: Vec<String>,
    pub records: Vec<GrowthRecord>,
}

impl Tabular for GrowthTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.records.get(row).and_then(|r| r.values.get(column))
    }
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

/// School name → environment table.
pub type EnvironmentDataset = BTreeMap<String, EnvironmentTable>;

/// Normalized sheet name → growth table.
pub type GrowthDataset = BTreeMap<String, GrowthTable>;

/// Everything the pipeline produces. Built once, then shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Datasets {
    pub environment: EnvironmentDataset,
    pub growth: GrowthDataset,
}
