//! Re-encode loaded tables: one school's environment readings as CSV, XLSX
//! or Parquet, and the whole growth dataset as a workbook with one sheet per
//! school. These are pass-through encodings; nothing is recomputed.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::ValueEnum;
use log::info;
use parquet::arrow::ArrowWriter;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::data::loader::format_timestamp;
use crate::data::model::{CellValue, EnvironmentTable, GrowthDataset};
use crate::error::Result;

/// File name the dashboard offers for the growth workbook download.
pub const GROWTH_EXPORT_FILE_NAME: &str = "학교별_생육결과.xlsx";

static NULL_CELL: CellValue = CellValue::Null;

/// Output encoding of an environment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Parquet,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Parquet => "parquet",
        }
    }
}

/// `{school}_환경데이터.{ext}`
pub fn environment_file_name(school: &str, format: ExportFormat) -> String {
    format!("{school}_환경데이터.{}", format.extension())
}

/// Write `table` to `path` in `format`.
pub fn write_environment(
    table: &EnvironmentTable,
    path: &Path,
    format: ExportFormat,
) -> Result<()> {
    match format {
        ExportFormat::Csv => environment_to_csv(table, std::fs::File::create(path)?)?,
        ExportFormat::Xlsx => std::fs::write(path, environment_to_xlsx(table)?)?,
        ExportFormat::Parquet => environment_to_parquet(table, std::fs::File::create(path)?)?,
    }
    info!(
        "wrote {} rows of {} to {}",
        table.records.len(),
        table.name,
        path.display()
    );
    Ok(())
}

/// Write every growth sheet to one workbook at `path`.
pub fn write_growth(dataset: &GrowthDataset, order: &[String], path: &Path) -> Result<()> {
    std::fs::write(path, growth_to_xlsx(dataset, order)?)?;
    info!("wrote {} growth sheets to {}", dataset.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Environment encoders
// ---------------------------------------------------------------------------

/// Cells of one environment row in column order, the time column as text.
fn environment_row<'a>(table: &'a EnvironmentTable, row: usize) -> Vec<CellValueRef<'a>> {
    let record = &table.records[row];
    table
        .columns
        .iter()
        .map(|column| {
            if *column == table.time_column {
                CellValueRef::Time(format_timestamp(&record.timestamp))
            } else {
                CellValueRef::Cell(record.values.get(column).unwrap_or(&NULL_CELL))
            }
        })
        .collect()
}

enum CellValueRef<'a> {
    Time(String),
    Cell(&'a CellValue),
}

/// Delimited text with a header row.
pub fn environment_to_csv<W: Write>(table: &EnvironmentTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&table.columns)?;
    for row in 0..table.records.len() {
        let fields: Vec<String> = environment_row(table, row)
            .into_iter()
            .map(|cell| match cell {
                CellValueRef::Time(text) => text,
                CellValueRef::Cell(value) => csv_field(value),
            })
            .collect();
        csv.write_record(&fields)?;
    }
    csv.flush()?;
    Ok(())
}

/// Text form of a cell that reads back with the same type: whole floats keep
/// their fractional part (`21.0`, not `21`).
fn csv_field(value: &CellValue) -> String {
    match value {
        CellValue::Float(v) => format!("{v:?}"),
        other => other.to_string(),
    }
}

/// Single-sheet workbook named after the school.
pub fn environment_to_xlsx(table: &EnvironmentTable) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(&table.name)?;

    write_header(sheet, &table.columns, &bold)?;
    for row in 0..table.records.len() {
        let excel_row = excel_row(row + 1)?;
        for (col, cell) in environment_row(table, row).into_iter().enumerate() {
            let col = excel_col(col)?;
            match cell {
                CellValueRef::Time(text) => {
                    sheet.write_string(excel_row, col, text)?;
                }
                CellValueRef::Cell(value) => write_cell(sheet, excel_row, col, value)?,
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

#[derive(Clone, Copy)]
enum ColumnKind {
    Integer,
    Float,
    Bool,
    Text,
}

/// Narrowest Arrow type holding every non-null cell.
fn column_kind<'a>(cells: impl Iterator<Item = &'a CellValue>) -> ColumnKind {
    let (mut ints, mut floats, mut bools, mut texts) = (0, 0, 0, 0);
    for cell in cells {
        match cell {
            CellValue::Integer(_) => ints += 1,
            CellValue::Float(_) => floats += 1,
            CellValue::Bool(_) => bools += 1,
            CellValue::String(_) => texts += 1,
            CellValue::Null => {}
        }
    }
    match (ints, floats, bools, texts) {
        (_, _, _, t) if t > 0 => ColumnKind::Text,
        (i, f, b, _) if b > 0 && i + f > 0 => ColumnKind::Text,
        (0, 0, b, _) if b > 0 => ColumnKind::Bool,
        (i, 0, _, _) if i > 0 => ColumnKind::Integer,
        _ => ColumnKind::Float,
    }
}

/// Parquet file with the time column as text and every other column typed
/// by its contents.
pub fn environment_to_parquet<W: Write + Send>(
    table: &EnvironmentTable,
    writer: W,
) -> Result<()> {
    let mut fields = Vec::with_capacity(table.columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns.len());

    for column in &table.columns {
        if *column == table.time_column {
            let times: Vec<String> = table
                .records
                .iter()
                .map(|r| format_timestamp(&r.timestamp))
                .collect();
            fields.push(Field::new(column, DataType::Utf8, false));
            arrays.push(Arc::new(StringArray::from(times)));
            continue;
        }

        let cells: Vec<&CellValue> = table
            .records
            .iter()
            .map(|r| r.values.get(column).unwrap_or(&NULL_CELL))
            .collect();
        let (data_type, array): (DataType, ArrayRef) = match column_kind(cells.iter().copied()) {
            ColumnKind::Integer => (
                DataType::Int64,
                Arc::new(Int64Array::from(
                    cells
                        .iter()
                        .map(|c| match c {
                            CellValue::Integer(i) => Some(*i),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
            ),
            ColumnKind::Float => (
                DataType::Float64,
                Arc::new(Float64Array::from(
                    cells.iter().map(|c| c.as_f64()).collect::<Vec<_>>(),
                )),
            ),
            ColumnKind::Bool => (
                DataType::Boolean,
                Arc::new(BooleanArray::from(
                    cells
                        .iter()
                        .map(|c| match c {
                            CellValue::Bool(b) => Some(*b),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                )),
            ),
            ColumnKind::Text => (
                DataType::Utf8,
                Arc::new(StringArray::from(
                    cells
                        .iter()
                        .map(|c| (!c.is_null()).then(|| c.to_string()))
                        .collect::<Vec<_>>(),
                )),
            ),
        };
        fields.push(Field::new(column, data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let mut parquet = ArrowWriter::try_new(writer, schema, None)?;
    parquet.write(&batch)?;
    parquet.close()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Growth encoder
// ---------------------------------------------------------------------------

/// One sheet per school. Sheets named in `order` come first, in that
/// order; any remaining sheets follow in dataset order.
pub fn growth_to_xlsx(dataset: &GrowthDataset, order: &[String]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let ordered = order
        .iter()
        .filter_map(|name| dataset.get(name))
        .chain(dataset.values().filter(|t| !order.contains(&t.name)));

    for table in ordered {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&table.name)?;
        write_header(sheet, &table.columns, &bold)?;
        for (row, record) in table.records.iter().enumerate() {
            let excel_row = excel_row(row + 1)?;
            for (col, column) in table.columns.iter().enumerate() {
                if let Some(value) = record.values.get(column) {
                    write_cell(sheet, excel_row, excel_col(col)?, value)?;
                }
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

// ---------------------------------------------------------------------------
// Worksheet helpers
// ---------------------------------------------------------------------------

fn write_header(sheet: &mut Worksheet, columns: &[String], bold: &Format) -> Result<()> {
    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, excel_col(col)?, name, bold)?;
    }
    Ok(())
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &CellValue) -> Result<()> {
    match value {
        CellValue::Integer(i) => {
            sheet.write_number(row, col, *i as f64)?;
        }
        CellValue::Float(f) if f.is_finite() => {
            sheet.write_number(row, col, *f)?;
        }
        CellValue::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        CellValue::String(s) => {
            sheet.write_string(row, col, s)?;
        }
        CellValue::Float(_) | CellValue::Null => {}
    }
    Ok(())
}

fn excel_row(row: usize) -> Result<u32> {
    u32::try_from(row).map_err(|_| XlsxError::RowColumnLimitError.into())
}

fn excel_col(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError.into())
}
