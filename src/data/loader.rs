use std::io::Cursor;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::array_value_to_string;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::locate::normalize_extension;
use super::model::{
    CellValue, EnvironmentRecord, EnvironmentTable, GrowthDataset, GrowthRecord, GrowthTable, Row,
};
use super::normalize::nfc_string;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Extensions [`load_environment`] understands.
pub const ENVIRONMENT_EXTENSIONS: &[&str] = &["csv", "tsv", "parquet", "pq"];

/// Whether `file_name` has an extension [`load_environment`] can read.
pub fn is_environment_file(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .is_some_and(|ext| ENVIRONMENT_EXTENSIONS.contains(&ext.as_str()))
}

/// Load one school's environment readings. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`             – delimited text, header row, `delimiter` between fields
/// * `.tsv`             – tab-delimited text
/// * `.parquet` / `.pq` – any flat schema; the time column may be text or a
///   temporal type
///
/// The `time_column` is parsed into a timestamp; a missing column or any
/// missing/unparseable value fails the whole load. Every other column keeps
/// its literal type.
pub fn load_environment(
    path: &Path,
    school: &str,
    time_column: &str,
    delimiter: u8,
) -> Result<EnvironmentTable> {
    let ext = path
        .extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .unwrap_or_default();

    let table = match ext.as_str() {
        "csv" => load_delimited(path, school, time_column, delimiter)?,
        "tsv" => load_delimited(path, school, time_column, b'\t')?,
        "parquet" | "pq" => load_parquet(path, school, time_column)?,
        other => {
            return Err(PipelineError::parse(
                path,
                format!("unsupported environment file extension '.{other}'"),
            ))
        }
    };
    debug!(
        "{school}: {} environment rows from {}",
        table.records.len(),
        path.display()
    );
    Ok(table)
}

/// Load every sheet of a workbook (`.xlsx`, `.xlsm`, `.xls`, `.ods`).
///
/// Each sheet becomes one [`GrowthTable`] keyed by its NFC-normalized name.
/// The first row of a sheet is the header. No column is required here.
pub fn load_growth_workbook(path: &Path) -> Result<GrowthDataset> {
    // Sniff the format from the content so `DATA.XLSX` opens like `data.xlsx`.
    let bytes = std::fs::read(path)?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| PipelineError::parse(path, e.to_string()))?;

    let mut dataset = GrowthDataset::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| PipelineError::parse(path, format!("sheet '{sheet}': {e}")))?;

        let key = nfc_string(&sheet);
        let table = growth_table(&key, &range);
        debug!("sheet '{key}': {} growth rows", table.records.len());

        if dataset.insert(key.clone(), table).is_some() {
            return Err(PipelineError::parse(
                path,
                format!("two sheets are both named '{key}' after normalization"),
            ));
        }
    }
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

fn load_delimited(
    path: &Path,
    school: &str,
    time_column: &str,
    delimiter: u8,
) -> Result<EnvironmentTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(std::fs::File::open(path)?);
    let header_row = reader.headers().map_err(|e| PipelineError::parse(path, e.to_string()))?;
    let headers = normalize_headers(header_row.iter());
    let time_idx = time_index(path, &headers, time_column)?;

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| PipelineError::parse(path, e.to_string()))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let timestamp = parse_time_cell(path, row_no, record.get(time_idx))?;
        let mut values = Row::new();
        for (idx, column) in headers.iter().enumerate() {
            if idx == time_idx {
                continue;
            }
            values.insert(
                column.clone(),
                CellValue::from_text(record.get(idx).unwrap_or("")),
            );
        }
        records.push(EnvironmentRecord { timestamp, values });
    }

    Ok(EnvironmentTable {
        name: school.to_string(),
        time_column: headers[time_idx].clone(),
        columns: headers,
        records,
    })
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

fn load_parquet(path: &Path, school: &str, time_column: &str) -> Result<EnvironmentTable> {
    let invalid = |e: &dyn std::fmt::Display| PipelineError::parse(path, e.to_string());

    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| invalid(&e))?;
    let headers = normalize_headers(
        builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().as_str()),
    );
    let time_idx = time_index(path, &headers, time_column)?;
    let reader = builder.build().map_err(|e| invalid(&e))?;

    let mut records = Vec::new();
    let mut row_no = 0;
    for batch_result in reader {
        let batch = batch_result.map_err(|e| invalid(&e))?;

        // Temporal and text time columns alike go through the text parser.
        let times = cast(batch.column(time_idx), &DataType::Utf8).map_err(|e| invalid(&e))?;
        let times = times.as_string::<i32>();

        for row in 0..batch.num_rows() {
            let text = (!times.is_null(row)).then(|| times.value(row));
            let timestamp = parse_time_cell(path, row_no, text)?;

            let mut values = Row::new();
            for (idx, column) in headers.iter().enumerate() {
                if idx == time_idx {
                    continue;
                }
                values.insert(column.clone(), arrow_cell(batch.column(idx), row));
            }
            records.push(EnvironmentRecord { timestamp, values });
            row_no += 1;
        }
    }

    Ok(EnvironmentTable {
        name: school.to_string(),
        time_column: headers[time_idx].clone(),
        columns: headers,
        records,
    })
}

/// Extract a single cell from an Arrow column, keeping its literal type.
fn arrow_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Int8 => CellValue::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => CellValue::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => CellValue::Integer(col.as_primitive::<UInt8Type>().value(row) as i64),
        DataType::UInt16 => CellValue::Integer(col.as_primitive::<UInt16Type>().value(row) as i64),
        DataType::UInt32 => CellValue::Integer(col.as_primitive::<UInt32Type>().value(row) as i64),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v)
                .map(CellValue::Integer)
                .unwrap_or(CellValue::Float(v as f64))
        }
        DataType::Float32 => CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        _ => array_value_to_string(col, row)
            .map(CellValue::String)
            .unwrap_or(CellValue::Null),
    }
}

// ---------------------------------------------------------------------------
// Workbook sheets
// ---------------------------------------------------------------------------

fn growth_table(name: &str, range: &Range<Data>) -> GrowthTable {
    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => {
            let raw: Vec<String> = header_row.iter().map(|c| c.to_string()).collect();
            normalize_headers(raw.iter().map(String::as_str))
        }
        None => Vec::new(),
    };

    let records = rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| GrowthRecord {
            values: headers
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let value = cells.get(idx).map(workbook_cell).unwrap_or(CellValue::Null);
                    (column.clone(), value)
                })
                .collect(),
        })
        .collect();

    GrowthTable {
        name: name.to_string(),
        columns: headers,
        records,
    }
}

/// Convert a workbook cell. Whole-number floats become integers, the way
/// spreadsheet readers usually surface counts.
fn workbook_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                CellValue::Integer(*f as i64)
            } else {
                CellValue::Float(*f)
            }
        }
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) if s.trim().is_empty() => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => CellValue::String(format_timestamp(&ts)),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Null,
    }
}

// ---------------------------------------------------------------------------
// Headers and timestamps
// ---------------------------------------------------------------------------

/// Clean a header row: strip a BOM and surrounding whitespace, NFC-normalize,
/// name blank headers `Unnamed: N` and suffix duplicates with `.1`, `.2`, ...
pub fn normalize_headers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (idx, header) in raw.into_iter().enumerate() {
        let cleaned = nfc_string(header.trim_start_matches('\u{feff}').trim());
        let base = if cleaned.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            cleaned
        };
        let mut name = base.clone();
        let mut n = 1;
        while out.contains(&name) {
            name = format!("{base}.{n}");
            n += 1;
        }
        out.push(name);
    }
    out
}

fn time_index(path: &Path, headers: &[String], time_column: &str) -> Result<usize> {
    let wanted = nfc_string(time_column);
    headers
        .iter()
        .position(|h| *h == wanted)
        .ok_or_else(|| PipelineError::parse(path, format!("missing time column '{wanted}'")))
}

fn parse_time_cell(path: &Path, row_no: usize, text: Option<&str>) -> Result<NaiveDateTime> {
    let text = text.map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Err(PipelineError::parse(
            path,
            format!("data row {}: missing time value", row_no + 1),
        ));
    }
    parse_timestamp(text).ok_or_else(|| {
        PipelineError::parse(
            path,
            format!("data row {}: unparseable time '{text}'", row_no + 1),
        )
    })
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse the timestamp layouts sensor loggers commonly emit.
///
/// RFC 3339 values keep their wall-clock time (the offset is dropped). Bare
/// dates are read as midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Canonical text form used when timestamps are written back out.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
