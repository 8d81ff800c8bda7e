use std::{fs::File, io::Cursor, path::Path};

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDateTime, NaiveTime};
use memmap2::Mmap;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use crate::{
    config::ColumnNames,
    processor::{
        ProcessorError,
        loader::{ColumnIndex, parse_number, parse_time},
        record::{SalesRecord, Table},
    },
};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Loads one worksheet of a spreadsheet file without any fallback
///
/// The format (xlsx, xlsb, xls, ods) is detected from the file content.
/// `skip_rows` rows are dropped before the header row, and columns are then
/// located by header name exactly as for CSV input.
pub fn load_workbook(
    path: &Path,
    sheet: &str,
    skip_rows: usize,
    columns: &ColumnNames,
) -> Result<Table, ProcessorError> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(&mmap[..]))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(ProcessorError::MissingSheet(sheet.to_string()));
    }
    let range = workbook.worksheet_range(sheet)?;
    parse_range(&range, skip_rows, columns)
}

/// Parses a worksheet range into a table
///
/// Line numbers in errors are 1-based sheet rows.
pub fn parse_range(
    range: &Range<Data>,
    skip_rows: usize,
    columns: &ColumnNames,
) -> Result<Table, ProcessorError> {
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let rows: Vec<&[Data]> = range.rows().skip(skip_rows).collect();

    let (header_row, data_rows) = rows.split_first().ok_or(ProcessorError::MissingHeader)?;
    let header_cells: Vec<String> = header_row.iter().map(cell_text).collect();
    if header_cells.iter().all(String::is_empty) {
        return Err(ProcessorError::MissingHeader);
    }
    let headers: Vec<&str> = header_cells.iter().map(String::as_str).collect();
    let index = ColumnIndex::resolve(&headers, columns)?;

    // header is sheet row first_row + skip_rows + 1
    let first_line = first_row + skip_rows + 2;
    let parsed: Vec<Option<SalesRecord>> = data_rows
        .par_iter()
        .enumerate()
        .map(|(i, row)| parse_row(row, &index, &headers, first_line + i))
        .collect::<Result<_, _>>()?;

    let records: Vec<SalesRecord> = parsed.into_iter().flatten().collect();
    debug!(rows = records.len(), "parsed worksheet rows");
    Table::new(records)
}

fn parse_row(
    row: &[Data],
    index: &ColumnIndex,
    headers: &[&str],
    line: usize,
) -> Result<Option<SalesRecord>, ProcessorError> {
    if row.iter().all(is_blank) {
        return Ok(None);
    }
    let cell = |i: usize| row.get(i).unwrap_or(&Data::Empty);

    let time = cell_time(cell(index.time), line)?;
    let total_price = cell_number(cell(index.total_price), headers[index.total_price], line)?;
    let rating = cell_number(cell(index.rating), headers[index.rating], line)?;

    Ok(Some(SalesRecord::new(
        cell_text(cell(index.order_id)),
        time,
        cell_text(cell(index.city)),
        cell_text(cell(index.customer_type)),
        cell_text(cell(index.gender)),
        cell_text(cell(index.product_line)),
        total_price,
        rating,
    )))
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Text of a categorical cell; whole numbers print without a fraction
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Accepts `HH:MM:SS` text, or a time/datetime cell (fraction of a day)
fn cell_time(cell: &Data, line: usize) -> Result<NaiveTime, ProcessorError> {
    let invalid = || ProcessorError::InvalidTime {
        line,
        value: cell.to_string(),
    };

    let serial = match cell {
        Data::String(s) => return parse_time(s.trim(), line),
        Data::DateTimeIso(s) => {
            return NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .map(|dt| dt.time())
                .or_else(|_| parse_time(s, line));
        }
        Data::DateTime(dt) => dt.as_f64(),
        Data::Float(f) => *f,
        _ => return Err(invalid()),
    };

    if !serial.is_finite() || serial < 0.0 {
        return Err(invalid());
    }
    let seconds = (serial.fract() * SECONDS_PER_DAY).round() as u32 % 86_400;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).ok_or_else(invalid)
}

fn cell_number(cell: &Data, column: &str, line: usize) -> Result<Option<f64>, ProcessorError> {
    match cell {
        Data::Empty => Ok(None),
        Data::Float(f) if f.is_finite() => Ok(Some(*f)),
        Data::Int(i) => Ok(Some(*i as f64)),
        Data::String(s) => parse_number(s.trim(), column, line),
        other => Err(ProcessorError::InvalidNumber {
            line,
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}
