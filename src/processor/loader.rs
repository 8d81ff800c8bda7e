use std::{
    fmt,
    fs::File,
    io::ErrorKind,
    path::{Path, PathBuf},
    str,
};

use chrono::NaiveTime;
use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, warn};

use crate::{
    config::{ColumnNames, DashboardConfig},
    processor::{
        ProcessorError,
        record::{SalesRecord, Table},
        workbook::load_workbook,
    },
};

const TIME_FORMAT: &str = "%H:%M:%S";
const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Non-fatal condition raised while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Source file was absent, the fallback dataset was used instead
    SourceMissing { path: PathBuf },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::SourceMissing { path } => write!(
                f,
                "data file '{}' not found, showing the built-in sample data",
                path.display()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub table: Table,
    pub warning: Option<LoadWarning>,
}

/// Loads the configured source, substituting the fallback dataset when the
/// file does not exist.
///
/// Workbook sources (see [`is_workbook`]) are read from the configured sheet;
/// anything else is read as CSV.
///
/// # Errors
/// Returns a [`ProcessorError`] if:
/// - the file exists but cannot be read, or the sheet is absent
/// - a required column is missing
/// - a time cell is not a time or a numeric cell is not a finite number
/// - order ids are not unique
pub fn load(config: &DashboardConfig) -> Result<LoadOutcome, ProcessorError> {
    let path = &config.source;
    let result = if is_workbook(path) {
        load_workbook(path, &config.sheet, config.skip_rows, &config.columns)
    } else {
        load_csv(path, config.skip_rows, &config.columns)
    };

    match result {
        Ok(table) => {
            debug!(
                path = %path.display(),
                rows = table.len(),
                "loaded sales table"
            );
            Ok(LoadOutcome {
                table,
                warning: None,
            })
        }
        Err(ProcessorError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            warn!(
                path = %path.display(),
                "sales source not found, using fallback dataset"
            );
            Ok(LoadOutcome {
                table: fallback_table(),
                warning: Some(LoadWarning::SourceMissing { path: path.clone() }),
            })
        }
        Err(e) => Err(e),
    }
}

/// Spreadsheet extensions read through the workbook loader
pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|w| ext.eq_ignore_ascii_case(w))
        })
}

/// Loads a CSV file without any fallback
pub fn load_csv(
    path: &Path,
    skip_rows: usize,
    columns: &ColumnNames,
) -> Result<Table, ProcessorError> {
    let file = File::open(path)?;
    load_file(&file, skip_rows, columns)
}

fn load_file(
    file: &File,
    skip_rows: usize,
    columns: &ColumnNames,
) -> Result<Table, ProcessorError> {
    if file.metadata()?.len() == 0 {
        return Err(ProcessorError::MissingHeader);
    }
    let mmap = unsafe { Mmap::map(file)? };
    parse_csv(&mmap[..], skip_rows, columns)
}

/// Positions of the required fields within a row
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnIndex {
    pub order_id: usize,
    pub time: usize,
    pub city: usize,
    pub customer_type: usize,
    pub gender: usize,
    pub product_line: usize,
    pub total_price: usize,
    pub rating: usize,
    pub width: usize,
}

impl ColumnIndex {
    pub fn resolve(headers: &[&str], names: &ColumnNames) -> Result<Self, ProcessorError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| *h == name)
                .ok_or_else(|| ProcessorError::MissingColumn(name.to_string()))
        };

        Ok(ColumnIndex {
            order_id: find(&names.order_id)?,
            time: find(&names.time)?,
            city: find(&names.city)?,
            customer_type: find(&names.customer_type)?,
            gender: find(&names.gender)?,
            product_line: find(&names.product_line)?,
            total_price: find(&names.total_price)?,
            rating: find(&names.rating)?,
            width: headers.len(),
        })
    }
}

/// Parses an in-memory CSV buffer into a table
///
/// `skip_rows` lines are dropped before the header line. Data rows are parsed
/// in parallel chunks and merged back in file order.
pub fn parse_csv(
    buf: &[u8],
    skip_rows: usize,
    columns: &ColumnNames,
) -> Result<Table, ProcessorError> {
    let buf = buf.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(buf);

    // Skip title rows, then read the header
    let mut pos = 0;
    let mut line_no = 0;
    for _ in 0..skip_rows {
        pos = next_line_start(buf, pos).ok_or(ProcessorError::MissingHeader)?;
        line_no += 1;
    }
    let header_end = memchr::memchr(b'\n', &buf[pos..]).map_or(buf.len(), |i| pos + i);
    let header_line = trim_line(&buf[pos..header_end]);
    if header_line.is_empty() {
        return Err(ProcessorError::MissingHeader);
    }
    line_no += 1;

    let header_text = str::from_utf8(header_line)?;
    let headers: Vec<&str> = header_text.split(',').map(str::trim).collect();
    let index = ColumnIndex::resolve(&headers, columns)?;

    let data_start = (header_end + 1).min(buf.len());
    let data = &buf[data_start..];

    let num_threads = rayon::current_num_threads();
    let chunks = find_chunk_boundaries(data, num_threads, line_no + 1);

    let batches: Vec<Vec<SalesRecord>> = chunks
        .par_iter()
        .map(|&(start, end, first_line)| {
            parse_chunk(&data[start..end], &index, &headers, first_line)
        })
        .collect::<Result<_, _>>()?;

    let records: Vec<SalesRecord> = batches.into_iter().flatten().collect();
    debug!(rows = records.len(), chunks = chunks.len(), "parsed csv chunks");
    Table::new(records)
}

fn next_line_start(buf: &[u8], from: usize) -> Option<usize> {
    memchr::memchr(b'\n', &buf[from..]).map(|i| from + i + 1)
}

fn trim_line(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Splits `data` into roughly equal newline-aligned chunks
///
/// Each entry is `(start, end, line number of the first line)`.
fn find_chunk_boundaries(
    data: &[u8],
    num_chunks: usize,
    first_line: usize,
) -> Vec<(usize, usize, usize)> {
    if data.is_empty() {
        return vec![];
    }

    let num_chunks = num_chunks.max(1);
    let chunk_size = data.len() / num_chunks;
    let mut boundaries = Vec::with_capacity(num_chunks);
    let mut start = 0;
    let mut line = first_line;

    for i in 0..num_chunks - 1 {
        let mut end = ((i + 1) * chunk_size).max(start);

        // Find next newline
        while end < data.len() && data[end] != b'\n' {
            end += 1;
        }

        if end < data.len() {
            end += 1; // Include the newline
        }

        if start < end {
            boundaries.push((start, end, line));
            line += memchr_iter(b'\n', &data[start..end]).count();
        }
        start = end;
    }

    // Last chunk gets everything remaining
    if start < data.len() {
        boundaries.push((start, data.len(), line));
    }

    boundaries
}

fn parse_chunk(
    chunk: &[u8],
    index: &ColumnIndex,
    headers: &[&str],
    first_line: usize,
) -> Result<Vec<SalesRecord>, ProcessorError> {
    let mut out = Vec::new();
    let mut fields: Vec<&str> = Vec::with_capacity(index.width);

    let mut start = 0;
    let mut line_no = first_line;
    let ends = memchr_iter(b'\n', chunk).chain(
        // Final line without a trailing newline
        (!chunk.ends_with(b"\n")).then_some(chunk.len()),
    );

    for end in ends {
        let line = trim_line(&chunk[start..end]);
        let current = line_no;
        start = end + 1;
        line_no += 1;

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let text = str::from_utf8(line)?;
        fields.clear();
        fields.extend(text.split(',').map(str::trim));

        if fields.len() != index.width {
            return Err(ProcessorError::MalformedRow {
                line: current,
                expected: index.width,
                found: fields.len(),
            });
        }

        let time = parse_time(fields[index.time], current)?;

        let total_price = parse_number(
            fields[index.total_price],
            headers[index.total_price],
            current,
        )?;
        let rating = parse_number(fields[index.rating], headers[index.rating], current)?;

        out.push(SalesRecord::new(
            fields[index.order_id],
            time,
            fields[index.city],
            fields[index.customer_type],
            fields[index.gender],
            fields[index.product_line],
            total_price,
            rating,
        ));
    }

    Ok(out)
}

pub(crate) fn parse_time(raw: &str, line: usize) -> Result<NaiveTime, ProcessorError> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT).map_err(|_| ProcessorError::InvalidTime {
        line,
        value: raw.to_string(),
    })
}

/// Empty cells are missing values; anything else must be a finite number
pub(crate) fn parse_number(
    field: &str,
    column: &str,
    line: usize,
) -> Result<Option<f64>, ProcessorError> {
    if field.is_empty() {
        return Ok(None);
    }
    match fast_float::parse::<f64, _>(field) {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ProcessorError::InvalidNumber {
            line,
            column: column.to_string(),
            value: field.to_string(),
        }),
    }
}

/// Sample table used when the data file is absent
pub fn fallback_table() -> Table {
    let rows: [(&str, (u32, u32), &str, &str, &str, &str, f64, f64); 6] = [
        ("1001", (10, 15), "上海", "会员", "男", "电子产品", 299.0, 4.5),
        ("1002", (11, 30), "北京", "普通", "女", "服装", 199.0, 4.0),
        ("1003", (13, 45), "上海", "普通", "女", "食品", 89.0, 3.8),
        ("1004", (15, 20), "广州", "会员", "女", "服装", 259.0, 4.6),
        ("1005", (18, 5), "北京", "会员", "男", "电子产品", 399.0, 4.2),
        ("1006", (20, 40), "广州", "普通", "男", "食品", 129.0, 4.1),
    ];

    let records = rows
        .into_iter()
        .map(|(id, (h, m), city, customer, gender, product, price, rating)| {
            let time = NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
            SalesRecord::new(
                id,
                time,
                city,
                customer,
                gender,
                product,
                Some(price),
                Some(rating),
            )
        })
        .collect();

    Table::from_validated(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Dimension;

    const HEADER: &str = "订单号,时间,城市,顾客类型,性别,产品类型,总价,评分";

    fn parse(csv: &str) -> Result<Table, ProcessorError> {
        parse_csv(csv.as_bytes(), 1, &ColumnNames::default())
    }

    #[test]
    fn test_parse_skips_title_and_derives_hour() {
        let csv = format!(
            "销售数据\n{HEADER}\nA1,10:29:00,上海,会员,女,食品,52.5,4.9\nA2,19:01:12,北京,普通,男,服装,10,3.6\n"
        );
        let table = parse(&csv).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].hour(), 10);
        assert_eq!(table.records()[1].hour(), 19);
        assert_eq!(table.records()[0].total_price, Some(52.5));
    }

    #[test]
    fn test_last_line_without_newline_and_crlf() {
        let csv = format!(
            "title\r\n{HEADER}\r\nA1,08:00:00,上海,会员,女,食品,1,2\r\nA2,09:00:00,上海,会员,女,食品,3,4"
        );
        let table = parse(&csv).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[1].rating, Some(4.0));
    }

    #[test]
    fn test_columns_located_by_name() {
        let csv = "总价,评分,性别,城市,订单号,时间,产品类型,顾客类型,备注\n\
                   12,3,男,上海,X,07:00:00,食品,会员,hello\n";
        let table = parse_csv(csv.as_bytes(), 0, &ColumnNames::default()).unwrap();
        let r = &table.records()[0];
        assert_eq!(r.order_id, "X");
        assert_eq!(r.product_line, "食品");
        assert_eq!(r.total_price, Some(12.0));
    }

    #[test]
    fn test_empty_numeric_cell_is_missing() {
        let csv = format!("t\n{HEADER}\nA1,10:00:00,上海,会员,女,食品,,\n");
        let table = parse(&csv).unwrap();
        assert_eq!(table.records()[0].total_price, None);
        assert_eq!(table.records()[0].rating, None);
    }

    #[test]
    fn test_malformed_time_is_fatal() {
        let csv = format!(
            "t\n{HEADER}\nA1,10:00:00,上海,会员,女,食品,1,1\nA2,10h30,上海,会员,女,食品,1,1\n"
        );
        let err = parse(&csv).unwrap_err();
        match err {
            ProcessorError::InvalidTime { line, value } => {
                assert_eq!(line, 4);
                assert_eq!(value, "10h30");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_price_is_fatal() {
        let csv = format!("t\n{HEADER}\nA1,10:00:00,上海,会员,女,食品,abc,1\n");
        assert!(matches!(
            parse(&csv),
            Err(ProcessorError::InvalidNumber { column, .. }) if column == "总价"
        ));

        let csv = format!("t\n{HEADER}\nA1,10:00:00,上海,会员,女,食品,inf,1\n");
        assert!(matches!(parse(&csv), Err(ProcessorError::InvalidNumber { .. })));
    }

    #[test]
    fn test_missing_column() {
        let csv = "t\n订单号,时间,城市\nA1,10:00:00,上海\n";
        assert!(matches!(
            parse(csv),
            Err(ProcessorError::MissingColumn(name)) if name == "顾客类型"
        ));
    }

    #[test]
    fn test_row_width_mismatch() {
        let csv = format!("t\n{HEADER}\nA1,10:00:00,上海\n");
        assert!(matches!(
            parse(&csv),
            Err(ProcessorError::MalformedRow { line: 3, expected: 8, found: 3 })
        ));
    }

    #[test]
    fn test_header_only_gives_empty_table() {
        let csv = format!("t\n{HEADER}\n");
        assert!(parse(&csv).unwrap().is_empty());
        assert!(matches!(parse("only a title\n"), Err(ProcessorError::MissingHeader)));
    }

    #[test]
    fn test_chunk_boundaries_keep_line_numbers() {
        let data = b"a\nbb\nccc\ndddd\n";
        let chunks = find_chunk_boundaries(data, 3, 10);
        assert_eq!(chunks.first().map(|c| c.0), Some(0));
        assert_eq!(chunks.last().map(|c| c.1), Some(data.len()));
        for w in chunks.windows(2) {
            assert_eq!(w[0].1, w[1].0);
            let lines = data[w[0].0..w[0].1].iter().filter(|&&b| b == b'\n').count();
            assert_eq!(w[0].2 + lines, w[1].2);
        }
    }

    #[test]
    fn test_fallback_table_shape() {
        let table = fallback_table();
        assert_eq!(table.len(), 6);
        assert_eq!(table.distinct(Dimension::City).len(), 3);
        assert_eq!(table.distinct(Dimension::CustomerType).len(), 2);
        assert_eq!(table.distinct(Dimension::Gender).len(), 2);
        assert_eq!(table.distinct(Dimension::ProductLine).len(), 3);
    }

    #[test]
    fn test_workbook_extensions() {
        assert!(is_workbook(Path::new("supermarket_sales.xlsx")));
        assert!(is_workbook(Path::new("data/SALES.XLS")));
        assert!(is_workbook(Path::new("sales.ods")));
        assert!(!is_workbook(Path::new("sales.csv")));
        assert!(!is_workbook(Path::new("sales")));
    }

    #[test]
    fn test_missing_workbook_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig::default().with_source(dir.path().join("absent.xlsx"));
        let outcome = load(&config).unwrap();
        assert_eq!(outcome.table, fallback_table());
        assert!(outcome.warning.is_some());
    }

    #[test]
    fn test_missing_source_falls_back_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig::default().with_source(dir.path().join("absent.csv"));
        let outcome = load(&config).unwrap();
        assert_eq!(outcome.table, fallback_table());
        assert!(matches!(outcome.warning, Some(LoadWarning::SourceMissing { .. })));
    }
}
