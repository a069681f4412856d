//! Source decoding into a [`RawTable`].
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read through
//! `calamine`; anything else is treated as delimited text. Every failure is
//! reported as [`QueryError::SourceUnavailable`].

use std::{fs, io::Cursor, path::Path};

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use encoding_rs::UTF_8;
use log::debug;

use crate::{
    data::RawCell,
    error::{QueryError, QueryResult},
    io_utils,
};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceOptions {
    /// Worksheet to read; the first sheet when absent.
    pub sheet: Option<String>,
    pub delimiter: Option<u8>,
    /// `encoding_rs` label for delimited input; UTF-8 when absent.
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub header: Vec<RawCell>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(header: Vec<RawCell>, rows: Vec<Vec<RawCell>>) -> Self {
        Self { header, rows }
    }

    /// Splits the first row off as the header. An empty grid yields an
    /// empty header, which the normalizer rejects.
    pub fn from_grid(mut grid: Vec<Vec<RawCell>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let header = grid.remove(0);
        Self { header, rows: grid }
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn from_path(path: &Path, options: &SourceOptions) -> QueryResult<Self> {
        if !path.exists() {
            return Err(QueryError::unavailable(path, "file not found"));
        }
        let bytes = fs::read(path).map_err(|err| QueryError::unavailable(path, err))?;
        Self::from_bytes(path, &bytes, options)
    }

    /// Decodes content already read from `path`. The extension of `path`
    /// selects the format; the file itself is not touched again.
    pub fn from_bytes(path: &Path, bytes: &[u8], options: &SourceOptions) -> QueryResult<Self> {
        let is_workbook = io_utils::extension(path).is_some_and(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });
        if is_workbook {
            read_workbook(path, bytes, options.sheet.as_deref())
        } else {
            read_delimited(path, bytes, options)
        }
    }
}

fn read_workbook(path: &Path, bytes: &[u8], sheet: Option<&str>) -> QueryResult<RawTable> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|err| QueryError::unavailable(path, err))?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| QueryError::unavailable(path, "workbook has no worksheets"))?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| QueryError::unavailable(path, format!("sheet '{sheet_name}': {err}")))?;
    debug!(
        "Read sheet '{}' from {:?} ({} x {})",
        sheet_name,
        path,
        range.height(),
        range.width()
    );
    let grid = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    Ok(RawTable::from_grid(grid))
}

fn convert_cell(value: &Data) -> RawCell {
    match value {
        Data::Empty | Data::Error(_) => RawCell::Empty,
        Data::Bool(v) => RawCell::Bool(*v),
        Data::Int(v) => RawCell::Number(*v as f64),
        Data::Float(v) => RawCell::Number(*v),
        Data::String(v) => RawCell::Text(v.clone()),
        Data::DateTime(v) => RawCell::Number(v.as_f64()),
        Data::DateTimeIso(v) | Data::DurationIso(v) => RawCell::Text(v.clone()),
    }
}

fn read_delimited(path: &Path, bytes: &[u8], options: &SourceOptions) -> QueryResult<RawTable> {
    let configured = io_utils::resolve_encoding(options.encoding.as_deref())
        .map_err(|err| QueryError::unavailable(path, err))?;
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let (encoding, body) = io_utils::sniff_bom(bytes, configured);

    // UTF-16 input has to be transcoded before the byte-level csv reader
    // can find delimiters.
    let transcoded;
    let (encoding, body) = if encoding.is_ascii_compatible() {
        (encoding, body)
    } else {
        transcoded = io_utils::decode_bytes(body, encoding)
            .map_err(|err| QueryError::unavailable(path, err))?;
        (UTF_8, transcoded.as_bytes())
    };

    let mut reader = io_utils::open_csv_reader(body, delimiter);
    let mut grid = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| {
            QueryError::unavailable(path, format!("reading row {}: {err}", row_idx + 1))
        })?;
        let fields = io_utils::decode_record(&record, encoding).map_err(|err| {
            QueryError::unavailable(path, format!("row {}: {err}", row_idx + 1))
        })?;
        grid.push(
            fields
                .iter()
                .map(|field| RawCell::from(field.as_str()))
                .collect::<Vec<_>>(),
        );
    }
    debug!(
        "Read {} delimited row(s) from {:?} as {} with delimiter '{}'",
        grid.len(),
        path,
        encoding.name(),
        crate::printable_delimiter(delimiter)
    );
    Ok(RawTable::from_grid(grid))
}
