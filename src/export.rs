//! Delimited text export of a result set.
//!
//! Output is byte-stable: the same result and column list always produce the
//! same bytes (header row, `\n` terminators, RFC 4180 quoting only where a
//! field needs it, no index column).

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};

use crate::{
    error::{FieldRoleName, QueryError},
    io_utils,
    query::ResultSet,
};

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

impl ExportOptions {
    pub fn extension(&self) -> &'static str {
        if self.delimiter == io_utils::DEFAULT_TSV_DELIMITER {
            "tsv"
        } else {
            "csv"
        }
    }
}

pub fn format(result: &ResultSet, columns: &[String], options: &ExportOptions) -> Result<Vec<u8>> {
    let indices = columns
        .iter()
        .map(|name| {
            result
                .column_index(name)
                .ok_or_else(|| QueryError::unknown(name.as_str(), FieldRoleName::Column))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut writer = io_utils::csv_writer(Vec::new(), options.delimiter);
    writer
        .write_record(columns)
        .context("Writing export header")?;
    for (row_idx, record) in result.records().iter().enumerate() {
        let fields = indices
            .iter()
            .map(|&idx| record.value(idx).as_display())
            .collect::<Vec<_>>();
        writer
            .write_record(&fields)
            .with_context(|| format!("Writing export row {}", row_idx + 1))?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("Flushing export buffer")?;
    if options.encoding == UTF_8 {
        return Ok(buffer);
    }
    let text = String::from_utf8(buffer).context("Export buffer is not UTF-8")?;
    io_utils::encode_text(&text, options.encoding)
}

/// Appended to the identifier value to form the suggested download name.
pub const EXPORT_FILE_SUFFIX: &str = "_数据";

/// File name offered for a download of the rows matching `identifier_value`.
pub fn suggested_file_name(identifier_value: &str, extension: &str) -> String {
    let stem = identifier_value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();
    let stem = if stem.is_empty() {
        "result".to_string()
    } else {
        stem
    };
    format!("{stem}{EXPORT_FILE_SUFFIX}.{extension}")
}
