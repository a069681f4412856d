//! Schema normalization: raw decoded cells to a typed, canonical table.
//!
//! Header labels are trimmed and deduplicated, every column is classified as
//! text or number by inspecting all of its cells, and missing cells are
//! replaced by the column default. Coercion never fails; the only error is a
//! table with no columns at all.

use std::collections::HashSet;

use log::debug;

use crate::{
    data::{Cell, ColumnKind, RawCell, Value, format_number, is_placeholder_token, parse_finite},
    error::{QueryError, QueryResult},
    labels::FieldLabels,
    source::RawTable,
};

/// Text shown for identifier cells (company name, stock code) that were
/// missing in the source.
pub const MISSING_IDENTIFIER_PLACEHOLDER: &str = "unknown";

/// How repeated header labels are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateHeaderPolicy {
    /// Keep the first column with a given name and drop the rest.
    #[default]
    KeepFirst,
    /// Keep every column, renaming repeats to `name_2`, `name_3`, ...
    Suffix,
}

pub const DUPLICATE_HEADER_POLICY: DuplicateHeaderPolicy = DuplicateHeaderPolicy::KeepFirst;

static EMPTY_CELL: RawCell = RawCell::Empty;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub duplicate_headers: DuplicateHeaderPolicy,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            duplicate_headers: DUPLICATE_HEADER_POLICY,
        }
    }
}

/// One normalized row; holds exactly one cell per table column.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    cells: Vec<Cell>,
}

impl Record {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn cell(&self, column: usize) -> &Cell {
        &self.cells[column]
    }

    pub fn value(&self, column: usize) -> &Value {
        &self.cells[column].value
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn project(&self, columns: &[usize]) -> Record {
        Record {
            cells: columns.iter().map(|&idx| self.cells[idx].clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    columns: Vec<String>,
    kinds: Vec<ColumnKind>,
    rows: Vec<Record>,
}

impl NormalizedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    pub fn kind(&self, column: usize) -> ColumnKind {
        self.kinds[column]
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Renders the table back into raw cells. Imputed cells become empty so
    /// that normalizing the result reproduces this table exactly.
    pub fn to_raw(&self) -> RawTable {
        let header = self
            .columns
            .iter()
            .map(|name| RawCell::Text(name.clone()))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|record| record.cells.iter().map(Cell::to_raw).collect())
            .collect();
        RawTable::new(header, rows)
    }
}

pub fn normalize(raw: &RawTable, labels: &FieldLabels) -> QueryResult<NormalizedTable> {
    normalize_with(raw, labels, NormalizeOptions::default())
}

pub fn normalize_with(
    raw: &RawTable,
    labels: &FieldLabels,
    options: NormalizeOptions,
) -> QueryResult<NormalizedTable> {
    if raw.width() == 0 {
        return Err(QueryError::MalformedSource(
            "no header row or no columns found".to_string(),
        ));
    }

    let (columns, sources) = resolve_headers(&raw.header, options.duplicate_headers);
    let mut kinds = Vec::with_capacity(columns.len());
    let mut coerced: Vec<Vec<Cell>> = Vec::with_capacity(columns.len());

    for (name, &source_idx) in columns.iter().zip(&sources) {
        let cells = raw
            .rows
            .iter()
            .map(|row| row.get(source_idx).unwrap_or(&EMPTY_CELL))
            .collect::<Vec<_>>();
        let is_identifier = labels.identifier_kind(name).is_some();
        let kind = if is_identifier {
            ColumnKind::Text
        } else {
            infer_kind(&cells)
        };
        debug!("Column '{name}' classified as {kind:?}");
        let column = match kind {
            ColumnKind::Number => cells.iter().map(|cell| coerce_number(cell)).collect(),
            ColumnKind::Text => {
                let default = if is_identifier {
                    MISSING_IDENTIFIER_PLACEHOLDER
                } else {
                    ""
                };
                cells.iter().map(|cell| coerce_text(cell, default)).collect()
            }
        };
        kinds.push(kind);
        coerced.push(column);
    }

    let rows = (0..raw.rows.len())
        .map(|row_idx| {
            Record::new(
                coerced
                    .iter()
                    .map(|column| column[row_idx].clone())
                    .collect(),
            )
        })
        .collect();

    Ok(NormalizedTable {
        columns,
        kinds,
        rows,
    })
}

/// Returns the unique column names and, for each, the raw column it reads.
fn resolve_headers(
    header: &[RawCell],
    policy: DuplicateHeaderPolicy,
) -> (Vec<String>, Vec<usize>) {
    let mut names = Vec::with_capacity(header.len());
    let mut sources = Vec::with_capacity(header.len());
    let labels = header
        .iter()
        .map(|cell| cell.as_label().trim().to_string())
        .collect::<Vec<_>>();
    // Synthesized names must not collide with any real label, wherever it
    // appears in the header.
    let reserved = labels
        .iter()
        .filter(|label| !label.is_empty())
        .cloned()
        .collect::<HashSet<_>>();
    let mut seen = HashSet::new();
    for (idx, trimmed) in labels.into_iter().enumerate() {
        let base = if trimmed.is_empty() {
            (idx..)
                .map(|n| format!("field_{n}"))
                .find(|candidate| !reserved.contains(candidate) && !seen.contains(candidate))
                .unwrap_or_else(|| format!("field_{idx}"))
        } else {
            trimmed
        };
        let name = if seen.contains(&base) {
            match policy {
                DuplicateHeaderPolicy::KeepFirst => {
                    debug!("Dropping duplicate column '{base}' at position {idx}");
                    continue;
                }
                DuplicateHeaderPolicy::Suffix => {
                    let mut suffix = 2usize;
                    loop {
                        let candidate = format!("{base}_{suffix}");
                        if !seen.contains(&candidate) {
                            break candidate;
                        }
                        suffix += 1;
                    }
                }
            }
        } else {
            base
        };
        seen.insert(name.clone());
        names.push(name);
        sources.push(idx);
    }
    (names, sources)
}

fn is_missing(cell: &RawCell) -> bool {
    match cell {
        RawCell::Empty => true,
        RawCell::Text(s) => is_placeholder_token(s),
        RawCell::Number(n) => !n.is_finite(),
        RawCell::Bool(_) => false,
    }
}

fn infer_kind(cells: &[&RawCell]) -> ColumnKind {
    let mut observed = false;
    for cell in cells.iter().filter(|cell| !is_missing(cell)) {
        observed = true;
        let numeric = match cell {
            RawCell::Number(_) => true,
            RawCell::Text(s) => parse_finite(s).is_some(),
            RawCell::Bool(_) | RawCell::Empty => false,
        };
        if !numeric {
            return ColumnKind::Text;
        }
    }
    if observed {
        ColumnKind::Number
    } else {
        ColumnKind::Text
    }
}

fn coerce_number(cell: &RawCell) -> Cell {
    if is_missing(cell) {
        return Cell::imputed(Value::Number(0.0));
    }
    let parsed = match cell {
        RawCell::Number(n) => Some(*n),
        RawCell::Text(s) => parse_finite(s),
        RawCell::Bool(_) | RawCell::Empty => None,
    };
    match parsed {
        Some(n) => Cell::present(Value::Number(n)),
        None => Cell::imputed(Value::Number(0.0)),
    }
}

fn coerce_text(cell: &RawCell, default: &str) -> Cell {
    if is_missing(cell) {
        return Cell::imputed(Value::Text(default.to_string()));
    }
    let text = match cell {
        RawCell::Number(n) => format_number(*n),
        other => other.as_label(),
    };
    Cell::present(Value::Text(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<RawCell> {
        cells.iter().map(|c| RawCell::from(*c)).collect()
    }

    #[test]
    fn headers_are_trimmed_and_blank_labels_named_by_position() {
        let raw = RawTable::new(
            vec![RawCell::text("  企业名称 "), RawCell::Empty, RawCell::Number(2020.0)],
            vec![text_row(&["甲", "x", "1"])],
        );
        let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
        assert_eq!(table.columns(), ["企业名称", "field_1", "2020"]);
    }

    #[test]
    fn blank_label_never_takes_a_real_column_name() {
        let raw = RawTable::new(
            vec![RawCell::Empty, RawCell::text("field_0"), RawCell::Empty, RawCell::text("field_1")],
            vec![text_row(&["a", "42", "b", "7"])],
        );
        let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
        assert_eq!(table.columns(), ["field_2", "field_0", "field_3", "field_1"]);
        assert_eq!(table.rows()[0].value(1), &Value::Number(42.0));
        assert_eq!(table.rows()[0].value(3), &Value::Number(7.0));
    }

    #[test]
    fn duplicate_headers_keep_first_occurrence() {
        let raw = RawTable::new(
            text_row(&["code", "score", " score"]),
            vec![text_row(&["a", "1", "99"])],
        );
        let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
        assert_eq!(table.columns(), ["code", "score"]);
        assert_eq!(table.rows()[0].value(1), &Value::Number(1.0));
    }

    #[test]
    fn duplicate_headers_can_be_suffixed() {
        let raw = RawTable::new(
            text_row(&["score", "score", "score_2"]),
            vec![text_row(&["1", "2", "3"])],
        );
        let options = NormalizeOptions {
            duplicate_headers: DuplicateHeaderPolicy::Suffix,
        };
        let table = normalize_with(&raw, &FieldLabels::default(), options).expect("normalize");
        assert_eq!(table.columns(), ["score", "score_2", "score_2_2"]);
        assert_eq!(table.rows()[0].value(1), &Value::Number(2.0));
    }

    #[test]
    fn numeric_columns_coerce_missing_to_zero() {
        let raw = RawTable::new(
            text_row(&["idx"]),
            vec![text_row(&["1.5"]), text_row(&[""]), text_row(&["N/A"])],
        );
        let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
        assert_eq!(table.kind(0), ColumnKind::Number);
        let values = table.rows().iter().map(|r| r.cell(0).clone()).collect::<Vec<_>>();
        assert_eq!(values[0], Cell::present(Value::Number(1.5)));
        assert_eq!(values[1], Cell::imputed(Value::Number(0.0)));
        assert_eq!(values[2], Cell::imputed(Value::Number(0.0)));
    }

    #[test]
    fn one_non_numeric_value_makes_the_column_text() {
        let raw = RawTable::new(
            text_row(&["note"]),
            vec![text_row(&["1"]), text_row(&["n.a. pending"]), text_row(&[""])],
        );
        let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
        assert_eq!(table.kind(0), ColumnKind::Text);
        assert_eq!(table.rows()[0].value(0), &Value::Text("1".into()));
        assert_eq!(table.rows()[2].cell(0), &Cell::imputed(Value::Text(String::new())));
    }

    #[test]
    fn identifier_columns_stay_text_and_use_placeholder() {
        let raw = RawTable::new(
            text_row(&["股票代码", "企业名称"]),
            vec![
                vec![RawCell::Number(600000.0), RawCell::text("浦发银行")],
                vec![RawCell::text("000001"), RawCell::Empty],
            ],
        );
        let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
        assert_eq!(table.kinds(), [ColumnKind::Text, ColumnKind::Text]);
        assert_eq!(table.rows()[0].value(0), &Value::Text("600000".into()));
        assert_eq!(table.rows()[1].value(0), &Value::Text("000001".into()));
        assert_eq!(
            table.rows()[1].cell(1),
            &Cell::imputed(Value::Text(MISSING_IDENTIFIER_PLACEHOLDER.into()))
        );
    }

    #[test]
    fn ragged_rows_are_padded_with_missing_cells() {
        let raw = RawTable::new(
            text_row(&["a", "b"]),
            vec![text_row(&["x"]), text_row(&["y", "z", "extra"])],
        );
        let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
        assert!(table.rows().iter().all(|r| r.cells().len() == 2));
        assert!(table.rows()[0].cell(1).is_missing());
    }

    #[test]
    fn header_without_rows_is_an_empty_table() {
        let raw = RawTable::new(text_row(&["code", "year"]), Vec::new());
        let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn no_columns_is_malformed() {
        let err = normalize(&RawTable::default(), &FieldLabels::default()).expect_err("empty");
        assert!(matches!(err, QueryError::MalformedSource(_)));
    }

    #[test]
    fn normalizing_a_normalized_table_is_identity() {
        let raw = RawTable::new(
            text_row(&[" 企业名称", "股票代码", "年份", "idx", "note", "idx"]),
            vec![
                vec![
                    RawCell::text("甲"),
                    RawCell::Number(600000.0),
                    RawCell::Number(2019.0),
                    RawCell::text("1.5"),
                    RawCell::Bool(true),
                    RawCell::text("dup"),
                ],
                text_row(&["", "600001", "2020", "NA", "", ""]),
            ],
        );
        let labels = FieldLabels::default();
        let first = normalize(&raw, &labels).expect("normalize");
        let second = normalize(&first.to_raw(), &labels).expect("renormalize");
        assert_eq!(first, second);
    }
}
