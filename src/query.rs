//! Structured queries over a normalized table.
//!
//! Queries are values compared field by field; there is no textual predicate
//! language. Two modes exist: exact lookup on one identifier field
//! ([`execute`]) and case-insensitive keyword search across every identifier
//! field ([`search`]).

use log::debug;

use crate::{
    data::Value,
    error::{FieldRoleName, QueryError, QueryResult},
    normalize::{NormalizedTable, Record},
    resolve::{FieldRole, SchemaAnnotation},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub identifier_field: String,
    pub identifier_value: String,
    pub temporal_value: Option<i64>,
    pub metric_subset: Option<Vec<String>>,
}

impl Query {
    pub fn new(identifier_field: impl Into<String>, identifier_value: impl Into<String>) -> Self {
        Self {
            identifier_field: identifier_field.into(),
            identifier_value: identifier_value.into(),
            temporal_value: None,
            metric_subset: None,
        }
    }

    pub fn with_period(mut self, period: i64) -> Self {
        self.temporal_value = Some(period);
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metric_subset = Some(metrics.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSearch {
    pub keyword: String,
    pub temporal_value: Option<i64>,
    pub metric_subset: Option<Vec<String>>,
}

impl KeywordSearch {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            temporal_value: None,
            metric_subset: None,
        }
    }

    pub fn with_period(mut self, period: i64) -> Self {
        self.temporal_value = Some(period);
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metric_subset = Some(metrics.into_iter().map(Into::into).collect());
        self
    }
}

/// Rows matched by one query, projected onto the selected columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    metric_columns: Vec<String>,
    temporal_column: Option<usize>,
    records: Vec<Record>,
    source_rows: Vec<usize>,
}

impl ResultSet {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Metric columns present in this result, in column order.
    pub fn metric_columns(&self) -> &[String] {
        &self.metric_columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Position of each record in the source table.
    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Period of each record, when the result carries a temporal column.
    pub fn periods(&self) -> Option<Vec<&Value>> {
        let column = self.temporal_column?;
        Some(self.records.iter().map(|r| r.value(column)).collect())
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|record| record.cells().iter().map(|c| c.value.as_display()).collect())
            .collect()
    }
}

pub fn execute(
    table: &NormalizedTable,
    annotation: &SchemaAnnotation,
    query: &Query,
) -> QueryResult<ResultSet> {
    let column = annotation.identifier_column(&query.identifier_field)?;
    let projection = projection(table, annotation, query.metric_subset.as_deref())?;
    let period = period_filter(annotation, query.temporal_value)?;
    let matches = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            let cell = record.cell(column);
            !cell.is_missing() && cell.value.as_text() == Some(query.identifier_value.as_str())
        })
        .filter(|(_, record)| period.is_none_or(|(col, year)| matches_period(record, col, year)))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    debug!(
        "{} = '{}' matched {} row(s)",
        query.identifier_field,
        query.identifier_value,
        matches.len()
    );
    Ok(build_result(table, annotation, &projection, matches))
}

/// Case-insensitive substring search over all identifier fields. Missing
/// identifier cells never match; the empty keyword matches every row with at
/// least one present identifier value.
pub fn search(
    table: &NormalizedTable,
    annotation: &SchemaAnnotation,
    search: &KeywordSearch,
) -> QueryResult<ResultSet> {
    let projection = projection(table, annotation, search.metric_subset.as_deref())?;
    let period = period_filter(annotation, search.temporal_value)?;
    let needle = search.keyword.trim().to_lowercase();
    let identifier_columns = annotation
        .identifier_fields()
        .iter()
        .map(|field| field.column)
        .collect::<Vec<_>>();
    let matches = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            identifier_columns.iter().any(|&col| {
                let cell = record.cell(col);
                !cell.is_missing()
                    && cell
                        .value
                        .as_text()
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
        })
        .filter(|(_, record)| period.is_none_or(|(col, year)| matches_period(record, col, year)))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    debug!("Keyword '{}' matched {} row(s)", search.keyword, matches.len());
    Ok(build_result(table, annotation, &projection, matches))
}

fn period_filter(
    annotation: &SchemaAnnotation,
    temporal_value: Option<i64>,
) -> QueryResult<Option<(usize, i64)>> {
    match temporal_value {
        None => Ok(None),
        Some(year) => annotation
            .temporal_field()
            .map(|col| Some((col, year)))
            .ok_or_else(|| QueryError::unknown(year.to_string(), FieldRoleName::Temporal)),
    }
}

fn matches_period(record: &Record, column: usize, year: i64) -> bool {
    record
        .value(column)
        .as_number()
        .is_some_and(|n| n == year as f64)
}

fn projection(
    table: &NormalizedTable,
    annotation: &SchemaAnnotation,
    metric_subset: Option<&[String]>,
) -> QueryResult<Vec<usize>> {
    let Some(subset) = metric_subset else {
        return Ok((0..table.columns().len()).collect());
    };
    let mut selected = subset
        .iter()
        .map(|name| annotation.metric_column(name))
        .collect::<QueryResult<Vec<_>>>()?;
    selected.sort_unstable();
    selected.dedup();
    Ok((0..table.columns().len())
        .filter(|&idx| match annotation.role(idx) {
            FieldRole::Identifier(_) | FieldRole::Temporal => true,
            FieldRole::Metric => selected.binary_search(&idx).is_ok(),
            FieldRole::Auxiliary => false,
        })
        .collect())
}

fn build_result(
    table: &NormalizedTable,
    annotation: &SchemaAnnotation,
    projection: &[usize],
    mut matches: Vec<usize>,
) -> ResultSet {
    if let Some(temporal) = annotation.temporal_field() {
        matches.sort_by(|&a, &b| {
            let left = table.rows()[a].value(temporal);
            let right = table.rows()[b].value(temporal);
            left.total_cmp(right)
        });
    }
    let columns = projection
        .iter()
        .map(|&idx| table.columns()[idx].clone())
        .collect::<Vec<_>>();
    let metric_columns = projection
        .iter()
        .filter(|&&idx| annotation.role(idx) == FieldRole::Metric)
        .map(|&idx| table.columns()[idx].clone())
        .collect();
    let temporal_column = annotation
        .temporal_field()
        .and_then(|temporal| projection.iter().position(|&idx| idx == temporal));
    let records = matches
        .iter()
        .map(|&row| table.rows()[row].project(projection))
        .collect();
    ResultSet {
        columns,
        metric_columns,
        temporal_column,
        records,
        source_rows: matches,
    }
}
