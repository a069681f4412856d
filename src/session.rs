//! The interface a front end drives: selectable fields and values, queries,
//! exports and chart data over one loaded source.

use std::{path::Path, sync::Arc};

use anyhow::Result;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    aggregate::{self, BaselineScope, MetricPoint, TrendPoint},
    cache::{LoadOptions, LoadedSource, SourceCache},
    error::QueryResult,
    export::{self, ExportOptions},
    normalize::NormalizedTable,
    query::{self, KeywordSearch, Query, ResultSet},
    resolve::{IdentifierField, SchemaAnnotation},
};

/// Outcome of a successful query. `Empty` is a normal terminal state, not an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(ResultSet),
    Empty,
}

impl QueryOutcome {
    fn from_result(result: ResultSet) -> Self {
        if result.is_empty() {
            QueryOutcome::Empty
        } else {
            QueryOutcome::Rows(result)
        }
    }

    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryOutcome::Rows(result) => Some(result),
            QueryOutcome::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, QueryOutcome::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Baseline {
    pub scope: BaselineScope,
    pub points: Vec<MetricPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub metric: String,
    pub points: Vec<TrendPoint>,
}

/// Everything a chart renderer needs for one result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub entity: Vec<MetricPoint>,
    pub baseline: Option<Baseline>,
    pub trends: Vec<Trend>,
}

#[derive(Debug, Clone)]
pub struct Session {
    source: Arc<LoadedSource>,
}

impl Session {
    pub fn open(cache: &mut SourceCache, path: &Path, options: &LoadOptions) -> QueryResult<Self> {
        cache.load(path, options).map(Self::from_source)
    }

    pub fn from_source(source: Arc<LoadedSource>) -> Self {
        Self { source }
    }

    pub fn table(&self) -> &NormalizedTable {
        &self.source.table
    }

    pub fn annotation(&self) -> &SchemaAnnotation {
        &self.source.annotation
    }

    pub fn identifier_fields(&self) -> &[IdentifierField] {
        self.annotation().identifier_fields()
    }

    pub fn metric_fields(&self) -> Vec<String> {
        self.annotation()
            .metric_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn group_field(&self) -> Option<&str> {
        self.annotation().group_name()
    }

    /// Sorted distinct values of an identifier field, for selection lists.
    /// Cells missing in the source are left out.
    pub fn distinct_values(&self, field: &str) -> QueryResult<Vec<String>> {
        let column = self.annotation().identifier_column(field)?;
        Ok(self
            .table()
            .rows()
            .iter()
            .map(|record| record.cell(column))
            .filter(|cell| !cell.is_missing())
            .filter_map(|cell| cell.value.as_text())
            .unique()
            .sorted()
            .map(str::to_string)
            .collect())
    }

    /// Sorted distinct periods; empty when the table has no temporal field.
    pub fn temporal_range(&self) -> Vec<i64> {
        let Some(column) = self.annotation().temporal_field() else {
            return Vec::new();
        };
        self.table()
            .rows()
            .iter()
            .filter(|record| !record.cell(column).is_missing())
            .filter_map(|record| record.value(column).as_number())
            .map(|n| n as i64)
            .unique()
            .sorted()
            .collect()
    }

    pub fn query(&self, query: &Query) -> QueryResult<QueryOutcome> {
        query::execute(self.table(), self.annotation(), query).map(QueryOutcome::from_result)
    }

    pub fn search(&self, search: &KeywordSearch) -> QueryResult<QueryOutcome> {
        query::search(self.table(), self.annotation(), search).map(QueryOutcome::from_result)
    }

    pub fn export(
        &self,
        result: &ResultSet,
        columns: &[String],
        identifier_value: &str,
        options: &ExportOptions,
    ) -> Result<Export> {
        let bytes = export::format(result, columns, options)?;
        Ok(Export {
            bytes,
            file_name: export::suggested_file_name(identifier_value, options.extension()),
        })
    }

    /// Long-format means for `metrics` (all result metrics when empty), the
    /// peer baseline, and a per-period trend for each metric.
    pub fn chart_data(&self, result: &ResultSet, metrics: &[String]) -> QueryResult<ChartData> {
        let metrics = if metrics.is_empty() {
            result.metric_columns().to_vec()
        } else {
            metrics.to_vec()
        };
        let summary = aggregate::summarize(result, &metrics)?;
        let baseline =
            aggregate::comparison_baseline(self.table(), self.annotation(), result, &metrics)?
                .map(|baseline| Baseline {
                    points: aggregate::long_format(&baseline.per_metric_mean, &metrics),
                    scope: baseline.scope,
                });
        let trends = if self.annotation().temporal_field().is_some() {
            metrics
                .iter()
                .map(|metric| {
                    aggregate::trend(result, metric).map(|points| Trend {
                        metric: metric.clone(),
                        points,
                    })
                })
                .collect::<QueryResult<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Ok(ChartData {
            entity: aggregate::long_format(&summary.per_metric_mean, &metrics),
            baseline,
            trends,
        })
    }
}
