//! Per-metric summaries over a result set, plus the reshaping needed by
//! chart consumers.
//!
//! Imputed cells (missing in the source, zero after normalization) are
//! excluded from every mean. A metric with no remaining values has no entry
//! in the output map; callers treat the absence as "insufficient data".

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    data::Value,
    error::{FieldRoleName, QueryError, QueryResult},
    normalize::NormalizedTable,
    query::ResultSet,
    resolve::SchemaAnnotation,
};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Summary {
    pub per_metric_mean: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", content = "value", rename_all = "lowercase")]
pub enum BaselineScope {
    /// Rows sharing the focal entity's group value (e.g. its industry).
    Group(String),
    Dataset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonBaseline {
    pub scope: BaselineScope,
    pub per_metric_mean: BTreeMap<String, f64>,
}

/// One (category, value) pair of a long-format series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub metric: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: Value,
    pub value: f64,
}

#[derive(Debug, Default)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.sum / self.count as f64)
        } else {
            None
        }
    }
}

pub fn summarize(result: &ResultSet, metrics: &[String]) -> QueryResult<Summary> {
    let columns = metrics
        .iter()
        .map(|name| {
            if !result.metric_columns().contains(name) {
                return Err(QueryError::unknown(name.as_str(), FieldRoleName::Metric));
            }
            result
                .column_index(name)
                .ok_or_else(|| QueryError::unknown(name.as_str(), FieldRoleName::Metric))
        })
        .collect::<QueryResult<Vec<_>>>()?;
    let mut accumulators = metrics
        .iter()
        .map(|_| MeanAccumulator::default())
        .collect::<Vec<_>>();
    for record in result.records() {
        for (acc, &column) in accumulators.iter_mut().zip(&columns) {
            let cell = record.cell(column);
            if let (false, Some(n)) = (cell.is_missing(), cell.value.as_number()) {
                acc.add(n);
            }
        }
    }
    Ok(Summary {
        per_metric_mean: collect_means(metrics, &accumulators),
    })
}

/// Mean of each metric over the focal entity's peer rows: rows sharing its
/// group value when the table has a group field, the whole table otherwise.
/// `None` when the result is empty.
pub fn comparison_baseline(
    table: &NormalizedTable,
    annotation: &SchemaAnnotation,
    result: &ResultSet,
    metrics: &[String],
) -> QueryResult<Option<ComparisonBaseline>> {
    let columns = metrics
        .iter()
        .map(|name| annotation.metric_column(name))
        .collect::<QueryResult<Vec<_>>>()?;
    let Some(&focal_row) = result.source_rows().first() else {
        return Ok(None);
    };
    let group = annotation.group_field().and_then(|column| {
        let cell = table.rows()[focal_row].cell(column);
        (!cell.is_missing()).then(|| (column, cell.value.clone()))
    });

    let mut accumulators = metrics
        .iter()
        .map(|_| MeanAccumulator::default())
        .collect::<Vec<_>>();
    let peers = table.rows().iter().filter(|record| match &group {
        Some((column, value)) => {
            let cell = record.cell(*column);
            !cell.is_missing() && &cell.value == value
        }
        None => true,
    });
    for record in peers {
        for (acc, &column) in accumulators.iter_mut().zip(&columns) {
            let cell = record.cell(column);
            if let (false, Some(n)) = (cell.is_missing(), cell.value.as_number()) {
                acc.add(n);
            }
        }
    }
    let scope = match group {
        Some((_, value)) => BaselineScope::Group(value.as_display()),
        None => BaselineScope::Dataset,
    };
    Ok(Some(ComparisonBaseline {
        scope,
        per_metric_mean: collect_means(metrics, &accumulators),
    }))
}

/// Reshapes a mean map into (metric, value) pairs ordered exactly as
/// `metrics`. Metrics without an entry are skipped.
pub fn long_format(means: &BTreeMap<String, f64>, metrics: &[String]) -> Vec<MetricPoint> {
    metrics
        .iter()
        .filter_map(|metric| {
            means.get(metric).map(|value| MetricPoint {
                metric: metric.clone(),
                value: *value,
            })
        })
        .collect()
}

/// Period/value pairs for one metric, in result order. Rows whose metric
/// value is missing are skipped.
pub fn trend(result: &ResultSet, metric: &str) -> QueryResult<Vec<TrendPoint>> {
    if !result.metric_columns().iter().any(|m| m == metric) {
        return Err(QueryError::unknown(metric, FieldRoleName::Metric));
    }
    let column = result
        .column_index(metric)
        .ok_or_else(|| QueryError::unknown(metric, FieldRoleName::Metric))?;
    let Some(periods) = result.periods() else {
        return Ok(Vec::new());
    };
    Ok(result
        .records()
        .iter()
        .zip(periods)
        .filter_map(|(record, period)| {
            let cell = record.cell(column);
            if cell.is_missing() {
                return None;
            }
            cell.value.as_number().map(|value| TrendPoint {
                period: period.clone(),
                value,
            })
        })
        .collect())
}

fn collect_means(metrics: &[String], accumulators: &[MeanAccumulator]) -> BTreeMap<String, f64> {
    metrics
        .iter()
        .zip(accumulators)
        .filter_map(|(name, acc)| acc.mean().map(|mean| (name.clone(), mean)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_without_values_has_no_mean() {
        let acc = MeanAccumulator::default();
        assert_eq!(acc.mean(), None);
    }

    #[test]
    fn long_format_follows_requested_order() {
        let mut means = BTreeMap::new();
        means.insert("b".to_string(), 2.0);
        means.insert("a".to_string(), 1.0);
        let metrics = vec!["b".to_string(), "c".to_string(), "a".to_string()];
        let points = long_format(&means, &metrics);
        assert_eq!(
            points,
            vec![
                MetricPoint {
                    metric: "b".into(),
                    value: 2.0
                },
                MetricPoint {
                    metric: "a".into(),
                    value: 1.0
                },
            ]
        );
    }
}
