//! Field role discovery.
//!
//! Produces a [`SchemaAnnotation`] once per table so downstream code asks
//! capability questions (`annotation.temporal_field()`) instead of probing
//! column names.

use log::debug;

use crate::{
    data::{ColumnKind, Value},
    error::{FieldRoleName, QueryError, QueryResult},
    labels::{FieldLabels, IdentifierKind},
    normalize::NormalizedTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Identifier(IdentifierKind),
    Temporal,
    Metric,
    Auxiliary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierField {
    pub kind: IdentifierKind,
    pub column: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaAnnotation {
    identifier_fields: Vec<IdentifierField>,
    temporal_field: Option<usize>,
    group_field: Option<usize>,
    metric_fields: Vec<usize>,
    roles: Vec<FieldRole>,
    names: Vec<String>,
}

impl SchemaAnnotation {
    /// Identifier fields in presentation priority (name before code).
    pub fn identifier_fields(&self) -> &[IdentifierField] {
        &self.identifier_fields
    }

    pub fn identifier_names(&self) -> Vec<&str> {
        self.identifier_fields
            .iter()
            .map(|field| field.name.as_str())
            .collect()
    }

    pub fn identifier_column(&self, name: &str) -> QueryResult<usize> {
        self.identifier_fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.column)
            .ok_or_else(|| QueryError::unknown(name, FieldRoleName::Identifier))
    }

    pub fn temporal_field(&self) -> Option<usize> {
        self.temporal_field
    }

    pub fn temporal_name(&self) -> Option<&str> {
        self.temporal_field.map(|idx| self.names[idx].as_str())
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_field
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_field.map(|idx| self.names[idx].as_str())
    }

    pub fn metric_fields(&self) -> &[usize] {
        &self.metric_fields
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metric_fields
            .iter()
            .map(|&idx| self.names[idx].as_str())
            .collect()
    }

    pub fn metric_column(&self, name: &str) -> QueryResult<usize> {
        self.metric_fields
            .iter()
            .copied()
            .find(|&idx| self.names[idx] == name)
            .ok_or_else(|| QueryError::unknown(name, FieldRoleName::Metric))
    }

    pub fn role(&self, column: usize) -> FieldRole {
        self.roles[column]
    }

    pub fn roles(&self) -> &[FieldRole] {
        &self.roles
    }
}

pub fn resolve(table: &NormalizedTable, labels: &FieldLabels) -> SchemaAnnotation {
    let columns = table.columns();
    let mut roles = vec![FieldRole::Auxiliary; columns.len()];
    let mut identifiers: Vec<IdentifierField> = Vec::new();
    let mut temporal_field = None;
    let mut group_field = None;

    for (idx, name) in columns.iter().enumerate() {
        let numeric = table.kind(idx) == ColumnKind::Number;
        if let Some(kind) = labels.identifier_kind(name) {
            if identifiers.iter().all(|field| field.kind != kind) {
                identifiers.push(IdentifierField {
                    kind,
                    column: idx,
                    name: name.clone(),
                });
                roles[idx] = FieldRole::Identifier(kind);
                continue;
            }
            debug!("Column '{name}' demoted: {kind:?} identifier already resolved");
        } else if labels.is_period(name) && temporal_field.is_none() {
            if numeric && all_integral(table, idx) {
                temporal_field = Some(idx);
                roles[idx] = FieldRole::Temporal;
                continue;
            }
            debug!("Column '{name}' matches a period label but holds non-integer values");
        } else if labels.is_group(name) && group_field.is_none() && !numeric {
            group_field = Some(idx);
        }
        if numeric {
            roles[idx] = FieldRole::Metric;
        }
    }

    identifiers.sort_by_key(|field| {
        IdentifierKind::PRIORITY
            .iter()
            .position(|kind| *kind == field.kind)
    });
    let metric_fields = roles
        .iter()
        .enumerate()
        .filter(|(_, role)| **role == FieldRole::Metric)
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    debug!(
        "Resolved {} identifier(s), temporal {:?}, {} metric(s)",
        identifiers.len(),
        temporal_field.map(|idx| &columns[idx]),
        metric_fields.len()
    );

    SchemaAnnotation {
        identifier_fields: identifiers,
        temporal_field,
        group_field,
        metric_fields,
        roles,
        names: columns.to_vec(),
    }
}

fn all_integral(table: &NormalizedTable, column: usize) -> bool {
    table.rows().iter().all(|record| match record.value(column) {
        Value::Number(n) => n.fract() == 0.0,
        Value::Text(_) => false,
    })
}
