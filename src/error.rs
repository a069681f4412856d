//! Error taxonomy for loading and querying a source table.
//!
//! Load-time variants ([`QueryError::SourceUnavailable`],
//! [`QueryError::MalformedSource`]) are fatal to a session. Query-time
//! variants ([`QueryError::UnknownField`]) are caller errors that can be
//! recovered from by choosing another field. An empty result is not an error;
//! see [`crate::session::QueryOutcome`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("source {path:?} is unavailable: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("source table is malformed: {0}")]
    MalformedSource(String),

    #[error("unknown {role} field '{field}'")]
    UnknownField { field: String, role: FieldRoleName },
}

impl QueryError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        QueryError::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unknown(field: impl Into<String>, role: FieldRoleName) -> Self {
        QueryError::UnknownField {
            field: field.into(),
            role,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, QueryError::UnknownField { .. })
    }
}

/// Role a caller expected a field to have when it was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRoleName {
    Identifier,
    Temporal,
    Metric,
    Column,
}

impl std::fmt::Display for FieldRoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FieldRoleName::Identifier => "identifier",
            FieldRoleName::Temporal => "temporal",
            FieldRoleName::Metric => "metric",
            FieldRoleName::Column => "result",
        };
        f.write_str(label)
    }
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;
