use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

/// A cell as produced by a source decoder, before any typing decisions.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawCell {
    pub fn text(value: impl Into<String>) -> Self {
        RawCell::Text(value.into())
    }

    /// Header labels arrive as arbitrary cells; render them the way a
    /// spreadsheet would display them.
    pub fn as_label(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.clone(),
            RawCell::Number(n) => format_number(*n),
            RawCell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Value::Text(_) => ColumnKind::Text,
            Value::Number(_) => ColumnKind::Number,
        }
    }

    /// Total order used for sorting periods and distinct-value lists.
    /// Numbers sort before text.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Number(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// A normalized cell. `imputed` marks cells whose source value was missing
/// and which now hold the column's default.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: Value,
    pub imputed: bool,
}

impl Cell {
    pub fn present(value: Value) -> Self {
        Self {
            value,
            imputed: false,
        }
    }

    pub fn imputed(value: Value) -> Self {
        Self {
            value,
            imputed: true,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.imputed
    }

    pub fn to_raw(&self) -> RawCell {
        if self.imputed {
            return RawCell::Empty;
        }
        match &self.value {
            Value::Text(s) => RawCell::Text(s.clone()),
            Value::Number(n) => RawCell::Number(*n),
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Parses a finite number from display text. `NaN` and infinities are
/// rejected so numeric columns never hold them. Commas are accepted only as
/// thousands separators (`1,234.5`); list-like text such as `2019,2020` is
/// not a number.
pub fn parse_finite(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains(',') {
        if !is_thousands_grouped(trimmed) {
            return None;
        }
        trimmed.replace(',', "").parse::<f64>().ok()
    } else {
        trimmed.parse::<f64>().ok()
    };
    candidate.filter(|n| n.is_finite())
}

fn is_thousands_grouped(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };
    if fraction.is_some_and(|f| f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit())) {
        return false;
    }
    let mut groups = integer.split(',');
    let leading_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));
    leading_ok && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}

const PLACEHOLDER_TOKENS: &[&str] = &["na", "n/a", "nan", "null", "none", "#n/a"];

pub fn is_placeholder_token(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    PLACEHOLDER_TOKENS.contains(&lowered.as_str()) || lowered.chars().all(|c| c == '-')
}
