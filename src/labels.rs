//! Recognized column vocabulary.
//!
//! Field roles are discovered by matching column names against these label
//! sets, so the domain vocabulary lives in configuration rather than in the
//! query pipeline. Matching is exact after case folding and whitespace
//! removal. The defaults cover the Chinese and English headers commonly found
//! in company digitalization datasets; a YAML file can replace them.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Name,
    Code,
}

impl IdentifierKind {
    /// Presentation priority: names are offered before codes.
    pub const PRIORITY: [IdentifierKind; 2] = [IdentifierKind::Name, IdentifierKind::Code];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FieldLabels {
    pub name: Vec<String>,
    pub code: Vec<String>,
    pub period: Vec<String>,
    pub group: Vec<String>,
}

impl Default for FieldLabels {
    fn default() -> Self {
        Self {
            name: to_owned(&[
                "企业名称",
                "公司名称",
                "公司简称",
                "company",
                "company name",
                "firm",
                "entity",
            ]),
            code: to_owned(&[
                "股票代码",
                "证券代码",
                "stock code",
                "stkcd",
                "ticker",
                "symbol",
            ]),
            period: to_owned(&["年份", "年度", "会计年度", "year", "fiscal year", "period"]),
            group: to_owned(&["行业", "行业名称", "所属行业", "industry", "sector"]),
        }
    }
}

fn to_owned(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

impl FieldLabels {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening labels file {path:?}"))?;
        let reader = BufReader::new(file);
        let labels = serde_yaml::from_reader(reader).context("Parsing labels YAML")?;
        Ok(labels)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing labels to YAML")
    }

    pub fn identifier_kind(&self, column: &str) -> Option<IdentifierKind> {
        if matches_any(&self.name, column) {
            Some(IdentifierKind::Name)
        } else if matches_any(&self.code, column) {
            Some(IdentifierKind::Code)
        } else {
            None
        }
    }

    pub fn is_period(&self, column: &str) -> bool {
        matches_any(&self.period, column)
    }

    pub fn is_group(&self, column: &str) -> bool {
        matches_any(&self.group, column)
    }
}

pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn matches_any(labels: &[String], column: &str) -> bool {
    let needle = normalize_label(column);
    !needle.is_empty() && labels.iter().any(|label| normalize_label(label) == needle)
}
