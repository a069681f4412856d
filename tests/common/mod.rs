#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sheet_query::{
    cache::{LoadOptions, LoadedSource},
    data::RawCell,
    labels::FieldLabels,
    session::Session,
    source::RawTable,
};
use tempfile::{TempDir, tempdir};

/// Company/year/metric rows in the layout of the digitalization dataset.
pub const COMPANY_CSV: &str = "\
企业名称,股票代码,年份,行业,数字化转型指数,人工智能词频
浦发银行,600000,2020,金融,2.0,4
浦发银行,600000,2019,金融,1.5,
白云机场,600004,2019,交通运输,3.0,1
招商银行,600036,2019,金融,4.5,2
,600001,2019,金融,1.0,0
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Builds a raw table from string cells; empty strings become missing cells.
pub fn raw_table(header: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        header.iter().map(|h| RawCell::from(*h)).collect(),
        rows.iter()
            .map(|row| row.iter().map(|c| RawCell::from(*c)).collect())
            .collect(),
    )
}

pub fn session_with_labels(raw: &RawTable, labels: FieldLabels) -> Session {
    let options = LoadOptions {
        labels,
        ..LoadOptions::default()
    };
    let source = LoadedSource::from_raw("memory.csv", "test", raw, &options).expect("load");
    Session::from_source(Arc::new(source))
}

pub fn session(raw: &RawTable) -> Session {
    session_with_labels(raw, FieldLabels::default())
}

/// The `code` / `year` / `idx` table used throughout the query tests.
pub fn code_year_session() -> Session {
    let labels: FieldLabels =
        serde_yaml::from_str("code: [code]\nperiod: [year]\n").expect("labels");
    let raw = raw_table(
        &["code", "year", "idx"],
        &[
            &["600000", "2019", "1.5"],
            &["600000", "2020", "2.0"],
            &["600001", "2019", "3.0"],
        ],
    );
    session_with_labels(&raw, labels)
}

pub fn company_session() -> Session {
    let workspace = TestWorkspace::new();
    let path = workspace.write("companies.csv", COMPANY_CSV);
    let raw = RawTable::from_path(&path, &Default::default()).expect("decode csv");
    session(&raw)
}
