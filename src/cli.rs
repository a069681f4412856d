use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Look up, summarize, and export per-company metrics from a spreadsheet",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show how each column was classified and the available periods
    Fields(FieldsArgs),
    /// List the distinct values of an identifier field
    Values(ValuesArgs),
    /// Look up the rows for one company name or stock code
    Query(QueryArgs),
    /// Case-insensitive keyword search across all identifier fields
    Search(SearchArgs),
    /// Emit chart data (means, peer baseline, trends) as JSON
    Chart(ChartArgs),
    /// Print the effective label vocabulary as YAML
    Labels(LabelsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Workbook (.xlsx, .xls, .xlsb, .ods) or delimited text file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Worksheet to read (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Delimiter for text input (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// YAML file overriding the recognized column labels
    #[arg(long)]
    pub labels: Option<PathBuf>,
    /// Rename repeated header labels instead of dropping them
    #[arg(long = "suffix-duplicates")]
    pub suffix_duplicates: bool,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct ValuesArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Identifier field to list (defaults to the first identifier field)
    #[arg(short = 'f', long = "field")]
    pub field: Option<String>,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Identifier field to match (defaults to the first identifier field)
    #[arg(short = 'f', long = "field")]
    pub field: Option<String>,
    /// Exact value to look up
    #[arg(short = 'v', long = "value")]
    pub value: String,
    /// Restrict to one period (e.g. a fiscal year)
    #[arg(short = 'p', long = "period")]
    pub period: Option<i64>,
    /// Metric columns to include (comma-separated or repeated)
    #[arg(short = 'C', long = "metrics", value_delimiter = ',')]
    pub metrics: Vec<String>,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Keyword matched case-insensitively against names and codes
    #[arg(short = 'k', long = "keyword", default_value = "")]
    pub keyword: String,
    /// Restrict to one period (e.g. a fiscal year)
    #[arg(short = 'p', long = "period")]
    pub period: Option<i64>,
    /// Metric columns to include (comma-separated or repeated)
    #[arg(short = 'C', long = "metrics", value_delimiter = ',')]
    pub metrics: Vec<String>,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Write the result as delimited text to this path instead of printing it
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Write the result to the suggested file name in the current directory
    #[arg(long = "export", conflicts_with = "output")]
    pub export: bool,
    /// Delimiter for exported text (defaults from the output extension)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for exported text (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ChartArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Identifier field to match (defaults to the first identifier field)
    #[arg(short = 'f', long = "field")]
    pub field: Option<String>,
    /// Exact value to look up
    #[arg(short = 'v', long = "value")]
    pub value: String,
    /// Restrict to one period (e.g. a fiscal year)
    #[arg(short = 'p', long = "period")]
    pub period: Option<i64>,
    /// Metrics to chart, in series order (defaults to every metric)
    #[arg(short = 'C', long = "metrics", value_delimiter = ',')]
    pub metrics: Vec<String>,
}

#[derive(Debug, Args)]
pub struct LabelsArgs {
    /// YAML file overriding the recognized column labels
    #[arg(long)]
    pub labels: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("，").is_err());
    }

    #[test]
    fn query_metrics_split_on_commas() {
        let cli = Cli::try_parse_from([
            "sheet-query",
            "query",
            "-i",
            "data.xlsx",
            "-v",
            "600000",
            "-C",
            "a,b",
            "-C",
            "c",
        ])
        .expect("parse");
        match cli.command {
            Commands::Query(args) => {
                assert_eq!(args.metrics, vec!["a", "b", "c"]);
                assert_eq!(args.field, None);
                assert!(!args.output.export);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
