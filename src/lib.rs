pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod data;
pub mod error;
pub mod export;
pub mod io_utils;
pub mod labels;
pub mod normalize;
pub mod query;
pub mod resolve;
pub mod session;
pub mod source;
pub mod table;

use std::{env, fs, path::PathBuf, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cache::{LoadOptions, SourceCache},
    cli::{Cli, Commands, OutputArgs, SourceArgs},
    export::ExportOptions,
    labels::FieldLabels,
    normalize::{DuplicateHeaderPolicy, NormalizeOptions},
    query::{KeywordSearch, Query, ResultSet},
    resolve::FieldRole,
    session::{QueryOutcome, Session},
    source::SourceOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_query", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let mut cache = SourceCache::new();
    match cli.command {
        Commands::Fields(args) => handle_fields(&mut cache, &args.source),
        Commands::Values(args) => handle_values(&mut cache, &args),
        Commands::Query(args) => handle_query(&mut cache, &args),
        Commands::Search(args) => handle_search(&mut cache, &args),
        Commands::Chart(args) => handle_chart(&mut cache, &args),
        Commands::Labels(args) => handle_labels(&args),
    }
}

fn open_session(cache: &mut SourceCache, args: &SourceArgs) -> Result<Session> {
    let labels = FieldLabels::load_or_default(args.labels.as_deref())?;
    let options = LoadOptions {
        source: SourceOptions {
            sheet: args.sheet.clone(),
            delimiter: args.delimiter,
            encoding: args.input_encoding.clone(),
        },
        labels,
        normalize: NormalizeOptions {
            duplicate_headers: if args.suffix_duplicates {
                DuplicateHeaderPolicy::Suffix
            } else {
                normalize::DUPLICATE_HEADER_POLICY
            },
        },
    };
    let session = Session::open(cache, &args.input, &options)
        .with_context(|| format!("Loading {:?}", args.input))?;
    Ok(session)
}

/// Falls back to the highest-priority identifier field when none is given.
fn identifier_field(session: &Session, requested: Option<&str>) -> Result<String> {
    if let Some(field) = requested {
        return Ok(field.trim().to_string());
    }
    session
        .identifier_fields()
        .first()
        .map(|field| field.name.clone())
        .ok_or_else(|| anyhow!("No company name or stock code column was recognized"))
}

fn handle_fields(cache: &mut SourceCache, args: &SourceArgs) -> Result<()> {
    let session = open_session(cache, args)?;
    let annotation = session.annotation();
    let rows = session
        .table()
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let role = match annotation.role(idx) {
                FieldRole::Identifier(kind) => format!("identifier ({kind:?})").to_lowercase(),
                FieldRole::Temporal => "temporal".to_string(),
                FieldRole::Metric => "metric".to_string(),
                FieldRole::Auxiliary if annotation.group_field() == Some(idx) => {
                    "group".to_string()
                }
                FieldRole::Auxiliary => "auxiliary".to_string(),
            };
            let kind = format!("{:?}", session.table().kind(idx)).to_lowercase();
            vec![(idx + 1).to_string(), name.clone(), kind, role]
        })
        .collect::<Vec<_>>();
    let headers = vec![
        "#".to_string(),
        "column".to_string(),
        "type".to_string(),
        "role".to_string(),
    ];
    table::print_table(&headers, &rows);
    let periods = session.temporal_range();
    if let (Some(first), Some(last)) = (periods.first(), periods.last()) {
        println!("periods: {first}..={last} ({} distinct)", periods.len());
    }
    info!(
        "{} row(s); identifier fields: {:?}",
        session.table().row_count(),
        annotation.identifier_names()
    );
    Ok(())
}

fn handle_values(cache: &mut SourceCache, args: &cli::ValuesArgs) -> Result<()> {
    let session = open_session(cache, &args.source)?;
    let field = identifier_field(&session, args.field.as_deref())?;
    let values = session.distinct_values(&field)?;
    for value in &values {
        println!("{value}");
    }
    info!("{} distinct value(s) in '{}'", values.len(), field);
    Ok(())
}

fn handle_query(cache: &mut SourceCache, args: &cli::QueryArgs) -> Result<()> {
    let session = open_session(cache, &args.source)?;
    let field = identifier_field(&session, args.field.as_deref())?;
    let mut query = Query::new(field.clone(), args.value.trim());
    if let Some(period) = args.period {
        query = query.with_period(period);
    }
    if !args.metrics.is_empty() {
        query = query.with_metrics(cleaned(&args.metrics));
    }
    debug!("Executing {query:?}");
    match session.query(&query)? {
        QueryOutcome::Rows(result) => {
            println!("{field}: {}", query.identifier_value);
            emit(&session, &result, &query.identifier_value, &args.output)
        }
        QueryOutcome::Empty => {
            println!("No rows matched {field} = '{}'", query.identifier_value);
            Ok(())
        }
    }
}

fn handle_search(cache: &mut SourceCache, args: &cli::SearchArgs) -> Result<()> {
    let session = open_session(cache, &args.source)?;
    let mut search = KeywordSearch::new(args.keyword.as_str());
    if let Some(period) = args.period {
        search = search.with_period(period);
    }
    if !args.metrics.is_empty() {
        search = search.with_metrics(cleaned(&args.metrics));
    }
    match session.search(&search)? {
        QueryOutcome::Rows(result) => emit(&session, &result, &search.keyword, &args.output),
        QueryOutcome::Empty => {
            println!("No rows matched keyword '{}'", search.keyword);
            Ok(())
        }
    }
}

fn handle_chart(cache: &mut SourceCache, args: &cli::ChartArgs) -> Result<()> {
    let session = open_session(cache, &args.source)?;
    let field = identifier_field(&session, args.field.as_deref())?;
    let mut query = Query::new(field.clone(), args.value.trim());
    if let Some(period) = args.period {
        query = query.with_period(period);
    }
    let metrics = cleaned(&args.metrics);
    if !metrics.is_empty() {
        query = query.with_metrics(metrics.clone());
    }
    let QueryOutcome::Rows(result) = session.query(&query)? else {
        println!("No rows matched {field} = '{}'", query.identifier_value);
        return Ok(());
    };
    let chart = session.chart_data(&result, &metrics)?;
    let json = serde_json::to_string_pretty(&chart).context("Serializing chart data")?;
    println!("{json}");
    Ok(())
}

fn handle_labels(args: &cli::LabelsArgs) -> Result<()> {
    let labels = FieldLabels::load_or_default(args.labels.as_deref())?;
    print!("{}", labels.to_yaml()?);
    Ok(())
}

fn emit(
    session: &Session,
    result: &ResultSet,
    identifier_value: &str,
    output: &OutputArgs,
) -> Result<()> {
    if output.output.is_none() && !output.export {
        print!("{}", table::render_result(result));
        info!("{} row(s) matched", result.len());
        return Ok(());
    }
    let options = ExportOptions {
        delimiter: io_utils::resolve_output_delimiter(
            output.output.as_deref(),
            output.output_delimiter,
        ),
        encoding: io_utils::resolve_encoding(output.output_encoding.as_deref())?,
    };
    let export = session.export(result, result.columns(), identifier_value, &options)?;
    let path = output
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&export.file_name));
    fs::write(&path, &export.bytes).with_context(|| format!("Writing export to {path:?}"))?;
    info!(
        "Exported {} row(s) to {:?} (delimiter '{}', {})",
        result.len(),
        path,
        printable_delimiter(options.delimiter),
        options.encoding.name()
    );
    Ok(())
}

fn cleaned(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect()
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
