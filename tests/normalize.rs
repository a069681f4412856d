mod common;

use proptest::prelude::*;
use sheet_query::{
    data::{ColumnKind, RawCell, Value},
    labels::FieldLabels,
    normalize::{MISSING_IDENTIFIER_PLACEHOLDER, normalize},
    resolve::{FieldRole, resolve},
    source::RawTable,
};

use common::raw_table;

#[test]
fn metric_columns_hold_only_finite_numbers() {
    let raw = raw_table(
        &["股票代码", "年份", "指数", "得分"],
        &[
            &["600000", "2019", "1.5", "NaN"],
            &["600001", "2020", "", "3"],
            &["600002", "2021", "n/a", "-"],
        ],
    );
    let labels = FieldLabels::default();
    let table = normalize(&raw, &labels).expect("normalize");
    let annotation = resolve(&table, &labels);
    assert_eq!(annotation.metric_names(), vec!["指数", "得分"]);
    for &column in annotation.metric_fields() {
        assert_eq!(table.kind(column), ColumnKind::Number);
        for record in table.rows() {
            let n = record.value(column).as_number().expect("numeric cell");
            assert!(n.is_finite());
        }
    }
}

#[test]
fn missing_identifier_renders_placeholder_and_other_text_renders_empty() {
    let raw = raw_table(
        &["企业名称", "行业"],
        &[&["浦发银行", "金融"], &["", ""]],
    );
    let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
    let row = &table.rows()[1];
    assert_eq!(row.value(0), &Value::Text(MISSING_IDENTIFIER_PLACEHOLDER.into()));
    assert_eq!(row.value(1), &Value::Text(String::new()));
    assert!(row.cell(0).is_missing() && row.cell(1).is_missing());
}

#[test]
fn every_column_gets_exactly_one_role() {
    let raw = raw_table(
        &["企业名称", "股票代码", "证券代码", "年份", "行业", "指数", "备注"],
        &[&["甲", "1", "2", "2019", "金融", "0.5", "x"]],
    );
    let labels = FieldLabels::default();
    let table = normalize(&raw, &labels).expect("normalize");
    let annotation = resolve(&table, &labels);
    let roles = annotation.roles();
    assert_eq!(roles.len(), table.columns().len());
    let identifiers = roles
        .iter()
        .filter(|r| matches!(r, FieldRole::Identifier(_)))
        .count();
    let temporal = roles.iter().filter(|r| **r == FieldRole::Temporal).count();
    assert_eq!(identifiers, 2);
    assert_eq!(temporal, 1);
    // 证券代码 is a second code column and is demoted.
    assert_eq!(annotation.role(2), FieldRole::Auxiliary);
}

#[test]
fn comma_separated_lists_are_text_not_metrics() {
    let raw = raw_table(
        &["股票代码", "years", "revenue"],
        &[&["600000", "2019,2020", "1,234.5"], &["600001", "1,2,3", "12,000"]],
    );
    let labels = FieldLabels::default();
    let table = normalize(&raw, &labels).expect("normalize");
    let annotation = resolve(&table, &labels);
    assert_eq!(table.kind(1), ColumnKind::Text);
    assert_eq!(table.rows()[0].value(1), &Value::Text("2019,2020".into()));
    assert_eq!(annotation.metric_names(), vec!["revenue"]);
    assert_eq!(table.rows()[1].value(2), &Value::Number(12_000.0));
}

#[test]
fn blank_header_does_not_shadow_a_real_column() {
    let raw = raw_table(&["", "field_0", "股票代码"], &[&["x", "42", "600000"]]);
    let table = normalize(&raw, &FieldLabels::default()).expect("normalize");
    assert_eq!(table.columns(), ["field_1", "field_0", "股票代码"]);
    let column = table.column_index("field_0").expect("real column kept");
    assert_eq!(table.rows()[0].value(column), &Value::Number(42.0));
}

fn cell_strategy() -> impl Strategy<Value = RawCell> {
    prop_oneof![
        Just(RawCell::Empty),
        Just(RawCell::text("N/A")),
        (-1_000i32..1_000).prop_map(|n| RawCell::Number(f64::from(n) / 4.0)),
        "[0-9]{1,6}".prop_map(RawCell::Text),
        "[a-z甲乙丙 ]{1,5}".prop_map(RawCell::Text),
        any::<bool>().prop_map(RawCell::Bool),
    ]
}

fn header_strategy() -> impl Strategy<Value = RawCell> {
    prop_oneof![
        Just(RawCell::text("企业名称")),
        Just(RawCell::text(" 股票代码 ")),
        Just(RawCell::text("年份")),
        Just(RawCell::Empty),
        "[a-c]{1,2}".prop_map(RawCell::Text),
    ]
}

fn raw_strategy() -> impl Strategy<Value = RawTable> {
    (1usize..6).prop_flat_map(|width| {
        (
            proptest::collection::vec(header_strategy(), width),
            proptest::collection::vec(proptest::collection::vec(cell_strategy(), width), 0..8),
        )
            .prop_map(|(header, rows)| RawTable::new(header, rows))
    })
}

proptest! {
    #[test]
    fn normalizing_twice_changes_nothing(raw in raw_strategy()) {
        let labels = FieldLabels::default();
        let once = normalize(&raw, &labels).expect("normalize");
        let twice = normalize(&once.to_raw(), &labels).expect("renormalize");
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn resolve_is_deterministic_for_any_table(raw in raw_strategy()) {
        let labels = FieldLabels::default();
        let table = normalize(&raw, &labels).expect("normalize");
        prop_assert_eq!(resolve(&table, &labels), resolve(&table, &labels));
    }
}
