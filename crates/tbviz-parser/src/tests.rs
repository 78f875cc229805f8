use std::fs;
use std::path::PathBuf;

use crate::errors::ParserError;
use crate::formats::{clean_cell, split_bracketed, ColumnMap, ColumnRole};
use crate::model::{CanonicalField, DatasetKind, Indicator, Stratum};
use crate::{detect_kind, parse_dataset, parse_dataset_with, parse_source_file};

fn fixture(path: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read_to_string(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

#[test]
fn detects_every_dataset_kind() {
    let cases = [
        ("burden.csv", DatasetKind::Burden),
        ("coverage.csv", DatasetKind::Coverage),
        ("coverage_display.csv", DatasetKind::Coverage),
        ("rr_tb_wide.csv", DatasetKind::RrTb),
        ("rr_tb_long.csv", DatasetKind::RrTb),
        ("hiv_survey.csv", DatasetKind::HivSurvey),
        ("hiv_sentinel.csv", DatasetKind::HivSentinel),
    ];
    for (name, expected) in cases {
        let kind = detect_kind(&fixture(name))
            .unwrap_or_else(|err| panic!("{name} was not detected: {err}"));
        assert_eq!(kind, expected, "{name}");
    }
}

#[test]
fn burden_keeps_partial_rows_and_drops_unknown_columns() {
    let table = parse_source_file(&fixture("burden.csv")).expect("burden parse failed");

    assert_eq!(table.kind, DatasetKind::Burden);
    assert_eq!(table.records.len(), 9);
    assert!(table.missing_columns.is_empty());
    assert_eq!(
        table.dropped_columns,
        vec!["iso2".to_string(), "e_pop_num".to_string()]
    );

    let india = &table.records[0];
    assert_eq!(india.line, 2);
    assert_eq!(india.country.as_deref(), Some("India"));
    assert_eq!(india.iso3.as_deref(), Some("IND"));
    assert_eq!(india.region.as_deref(), Some("SEA"));
    assert_eq!(india.year.as_deref(), Some("2015"));
    assert_eq!(india.value(Indicator::IncidencePer100k), Some("289"));

    let germany_2023 = &table.records[5];
    assert_eq!(germany_2023.value(Indicator::MortalityPer100k), None);
    assert_eq!(germany_2023.value(Indicator::IncidencePer100k), Some("5.2"));

    let atlantis = &table.records[6];
    assert_eq!(atlantis.region, None);

    let keyless = &table.records[7];
    assert_eq!(keyless.country, None);
    assert_eq!(keyless.year.as_deref(), Some("2016"));
}

#[test]
fn coverage_placeholders_become_absent_not_zero() {
    let table = parse_dataset(DatasetKind::Coverage, &fixture("coverage.csv")).unwrap();

    assert_eq!(table.dropped_columns, vec!["Comments".to_string()]);
    let nigeria = table
        .records
        .iter()
        .find(|r| r.country.as_deref() == Some("Nigeria"))
        .expect("Nigeria row missing");
    assert_eq!(nigeria.value(Indicator::CoveragePct), None);
    assert_eq!(nigeria.value(Indicator::CoverageLo), None);

    let kenya = table
        .records
        .iter()
        .find(|r| r.country.as_deref() == Some("Kenya"))
        .expect("Kenya row should be trimmed");
    // coercion happens during normalization; ingestion keeps the raw text
    assert_eq!(kenya.value(Indicator::CoveragePct), Some("not-a-number"));
}

#[test]
fn coverage_display_values_are_split_into_bounds() {
    let table = parse_dataset(DatasetKind::Coverage, &fixture("coverage_display.csv")).unwrap();
    let brazil = &table.records[0];
    assert_eq!(brazil.value(Indicator::CoveragePct), Some("85"));
    assert_eq!(brazil.value(Indicator::CoverageLo), Some("72"));
    assert_eq!(brazil.value(Indicator::CoverageHi), Some("98"));

    let peru = &table.records[1];
    assert_eq!(peru.value(Indicator::CoveragePct), Some("92"));
    assert_eq!(peru.value(Indicator::CoverageLo), None);
}

#[test]
fn wide_rr_tb_rows_expand_per_case_type() {
    let table = parse_source_file(&fixture("rr_tb_wide.csv")).unwrap();
    assert_eq!(table.records.len(), 4);

    let india: Vec<_> = table
        .records
        .iter()
        .filter(|r| r.iso3.as_deref() == Some("IND"))
        .collect();
    assert_eq!(india.len(), 2);
    assert_eq!(india[0].stratum.as_deref(), Some("new"));
    assert_eq!(india[0].value(Indicator::RrPct), Some("3.6"));
    assert_eq!(india[1].stratum.as_deref(), Some("previously treated"));
    assert_eq!(india[1].value(Indicator::RrPctHi), Some("15"));
    assert_eq!(india[0].line, india[1].line);

    let russia_ret = table
        .records
        .iter()
        .find(|r| {
            r.iso3.as_deref() == Some("RUS") && r.stratum.as_deref() == Some("previously treated")
        })
        .expect("short row should still produce a partial record");
    assert_eq!(russia_ret.value(Indicator::RrPct), None);
}

#[test]
fn long_rr_tb_keeps_reporting_dates() {
    let table = parse_dataset(DatasetKind::RrTb, &fixture("rr_tb_long.csv")).unwrap();
    assert_eq!(table.records.len(), 3);
    assert_eq!(table.records[1].reported_at.as_deref(), Some("2024-02-10"));
    assert_eq!(table.records[2].stratum.as_deref(), Some("previously treated"));
}

#[test]
fn missing_required_columns_are_reported_not_fatal() {
    let content = "country,e_inc_100k\nIndia,200\n";
    let table = parse_dataset(DatasetKind::Burden, content).expect("missing year must not abort");
    assert_eq!(table.missing_columns, vec![CanonicalField::Year]);
    assert!(!table.has_column(CanonicalField::Year));
    assert_eq!(table.records.len(), 1);
    assert_eq!(table.records[0].year, None);
}

#[test]
fn unknown_file_reports_every_attempt() {
    let err = parse_source_file("foo,bar\n1,2\n").unwrap_err();
    match err {
        ParserError::NoMatchingParser { attempts } => assert_eq!(attempts.len(), 5),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_input_has_no_header() {
    let err = parse_dataset(DatasetKind::Burden, "").unwrap_err();
    assert!(matches!(err, ParserError::MissingHeader { .. }));
}

#[test]
fn substituted_column_map_changes_classification() {
    let columns = ColumnMap::default()
        .with_shared_alias("nation", CanonicalField::Country)
        .with_shared_alias("yr", CanonicalField::Year)
        .with_alias(DatasetKind::Burden, "tb_rate", Indicator::IncidencePer100k);
    assert_eq!(
        columns.classify(DatasetKind::Burden, " TB_Rate "),
        ColumnRole::Field(CanonicalField::Indicator(Indicator::IncidencePer100k))
    );
    assert_eq!(columns.classify(DatasetKind::Burden, "country_name"), ColumnRole::Ignored);

    let table =
        parse_dataset_with(DatasetKind::Burden, "nation,yr,tb_rate\nPeru,2020,116\n", &columns)
            .unwrap();
    assert!(table.missing_columns.is_empty());
    assert_eq!(table.records[0].country.as_deref(), Some("Peru"));
    assert_eq!(table.records[0].value(Indicator::IncidencePer100k), Some("116"));
}

#[test]
fn region_headers_map_to_the_region_field() {
    let columns = ColumnMap::builtin();
    for header in ["g_whoregion", "WHO_REGION", "Region", "ParentLocationCode"] {
        assert_eq!(
            columns.classify(DatasetKind::Coverage, header),
            ColumnRole::Field(CanonicalField::Region),
            "{header}"
        );
    }

    let content = "Location,ParentLocationCode,Period,Value\nChile,AMR,2022,81\n";
    let table = parse_dataset(DatasetKind::Coverage, content).unwrap();
    assert!(table.dropped_columns.is_empty());
    assert_eq!(table.records[0].region.as_deref(), Some("AMR"));
}

#[test]
fn duplicate_headers_keep_the_first_column() {
    let content = "country,location,year,e_inc_100k\nChile,Ignored,2020,14\n";
    let table = parse_dataset(DatasetKind::Burden, content).unwrap();
    assert_eq!(table.dropped_columns, vec!["location".to_string()]);
    assert_eq!(table.records[0].country.as_deref(), Some("Chile"));
}

#[test]
fn byte_order_mark_is_stripped_from_first_header() {
    let content = "\u{feff}YEAR,COUNTRY,VALUE\n2022,Peru,90\n";
    let table = parse_dataset(DatasetKind::Coverage, content).unwrap();
    assert!(table.missing_columns.is_empty());
    assert_eq!(table.headers[0], "YEAR");
}

#[test]
fn identical_content_hashes_identically() {
    let content = fixture("hiv_survey.csv");
    let a = parse_dataset(DatasetKind::HivSurvey, &content).unwrap();
    let b = parse_dataset(DatasetKind::HivSurvey, &content).unwrap();
    assert_eq!(a.file_hash, b.file_hash);
    assert_eq!(a.file_hash.len(), 64);
}

#[test]
fn stratum_labels_normalize() {
    assert_eq!(Stratum::from_label("New"), Stratum::New);
    assert_eq!(Stratum::from_label("retreatment"), Stratum::PreviouslyTreated);
    assert_eq!(Stratum::from_label(" Sentinel "), Stratum::Sentinel);
    assert_eq!(Stratum::from_label("children"), Stratum::Other("children".to_string()));
    assert_eq!(DatasetKind::HivSentinel.default_stratum(), Stratum::Sentinel);
}

#[test]
fn placeholder_and_bracket_helpers() {
    assert_eq!(clean_cell("  N/A "), None);
    assert_eq!(clean_cell("..."), None);
    assert_eq!(clean_cell(" 12.5 "), Some("12.5".to_string()));
    assert_eq!(
        split_bracketed("85 [72-98]"),
        Some(("85".to_string(), "72".to_string(), "98".to_string()))
    );
    assert_eq!(split_bracketed("85"), None);
}
