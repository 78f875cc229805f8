use polars::prelude::*;
use tbviz_core::config::ViewsConfig;
use tbviz_core::frames::{
    heatmap_frame, merged_frame, normalized_frame, reduction_frame, write_view_frames,
    COUNTRY_COL, ISO3_COL, REGION_COL, YEAR_COL,
};
use tbviz_core::pipelines::{Pipeline, PipelineInputs};
use tbviz_core::normalize::normalize;
use tbviz_core::reconcile::merge_inner;
use tbviz_core::reference::ReferenceData;
use tbviz_core::views::{dual_group_heatmap, reduction, YearSpan};
use tbviz_parser::{parse_dataset, DatasetKind, Indicator};

fn fixture(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../tbviz-parser/tests/data")
        .join(name);
    std::fs::read_to_string(path).expect("read fixture")
}

fn burden() -> Vec<tbviz_core::types::NormalizedRecord> {
    let raw = parse_dataset(DatasetKind::Burden, &fixture("burden.csv")).expect("parse burden");
    normalize(&raw, ReferenceData::builtin()).table.records
}

#[test]
fn normalized_frame_has_key_and_indicator_columns() -> PolarsResult<()> {
    let records = burden();
    let df = normalized_frame(&records)?;
    assert_eq!(df.height(), records.len());

    for name in [COUNTRY_COL, ISO3_COL, YEAR_COL, REGION_COL, "e_inc_100k", "e_mort_100k"] {
        assert!(df.column(name).is_ok(), "missing column {name}");
    }

    // Atlantis has no region and Germany 2023 has no mortality
    assert_eq!(df.column(REGION_COL)?.null_count(), 1);
    assert_eq!(df.column("e_mort_100k")?.null_count(), 2);
    Ok(())
}

#[test]
fn merged_frame_keeps_both_sides() -> PolarsResult<()> {
    let raw = parse_dataset(DatasetKind::RrTb, &fixture("rr_tb_wide.csv")).expect("parse rr");
    let rr = normalize(&raw, ReferenceData::builtin()).table.records;
    let merged = merge_inner(&burden(), &rr);

    let df = merged_frame(&merged.records)?;
    assert_eq!(df.height(), 2);
    assert!(df.column("e_inc_100k").is_ok());
    assert!(df.column("rr_pct").is_ok());
    assert!(df.column("right_stratum").is_ok());
    Ok(())
}

#[test]
fn view_frames_use_nulls_for_absent_values() -> PolarsResult<()> {
    let records = burden();
    let metrics = reduction(
        &records,
        Indicator::IncidencePer100k,
        YearSpan {
            start: 2015,
            end: 2023,
        },
    );
    let df = reduction_frame(&metrics)?;
    assert_eq!(df.height(), metrics.len());
    // Atlantis only reports 2015
    assert_eq!(df.column("percent_reduction")?.null_count(), 1);

    let matrix = dual_group_heatmap(&records, Indicator::IncidencePer100k, &[2015, 2023], 10);
    let df = heatmap_frame(&matrix)?;
    assert_eq!(df.height(), matrix.developed.len() + matrix.developing.len());
    assert!(df.column("2015").is_ok());
    assert!(df.column("2023").is_ok());
    Ok(())
}

#[test]
fn pipeline_output_converts_every_view() -> anyhow::Result<()> {
    let inputs = PipelineInputs::new()
        .with_source(DatasetKind::Burden, fixture("burden.csv"))
        .with_source(DatasetKind::Coverage, fixture("coverage.csv"))
        .with_source(DatasetKind::RrTb, fixture("rr_tb_wide.csv"))
        .with_source(DatasetKind::HivSurvey, fixture("hiv_survey.csv"))
        .with_source(DatasetKind::HivSentinel, fixture("hiv_sentinel.csv"));
    let output = Pipeline::new(ReferenceData::builtin().clone(), ViewsConfig::default())
        .run(&inputs)?;

    let frames = output.frames()?;
    assert_eq!(frames.len(), 10);
    assert_eq!(frames["incidence_trend"].height(), 6);
    assert_eq!(frames["coverage"].height(), 5);
    assert_eq!(frames["incidence_rr_tb"].height(), 2);
    assert_eq!(frames["hiv"].height(), 4);
    assert!(frames["hiv_heatmap"].column("2021").is_ok());

    let dir = std::env::temp_dir().join(format!("tbviz-frames-{}", std::process::id()));
    let written = write_view_frames(&frames, &dir)?;
    assert_eq!(written.len(), frames.len());

    let coverage = ParquetReader::new(std::fs::File::open(dir.join("coverage.parquet"))?).finish()?;
    assert_eq!(coverage.shape(), frames["coverage"].shape());
    assert_eq!(
        coverage.get_column_names(),
        frames["coverage"].get_column_names()
    );

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
