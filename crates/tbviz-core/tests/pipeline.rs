use anyhow::Result;
use tbviz_core::config::ViewsConfig;
use tbviz_core::diagnostics::{Issue, IssueKind};
use tbviz_core::error::PipelineError;
use tbviz_core::pipelines::{all_pipeline_descriptors, Pipeline, PipelineInputs, Task};
use tbviz_core::reference::ReferenceData;
use tbviz_core::types::WhoRegion;
use tbviz_parser::{DatasetKind, Indicator};

fn fixture(name: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../tbviz-parser/tests/data")
        .join(name);
    std::fs::read_to_string(path).expect("read fixture")
}

fn full_inputs() -> PipelineInputs {
    PipelineInputs::new()
        .with_source(DatasetKind::Burden, fixture("burden.csv"))
        .with_source(DatasetKind::Coverage, fixture("coverage.csv"))
        .with_source(DatasetKind::RrTb, fixture("rr_tb_wide.csv"))
        .with_source(DatasetKind::HivSurvey, fixture("hiv_survey.csv"))
        .with_source(DatasetKind::HivSentinel, fixture("hiv_sentinel.csv"))
}

fn pipeline() -> Pipeline {
    Pipeline::new(ReferenceData::builtin().clone(), ViewsConfig::default())
}

#[test]
fn registry_lists_every_task() {
    let descriptors = all_pipeline_descriptors();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].tasks.len(), 5);
    assert!(descriptors[0]
        .tasks
        .iter()
        .any(|t| t.task == Task::HivSurveillance && t.inputs.len() == 2));
}

#[test]
fn full_run_builds_every_view() -> Result<()> {
    let output = pipeline().run(&full_inputs())?;
    let summary = &output.summary;

    assert_eq!(summary.sources.len(), 5);
    assert_eq!(summary.tasks_run.len(), 5);
    assert!(summary.tasks_skipped.is_empty());
    assert!(summary.sources.iter().all(|s| s.file_hash.len() == 64));

    let trend = &output.views.incidence_trend;
    assert_eq!(trend.regional_trend.len(), 6);
    assert_eq!(trend.map_year, Some(2023));
    assert_eq!(trend.map.len(), 3);
    assert_eq!(trend.year_bounds, Some((2015, 2023)));
    assert_eq!(trend.countries.len(), 4);

    let reduction = &output.views.reduction;
    assert_eq!(reduction.metrics.len(), 4);
    assert_eq!(
        reduction
            .metrics
            .iter()
            .filter(|m| m.percent_reduction.is_none())
            .count(),
        1
    );

    let coverage = &output.views.coverage;
    assert_eq!(coverage.table.len(), 5);
    assert_eq!(
        coverage.series_country.as_ref().map(|c| c.id.as_str()),
        Some("BRA")
    );
    assert_eq!(coverage.series.len(), 2);
    assert_eq!(coverage.ranking_year, Some(2022));
    let top: Vec<&str> = coverage.top_n.iter().map(|e| e.country.name.as_str()).collect();
    assert_eq!(top, vec!["Brazil", "Viet Nam"]);

    let resistance = &output.views.resistance;
    assert_eq!(resistance.merged.len(), 2);
    assert_eq!(resistance.distribution_year, Some(2023));
    assert_eq!(resistance.distribution.len(), 1);
    assert_eq!(resistance.distribution[0].region, WhoRegion::SouthEastAsia);
    assert_eq!(resistance.distribution[0].median, 3.6);

    let hiv = &output.views.hiv;
    assert_eq!(hiv.records.len(), 4);
    assert_eq!(hiv.heatmap.years, vec![2020, 2021]);
    assert!(hiv.heatmap.developed.is_empty());
    let rows: Vec<&str> = hiv
        .heatmap
        .developing
        .iter()
        .map(|r| r.country.name.as_str())
        .collect();
    assert_eq!(rows, vec!["Malawi", "Zimbabwe"]);
    Ok(())
}

#[test]
fn diagnostics_are_collected_not_raised() -> Result<()> {
    let output = pipeline().run(&full_inputs())?;
    let totals = &output.summary.diagnostics;

    assert_eq!(totals.get(&IssueKind::InvalidKey), Some(&2));
    assert_eq!(totals.get(&IssueKind::UnmappedCountry), Some(&1));
    assert_eq!(totals.get(&IssueKind::UnparseableValue), Some(&1));
    assert_eq!(totals.get(&IssueKind::UndefinedMetric), Some(&1));
    assert_eq!(totals.get(&IssueKind::EmptyJoin), None);
    assert_eq!(output.diagnostics.issues.len(), 5);
    Ok(())
}

#[test]
fn runs_are_idempotent() -> Result<()> {
    let first = pipeline().run(&full_inputs())?;
    let second = pipeline().run(&full_inputs())?;
    assert_eq!(first.views, second.views);
    assert_eq!(
        first.summary.output_fingerprint,
        second.summary.output_fingerprint
    );
    Ok(())
}

#[test]
fn missing_sources_skip_their_tasks() -> Result<()> {
    let inputs = PipelineInputs::new().with_source(DatasetKind::Coverage, fixture("coverage.csv"));
    let output = pipeline().run(&inputs)?;

    assert_eq!(output.summary.tasks_run, vec![Task::TreatmentCoverage]);
    assert_eq!(output.summary.tasks_skipped.len(), 4);
    assert!(output.views.incidence_trend.regional_trend.is_empty());
    assert!(output.views.reduction.metrics.is_empty());
    assert!(output.views.resistance.merged.is_empty());
    assert!(output.views.hiv.records.is_empty());
    assert_eq!(output.views.coverage.table.len(), 5);
    Ok(())
}

#[test]
fn configured_series_country_and_top_n_are_honoured() -> Result<()> {
    let views = ViewsConfig {
        top_n: 1,
        series_country: Some("vnm".to_string()),
        ..ViewsConfig::default()
    };
    let output = Pipeline::new(ReferenceData::builtin().clone(), views).run(&full_inputs())?;
    let coverage = &output.views.coverage;

    assert_eq!(coverage.top_n.len(), 1);
    assert_eq!(
        coverage.series_country.as_ref().map(|c| c.name.as_str()),
        Some("Viet Nam")
    );
    assert_eq!(coverage.series.len(), 1);
    assert_eq!(coverage.series[0].value, Some(71.0));
    assert_eq!(coverage.series[0].upper, Some(81.0));
    Ok(())
}

#[test]
fn merged_rows_join_on_country_and_year() -> Result<()> {
    let output = pipeline().run(&full_inputs())?;
    for row in &output.views.resistance.merged {
        assert_eq!(row.country.id, "IND");
        assert_eq!(row.left.value(Indicator::IncidencePer100k), Some(195.0));
        assert!(row.right.value(Indicator::RrPct).is_some());
    }
    Ok(())
}

#[test]
fn unreadable_source_skips_only_its_own_tasks() -> Result<()> {
    let inputs = PipelineInputs::new()
        .with_source(DatasetKind::Burden, fixture("burden.csv"))
        .with_source(DatasetKind::Coverage, "");
    let output = pipeline().run(&inputs)?;
    let summary = &output.summary;

    assert_eq!(
        summary.tasks_run,
        vec![Task::IncidenceTrend, Task::IncidenceReduction]
    );
    assert!(summary.tasks_skipped.contains(&Task::TreatmentCoverage));
    assert_eq!(summary.sources.len(), 1);
    assert_eq!(summary.diagnostics.get(&IssueKind::UnreadableSource), Some(&1));

    let unreadable: Vec<DatasetKind> = output
        .diagnostics
        .issues
        .iter()
        .filter_map(|issue| match issue {
            Issue::UnreadableSource { dataset, .. } => Some(*dataset),
            _ => None,
        })
        .collect();
    assert_eq!(unreadable, vec![DatasetKind::Coverage]);
    assert!(!output.tables.contains_key(&DatasetKind::Coverage));
    assert!(output.views.coverage.table.is_empty());
    assert_eq!(output.views.incidence_trend.regional_trend.len(), 6);
    assert_eq!(output.views.reduction.metrics.len(), 4);
    Ok(())
}

#[test]
fn ingest_reports_parse_failures_as_errors() {
    let err = pipeline().ingest(DatasetKind::Coverage, "").unwrap_err();
    assert!(matches!(err, PipelineError::Parser(_)));
}
