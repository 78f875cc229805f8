use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use polars::prelude::DataFrame;
use serde::Serialize;
use tbviz_parser::{parse_dataset_with, ColumnMap, DatasetKind, Indicator, Stratum};
use tracing::{debug, info, warn};

use crate::config::{PipelineConfig, ViewsConfig};
use crate::diagnostics::{Diagnostics, Issue, IssueKind};
use crate::error::Result;
use crate::frames;
use crate::normalize::{normalize, NormalizedTable};
use crate::reconcile::{dedup_latest, merge_inner, union_long};
use crate::reference::ReferenceData;
use crate::types::{
    CountryKey, CountryValue, HeatmapMatrix, MergedRecord, NormalizedRecord, RankedEntry,
    ReductionMetric, RegionAggregate, RegionDistribution, SeriesPoint,
};
use crate::views::{self, TopNQuery, YearSpan};

pub const PIPELINE_CODE: &str = "who_tb_dashboard";
pub const PIPELINE_VERSION: &str = "0.1.0";

/// One dashboard task and the datasets it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    IncidenceTrend,
    IncidenceReduction,
    TreatmentCoverage,
    IncidenceVsResistance,
    HivSurveillance,
}

#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub task: Task,
    pub code: &'static str,
    pub inputs: &'static [DatasetKind],
    pub description: &'static str,
}

impl TaskDescriptor {
    /// True when every input dataset is available.
    pub fn is_runnable(&self, available: impl Fn(DatasetKind) -> bool) -> bool {
        self.inputs.iter().all(|kind| available(*kind))
    }
}

#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    pub code: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub tasks: &'static [TaskDescriptor],
}

static TASKS: [TaskDescriptor; 5] = [
    TaskDescriptor {
        task: Task::IncidenceTrend,
        code: "incidence_trend",
        inputs: &[DatasetKind::Burden],
        description: "Regional incidence trend with 95% CI, incidence map, country list",
    },
    TaskDescriptor {
        task: Task::IncidenceReduction,
        code: "incidence_reduction",
        inputs: &[DatasetKind::Burden],
        description: "Per-country incidence change over the configured span",
    },
    TaskDescriptor {
        task: Task::TreatmentCoverage,
        code: "treatment_coverage",
        inputs: &[DatasetKind::Coverage],
        description: "Coverage table, country series, top-N ranking, flat-file export",
    },
    TaskDescriptor {
        task: Task::IncidenceVsResistance,
        code: "incidence_vs_rr_tb",
        inputs: &[DatasetKind::Burden, DatasetKind::RrTb],
        description: "Incidence x RR-TB inner merge and regional RR-TB distribution",
    },
    TaskDescriptor {
        task: Task::HivSurveillance,
        code: "hiv_surveillance",
        inputs: &[DatasetKind::HivSurvey, DatasetKind::HivSentinel],
        description: "Survey and sentinel HIV union with developed/developing heatmap",
    },
];

static PIPELINES: Lazy<Vec<PipelineDescriptor>> = Lazy::new(|| {
    vec![PipelineDescriptor {
        code: PIPELINE_CODE,
        version: PIPELINE_VERSION,
        description: "Ingest, normalize and reconcile WHO TB extracts into dashboard views",
        tasks: &TASKS,
    }]
});

pub fn all_pipeline_descriptors() -> &'static [PipelineDescriptor] {
    PIPELINES.as_slice()
}

pub fn task_descriptors() -> &'static [TaskDescriptor] {
    &TASKS
}

/// Raw file contents keyed by dataset. Datasets without content skip the
/// tasks that need them.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    sources: BTreeMap<DatasetKind, String>,
}

impl PipelineInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, kind: DatasetKind, content: impl Into<String>) -> Self {
        self.sources.insert(kind, content.into());
        self
    }

    pub fn insert(&mut self, kind: DatasetKind, content: impl Into<String>) {
        self.sources.insert(kind, content.into());
    }

    pub fn contains(&self, kind: DatasetKind) -> bool {
        self.sources.contains_key(&kind)
    }

    pub fn get(&self, kind: DatasetKind) -> Option<&str> {
        self.sources.get(&kind).map(String::as_str)
    }

    /// Reads every configured source. Unconfigured or absent files are skipped
    /// with a warning; any other read failure is an error.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut inputs = Self::new();
        for kind in DatasetKind::ALL {
            let Some(path) = config.sources.path_for(kind) else {
                debug!(dataset = %kind, "no source configured");
                continue;
            };
            match read_source(path)? {
                Some(content) => inputs.insert(kind, content),
                None => warn!(dataset = %kind, path = %path.display(), "source file not found"),
            }
        }
        Ok(inputs)
    }
}

fn read_source(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncidenceTrendView {
    pub regional_trend: Vec<RegionAggregate>,
    pub map_year: Option<i32>,
    pub map: Vec<CountryValue>,
    pub countries: Vec<CountryKey>,
    pub year_bounds: Option<(i32, i32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReductionView {
    pub span: YearSpan,
    pub metrics: Vec<ReductionMetric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageView {
    /// Deduplicated coverage table; this is what gets exported.
    pub table: Vec<NormalizedRecord>,
    pub series_country: Option<CountryKey>,
    pub series: Vec<SeriesPoint>,
    pub ranking_year: Option<i32>,
    pub top_n: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResistanceView {
    pub merged: Vec<MergedRecord>,
    pub distribution_year: Option<i32>,
    pub distribution: Vec<RegionDistribution>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HivView {
    pub records: Vec<NormalizedRecord>,
    pub heatmap: HeatmapMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineViews {
    pub incidence_trend: IncidenceTrendView,
    pub reduction: ReductionView,
    pub coverage: CoverageView,
    pub resistance: ResistanceView,
    pub hiv: HivView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub kind: DatasetKind,
    pub file_hash: String,
    pub raw_records: usize,
    pub normalized_records: usize,
    pub unmapped_records: usize,
    pub missing_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub pipeline: &'static str,
    pub version: &'static str,
    pub sources: Vec<SourceSummary>,
    pub tasks_run: Vec<Task>,
    pub tasks_skipped: Vec<Task>,
    pub diagnostics: BTreeMap<IssueKind, usize>,
    /// blake3 of the serialized views; equal inputs give equal fingerprints.
    pub output_fingerprint: String,
}

/// One ingested source: its normalized table, the issues found on the way and
/// the counts reported in the run summary.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub table: NormalizedTable,
    pub diagnostics: Diagnostics,
    pub summary: SourceSummary,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub tables: BTreeMap<DatasetKind, NormalizedTable>,
    pub views: PipelineViews,
    pub diagnostics: Diagnostics,
    pub summary: PipelineSummary,
}

impl PipelineOutput {
    /// Columnar form of every view for the rendering layer.
    pub fn frames(&self) -> Result<BTreeMap<&'static str, DataFrame>> {
        frames::view_frames(&self.views)
    }
}

pub struct Pipeline {
    reference: ReferenceData,
    columns: ColumnMap,
    views: ViewsConfig,
}

impl Pipeline {
    pub fn new(reference: ReferenceData, views: ViewsConfig) -> Self {
        Self {
            reference,
            columns: ColumnMap::builtin().clone(),
            views,
        }
    }

    pub fn with_columns(mut self, columns: ColumnMap) -> Self {
        self.columns = columns;
        self
    }

    pub fn from_config(config: &PipelineConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.load_reference()?, config.views.clone()))
    }

    /// Parses and normalizes one source. Fails only when the content cannot be
    /// read as a table.
    pub fn ingest(&self, kind: DatasetKind, content: &str) -> Result<SourceOutcome> {
        let raw = parse_dataset_with(kind, content, &self.columns)?;
        let outcome = normalize(&raw, &self.reference);
        let summary = SourceSummary {
            kind,
            file_hash: raw.file_hash.clone(),
            raw_records: raw.len(),
            normalized_records: outcome.table.len(),
            unmapped_records: outcome.table.unmapped_records(),
            missing_columns: raw
                .missing_columns
                .iter()
                .map(|c| c.canonical_name().to_string())
                .collect(),
        };
        Ok(SourceOutcome {
            table: outcome.table,
            diagnostics: outcome.diagnostics,
            summary,
        })
    }

    /// Runs every task whose datasets are available. A source that cannot be
    /// parsed is recorded as `UnreadableSource` and counts as absent.
    pub fn run(&self, inputs: &PipelineInputs) -> Result<PipelineOutput> {
        let mut diagnostics = Diagnostics::default();
        let mut tables = BTreeMap::new();
        let mut sources = Vec::new();

        for kind in DatasetKind::ALL {
            let Some(content) = inputs.get(kind) else {
                continue;
            };
            let outcome = match self.ingest(kind, content) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(dataset = %kind, error = %err, "source unreadable; treating dataset as absent");
                    diagnostics.push(Issue::UnreadableSource {
                        dataset: kind,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            sources.push(outcome.summary);
            diagnostics.extend(outcome.diagnostics);
            tables.insert(kind, outcome.table);
        }

        let mut tasks_run = Vec::new();
        let mut tasks_skipped = Vec::new();
        for descriptor in task_descriptors() {
            if descriptor.is_runnable(|kind| tables.contains_key(&kind)) {
                tasks_run.push(descriptor.task);
            } else {
                warn!(task = descriptor.code, "skipping task: input dataset missing");
                tasks_skipped.push(descriptor.task);
            }
        }

        let empty_burden = NormalizedTable::empty(DatasetKind::Burden);
        let burden = tables.get(&DatasetKind::Burden).unwrap_or(&empty_burden);
        let burden_latest = dedup_latest(&burden.records);

        let incidence_trend = if tasks_run.contains(&Task::IncidenceTrend) {
            self.incidence_trend(&burden_latest)
        } else {
            IncidenceTrendView::default()
        };

        let span = self.views.reduction_span();
        let reduction = ReductionView {
            span,
            metrics: if tasks_run.contains(&Task::IncidenceReduction) {
                let metrics = views::reduction(&burden_latest, Indicator::IncidencePer100k, span);
                diagnostics.extend(views::undefined_reductions(&metrics));
                metrics
            } else {
                Vec::new()
            },
        };

        let coverage = match tables.get(&DatasetKind::Coverage) {
            Some(table) if tasks_run.contains(&Task::TreatmentCoverage) => self.coverage(table),
            _ => CoverageView::default(),
        };

        let resistance = match tables.get(&DatasetKind::RrTb) {
            Some(rr) if tasks_run.contains(&Task::IncidenceVsResistance) => {
                let merged = merge_inner(&burden.records, &rr.records);
                diagnostics.extend(merged.diagnostics);
                resistance_view(merged.records)
            }
            _ => ResistanceView::default(),
        };

        let hiv = match (
            tables.get(&DatasetKind::HivSurvey),
            tables.get(&DatasetKind::HivSentinel),
        ) {
            (Some(survey), Some(sentinel)) if tasks_run.contains(&Task::HivSurveillance) => {
                let union = union_long(&[survey.records.as_slice(), sentinel.records.as_slice()]);
                diagnostics.extend(union.diagnostics);
                diagnostics.extend(views::overlapping_sources(
                    &union.records,
                    Indicator::HivPct,
                    "hiv_heatmap",
                ));
                let heatmap = views::dual_group_heatmap(
                    &union.records,
                    Indicator::HivPct,
                    &[],
                    self.views.heatmap_lowest_n,
                );
                HivView {
                    records: union.records,
                    heatmap,
                }
            }
            _ => HivView::default(),
        };

        let views = PipelineViews {
            incidence_trend,
            reduction,
            coverage,
            resistance,
            hiv,
        };
        let output_fingerprint = blake3::hash(&serde_json::to_vec(&views)?)
            .to_hex()
            .to_string();

        let summary = PipelineSummary {
            pipeline: PIPELINE_CODE,
            version: PIPELINE_VERSION,
            sources,
            tasks_run,
            tasks_skipped,
            diagnostics: diagnostics.totals(),
            output_fingerprint,
        };

        info!(
            pipeline = PIPELINE_CODE,
            sources = summary.sources.len(),
            tasks = summary.tasks_run.len(),
            issues = diagnostics.issues.len(),
            fingerprint = %summary.output_fingerprint,
            "pipeline run complete"
        );

        Ok(PipelineOutput {
            tables,
            views,
            diagnostics,
            summary,
        })
    }

    fn incidence_trend(&self, burden: &[NormalizedRecord]) -> IncidenceTrendView {
        let scoped = burden.iter().filter(|r| r.region.is_some());
        let year_bounds = views::year_bounds(burden);
        let map_year = year_bounds.map(|(_, latest)| latest);
        IncidenceTrendView {
            regional_trend: views::regional_trend(scoped, Indicator::IncidencePer100k),
            map_year,
            map: map_year
                .map(|year| views::choropleth(burden, Indicator::IncidencePer100k, year))
                .unwrap_or_default(),
            countries: views::country_list(burden),
            year_bounds,
        }
    }

    fn coverage(&self, table: &NormalizedTable) -> CoverageView {
        let records = dedup_latest(&table.records);
        let countries = views::country_list(&records);
        let series_country = match &self.views.series_country {
            Some(wanted) => find_country(&countries, wanted),
            None => countries.first().cloned(),
        };
        let series = series_country
            .as_ref()
            .map(|country| views::country_series(&records, &country.id, Indicator::CoveragePct))
            .unwrap_or_default();

        let ranking_year = views::year_bounds(&records).map(|(_, latest)| latest);
        let top_n = ranking_year
            .map(|year| {
                views::top_n(
                    &records,
                    Indicator::CoveragePct,
                    TopNQuery {
                        year,
                        n: self.views.top_n,
                        region: None,
                    },
                )
            })
            .unwrap_or_default();

        CoverageView {
            table: records,
            series_country,
            series,
            ranking_year,
            top_n,
        }
    }
}

fn find_country(countries: &[CountryKey], wanted: &str) -> Option<CountryKey> {
    let wanted = wanted.trim();
    let found = countries.iter().find(|c| {
        c.id.eq_ignore_ascii_case(wanted) || c.name.eq_ignore_ascii_case(wanted)
    });
    if found.is_none() {
        warn!(country = wanted, "series country not present in coverage table");
    }
    found.cloned()
}

/// RR-TB boxplots use the latest merged year and the headline strata (new
/// cases, or all cases where the source is not stratified).
fn resistance_view(merged: Vec<MergedRecord>) -> ResistanceView {
    let distribution_year = merged.iter().map(|r| r.year).max();
    let distribution = views::region_distribution(
        merged
            .iter()
            .filter(|r| Some(r.year) == distribution_year)
            .filter(|r| matches!(r.right.stratum, Stratum::New | Stratum::All))
            .filter_map(|r| Some((r.region?, r.right.value(Indicator::RrPct)?))),
    );
    ResistanceView {
        merged,
        distribution_year,
        distribution,
    }
}
