//! Columnar views of the pipeline tables for the rendering layer.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::{Column, DataFrame, NamedFrom, PolarsResult, Series};
use tbviz_parser::Indicator;
use tracing::info;

use crate::error::Result;
use crate::pipelines::PipelineViews;
use crate::types::{
    CountryKey, CountryValue, HeatmapMatrix, IndicatorValues, MergeSide, MergedRecord,
    NormalizedRecord, RankedEntry, ReductionMetric, RegionAggregate, RegionDistribution,
    SeriesPoint,
};

pub const COUNTRY_COL: &str = "country";
pub const ISO3_COL: &str = "iso3";
pub const YEAR_COL: &str = "year";
pub const REGION_COL: &str = "who_region";
pub const DEVELOPMENT_COL: &str = "development";
pub const STRATUM_COL: &str = "stratum";
pub const SOURCE_COL: &str = "source";

fn country_columns(countries: &[&CountryKey]) -> Vec<Column> {
    vec![
        Series::new(
            COUNTRY_COL.into(),
            countries.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            ISO3_COL.into(),
            countries.iter().map(|c| c.iso3.as_deref()).collect::<Vec<_>>(),
        )
        .into(),
    ]
}

fn indicators_present<'a>(
    values: impl Iterator<Item = &'a IndicatorValues>,
) -> BTreeSet<Indicator> {
    values.flat_map(|v| v.keys().copied()).collect()
}

/// One row per record; one float column per indicator seen in any record.
pub fn normalized_frame(records: &[NormalizedRecord]) -> PolarsResult<DataFrame> {
    let countries: Vec<&CountryKey> = records.iter().map(|r| &r.country).collect();
    let mut columns = country_columns(&countries);
    columns.push(Series::new(YEAR_COL.into(), records.iter().map(|r| r.year).collect::<Vec<_>>()).into());
    columns.push(
        Series::new(
            REGION_COL.into(),
            records.iter().map(|r| r.region.map(|g| g.code())).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            DEVELOPMENT_COL.into(),
            records.iter().map(|r| r.development.as_str()).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            STRATUM_COL.into(),
            records.iter().map(|r| r.stratum.as_str()).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(
        Series::new(
            SOURCE_COL.into(),
            records.iter().map(|r| r.source.as_str()).collect::<Vec<_>>(),
        )
        .into(),
    );

    for indicator in indicators_present(records.iter().map(|r| &r.values)) {
        let values: Vec<Option<f64>> = records.iter().map(|r| r.value(indicator)).collect();
        columns.push(Series::new(indicator.canonical_name().into(), values).into());
    }

    DataFrame::new(columns)
}

fn side_columns(
    records: &[MergedRecord],
    prefix: &str,
    side: fn(&MergedRecord) -> &MergeSide,
    taken: &BTreeSet<Indicator>,
) -> (Vec<Column>, BTreeSet<Indicator>) {
    let mut columns: Vec<Column> = vec![Series::new(
        format!("{prefix}_{STRATUM_COL}").into(),
        records.iter().map(|r| side(r).stratum.as_str()).collect::<Vec<_>>(),
    )
    .into()];
    let indicators = indicators_present(records.iter().map(|r| &side(r).values));
    for indicator in &indicators {
        let values: Vec<Option<f64>> = records.iter().map(|r| side(r).value(*indicator)).collect();
        let name = if taken.contains(indicator) {
            format!("{}_{prefix}", indicator.canonical_name())
        } else {
            indicator.canonical_name().to_string()
        };
        columns.push(Series::new(name.into(), values).into());
    }
    (columns, indicators)
}

/// Joined table. Indicator columns keep their canonical names; an indicator
/// carried by both sides gets a `_right` suffix on the right-hand column.
pub fn merged_frame(records: &[MergedRecord]) -> PolarsResult<DataFrame> {
    let countries: Vec<&CountryKey> = records.iter().map(|r| &r.country).collect();
    let mut columns = country_columns(&countries);
    columns.push(Series::new(YEAR_COL.into(), records.iter().map(|r| r.year).collect::<Vec<_>>()).into());
    columns.push(
        Series::new(
            REGION_COL.into(),
            records.iter().map(|r| r.region.map(|g| g.code())).collect::<Vec<_>>(),
        )
        .into(),
    );
    let (left, taken) = side_columns(records, "left", |r| &r.left, &BTreeSet::new());
    let (right, _) = side_columns(records, "right", |r| &r.right, &taken);
    columns.extend(left);
    columns.extend(right);
    DataFrame::new(columns)
}

pub fn regional_trend_frame(rows: &[RegionAggregate]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(REGION_COL.into(), rows.iter().map(|r| r.region.code()).collect::<Vec<_>>()).into(),
        Series::new(YEAR_COL.into(), rows.iter().map(|r| r.year).collect::<Vec<_>>()).into(),
        Series::new("countries".into(), rows.iter().map(|r| r.countries as u64).collect::<Vec<_>>()).into(),
        Series::new("mean".into(), rows.iter().map(|r| r.mean).collect::<Vec<_>>()).into(),
        Series::new("ci_low".into(), rows.iter().map(|r| r.ci_low).collect::<Vec<_>>()).into(),
        Series::new("ci_high".into(), rows.iter().map(|r| r.ci_high).collect::<Vec<_>>()).into(),
    ])
}

pub fn reduction_frame(rows: &[ReductionMetric]) -> PolarsResult<DataFrame> {
    let countries: Vec<&CountryKey> = rows.iter().map(|r| &r.country).collect();
    let mut columns = country_columns(&countries);
    columns.push(Series::new("value_start".into(), rows.iter().map(|r| r.value_start).collect::<Vec<_>>()).into());
    columns.push(Series::new("value_end".into(), rows.iter().map(|r| r.value_end).collect::<Vec<_>>()).into());
    columns.push(
        Series::new(
            "percent_reduction".into(),
            rows.iter().map(|r| r.percent_reduction).collect::<Vec<_>>(),
        )
        .into(),
    );
    DataFrame::new(columns)
}

pub fn ranked_frame(rows: &[RankedEntry]) -> PolarsResult<DataFrame> {
    let countries: Vec<&CountryKey> = rows.iter().map(|r| &r.country).collect();
    let mut columns: Vec<Column> =
        vec![Series::new("rank".into(), rows.iter().map(|r| r.rank as u64).collect::<Vec<_>>()).into()];
    columns.extend(country_columns(&countries));
    columns.push(
        Series::new(
            REGION_COL.into(),
            rows.iter().map(|r| r.region.map(|g| g.code())).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(Series::new("value".into(), rows.iter().map(|r| r.value).collect::<Vec<_>>()).into());
    DataFrame::new(columns)
}

/// Long form of the heatmap: developed rows first, then developing, one
/// column per matrix year.
pub fn heatmap_frame(matrix: &HeatmapMatrix) -> PolarsResult<DataFrame> {
    let rows: Vec<_> = matrix.developed.iter().chain(&matrix.developing).collect();
    let countries: Vec<&CountryKey> = rows.iter().map(|r| &r.country).collect();
    let mut columns = country_columns(&countries);
    columns.push(
        Series::new(
            DEVELOPMENT_COL.into(),
            rows.iter().map(|r| r.development.as_str()).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(Series::new("score".into(), rows.iter().map(|r| r.score).collect::<Vec<_>>()).into());
    for (idx, year) in matrix.years.iter().enumerate() {
        let values: Vec<Option<f64>> = rows
            .iter()
            .map(|r| r.values.get(idx).copied().flatten())
            .collect();
        columns.push(Series::new(year.to_string().into(), values).into());
    }
    DataFrame::new(columns)
}

pub fn country_values_frame(rows: &[CountryValue]) -> PolarsResult<DataFrame> {
    let countries: Vec<&CountryKey> = rows.iter().map(|r| &r.country).collect();
    let mut columns = country_columns(&countries);
    columns.push(
        Series::new(
            REGION_COL.into(),
            rows.iter().map(|r| r.region.map(|g| g.code())).collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.push(Series::new("value".into(), rows.iter().map(|r| r.value).collect::<Vec<_>>()).into());
    DataFrame::new(columns)
}

pub fn series_frame(points: &[SeriesPoint]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(YEAR_COL.into(), points.iter().map(|p| p.year).collect::<Vec<_>>()).into(),
        Series::new("value".into(), points.iter().map(|p| p.value).collect::<Vec<_>>()).into(),
        Series::new("lower".into(), points.iter().map(|p| p.lower).collect::<Vec<_>>()).into(),
        Series::new("upper".into(), points.iter().map(|p| p.upper).collect::<Vec<_>>()).into(),
    ])
}

pub fn distribution_frame(rows: &[RegionDistribution]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(REGION_COL.into(), rows.iter().map(|r| r.region.code()).collect::<Vec<_>>()).into(),
        Series::new("count".into(), rows.iter().map(|r| r.count as u64).collect::<Vec<_>>()).into(),
        Series::new("min".into(), rows.iter().map(|r| r.min).collect::<Vec<_>>()).into(),
        Series::new("q1".into(), rows.iter().map(|r| r.q1).collect::<Vec<_>>()).into(),
        Series::new("median".into(), rows.iter().map(|r| r.median).collect::<Vec<_>>()).into(),
        Series::new("q3".into(), rows.iter().map(|r| r.q3).collect::<Vec<_>>()).into(),
        Series::new("max".into(), rows.iter().map(|r| r.max).collect::<Vec<_>>()).into(),
    ])
}

/// Every view of a run as a named frame, keyed by the file stem it is written
/// under.
pub fn view_frames(views: &PipelineViews) -> Result<BTreeMap<&'static str, DataFrame>> {
    let mut frames = BTreeMap::new();
    frames.insert(
        "incidence_trend",
        regional_trend_frame(&views.incidence_trend.regional_trend)?,
    );
    frames.insert(
        "incidence_map",
        country_values_frame(&views.incidence_trend.map)?,
    );
    frames.insert("incidence_reduction", reduction_frame(&views.reduction.metrics)?);
    frames.insert("coverage", normalized_frame(&views.coverage.table)?);
    frames.insert("coverage_series", series_frame(&views.coverage.series)?);
    frames.insert("coverage_top_n", ranked_frame(&views.coverage.top_n)?);
    frames.insert("incidence_rr_tb", merged_frame(&views.resistance.merged)?);
    frames.insert(
        "rr_tb_distribution",
        distribution_frame(&views.resistance.distribution)?,
    );
    frames.insert("hiv", normalized_frame(&views.hiv.records)?);
    frames.insert("hiv_heatmap", heatmap_frame(&views.hiv.heatmap)?);
    Ok(frames)
}

pub fn write_parquet(df: &DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut clone = df.clone();
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .with_statistics(StatisticsOptions::default())
        .finish(&mut clone)?;
    Ok(())
}

/// Writes one `<name>.parquet` per frame into `dir`, creating it if needed.
pub fn write_view_frames(
    frames: &BTreeMap<&'static str, DataFrame>,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(frames.len());
    for (name, df) in frames {
        let path = dir.join(format!("{name}.parquet"));
        write_parquet(df, &path)?;
        info!(frame = *name, rows = df.height(), path = %path.display(), "wrote view frame");
        written.push(path);
    }
    Ok(written)
}
