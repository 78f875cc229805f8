//! Per-task summary tables handed to the rendering layer.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tbviz_parser::{DatasetKind, Indicator};
use tracing::debug;

use crate::diagnostics::{Diagnostics, Issue};
use crate::types::{
    CountryKey, CountryValue, Development, HeatmapMatrix, HeatmapRow, NormalizedRecord,
    RankedEntry, ReductionMetric, RegionAggregate, RegionDistribution, SeriesPoint, WhoRegion,
};

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSpan {
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopNQuery {
    pub year: i32,
    pub n: usize,
    pub region: Option<WhoRegion>,
}

/// Latest value per (country id, year). Callers pass a single stratum; if a
/// country still appears twice in a year the later record wins.
fn values_by_country_year<'a, I>(
    records: I,
    indicator: Indicator,
) -> BTreeMap<(&'a str, i32), (&'a NormalizedRecord, f64)>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut values = BTreeMap::new();
    for record in records {
        if let Some(value) = record.value(indicator) {
            values.insert((record.country.id.as_str(), record.year), (record, value));
        }
    }
    values
}

fn by_name_then_id(a: &CountryKey, b: &CountryKey) -> Ordering {
    a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
}

/// Mean and 95% confidence interval of `indicator` per (region, year).
/// Records without a WHO region are skipped. With fewer than two reporting
/// countries the interval collapses onto the mean.
pub fn regional_trend<'a, I>(records: I, indicator: Indicator) -> Vec<RegionAggregate>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut groups: BTreeMap<(WhoRegion, i32), Vec<f64>> = BTreeMap::new();
    for ((_, year), (record, value)) in values_by_country_year(records, indicator) {
        if let Some(region) = record.region {
            groups.entry((region, year)).or_default().push(value);
        }
    }

    groups
        .into_iter()
        .map(|((region, year), values)| {
            let n = values.len();
            let mean = values.iter().sum::<f64>() / n as f64;
            let half_width = if n < 2 {
                0.0
            } else {
                let variance =
                    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
                Z_95 * variance.sqrt() / (n as f64).sqrt()
            };
            RegionAggregate {
                region,
                year,
                countries: n,
                mean,
                ci_low: mean - half_width,
                ci_high: mean + half_width,
            }
        })
        .collect()
}

/// `(end - start) / start * 100` per country. The percentage is absent when
/// either end is missing or the start value is zero. Countries are matched by
/// id, so a renamed country still pairs its two years; the row carries the
/// name of the last record seen.
pub fn reduction<'a, I>(records: I, indicator: Indicator, span: YearSpan) -> Vec<ReductionMetric>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut per_country: BTreeMap<&str, (&CountryKey, Option<f64>, Option<f64>)> =
        BTreeMap::new();
    for record in records {
        if record.year != span.start && record.year != span.end {
            continue;
        }
        let entry = per_country
            .entry(record.country.id.as_str())
            .or_insert((&record.country, None, None));
        entry.0 = &record.country;
        let value = record.value(indicator);
        if record.year == span.start {
            entry.1 = value.or(entry.1);
        }
        if record.year == span.end {
            entry.2 = value.or(entry.2);
        }
    }

    let mut metrics: Vec<ReductionMetric> = per_country
        .into_values()
        .map(|(country, start, end)| ReductionMetric {
            country: country.clone(),
            value_start: start,
            value_end: end,
            percent_reduction: percent_change(start, end),
        })
        .collect();
    metrics.sort_by(|a, b| by_name_then_id(&a.country, &b.country));
    metrics
}

pub fn percent_change(start: Option<f64>, end: Option<f64>) -> Option<f64> {
    let (start, end) = (start?, end?);
    if start == 0.0 {
        return None;
    }
    let pct = (end - start) / start * 100.0;
    pct.is_finite().then_some(pct)
}

/// One `UndefinedMetric` issue per reduction row without a percentage.
pub fn undefined_reductions(metrics: &[ReductionMetric]) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    for metric in metrics.iter().filter(|m| m.percent_reduction.is_none()) {
        let reason = match (metric.value_start, metric.value_end) {
            (None, _) => "start value absent",
            (Some(start), _) if start == 0.0 => "start value is zero",
            (_, None) => "end value absent",
            _ => "result not finite",
        };
        diagnostics.push(Issue::UndefinedMetric {
            view: "reduction",
            country: metric.country.name.clone(),
            reason: reason.to_string(),
        });
    }
    diagnostics
}

fn descending_then_name(a: (&CountryKey, f64), b: (&CountryKey, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.name.cmp(&b.0.name))
}

/// Highest `n` values for one year, ties broken by country name. Returns
/// fewer than `n` entries when fewer countries qualify.
pub fn top_n<'a, I>(records: I, indicator: Indicator, query: TopNQuery) -> Vec<RankedEntry>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let filtered = records.into_iter().filter(|record| {
        record.year == query.year && query.region.map_or(true, |region| record.region == Some(region))
    });
    let mut candidates: Vec<(&NormalizedRecord, f64)> = values_by_country_year(filtered, indicator)
        .into_values()
        .collect();
    candidates.sort_by(|a, b| descending_then_name((&a.0.country, a.1), (&b.0.country, b.1)));

    candidates
        .into_iter()
        .take(query.n)
        .enumerate()
        .map(|(idx, (record, value))| RankedEntry {
            rank: idx + 1,
            country: record.country.clone(),
            region: record.region,
            value,
        })
        .collect()
}

/// Developed countries next to the `lowest_n` developing countries. Each row
/// is scored by the mean of its values over `years`; both groups are sorted
/// ascending by score. Passing no years uses every year present.
///
/// Each cell holds one value. When records from several sources share a
/// country-year the later record wins; [`overlapping_sources`] reports those
/// cells.
pub fn dual_group_heatmap<'a, I>(
    records: I,
    indicator: Indicator,
    years: &[i32],
    lowest_n: usize,
) -> HeatmapMatrix
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let values = values_by_country_year(records, indicator);
    let years: Vec<i32> = if years.is_empty() {
        values
            .keys()
            .map(|(_, year)| *year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        let mut requested = years.to_vec();
        requested.sort_unstable();
        requested.dedup();
        requested
    };

    // Keyed by id; the latest year's record supplies the name and group.
    let mut countries: BTreeMap<&str, (&CountryKey, Development)> = BTreeMap::new();
    for ((id, _), (record, _)) in &values {
        countries.insert(*id, (&record.country, record.development));
    }

    let mut developed = Vec::new();
    let mut developing = Vec::new();
    for (id, (country, development)) in countries {
        let cells: Vec<Option<f64>> = years
            .iter()
            .map(|year| values.get(&(id, *year)).map(|(_, value)| *value))
            .collect();
        let present: Vec<f64> = cells.iter().flatten().copied().collect();
        if present.is_empty() {
            continue;
        }
        let score = present.iter().sum::<f64>() / present.len() as f64;
        let row = HeatmapRow {
            country: country.clone(),
            development,
            values: cells,
            score,
        };
        match development {
            Development::Developed => developed.push(row),
            Development::Developing => developing.push(row),
        }
    }

    let ascending = |a: &HeatmapRow, b: &HeatmapRow| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a.country.name.cmp(&b.country.name))
    };
    developed.sort_by(ascending);
    developing.sort_by(ascending);
    developing.truncate(lowest_n);

    HeatmapMatrix {
        years,
        developed,
        developing,
    }
}

/// One country's values over time with the published uncertainty bounds.
pub fn country_series<'a, I>(records: I, country_id: &str, indicator: Indicator) -> Vec<SeriesPoint>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let bounds = indicator.bounds();
    let mut points: BTreeMap<i32, SeriesPoint> = BTreeMap::new();
    for record in records {
        if record.country.id != country_id {
            continue;
        }
        points.insert(
            record.year,
            SeriesPoint {
                year: record.year,
                value: record.value(indicator),
                lower: bounds.and_then(|(lo, _)| record.value(lo)),
                upper: bounds.and_then(|(_, hi)| record.value(hi)),
            },
        );
    }
    points.into_values().collect()
}

/// Country-level values for one year, for the map. Countries without a WHO
/// region are included.
pub fn choropleth<'a, I>(records: I, indicator: Indicator, year: i32) -> Vec<CountryValue>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let filtered = records.into_iter().filter(|record| record.year == year);
    values_by_country_year(filtered, indicator)
        .into_values()
        .map(|(record, value)| CountryValue {
            country: record.country.clone(),
            region: record.region,
            value,
        })
        .collect()
}

/// Five-number summary per region. Quartiles interpolate linearly between
/// order statistics.
pub fn region_distribution<I>(points: I) -> Vec<RegionDistribution>
where
    I: IntoIterator<Item = (WhoRegion, f64)>,
{
    let mut groups: BTreeMap<WhoRegion, Vec<f64>> = BTreeMap::new();
    for (region, value) in points {
        if value.is_finite() {
            groups.entry(region).or_default().push(value);
        }
    }

    groups
        .into_iter()
        .filter_map(|(region, mut values)| {
            values.sort_by(f64::total_cmp);
            Some(RegionDistribution {
                region,
                count: values.len(),
                min: *values.first()?,
                q1: quantile(&values, 0.25)?,
                median: quantile(&values, 0.5)?,
                q3: quantile(&values, 0.75)?,
                max: *values.last()?,
            })
        })
        .collect()
}

/// Linear-interpolation quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn year_bounds<'a, I>(records: I) -> Option<(i32, i32)>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    records.into_iter().fold(None, |bounds, record| match bounds {
        None => Some((record.year, record.year)),
        Some((lo, hi)) => Some((lo.min(record.year), hi.max(record.year))),
    })
}

/// Distinct countries by id, sorted by name. A country listed under two
/// spellings appears once, under the last spelling seen.
pub fn country_list<'a, I>(records: I) -> Vec<CountryKey>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut by_id: BTreeMap<&str, &CountryKey> = BTreeMap::new();
    for record in records {
        by_id.insert(record.country.id.as_str(), &record.country);
    }
    let mut countries: Vec<CountryKey> = by_id.into_values().cloned().collect();
    countries.sort_by(by_name_then_id);
    countries
}

/// Country-years where more than one source reported `indicator`. Used for
/// views that show one value per cell, such as the HIV heatmap over the
/// survey and sentinel union. The later record in input order is the one kept.
pub fn overlapping_sources<'a, I>(
    records: I,
    indicator: Indicator,
    view: &'static str,
) -> Diagnostics
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let mut cells: BTreeMap<(&str, i32), (BTreeSet<DatasetKind>, &NormalizedRecord)> =
        BTreeMap::new();
    for record in records {
        if record.value(indicator).is_none() {
            continue;
        }
        let entry = cells
            .entry((record.country.id.as_str(), record.year))
            .or_insert_with(|| (BTreeSet::new(), record));
        entry.0.insert(record.source);
        entry.1 = record;
    }

    let mut diagnostics = Diagnostics::default();
    for ((_, year), (sources, kept)) in cells {
        if sources.len() < 2 {
            continue;
        }
        debug!(
            view,
            country = %kept.country,
            year,
            kept = %kept.source,
            "several sources report one cell; keeping the later record"
        );
        diagnostics.push(Issue::OverlappingSources {
            view,
            country: kept.country.name.clone(),
            year,
            kept: kept.source,
        });
    }
    diagnostics
}
