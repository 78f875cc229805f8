// crates/tbviz-core/src/types.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tbviz_parser::{DatasetKind, Indicator, Stratum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WhoRegion {
    #[serde(rename = "AFR")]
    Africa,
    #[serde(rename = "AMR")]
    Americas,
    #[serde(rename = "SEA")]
    SouthEastAsia,
    #[serde(rename = "EUR")]
    Europe,
    #[serde(rename = "EMR")]
    EasternMediterranean,
    #[serde(rename = "WPR")]
    WesternPacific,
}

impl WhoRegion {
    pub const ALL: [WhoRegion; 6] = [
        WhoRegion::Africa,
        WhoRegion::Americas,
        WhoRegion::SouthEastAsia,
        WhoRegion::Europe,
        WhoRegion::EasternMediterranean,
        WhoRegion::WesternPacific,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            WhoRegion::Africa => "AFR",
            WhoRegion::Americas => "AMR",
            WhoRegion::SouthEastAsia => "SEA",
            WhoRegion::Europe => "EUR",
            WhoRegion::EasternMediterranean => "EMR",
            WhoRegion::WesternPacific => "WPR",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WhoRegion::Africa => "African Region",
            WhoRegion::Americas => "Region of the Americas",
            WhoRegion::SouthEastAsia => "South-East Asia Region",
            WhoRegion::Europe => "European Region",
            WhoRegion::EasternMediterranean => "Eastern Mediterranean Region",
            WhoRegion::WesternPacific => "Western Pacific Region",
        }
    }
}

impl fmt::Display for WhoRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for WhoRegion {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AFR" | "AFRO" => Ok(WhoRegion::Africa),
            "AMR" | "AMRO" | "PAHO" => Ok(WhoRegion::Americas),
            "SEA" | "SEAR" | "SEARO" => Ok(WhoRegion::SouthEastAsia),
            "EUR" | "EURO" => Ok(WhoRegion::Europe),
            "EMR" | "EMRO" => Ok(WhoRegion::EasternMediterranean),
            "WPR" | "WPRO" => Ok(WhoRegion::WesternPacific),
            other => Err(format!("unknown WHO region '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Development {
    Developed,
    Developing,
}

impl Development {
    pub fn as_str(&self) -> &'static str {
        match self {
            Development::Developed => "developed",
            Development::Developing => "developing",
        }
    }
}

/// Canonical country identity. `id` is the ISO3 code when the country resolved
/// against the reference table and the cleaned source name otherwise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CountryKey {
    pub name: String,
    pub id: String,
    pub iso3: Option<String>,
}

impl fmt::Display for CountryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Indicator values of one record. A key mapped to `None` means the column was
/// present but held no usable number.
pub type IndicatorValues = BTreeMap<Indicator, Option<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub source: DatasetKind,
    pub source_line: usize,
    pub country: CountryKey,
    pub year: i32,
    pub region: Option<WhoRegion>,
    pub development: Development,
    pub stratum: Stratum,
    pub reported_at: Option<NaiveDateTime>,
    pub values: IndicatorValues,
}

impl NormalizedRecord {
    pub fn value(&self, indicator: Indicator) -> Option<f64> {
        self.values.get(&indicator).copied().flatten()
    }

    /// Ordering key: country id, then year, then stratum. The id is also the
    /// identity every reconcile and view step groups on.
    pub fn sort_key(&self) -> (&str, i32, &Stratum) {
        (&self.country.id, self.year, &self.stratum)
    }
}

/// Fields contributed by one side of a merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeSide {
    pub source: DatasetKind,
    pub stratum: Stratum,
    pub reported_at: Option<NaiveDateTime>,
    pub values: IndicatorValues,
}

impl MergeSide {
    pub fn value(&self, indicator: Indicator) -> Option<f64> {
        self.values.get(&indicator).copied().flatten()
    }
}

impl From<&NormalizedRecord> for MergeSide {
    fn from(record: &NormalizedRecord) -> Self {
        Self {
            source: record.source,
            stratum: record.stratum.clone(),
            reported_at: record.reported_at,
            values: record.values.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    pub country: CountryKey,
    pub year: i32,
    pub region: Option<WhoRegion>,
    pub development: Development,
    pub left: MergeSide,
    pub right: MergeSide,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionAggregate {
    pub region: WhoRegion,
    pub year: i32,
    pub countries: usize,
    pub mean: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReductionMetric {
    pub country: CountryKey,
    pub value_start: Option<f64>,
    pub value_end: Option<f64>,
    pub percent_reduction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub country: CountryKey,
    pub region: Option<WhoRegion>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapRow {
    pub country: CountryKey,
    pub development: Development,
    /// One cell per year of the owning matrix.
    pub values: Vec<Option<f64>>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct HeatmapMatrix {
    pub years: Vec<i32>,
    pub developed: Vec<HeatmapRow>,
    pub developing: Vec<HeatmapRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub value: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryValue {
    pub country: CountryKey,
    pub region: Option<WhoRegion>,
    pub value: f64,
}

/// Five-number summary backing a boxplot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionDistribution {
    pub region: WhoRegion,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}
