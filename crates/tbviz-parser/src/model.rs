use std::fmt;

use serde::{Deserialize, Serialize};

/// The five WHO extracts the dashboard is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Burden,
    Coverage,
    RrTb,
    HivSurvey,
    HivSentinel,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 5] = [
        DatasetKind::Burden,
        DatasetKind::Coverage,
        DatasetKind::RrTb,
        DatasetKind::HivSurvey,
        DatasetKind::HivSentinel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Burden => "burden",
            DatasetKind::Coverage => "coverage",
            DatasetKind::RrTb => "rr_tb",
            DatasetKind::HivSurvey => "hiv_survey",
            DatasetKind::HivSentinel => "hiv_sentinel",
        }
    }

    /// Indicator columns a file of this kind may carry.
    pub fn indicators(&self) -> &'static [Indicator] {
        use Indicator::*;
        match self {
            DatasetKind::Burden => &[
                IncidencePer100k,
                IncidenceLo,
                IncidenceHi,
                MortalityPer100k,
            ],
            DatasetKind::Coverage => &[CoveragePct, CoverageLo, CoverageHi],
            DatasetKind::RrTb => &[RrPct, RrPctLo, RrPctHi],
            DatasetKind::HivSurvey => &[HivPct, SampleSize],
            DatasetKind::HivSentinel => &[HivPct, SentinelSites],
        }
    }

    pub fn primary_indicator(&self) -> Indicator {
        match self {
            DatasetKind::Burden => Indicator::IncidencePer100k,
            DatasetKind::Coverage => Indicator::CoveragePct,
            DatasetKind::RrTb => Indicator::RrPct,
            DatasetKind::HivSurvey | DatasetKind::HivSentinel => Indicator::HivPct,
        }
    }

    /// Columns whose presence identifies the dataset during auto-detection.
    pub fn signature(&self) -> &'static [Indicator] {
        use Indicator::*;
        match self {
            DatasetKind::Burden => &[IncidencePer100k],
            DatasetKind::Coverage => &[CoveragePct],
            DatasetKind::RrTb => &[RrPct],
            DatasetKind::HivSurvey => &[HivPct, SampleSize],
            DatasetKind::HivSentinel => &[HivPct, SentinelSites],
        }
    }

    /// Stratum assigned to rows that do not carry one.
    pub fn default_stratum(&self) -> Stratum {
        match self {
            DatasetKind::HivSurvey => Stratum::Survey,
            DatasetKind::HivSentinel => Stratum::Sentinel,
            _ => Stratum::All,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DatasetKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "burden" | "tb_burden" => Ok(DatasetKind::Burden),
            "coverage" | "treatment_coverage" => Ok(DatasetKind::Coverage),
            "rr_tb" | "rrtb" | "rr-tb" => Ok(DatasetKind::RrTb),
            "hiv_survey" | "survey" => Ok(DatasetKind::HivSurvey),
            "hiv_sentinel" | "sentinel" => Ok(DatasetKind::HivSentinel),
            other => Err(format!("unknown dataset kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Indicator {
    IncidencePer100k,
    IncidenceLo,
    IncidenceHi,
    MortalityPer100k,
    CoveragePct,
    CoverageLo,
    CoverageHi,
    RrPct,
    RrPctLo,
    RrPctHi,
    HivPct,
    SampleSize,
    SentinelSites,
}

impl Indicator {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Indicator::IncidencePer100k => "e_inc_100k",
            Indicator::IncidenceLo => "e_inc_100k_lo",
            Indicator::IncidenceHi => "e_inc_100k_hi",
            Indicator::MortalityPer100k => "e_mort_100k",
            Indicator::CoveragePct => "coverage_pct",
            Indicator::CoverageLo => "coverage_lo",
            Indicator::CoverageHi => "coverage_hi",
            Indicator::RrPct => "rr_pct",
            Indicator::RrPctLo => "rr_pct_lo",
            Indicator::RrPctHi => "rr_pct_hi",
            Indicator::HivPct => "hiv_pct",
            Indicator::SampleSize => "sample_size",
            Indicator::SentinelSites => "sentinel_sites",
        }
    }

    /// Lower/upper uncertainty bounds published alongside this indicator, if any.
    pub fn bounds(&self) -> Option<(Indicator, Indicator)> {
        match self {
            Indicator::IncidencePer100k => Some((Indicator::IncidenceLo, Indicator::IncidenceHi)),
            Indicator::CoveragePct => Some((Indicator::CoverageLo, Indicator::CoverageHi)),
            Indicator::RrPct => Some((Indicator::RrPctLo, Indicator::RrPctHi)),
            _ => None,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Case-type or surveillance stratum a measurement belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stratum {
    All,
    New,
    PreviouslyTreated,
    Survey,
    Sentinel,
    Other(String),
}

impl Stratum {
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_ascii_lowercase();
        match lower.as_str() {
            "" | "all" | "total" => Stratum::All,
            "new" | "new cases" | "new_cases" => Stratum::New,
            "previously treated" | "previously_treated" | "retreatment" | "ret" => {
                Stratum::PreviouslyTreated
            }
            "survey" | "surveys" => Stratum::Survey,
            "sentinel" | "sentinel surveillance" => Stratum::Sentinel,
            _ => Stratum::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Stratum::All => "all",
            Stratum::New => "new",
            Stratum::PreviouslyTreated => "previously treated",
            Stratum::Survey => "survey",
            Stratum::Sentinel => "sentinel",
            Stratum::Other(label) => label.as_str(),
        }
    }
}

impl fmt::Display for Stratum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical field a raw header resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    Country,
    Iso3,
    Year,
    Stratum,
    ReportedAt,
    /// WHO region code as published by the source, e.g. `g_whoregion`.
    Region,
    Indicator(Indicator),
}

impl CanonicalField {
    pub const KEYS: [CanonicalField; 6] = [
        CanonicalField::Country,
        CanonicalField::Iso3,
        CanonicalField::Year,
        CanonicalField::Stratum,
        CanonicalField::ReportedAt,
        CanonicalField::Region,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            CanonicalField::Country => "country",
            CanonicalField::Iso3 => "iso3",
            CanonicalField::Year => "year",
            CanonicalField::Stratum => "stratum",
            CanonicalField::ReportedAt => "reported_at",
            CanonicalField::Region => "who_region",
            CanonicalField::Indicator(indicator) => indicator.canonical_name(),
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// One source row. Cells holding placeholder tokens are already `None`; nothing
/// has been coerced to a number yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line in the source file.
    pub line: usize,
    pub country: Option<String>,
    pub iso3: Option<String>,
    pub year: Option<String>,
    pub stratum: Option<String>,
    pub reported_at: Option<String>,
    pub region: Option<String>,
    pub values: Vec<(Indicator, Option<String>)>,
}

impl RawRecord {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            country: None,
            iso3: None,
            year: None,
            stratum: None,
            reported_at: None,
            region: None,
            values: Vec::new(),
        }
    }

    pub fn value(&self, indicator: Indicator) -> Option<&str> {
        self.values
            .iter()
            .find(|(candidate, _)| *candidate == indicator)
            .and_then(|(_, value)| value.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct RawTable {
    pub kind: DatasetKind,
    pub file_hash: String,
    pub headers: Vec<String>,
    /// Headers that matched no canonical field (or duplicated one already seen).
    pub dropped_columns: Vec<String>,
    /// Required fields that no header provided.
    pub missing_columns: Vec<CanonicalField>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, field: CanonicalField) -> bool {
        !self.missing_columns.contains(&field)
    }
}
