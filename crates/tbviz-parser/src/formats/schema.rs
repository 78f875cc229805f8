use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::model::{CanonicalField, DatasetKind, Indicator, Stratum};

/// Cell contents that mean "no value" in WHO extracts.
pub const PLACEHOLDER_TOKENS: [&str; 10] = [
    "", "n/a", "na", "n.a.", "-", "..", "...", "nan", "null", "none",
];

const SHARED_ALIASES: &[(&str, CanonicalField)] = &[
    ("country", CanonicalField::Country),
    ("country_name", CanonicalField::Country),
    ("location", CanonicalField::Country),
    ("countries, territories and areas", CanonicalField::Country),
    ("geoareaname", CanonicalField::Country),
    ("entity", CanonicalField::Country),
    ("iso3", CanonicalField::Iso3),
    ("iso_code", CanonicalField::Iso3),
    ("iso3_code", CanonicalField::Iso3),
    ("country_code", CanonicalField::Iso3),
    ("spatialdimvaluecode", CanonicalField::Iso3),
    ("code", CanonicalField::Iso3),
    ("year", CanonicalField::Year),
    ("period", CanonicalField::Year),
    ("time", CanonicalField::Year),
    ("year_of_survey", CanonicalField::Year),
    ("stratum", CanonicalField::Stratum),
    ("case_type", CanonicalField::Stratum),
    ("dim1", CanonicalField::Stratum),
    ("patient_type", CanonicalField::Stratum),
    ("data_source", CanonicalField::Stratum),
    ("reported_at", CanonicalField::ReportedAt),
    ("date_updated", CanonicalField::ReportedAt),
    ("last_updated", CanonicalField::ReportedAt),
    ("datelastupdated", CanonicalField::ReportedAt),
    ("version_date", CanonicalField::ReportedAt),
    ("g_whoregion", CanonicalField::Region),
    ("who_region", CanonicalField::Region),
    ("region", CanonicalField::Region),
    ("parentlocationcode", CanonicalField::Region),
];

fn dataset_aliases(kind: DatasetKind) -> &'static [(&'static str, Indicator)] {
    use Indicator::*;
    match kind {
        DatasetKind::Burden => &[
            ("incidence_per_100k", IncidencePer100k),
            ("e_inc_100k", IncidencePer100k),
            ("e_inc_100k_lo", IncidenceLo),
            ("e_inc_100k_hi", IncidenceHi),
            ("e_mort_100k", MortalityPer100k),
        ],
        DatasetKind::Coverage => &[
            ("value", CoveragePct),
            ("factvaluenumeric", CoveragePct),
            ("value_lo", CoverageLo),
            ("factvaluenumericlow", CoverageLo),
            ("value_hi", CoverageHi),
            ("factvaluenumerichigh", CoverageHi),
        ],
        DatasetKind::RrTb => &[
            ("e_rr_pct", RrPct),
            ("e_rr_pct_lo", RrPctLo),
            ("e_rr_pct_hi", RrPctHi),
        ],
        DatasetKind::HivSurvey => &[
            ("hiv_positive_pct", HivPct),
            ("tbhiv_pct", HivPct),
            ("n_tested", SampleSize),
        ],
        DatasetKind::HivSentinel => &[
            ("hiv_positive_pct", HivPct),
            ("tbhiv_pct", HivPct),
            ("sites", SentinelSites),
        ],
    }
}

/// Wide-format headers that carry one stratum each; a row with several of them
/// becomes one record per stratum.
fn stratified_aliases(kind: DatasetKind) -> &'static [(&'static str, Indicator, StratumTag)] {
    use Indicator::*;
    match kind {
        DatasetKind::RrTb => &[
            ("e_rr_pct_new", RrPct, StratumTag::New),
            ("e_rr_pct_new_lo", RrPctLo, StratumTag::New),
            ("e_rr_pct_new_hi", RrPctHi, StratumTag::New),
            ("e_rr_pct_ret", RrPct, StratumTag::PreviouslyTreated),
            ("e_rr_pct_ret_lo", RrPctLo, StratumTag::PreviouslyTreated),
            ("e_rr_pct_ret_hi", RrPctHi, StratumTag::PreviouslyTreated),
        ],
        _ => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StratumTag {
    New,
    PreviouslyTreated,
}

impl From<StratumTag> for Stratum {
    fn from(tag: StratumTag) -> Self {
        match tag {
            StratumTag::New => Stratum::New,
            StratumTag::PreviouslyTreated => Stratum::PreviouslyTreated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRole {
    Field(CanonicalField),
    Stratified { indicator: Indicator, stratum: Stratum },
    Ignored,
}

impl ColumnRole {
    pub fn indicator(&self) -> Option<Indicator> {
        match self {
            ColumnRole::Field(CanonicalField::Indicator(indicator)) => Some(*indicator),
            ColumnRole::Stratified { indicator, .. } => Some(*indicator),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<CanonicalField> {
        match self {
            ColumnRole::Field(field) => Some(*field),
            ColumnRole::Stratified { indicator, .. } => Some(CanonicalField::Indicator(*indicator)),
            ColumnRole::Ignored => None,
        }
    }
}

/// Fixed lookup from raw header variants to canonical field names.
///
/// Matching is case-insensitive on trimmed headers. Canonical names are always
/// accepted so that exported tables re-ingest without extra aliases.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    shared: HashMap<String, CanonicalField>,
    per_kind: HashMap<DatasetKind, HashMap<String, ColumnRole>>,
}

static BUILTIN: Lazy<ColumnMap> = Lazy::new(|| {
    let mut map = ColumnMap::default();
    for (alias, field) in SHARED_ALIASES {
        map = map.with_shared_alias(alias, *field);
    }
    for kind in DatasetKind::ALL {
        for indicator in kind.indicators() {
            map = map.with_alias(kind, indicator.canonical_name(), *indicator);
        }
        for (alias, indicator) in dataset_aliases(kind) {
            map = map.with_alias(kind, alias, *indicator);
        }
        for (alias, indicator, tag) in stratified_aliases(kind) {
            map = map.with_stratified_alias(kind, alias, *indicator, (*tag).into());
        }
    }
    map
});

impl ColumnMap {
    pub fn builtin() -> &'static ColumnMap {
        &BUILTIN
    }

    pub fn with_shared_alias(mut self, alias: &str, field: CanonicalField) -> Self {
        self.shared.insert(normalize_header(alias), field);
        self
    }

    pub fn with_alias(mut self, kind: DatasetKind, alias: &str, indicator: Indicator) -> Self {
        self.per_kind
            .entry(kind)
            .or_default()
            .insert(
                normalize_header(alias),
                ColumnRole::Field(CanonicalField::Indicator(indicator)),
            );
        self
    }

    pub fn with_stratified_alias(
        mut self,
        kind: DatasetKind,
        alias: &str,
        indicator: Indicator,
        stratum: Stratum,
    ) -> Self {
        self.per_kind
            .entry(kind)
            .or_default()
            .insert(normalize_header(alias), ColumnRole::Stratified { indicator, stratum });
        self
    }

    pub fn classify(&self, kind: DatasetKind, header: &str) -> ColumnRole {
        let key = normalize_header(header);
        if let Some(role) = self.per_kind.get(&kind).and_then(|map| map.get(&key)) {
            return role.clone();
        }
        if let Some(field) = self.shared.get(&key) {
            return ColumnRole::Field(*field);
        }
        CanonicalField::KEYS
            .iter()
            .copied()
            .chain(kind.indicators().iter().map(|i| CanonicalField::Indicator(*i)))
            .find(|field| field.canonical_name() == key)
            .map(ColumnRole::Field)
            .unwrap_or(ColumnRole::Ignored)
    }
}

pub(crate) fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_ascii_lowercase()
}

pub(crate) fn is_placeholder(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    PLACEHOLDER_TOKENS.contains(&lower.as_str())
}
