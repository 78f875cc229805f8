use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tbviz_parser::{DatasetKind, RawRecord, RawTable, Stratum};
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostics, Issue};
use crate::reference::ReferenceData;
use crate::types::{IndicatorValues, NormalizedRecord, WhoRegion};

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub kind: DatasetKind,
    pub file_hash: String,
    pub records: Vec<NormalizedRecord>,
}

impl NormalizedTable {
    pub fn empty(kind: DatasetKind) -> Self {
        Self {
            kind,
            file_hash: String::new(),
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records eligible for region-level views. Differs from `records` exactly
    /// by the records whose country has no WHO region.
    pub fn region_scoped(&self) -> Vec<&NormalizedRecord> {
        self.records.iter().filter(|r| r.region.is_some()).collect()
    }

    pub fn unmapped_records(&self) -> usize {
        self.records.iter().filter(|r| r.region.is_none()).count()
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub table: NormalizedTable,
    pub diagnostics: Diagnostics,
}

/// Cleans one raw table: resolves countries, coerces years and values, drops
/// rows without a usable (country, year) key.
pub fn normalize(raw: &RawTable, reference: &ReferenceData) -> NormalizeOutcome {
    let mut diagnostics = Diagnostics::default();
    for column in &raw.missing_columns {
        warn!(dataset = %raw.kind, column = %column, "required column missing from source");
        diagnostics.push(Issue::MissingColumn {
            dataset: raw.kind,
            column: column.canonical_name().to_string(),
        });
    }

    let mut records = Vec::with_capacity(raw.records.len());
    let mut unmapped: BTreeSet<String> = BTreeSet::new();

    for row in &raw.records {
        if let Some(record) = normalize_record(raw.kind, row, reference, &mut diagnostics) {
            if record.region.is_none() {
                unmapped.insert(record.country.name.clone());
            }
            records.push(record);
        }
    }

    for country in unmapped {
        warn!(dataset = %raw.kind, country = %country, "country has no WHO region mapping");
        diagnostics.push(Issue::UnmappedCountry {
            dataset: raw.kind,
            country,
        });
    }

    debug!(
        dataset = %raw.kind,
        input = raw.records.len(),
        output = records.len(),
        "normalized source table"
    );

    NormalizeOutcome {
        table: NormalizedTable {
            kind: raw.kind,
            file_hash: raw.file_hash.clone(),
            records,
        },
        diagnostics,
    }
}

fn normalize_record(
    kind: DatasetKind,
    row: &RawRecord,
    reference: &ReferenceData,
    diagnostics: &mut Diagnostics,
) -> Option<NormalizedRecord> {
    let Some(mut resolution) = reference.resolve(row.iso3.as_deref(), row.country.as_deref())
    else {
        diagnostics.push(Issue::InvalidKey {
            dataset: kind,
            line: row.line,
            reason: "missing country".to_string(),
        });
        return None;
    };

    // The reference table wins; the source's own region code only fills gaps.
    match (resolution.region, reported_region(kind, row, diagnostics)) {
        (None, Some(region)) => resolution.region = Some(region),
        (Some(table), Some(source)) if table != source => debug!(
            dataset = %kind,
            line = row.line,
            country = %resolution.key,
            table = %table,
            source = %source,
            "source WHO region disagrees with reference table"
        ),
        _ => {}
    }

    let year = match row.year.as_deref() {
        None => {
            diagnostics.push(Issue::InvalidKey {
                dataset: kind,
                line: row.line,
                reason: "missing year".to_string(),
            });
            return None;
        }
        Some(raw_year) => match parse_year(raw_year) {
            Some(year) => year,
            None => {
                diagnostics.push(Issue::InvalidKey {
                    dataset: kind,
                    line: row.line,
                    reason: format!("invalid year '{raw_year}'"),
                });
                return None;
            }
        },
    };

    let reported_at = row.reported_at.as_deref().and_then(|raw_ts| {
        let parsed = parse_timestamp(raw_ts);
        if parsed.is_none() {
            diagnostics.push(Issue::UnparseableValue {
                dataset: kind,
                line: row.line,
                field: "reported_at".to_string(),
                raw: raw_ts.to_string(),
            });
        }
        parsed
    });

    let mut values = IndicatorValues::new();
    for (indicator, raw_value) in &row.values {
        let parsed = raw_value.as_deref().and_then(|text| {
            let parsed = parse_numeric(text);
            if parsed.is_none() {
                diagnostics.push(Issue::UnparseableValue {
                    dataset: kind,
                    line: row.line,
                    field: indicator.canonical_name().to_string(),
                    raw: text.to_string(),
                });
            }
            parsed
        });
        values.insert(*indicator, parsed);
    }

    let stratum = row
        .stratum
        .as_deref()
        .map(Stratum::from_label)
        .unwrap_or_else(|| kind.default_stratum());

    Some(NormalizedRecord {
        source: kind,
        source_line: row.line,
        country: resolution.key,
        year,
        region: resolution.region,
        development: resolution.development,
        stratum,
        reported_at,
        values,
    })
}

fn reported_region(
    kind: DatasetKind,
    row: &RawRecord,
    diagnostics: &mut Diagnostics,
) -> Option<WhoRegion> {
    let raw = row.region.as_deref()?;
    match WhoRegion::try_from(raw) {
        Ok(region) => Some(region),
        Err(_) => {
            diagnostics.push(Issue::UnparseableValue {
                dataset: kind,
                line: row.line,
                field: "who_region".to_string(),
                raw: raw.to_string(),
            });
            None
        }
    }
}

/// Parses a numeric cell. Thousands separators and a trailing `%` are
/// accepted; anything else that is not a finite float is `None`.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return None;
    }

    let digits = if compact.contains(',') {
        strip_thousands(&compact)?
    } else {
        compact
    };

    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn strip_thousands(value: &str) -> Option<String> {
    let (int_part, frac_part) = match value.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (value, None),
    };
    let unsigned = int_part.trim_start_matches(['-', '+']);
    let mut groups = unsigned.split(',');
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 {
        return None;
    }
    if !groups.all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let mut cleaned = int_part.replace(',', "");
    if let Some(frac) = frac_part {
        cleaned.push('.');
        cleaned.push_str(frac);
    }
    Some(cleaned)
}

pub fn parse_year(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    let year = match trimmed.parse::<i32>() {
        Ok(year) => year,
        Err(_) => {
            let float = trimmed.parse::<f64>().ok()?;
            if float.fract() != 0.0 || !float.is_finite() {
                return None;
            }
            float as i32
        }
    };
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    static DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];
    static DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}
