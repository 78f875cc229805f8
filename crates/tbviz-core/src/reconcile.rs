use std::collections::{BTreeMap, HashMap};

use tbviz_parser::Stratum;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostics, Issue};
use crate::types::{MergeSide, MergedRecord, NormalizedRecord};

#[derive(Debug, Clone, Default)]
pub struct Reconciled<T> {
    pub records: Vec<T>,
    pub diagnostics: Diagnostics,
}

impl<T> Reconciled<T> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Keeps one record per (country, year, stratum).
///
/// The winner is the record with the latest `reported_at`; a record without a
/// timestamp loses to any record that has one. Remaining ties go to the record
/// that appears later in `records` (source file order). Output is sorted by
/// country id, year, stratum.
pub fn dedup_latest(records: &[NormalizedRecord]) -> Vec<NormalizedRecord> {
    let mut winners: HashMap<(&str, i32, &Stratum), usize> = HashMap::new();

    for (idx, record) in records.iter().enumerate() {
        let key = (record.country.id.as_str(), record.year, &record.stratum);
        winners
            .entry(key)
            .and_modify(|current| {
                if record.reported_at >= records[*current].reported_at {
                    *current = idx;
                }
            })
            .or_insert(idx);
    }

    let mut kept: Vec<NormalizedRecord> =
        winners.into_values().map(|idx| records[idx].clone()).collect();
    kept.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    if kept.len() != records.len() {
        debug!(
            input = records.len(),
            output = kept.len(),
            "dropped superseded duplicate measurements"
        );
    }
    kept
}

/// Inner join on (country, year). Each side is deduplicated first; one merged
/// record is emitted per pair of strata sharing a key.
pub fn merge_inner(left: &[NormalizedRecord], right: &[NormalizedRecord]) -> Reconciled<MergedRecord> {
    let left = dedup_latest(left);
    let right = dedup_latest(right);

    let mut right_index: BTreeMap<(&str, i32), Vec<&NormalizedRecord>> = BTreeMap::new();
    for record in &right {
        right_index
            .entry((record.country.id.as_str(), record.year))
            .or_default()
            .push(record);
    }

    let mut merged = Vec::new();
    for record in &left {
        let Some(matches) = right_index.get(&(record.country.id.as_str(), record.year)) else {
            continue;
        };
        for other in matches {
            merged.push(MergedRecord {
                country: record.country.clone(),
                year: record.year,
                region: record.region,
                development: record.development,
                left: MergeSide::from(record),
                right: MergeSide::from(*other),
            });
        }
    }

    let mut diagnostics = Diagnostics::default();
    if merged.is_empty() {
        warn!(
            left = left.len(),
            right = right.len(),
            "inner merge produced no rows"
        );
        diagnostics.push(Issue::EmptyJoin {
            operation: "merge_inner",
        });
    }

    Reconciled {
        records: merged,
        diagnostics,
    }
}

/// Union of several sources into one long table. Each source is deduplicated
/// on its own, so rows from different sources never replace each other.
pub fn union_long(sources: &[&[NormalizedRecord]]) -> Reconciled<NormalizedRecord> {
    let mut records: Vec<NormalizedRecord> = sources
        .iter()
        .flat_map(|source| dedup_latest(source))
        .collect();
    records.sort_by(|a, b| {
        a.sort_key()
            .cmp(&b.sort_key())
            .then_with(|| a.source.cmp(&b.source))
    });

    let mut diagnostics = Diagnostics::default();
    if records.is_empty() {
        warn!(sources = sources.len(), "union produced no rows");
        diagnostics.push(Issue::EmptyJoin {
            operation: "union_long",
        });
    }

    Reconciled {
        records,
        diagnostics,
    }
}
