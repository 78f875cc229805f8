use csv::StringRecord;

use crate::errors::ParserError;
use crate::model::{CanonicalField, DatasetKind, Indicator, RawRecord, RawTable, Stratum};

use super::schema::{is_placeholder, ColumnMap, ColumnRole};

pub(crate) fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

pub(crate) fn read_header(parser: &'static str, content: &str) -> Result<StringRecord, ParserError> {
    let mut reader = csv_reader(content);
    reader
        .records()
        .next()
        .ok_or(ParserError::MissingHeader { parser })?
        .map_err(|err| ParserError::Csv {
            parser,
            source: err,
        })
}

/// Resolves each header to its role. A field (and stratum) claimed by an
/// earlier header makes later duplicates `Ignored`.
pub(crate) fn classify_columns(
    kind: DatasetKind,
    header: &StringRecord,
    columns: &ColumnMap,
) -> Vec<ColumnRole> {
    let mut seen: Vec<ColumnRole> = Vec::new();
    header
        .iter()
        .map(|name| {
            let role = columns.classify(kind, name);
            if role == ColumnRole::Ignored || seen.contains(&role) {
                return ColumnRole::Ignored;
            }
            seen.push(role.clone());
            role
        })
        .collect()
}

fn provides(roles: &[ColumnRole], field: CanonicalField) -> bool {
    roles.iter().any(|role| role.field() == Some(field))
}

pub(crate) fn check_signature(
    parser: &'static str,
    kind: DatasetKind,
    roles: &[ColumnRole],
) -> Result<(), ParserError> {
    for indicator in kind.signature() {
        if !roles.iter().any(|role| role.indicator() == Some(*indicator)) {
            return Err(ParserError::FormatMismatch {
                parser,
                reason: format!("missing signature column '{}'", indicator.canonical_name()),
            });
        }
    }
    Ok(())
}

fn missing_required(kind: DatasetKind, roles: &[ColumnRole]) -> Vec<CanonicalField> {
    let mut missing = Vec::new();
    if !provides(roles, CanonicalField::Country) && !provides(roles, CanonicalField::Iso3) {
        missing.push(CanonicalField::Country);
    }
    if !provides(roles, CanonicalField::Year) {
        missing.push(CanonicalField::Year);
    }
    let primary = CanonicalField::Indicator(kind.primary_indicator());
    if !provides(roles, primary) {
        missing.push(primary);
    }
    missing
}

/// Trims a cell and turns placeholder tokens into `None`.
pub(crate) fn clean_cell(value: &str) -> Option<String> {
    let trimmed = value.trim_start_matches('\u{feff}').trim();
    if is_placeholder(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Shared reading loop: every dataset is a headed CSV whose columns are mapped
/// through the lookup table. Short rows yield partial records; a row with
/// stratified (wide) columns yields one record per stratum.
pub(crate) fn read_table(
    parser: &'static str,
    kind: DatasetKind,
    content: &str,
    columns: &ColumnMap,
) -> Result<RawTable, ParserError> {
    let mut reader = csv_reader(content);
    let mut records = reader.records();

    let header = records
        .next()
        .ok_or(ParserError::MissingHeader { parser })?
        .map_err(|err| ParserError::Csv {
            parser,
            source: err,
        })?;

    let roles = classify_columns(kind, &header, columns);
    let headers: Vec<String> = header
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let dropped_columns = headers
        .iter()
        .zip(roles.iter())
        .filter(|(_, role)| **role == ColumnRole::Ignored)
        .map(|(name, _)| name.clone())
        .collect();
    let missing_columns = missing_required(kind, &roles);

    let mut rows = Vec::new();
    for (row_idx, record) in records.enumerate() {
        let record = record.map_err(|err| ParserError::Csv {
            parser,
            source: err,
        })?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(row_idx + 2); // header occupies line 1

        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut base = RawRecord::new(line);
        let mut stratified: Vec<(Stratum, Vec<(Indicator, Option<String>)>)> = Vec::new();

        for (idx, role) in roles.iter().enumerate() {
            let value = record.get(idx).and_then(clean_cell);
            match role {
                ColumnRole::Ignored => {}
                ColumnRole::Field(field) => match field {
                    CanonicalField::Country => base.country = value,
                    CanonicalField::Iso3 => base.iso3 = value,
                    CanonicalField::Year => base.year = value,
                    CanonicalField::Stratum => base.stratum = value,
                    CanonicalField::ReportedAt => base.reported_at = value,
                    CanonicalField::Region => base.region = value,
                    CanonicalField::Indicator(indicator) => base.values.push((*indicator, value)),
                },
                ColumnRole::Stratified { indicator, stratum } => {
                    match stratified.iter_mut().find(|(s, _)| s == stratum) {
                        Some((_, values)) => values.push((*indicator, value)),
                        None => stratified.push((stratum.clone(), vec![(*indicator, value)])),
                    }
                }
            }
        }

        if stratified.is_empty() || !base.values.is_empty() {
            rows.push(base.clone());
        }
        for (stratum, values) in stratified {
            let mut expanded = base.clone();
            expanded.stratum = Some(stratum.as_str().to_string());
            expanded.values = values;
            rows.push(expanded);
        }
    }

    Ok(RawTable {
        kind,
        file_hash: content_hash(content),
        headers,
        dropped_columns,
        missing_columns,
        records: rows,
    })
}

fn csv_reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes())
}
