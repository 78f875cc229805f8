use crate::errors::ParserError;
use crate::model::{DatasetKind, Indicator, RawRecord, RawTable};
use crate::registry::SourceParser;

use super::{read_table, ColumnMap};

/// TB treatment coverage (GHO export: `YEAR`, `COUNTRY`, `VALUE`, `VALUE_LO`,
/// `VALUE_HI`).
pub struct CoverageParser;

impl Default for CoverageParser {
    fn default() -> Self {
        Self
    }
}

impl CoverageParser {
    const NAME: &'static str = "TREATMENT_COVERAGE";

    /// GHO "display value" cells look like `85 [72-98]`. Splits them into the
    /// point estimate and, where the dedicated columns are empty, the bounds.
    fn expand_display_value(record: &mut RawRecord) {
        let Some(display) = record.value(Indicator::CoveragePct).map(str::to_string) else {
            return;
        };
        let Some((value, lo, hi)) = split_bracketed(&display) else {
            return;
        };

        set_value(record, Indicator::CoveragePct, Some(value), true);
        set_value(record, Indicator::CoverageLo, Some(lo), false);
        set_value(record, Indicator::CoverageHi, Some(hi), false);
    }
}

fn set_value(record: &mut RawRecord, indicator: Indicator, value: Option<String>, overwrite: bool) {
    match record.values.iter_mut().find(|(i, _)| *i == indicator) {
        Some((_, existing)) => {
            if overwrite || existing.is_none() {
                *existing = value;
            }
        }
        None => record.values.push((indicator, value)),
    }
}

pub(crate) fn split_bracketed(cell: &str) -> Option<(String, String, String)> {
    let open = cell.find('[')?;
    let close = cell.rfind(']')?;
    if close < open {
        return None;
    }
    let value = cell[..open].trim();
    let inner = cell[open + 1..close].trim();
    // skip the first char so a leading minus sign is not taken as the separator
    let split_at = inner.char_indices().skip(1).find(|(_, c)| *c == '-')?.0;
    let lo = inner[..split_at].trim();
    let hi = inner[split_at + 1..].trim();
    if value.is_empty() || lo.is_empty() || hi.is_empty() {
        return None;
    }
    Some((value.to_string(), lo.to_string(), hi.to_string()))
}

impl SourceParser for CoverageParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn kind(&self) -> DatasetKind {
        DatasetKind::Coverage
    }

    fn parse(&self, content: &str, columns: &ColumnMap) -> Result<RawTable, ParserError> {
        let mut table = read_table(Self::NAME, DatasetKind::Coverage, content, columns)?;
        for record in &mut table.records {
            Self::expand_display_value(record);
        }
        Ok(table)
    }
}
