use std::io::Write;
use std::path::Path;

use tbviz_parser::Indicator;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::types::NormalizedRecord;

pub const COVERAGE_EXPORT_HEADER: [&str; 7] = [
    "country",
    "iso3",
    "year",
    "stratum",
    "coverage_pct",
    "coverage_lo",
    "coverage_hi",
];

const COVERAGE_INDICATORS: [Indicator; 3] = [
    Indicator::CoveragePct,
    Indicator::CoverageLo,
    Indicator::CoverageHi,
];

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes the cleaned coverage table. The output parses back through the
/// coverage reader into the same records.
pub fn write_coverage_csv<W: Write>(records: &[NormalizedRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(COVERAGE_EXPORT_HEADER)?;

    for record in records {
        let mut row = vec![
            record.country.name.clone(),
            record.country.iso3.clone().unwrap_or_default(),
            record.year.to_string(),
            record.stratum.as_str().to_string(),
        ];
        row.extend(
            COVERAGE_INDICATORS
                .iter()
                .map(|indicator| format_value(record.value(*indicator))),
        );
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn coverage_csv_string(records: &[NormalizedRecord]) -> Result<String> {
    let mut buffer = Vec::new();
    write_coverage_csv(records, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|err| PipelineError::Processing(format!("export is not valid UTF-8: {err}")))
}

pub fn export_coverage_to_path(records: &[NormalizedRecord], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_coverage_csv(records, file)?;
    info!(path = %path.display(), rows = records.len(), "wrote coverage export");
    Ok(())
}
