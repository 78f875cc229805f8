use anyhow::{Context, Result};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use tbviz_core::pipelines::task_descriptors;
use tbviz_core::types::{RegionAggregate, WhoRegion};
use tbviz_core::PipelineOutput;
use tbviz_parser::parse_source_file;
use tracing::warn;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

pub fn render_sources(output: &PipelineOutput) -> String {
    let mut table = new_table(vec![
        "Dataset",
        "Raw rows",
        "Normalized",
        "Unmapped",
        "Missing columns",
        "Hash",
    ]);
    for source in &output.summary.sources {
        let missing = if source.missing_columns.is_empty() {
            "-".to_string()
        } else {
            source.missing_columns.join(", ")
        };
        table.add_row(vec![
            source.kind.to_string(),
            source.raw_records.to_string(),
            source.normalized_records.to_string(),
            source.unmapped_records.to_string(),
            missing,
            source.file_hash.chars().take(12).collect::<String>(),
        ]);
    }
    table.to_string()
}

pub fn render_tasks(output: &PipelineOutput) -> String {
    let mut table = new_table(vec!["Task", "Status", "Description"]);
    for descriptor in task_descriptors() {
        let status = if output.summary.tasks_run.contains(&descriptor.task) {
            Cell::new("ran").fg(Color::Green)
        } else {
            Cell::new("skipped").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(descriptor.code),
            status,
            Cell::new(descriptor.description),
        ]);
    }
    table.to_string()
}

/// One row per WHO region for the latest year of the regional trend. Regions
/// with no reporting country that year show `-`.
pub fn render_regions(trend: &[RegionAggregate]) -> String {
    let latest = trend.iter().map(|aggregate| aggregate.year).max();
    let header = match latest {
        Some(year) => format!("Mean {year}"),
        None => "Mean".to_string(),
    };
    let mut table = new_table(vec!["Code", "Region", "Countries", header.as_str(), "95% CI"]);
    for region in WhoRegion::ALL {
        let aggregate = trend
            .iter()
            .find(|a| a.region == region && Some(a.year) == latest);
        let (countries, mean, interval) = match aggregate {
            Some(a) => (
                a.countries.to_string(),
                format!("{:.1}", a.mean),
                format!("{:.1} - {:.1}", a.ci_low, a.ci_high),
            ),
            None => ("0".to_string(), "-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            region.code().to_string(),
            region.name().to_string(),
            countries,
            mean,
            interval,
        ]);
    }
    table.to_string()
}

pub fn render_diagnostics(output: &PipelineOutput) -> String {
    let mut table = new_table(vec!["Issue", "Count"]);
    if output.summary.diagnostics.is_empty() {
        table.add_row(vec!["none".to_string(), "0".to_string()]);
    }
    for (kind, count) in &output.summary.diagnostics {
        table.add_row(vec![kind.to_string(), count.to_string()]);
    }
    table.to_string()
}

/// Parses every file matching `pattern` with dataset detection.
pub fn inspect_files(pattern: &str) -> Result<String> {
    let mut table = new_table(vec!["File", "Dataset", "Rows", "Columns", "Dropped", "Missing"]);
    let paths = glob::glob(pattern).with_context(|| format!("invalid glob pattern '{pattern}'"))?;

    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "could not read path from glob pattern");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match parse_source_file(&content) {
            Ok(parsed) => {
                let missing: Vec<&str> = parsed
                    .missing_columns
                    .iter()
                    .map(|c| c.canonical_name())
                    .collect();
                table.add_row(vec![
                    Cell::new(path.display()),
                    Cell::new(parsed.kind),
                    Cell::new(parsed.len()),
                    Cell::new(parsed.headers.len()),
                    Cell::new(parsed.dropped_columns.join(", ")),
                    Cell::new(missing.join(", ")),
                ]);
            }
            Err(err) => {
                table.add_row(vec![
                    Cell::new(path.display()),
                    Cell::new(format!("error: {err}")).fg(Color::Red),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                ]);
            }
        }
    }
    Ok(table.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(region: WhoRegion, year: i32, mean: f64) -> RegionAggregate {
        RegionAggregate {
            region,
            year,
            countries: 2,
            mean,
            ci_low: mean - 1.0,
            ci_high: mean + 1.0,
        }
    }

    #[test]
    fn regions_table_lists_every_region_for_the_latest_year() {
        let trend = vec![
            aggregate(WhoRegion::Africa, 2022, 200.0),
            aggregate(WhoRegion::Africa, 2023, 180.0),
            aggregate(WhoRegion::Europe, 2022, 20.0),
        ];
        let rendered = render_regions(&trend);

        for region in WhoRegion::ALL {
            assert!(rendered.contains(region.name()), "missing {}", region.name());
        }
        assert!(rendered.contains("Mean 2023"));
        assert!(rendered.contains("180.0"));
        assert!(rendered.contains("179.0 - 181.0"));
        // Europe only reported in 2022
        assert!(!rendered.contains("20.0"));
    }
}
