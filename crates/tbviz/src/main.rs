use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tbviz_core::export::export_coverage_to_path;
use tbviz_core::frames::write_view_frames;
use tbviz_core::pipelines::PipelineViews;
use tbviz_core::{
    Diagnostics, Pipeline, PipelineConfig, PipelineInputs, PipelineOutput, PipelineSummary,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod tables;

const DEFAULT_CONFIG: &str = "tbviz.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "WHO tuberculosis data pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every dashboard task and print a summary
    Run(RunArgs),
    /// Write the cleaned treatment-coverage table as CSV
    ExportCoverage(ExportArgs),
    /// Detect the dataset of each matching file and report what was read
    Inspect {
        /// Glob pattern, e.g. "data/*.csv"
        pattern: String,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline config; falls back to TBVIZ_CONFIG, then ./tbviz.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Also write every view as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Also write every view as a Parquet file into this directory
    #[arg(long)]
    frames: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    out: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let output = run_pipeline(args.config)?;
            println!("{}", tables::render_sources(&output));
            println!("{}", tables::render_tasks(&output));
            println!(
                "{}",
                tables::render_regions(&output.views.incidence_trend.regional_trend)
            );
            println!("{}", tables::render_diagnostics(&output));
            println!("output fingerprint: {}", output.summary.output_fingerprint);

            if let Some(path) = args.json {
                write_json(&output, &path)?;
                info!(path = %path.display(), "wrote views as JSON");
            }
            if let Some(dir) = args.frames {
                let frames = output.frames().context("failed to build view frames")?;
                let written = write_view_frames(&frames, &dir)
                    .with_context(|| format!("failed to write frames to {}", dir.display()))?;
                println!("wrote {} frames to {}", written.len(), dir.display());
            }
            Ok(())
        }
        Command::ExportCoverage(args) => {
            let output = run_pipeline(args.config)?;
            if output.views.coverage.table.is_empty() {
                warn!("coverage table is empty; writing header only");
            }
            export_coverage_to_path(&output.views.coverage.table, &args.out)?;
            println!(
                "wrote {} coverage rows to {}",
                output.views.coverage.table.len(),
                args.out.display()
            );
            Ok(())
        }
        Command::Inspect { pattern } => {
            let rows = tables::inspect_files(&pattern)?;
            println!("{rows}");
            Ok(())
        }
    }
}

fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os("TBVIZ_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

fn run_pipeline(config: Option<PathBuf>) -> Result<PipelineOutput> {
    let path = resolve_config_path(config);
    let config = PipelineConfig::load(&path)?;
    let pipeline = Pipeline::from_config(&config)?;
    let inputs = PipelineInputs::from_config(&config)
        .with_context(|| format!("failed to read sources listed in {}", path.display()))?;
    let output = pipeline.run(&inputs).context("pipeline run failed")?;
    Ok(output)
}

#[derive(Serialize)]
struct JsonDump<'a> {
    summary: &'a PipelineSummary,
    views: &'a PipelineViews,
    diagnostics: &'a Diagnostics,
}

fn write_json(output: &PipelineOutput, path: &Path) -> Result<()> {
    let document = JsonDump {
        summary: &output.summary,
        views: &output.views,
        diagnostics: &output.diagnostics,
    };
    let text = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
