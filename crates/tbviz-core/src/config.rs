use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tbviz_parser::DatasetKind;

use crate::reference::ReferenceData;
use crate::views::YearSpan;

pub const DEFAULT_REDUCTION_START: i32 = 2015;
pub const DEFAULT_REDUCTION_END: i32 = 2023;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_HEATMAP_LOWEST_N: usize = 10;

/// Pipeline configuration file.
///
/// ```toml
/// reference = "reference.toml"
///
/// [sources]
/// burden = "data/TB_burden_countries.csv"
/// coverage = "data/tb_treatment_coverage.csv"
///
/// [views]
/// reduction_start = 2015
/// reduction_end = 2023
/// ```
///
/// Relative paths resolve against the directory holding the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub reference: Option<PathBuf>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub views: ViewsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    pub burden: Option<PathBuf>,
    pub coverage: Option<PathBuf>,
    pub rr_tb: Option<PathBuf>,
    pub hiv_survey: Option<PathBuf>,
    pub hiv_sentinel: Option<PathBuf>,
}

impl SourcesConfig {
    pub fn path_for(&self, kind: DatasetKind) -> Option<&Path> {
        match kind {
            DatasetKind::Burden => self.burden.as_deref(),
            DatasetKind::Coverage => self.coverage.as_deref(),
            DatasetKind::RrTb => self.rr_tb.as_deref(),
            DatasetKind::HivSurvey => self.hiv_survey.as_deref(),
            DatasetKind::HivSentinel => self.hiv_sentinel.as_deref(),
        }
    }

    fn paths_mut(&mut self) -> [&mut Option<PathBuf>; 5] {
        [
            &mut self.burden,
            &mut self.coverage,
            &mut self.rr_tb,
            &mut self.hiv_survey,
            &mut self.hiv_sentinel,
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewsConfig {
    #[serde(default = "default_reduction_start")]
    pub reduction_start: i32,
    #[serde(default = "default_reduction_end")]
    pub reduction_end: i32,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_heatmap_lowest_n")]
    pub heatmap_lowest_n: usize,
    /// Country whose coverage series is extracted; defaults to the first
    /// country in the coverage table.
    #[serde(default)]
    pub series_country: Option<String>,
}

fn default_reduction_start() -> i32 {
    DEFAULT_REDUCTION_START
}

fn default_reduction_end() -> i32 {
    DEFAULT_REDUCTION_END
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_heatmap_lowest_n() -> usize {
    DEFAULT_HEATMAP_LOWEST_N
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            reduction_start: DEFAULT_REDUCTION_START,
            reduction_end: DEFAULT_REDUCTION_END,
            top_n: DEFAULT_TOP_N,
            heatmap_lowest_n: DEFAULT_HEATMAP_LOWEST_N,
            series_country: None,
        }
    }
}

impl ViewsConfig {
    pub fn reduction_span(&self) -> YearSpan {
        YearSpan {
            start: self.reduction_start,
            end: self.reduction_end,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: PipelineConfig =
            toml::from_str(toml_str).context("failed to parse pipeline config")?;
        if config.views.reduction_start >= config.views.reduction_end {
            anyhow::bail!(
                "reduction_start ({}) must precede reduction_end ({})",
                config.views.reduction_start,
                config.views.reduction_end
            );
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config = Self::from_toml_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |slot: &mut Option<PathBuf>| {
            if let Some(path) = slot.take() {
                *slot = Some(if path.is_relative() { base.join(path) } else { path });
            }
        };
        resolve(&mut self.reference);
        for slot in self.sources.paths_mut() {
            resolve(slot);
        }
    }

    /// Built-in tables unless `reference` points at a replacement file.
    pub fn load_reference(&self) -> Result<ReferenceData> {
        match &self.reference {
            None => Ok(ReferenceData::builtin().clone()),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read reference tables {}", path.display()))?;
                ReferenceData::from_toml_str(&text)
                    .with_context(|| format!("invalid reference tables {}", path.display()))
            }
        }
    }
}
