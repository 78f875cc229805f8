// crates/tbviz-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Source parsing failed: {0}")]
    Parser(#[from] tbviz_parser::ParserError),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data processing error: {0}")]
    Processing(String),
}

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("failed to parse reference TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("country '{iso3}' has unknown WHO region '{region}'")]
    UnknownRegion { iso3: String, region: String },

    #[error("ISO3 code '{0}' is listed more than once")]
    DuplicateIso3(String),

    #[error("country name '{name}' maps to both {first} and {second}")]
    AmbiguousName {
        name: String,
        first: String,
        second: String,
    },

    #[error("developed allow-list names unknown ISO3 code '{0}'")]
    UnknownDeveloped(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
