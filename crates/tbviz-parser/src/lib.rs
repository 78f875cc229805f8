pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::{ParserAttempt, ParserError};
pub use formats::{ColumnMap, ColumnRole};
pub use model::{CanonicalField, DatasetKind, Indicator, RawRecord, RawTable, Stratum};
pub use registry::{
    all_parsers, detect_kind, parse_dataset, parse_dataset_with, parse_source_file,
    parse_with_parsers, parser_for, SourceParser,
};

#[cfg(test)]
mod tests;
