mod burden;
mod common;
mod coverage;
mod hiv;
mod rr_tb;
pub(crate) mod schema;

pub use burden::BurdenParser;
pub use coverage::CoverageParser;
pub use hiv::{HivSentinelParser, HivSurveyParser};
pub use rr_tb::RrTbParser;
pub use schema::{ColumnMap, ColumnRole, PLACEHOLDER_TOKENS};

pub(crate) use common::{check_signature, classify_columns, read_header, read_table};
#[cfg(test)]
pub(crate) use common::clean_cell;
#[cfg(test)]
pub(crate) use coverage::split_bracketed;
