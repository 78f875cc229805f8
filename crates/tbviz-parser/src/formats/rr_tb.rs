use crate::errors::ParserError;
use crate::model::{DatasetKind, RawTable};
use crate::registry::SourceParser;

use super::{read_table, ColumnMap};

/// Rifampicin-resistant TB estimates. Accepts both the long layout (one
/// `case_type` column) and the wide WHO layout (`e_rr_pct_new`,
/// `e_rr_pct_ret`), which is expanded into one record per case type.
pub struct RrTbParser;

impl Default for RrTbParser {
    fn default() -> Self {
        Self
    }
}

impl RrTbParser {
    const NAME: &'static str = "RR_TB";
}

impl SourceParser for RrTbParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn kind(&self) -> DatasetKind {
        DatasetKind::RrTb
    }

    fn parse(&self, content: &str, columns: &ColumnMap) -> Result<RawTable, ParserError> {
        read_table(Self::NAME, DatasetKind::RrTb, content, columns)
    }
}
