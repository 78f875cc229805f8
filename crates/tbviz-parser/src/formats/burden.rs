use crate::errors::ParserError;
use crate::model::{DatasetKind, RawTable};
use crate::registry::SourceParser;

use super::{read_table, ColumnMap};

/// WHO TB burden estimates (`TB_burden_countries` style extracts).
pub struct BurdenParser;

impl Default for BurdenParser {
    fn default() -> Self {
        Self
    }
}

impl BurdenParser {
    const NAME: &'static str = "TB_BURDEN";
}

impl SourceParser for BurdenParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn kind(&self) -> DatasetKind {
        DatasetKind::Burden
    }

    fn parse(&self, content: &str, columns: &ColumnMap) -> Result<RawTable, ParserError> {
        read_table(Self::NAME, DatasetKind::Burden, content, columns)
    }
}
