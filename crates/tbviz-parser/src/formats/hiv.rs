use crate::errors::ParserError;
use crate::model::{DatasetKind, RawTable};
use crate::registry::SourceParser;

use super::{read_table, ColumnMap};

/// Population-representative HIV testing among TB patients.
pub struct HivSurveyParser;

/// Site-based (sentinel) HIV surveillance among TB patients.
pub struct HivSentinelParser;

impl Default for HivSurveyParser {
    fn default() -> Self {
        Self
    }
}

impl Default for HivSentinelParser {
    fn default() -> Self {
        Self
    }
}

impl HivSurveyParser {
    const NAME: &'static str = "HIV_SURVEY";
}

impl HivSentinelParser {
    const NAME: &'static str = "HIV_SENTINEL";
}

impl SourceParser for HivSurveyParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn kind(&self) -> DatasetKind {
        DatasetKind::HivSurvey
    }

    fn parse(&self, content: &str, columns: &ColumnMap) -> Result<RawTable, ParserError> {
        read_table(Self::NAME, DatasetKind::HivSurvey, content, columns)
    }
}

impl SourceParser for HivSentinelParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn kind(&self) -> DatasetKind {
        DatasetKind::HivSentinel
    }

    fn parse(&self, content: &str, columns: &ColumnMap) -> Result<RawTable, ParserError> {
        read_table(Self::NAME, DatasetKind::HivSentinel, content, columns)
    }
}
