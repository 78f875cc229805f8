use crate::errors::{ParserAttempt, ParserError};
use crate::formats::{
    check_signature, classify_columns, read_header, BurdenParser, ColumnMap, CoverageParser,
    HivSentinelParser, HivSurveyParser, RrTbParser,
};
use crate::model::{DatasetKind, RawTable};

pub trait SourceParser {
    fn name(&self) -> &'static str;
    fn kind(&self) -> DatasetKind;
    /// Reads the whole file, tolerating missing columns.
    fn parse(&self, content: &str, columns: &ColumnMap) -> Result<RawTable, ParserError>;
}

static BURDEN: BurdenParser = BurdenParser;
static COVERAGE: CoverageParser = CoverageParser;
static RR_TB: RrTbParser = RrTbParser;
static HIV_SURVEY: HivSurveyParser = HivSurveyParser;
static HIV_SENTINEL: HivSentinelParser = HivSentinelParser;

/// Detection order. Coverage goes last because its `value` alias is the most
/// generic header.
pub fn all_parsers() -> [&'static dyn SourceParser; 5] {
    [&HIV_SURVEY, &HIV_SENTINEL, &RR_TB, &BURDEN, &COVERAGE]
}

pub fn parser_for(kind: DatasetKind) -> &'static dyn SourceParser {
    match kind {
        DatasetKind::Burden => &BURDEN,
        DatasetKind::Coverage => &COVERAGE,
        DatasetKind::RrTb => &RR_TB,
        DatasetKind::HivSurvey => &HIV_SURVEY,
        DatasetKind::HivSentinel => &HIV_SENTINEL,
    }
}

/// Parses a file whose dataset is already known. Missing columns are recorded on
/// the table instead of failing.
pub fn parse_dataset(kind: DatasetKind, content: &str) -> Result<RawTable, ParserError> {
    parse_dataset_with(kind, content, ColumnMap::builtin())
}

pub fn parse_dataset_with(
    kind: DatasetKind,
    content: &str,
    columns: &ColumnMap,
) -> Result<RawTable, ParserError> {
    parser_for(kind).parse(content, columns)
}

/// Detects the dataset from its header and parses it.
pub fn parse_source_file(content: &str) -> Result<RawTable, ParserError> {
    let parsers = all_parsers();
    parse_with_parsers(content, &parsers, ColumnMap::builtin())
}

pub fn detect_kind(content: &str) -> Result<DatasetKind, ParserError> {
    parse_source_file(content).map(|table| table.kind)
}

pub fn parse_with_parsers(
    content: &str,
    parsers: &[&dyn SourceParser],
    columns: &ColumnMap,
) -> Result<RawTable, ParserError> {
    let mut attempts = Vec::new();

    for parser in parsers {
        let header = read_header(parser.name(), content)?;
        let roles = classify_columns(parser.kind(), &header, columns);
        match check_signature(parser.name(), parser.kind(), &roles) {
            Ok(()) => return parser.parse(content, columns),
            Err(ParserError::FormatMismatch { reason, .. }) => {
                attempts.push(ParserAttempt::new(parser.name(), reason));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ParserError::NoMatchingParser { attempts })
}
