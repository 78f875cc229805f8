use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tbviz_parser::DatasetKind;

/// Record- or view-scoped problems. None of these abort a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    /// Source content that could not be read as a table at all. The dataset is
    /// treated as absent and its tasks are skipped.
    UnreadableSource {
        dataset: DatasetKind,
        reason: String,
    },
    MissingColumn {
        dataset: DatasetKind,
        column: String,
    },
    UnparseableValue {
        dataset: DatasetKind,
        line: usize,
        field: String,
        raw: String,
    },
    /// Row dropped because its country or year was absent or invalid.
    InvalidKey {
        dataset: DatasetKind,
        line: usize,
        reason: String,
    },
    UnmappedCountry {
        dataset: DatasetKind,
        country: String,
    },
    UndefinedMetric {
        view: &'static str,
        country: String,
        reason: String,
    },
    EmptyJoin {
        operation: &'static str,
    },
    /// Two sources reported the same country-year in a view that shows one
    /// value per cell. `kept` names the source whose value is shown.
    OverlappingSources {
        view: &'static str,
        country: String,
        year: i32,
        kept: DatasetKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnreadableSource,
    MissingColumn,
    UnparseableValue,
    InvalidKey,
    UnmappedCountry,
    UndefinedMetric,
    EmptyJoin,
    OverlappingSources,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::UnreadableSource => "unreadable_source",
            IssueKind::MissingColumn => "missing_column",
            IssueKind::UnparseableValue => "unparseable_value",
            IssueKind::InvalidKey => "invalid_key",
            IssueKind::UnmappedCountry => "unmapped_country",
            IssueKind::UndefinedMetric => "undefined_metric",
            IssueKind::EmptyJoin => "empty_join",
            IssueKind::OverlappingSources => "overlapping_sources",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Issue {
    pub fn kind(&self) -> IssueKind {
        match self {
            Issue::UnreadableSource { .. } => IssueKind::UnreadableSource,
            Issue::MissingColumn { .. } => IssueKind::MissingColumn,
            Issue::UnparseableValue { .. } => IssueKind::UnparseableValue,
            Issue::InvalidKey { .. } => IssueKind::InvalidKey,
            Issue::UnmappedCountry { .. } => IssueKind::UnmappedCountry,
            Issue::UndefinedMetric { .. } => IssueKind::UndefinedMetric,
            Issue::EmptyJoin { .. } => IssueKind::EmptyJoin,
            Issue::OverlappingSources { .. } => IssueKind::OverlappingSources,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub issues: Vec<Issue>,
}

impl Diagnostics {
    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind() == kind).count()
    }

    pub fn totals(&self) -> BTreeMap<IssueKind, usize> {
        let mut totals = BTreeMap::new();
        for issue in &self.issues {
            *totals.entry(issue.kind()).or_insert(0) += 1;
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}
