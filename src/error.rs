use crate::entity::LevelKind;
use thiserror::Error;

/// Non-fatal problems found while normalizing a dropdown payload.
///
/// None of these abort a build: the offending entity is kept and degrades to a root
/// (or is skipped, for duplicates) and the issue is recorded on the index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedHierarchy {
    #[error("{level} '{id}' references missing parent '{parent_id}'")]
    MissingParent {
        id: String,
        level: LevelKind,
        parent_id: String,
    },

    #[error("{level} '{id}' references parent '{parent_id}' at {parent_level}, which is not above it")]
    ParentNotAbove {
        id: String,
        level: LevelKind,
        parent_id: String,
        parent_level: LevelKind,
    },

    #[error("duplicate id '{id}' at {level} ignored (already defined at {existing})")]
    DuplicateId {
        id: String,
        level: LevelKind,
        existing: LevelKind,
    },

    #[error("unrecognized dropdown payload: {0}")]
    UnrecognizedPayload(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("entity '{id}' is a {actual}, not a {expected}")]
    LevelMismatch {
        id: String,
        expected: LevelKind,
        actual: LevelKind,
    },

    #[error("level {0} is not part of this report")]
    LevelNotInReport(LevelKind),
}

/// Failure fetching dropdown data. Surfaced to forms as an empty index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("report '{0}' has no dropdown endpoint")]
    NoEndpoint(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    Upstream(String),

    #[error("no data found for the selected filters")]
    NoData,

    #[error("unexpected response format: {0}")]
    UnexpectedShape(String),

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("{0} is required")]
    MissingField(String),

    #[error("selected {level} '{id}' is not in the hierarchy")]
    StaleSelection { level: LevelKind, id: String },

    #[error("report has {count} columns, a sheet holds at most {max}")]
    TooManyColumns { count: usize, max: usize },

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Fetch(#[from] FetchFailure),
}
