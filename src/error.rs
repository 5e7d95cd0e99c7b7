use thiserror::Error;

/// Fatal analysis errors.
///
/// Both variants abort the run before any findings are produced. A missing
/// statistic is not an error: the affected rule is skipped and the skip is
/// recorded in the report (see `SkippedCheck`).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Trace metadata and counter tables disagree, e.g. a module is listed
    /// as present but its counter table is absent.
    #[error("malformed trace: {0}")]
    MalformedTrace(String),

    /// A threshold override is outside its valid domain.
    #[error("configuration error: {0}")]
    Configuration(String),
}
