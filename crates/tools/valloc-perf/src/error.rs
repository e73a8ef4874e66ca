//! Error types for the analysis pipeline.

use std::fmt;

use crate::sample::Operation;

/// Errors that can occur while loading or analyzing benchmark results.
#[derive(Debug)]
pub enum AnalysisError {
    /// A source could not be read or does not have the expected shape.
    Ingest {
        /// Source identifier (configured name or path).
        source: String,
        /// What went wrong.
        reason: String,
    },
    /// Aggregation was requested on a table without rows.
    EmptyGroup {
        /// Source identifier of the empty table.
        source: String,
    },
    /// A combined-operation average is missing one of its two sides.
    MissingPair {
        /// Allocator of the incomplete group.
        allocator: String,
        /// Block size of the incomplete group.
        size: u64,
        /// The operation that has no samples.
        missing: Operation,
    },
    /// Extrema or a mean were requested on an empty series.
    NoData {
        /// Description of the series.
        series: String,
    },
}

impl AnalysisError {
    pub(crate) fn ingest(source: &str, reason: impl Into<String>) -> Self {
        Self::Ingest {
            source: source.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn no_data(series: impl Into<String>) -> Self {
        Self::NoData {
            series: series.into(),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest { source, reason } => write!(f, "cannot ingest '{source}': {reason}"),
            Self::EmptyGroup { source } => {
                write!(f, "cannot aggregate '{source}': table has no samples")
            }
            Self::MissingPair {
                allocator,
                size,
                missing,
            } => write!(
                f,
                "no '{missing}' samples for allocator '{allocator}' at size {size}"
            ),
            Self::NoData { series } => write!(f, "no data in series {series}"),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Result alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
