use thiserror::Error;

use crate::data::LoadError;
use crate::model::{Side, TableError};

/// Recoverable conditions met while analyzing a table. They never fail the
/// analysis; the affected metric degrades to null and the condition is kept
/// on the result for reporting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Diagnostic {
    #[error("side {side} skipped: missing column `{column}`")]
    MissingColumn { side: Side, column: String },

    #[error("{metric}: {available} usable rows, {required} required")]
    InsufficientHistory {
        metric: String,
        available: usize,
        required: usize,
    },

    #[error("{metric}: zero variance in every window")]
    DegenerateVariance { metric: String },
}

/// Failure to analyze one table.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("table has no rows")]
    EmptyTable,

    #[error("no side has the columns required for feature derivation")]
    NoUsableSide,

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Failure of one source in a batch. Recorded as a warning; siblings continue.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to parse `{source_id}`: {reason}")]
    FileParse {
        source_id: String,
        #[source]
        reason: LoadError,
    },

    #[error("failed to analyze `{source_id}`: {reason}")]
    Analysis {
        source_id: String,
        #[source]
        reason: AnalysisError,
    },
}

impl SourceError {
    pub fn source_id(&self) -> &str {
        match self {
            SourceError::FileParse { source_id, .. } | SourceError::Analysis { source_id, .. } => {
                source_id
            }
        }
    }
}

/// Terminal batch failure: no source produced a summary record.
#[derive(Debug, Error)]
#[error("no source in the batch produced a summary ({} warning(s))", warnings.len())]
pub struct EmptyBatchError {
    pub warnings: Vec<String>,
}
