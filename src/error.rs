use thiserror::Error;

/// Convenience result type for table reading, writing and binning operations.
pub type TableResult<T> = Result<T, TableError>;

/// Error type returned across the crate.
///
/// Format errors always carry the 1-based line at which the problem was detected, so callers
/// can surface them to users directly.
#[derive(Debug, Error)]
pub enum TableError {
    /// Underlying I/O error (e.g. file not found, broken pipe).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The input text does not follow the dialect (bad quoting, inconsistent row arity, ...).
    #[error("{message} at line {line}")]
    Format { message: String, line: u64 },

    /// No data rows were left once the header had been accounted for.
    #[error("no rows")]
    NoRows,

    /// A cell failed to decode during the second pass, after inference had accepted it.
    ///
    /// This indicates that the input changed between the two passes, or an inference fault.
    #[error("failed to decode value at line {line} column '{column}' as {decoder} (raw='{raw}')")]
    Decode {
        line: u64,
        column: String,
        decoder: &'static str,
        raw: String,
    },

    /// A row sequence was used after it had been closed.
    #[error("row sequence is closed")]
    Closed,

    /// A column index was outside the table.
    #[error("column index {index} out of range for {ncol} columns")]
    ColumnIndex { index: usize, ncol: usize },

    /// Binning parameters are unusable (non-positive width, phase outside [0,1), ...).
    #[error("invalid binning parameters: {message}")]
    InvalidBinning { message: String },

    /// Two bin bags with different parameters were combined.
    #[error("binning mismatch: {message}")]
    BinningMismatch { message: String },

    /// The worker pool for parallel binning could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl TableError {
    pub(crate) fn format(message: impl Into<String>, line: u64) -> Self {
        Self::Format {
            message: message.into(),
            line,
        }
    }

    /// True for errors caused by malformed input rather than infrastructure failures.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format { .. } | Self::NoRows)
    }
}
