//! Path-based entry point for loading CSV tables.
//!
//! Most callers should use [`load_csv`]. If an observer is configured in [`LoadOptions`],
//! success, failure and alerts are reported to it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::csv::{CsvOptions, CsvTable};
use crate::error::TableResult;
use crate::observability::{LoadContext, LoadObserver, LoadSeverity, LoadStats};
use crate::source::FileSource;
use crate::table::Table;

/// Options controlling [`load_csv`].
#[derive(Clone)]
pub struct LoadOptions {
    pub csv: CsvOptions,
    /// Optional observer for logging and alerts.
    pub observer: Option<Arc<dyn LoadObserver>>,
    /// Failures at or above this severity also trigger `on_alert`.
    pub alert_at_or_above: LoadSeverity,
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("csv", &self.csv)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            csv: CsvOptions::default(),
            observer: None,
            alert_at_or_above: LoadSeverity::Critical,
        }
    }
}

/// Open a CSV file as a [`CsvTable`], running inference and header detection.
///
/// When an observer is configured, this reports:
///
/// - `on_success` with the row and column counts
/// - `on_failure` with a severity from [`LoadSeverity::for_error`]
/// - `on_alert` when that severity is at or above `options.alert_at_or_above`
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use tabstream::loader::{load_csv, LoadOptions};
/// use tabstream::observability::{LoadSeverity, StdErrObserver};
/// use tabstream::table::Table;
///
/// # fn main() -> Result<(), tabstream::TableError> {
/// let opts = LoadOptions {
///     observer: Some(Arc::new(StdErrObserver)),
///     alert_at_or_above: LoadSeverity::Error,
///     ..Default::default()
/// };
/// let table = load_csv("measurements.csv", &opts)?;
/// for col in table.columns() {
///     println!("{}: {}", col.name, col.decoder);
/// }
/// # Ok(())
/// # }
/// ```
pub fn load_csv(path: impl AsRef<Path>, options: &LoadOptions) -> TableResult<CsvTable> {
    let path = path.as_ref();
    let result = CsvTable::open(Arc::new(FileSource::new(path)), options.csv);

    if let Some(obs) = options.observer.as_ref() {
        let ctx = LoadContext {
            location: path.to_path_buf(),
        };
        match &result {
            Ok(table) => obs.on_success(
                &ctx,
                LoadStats {
                    rows: table.row_count().unwrap_or_default(),
                    columns: table.column_count(),
                },
            ),
            Err(e) => {
                let sev = LoadSeverity::for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

/// An owned load request, for callers that queue work.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub path: PathBuf,
    pub options: LoadOptions,
}

impl LoadRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: LoadOptions::default(),
        }
    }

    /// Execute the request by calling [`load_csv`].
    pub fn run(&self) -> TableResult<CsvTable> {
        load_csv(&self.path, &self.options)
    }
}
