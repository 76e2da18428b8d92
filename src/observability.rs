//! Reporting of table load outcomes to pluggable observers.
//!
//! [`crate::loader::load_csv`] calls `on_success` or `on_failure` on the configured observer,
//! and additionally `on_alert` when a failure's severity reaches the configured threshold.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::json;

use crate::error::TableError;

/// Severity of a load failure, used for alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSeverity {
    /// Informational event.
    Info,
    /// Something unexpected that did not stop the load.
    Warning,
    /// The input could not be read as a table.
    Error,
    /// Infrastructure failure, or the input changed while it was being read.
    Critical,
}

impl LoadSeverity {
    /// Classify an error returned while loading.
    pub fn for_error(error: &TableError) -> Self {
        match error {
            TableError::Io(_) | TableError::Decode { .. } | TableError::ThreadPool(_) => {
                LoadSeverity::Critical
            }
            TableError::Format { .. } | TableError::NoRows => LoadSeverity::Error,
            TableError::Closed
            | TableError::ColumnIndex { .. }
            | TableError::InvalidBinning { .. }
            | TableError::BinningMismatch { .. } => LoadSeverity::Error,
        }
    }
}

/// What was being loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadContext {
    /// Path the table was read from.
    pub location: PathBuf,
}

/// Shape of a successfully loaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Data rows, excluding a header or skipped first row.
    pub rows: u64,
    /// Number of columns.
    pub columns: usize,
}

/// Observer interface for load outcomes. All methods default to doing nothing.
pub trait LoadObserver: Send + Sync {
    /// Called once the table's columns are known.
    fn on_success(&self, _ctx: &LoadContext, _stats: LoadStats) {}

    /// Called for every failed load.
    fn on_failure(&self, _ctx: &LoadContext, _severity: LoadSeverity, _error: &TableError) {}

    /// Called for failures at or above the alert threshold, after `on_failure`.
    ///
    /// Forwards to [`Self::on_failure`] unless overridden.
    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &TableError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans every callback out to a list of observers, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn LoadObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<dyn LoadObserver>) {
        self.observers.push(observer);
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl LoadObserver for CompositeObserver {
    fn on_success(&self, ctx: &LoadContext, stats: LoadStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &TableError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &TableError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs load events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl LoadObserver for StdErrObserver {
    fn on_success(&self, ctx: &LoadContext, stats: LoadStats) {
        eprintln!(
            "[load][ok] location={} rows={} columns={}",
            ctx.location.display(),
            stats.rows,
            stats.columns
        );
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &TableError) {
        eprintln!(
            "[load][{severity:?}] location={} err={error}",
            ctx.location.display()
        );
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &TableError) {
        eprintln!(
            "[ALERT][load][{severity:?}] location={} err={error}",
            ctx.location.display()
        );
    }
}

/// Appends one JSON object per event to a log file.
///
/// Writes are best-effort; a log file that cannot be opened or written is ignored.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: serde_json::Value) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{event}");
        }
    }

    fn failure_event(
        kind: &str,
        ctx: &LoadContext,
        severity: LoadSeverity,
        error: &TableError,
    ) -> serde_json::Value {
        json!({
            "ts": unix_ts(),
            "event": kind,
            "severity": severity,
            "location": ctx.location.display().to_string(),
            "error": error.to_string(),
        })
    }
}

impl LoadObserver for FileObserver {
    fn on_success(&self, ctx: &LoadContext, stats: LoadStats) {
        self.append(json!({
            "ts": unix_ts(),
            "event": "ok",
            "location": ctx.location.display().to_string(),
            "rows": stats.rows,
            "columns": stats.columns,
        }));
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &TableError) {
        self.append(Self::failure_event("fail", ctx, severity, error));
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &TableError) {
        self.append(Self::failure_event("alert", ctx, severity, error));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::{LoadSeverity, TableError};

    #[test]
    fn severity_classification() {
        let io = TableError::from(std::io::Error::other("disk"));
        assert_eq!(LoadSeverity::for_error(&io), LoadSeverity::Critical);
        assert_eq!(LoadSeverity::for_error(&TableError::NoRows), LoadSeverity::Error);
        let fmt = TableError::format("Unterminated string", 2);
        assert_eq!(LoadSeverity::for_error(&fmt), LoadSeverity::Error);
        let decode = TableError::Decode {
            line: 3,
            column: "n".into(),
            decoder: "int",
            raw: "x".into(),
        };
        assert_eq!(LoadSeverity::for_error(&decode), LoadSeverity::Critical);
    }

    #[test]
    fn severities_are_ordered() {
        assert!(LoadSeverity::Info < LoadSeverity::Warning);
        assert!(LoadSeverity::Error < LoadSeverity::Critical);
    }
}
