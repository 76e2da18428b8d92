use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Events emitted by the [`super::ExecutionEngine`] during a parallel binning run.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// A run is about to start.
    RunStarted {
        /// Samples submitted, including any that will be dropped.
        samples: usize,
        /// Number of chunks the samples were split into.
        chunks: usize,
    },
    /// A worker picked up a chunk.
    ChunkStarted {
        /// Offset of the chunk's first sample.
        start_row: usize,
        /// Samples in the chunk.
        row_count: usize,
    },
    /// A worker finished binning a chunk.
    ChunkFinished {
        /// Offset of the chunk's first sample.
        start_row: usize,
        /// Populated bins in the chunk's partial bag.
        bins: usize,
    },
    /// Every partial bag has been merged.
    RunFinished {
        /// Wall time of the whole run.
        elapsed: Duration,
        /// Metrics at the end of the run.
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
///
/// Chunk events arrive from worker threads, in no particular order.
pub trait ExecutionObserver: Send + Sync {
    /// Called for each event as it happens.
    fn on_event(&self, event: &ExecutionEvent);
}

/// Prints every event to standard error.
#[derive(Debug, Default)]
pub struct StdErrExecutionObserver;

impl ExecutionObserver for StdErrExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        eprintln!("{event:?}");
    }
}

/// Counters updated while a run is in progress; snapshot them at any time.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    runs: AtomicU64,
    elapsed_ns: AtomicU64,
    samples_binned: AtomicU64,
    chunks_started: AtomicU64,
    chunks_finished: AtomicU64,
    active_chunks: AtomicUsize,
    max_active_chunks: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_run(&self) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        for counter in [
            &self.elapsed_ns,
            &self.samples_binned,
            &self.chunks_started,
            &self.chunks_finished,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        self.active_chunks.store(0, Ordering::SeqCst);
        self.max_active_chunks.store(0, Ordering::SeqCst);
    }

    pub(crate) fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
    }

    pub(crate) fn on_chunk_start(&self) {
        self.chunks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
    }

    pub(crate) fn on_chunk_end(&self, samples: u64) {
        self.samples_binned.fetch_add(samples, Ordering::SeqCst);
        self.chunks_finished.fetch_add(1, Ordering::SeqCst);
        self.active_chunks.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        ExecutionMetricsSnapshot {
            runs: self.runs.load(Ordering::SeqCst),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
            samples_binned: self.samples_binned.load(Ordering::SeqCst),
            chunks_started: self.chunks_started.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            max_active_chunks: self.max_active_chunks.load(Ordering::SeqCst),
        }
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

/// Immutable copy of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    /// Runs started since the engine was created.
    pub runs: u64,
    /// `None` while a run is in progress.
    pub elapsed: Option<Duration>,
    /// Samples accepted into a bin; dropped samples are not counted.
    pub samples_binned: u64,
    /// Chunks picked up by a worker in the latest run.
    pub chunks_started: u64,
    /// Chunks fully binned in the latest run.
    pub chunks_finished: u64,
    /// Most chunks in flight at once in the latest run.
    pub max_active_chunks: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runs={}, samples_binned={}, chunks={}/{}, max_active_chunks={}, elapsed={:?}",
            self.runs,
            self.samples_binned,
            self.chunks_finished,
            self.chunks_started,
            self.max_active_chunks,
            self.elapsed
        )
    }
}
