//! Parallel binning over a rayon pool.
//!
//! Samples are split into fixed-size chunks, each chunk is binned into its own [`BinBag`] on a
//! worker thread, and the partial bags are merged. Every partial bag shares the caller's
//! [`BinSpec`] and representative point, so merging is a plain per-index fold and the result
//! equals a sequential pass for every combiner.

mod observer;

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::binning::{BinBag, BinSpec};
use crate::error::TableResult;

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    StdErrExecutionObserver,
};

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Number of worker threads. `None` uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Samples per chunk. Values below 1 are treated as 1.
    pub chunk_size: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            num_threads: None,
            chunk_size: 16_384,
        }
    }
}

/// Runs binning jobs on a dedicated thread pool.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    pub fn new(opts: ExecutionOptions) -> TableResult<Self> {
        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
            .max(1);
        let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;
        debug!(n_threads, chunk_size = opts.chunk_size, "execution engine ready");

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Handle to the engine's live metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Bin `(x, weight)` samples in parallel.
    ///
    /// Fails only if `spec` is invalid.
    pub fn bin_parallel(
        &self,
        samples: &[(f64, f64)],
        spec: &BinSpec,
        point: f64,
    ) -> TableResult<BinBag> {
        let empty = BinBag::new(*spec, point)?;
        Ok(self.pool.install(|| self.bin_parallel_impl(samples, empty)))
    }

    fn bin_parallel_impl(&self, samples: &[(f64, f64)], empty: BinBag) -> BinBag {
        let start = Instant::now();
        let ranges = chunk_ranges(samples.len(), self.opts.chunk_size.max(1));
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted {
            samples: samples.len(),
            chunks: ranges.len(),
        });

        let bag = ranges
            .into_par_iter()
            .map(|range| {
                self.metrics.on_chunk_start();
                self.emit(ExecutionEvent::ChunkStarted {
                    start_row: range.start,
                    row_count: range.len(),
                });

                let start_row = range.start;
                let mut bag = empty.clone();
                for &(x, weight) in &samples[range] {
                    bag.submit(x, weight);
                }

                self.emit(ExecutionEvent::ChunkFinished {
                    start_row,
                    bins: bag.bin_count(),
                });
                self.metrics.on_chunk_end(bag.sample_count());
                bag
            })
            .reduce(
                || empty.clone(),
                |mut left, right| {
                    left.absorb(right);
                    left
                },
            );

        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        debug!(
            samples = samples.len(),
            bins = bag.bin_count(),
            ?elapsed,
            "parallel binning finished"
        );
        self.emit(ExecutionEvent::RunFinished {
            elapsed,
            metrics: self.metrics.snapshot(),
        });
        bag
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn chunk_ranges(row_count: usize, chunk_size: usize) -> Vec<Range<usize>> {
    (0..row_count)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(row_count))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{chunk_ranges, ExecutionEngine, ExecutionOptions};
    use crate::binning::{BinBag, BinSpec, Combiner, Normalisation};
    use crate::error::TableError;
    use crate::execution::{ExecutionEvent, ExecutionObserver};

    fn samples(n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let x = (i as f64 * 0.37).sin() * 50.0 + (i % 7) as f64;
                let w = if i % 11 == 0 { f64::NAN } else { (i % 5) as f64 - 1.0 };
                (x, w)
            })
            .collect()
    }

    fn engine(chunk_size: usize) -> ExecutionEngine {
        ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            chunk_size,
        })
        .unwrap()
    }

    fn sequential(samples: &[(f64, f64)], spec: BinSpec) -> BinBag {
        let mut bag = BinBag::new(spec, 1.0).unwrap();
        for &(x, w) in samples {
            bag.submit(x, w);
        }
        bag
    }

    #[test]
    fn chunking_covers_every_row_once() {
        assert!(chunk_ranges(0, 4).is_empty());
        assert_eq!(chunk_ranges(10, 4), vec![0..4, 4..8, 8..10]);
        assert_eq!(chunk_ranges(3, 10), vec![0..3]);
    }

    #[test]
    fn parallel_matches_sequential_for_every_combiner() {
        let data = samples(5_000);
        let engine = engine(97);
        for combiner in Combiner::ALL {
            let spec = BinSpec::linear(2.5).with_combiner(combiner);
            let par = engine.bin_parallel(&data, &spec, 1.0).unwrap();
            let seq = sequential(&data, spec);
            let par_bins: Vec<_> = par.bin_iter(false, Normalisation::None).collect();
            let seq_bins: Vec<_> = seq.bin_iter(false, Normalisation::None).collect();
            assert_eq!(par_bins.len(), seq_bins.len(), "{combiner}");
            for (p, s) in par_bins.iter().zip(&seq_bins) {
                assert_eq!((p.index, p.count), (s.index, s.count), "{combiner}");
                assert!((p.y - s.y).abs() <= 1e-9 * s.y.abs().max(1.0), "{combiner}");
            }
        }
    }

    #[test]
    fn empty_input_gives_empty_bag() {
        let bag = engine(8).bin_parallel(&[], &BinSpec::linear(1.0), 0.0).unwrap();
        assert!(bag.is_empty());
    }

    #[test]
    fn invalid_spec_is_rejected_before_running() {
        let err = engine(8).bin_parallel(&samples(10), &BinSpec::linear(-1.0), 0.0);
        assert!(matches!(err, Err(TableError::InvalidBinning { .. })));
    }

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<ExecutionEvent>>,
        chunks: AtomicUsize,
    }

    impl ExecutionObserver for Recording {
        fn on_event(&self, event: &ExecutionEvent) {
            if matches!(event, ExecutionEvent::ChunkFinished { .. }) {
                self.chunks.fetch_add(1, Ordering::SeqCst);
            }
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn observer_and_metrics_see_the_run() {
        let data = samples(1_000);
        let observer = Arc::new(Recording::default());
        let engine = engine(100).with_observer(observer.clone());
        let metrics = engine.metrics();

        let bag = engine.bin_parallel(&data, &BinSpec::linear(1.0), 0.0).unwrap();

        let events = observer.events.lock().unwrap();
        assert_eq!(
            events.first(),
            Some(&ExecutionEvent::RunStarted {
                samples: 1_000,
                chunks: 10
            })
        );
        assert!(matches!(events.last(), Some(ExecutionEvent::RunFinished { .. })));
        assert_eq!(observer.chunks.load(Ordering::SeqCst), 10);

        let snap = metrics.snapshot();
        assert_eq!(snap.runs, 1);
        assert_eq!(snap.chunks_started, 10);
        assert_eq!(snap.chunks_finished, 10);
        assert_eq!(snap.samples_binned, bag.sample_count());
        assert!(snap.max_active_chunks >= 1);
        assert!(snap.elapsed.is_some());
    }
}
