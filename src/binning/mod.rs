//! Histogram bin aggregation.
//!
//! A [`BinBag`] partitions a numeric axis into bins of fixed width (additive on a linear axis,
//! multiplicative on a log axis), folds each submitted `(x, weight)` sample into its bin with a
//! [`Combiner`], and hands out the populated bins in ascending order on request. Cumulative
//! sums and [`Normalisation`] are applied while iterating and never touch the stored state.
//!
//! ## Example
//!
//! ```rust
//! use tabstream::binning::{BinBag, BinSpec, Combiner, Normalisation};
//!
//! # fn main() -> Result<(), tabstream::TableError> {
//! let spec = BinSpec::linear(1.0).with_combiner(Combiner::Mean);
//! let mut bag = BinBag::new(spec, 0.0)?;
//! for (x, w) in [(0.1, 2.0), (0.9, 4.0), (1.5, 10.0), (f64::NAN, 1.0)] {
//!     bag.submit(x, w);
//! }
//! let ys: Vec<f64> = bag.bin_iter(false, Normalisation::None).map(|b| b.y).collect();
//! assert_eq!(ys, vec![3.0, 10.0]);
//!
//! let cumulative: Vec<f64> = bag.bin_iter(true, Normalisation::None).map(|b| b.y).collect();
//! assert_eq!(cumulative, vec![3.0, 13.0]);
//! # Ok(())
//! # }
//! ```

pub mod combiner;
pub mod normalisation;
pub mod plan;
pub mod report;

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TableError, TableResult};

use combiner::Accumulator;

pub use combiner::Combiner;
pub use normalisation::Normalisation;
pub use plan::{HistoPlan, PlanCache};
pub use report::{read_bins, BinTable};

/// Parameters fixing the bin layout and reduction of a [`BinBag`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    /// Logarithmic axis if true.
    #[serde(default)]
    pub log: bool,
    /// Additive bin width (linear) or multiplicative bin width (log).
    pub width: f64,
    /// Bin boundary offset as a fraction of the width, in `[0, 1)`.
    #[serde(default)]
    pub phase: f64,
    #[serde(default)]
    pub combiner: Combiner,
}

impl BinSpec {
    pub fn linear(width: f64) -> Self {
        Self {
            log: false,
            width,
            phase: 0.0,
            combiner: Combiner::default(),
        }
    }

    pub fn log(width: f64) -> Self {
        Self {
            log: true,
            ..Self::linear(width)
        }
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_combiner(mut self, combiner: Combiner) -> Self {
        self.combiner = combiner;
        self
    }

    pub fn validate(&self) -> TableResult<()> {
        let min_width = if self.log { 1.0 } else { 0.0 };
        if !(self.width.is_finite() && self.width > min_width) {
            return Err(TableError::InvalidBinning {
                message: format!(
                    "width must be finite and greater than {min_width} for a {} axis, got {}",
                    if self.log { "log" } else { "linear" },
                    self.width
                ),
            });
        }
        if !(0.0..1.0).contains(&self.phase) {
            return Err(TableError::InvalidBinning {
                message: format!("phase must be in [0, 1), got {}", self.phase),
            });
        }
        Ok(())
    }

    /// True iff the given parameters are identical (bit-for-bit for the floats) to these.
    pub fn matches(&self, log: bool, width: f64, phase: f64, combiner: Combiner) -> bool {
        self.log == log
            && self.width.to_bits() == width.to_bits()
            && self.phase.to_bits() == phase.to_bits()
            && self.combiner == combiner
    }

    /// Extent of every bin: the width, or its log10 on a log axis.
    pub fn extent(&self) -> f64 {
        if self.log { self.width.log10() } else { self.width }
    }
}

/// Maps data values to integer bin indexes and back.
///
/// `origin` is a bin boundary near the representative point, which keeps index arithmetic
/// small for data far from zero without moving any boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BinMapper {
    Linear { width: f64, origin: f64 },
    Log { ln_width: f64, origin: f64 },
}

impl BinMapper {
    fn new(spec: &BinSpec, point: f64) -> Self {
        if spec.log {
            let ln_width = spec.width.ln();
            let k = if point.is_finite() && point > 0.0 {
                (point.ln() / ln_width - spec.phase).floor()
            } else {
                0.0
            };
            BinMapper::Log {
                ln_width,
                origin: ((k + spec.phase) * ln_width).exp(),
            }
        } else {
            let offset = spec.phase * spec.width;
            let k = if point.is_finite() {
                ((point - offset) / spec.width).floor()
            } else {
                0.0
            };
            BinMapper::Linear {
                width: spec.width,
                origin: offset + k * spec.width,
            }
        }
    }

    fn index(&self, x: f64) -> Option<i64> {
        let k = match *self {
            BinMapper::Linear { width, origin } => ((x - origin) / width).floor(),
            BinMapper::Log { ln_width, origin } => {
                if x <= 0.0 {
                    return None;
                }
                ((x / origin).ln() / ln_width).floor()
            }
        };
        // i64::MAX as f64 rounds up, so the upper bound is exclusive.
        (k.is_finite() && k >= i64::MIN as f64 && k < i64::MAX as f64).then_some(k as i64)
    }

    fn bounds(&self, index: i64) -> (f64, f64) {
        let k = index as f64;
        match *self {
            BinMapper::Linear { width, origin } => (origin + k * width, origin + (k + 1.0) * width),
            BinMapper::Log { ln_width, origin } => (
                origin * (k * ln_width).exp(),
                origin * ((k + 1.0) * ln_width).exp(),
            ),
        }
    }

    fn midpoint(&self, index: i64) -> f64 {
        let (lo, hi) = self.bounds(index);
        match self {
            BinMapper::Linear { .. } => 0.5 * (lo + hi),
            BinMapper::Log { .. } => (lo * hi).sqrt(),
        }
    }
}

#[derive(Debug, Clone)]
struct BinState {
    count: u64,
    acc: Accumulator,
}

impl BinState {
    fn absorb(&mut self, other: BinState) {
        self.count += other.count;
        self.acc.merge(other.acc);
    }
}

/// One populated bin as seen by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bin {
    /// Bin index relative to the bag's origin.
    pub index: i64,
    /// Inclusive lower bound in data space.
    pub x_min: f64,
    /// Exclusive upper bound in data space.
    pub x_max: f64,
    /// Combined value, after any cumulative sum and normalisation.
    pub y: f64,
    /// Number of samples that landed in this bin.
    pub count: u64,
}

impl Bin {
    /// Midpoint: arithmetic on a linear axis, geometric on a log axis.
    pub fn x_mid(&self, log: bool) -> f64 {
        if log {
            (self.x_min * self.x_max).sqrt()
        } else {
            0.5 * (self.x_min + self.x_max)
        }
    }
}

/// Accumulates samples into bins.
///
/// Not safe for concurrent submission; parallel callers bin disjoint partitions and
/// [`BinBag::merge`] the results.
#[derive(Debug, Clone)]
pub struct BinBag {
    spec: BinSpec,
    mapper: BinMapper,
    bins: BTreeMap<i64, BinState>,
}

impl BinBag {
    /// Create an empty bag; `point` is any representative data value, used to place the index
    /// origin.
    pub fn new(spec: BinSpec, point: f64) -> TableResult<Self> {
        spec.validate()?;
        Ok(Self {
            mapper: BinMapper::new(&spec, point),
            spec,
            bins: BTreeMap::new(),
        })
    }

    pub fn spec(&self) -> BinSpec {
        self.spec
    }

    pub fn bin_width(&self) -> f64 {
        self.spec.width
    }

    pub fn is_log(&self) -> bool {
        self.spec.log
    }

    pub fn combiner(&self) -> Combiner {
        self.spec.combiner
    }

    /// Number of populated bins.
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Total samples accepted.
    pub fn sample_count(&self) -> u64 {
        self.bins.values().map(|b| b.count).sum()
    }

    /// Fold one sample into its bin.
    ///
    /// NaN or infinite `x`, non-positive `x` on a log axis, and NaN `weight` are dropped. So is
    /// a finite `x` so far from the representative point that its bin index overflows `i64`.
    pub fn submit(&mut self, x: f64, weight: f64) {
        if weight.is_nan() {
            return;
        }
        let Some(index) = self.mapper.index(x) else {
            return;
        };
        let combiner = self.spec.combiner;
        let state = self.bins.entry(index).or_insert_with(|| BinState {
            count: 0,
            acc: combiner.accumulator(),
        });
        state.count += 1;
        state.acc.submit(weight);
    }

    /// The `[x_min, x_max)` bounds of the bin `x` falls in, whether or not it is populated.
    pub fn bin_bounds(&self, x: f64) -> Option<(f64, f64)> {
        self.mapper.index(x).map(|i| self.mapper.bounds(i))
    }

    /// True iff this bag was built with exactly these parameters.
    pub fn matches(&self, log: bool, width: f64, phase: f64, combiner: Combiner) -> bool {
        self.spec.matches(log, width, phase, combiner)
    }

    /// Populated bins in ascending order.
    ///
    /// With `cumulative`, each value is the running sum of per-bin values up to and including
    /// that bin. The normalisation factor is computed once, up front, from all bins.
    pub fn bin_iter(&self, cumulative: bool, norm: Normalisation) -> BinIter<'_> {
        let factor = if norm == Normalisation::None {
            1.0
        } else {
            let values: Vec<f64> = self.bins.values().map(|b| b.acc.value()).collect();
            let emitted = if cumulative && norm.needs_emitted() {
                values
                    .iter()
                    .scan(0.0, |total, v| {
                        *total += v;
                        Some(*total)
                    })
                    .collect()
            } else {
                values.clone()
            };
            norm.factor(&values, &emitted, self.spec.extent())
        };
        BinIter {
            bins: self.bins.iter(),
            mapper: self.mapper,
            cumulative,
            factor,
            running: 0.0,
        }
    }

    /// Merge another bag's bins into this one.
    ///
    /// Both bags must have identical [`BinSpec`]s. The representative points may differ;
    /// bins are matched by position on the axis, not by index.
    pub fn merge(&mut self, other: BinBag) -> TableResult<()> {
        let s = other.spec;
        if !self.matches(s.log, s.width, s.phase, s.combiner) {
            return Err(TableError::BinningMismatch {
                message: format!("cannot merge {:?} into {:?}", other.spec, self.spec),
            });
        }
        self.absorb(other);
        Ok(())
    }

    /// Merge without the parameter check; callers guarantee equal specs.
    pub(crate) fn absorb(&mut self, other: BinBag) {
        let same_origin = self.mapper == other.mapper;
        for (index, state) in other.bins {
            let index = if same_origin {
                Some(index)
            } else {
                self.mapper.index(other.mapper.midpoint(index))
            };
            let Some(index) = index else { continue };
            match self.bins.entry(index) {
                btree_map::Entry::Occupied(mut e) => e.get_mut().absorb(state),
                btree_map::Entry::Vacant(e) => {
                    e.insert(state);
                }
            }
        }
        debug!(bins = self.bins.len(), "merged bin bags");
    }
}

/// Iterator returned by [`BinBag::bin_iter`].
pub struct BinIter<'a> {
    bins: btree_map::Iter<'a, i64, BinState>,
    mapper: BinMapper,
    cumulative: bool,
    factor: f64,
    running: f64,
}

impl Iterator for BinIter<'_> {
    type Item = Bin;

    fn next(&mut self) -> Option<Bin> {
        let (&index, state) = self.bins.next()?;
        let mut value = state.acc.value();
        if self.cumulative {
            self.running += value;
            value = self.running;
        }
        let (x_min, x_max) = self.mapper.bounds(index);
        Some(Bin {
            index,
            x_min,
            x_max,
            y: value * self.factor,
            count: state.count,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bins.size_hint()
    }
}

impl ExactSizeIterator for BinIter<'_> {}
