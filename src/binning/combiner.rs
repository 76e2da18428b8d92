//! Per-bin reduction of sample weights.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// How the weights falling into one bin are combined into the bin's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combiner {
    /// Sum of weights.
    #[default]
    Sum,
    /// Mean of weights.
    Mean,
    /// Median of weights; the mean of the two central values for an even count.
    Median,
    /// Smallest weight.
    Min,
    /// Largest weight.
    Max,
    /// Number of samples, ignoring weights.
    Count,
    /// 1 for any bin that received a sample.
    Hit,
}

impl Combiner {
    pub const ALL: [Combiner; 7] = [
        Combiner::Sum,
        Combiner::Mean,
        Combiner::Median,
        Combiner::Min,
        Combiner::Max,
        Combiner::Count,
        Combiner::Hit,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Combiner::Sum => "sum",
            Combiner::Mean => "mean",
            Combiner::Median => "median",
            Combiner::Min => "min",
            Combiner::Max => "max",
            Combiner::Count => "count",
            Combiner::Hit => "hit",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Combiner::Sum => "the sum of all the combined values per bin",
            Combiner::Mean => "the mean of the combined values",
            Combiner::Median => "the median of the combined values (may be slow)",
            Combiner::Min => "the minimum of all the combined values",
            Combiner::Max => "the maximum of all the combined values",
            Combiner::Count => "the number of non-blank values per bin (weight is ignored)",
            Combiner::Hit => "1 if any samples fall in the bin, otherwise 0",
        }
    }

    /// True if partial results merge without keeping every sample.
    pub const fn merges_cheaply(self) -> bool {
        !matches!(self, Combiner::Median)
    }

    pub(crate) fn accumulator(self) -> Accumulator {
        match self {
            Combiner::Sum => Accumulator::Sum(0.0),
            Combiner::Mean => Accumulator::Mean { sum: 0.0, count: 0 },
            Combiner::Median => Accumulator::Median(Vec::new()),
            Combiner::Min => Accumulator::Min(f64::INFINITY),
            Combiner::Max => Accumulator::Max(f64::NEG_INFINITY),
            Combiner::Count => Accumulator::Count(0),
            Combiner::Hit => Accumulator::Hit,
        }
    }
}

impl fmt::Display for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Combiner {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Combiner::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TableError::InvalidBinning {
                message: format!("unknown combiner '{s}'"),
            })
    }
}

/// Running state of one bin.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Accumulator {
    Sum(f64),
    Mean { sum: f64, count: u64 },
    Median(Vec<f64>),
    Min(f64),
    Max(f64),
    Count(u64),
    Hit,
}

impl Accumulator {
    pub(crate) fn submit(&mut self, weight: f64) {
        match self {
            Accumulator::Sum(total) => *total += weight,
            Accumulator::Mean { sum, count } => {
                *sum += weight;
                *count += 1;
            }
            Accumulator::Median(values) => values.push(weight),
            Accumulator::Min(v) => *v = v.min(weight),
            Accumulator::Max(v) => *v = v.max(weight),
            Accumulator::Count(n) => *n += 1,
            Accumulator::Hit => {}
        }
    }

    pub(crate) fn value(&self) -> f64 {
        match self {
            Accumulator::Sum(total) => *total,
            Accumulator::Mean { sum, count } => {
                if *count == 0 {
                    f64::NAN
                } else {
                    sum / *count as f64
                }
            }
            Accumulator::Median(values) => median(values),
            Accumulator::Min(v) | Accumulator::Max(v) => *v,
            Accumulator::Count(n) => *n as f64,
            Accumulator::Hit => 1.0,
        }
    }

    /// Fold another accumulator of the same kind into this one.
    ///
    /// Bags compare combiners before merging, so mismatched kinds do not occur.
    pub(crate) fn merge(&mut self, other: Accumulator) {
        match (self, other) {
            (Accumulator::Sum(a), Accumulator::Sum(b)) => *a += b,
            (
                Accumulator::Mean { sum, count },
                Accumulator::Mean {
                    sum: other_sum,
                    count: other_count,
                },
            ) => {
                *sum += other_sum;
                *count += other_count;
            }
            (Accumulator::Median(a), Accumulator::Median(b)) => a.extend(b),
            (Accumulator::Min(a), Accumulator::Min(b)) => *a = a.min(b),
            (Accumulator::Max(a), Accumulator::Max(b)) => *a = a.max(b),
            (Accumulator::Count(a), Accumulator::Count(b)) => *a += b,
            (Accumulator::Hit, Accumulator::Hit) => {}
            (this, other) => debug_assert!(false, "cannot merge {other:?} into {this:?}"),
        }
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}
