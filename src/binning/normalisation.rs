use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Read-time scaling applied to every value of a bin sequence.
///
/// Each mode reduces to one factor per iteration request, computed from the complete bin set.
/// Bin extent is the linear width on a linear axis and the log10 width on a log axis, so it is
/// the same for every bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalisation {
    /// Values are left alone.
    #[default]
    None,
    /// Total area (value times bin extent) is 1.
    Area,
    /// Sum of the per-bin values is 1.
    Unit,
    /// Largest absolute emitted value is 1.
    Maximum,
    /// Values are divided by the bin extent, giving a density.
    Width,
}

impl Normalisation {
    pub const ALL: [Normalisation; 5] = [
        Normalisation::None,
        Normalisation::Area,
        Normalisation::Unit,
        Normalisation::Maximum,
        Normalisation::Width,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Normalisation::None => "none",
            Normalisation::Area => "area",
            Normalisation::Unit => "unit",
            Normalisation::Maximum => "maximum",
            Normalisation::Width => "width",
        }
    }

    /// Scale factor given the per-bin values, the values as emitted (after any cumulative
    /// sum) and the common bin extent.
    pub(crate) fn factor(self, values: &[f64], emitted: &[f64], extent: f64) -> f64 {
        match self {
            Normalisation::None => 1.0,
            Normalisation::Area => reciprocal(values.iter().sum::<f64>() * extent),
            Normalisation::Unit => reciprocal(values.iter().sum::<f64>()),
            Normalisation::Maximum => {
                reciprocal(emitted.iter().fold(0.0_f64, |max, v| max.max(v.abs())))
            }
            Normalisation::Width => reciprocal(extent),
        }
    }

    /// True if [`Self::factor`] needs the emitted values.
    pub(crate) fn needs_emitted(self) -> bool {
        matches!(self, Normalisation::Maximum)
    }
}

/// `1/total`, or 1 when that would not be a usable factor.
fn reciprocal(total: f64) -> f64 {
    if total != 0.0 && total.is_finite() {
        1.0 / total
    } else {
        1.0
    }
}

impl fmt::Display for Normalisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Normalisation {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Normalisation::ALL
            .into_iter()
            .find(|n| n.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TableError::InvalidBinning {
                message: format!("unknown normalisation '{s}'"),
            })
    }
}
