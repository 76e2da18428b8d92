//! Bridges between bin bags and tables: binning a table's columns, and exposing bins as a table.

use tracing::debug;

use crate::error::{TableError, TableResult};
use crate::table::{RowSequence, Table};
use crate::types::{ColumnInfo, Decoder, Value};

use super::{Bin, BinBag, BinSpec, Normalisation};

/// Bin the numeric column `x_col` of `table`, weighted by `weight_col` or by 1 if absent.
///
/// Null and non-numeric cells read as NaN, so such samples are dropped. `point` places the
/// bag's index origin and is usually any value from the x column.
pub fn read_bins(
    table: &dyn Table,
    x_col: usize,
    weight_col: Option<usize>,
    spec: BinSpec,
    point: f64,
) -> TableResult<BinBag> {
    let ncol = table.column_count();
    for index in std::iter::once(x_col).chain(weight_col) {
        if index >= ncol {
            return Err(TableError::ColumnIndex { index, ncol });
        }
    }

    let mut bag = BinBag::new(spec, point)?;
    let mut seq = table.row_sequence()?;
    let mut rows = 0u64;
    while seq.next()? {
        rows += 1;
        let x = seq.cell(x_col)?.as_f64().unwrap_or(f64::NAN);
        let weight = match weight_col {
            Some(icol) => seq.cell(icol)?.as_f64().unwrap_or(f64::NAN),
            None => 1.0,
        };
        bag.submit(x, weight);
    }
    seq.close();
    debug!(
        rows,
        samples = bag.sample_count(),
        bins = bag.bin_count(),
        "binned table column {x_col}"
    );
    Ok(bag)
}

/// The populated bins of a bag as a four column table: `XMID`, `Y_<COMBINER>`, `XLOW`, `XHIGH`.
///
/// The midpoint is geometric on a log axis. The value column is named after the combiner when
/// the samples carried weights, and `Y_COUNT` when every weight was 1.
#[derive(Debug, Clone)]
pub struct BinTable {
    columns: Vec<ColumnInfo>,
    bins: Vec<Bin>,
    log: bool,
}

impl BinTable {
    pub fn new(bag: &BinBag, weighted: bool, cumulative: bool, norm: Normalisation) -> Self {
        let spec = bag.spec();
        let y_name = if weighted {
            format!("Y_{}", spec.combiner.name().to_ascii_uppercase())
        } else {
            "Y_COUNT".to_string()
        };
        let columns = ["XMID", y_name.as_str(), "XLOW", "XHIGH"]
            .into_iter()
            .map(|name| ColumnInfo {
                nullable: false,
                ..ColumnInfo::new(name, Decoder::Double)
            })
            .collect();
        Self {
            columns,
            bins: bag.bin_iter(cumulative, norm).collect(),
            log: spec.log,
        }
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }
}

impl Table for BinTable {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.bins.len() as u64)
    }

    fn row_sequence(&self) -> TableResult<Box<dyn RowSequence + '_>> {
        Ok(Box::new(BinRows {
            bins: self.bins.iter(),
            log: self.log,
            row: Vec::with_capacity(4),
            closed: false,
        }))
    }
}

struct BinRows<'a> {
    bins: std::slice::Iter<'a, Bin>,
    log: bool,
    row: Vec<Value>,
    closed: bool,
}

impl RowSequence for BinRows<'_> {
    fn next(&mut self) -> TableResult<bool> {
        if self.closed {
            return Err(TableError::Closed);
        }
        self.row.clear();
        let Some(bin) = self.bins.next() else {
            return Ok(false);
        };
        self.row.extend(
            [bin.x_mid(self.log), bin.y, bin.x_min, bin.x_max]
                .into_iter()
                .map(Value::Double),
        );
        Ok(true)
    }

    fn row(&self) -> &[Value] {
        &self.row
    }

    fn close(&mut self) {
        self.closed = true;
        self.row.clear();
    }
}
