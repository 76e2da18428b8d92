//! The narrow interface consumers use to read tables: column metadata plus forward-only row
//! cursors.
//!
//! Each call to [`Table::row_sequence`] opens an independent cursor, so several consumers can
//! walk the same table at once. A cursor itself is driven by one thread from start to end.

use crate::error::{TableError, TableResult};
use crate::types::{ColumnInfo, RowSet, Value};

/// A table with fixed columns that can be iterated any number of times.
pub trait Table {
    /// Column metadata, in column order.
    fn columns(&self) -> &[ColumnInfo];

    /// Number of data rows, if known without iterating.
    fn row_count(&self) -> Option<u64> {
        None
    }

    /// Open a new forward-only cursor positioned before the first row.
    fn row_sequence(&self) -> TableResult<Box<dyn RowSequence + '_>>;

    fn column_count(&self) -> usize {
        self.columns().len()
    }
}

/// Forward-only cursor over the rows of a [`Table`].
pub trait RowSequence {
    /// Advance to the next row; returns `false` once the rows are exhausted.
    fn next(&mut self) -> TableResult<bool>;

    /// Cells of the current row. Empty before the first successful [`RowSequence::next`].
    fn row(&self) -> &[Value];

    /// One cell of the current row.
    fn cell(&self, icol: usize) -> TableResult<&Value> {
        let row = self.row();
        row.get(icol).ok_or(TableError::ColumnIndex {
            index: icol,
            ncol: row.len(),
        })
    }

    /// Release resources held by the cursor. Idempotent; later calls to `next` fail.
    fn close(&mut self);
}

impl RowSet {
    /// Drain every row of `table` into memory.
    pub fn collect(table: &dyn Table) -> TableResult<Self> {
        let mut rows = Vec::new();
        let mut seq = table.row_sequence()?;
        while seq.next()? {
            rows.push(seq.row().to_vec());
        }
        seq.close();
        Ok(Self::new(table.columns().to_vec(), rows))
    }
}

impl Table for RowSet {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.rows.len() as u64)
    }

    fn row_sequence(&self) -> TableResult<Box<dyn RowSequence + '_>> {
        Ok(Box::new(RowSetSequence {
            rows: &self.rows,
            next: 0,
            current: None,
            closed: false,
        }))
    }
}

struct RowSetSequence<'a> {
    rows: &'a [Vec<Value>],
    next: usize,
    current: Option<&'a [Value]>,
    closed: bool,
}

impl RowSequence for RowSetSequence<'_> {
    fn next(&mut self) -> TableResult<bool> {
        if self.closed {
            return Err(TableError::Closed);
        }
        self.current = self.rows.get(self.next).map(Vec::as_slice);
        if self.current.is_some() {
            self.next += 1;
        }
        Ok(self.current.is_some())
    }

    fn row(&self) -> &[Value] {
        self.current.unwrap_or(&[])
    }

    fn close(&mut self) {
        self.closed = true;
        self.current = None;
    }
}
