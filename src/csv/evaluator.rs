//! Incremental column type inference.
//!
//! Each column keeps a [`DecoderSet`] of the decoders that accepted all of its values so far.
//! A cell removes the decoders it fails under, and the column resolves to the most specific
//! survivor. The set only shrinks, so the resolved decoder only moves towards
//! [`Decoder::String`] and still parses every earlier value.

use crate::error::{TableError, TableResult};
use crate::types::{ColumnInfo, Decoder, DecoderSet, Field, TableMetadata};

/// Accumulates per-column decoder, nullability and width over a stream of rows.
#[derive(Debug, Clone, Default)]
pub struct RowEvaluator {
    candidates: Vec<DecoderSet>,
    has_value: Vec<bool>,
    nullable: Vec<bool>,
    max_chars: Vec<usize>,
    nrow: u64,
    quoted_forces_string: bool,
}

impl RowEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, a non-empty quoted cell is only accepted by [`Decoder::String`].
    pub fn with_quoted_forces_string(mut self, forces: bool) -> Self {
        self.quoted_forces_string = forces;
        self
    }

    /// Number of rows submitted so far.
    pub fn row_count(&self) -> u64 {
        self.nrow
    }

    /// Column count, fixed by the first submitted row; `None` before any row.
    pub fn column_count(&self) -> Option<usize> {
        if self.nrow == 0 {
            None
        } else {
            Some(self.candidates.len())
        }
    }

    /// Fold one row into the running inference.
    ///
    /// Returns a message (without location) if the row's arity differs from the first row's;
    /// callers attach the line number.
    pub fn submit_row(&mut self, row: &[Field]) -> Result<(), String> {
        if self.nrow == 0 {
            let ncol = row.len();
            self.candidates = vec![DecoderSet::all(); ncol];
            self.has_value = vec![false; ncol];
            self.nullable = vec![false; ncol];
            self.max_chars = vec![0; ncol];
        } else if row.len() != self.candidates.len() {
            return Err(format!(
                "Row has {} fields, expected {}",
                row.len(),
                self.candidates.len()
            ));
        }

        for (icol, field) in row.iter().enumerate() {
            if field.is_empty() {
                self.nullable[icol] = true;
                continue;
            }
            self.has_value[icol] = true;
            self.max_chars[icol] = self.max_chars[icol].max(field.text.chars().count());
            if self.quoted_forces_string && field.quoted {
                self.candidates[icol].restrict_to_string();
            } else {
                self.candidates[icol].retain_valid(&field.text);
            }
        }
        self.nrow += 1;
        Ok(())
    }

    /// True if every populated cell of `row` parses under the decoders inferred so far.
    ///
    /// A row of the wrong arity is never a data row.
    pub fn is_data_row(&self, row: &[Field]) -> bool {
        row.len() == self.candidates.len()
            && row
                .iter()
                .enumerate()
                .filter(|(_, f)| !f.is_empty())
                .all(|(icol, f)| self.accepts(self.resolved(icol), f))
    }

    /// Final metadata: synthesized column names, resolved decoders and the row count.
    pub fn metadata(&self) -> TableResult<TableMetadata> {
        if self.nrow == 0 {
            return Err(TableError::NoRows);
        }
        let columns = (0..self.candidates.len())
            .map(|icol| {
                let decoder = self.resolved(icol);
                ColumnInfo {
                    name: ColumnInfo::default_name(icol),
                    decoder,
                    nullable: self.nullable[icol],
                    max_chars: (decoder == Decoder::String).then_some(self.max_chars[icol]),
                }
            })
            .collect();
        Ok(TableMetadata {
            columns,
            row_count: self.nrow,
        })
    }

    /// Columns that never held a value resolve to strings.
    fn resolved(&self, icol: usize) -> Decoder {
        if self.has_value[icol] {
            self.candidates[icol].narrowest()
        } else {
            Decoder::String
        }
    }

    fn accepts(&self, decoder: Decoder, field: &Field) -> bool {
        if self.quoted_forces_string && field.quoted {
            decoder == Decoder::String
        } else {
            decoder.is_valid(&field.text)
        }
    }
}
