//! Two-pass streaming CSV table.
//!
//! Opening a [`CsvTable`] reads the whole input once to infer column decoders, because a
//! column's type cannot be trusted until every row has been seen (an integer column that turns
//! out to hold one float must be read back as float from the first row). The open call is
//! therefore linear in the input size. Each [`CsvTable::row_sequence`] then reopens the source
//! and decodes rows with the resolved decoders.
//!
//! Header detection happens after inference, on the first physical row:
//!
//! - wrong arity: the row is skipped as a comment
//! - every populated cell parses under its column's decoder: the row is data
//! - otherwise: the row is a header, and its non-blank cells name the columns

use std::io::{BufReader, Read};
use std::sync::Arc;

use tracing::debug;

use crate::error::{TableError, TableResult};
use crate::source::DataSource;
use crate::table::{RowSequence, Table};
use crate::types::{ColumnInfo, Field, TableMetadata, Value};

use super::evaluator::RowEvaluator;
use super::tokenizer::CsvTokenizer;

type SourceTokenizer = CsvTokenizer<BufReader<Box<dyn Read + Send>>>;

/// Options controlling how CSV text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvOptions {
    /// Treat non-empty quoted cells as strings even if they look numeric.
    ///
    /// Off by default: spreadsheet programs quote cells freely.
    pub quoted_forces_string: bool,
}

/// A CSV table backed by a re-openable [`DataSource`].
pub struct CsvTable {
    source: Arc<dyn DataSource>,
    columns: Vec<ColumnInfo>,
    row_count: u64,
    skip_first_row: bool,
}

impl std::fmt::Debug for CsvTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvTable")
            .field("source", &self.source.name())
            .field("columns", &self.columns)
            .field("row_count", &self.row_count)
            .field("skip_first_row", &self.skip_first_row)
            .finish()
    }
}

impl CsvTable {
    /// Open a table with default [`CsvOptions`].
    pub fn from_source(source: impl DataSource + 'static) -> TableResult<Self> {
        Self::open(Arc::new(source), CsvOptions::default())
    }

    /// Open a table, running the inference pass before returning.
    pub fn open(source: Arc<dyn DataSource>, options: CsvOptions) -> TableResult<Self> {
        let (meta, skip_first_row) = obtain_metadata(source.as_ref(), options)?;
        debug!(
            source = %source.name(),
            columns = meta.column_count(),
            rows = meta.row_count,
            skip_first_row,
            "inferred csv table metadata"
        );
        Ok(Self {
            source,
            columns: meta.columns,
            row_count: meta.row_count,
            skip_first_row,
        })
    }

    /// Name of the underlying source.
    pub fn source_name(&self) -> String {
        self.source.name()
    }

    /// True if the first physical row is not data (a header or a skipped comment row).
    pub fn skips_first_row(&self) -> bool {
        self.skip_first_row
    }

    fn open_tokenizer(&self) -> TableResult<SourceTokenizer> {
        let mut tokenizer = CsvTokenizer::new(BufReader::new(self.source.open()?));
        if self.skip_first_row {
            tokenizer.read_row()?;
        }
        Ok(tokenizer)
    }
}

fn obtain_metadata(source: &dyn DataSource, options: CsvOptions) -> TableResult<(TableMetadata, bool)> {
    let mut tokenizer = CsvTokenizer::new(BufReader::new(source.open()?));
    let Some(row0) = tokenizer.read_row()? else {
        return Err(TableError::NoRows);
    };

    let mut evaluator = RowEvaluator::new().with_quoted_forces_string(options.quoted_forces_string);
    while let Some(row) = tokenizer.read_row()? {
        evaluator
            .submit_row(&row)
            .map_err(|message| TableError::format(message, tokenizer.row_line()))?;
    }
    drop(tokenizer);

    let meta = evaluator.metadata()?;
    if row0.len() != meta.column_count() {
        debug!(fields = row0.len(), "first row has wrong arity; skipping it");
        return Ok((meta, true));
    }

    if evaluator.is_data_row(&row0) {
        evaluator
            .submit_row(&row0)
            .map_err(|message| TableError::format(message, 1))?;
        return Ok((evaluator.metadata()?, false));
    }

    debug!("first row is a header");
    let mut meta = meta;
    for (column, cell) in meta.columns.iter_mut().zip(&row0) {
        if !cell.text.trim().is_empty() {
            column.name = cell.text.clone();
        }
    }
    Ok((meta, true))
}

impl Table for CsvTable {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.row_count)
    }

    fn row_sequence(&self) -> TableResult<Box<dyn RowSequence + '_>> {
        Ok(Box::new(CsvRowSequence {
            columns: &self.columns,
            tokenizer: Some(self.open_tokenizer()?),
            row: Vec::with_capacity(self.columns.len()),
        }))
    }
}

/// Cursor over the decoded rows of a [`CsvTable`]; owns its own stream handle.
pub struct CsvRowSequence<'a> {
    columns: &'a [ColumnInfo],
    tokenizer: Option<SourceTokenizer>,
    row: Vec<Value>,
}

impl RowSequence for CsvRowSequence<'_> {
    fn next(&mut self) -> TableResult<bool> {
        let tokenizer = self.tokenizer.as_mut().ok_or(TableError::Closed)?;
        self.row.clear();
        let Some(fields) = tokenizer.read_row()? else {
            return Ok(false);
        };

        let line = tokenizer.row_line();
        if fields.len() != self.columns.len() {
            return Err(TableError::format(
                format!("Row has {} fields, expected {}", fields.len(), self.columns.len()),
                line,
            ));
        }
        for (field, column) in fields.iter().zip(self.columns) {
            self.row.push(decode_cell(field, column, line)?);
        }
        Ok(true)
    }

    fn row(&self) -> &[Value] {
        &self.row
    }

    fn close(&mut self) {
        self.tokenizer = None;
        self.row.clear();
    }
}

fn decode_cell(field: &Field, column: &ColumnInfo, line: u64) -> TableResult<Value> {
    if field.is_empty() {
        return Ok(Value::Null);
    }
    column
        .decoder
        .decode(&field.text)
        .ok_or_else(|| TableError::Decode {
            line,
            column: column.name.clone(),
            decoder: column.decoder.name(),
            raw: field.text.clone(),
        })
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{CsvOptions, CsvTable};
    use crate::error::TableError;
    use crate::source::{BytesSource, DataSource};
    use crate::table::Table;
    use crate::types::{Decoder, RowSet, Value};

    fn open(text: &str) -> CsvTable {
        CsvTable::from_source(BytesSource::from_text("test", text)).unwrap()
    }

    fn open_err(text: &str) -> TableError {
        CsvTable::from_source(BytesSource::from_text("test", text)).unwrap_err()
    }

    fn names(table: &CsvTable) -> Vec<String> {
        table.columns().iter().map(|c| c.name.clone()).collect()
    }

    #[test]
    fn numeric_first_row_is_data() {
        let table = open("1,2\n3,4\n");
        assert_eq!(names(&table), vec!["col1", "col2"]);
        assert_eq!(table.row_count(), Some(2));
        let rows = RowSet::collect(&table).unwrap().rows;
        assert_eq!(
            rows,
            vec![
                vec![Value::Short(1), Value::Short(2)],
                vec![Value::Short(3), Value::Short(4)]
            ]
        );
    }

    #[test]
    fn non_conforming_first_row_is_header() {
        let table = open("a,b\n3,4\n");
        assert_eq!(names(&table), vec!["a", "b"]);
        assert_eq!(table.row_count(), Some(1));
        assert!(table.skips_first_row());
        assert_eq!(
            RowSet::collect(&table).unwrap().rows,
            vec![vec![Value::Short(3), Value::Short(4)]]
        );
    }

    #[test]
    fn one_bad_cell_is_enough_for_header() {
        let table = open("1,b\n3,4\n5,6\n");
        assert_eq!(names(&table), vec!["1", "b"]);
        assert_eq!(table.row_count(), Some(2));
    }

    #[test]
    fn blank_header_cell_keeps_synthesized_name() {
        let table = open("x,  ,z\n1,2,3\n");
        assert_eq!(names(&table), vec!["x", "col2", "z"]);
    }

    #[test]
    fn first_row_with_wrong_arity_is_skipped() {
        let table = open("# comment\n1,2\n3,4\n");
        assert_eq!(names(&table), vec!["col1", "col2"]);
        assert_eq!(RowSet::collect(&table).unwrap().row_count(), 2);
    }

    #[test]
    fn later_float_widens_earlier_rows() {
        let table = open("x\n1\n2\n2.5\n");
        assert_eq!(table.columns()[0].decoder, Decoder::Float);
        let rows = RowSet::collect(&table).unwrap().rows;
        assert_eq!(rows[0], vec![Value::Float(1.0)]);
        assert_eq!(rows[2], vec![Value::Float(2.5)]);
    }

    #[test]
    fn empty_cells_decode_to_null() {
        let table = open("a,b\n1,\n,x\n");
        assert!(table.columns()[0].nullable);
        let rows = RowSet::collect(&table).unwrap().rows;
        assert_eq!(rows[0], vec![Value::Short(1), Value::Null]);
        assert_eq!(rows[1], vec![Value::Null, Value::String("x".into())]);
    }

    #[test]
    fn no_data_rows_is_an_error() {
        assert!(matches!(open_err(""), TableError::NoRows));
        assert!(matches!(open_err("\n\n"), TableError::NoRows));
        assert!(matches!(open_err("a,b\n"), TableError::NoRows));
    }

    #[test]
    fn arity_mismatch_reports_line() {
        let err = open_err("a,b\n1,2\n\n3,4,5\n");
        assert_eq!(err.to_string(), "Row has 3 fields, expected 2 at line 4");
    }

    #[test]
    fn quoted_forcing_is_configurable() {
        let src = Arc::new(BytesSource::from_text("q", "id\n\"1\"\n\"2\"\n"));
        let lenient = CsvTable::open(src.clone(), CsvOptions::default()).unwrap();
        assert_eq!(lenient.columns()[0].decoder, Decoder::Short);
        let strict = CsvTable::open(
            src,
            CsvOptions {
                quoted_forces_string: true,
            },
        )
        .unwrap();
        assert_eq!(strict.columns()[0].decoder, Decoder::String);
        // Every cell is a valid string, so the first row is data.
        assert_eq!(strict.columns()[0].name, "col1");
        assert_eq!(strict.row_count(), Some(3));
    }

    #[test]
    fn cursors_are_independent() {
        let table = open("v\n1\n2\n3\n");
        let mut a = table.row_sequence().unwrap();
        let mut b = table.row_sequence().unwrap();
        assert!(a.next().unwrap());
        assert!(a.next().unwrap());
        assert!(b.next().unwrap());
        assert_eq!(a.cell(0).unwrap(), &Value::Short(2));
        assert_eq!(b.cell(0).unwrap(), &Value::Short(1));
    }

    #[test]
    fn close_is_idempotent_and_fails_fast() {
        let table = open("v\n1\n");
        let mut seq = table.row_sequence().unwrap();
        assert!(seq.next().unwrap());
        seq.close();
        seq.close();
        assert!(seq.row().is_empty());
        assert!(matches!(seq.next(), Err(TableError::Closed)));
    }

    /// Serves different content on the second open, as a misbehaving source would.
    struct ChangingSource {
        opens: AtomicUsize,
    }

    impl DataSource for ChangingSource {
        fn open(&self) -> io::Result<Box<dyn Read + Send>> {
            let text: &'static str = if self.opens.fetch_add(1, Ordering::SeqCst) == 0 {
                "n\n1\n2\n"
            } else {
                "n\n1\nzz\n"
            };
            Ok(Box::new(text.as_bytes()))
        }

        fn name(&self) -> String {
            "changing".to_string()
        }
    }

    #[test]
    fn second_pass_decode_failure_is_fatal() {
        let table = CsvTable::from_source(ChangingSource {
            opens: AtomicUsize::new(0),
        })
        .unwrap();
        let err = RowSet::collect(&table).unwrap_err();
        match err {
            TableError::Decode {
                line, column, raw, ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "n");
                assert_eq!(raw, "zz");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
