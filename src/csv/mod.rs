//! Comma-separated values, in the dialect spoken by common spreadsheet programs.
//!
//! - [`tokenizer`]: raw fields per row, honouring quoting
//! - [`evaluator`]: per-column decoder inference over a row stream
//! - [`table`]: two-pass streaming table with header detection
//! - [`writer`]: the inverse direction, re-escaping as needed
//!
//! ## Example: read, then write back
//!
//! ```rust
//! use tabstream::csv::{CsvTable, CsvTableWriter};
//! use tabstream::source::BytesSource;
//! use tabstream::table::Table;
//! use tabstream::types::Decoder;
//!
//! # fn main() -> Result<(), tabstream::TableError> {
//! let src = BytesSource::from_text("people.csv", "name,age\nAda,36\n\"Lovelace, A\",\n");
//! let table = CsvTable::from_source(src)?;
//! assert_eq!(table.columns()[1].decoder, Decoder::Short);
//!
//! let mut out = Vec::new();
//! CsvTableWriter::new().write_to(&table, &mut out)?;
//! assert_eq!(String::from_utf8(out).unwrap(), "name,age\nAda,36\n\"Lovelace, A\",\n");
//! # Ok(())
//! # }
//! ```

pub mod evaluator;
pub mod table;
pub mod tokenizer;
pub mod writer;

pub use evaluator::RowEvaluator;
pub use table::{CsvOptions, CsvRowSequence, CsvTable};
pub use tokenizer::CsvTokenizer;
pub use writer::CsvTableWriter;

/// Field separator.
pub const DELIMITER: u8 = b',';

/// Field quote character; doubled inside a quoted field to stand for itself.
pub const QUOTE: u8 = b'"';
