//! `tabstream` reads comma-separated text as a typed, streaming table and aggregates numeric
//! columns into histogram bins.
//!
//! Nothing is held in memory beyond one row at a time: a [`csv::CsvTable`] makes one pass over
//! its [`source::DataSource`] to infer a [`types::Decoder`] per column and decide whether the
//! first row is a header, then re-opens the source for every row cursor it hands out.
//!
//! ## What gets inferred
//!
//! Every column starts at the most specific decoder and only ever widens:
//!
//! `boolean < short < int < long < float < double < string`
//!
//! Empty cells are nulls and never force widening. A column that never held a value reads as
//! strings. If every populated cell of the first row already fits the inferred decoders, the row
//! is data and columns are named `col1`, `col2`, ...; otherwise it supplies the column names.
//!
//! ## Quick example: read, bin, write
//!
//! ```rust
//! use tabstream::binning::{read_bins, BinSpec, BinTable, Combiner, Normalisation};
//! use tabstream::csv::{CsvTable, CsvTableWriter};
//! use tabstream::source::BytesSource;
//! use tabstream::table::Table;
//!
//! # fn main() -> Result<(), tabstream::TableError> {
//! let text = "t,flux\n0.5,2\n0.75,4\n1.5,10\n";
//! let table = CsvTable::from_source(BytesSource::from_text("flux.csv", text))?;
//! assert_eq!(table.row_count(), Some(3));
//!
//! let spec = BinSpec::linear(1.0).with_combiner(Combiner::Mean);
//! let bag = read_bins(&table, 0, Some(1), spec, 0.0)?;
//! let bins = BinTable::new(&bag, true, false, Normalisation::None);
//!
//! let mut out = Vec::new();
//! CsvTableWriter::new().write_to(&bins, &mut out)?;
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     "XMID,Y_MEAN,XLOW,XHIGH\n0.5,3,0,1\n1.5,10,1,2\n"
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`csv`]: tokenizer, decoder inference, the streaming table and the writer
//! - [`loader`]: [`loader::load_csv`], with observer reporting ([`observability`])
//! - [`table`]: the [`table::Table`] / [`table::RowSequence`] interface every table implements
//! - [`types`]: values, decoders and column metadata
//! - [`binning`]: histogram bin aggregation and bin tables
//! - [`execution`]: parallel binning on a thread pool
//! - [`error`]: the error type shared by all of the above

pub mod binning;
pub mod csv;
pub mod error;
pub mod execution;
pub mod loader;
pub mod observability;
pub mod source;
pub mod table;
pub mod types;

pub use error::{TableError, TableResult};
