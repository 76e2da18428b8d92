//! CSV output, readable by [`super::CsvTable`].

use std::io::Write;

use crate::error::TableResult;
use crate::source::open_output;
use crate::table::Table;
use crate::types::Value;

use super::{DELIMITER, QUOTE};

/// Longest field, in characters, written without truncation.
pub const MAX_CHARS: usize = 10240;

/// Writes tables as comma-separated values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTableWriter {
    write_header: bool,
    max_chars: usize,
}

impl Default for CsvTableWriter {
    fn default() -> Self {
        Self {
            write_header: true,
            max_chars: MAX_CHARS,
        }
    }
}

impl CsvTableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the first output line holds the column names.
    pub fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    /// Cap on field length; longer values are truncated.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn writes_header(&self) -> bool {
        self.write_header
    }

    pub fn format_name(&self) -> &'static str {
        "CSV"
    }

    /// True for locations ending `.csv` or `.CSV`.
    pub fn looks_like_file(&self, location: &str) -> bool {
        location.ends_with(".csv") || location.ends_with(".CSV")
    }

    /// Write `table` to a file, or to standard output if `location` is `"-"`.
    pub fn write_table(&self, table: &dyn Table, location: &str) -> TableResult<()> {
        let mut out = open_output(location)?;
        self.write_to(table, &mut out)
    }

    /// Write `table` to an arbitrary sink.
    ///
    /// Output already written is left in place if a row fails to read.
    pub fn write_to<W: Write>(&self, table: &dyn Table, mut out: W) -> TableResult<()> {
        let mut cells: Vec<String> = Vec::with_capacity(table.column_count());

        if self.write_header {
            cells.extend(table.columns().iter().map(|c| c.name.clone()));
            write_row(&mut out, &cells)?;
        }

        let mut seq = table.row_sequence()?;
        while seq.next()? {
            cells.clear();
            cells.extend(seq.row().iter().map(|v| self.format_value(v)));
            write_row(&mut out, &cells)?;
        }
        seq.close();
        out.flush()?;
        Ok(())
    }

    fn format_value(&self, value: &Value) -> String {
        let mut text = value.to_string();
        if let Some((cut, _)) = text.char_indices().nth(self.max_chars) {
            text.truncate(cut);
        }
        text
    }
}

fn write_row<W: Write>(out: &mut W, cells: &[String]) -> std::io::Result<()> {
    for (icol, cell) in cells.iter().enumerate() {
        if icol > 0 {
            out.write_all(&[DELIMITER])?;
        }
        write_field(out, cell)?;
    }
    out.write_all(b"\n")
}

/// Write one field, quoting it if it would not otherwise read back unchanged.
fn write_field<W: Write>(out: &mut W, value: &str) -> std::io::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    if !needs_quotes(value) {
        return out.write_all(value.as_bytes());
    }
    out.write_all(&[QUOTE])?;
    for (i, part) in value.split('"').enumerate() {
        if i > 0 {
            out.write_all(&[QUOTE, QUOTE])?;
        }
        out.write_all(part.as_bytes())?;
    }
    out.write_all(&[QUOTE])
}

fn needs_quotes(value: &str) -> bool {
    let edge = |c: Option<char>| matches!(c, Some(' ' | '\t'));
    edge(value.chars().next())
        || edge(value.chars().next_back())
        || value
            .bytes()
            .any(|b| matches!(b, b'\n' | b'\r' | DELIMITER | QUOTE))
}
