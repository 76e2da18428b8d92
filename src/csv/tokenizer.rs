//! Cell tokenizer: splits a byte stream into rows of raw [`Field`]s.
//!
//! Rules:
//!
//! - Fields are separated by [`DELIMITER`]; spaces and tabs around an unquoted field are trimmed.
//! - A field may be enclosed in [`QUOTE`]s; inside, delimiters and line breaks are literal and a
//!   doubled quote stands for one quote character. Quoted text is kept verbatim.
//! - Any run of `\r`/`\n` ends a row, so empty lines never produce rows. A line holding only
//!   spaces or tabs is a row of one empty field.
//! - Content next to a quoted span inside one field is an error ("mixed quoted/unquoted cell"),
//!   as is end of input inside a quoted span.

use std::io::{self, BufRead};

use crate::error::{TableError, TableResult};
use crate::types::Field;

use super::{DELIMITER, QUOTE};

/// Byte reader with a single byte of pushback.
pub(crate) struct PushbackReader<R> {
    inner: R,
    pushed: Option<u8>,
}

impl<R: BufRead> PushbackReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            pushed: None,
        }
    }

    pub(crate) fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.pushed.take() {
            return Ok(Some(b));
        }
        let b = match self.inner.fill_buf()?.first() {
            Some(&b) => b,
            None => return Ok(None),
        };
        self.inner.consume(1);
        Ok(Some(b))
    }

    pub(crate) fn unread(&mut self, b: u8) {
        debug_assert!(self.pushed.is_none(), "only one byte of pushback");
        self.pushed = Some(b);
    }
}

/// Reads rows of raw fields from a buffered byte stream.
pub struct CsvTokenizer<R> {
    input: PushbackReader<R>,
    line: u64,
    row_line: u64,
}

impl<R: BufRead> CsvTokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            input: PushbackReader::new(reader),
            line: 1,
            row_line: 1,
        }
    }

    /// 1-based physical line at which the most recently returned row started.
    pub fn row_line(&self) -> u64 {
        self.row_line
    }

    /// 1-based physical line the tokenizer is currently positioned on.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Read the next row, or `None` at end of input with no partial row pending.
    pub fn read_row(&mut self) -> TableResult<Option<Vec<Field>>> {
        let mut cells: Vec<Field> = Vec::new();
        let mut buf: Vec<u8> = Vec::new();
        let mut after_quote = false;
        let mut started = false;
        self.row_line = self.line;

        loop {
            match self.input.read_byte()? {
                None => {
                    if !after_quote && started {
                        cells.push(Field::unquoted(trimmed(&buf)));
                    }
                    return Ok(if cells.is_empty() { None } else { Some(cells) });
                }
                Some(b @ (b'\r' | b'\n')) => {
                    self.skip_line_breaks(b)?;
                    if !after_quote && started {
                        cells.push(Field::unquoted(trimmed(&buf)));
                    }
                    if !cells.is_empty() {
                        return Ok(Some(cells));
                    }
                    buf.clear();
                    after_quote = false;
                    started = false;
                    self.row_line = self.line;
                }
                Some(DELIMITER) => {
                    if !after_quote {
                        cells.push(Field::unquoted(trimmed(&buf)));
                    }
                    buf.clear();
                    after_quote = false;
                    started = true;
                }
                Some(QUOTE) => {
                    if after_quote || !trimmed(&buf).is_empty() {
                        let shown = if after_quote { "\"".to_string() } else { lossy(&buf) };
                        return Err(TableError::format(
                            format!("Mixed quoted/unquoted cell '{shown}'"),
                            self.line,
                        ));
                    }
                    let text = self.read_quoted()?;
                    cells.push(Field::quoted(text));
                    buf.clear();
                    after_quote = true;
                    started = true;
                }
                Some(b @ (b' ' | b'\t')) => {
                    if !after_quote {
                        buf.push(b);
                    }
                    started = true;
                }
                Some(b) => {
                    if after_quote {
                        return Err(TableError::format(
                            format!("Mixed quoted/unquoted cell '{}'", lossy(&[b])),
                            self.line,
                        ));
                    }
                    buf.push(b);
                    started = true;
                }
            }
        }
    }

    /// Consume the rest of a run of line-break bytes, counting physical lines.
    fn skip_line_breaks(&mut self, first: u8) -> io::Result<()> {
        self.line += 1;
        let mut prev = first;
        loop {
            match self.input.read_byte()? {
                Some(b @ (b'\r' | b'\n')) => {
                    if !(b == b'\n' && prev == b'\r') {
                        self.line += 1;
                    }
                    prev = b;
                }
                Some(b) => {
                    self.input.unread(b);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    /// Read the body of a quoted field; the opening quote has been consumed.
    fn read_quoted(&mut self) -> TableResult<String> {
        let start_line = self.line;
        let mut buf: Vec<u8> = Vec::new();
        let mut prev = 0u8;
        loop {
            match self.input.read_byte()? {
                Some(QUOTE) => match self.input.read_byte()? {
                    Some(QUOTE) => buf.push(QUOTE),
                    Some(other) => {
                        self.input.unread(other);
                        return Ok(lossy(&buf));
                    }
                    None => return Ok(lossy(&buf)),
                },
                Some(b) => {
                    if b == b'\r' || (b == b'\n' && prev != b'\r') {
                        self.line += 1;
                    }
                    buf.push(b);
                    prev = b;
                }
                None => {
                    return Err(TableError::format(
                        "End of file within a string literal",
                        start_line,
                    ));
                }
            }
        }
    }
}

fn trimmed(buf: &[u8]) -> String {
    let start = buf.iter().position(|b| !matches!(b, b' ' | b'\t'));
    match start {
        None => String::new(),
        Some(start) => {
            let end = buf
                .iter()
                .rposition(|b| !matches!(b, b' ' | b'\t'))
                .map_or(buf.len(), |i| i + 1);
            lossy(&buf[start..end])
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
