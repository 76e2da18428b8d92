//! Core data model: cell values, column decoders and column metadata.
//!
//! A [`Decoder`] is a value-class tag plus a parse rule. Decoders are totally ordered by
//! specificity, and inference only ever moves a column towards the less specific end.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Column decoder: the value class a column's text cells are interpreted as.
///
/// Variants are declared from most to least specific, so the derived ordering is the widening
/// order used by inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decoder {
    /// `true`/`false`/`t`/`f`/`yes`/`no`, case-insensitive.
    Boolean,
    /// Integer fitting in 16 bits.
    Short,
    /// Integer fitting in 32 bits.
    Int,
    /// Integer fitting in 64 bits.
    Long,
    /// Number with at most [`FLOAT_DIGITS`] significant digits, in `f32` range.
    Float,
    /// Any number `f64` can parse, including `NaN` and `inf`.
    Double,
    /// Anything.
    String,
}

/// Maximum significant digits for a value to be accepted by [`Decoder::Float`].
pub const FLOAT_DIGITS: usize = 6;

impl Decoder {
    /// All decoders in widening order.
    pub const ALL: [Decoder; 7] = [
        Decoder::Boolean,
        Decoder::Short,
        Decoder::Int,
        Decoder::Long,
        Decoder::Float,
        Decoder::Double,
        Decoder::String,
    ];

    /// Human-readable name of the value class.
    pub const fn name(self) -> &'static str {
        match self {
            Decoder::Boolean => "boolean",
            Decoder::Short => "short",
            Decoder::Int => "int",
            Decoder::Long => "long",
            Decoder::Float => "float",
            Decoder::Double => "double",
            Decoder::String => "string",
        }
    }

    /// The next less specific decoder, or `None` for [`Decoder::String`].
    pub fn wider(self) -> Option<Self> {
        let pos = Self::ALL.iter().position(|d| *d == self)?;
        Self::ALL.get(pos + 1).copied()
    }

    /// True if `text` (already trimmed, non-empty) parses under this decoder.
    pub fn is_valid(self, text: &str) -> bool {
        self.decode(text).is_some()
    }

    /// Decode non-empty text into a typed value, or `None` if it does not parse.
    pub fn decode(self, text: &str) -> Option<Value> {
        match self {
            Decoder::Boolean => parse_bool(text).map(Value::Boolean),
            Decoder::Short => text.parse::<i16>().ok().map(Value::Short),
            Decoder::Int => text.parse::<i32>().ok().map(Value::Int),
            Decoder::Long => text.parse::<i64>().ok().map(Value::Long),
            Decoder::Float => parse_float(text).map(Value::Float),
            Decoder::Double => text.parse::<f64>().ok().map(Value::Double),
            Decoder::String => Some(Value::String(text.to_owned())),
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// True for integer and floating point classes.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Decoder::Short | Decoder::Int | Decoder::Long | Decoder::Float | Decoder::Double
        )
    }
}

/// The decoders that accepted every value of a column seen so far.
///
/// Boolean does not accept every short, and Float does not accept every long, so a column
/// cannot simply step to the next decoder when a cell fails: it keeps only the decoders that
/// never rejected anything and resolves to the most specific of them. [`Decoder::String`]
/// never leaves the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderSet(u8);

impl DecoderSet {
    /// Every decoder; the state of a column before its first value.
    pub const fn all() -> Self {
        Self((1u8 << Decoder::ALL.len() as u32) - 1)
    }

    /// Only [`Decoder::String`].
    pub const fn string_only() -> Self {
        Self(Decoder::String.bit())
    }

    pub fn contains(self, decoder: Decoder) -> bool {
        self.0 & decoder.bit() != 0
    }

    /// Drop every decoder that rejects `text`.
    pub fn retain_valid(&mut self, text: &str) {
        for decoder in Decoder::ALL {
            if decoder != Decoder::String && self.contains(decoder) && !decoder.is_valid(text) {
                self.0 &= !decoder.bit();
            }
        }
    }

    /// Keep only [`Decoder::String`].
    pub fn restrict_to_string(&mut self) {
        *self = Self::string_only();
    }

    /// The most specific remaining decoder.
    pub fn narrowest(self) -> Decoder {
        Decoder::ALL
            .into_iter()
            .find(|d| self.contains(*d))
            .unwrap_or(Decoder::String)
    }
}

impl Default for DecoderSet {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" => Some(true),
        "false" | "f" | "no" => Some(false),
        _ => None,
    }
}

fn parse_float(s: &str) -> Option<f32> {
    if significant_digits(s)? > FLOAT_DIGITS {
        return None;
    }
    let v = s.parse::<f64>().ok()?;
    let mag = v.abs();
    if !v.is_finite() || mag > f32::MAX as f64 || (mag != 0.0 && mag < f32::MIN_POSITIVE as f64) {
        return None;
    }
    Some(v as f32)
}

/// Count significant digits of a plain decimal/exponent literal; `None` if it is not one.
fn significant_digits(s: &str) -> Option<usize> {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let mantissa = match unsigned.find(['e', 'E']) {
        Some(i) => &unsigned[..i],
        None => unsigned,
    };
    if mantissa.matches('.').count() > 1 {
        return None;
    }
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sig = digits.trim_start_matches('0').trim_end_matches('0').len();
    Some(sig.max(1))
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    Boolean(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value; `None` for null, boolean and string cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Short(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Null | Value::Boolean(_) | Value::String(_) => None,
        }
    }
}

/// Formats the value so that re-reading the text yields an equal value; null is empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

/// One raw cell produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Field {
    /// Cell text: trimmed if unquoted, verbatim if quoted.
    pub text: String,
    /// Whether the cell was enclosed in quotes.
    pub quoted: bool,
}

impl Field {
    pub fn unquoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }

    /// Empty cells are nulls.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name, from a header row or synthesized as `col1`..`colN`.
    pub name: String,
    /// Resolved decoder.
    pub decoder: Decoder,
    /// True if any empty cell was observed.
    pub nullable: bool,
    /// Longest cell seen, in characters, for string columns.
    pub max_chars: Option<usize>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, decoder: Decoder) -> Self {
        Self {
            name: name.into(),
            decoder,
            nullable: true,
            max_chars: None,
        }
    }

    /// Default name for the column at zero-based `icol`.
    pub fn default_name(icol: usize) -> String {
        format!("col{}", icol + 1)
    }
}

/// Result of an inference pass: fixed column layout plus the number of data rows seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
}

impl TableMetadata {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn decoders(&self) -> impl Iterator<Item = Decoder> + '_ {
        self.columns.iter().map(|c| c.decoder)
    }
}

/// In-memory table.
///
/// Rows are stored as `Vec<Vec<Value>>` in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
