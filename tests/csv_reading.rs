use std::sync::Arc;

use tabstream::csv::{CsvOptions, CsvTable};
use tabstream::source::{BytesSource, FileSource};
use tabstream::table::{RowSequence, Table};
use tabstream::types::{Decoder, RowSet, Value};
use tabstream::TableError;

fn from_text(text: &str) -> Result<CsvTable, TableError> {
    CsvTable::from_source(BytesSource::from_text("inline", text))
}

fn strings(table: &CsvTable) -> Vec<Vec<String>> {
    RowSet::collect(table)
        .unwrap()
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect()
}

fn decoders(table: &CsvTable) -> Vec<Decoder> {
    table.columns().iter().map(|c| c.decoder).collect()
}

#[test]
fn reads_people_fixture() {
    let table = CsvTable::from_source(FileSource::new("tests/fixtures/people.csv")).unwrap();

    let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "score", "active"]);
    assert_eq!(
        decoders(&table),
        [Decoder::Short, Decoder::String, Decoder::Float, Decoder::Boolean]
    );
    assert_eq!(table.row_count(), Some(3));

    let rows = RowSet::collect(&table).unwrap().rows;
    assert_eq!(
        rows[1],
        vec![
            Value::Short(2),
            Value::String("Lovelace, Augusta".to_string()),
            Value::Float(87.25),
            Value::Boolean(false),
        ]
    );
    assert_eq!(
        rows[2],
        vec![Value::Short(3), Value::Null, Value::Null, Value::Boolean(true)]
    );
    assert!(table.columns()[1].nullable);
}

#[test]
fn later_rows_widen_earlier_columns() {
    let table = CsvTable::from_source(FileSource::new("tests/fixtures/widening.csv")).unwrap();
    assert_eq!(decoders(&table), [Decoder::Double, Decoder::Boolean]);
    assert!(!table.skips_first_row());

    let rows = RowSet::collect(&table).unwrap().rows;
    let xs: Vec<_> = rows.iter().map(|r| r[0].clone()).collect();
    assert_eq!(
        xs,
        [1.0, 2.0, 70000.0, 3.5, 5e300].map(Value::Double).to_vec()
    );
}

#[test]
fn widened_columns_still_read_every_row() {
    // A text column accepts the first row too, so it is data.
    let flags = from_text("flag\nyes\n5\n").unwrap();
    assert_eq!(decoders(&flags), [Decoder::String]);
    assert_eq!(strings(&flags), [["flag"], ["yes"], ["5"]]);

    let wide = from_text("v\n1234567\n1.5\n").unwrap();
    assert_eq!(decoders(&wide), [Decoder::Double]);
    assert_eq!(wide.columns()[0].name, "v");
    assert_eq!(
        RowSet::collect(&wide).unwrap().rows,
        [vec![Value::Double(1234567.0)], vec![Value::Double(1.5)]]
    );

    let long = from_text("v\n123456789012\n2.5\n").unwrap();
    assert_eq!(decoders(&long), [Decoder::Double]);
    assert_eq!(strings(&long), [["123456789012"], ["2.5"]]);
}

#[test]
fn comment_first_row_with_wrong_arity_is_skipped() {
    let table = CsvTable::from_source(FileSource::new("tests/fixtures/lightcurve.csv")).unwrap();
    assert!(table.skips_first_row());
    assert_eq!(table.row_count(), Some(6));
    assert_eq!(
        decoders(&table),
        [Decoder::Float, Decoder::Short, Decoder::Float]
    );
    assert_eq!(table.columns()[0].name, "col1");
    assert_eq!(strings(&table)[4], ["1.5", "", "1"]);
}

#[test]
fn header_detection_examples() {
    let data = from_text("1,2\n3,4\n").unwrap();
    assert_eq!(data.row_count(), Some(2));
    assert_eq!(data.columns()[0].name, "col1");

    let header = from_text("a,b\n3,4\n").unwrap();
    assert_eq!(header.row_count(), Some(1));
    assert_eq!(strings(&header), [["3", "4"]]);
    assert_eq!(header.columns()[1].name, "b");
}

#[test]
fn one_non_conforming_cell_makes_a_header() {
    let table = from_text("x,2\n1,3\n5,7\n").unwrap();
    let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["x", "2"]);
    assert_eq!(table.row_count(), Some(2));
}

#[test]
fn blank_header_cells_keep_synthesized_names() {
    let table = from_text("time, ,flux\n1,2,3\n4,5,6\n").unwrap();
    let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["time", "col2", "flux"]);
}

#[test]
fn quoting_edge_cases() {
    let table = from_text("a,\"b,c\",d\nx,y,z\n").unwrap();
    assert_eq!(strings(&table), [["a", "b,c", "d"], ["x", "y", "z"]]);

    let table = from_text("\"he said \"\"hi\"\"\"\nplain\n").unwrap();
    assert_eq!(strings(&table)[0], ["he said \"hi\""]);

    let err = from_text("x\n\"abc").unwrap_err();
    assert!(matches!(err, TableError::Format { line: 2, .. }), "{err}");
}

#[test]
fn quoted_line_breaks_and_crlf() {
    // Every column is text, so the first row is data too.
    let table = from_text("name,note\r\nAda,\"line one\r\nline two\"\r\n\r\nBob,plain\r\n").unwrap();
    assert_eq!(
        strings(&table),
        [["name", "note"], ["Ada", "line one\r\nline two"], ["Bob", "plain"]]
    );
}

#[test]
fn empty_input_is_no_rows() {
    assert!(matches!(from_text(""), Err(TableError::NoRows)));
    assert!(matches!(from_text("\n  \n\n"), Err(TableError::NoRows)));
    assert!(matches!(from_text("id,name\n"), Err(TableError::NoRows)));
}

#[test]
fn inconsistent_arity_reports_line() {
    let err = from_text("a,b\n1,2\n\n3,4,5\n").unwrap_err();
    assert_eq!(err.to_string(), "Row has 3 fields, expected 2 at line 4");
    assert!(err.is_format_error());
}

#[test]
fn whitespace_only_line_is_a_null_row() {
    let table = from_text("v\n1\n   \n3\n").unwrap();
    assert_eq!(table.row_count(), Some(3));
    assert_eq!(
        RowSet::collect(&table).unwrap().rows,
        [vec![Value::Short(1)], vec![Value::Null], vec![Value::Short(3)]]
    );
    assert!(table.columns()[0].nullable);

    let err = from_text("a,b\n1,2\n \t \n3,4\n").unwrap_err();
    assert_eq!(err.to_string(), "Row has 1 fields, expected 2 at line 3");
}

#[test]
fn quoted_numbers_can_be_forced_to_strings() {
    let text = "code,n\n\"007\",1\n\"042\",2\n";
    let relaxed = from_text(text).unwrap();
    assert_eq!(relaxed.columns()[0].decoder, Decoder::Short);

    let source = Arc::new(BytesSource::from_text("inline", text));
    let strict = CsvTable::open(
        source,
        CsvOptions {
            quoted_forces_string: true,
        },
    )
    .unwrap();
    assert_eq!(strict.columns()[0].decoder, Decoder::String);
    assert_eq!(strings(&strict)[0], ["007", "1"]);
}

#[test]
fn concurrent_cursors_are_independent() {
    let table = from_text("n\n1\n2\n3\n").unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..3)
            .map(|_| {
                s.spawn(|| {
                    let mut seq = table.row_sequence().unwrap();
                    let mut total = 0.0;
                    while seq.next().unwrap() {
                        total += seq.cell(0).unwrap().as_f64().unwrap();
                    }
                    total
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 6.0);
        }
    });
}

#[test]
fn closed_cursor_fails_fast() {
    let table = from_text("n\n1\n2\n").unwrap();
    let mut seq = table.row_sequence().unwrap();
    assert!(seq.next().unwrap());
    seq.close();
    seq.close();
    assert!(matches!(seq.next(), Err(TableError::Closed)));
    assert!(seq.row().is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let err = CsvTable::from_source(FileSource::new("tests/fixtures/absent.csv")).unwrap_err();
    assert!(matches!(err, TableError::Io(_)));
}
