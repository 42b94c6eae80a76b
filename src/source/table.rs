//! Typed reader for tab-separated tables.
//!
//! A table is opened against a declared column schema. Every line is split,
//! counted and coerced before it is handed out; a line that does not fit the
//! schema is a [`Error::MalformedRow`] carrying the table name and line
//! number. Iteration is lazy and single-pass: re-open the table to read it
//! again.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use crate::{Error, Result};

/// Separator for list-valued cells (`a;b;c`).
pub const LIST_SEPARATOR: char = ';';

/// Separator between channel id and score inside a score-list cell (`6:92`).
pub const SCORE_SEPARATOR: char = ':';

// ============================================================================
// Schema
// ============================================================================

/// Declared type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    /// `;`-separated strings; an empty cell is an empty list.
    TextList,
    /// `;`-separated `channel:score` pairs; an empty cell is an empty list.
    ScoreList,
}

/// One coerced cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Integer(i64),
    TextList(Vec<String>),
    ScoreList(Vec<(i64, i64)>),
}

impl ColumnType {
    fn parse(self, raw: &str) -> std::result::Result<Field, String> {
        match self {
            ColumnType::Text => Ok(Field::Text(raw.to_string())),
            ColumnType::Integer => raw.trim().parse::<i64>()
                .map(Field::Integer)
                .map_err(|e| format!("'{raw}' is not an integer ({e})")),
            ColumnType::TextList => Ok(Field::TextList(split_list(raw).map(str::to_string).collect())),
            ColumnType::ScoreList => split_list(raw)
                .map(parse_score_pair)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Field::ScoreList),
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(LIST_SEPARATOR).map(str::trim).filter(|item| !item.is_empty())
}

fn parse_score_pair(item: &str) -> std::result::Result<(i64, i64), String> {
    let (channel, score) = item
        .split_once(SCORE_SEPARATOR)
        .ok_or_else(|| format!("'{item}' is not a channel{SCORE_SEPARATOR}score pair"))?;
    let channel = channel.trim().parse::<i64>()
        .map_err(|e| format!("bad channel id in '{item}' ({e})"))?;
    let score = score.trim().parse::<i64>()
        .map_err(|e| format!("bad score in '{item}' ({e})"))?;
    Ok((channel, score))
}

// ============================================================================
// Row
// ============================================================================

/// A schema-checked line, consumed column by column.
#[derive(Debug)]
pub struct Row {
    table: Arc<str>,
    line: usize,
    fields: std::vec::IntoIter<Field>,
}

impl Row {
    /// 1-based line number in the table file.
    pub fn line(&self) -> usize {
        self.line
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::MalformedRow {
            table: self.table.to_string(),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn next_field(&mut self, expected: &str) -> Result<Field> {
        self.fields
            .next()
            .ok_or_else(|| self.malformed(format!("missing {expected} column")))
    }

    pub fn text(&mut self) -> Result<String> {
        match self.next_field("text")? {
            Field::Text(s) => Ok(s),
            other => Err(self.malformed(format!("expected text column, found {other:?}"))),
        }
    }

    pub fn integer(&mut self) -> Result<i64> {
        match self.next_field("integer")? {
            Field::Integer(i) => Ok(i),
            other => Err(self.malformed(format!("expected integer column, found {other:?}"))),
        }
    }

    pub fn text_list(&mut self) -> Result<Vec<String>> {
        match self.next_field("list")? {
            Field::TextList(items) => Ok(items),
            other => Err(self.malformed(format!("expected list column, found {other:?}"))),
        }
    }

    pub fn score_list(&mut self) -> Result<Vec<(i64, i64)>> {
        match self.next_field("score list")? {
            Field::ScoreList(items) => Ok(items),
            other => Err(self.malformed(format!("expected score list column, found {other:?}"))),
        }
    }

    /// Reject a value that parsed but is out of the column's domain.
    pub fn reject(&self, reason: impl Into<String>) -> Error {
        self.malformed(reason)
    }
}

/// A record type decodable from one table row.
pub trait FromRow: Sized {
    /// Column schema, in file order.
    const COLUMNS: &'static [ColumnType];

    fn from_row(row: &mut Row) -> Result<Self>;
}

// ============================================================================
// TableReader
// ============================================================================

/// Lazy, schema-checked reader over a tab-separated table.
pub struct TableReader<R> {
    reader: R,
    table: Arc<str>,
    columns: Vec<ColumnType>,
    delimiter: char,
    line: usize,
    buf: String,
}

impl TableReader<BufReader<File>> {
    /// Open a table file. The table name used in errors is the file path.
    pub fn open(path: &Path, columns: &[ColumnType], header: bool) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::NotFound(format!("table {}: {e}", path.display()))
        })?;
        Self::new(BufReader::new(file), path.display().to_string(), columns, header)
    }
}

impl<R: BufRead> TableReader<R> {
    /// Wrap a reader. When `header` is set the first line is skipped.
    pub fn new(reader: R, table: impl Into<String>, columns: &[ColumnType], header: bool) -> Result<Self> {
        let mut this = Self {
            reader,
            table: Arc::from(table.into()),
            columns: columns.to_vec(),
            delimiter: '\t',
            line: 0,
            buf: String::new(),
        };
        if header {
            this.read_line()?;
        }
        Ok(this)
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Decode every row as `T`.
    pub fn typed<T: FromRow>(self) -> TypedRows<R, T> {
        TypedRows { rows: self, _marker: PhantomData }
    }

    /// Read the next raw line into `buf`; `false` at end of input.
    fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf)?;
        if n == 0 {
            return Ok(false);
        }
        self.line += 1;
        let trimmed = self.buf.trim_end_matches(['\n', '\r']).len();
        self.buf.truncate(trimmed);
        Ok(true)
    }

    fn parse_line(&self) -> Result<Row> {
        let malformed = |reason: String| Error::MalformedRow {
            table: self.table.to_string(),
            line: self.line,
            reason,
        };

        let cells: Vec<&str> = self.buf.split(self.delimiter).collect();
        if cells.len() != self.columns.len() {
            return Err(malformed(format!(
                "expected {} columns, found {}",
                self.columns.len(),
                cells.len()
            )));
        }

        let fields = cells
            .iter()
            .zip(&self.columns)
            .enumerate()
            .map(|(i, (cell, ty))| ty.parse(cell).map_err(|e| malformed(format!("column {}: {e}", i + 1))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Row {
            table: Arc::clone(&self.table),
            line: self.line,
            fields: fields.into_iter(),
        })
    }
}

impl<R: BufRead> Iterator for TableReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.read_line() {
                Err(e) => return Some(Err(e)),
                Ok(false) => return None,
                // Blank lines (trailing newline at EOF) are not rows.
                Ok(true) if self.buf.is_empty() => continue,
                Ok(true) => return Some(self.parse_line()),
            }
        }
    }
}

/// Typed view over a [`TableReader`].
pub struct TypedRows<R, T> {
    rows: TableReader<R>,
    _marker: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: FromRow> Iterator for TypedRows<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut row = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        let record = T::from_row(&mut row);
        if record.is_ok() && row.fields.len() > 0 {
            return Some(Err(row.malformed(format!("{} unread columns", row.fields.len()))));
        }
        Some(record)
    }
}

/// Open a table file with a header row and decode it as `T`.
pub fn read_table<T: FromRow>(path: &Path) -> Result<TypedRows<BufReader<File>, T>> {
    Ok(TableReader::open(path, T::COLUMNS, true)?.typed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reader<'a>(text: &'a str, columns: &[ColumnType]) -> TableReader<&'a [u8]> {
        TableReader::new(text.as_bytes(), "test.tsv", columns, true).unwrap()
    }

    #[test]
    fn test_header_skipped_and_fields_typed() {
        let text = "id\tcount\tgenes\n\
                    path:hsa04062\t3\tCCR5;CCL5\n\
                    path:hsa04060\t0\t\n";
        let rows: Vec<Row> = reader(text, &[ColumnType::Text, ColumnType::Integer, ColumnType::TextList])
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        let mut first = rows.into_iter().next().unwrap();
        assert_eq!(first.line(), 2);
        assert_eq!(first.text().unwrap(), "path:hsa04062");
        assert_eq!(first.integer().unwrap(), 3);
        assert_eq!(first.text_list().unwrap(), vec!["CCR5".to_string(), "CCL5".to_string()]);
    }

    #[test]
    fn test_empty_list_cell() {
        let mut rows = reader("h\tl\nx\t\n", &[ColumnType::Text, ColumnType::TextList]);
        let mut row = rows.next().unwrap().unwrap();
        row.text().unwrap();
        assert!(row.text_list().unwrap().is_empty());
    }

    #[test]
    fn test_score_list() {
        let mut rows = reader("s\n6:92;10:900;12:906\n", &[ColumnType::ScoreList]);
        let mut row = rows.next().unwrap().unwrap();
        assert_eq!(row.score_list().unwrap(), vec![(6, 92), (10, 900), (12, 906)]);
    }

    #[test]
    fn test_column_count_mismatch() {
        let mut rows = reader("a\tb\nonly-one\n", &[ColumnType::Text, ColumnType::Text]);
        match rows.next().unwrap() {
            Err(Error::MalformedRow { table, line, reason }) => {
                assert_eq!(table, "test.tsv");
                assert_eq!(line, 2);
                assert!(reason.contains("expected 2 columns, found 1"));
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_type_coercion_failure() {
        let mut rows = reader("n\nseven\n", &[ColumnType::Integer]);
        assert!(matches!(rows.next(), Some(Err(Error::MalformedRow { line: 2, .. }))));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let rows: Vec<Row> = reader("a\r\nx\r\n\r\n\ny\n", &[ColumnType::Text])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_header_only_table_is_empty() {
        assert_eq!(reader("id\tname\n", &[ColumnType::Text, ColumnType::Text]).count(), 0);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut rows = reader("a,b\n1,2\n", &[ColumnType::Integer, ColumnType::Integer]).with_delimiter(',');
        let mut row = rows.next().unwrap().unwrap();
        assert_eq!(row.integer().unwrap(), 1);
        assert_eq!(row.integer().unwrap(), 2);
    }
}
