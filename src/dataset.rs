//! Dataset access: turning CSV rows into indexable tuples and reading a
//! record back from its byte offset.

use crate::error::{GeoNearError, Result};
use crate::spatial::Point;
use crate::types::{ColumnMapping, Config};
use bytes::Bytes;
use csv::{ByteRecord, ReaderBuilder, Trim};
use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// One parsed dataset row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    /// Byte position of the row's first byte in the dataset
    pub offset: u64,
}

impl Row {
    pub fn point(&self) -> Point {
        Point::with_offset(self.latitude, self.longitude, self.offset)
    }
}

/// Source of rows to index
pub trait RowProducer {
    type Rows: Iterator<Item = Result<Row>>;

    fn rows(&self) -> Result<Self::Rows>;
}

/// Resolves byte offsets back to raw records
pub trait RecordFetcher {
    /// Returns one record per offset, in the order given.
    fn fetch(&self, offsets: &[u64]) -> Result<Vec<Record>>;
}

/// A raw dataset line, without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub offset: u64,
    pub raw: Bytes,
}

impl Record {
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

fn parse_coordinate(record: &ByteRecord, column: usize, line: u64) -> Result<f64> {
    let raw = record
        .get(column)
        .ok_or(GeoNearError::MissingColumn { line, column })?;
    let value = String::from_utf8_lossy(raw);
    let value = value.trim();

    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(GeoNearError::Parse {
            line,
            column,
            value: value.to_string(),
        }),
    }
}

/// Parses the mapped columns of one CSV record into a [`Row`].
pub fn parse_row(
    record: &ByteRecord,
    line: u64,
    offset: u64,
    columns: &ColumnMapping,
) -> Result<Row> {
    let latitude = parse_coordinate(record, columns.latitude, line)?;
    let longitude = parse_coordinate(record, columns.longitude, line)?;
    let elevation = match columns.elevation {
        Some(column) => Some(parse_coordinate(record, column, line)?),
        None => None,
    };

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(GeoNearError::CoordinateOutOfRange {
            line,
            latitude,
            longitude,
        });
    }

    Ok(Row {
        latitude,
        longitude,
        elevation,
        offset,
    })
}

fn reader_builder(has_header: bool) -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(has_header)
        .flexible(true)
        .trim(Trim::All);
    builder
}

/// Streaming iterator over the rows of a CSV source
pub struct CsvRows<R> {
    reader: csv::Reader<R>,
    columns: ColumnMapping,
    skip_invalid_rows: bool,
    record: ByteRecord,
}

impl<R: Read> CsvRows<R> {
    /// With `has_header` set the first record is consumed as a header; its
    /// bytes still count towards the offsets of the rows that follow.
    pub fn new(reader: R, columns: ColumnMapping, has_header: bool) -> Self {
        Self {
            reader: reader_builder(has_header).from_reader(reader),
            columns,
            skip_invalid_rows: false,
            record: ByteRecord::new(),
        }
    }

    pub fn with_skip_invalid_rows(mut self, skip: bool) -> Self {
        self.skip_invalid_rows = skip;
        self
    }
}

impl<R: Read> Iterator for CsvRows<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => return Some(Err(err.into())),
            }

            // Whitespace-only lines
            if self.record.iter().all(|field| field.is_empty()) {
                continue;
            }

            let (line, offset) = self
                .record
                .position()
                .map_or((0, 0), |pos| (pos.line(), pos.byte()));

            match parse_row(&self.record, line, offset, &self.columns) {
                Ok(row) => return Some(Ok(row)),
                Err(err) if self.skip_invalid_rows => {
                    log::warn!("Skipping invalid row: {}", err);
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Reads rows from a CSV file on disk
#[derive(Debug, Clone)]
pub struct CsvRowProducer {
    path: PathBuf,
    columns: ColumnMapping,
    has_header: bool,
    skip_invalid_rows: bool,
}

impl CsvRowProducer {
    pub fn new<P: Into<PathBuf>>(path: P, columns: ColumnMapping) -> Self {
        Self {
            path: path.into(),
            columns,
            has_header: false,
            skip_invalid_rows: false,
        }
    }

    pub fn from_config<P: Into<PathBuf>>(path: P, config: &Config) -> Self {
        Self::new(path, config.columns)
            .with_header(config.has_header)
            .with_skip_invalid_rows(config.skip_invalid_rows)
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_skip_invalid_rows(mut self, skip: bool) -> Self {
        self.skip_invalid_rows = skip;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowProducer for CsvRowProducer {
    type Rows = CsvRows<File>;

    fn rows(&self) -> Result<Self::Rows> {
        let file = File::open(&self.path)?;
        Ok(CsvRows::new(file, self.columns, self.has_header)
            .with_skip_invalid_rows(self.skip_invalid_rows))
    }
}

/// Random-access reader over the dataset file
#[derive(Debug, Clone)]
pub struct FileRecordFetcher {
    path: PathBuf,
}

impl FileRecordFetcher {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordFetcher for FileRecordFetcher {
    fn fetch(&self, offsets: &[u64]) -> Result<Vec<Record>> {
        if offsets.is_empty() {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)?;
        let mut records = Vec::with_capacity(offsets.len());
        let mut record = ByteRecord::new();

        for &offset in offsets {
            // Let the CSV reader find where the record ends, quoted line
            // breaks included, then read its raw bytes back.
            file.seek(SeekFrom::Start(offset))?;
            let length = {
                let mut reader = reader_builder(false).from_reader(&mut file);
                reader.read_byte_record(&mut record)?;
                reader.position().byte()
            };

            let mut raw = vec![0u8; length as usize];
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut raw)?;

            while matches!(raw.last(), Some(b'\n' | b'\r')) {
                raw.pop();
            }

            records.push(Record {
                offset,
                raw: Bytes::from(raw),
            });
        }

        Ok(records)
    }
}
