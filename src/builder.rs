//! Processor builder for file-backed datasets
//!
//! This module provides a builder pattern for wiring a [`FileProcessor`] to a
//! CSV file on disk from a [`Config`].

use crate::dataset::{CsvRowProducer, FileRecordFetcher};
use crate::error::{GeoNearError, Result};
use crate::processor::FileProcessor;
use crate::search::GeoSearchEngine;
use crate::types::Config;
use std::path::PathBuf;

/// Processor reading rows from a CSV file and records from the same file
pub type CsvFileProcessor = FileProcessor<CsvRowProducer, FileRecordFetcher>;

/// Builder for creating processors over a CSV dataset.
///
/// The dataset path can come from [`dataset`](Self::dataset) or from the
/// configuration; the explicit path wins when both are set.
///
/// # Examples
///
/// ```rust
/// use geonear::{ColumnMapping, Config, Point, ProcessorBuilder};
/// use std::io::Write;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut file = tempfile::NamedTempFile::new()?;
/// writeln!(file, "id,lat,lon")?;
/// writeln!(file, "1,48.8566,2.3522")?;
/// writeln!(file, "2,48.8049,2.1204")?;
///
/// let config = Config::default()
///     .with_columns(ColumnMapping::new(1, 2))
///     .with_header(true)
///     .with_max_results(1);
///
/// let mut processor = ProcessorBuilder::new()
///     .dataset(file.path())
///     .config(config)
///     .build()?;
/// processor.preprocess()?;
///
/// let records = processor.process(&Point::new(48.85, 2.35), 30.0)?;
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].as_str(), "1,48.8566,2.3522");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ProcessorBuilder {
    dataset: Option<PathBuf>,
    config: Config,
}

impl ProcessorBuilder {
    /// Create a new builder with default configuration and no dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CSV dataset to index.
    pub fn dataset<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dataset = Some(path.into());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Build the processor. The index itself is built by
    /// [`FileProcessor::preprocess`].
    ///
    /// # Errors
    ///
    /// Returns [`GeoNearError::InvalidConfig`] if the configuration does not
    /// validate or no dataset path was given.
    pub fn build(self) -> Result<CsvFileProcessor> {
        self.config.validate()?;

        let path = self
            .dataset
            .or_else(|| self.config.dataset.clone())
            .ok_or_else(|| GeoNearError::InvalidConfig("no dataset path given".to_string()))?;

        log::debug!("Building processor for {}", path.display());

        let producer = CsvRowProducer::from_config(&path, &self.config);
        let fetcher = FileRecordFetcher::new(path);

        Ok(FileProcessor::new(producer, fetcher)
            .with_engine(GeoSearchEngine::with_max_results(self.config.max_results))
            .with_max_keys_per_node(self.config.max_keys_per_node))
    }
}
