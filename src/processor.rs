//! Build-once, query-many orchestration
//!
//! [`FileProcessor`] ties the row producer, the R-tree, the search engine and
//! the record fetcher together. The index is built by [`FileProcessor::preprocess`]
//! and is read-only afterwards, so a processor can be shared between threads
//! for querying.

use crate::dataset::{Record, RecordFetcher, RowProducer};
use crate::error::{GeoNearError, Result};
use crate::index::RTree;
use crate::search::GeoSearchEngine;
use crate::spatial::Point;
use std::time::Instant;

/// Builds an index from `(latitude, longitude, offset)` tuples, inserting
/// them in order with the default fan-out.
pub fn build_index<I>(points: I) -> RTree
where
    I: IntoIterator<Item = (f64, f64, u64)>,
{
    build_index_with(points, RTree::DEFAULT_MAX_KEYS_PER_NODE)
}

/// Same as [`build_index`] with an explicit maximum number of children per node.
pub fn build_index_with<I>(points: I, max_keys_per_node: usize) -> RTree
where
    I: IntoIterator<Item = (f64, f64, u64)>,
{
    let mut tree = RTree::new(max_keys_per_node);
    for (latitude, longitude, offset) in points {
        tree.insert(Point::with_offset(latitude, longitude, offset));
    }
    tree
}

/// Indexes a dataset once and answers radius queries against it.
///
/// # Examples
///
/// ```rust
/// use geonear::{ColumnMapping, CsvRowProducer, FileProcessor, FileRecordFetcher, Point};
/// use std::io::Write;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut file = tempfile::NamedTempFile::new()?;
/// writeln!(file, "Null Island,0.0,0.0")?;
/// writeln!(file, "Nearby,0.0,0.5")?;
/// writeln!(file, "Far away,45.0,45.0")?;
///
/// let columns = ColumnMapping::new(1, 2);
/// let mut processor = FileProcessor::new(
///     CsvRowProducer::new(file.path(), columns),
///     FileRecordFetcher::new(file.path()),
/// );
/// processor.preprocess()?;
///
/// let records = processor.process(&Point::new(0.0, 0.0), 100.0)?;
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].as_str(), "Null Island,0.0,0.0");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileProcessor<P, F> {
    producer: P,
    fetcher: F,
    engine: GeoSearchEngine,
    max_keys_per_node: usize,
    index: Option<RTree>,
}

impl<P: RowProducer, F: RecordFetcher> FileProcessor<P, F> {
    pub fn new(producer: P, fetcher: F) -> Self {
        Self {
            producer,
            fetcher,
            engine: GeoSearchEngine::new(),
            max_keys_per_node: RTree::DEFAULT_MAX_KEYS_PER_NODE,
            index: None,
        }
    }

    pub fn with_engine(mut self, engine: GeoSearchEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Fan-out of the tree built by the next [`preprocess`](Self::preprocess).
    pub fn with_max_keys_per_node(mut self, max_keys_per_node: usize) -> Self {
        self.max_keys_per_node = max_keys_per_node;
        self
    }

    /// Builds the index from every row the producer yields.
    ///
    /// Calling it again rebuilds the index from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`GeoNearError::InvalidConfig`] if the fan-out set with
    /// [`with_max_keys_per_node`](Self::with_max_keys_per_node) is below 2,
    /// and any error the producer reports.
    pub fn preprocess(&mut self) -> Result<&RTree> {
        if self.max_keys_per_node < 2 {
            return Err(GeoNearError::InvalidConfig(format!(
                "max_keys_per_node must be at least 2, got {}",
                self.max_keys_per_node
            )));
        }

        let started = Instant::now();
        let mut tree = RTree::new(self.max_keys_per_node);

        for row in self.producer.rows()? {
            tree.insert(row?.point());
        }

        let stats = tree.stats();
        log::info!(
            "Indexed {} points in {:?} (height {}, {} nodes, {} leaf containers)",
            stats.points,
            started.elapsed(),
            stats.height,
            stats.nodes,
            stats.leaf_containers
        );

        Ok(self.index.insert(tree))
    }

    pub fn index(&self) -> Option<&RTree> {
        self.index.as_ref()
    }

    pub fn engine(&self) -> &GeoSearchEngine {
        &self.engine
    }

    /// Indexed points within `radius_km` of `target`, nearest first.
    pub fn search(&self, target: &Point, radius_km: f64) -> Result<Vec<Point>> {
        let index = self.index.as_ref().ok_or(GeoNearError::NotIndexed)?;
        Ok(self.engine.search(index, target, radius_km))
    }

    /// Records within `radius_km` of `target`, nearest first.
    pub fn process(&self, target: &Point, radius_km: f64) -> Result<Vec<Record>> {
        let points = self.search(target, radius_km)?;
        let offsets: Vec<u64> = points.iter().filter_map(Point::offset).collect();
        self.fetcher.fetch(&offsets)
    }
}
