//! # GeoNear - Radius search over geotagged CSV records
//!
//! GeoNear builds an in-memory R-tree over the coordinates of a CSV dataset
//! and answers "which records lie within R kilometres of this point" queries,
//! nearest first. The tree stores only coordinates and byte offsets; matching
//! records are read back from the file on demand.
//!
//! ## Features
//!
//! - **Guttman R-tree**: quadratic split with a configurable fan-out
//! - **Radius search**: Mercator window prefilter, great-circle distance ranking
//! - **Streaming ingestion**: rows are parsed one at a time with exact byte offsets
//! - **Configuration**: JSON or TOML files, validated on load
//! - **Thread-safe queries**: a built index is read-only and can be shared
//!
//! ## Quick Start
//!
//! ```rust
//! use geonear::{Point, build_index, query};
//!
//! let index = build_index(vec![
//!     (0.0, 0.0, 0),     // A
//!     (0.0, 1.0, 20),    // B, about 111 km east of A
//!     (10.0, 10.0, 40),  // C, far away
//! ]);
//!
//! let nearest = query(&index, 0.0, 0.0, 500.0);
//! let offsets: Vec<u64> = nearest.iter().filter_map(Point::offset).collect();
//! assert_eq!(offsets, vec![0, 20]);
//! ```
//!
//! ## Indexing a file
//!
//! ```rust
//! use geonear::{ColumnMapping, Config, Point, ProcessorBuilder};
//! use std::io::Write;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut file = tempfile::NamedTempFile::new()?;
//! writeln!(file, "Goroka,-6.0817,145.3919")?;
//! writeln!(file, "Madang,-5.2071,145.7888")?;
//!
//! let config = Config::default().with_columns(ColumnMapping::new(1, 2));
//! let mut processor = ProcessorBuilder::new()
//!     .dataset(file.path())
//!     .config(config)
//!     .build()?;
//! processor.preprocess()?;
//!
//! for record in processor.process(&Point::new(-6.0, 145.4), 50.0)? {
//!     println!("{}", record);
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod dataset;
pub mod error;
pub mod index;
pub mod processor;
pub mod search;
pub mod spatial;

pub mod types;

pub use error::{GeoNearError, Result};

// Re-export the index and search types
pub use index::RTree;
pub use search::{GeoSearchEngine, mercator_deltas, query};
pub use spatial::{EARTH_RADIUS_KM, Point, Rectangle};

// Re-export dataset access
pub use dataset::{
    CsvRowProducer, CsvRows, FileRecordFetcher, Record, RecordFetcher, Row, RowProducer,
};

pub use builder::{CsvFileProcessor, ProcessorBuilder};
pub use processor::{FileProcessor, build_index, build_index_with};

// Re-export configuration types
pub use types::{ColumnMapping, Config, IndexStats};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        Config, FileProcessor, GeoNearError, GeoSearchEngine, Point, ProcessorBuilder, RTree,
        Record, Rectangle, Result, build_index, query,
    };
}
