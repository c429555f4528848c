use thiserror::Error;

/// Error types for geonear
///
/// The spatial core (index and search) is infallible; these errors come from
/// the edges: reading the dataset, resolving records and loading configuration.
#[derive(Debug, Error)]
pub enum GeoNearError {
    /// I/O error while reading the dataset
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV reader failed on the dataset
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A coordinate field could not be parsed as a number
    #[error("line {line}: column {column} is not a number: {value:?}")]
    Parse {
        line: u64,
        column: usize,
        value: String,
    },

    /// A row has fewer columns than the column mapping needs
    #[error("line {line}: missing column {column}")]
    MissingColumn { line: u64, column: usize },

    /// A parsed coordinate lies outside the valid latitude/longitude range
    #[error("line {line}: coordinate ({latitude}, {longitude}) is out of range")]
    CoordinateOutOfRange {
        line: u64,
        latitude: f64,
        longitude: f64,
    },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON configuration could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A query was issued before the index was built
    #[error("index has not been built; call preprocess first")]
    NotIndexed,
}

/// Result type alias for geonear operations
pub type Result<T> = std::result::Result<T, GeoNearError>;
