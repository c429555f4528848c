use crate::error::{GeoNearError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Zero-based positions of the coordinate columns in a dataset row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnMapping {
    pub latitude: usize,
    pub longitude: usize,
    /// Parsed and validated when set, but not indexed
    #[serde(default)]
    pub elevation: Option<usize>,
}

impl ColumnMapping {
    pub fn new(latitude: usize, longitude: usize) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
        }
    }

    pub fn with_elevation(mut self, column: usize) -> Self {
        self.elevation = Some(column);
        self
    }

    /// Highest column index a row must have.
    pub fn max_column(&self) -> usize {
        self.latitude
            .max(self.longitude)
            .max(self.elevation.unwrap_or(0))
    }
}

impl Default for ColumnMapping {
    /// OpenFlights `airports.dat` layout
    fn default() -> Self {
        Self {
            latitude: 6,
            longitude: 7,
            elevation: Some(8),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path of the CSV dataset
    #[serde(default)]
    pub dataset: Option<PathBuf>,

    #[serde(default)]
    pub columns: ColumnMapping,

    /// Maximum number of children per R-tree node
    #[serde(default = "Config::default_max_keys_per_node")]
    pub max_keys_per_node: usize,

    /// Radius used when a query does not give one
    #[serde(default = "Config::default_radius_km")]
    pub radius_km: f64,

    /// Maximum number of records returned per query
    #[serde(default = "Config::default_max_results")]
    pub max_results: usize,

    /// Skip the first row of the dataset
    #[serde(default)]
    pub has_header: bool,

    /// Log and skip malformed rows instead of failing the build
    #[serde(default)]
    pub skip_invalid_rows: bool,
}

impl Config {
    const fn default_max_keys_per_node() -> usize {
        4
    }

    const fn default_radius_km() -> f64 {
        50.0
    }

    const fn default_max_results() -> usize {
        5
    }

    pub fn with_dataset<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dataset = Some(path.into());
        self
    }

    pub fn with_columns(mut self, columns: ColumnMapping) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_max_keys_per_node(mut self, max_keys: usize) -> Self {
        self.max_keys_per_node = max_keys;
        self
    }

    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_skip_invalid_rows(mut self, skip: bool) -> Self {
        self.skip_invalid_rows = skip;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_keys_per_node < 2 {
            return Err(GeoNearError::InvalidConfig(format!(
                "max_keys_per_node must be at least 2, got {}",
                self.max_keys_per_node
            )));
        }

        if self.max_results == 0 {
            return Err(GeoNearError::InvalidConfig(
                "max_results must be greater than zero".to_string(),
            ));
        }

        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(GeoNearError::InvalidConfig(format!(
                "radius_km must be a finite non-negative number, got {}",
                self.radius_km
            )));
        }

        let columns = &self.columns;
        if columns.latitude == columns.longitude
            || columns.elevation == Some(columns.latitude)
            || columns.elevation == Some(columns.longitude)
        {
            return Err(GeoNearError::InvalidConfig(
                "coordinate columns must be distinct".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GeoNearError::InvalidConfig(format!("cannot encode TOML: {}", e)))
    }

    /// Load a configuration file. `.toml` files are read as TOML, anything
    /// else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            #[cfg(feature = "toml")]
            return Self::from_toml(&contents);

            #[cfg(not(feature = "toml"))]
            return Err(GeoNearError::InvalidConfig(
                "TOML support is disabled; enable the `toml` feature".to_string(),
            ));
        }

        Self::from_json(&contents)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: None,
            columns: ColumnMapping::default(),
            max_keys_per_node: Self::default_max_keys_per_node(),
            radius_km: Self::default_radius_km(),
            max_results: Self::default_max_results(),
            has_header: false,
            skip_invalid_rows: false,
        }
    }
}

/// Shape of a built index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of indexed points
    pub points: usize,
    /// Live nodes, data nodes included
    pub nodes: usize,
    /// Height of the root; data nodes sit at height 0
    pub height: usize,
    /// Nodes whose children are data nodes
    pub leaf_containers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_keys_per_node, 4);
        assert_eq!(config.max_results, 5);
        assert_eq!(config.radius_km, 50.0);
        assert_eq!(config.columns, ColumnMapping::default());
        assert!(config.dataset.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().with_max_keys_per_node(1).validate().is_err());
        assert!(Config::default().with_max_results(0).validate().is_err());
        assert!(Config::default().with_radius_km(-1.0).validate().is_err());
        assert!(Config::default().with_radius_km(f64::NAN).validate().is_err());
        assert!(
            Config::default()
                .with_columns(ColumnMapping::new(2, 2))
                .validate()
                .is_err()
        );
        assert!(
            Config::default()
                .with_columns(ColumnMapping::new(1, 2).with_elevation(1))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = Config::default()
            .with_dataset("/data/airports.csv")
            .with_columns(ColumnMapping::new(1, 2))
            .with_max_keys_per_node(8)
            .with_radius_km(120.5);

        let json = config.to_json().unwrap();
        let decoded = Config::from_json(&json).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config = Config::from_json(r#"{ "radius_km": 10.0 }"#).unwrap();
        assert_eq!(config.radius_km, 10.0);
        assert_eq!(config.max_keys_per_node, 4);
        assert_eq!(config.columns.elevation, Some(8));
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        assert!(Config::from_json(r#"{ "radius": 10.0 }"#).is_err());
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        let err = Config::from_json(r#"{ "max_keys_per_node": 0 }"#).unwrap_err();
        assert!(matches!(err, GeoNearError::InvalidConfig(_)));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_config_toml() {
        let config = Config::from_toml(
            r#"
            dataset = "airports.csv"
            max_results = 3

            [columns]
            latitude = 0
            longitude = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset, Some(PathBuf::from("airports.csv")));
        assert_eq!(config.max_results, 3);
        assert_eq!(config.columns, ColumnMapping::new(0, 1));

        let encoded = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&encoded).unwrap(), config);
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geonear.json");
        std::fs::write(&path, r#"{ "max_results": 2 }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.max_results, 2);

        assert!(Config::from_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_column_mapping() {
        let columns = ColumnMapping::new(3, 1).with_elevation(9);
        assert_eq!(columns.max_column(), 9);
        assert_eq!(ColumnMapping::new(3, 1).max_column(), 3);
    }
}
