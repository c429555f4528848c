//! Radius search on top of the R-tree
//!
//! A radius query is answered in two passes: a rectangular window around the
//! target prunes the tree, then the true great-circle distance filters and
//! ranks the candidates.

use crate::index::RTree;
use crate::spatial::{EARTH_RADIUS_KM, Point, Rectangle};
use smallvec::SmallVec;
use std::f64::consts::FRAC_PI_4;

/// Relative slack added to the window so points exactly on the circle
/// survive rounding in the window arithmetic.
const WINDOW_MARGIN: f64 = 1e-9;

/// Latitude and longitude extents (degrees) of the Mercator box for a
/// radius of `radius_km` centered at `latitude`.
///
/// The latitude extent comes from the Mercator projection: the target is
/// projected onto the cylinder, moved `radius_km` north, and projected back.
/// The longitude extent is the radius as an arc of a great circle. Both
/// values are full extents, twice the distance from the target to the
/// box's edge.
///
/// Away from the equator this box is smaller than the search circle;
/// [`GeoSearchEngine::query_window`] widens it until it covers the circle.
pub fn mercator_deltas(latitude: f64, radius_km: f64) -> (f64, f64) {
    let projected = EARTH_RADIUS_KM * (latitude.to_radians() / 2.0 + FRAC_PI_4).tan().ln();
    let shifted = ((projected + radius_km) / EARTH_RADIUS_KM)
        .sinh()
        .atan()
        .to_degrees();

    let d_latitude = 2.0 * (shifted - latitude).abs();
    let d_longitude = 2.0 * (radius_km / EARTH_RADIUS_KM).to_degrees();
    (d_latitude, d_longitude)
}

/// Answers "up to N records within a radius of a point, nearest first".
///
/// # Examples
///
/// ```rust
/// use geonear::{GeoSearchEngine, Point, RTree};
///
/// let mut tree = RTree::new(4);
/// tree.insert(Point::with_offset(0.0, 0.0, 0));
/// tree.insert(Point::with_offset(0.0, 1.0, 64));
/// tree.insert(Point::with_offset(10.0, 10.0, 128));
///
/// let engine = GeoSearchEngine::new();
/// let found = engine.search(&tree, &Point::new(0.0, 0.0), 500.0);
///
/// let offsets: Vec<_> = found.iter().filter_map(|p| p.offset()).collect();
/// assert_eq!(offsets, vec![0, 64]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoSearchEngine {
    max_results: usize,
}

impl GeoSearchEngine {
    pub const DEFAULT_MAX_RESULTS: usize = 5;

    pub fn new() -> Self {
        Self {
            max_results: Self::DEFAULT_MAX_RESULTS,
        }
    }

    /// # Panics
    ///
    /// Panics if `max_results` is zero.
    pub fn with_max_results(max_results: usize) -> Self {
        assert!(max_results > 0, "max_results must be greater than zero");
        Self { max_results }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Rectangle containing every point within `radius_km` of `target`.
    ///
    /// Starts from the [`mercator_deltas`] box and grows it to the bounds of
    /// the spherical cap: `radius / R` in latitude and
    /// `asin(sin(radius / R) / cos(lat))` in longitude. A cap reaching a
    /// pole spans every longitude. Latitudes are clamped to [-90, 90];
    /// longitudes are not wrapped, so the window may extend past ±180.
    pub fn query_window(target: &Point, radius_km: f64) -> Rectangle {
        let (d_latitude, d_longitude) = mercator_deltas(target.lat(), radius_km);
        let arc = radius_km / EARTH_RADIUS_KM;

        let half_latitude = (d_latitude / 2.0).max(arc.to_degrees()) * (1.0 + WINDOW_MARGIN);
        let min_latitude = (target.lat() - half_latitude).max(-90.0);
        let max_latitude = (target.lat() + half_latitude).min(90.0);

        let reaches_pole = target.lat().abs() + half_latitude >= 90.0;
        let half_longitude = if reaches_pole {
            180.0
        } else {
            let cap = (arc.sin() / target.lat().to_radians().cos()).asin().to_degrees();
            (d_longitude / 2.0).max(cap) * (1.0 + WINDOW_MARGIN)
        };

        let (min_longitude, max_longitude) = if half_longitude >= 180.0 {
            (-180.0, 180.0)
        } else {
            (target.lon() - half_longitude, target.lon() + half_longitude)
        };

        Rectangle::new(
            Point::new(min_latitude, max_longitude),
            Point::new(max_latitude, min_longitude),
        )
    }

    /// [`query_window`](Self::query_window) split at the antimeridian into
    /// at most two rectangles inside [-180, 180].
    pub fn query_windows(target: &Point, radius_km: f64) -> SmallVec<[Rectangle; 2]> {
        let window = Self::query_window(target, radius_km);
        let (south, north) = (window.min_lat(), window.max_lat());
        let (west, east) = (window.min_lon(), window.max_lon());
        let rect = |west: f64, east: f64| {
            Rectangle::new(Point::new(south, west), Point::new(north, east))
        };

        let mut windows = SmallVec::new();
        if west < -180.0 {
            windows.push(rect(-180.0, east));
            windows.push(rect(west + 360.0, 180.0));
        } else if east > 180.0 {
            windows.push(rect(west, 180.0));
            windows.push(rect(-180.0, east - 360.0));
        } else {
            windows.push(window);
        }
        windows
    }

    /// Points within `radius_km` of `target`, nearest first, at most
    /// [`max_results`](Self::max_results) of them.
    ///
    /// A non-finite target or a negative or non-finite radius yields no
    /// results.
    pub fn search(&self, index: &RTree, target: &Point, radius_km: f64) -> Vec<Point> {
        if !target.is_finite() {
            log::warn!("Rejecting radius query with non-finite target {}", target);
            return Vec::new();
        }
        if !radius_km.is_finite() || radius_km < 0.0 {
            log::warn!("Rejecting radius query with invalid radius {}", radius_km);
            return Vec::new();
        }

        let candidates: Vec<Point> = Self::query_windows(target, radius_km)
            .iter()
            .flat_map(|window| index.range_query(window))
            .collect();
        let candidate_count = candidates.len();

        let mut ranked: Vec<(f64, Point)> = candidates
            .into_iter()
            .map(|point| (target.distance(&point), point))
            .filter(|(distance, _)| *distance <= radius_km)
            .collect();

        // Stable: equidistant points keep traversal order
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.truncate(self.max_results);

        log::trace!(
            "radius query {} r={}km: {} candidates, {} returned",
            target,
            radius_km,
            candidate_count,
            ranked.len()
        );

        ranked.into_iter().map(|(_, point)| point).collect()
    }
}

impl Default for GeoSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a default radius query against `index`.
///
/// Returns at most [`GeoSearchEngine::DEFAULT_MAX_RESULTS`] indexed points,
/// nearest first; their offsets locate the matching records.
pub fn query(index: &RTree, latitude: f64, longitude: f64, radius_km: f64) -> Vec<Point> {
    GeoSearchEngine::new().search(index, &Point::new(latitude, longitude), radius_km)
}
