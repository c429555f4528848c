//! Geometric primitives for geonear
//!
//! This module provides the geographic point and the axis-aligned rectangle
//! the R-tree is built from, together with great-circle distance and the
//! bounding rectangle arithmetic used by insertion and splitting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean radius of the Earth in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic point with an optional source offset.
///
/// `x` is the latitude and `y` the longitude, both in decimal degrees.
/// Indexed points carry the offset of their record in the source dataset;
/// query points leave it unset. A point is immutable once constructed.
///
/// # Examples
///
/// ```rust
/// use geonear::Point;
///
/// let moscow = Point::new(55.7558, 37.6173);
/// let spb = Point::with_offset(59.9343, 30.3351, 1024);
///
/// assert_eq!(spb.offset(), Some(1024));
/// let km = moscow.distance(&spb);
/// assert!((km - 634.0).abs() < 10.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    x: f64,
    y: f64,
    offset: Option<u64>,
}

impl Point {
    /// Creates a query point (no offset).
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            x: lat,
            y: lon,
            offset: None,
        }
    }

    /// Creates an indexed point tagged with the byte offset of its record.
    pub fn with_offset(lat: f64, lon: f64, offset: u64) -> Self {
        Self {
            x: lat,
            y: lon,
            offset: Some(offset),
        }
    }

    /// Latitude in decimal degrees.
    pub fn lat(&self) -> f64 {
        self.x
    }

    /// Longitude in decimal degrees.
    pub fn lon(&self) -> f64 {
        self.y
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Great-circle distance to `other` in kilometers.
    ///
    /// Uses the spherical law of cosines over a sphere of radius
    /// [`EARTH_RADIUS_KM`]. Points with identical coordinates are exactly
    /// 0 km apart. A NaN result (non-finite input) never satisfies a
    /// `<= radius` test, so callers treat it as infinitely far.
    pub fn distance(&self, other: &Point) -> f64 {
        if self.x == other.x && self.y == other.y {
            return 0.0;
        }

        let lat1 = self.x.to_radians();
        let lat2 = other.x.to_radians();
        let dlon = (other.y - self.y).abs().to_radians();

        let cos_sigma = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();
        // Rounding can push the cosine just past 1 for nearby points.
        EARTH_RADIUS_KM * cos_sigma.clamp(-1.0, 1.0).acos()
    }

    /// Same coordinates, ignoring the offset tag.
    pub fn same_position(&self, other: &Point) -> bool {
        self.x == other.x && self.y == other.y
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "({:.6}, {:.6}) @{}", self.x, self.y, offset),
            None => write!(f, "({:.6}, {:.6})", self.x, self.y),
        }
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(point: Point) -> Self {
        geo::Point::new(point.y, point.x)
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(point: geo::Point<f64>) -> Self {
        Point::new(point.y(), point.x())
    }
}

/// An axis-aligned rectangle in latitude/longitude space.
///
/// Corners are normalized on construction: `left_top` holds the minimum
/// latitude and maximum longitude, `right_bottom` the maximum latitude and
/// minimum longitude, whatever order the corners were given in.
///
/// A rectangle built with [`Rectangle::leaf`] is degenerate (zero area) and
/// tags the single data point it stands for.
///
/// # Examples
///
/// ```rust
/// use geonear::{Point, Rectangle};
///
/// let a = Rectangle::new(Point::new(1.0, 1.0), Point::new(0.0, 0.0));
/// assert_eq!(a.left_top(), Point::new(0.0, 1.0));
/// assert_eq!(a.right_bottom(), Point::new(1.0, 0.0));
///
/// let b = Rectangle::new(Point::new(2.0, 2.0), Point::new(3.0, 3.0));
/// assert_eq!(a.union(&b).area(), 9.0);
/// assert!(!a.overlaps(&b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    left_top: Point,
    right_bottom: Point,
    data_point: Option<Point>,
}

impl Rectangle {
    pub fn new(a: Point, b: Point) -> Self {
        let min_x = a.x.min(b.x);
        let max_x = a.x.max(b.x);
        let min_y = a.y.min(b.y);
        let max_y = a.y.max(b.y);

        Self {
            left_top: Point::new(min_x, max_y),
            right_bottom: Point::new(max_x, min_y),
            data_point: None,
        }
    }

    /// Zero-area rectangle standing for a single indexed point.
    pub fn leaf(point: Point) -> Self {
        Self {
            data_point: Some(point),
            ..Self::new(point, point)
        }
    }

    pub fn left_top(&self) -> Point {
        self.left_top
    }

    pub fn right_bottom(&self) -> Point {
        self.right_bottom
    }

    pub fn data_point(&self) -> Option<Point> {
        self.data_point
    }

    pub fn min_lat(&self) -> f64 {
        self.left_top.x
    }

    pub fn max_lat(&self) -> f64 {
        self.right_bottom.x
    }

    pub fn min_lon(&self) -> f64 {
        self.right_bottom.y
    }

    pub fn max_lon(&self) -> f64 {
        self.left_top.y
    }

    /// Extent along the latitude axis.
    pub fn length(&self) -> f64 {
        self.right_bottom.x - self.left_top.x
    }

    /// Extent along the longitude axis.
    pub fn width(&self) -> f64 {
        self.left_top.y - self.right_bottom.y
    }

    pub fn area(&self) -> f64 {
        self.length() * self.width()
    }

    /// Minimum rectangle covering both `self` and `other`.
    ///
    /// The result is always an aggregate region: it never carries a data point.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle {
            left_top: Point::new(
                self.left_top.x.min(other.left_top.x),
                self.left_top.y.max(other.left_top.y),
            ),
            right_bottom: Point::new(
                self.right_bottom.x.max(other.right_bottom.x),
                self.right_bottom.y.min(other.right_bottom.y),
            ),
            data_point: None,
        }
    }

    /// Grows `self` to cover `other`.
    pub fn union_in_place(&mut self, other: &Rectangle) {
        *self = self.union(other);
    }

    /// Area that `self` must gain to absorb `other`.
    pub fn union_area(&self, other: &Rectangle) -> f64 {
        (self.union(other).area() - self.area()).abs()
    }

    /// True if the rectangles intersect. Touching edges count.
    pub fn overlaps(&self, other: &Rectangle) -> bool {
        !(self.right_bottom.x < other.left_top.x
            || self.left_top.x > other.right_bottom.x
            || self.left_top.y < other.right_bottom.y
            || self.right_bottom.y > other.left_top.y)
    }

    /// True if `other` lies inside this rectangle or on its boundary.
    pub fn contains(&self, other: &Rectangle) -> bool {
        other.left_top.x >= self.left_top.x
            && other.right_bottom.x <= self.right_bottom.x
            && other.left_top.y <= self.left_top.y
            && other.right_bottom.y >= self.right_bottom.y
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        self.contains(&Rectangle::new(*point, *point))
    }

    /// Same extent, ignoring any data point tag.
    pub fn same_extent(&self, other: &Rectangle) -> bool {
        self.left_top.same_position(&other.left_top)
            && self.right_bottom.same_position(&other.right_bottom)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.left_top, self.right_bottom)
    }
}

impl From<Rectangle> for geo::Rect<f64> {
    fn from(rect: Rectangle) -> Self {
        geo::Rect::new(
            geo::coord! { x: rect.min_lon(), y: rect.min_lat() },
            geo::coord! { x: rect.max_lon(), y: rect.max_lat() },
        )
    }
}
