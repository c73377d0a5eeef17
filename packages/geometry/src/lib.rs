#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical geometry representation and normalization.
//!
//! Every geometry stored by the dataset stores goes through
//! [`normalize`] first: heterogeneous source shapes (`GeoJSON`
//! points/polygons/multipolygons, in either WGS84 degrees or state-plane
//! feet) come out as a single [`Geometry`] in the canonical CRS
//! (EPSG:2263, NY Long Island state plane, US survey feet) with closed,
//! deduplicated, non-self-intersecting rings. Invalid shapes are rejected
//! here, not discovered later by the resolver.

pub mod normalize;
pub mod projection;

use geo::{Area, BoundingRect, MultiPolygon, Point, Polygon};
use rstar::AABB;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use normalize::{RawGeometry, normalize};
pub use projection::wgs84_to_state_plane;

/// Axis-aligned bounding box in canonical (state-plane feet) coordinates.
pub type Aabb = AABB<[f64; 2]>;

/// Coordinate reference system of a source file's raw coordinates.
///
/// Normalization reprojects [`SourceCrs::Wgs84`] input into the canonical
/// CRS; [`SourceCrs::StatePlane`] input is already canonical and passes
/// through untouched, which keeps normalization idempotent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCrs {
    /// EPSG:4326 geographic degrees, `[lon, lat]` order (`GeoJSON` default).
    #[default]
    Wgs84,
    /// EPSG:2263 NY Long Island state plane, US survey feet.
    StatePlane,
}

/// A normalized shape in the canonical CRS.
///
/// Polygon rings are closed, contain at least three distinct vertices,
/// and are free of consecutive duplicates and self-intersections.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A single location (individual landmarks).
    Point(Point<f64>),
    /// A single closed boundary with optional holes.
    Polygon(Polygon<f64>),
    /// Multiple disjoint boundaries sharing one identity.
    MultiPolygon(MultiPolygon<f64>),
}

impl Geometry {
    /// Bounding box of the shape, as an R-tree envelope.
    #[must_use]
    pub fn envelope(&self) -> Aabb {
        let rect = match self {
            Self::Point(p) => return AABB::from_point([p.x(), p.y()]),
            Self::Polygon(p) => p.bounding_rect(),
            Self::MultiPolygon(mp) => mp.bounding_rect(),
        };
        rect.map_or_else(
            || AABB::from_point([0.0, 0.0]),
            |r| AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
        )
    }

    /// Area in square canonical units (square feet). Zero for points.
    #[must_use]
    pub fn unsigned_area(&self) -> f64 {
        match self {
            Self::Point(_) => 0.0,
            Self::Polygon(p) => p.unsigned_area(),
            Self::MultiPolygon(mp) => mp.unsigned_area(),
        }
    }

    /// The shape as a [`MultiPolygon`], or `None` for points.
    #[must_use]
    pub fn to_multi_polygon(&self) -> Option<MultiPolygon<f64>> {
        match self {
            Self::Point(_) => None,
            Self::Polygon(p) => Some(MultiPolygon(vec![p.clone()])),
            Self::MultiPolygon(mp) => Some(mp.clone()),
        }
    }
}

/// Reasons a raw geometry is rejected during normalization.
///
/// Recorded per-record during ingestion; a single bad record never aborts
/// an import on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    /// Geometry carries no coordinates (or a malformed position).
    #[error("geometry has no usable coordinates")]
    Empty,

    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate")]
    NonFiniteCoordinate,

    /// A coordinate falls outside the NYC guard envelope, a sign of
    /// corrupt source data or a mislabeled CRS.
    #[error("coordinate ({x}, {y}) is outside the NYC envelope")]
    OutOfEnvelope {
        /// Offending x (or longitude) value, in source units.
        x: f64,
        /// Offending y (or latitude) value, in source units.
        y: f64,
    },

    /// A ring has fewer than three distinct vertices after deduplication.
    #[error("ring has {count} distinct vertices, need at least 3")]
    NotEnoughVertices {
        /// Distinct vertex count found.
        count: usize,
    },

    /// Ring endpoints are too far apart to auto-close.
    #[error("ring endpoints are {gap_ft:.2} ft apart, beyond the close tolerance")]
    UnclosedRing {
        /// Endpoint gap in canonical feet.
        gap_ft: f64,
    },

    /// A ring crosses itself.
    #[error("ring is self-intersecting")]
    SelfIntersection,

    /// Geometry type the engine does not model (lines, collections, ...).
    #[error("unsupported geometry type: {kind}")]
    UnsupportedGeometry {
        /// `GeoJSON` type name of the rejected geometry.
        kind: String,
    },
}
