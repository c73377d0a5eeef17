#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zoning resolution over the published dataset generations.
//!
//! Given a BBL or a coordinate, finds the owning parcel, every zoning
//! district whose geometry actually intersects it (annotated with the
//! fraction of parcel area it covers), and every landmark overlapping
//! it. Split lots are disclosed in full: the resolver reports all
//! intersecting districts and never picks a "primary" one — that is
//! presentation policy for the API layer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use geo::{Area, BooleanOps, Contains, Intersects, MultiPolygon, Point};
use thiserror::Error;
use zoning_map_geometry::{Geometry, wgs84_to_state_plane};
use zoning_map_models::{
    Bbl, BblParseError, DistrictEntry, LandmarkEntry, Parcel, ZoningDistrict, ZoningType,
};
use zoning_map_store::{Aabb, Datasets};

/// Intersections smaller than this (square feet) are treated as
/// zero-area contact — a shared edge or vertex, not a zoning relationship.
const AREA_EPSILON_SQ_FT: f64 = 1e-6;

/// Why a lookup failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// The BBL string is malformed; rejected before any store access.
    #[error("invalid BBL: {0}")]
    InvalidBbl(#[from] BblParseError),

    /// The coordinate is non-finite or outside valid lat/lon ranges;
    /// rejected before any store access.
    #[error("coordinate ({lat}, {lon}) is out of range")]
    InvalidCoordinate {
        /// Rejected latitude.
        lat: f64,
        /// Rejected longitude.
        lon: f64,
    },

    /// No parcel with this BBL exists in the published generation.
    #[error("no parcel found for BBL {bbl}")]
    NotFound {
        /// The BBL that was looked up.
        bbl: String,
    },

    /// No parcel geometry contains the queried location.
    #[error("no parcel contains the queried location")]
    NoParcelAtLocation,

    /// The caller-supplied deadline expired before resolution finished.
    #[error("deadline exceeded during resolution")]
    DeadlineExceeded,
}

/// A resolved parcel with its zoning and landmark context.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The owning parcel.
    pub parcel: Arc<Parcel>,
    /// Intersecting districts, largest area fraction first. Empty when
    /// the parcel falls in a zoning coverage gap — a valid data state.
    pub districts: Vec<DistrictEntry>,
    /// Landmarks whose geometry intersects the parcel.
    pub landmarks: Vec<LandmarkEntry>,
    /// Parcel generation the resolution was served from.
    pub parcel_generation: u64,
    /// Zoning generation the resolution was served from.
    pub zoning_generation: u64,
    /// Landmark generation the resolution was served from.
    pub landmark_generation: u64,
}

/// Read-only resolver over a set of dataset stores.
///
/// Each lookup takes one snapshot per collection up front, so a
/// concurrent re-import can never mix generations within a single
/// resolution.
pub struct Resolver<'a> {
    datasets: &'a Datasets,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over the given stores.
    #[must_use]
    pub const fn new(datasets: &'a Datasets) -> Self {
        Self { datasets }
    }

    /// Resolves zoning for a parcel identified by its BBL.
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidBbl`] for malformed input (checked before
    /// any store access), [`ResolveError::NotFound`] if no such parcel is
    /// loaded, [`ResolveError::DeadlineExceeded`] if `deadline` expires.
    pub fn lookup_by_bbl(
        &self,
        bbl: &str,
        deadline: Option<Instant>,
    ) -> Result<Resolution, ResolveError> {
        let bbl = Bbl::parse(bbl)?;

        let parcels = self.datasets.parcels.snapshot();
        let parcel = parcels
            .get(&bbl.to_string())
            .ok_or_else(|| ResolveError::NotFound {
                bbl: bbl.to_string(),
            })?;

        self.resolve_parcel(parcel, parcels.number(), deadline)
    }

    /// Resolves zoning for the parcel containing a WGS84 coordinate.
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidCoordinate`] for out-of-range input,
    /// [`ResolveError::NoParcelAtLocation`] if no loaded parcel contains
    /// the point, [`ResolveError::DeadlineExceeded`] if `deadline`
    /// expires.
    pub fn lookup_by_coordinate(
        &self,
        lat: f64,
        lon: f64,
        deadline: Option<Instant>,
    ) -> Result<Resolution, ResolveError> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(ResolveError::InvalidCoordinate { lat, lon });
        }

        let (x, y) = wgs84_to_state_plane(lon, lat);
        self.lookup_by_point(x, y, deadline)
    }

    /// Resolves zoning for the parcel containing a canonical-CRS point
    /// (state-plane feet).
    ///
    /// Ties — a point inside several overlapping parcel geometries, as
    /// happens with MapPLUTO condo lots — go to the smallest-area parcel.
    /// A point lying exactly on a shared boundary (contained by no parcel
    /// interior) falls back to an intersection test with the same
    /// smallest-area rule.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NoParcelAtLocation`] if no loaded parcel contains
    /// the point, [`ResolveError::DeadlineExceeded`] if `deadline`
    /// expires.
    pub fn lookup_by_point(
        &self,
        x: f64,
        y: f64,
        deadline: Option<Instant>,
    ) -> Result<Resolution, ResolveError> {
        let parcels = self.datasets.parcels.snapshot();
        let candidates = parcels.candidates_overlapping(&Aabb::from_point([x, y]));
        let point = Point::new(x, y);

        let mut best: Option<(Arc<Parcel>, f64)> = None;
        for parcel in &candidates {
            check_deadline(deadline)?;
            let Some(shape) = parcel.geometry.to_multi_polygon() else {
                continue;
            };
            if shape.contains(&point) {
                keep_smaller(&mut best, parcel, shape.unsigned_area());
            }
        }

        // Boundary points are contained by no parcel interior; fall back
        // to an intersects test over the same candidates.
        if best.is_none() {
            for parcel in &candidates {
                check_deadline(deadline)?;
                let Some(shape) = parcel.geometry.to_multi_polygon() else {
                    continue;
                };
                if shape.intersects(&point) {
                    keep_smaller(&mut best, parcel, shape.unsigned_area());
                }
            }
        }

        let (parcel, _) = best.ok_or(ResolveError::NoParcelAtLocation)?;
        self.resolve_parcel(parcel, parcels.number(), deadline)
    }

    /// Computes the district and landmark context for a located parcel.
    fn resolve_parcel(
        &self,
        parcel: Arc<Parcel>,
        parcel_generation: u64,
        deadline: Option<Instant>,
    ) -> Result<Resolution, ResolveError> {
        let zoning = self.datasets.zoning.snapshot();
        let landmarks = self.datasets.landmarks.snapshot();

        let parcel_shape = parcel.geometry.to_multi_polygon();
        let parcel_area = parcel.geometry.unsigned_area();
        let envelope = parcel.geometry.envelope();

        let districts = match (&parcel_shape, parcel_area > AREA_EPSILON_SQ_FT) {
            (Some(shape), true) => {
                district_entries(shape, parcel_area, &zoning.candidates_overlapping(&envelope), deadline)?
            }
            _ => Vec::new(),
        };

        let mut hits = Vec::new();
        if let Some(shape) = &parcel_shape {
            for landmark in &landmarks.candidates_overlapping(&envelope) {
                check_deadline(deadline)?;
                if landmark_intersects(shape, &landmark.geometry) {
                    hits.push(LandmarkEntry {
                        id: landmark.id.clone(),
                        name: landmark.name.clone(),
                        landmark_type: landmark.landmark_type,
                    });
                }
            }
        }
        hits.sort_by(|a, b| a.id.cmp(&b.id));

        log::debug!(
            "Resolved BBL {}: {} districts, {} landmarks",
            parcel.bbl,
            districts.len(),
            hits.len()
        );

        Ok(Resolution {
            parcel,
            districts,
            landmarks: hits,
            parcel_generation,
            zoning_generation: zoning.number(),
            landmark_generation: landmarks.number(),
        })
    }
}

/// Exact polygon-polygon refinement of the zoning candidate set.
///
/// Fractions for polygons sharing a district code are summed, so a parcel
/// straddling two disjoint "R6" polygons reports one "R6" entry.
fn district_entries(
    parcel_shape: &MultiPolygon<f64>,
    parcel_area: f64,
    candidates: &[Arc<ZoningDistrict>],
    deadline: Option<Instant>,
) -> Result<Vec<DistrictEntry>, ResolveError> {
    let mut by_code: BTreeMap<String, (ZoningType, f64)> = BTreeMap::new();

    for district in candidates {
        check_deadline(deadline)?;
        let Some(district_shape) = district.geometry.to_multi_polygon() else {
            continue;
        };
        let overlap = parcel_shape.intersection(&district_shape).unsigned_area();
        if overlap > AREA_EPSILON_SQ_FT {
            by_code
                .entry(district.code.clone())
                .and_modify(|(_, area)| *area += overlap)
                .or_insert((district.zoning_type, overlap));
        }
    }

    let mut entries: Vec<DistrictEntry> = by_code
        .into_iter()
        .map(|(code, (zoning_type, area))| DistrictEntry {
            code,
            zoning_type,
            fraction: (area / parcel_area).min(1.0),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.fraction
            .partial_cmp(&a.fraction)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.code.cmp(&b.code))
    });

    Ok(entries)
}

fn landmark_intersects(parcel_shape: &MultiPolygon<f64>, landmark: &Geometry) -> bool {
    match landmark {
        Geometry::Point(p) => parcel_shape.intersects(p),
        Geometry::Polygon(p) => parcel_shape.intersects(p),
        Geometry::MultiPolygon(mp) => parcel_shape.intersects(mp),
    }
}

fn keep_smaller(best: &mut Option<(Arc<Parcel>, f64)>, parcel: &Arc<Parcel>, area: f64) {
    if best.as_ref().is_none_or(|(_, best_area)| area < *best_area) {
        *best = Some((Arc::clone(parcel), area));
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<(), ResolveError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(ResolveError::DeadlineExceeded),
        _ => Ok(()),
    }
}
