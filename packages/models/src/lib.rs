#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared domain types for the zoning lookup engine.
//!
//! Entities (parcels, zoning districts, landmarks) as produced by the
//! ingestion pipeline, plus the result types the query surface returns.
//! Geometry-bearing entities are immutable after load; they are only
//! replaced wholesale by a new dataset generation.

pub mod bbl;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use zoning_map_geometry::Geometry;

pub use bbl::{Bbl, BblParseError};

/// One of the five NYC boroughs, coded 1-5 as in MapPLUTO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Borough {
    /// Borough code 1.
    Manhattan,
    /// Borough code 2.
    Bronx,
    /// Borough code 3 (Kings County).
    Brooklyn,
    /// Borough code 4.
    Queens,
    /// Borough code 5 (Richmond County).
    StatenIsland,
}

impl Borough {
    /// Numeric borough code (1-5).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Manhattan => 1,
            Self::Bronx => 2,
            Self::Brooklyn => 3,
            Self::Queens => 4,
            Self::StatenIsland => 5,
        }
    }

    /// Borough from its numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Manhattan),
            2 => Some(Self::Bronx),
            3 => Some(Self::Brooklyn),
            4 => Some(Self::Queens),
            5 => Some(Self::StatenIsland),
            _ => None,
        }
    }

    /// Borough from the labels MapPLUTO exports use: a code digit, a
    /// two-letter abbreviation, or a (county) name.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "1" | "MANHATTAN" | "MN" => Some(Self::Manhattan),
            "2" | "BRONX" | "BX" => Some(Self::Bronx),
            "3" | "BROOKLYN" | "BK" | "KINGS" => Some(Self::Brooklyn),
            "4" | "QUEENS" | "QN" => Some(Self::Queens),
            "5" | "STATEN ISLAND" | "SI" | "RICHMOND" => Some(Self::StatenIsland),
            _ => None,
        }
    }

    /// Human-readable borough name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Manhattan => "Manhattan",
            Self::Bronx => "Bronx",
            Self::Brooklyn => "Brooklyn",
            Self::Queens => "Queens",
            Self::StatenIsland => "Staten Island",
        }
    }
}

impl fmt::Display for Borough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three dataset collections the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// MapPLUTO property parcels.
    Parcels,
    /// Zoning district polygons.
    Zoning,
    /// Designated landmarks and historic districts.
    Landmarks,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parcels => "parcels",
            Self::Zoning => "zoning",
            Self::Landmarks => "landmarks",
        })
    }
}

/// Regulatory class of a zoning district, derived from the code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoningType {
    /// `R*` districts.
    Residential,
    /// `C*` districts.
    Commercial,
    /// `M*` districts.
    Manufacturing,
    /// Everything else (parks, special districts, mixed-use).
    Mixed,
}

impl ZoningType {
    /// Classifies a district code (`"R6"`, `"C6-2"`, `"M1-5"`, ...).
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().as_bytes().first().map(u8::to_ascii_uppercase) {
            Some(b'R') => Self::Residential,
            Some(b'C') => Self::Commercial,
            Some(b'M') => Self::Manufacturing,
            _ => Self::Mixed,
        }
    }
}

/// Designation class of a landmark record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandmarkType {
    /// A single designated structure or site.
    Individual,
    /// A designated historic district (polygon).
    HistoricDistrict,
    /// A designated scenic landmark.
    Scenic,
}

impl LandmarkType {
    /// Classifies the free-text type label landmark exports carry.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let upper = label.to_ascii_uppercase();
        if upper.contains("DISTRICT") {
            Self::HistoricDistrict
        } else if upper.contains("SCENIC") {
            Self::Scenic
        } else {
            Self::Individual
        }
    }
}

/// A MapPLUTO property parcel. Immutable after load.
#[derive(Debug, Clone)]
pub struct Parcel {
    /// Unique Borough-Block-Lot identifier.
    pub bbl: Bbl,
    /// Street address, when the source record carries one.
    pub address: Option<String>,
    /// MapPLUTO land-use category code.
    pub land_use: Option<String>,
    /// Lot area in square feet, as reported by the source.
    pub lot_area: Option<f64>,
    /// Year the primary structure was built.
    pub year_built: Option<i32>,
    /// Number of floors (fractional for split-level structures).
    pub num_floors: Option<f64>,
    /// Total assessed value in dollars.
    pub assessed_value: Option<f64>,
    /// Zoning codes the source record itself declares (`ZoneDist1..4`).
    /// Advisory only; the resolver computes districts geometrically.
    pub zoning_districts: Vec<String>,
    /// Parcel boundary (polygon or multipolygon, canonical CRS).
    pub geometry: Geometry,
}

/// A zoning district polygon. Codes repeat across disjoint polygons, so
/// identity is the code plus an ordinal assigned at import time.
#[derive(Debug, Clone)]
pub struct ZoningDistrict {
    /// Stable identifier: `"{code}#{ordinal}"`.
    pub id: String,
    /// Regulatory district code (e.g. `"R6"`), not unique.
    pub code: String,
    /// Regulatory class derived from the code.
    pub zoning_type: ZoningType,
    /// Residential floor-area ratio, when known.
    pub far_residential: Option<f64>,
    /// Commercial floor-area ratio, when known.
    pub far_commercial: Option<f64>,
    /// Height limit in feet, when known.
    pub max_height: Option<f64>,
    /// District boundary (polygon or multipolygon, canonical CRS).
    pub geometry: Geometry,
}

/// A designated landmark or historic district. Immutable after load.
#[derive(Debug, Clone)]
pub struct Landmark {
    /// Stable identifier (LPC number when present, else the name).
    pub id: String,
    /// Landmark name.
    pub name: String,
    /// Designation class.
    pub landmark_type: LandmarkType,
    /// Date of designation, when the source record carries one.
    pub designation_date: Option<NaiveDate>,
    /// Landmark location or boundary (canonical CRS).
    pub geometry: Geometry,
}

/// One zoning district's share of a resolved parcel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictEntry {
    /// Regulatory district code.
    pub code: String,
    /// Regulatory class of the district.
    pub zoning_type: ZoningType,
    /// Fraction of the parcel's area inside this district (0, 1].
    pub fraction: f64,
}

/// One landmark intersecting a resolved parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkEntry {
    /// Landmark identifier.
    pub id: String,
    /// Landmark name.
    pub name: String,
    /// Designation class.
    pub landmark_type: LandmarkType,
}

/// Readiness and counts for the currently published generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Whether the engine can serve lookups (parcels and zoning loaded).
    pub ready: bool,
    /// Parcels in the published generation.
    pub parcel_count: u64,
    /// Zoning districts in the published generation.
    pub zoning_count: u64,
    /// Landmarks in the published generation.
    pub landmark_count: u64,
}
