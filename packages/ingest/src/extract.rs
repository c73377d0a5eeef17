//! Per-kind record extraction from `GeoJSON` features.
//!
//! City open-data exports disagree on field casing and naming across
//! vintages, so every attribute is looked up through an ordered fallback
//! list. Extraction failures return a short, stable reason string that the
//! import loop aggregates into the report's skip counts.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use geojson::Feature;
use serde_json::Value;
use zoning_map_geometry::{Geometry, NormalizeError, RawGeometry, SourceCrs, normalize};
use zoning_map_models::{Bbl, Borough, Landmark, LandmarkType, Parcel, ZoningDistrict, ZoningType};

const BBL_FIELDS: &[&str] = &["BBL", "bbl"];
const BOROUGH_FIELDS: &[&str] = &["Borough", "BOROUGH", "BoroCode", "borocode"];
const BLOCK_FIELDS: &[&str] = &["Block", "BLOCK", "block"];
const LOT_FIELDS: &[&str] = &["Lot", "LOT", "lot"];
const ADDRESS_FIELDS: &[&str] = &["Address", "ADDRESS", "address"];
const LAND_USE_FIELDS: &[&str] = &["LandUse", "LANDUSE", "land_use"];
const LOT_AREA_FIELDS: &[&str] = &["LotArea", "LOTAREA", "lot_area"];
const YEAR_BUILT_FIELDS: &[&str] = &["YearBuilt", "YEARBUILT", "year_built"];
const NUM_FLOORS_FIELDS: &[&str] = &["NumFloors", "NUMFLOORS", "num_floors"];
const ASSESSED_FIELDS: &[&str] = &["AssessTot", "ASSESSTOT", "assessed_value"];
const ZONE_DIST_FIELDS: &[&str] = &["ZoneDist1", "ZoneDist2", "ZoneDist3", "ZoneDist4"];

const DISTRICT_CODE_FIELDS: &[&str] = &[
    "ZONEDIST",
    "ZONEDIST1",
    "ZONE",
    "ZONING",
    "ZONING_CODE",
    "zonedist",
];
const FAR_RESIDENTIAL_FIELDS: &[&str] = &["RESIDFAR", "ResidFAR", "residfar"];
const FAR_COMMERCIAL_FIELDS: &[&str] = &["COMMFAR", "CommFAR", "commfar"];
const MAX_HEIGHT_FIELDS: &[&str] = &["MAXHEIGHT", "MaxHeight", "max_height"];

const LANDMARK_ID_FIELDS: &[&str] = &["LPC_NUMBER", "LP_NUMBER", "lpc_number"];
const LANDMARK_NAME_FIELDS: &[&str] = &["NAME", "LM_NAME", "AREA_NAME", "name"];
const LANDMARK_TYPE_FIELDS: &[&str] = &["TYPE", "LM_TYPE", "LANDMARK_TYPE", "type"];
const DESIGNATION_DATE_FIELDS: &[&str] = &["DESDATE", "DATE_DESIG", "designation_date"];

/// Extracts a [`Parcel`] from a MapPLUTO-style feature.
pub(crate) fn parcel(feature: &Feature, source_crs: SourceCrs) -> Result<Parcel, String> {
    let bbl = parcel_bbl(feature)?;
    let geometry = feature_geometry(feature, source_crs)?;
    if matches!(geometry, Geometry::Point(_)) {
        return Err("parcel geometry must be polygonal".to_string());
    }

    let zoning_districts = ZONE_DIST_FIELDS
        .iter()
        .filter_map(|&field| text(feature, &[field]))
        .collect();

    Ok(Parcel {
        bbl,
        address: text(feature, ADDRESS_FIELDS),
        land_use: text(feature, LAND_USE_FIELDS),
        lot_area: number(feature, LOT_AREA_FIELDS),
        year_built: number(feature, YEAR_BUILT_FIELDS).map(|y| y as i32).filter(|y| *y > 0),
        num_floors: number(feature, NUM_FLOORS_FIELDS),
        assessed_value: number(feature, ASSESSED_FIELDS),
        zoning_districts,
        geometry,
    })
}

/// Extracts a [`ZoningDistrict`], assigning the next per-code ordinal so
/// repeated codes across disjoint polygons stay uniquely identified.
pub(crate) fn zoning_district(
    feature: &Feature,
    source_crs: SourceCrs,
    ordinals: &mut BTreeMap<String, u32>,
) -> Result<ZoningDistrict, String> {
    let code =
        text(feature, DISTRICT_CODE_FIELDS).ok_or_else(|| "missing district code".to_string())?;
    let geometry = feature_geometry(feature, source_crs)?;
    if matches!(geometry, Geometry::Point(_)) {
        return Err("district geometry must be polygonal".to_string());
    }

    let ordinal = ordinals.entry(code.clone()).or_insert(0);
    let id = format!("{code}#{ordinal}");
    *ordinal += 1;

    Ok(ZoningDistrict {
        id,
        zoning_type: ZoningType::from_code(&code),
        code,
        far_residential: number(feature, FAR_RESIDENTIAL_FIELDS),
        far_commercial: number(feature, FAR_COMMERCIAL_FIELDS),
        max_height: number(feature, MAX_HEIGHT_FIELDS),
        geometry,
    })
}

/// Extracts a [`Landmark`]; the LPC number is the id when present, else
/// the landmark name.
pub(crate) fn landmark(feature: &Feature, source_crs: SourceCrs) -> Result<Landmark, String> {
    let name =
        text(feature, LANDMARK_NAME_FIELDS).ok_or_else(|| "missing landmark name".to_string())?;
    let id = text(feature, LANDMARK_ID_FIELDS).unwrap_or_else(|| name.clone());
    let landmark_type = text(feature, LANDMARK_TYPE_FIELDS)
        .map_or(LandmarkType::Individual, |label| {
            LandmarkType::from_label(&label)
        });
    let designation_date =
        text(feature, DESIGNATION_DATE_FIELDS).and_then(|raw| parse_date(&raw));
    let geometry = feature_geometry(feature, source_crs)?;

    Ok(Landmark {
        id,
        name,
        landmark_type,
        designation_date,
        geometry,
    })
}

/// Reads the BBL field, or composes one from borough/block/lot columns
/// when the export carries the components instead.
fn parcel_bbl(feature: &Feature) -> Result<Bbl, String> {
    if let Some(raw) = text(feature, BBL_FIELDS) {
        // BBLs arrive as strings, integers, or floats with a trailing
        // ".0"; keep the integer digits and restore the fixed width.
        let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
        let padded = format!("{digits:0>10}");
        return Bbl::parse(&padded).map_err(|err| format!("invalid BBL: {err}"));
    }

    let borough = text(feature, BOROUGH_FIELDS)
        .and_then(|label| Borough::from_label(&label))
        .ok_or_else(|| "missing or unknown borough".to_string())?;
    let block = number(feature, BLOCK_FIELDS).ok_or_else(|| "missing tax block".to_string())?;
    let lot = number(feature, LOT_FIELDS).ok_or_else(|| "missing tax lot".to_string())?;

    Bbl::new(borough, block as u32, lot as u16).map_err(|err| format!("invalid BBL: {err}"))
}

fn feature_geometry(feature: &Feature, source_crs: SourceCrs) -> Result<Geometry, String> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| "missing geometry".to_string())?;
    let raw = RawGeometry::from_geojson(geometry).map_err(normalize_reason)?;
    normalize(&raw, source_crs).map_err(normalize_reason)
}

/// Maps a normalization failure to a stable reason bucket; the variant
/// payloads (coordinates, gap widths) would blow up reason cardinality.
fn normalize_reason(err: NormalizeError) -> String {
    match err {
        NormalizeError::Empty => "empty geometry",
        NormalizeError::NonFiniteCoordinate => "non-finite coordinate",
        NormalizeError::OutOfEnvelope { .. } => "coordinate outside NYC envelope",
        NormalizeError::NotEnoughVertices { .. } => "degenerate ring",
        NormalizeError::UnclosedRing { .. } => "unclosed ring",
        NormalizeError::SelfIntersection => "self-intersecting ring",
        NormalizeError::UnsupportedGeometry { .. } => "unsupported geometry type",
    }
    .to_string()
}

/// First non-empty string among the fallback fields; numbers render as
/// text so numeric exports of nominally-text columns still match.
fn text(feature: &Feature, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match feature.property(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// First numeric value among the fallback fields, accepting numeric
/// strings.
fn number(feature: &Feature, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| match feature.property(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Parses the date formats landmark exports use, with or without a time
/// suffix.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split(['T', ' ']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%m/%d/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(properties: serde_json::Value, geometry: Option<geojson::Value>) -> Feature {
        Feature {
            bbox: None,
            geometry: geometry.map(geojson::Geometry::new),
            id: None,
            properties: match properties {
                Value::Object(map) => Some(map),
                _ => None,
            },
            foreign_members: None,
        }
    }

    fn square(min_lon: f64, min_lat: f64) -> geojson::Value {
        let max_lon = min_lon + 0.001;
        let max_lat = min_lat + 0.001;
        geojson::Value::Polygon(vec![vec![
            vec![min_lon, min_lat],
            vec![max_lon, min_lat],
            vec![max_lon, max_lat],
            vec![min_lon, max_lat],
            vec![min_lon, min_lat],
        ]])
    }

    #[test]
    fn parses_parcel_with_string_bbl() {
        let parcel = parcel(
            &feature(
                json!({"BBL": "1000120001", "Address": "1 Centre St", "ZoneDist1": "R6"}),
                Some(square(-74.006, 40.712)),
            ),
            SourceCrs::Wgs84,
        )
        .unwrap();

        assert_eq!(parcel.bbl.to_string(), "1000120001");
        assert_eq!(parcel.address.as_deref(), Some("1 Centre St"));
        assert_eq!(parcel.zoning_districts, vec!["R6".to_string()]);
    }

    #[test]
    fn pads_and_truncates_numeric_bbls() {
        // Integer export.
        let parcel_int = parcel(
            &feature(json!({"BBL": 1_000_120_001_i64}), Some(square(-74.006, 40.712))),
            SourceCrs::Wgs84,
        )
        .unwrap();
        assert_eq!(parcel_int.bbl.to_string(), "1000120001");

        // Float export with a trailing ".0".
        let parcel_float = parcel(
            &feature(json!({"BBL": 1_000_120_001.0}), Some(square(-74.006, 40.712))),
            SourceCrs::Wgs84,
        )
        .unwrap();
        assert_eq!(parcel_float.bbl.to_string(), "1000120001");
    }

    #[test]
    fn composes_bbl_from_borough_block_lot() {
        let parcel = parcel(
            &feature(
                json!({"Borough": "MN", "Block": 12, "Lot": 3}),
                Some(square(-74.006, 40.712)),
            ),
            SourceCrs::Wgs84,
        )
        .unwrap();
        assert_eq!(parcel.bbl.to_string(), "1000120003");
    }

    #[test]
    fn rejects_parcel_without_identity() {
        let err = parcel(
            &feature(json!({"Address": "nowhere"}), Some(square(-74.006, 40.712))),
            SourceCrs::Wgs84,
        )
        .unwrap_err();
        assert_eq!(err, "missing or unknown borough");
    }

    #[test]
    fn rejects_parcel_without_geometry() {
        let err = parcel(&feature(json!({"BBL": "1000120001"}), None), SourceCrs::Wgs84)
            .unwrap_err();
        assert_eq!(err, "missing geometry");
    }

    #[test]
    fn rejects_point_parcel_geometry() {
        let err = parcel(
            &feature(
                json!({"BBL": "1000120001"}),
                Some(geojson::Value::Point(vec![-74.006, 40.712])),
            ),
            SourceCrs::Wgs84,
        )
        .unwrap_err();
        assert_eq!(err, "parcel geometry must be polygonal");
    }

    #[test]
    fn assigns_per_code_ordinals_to_districts() {
        let mut ordinals = BTreeMap::new();
        let first = zoning_district(
            &feature(json!({"ZONEDIST": "R6"}), Some(square(-74.006, 40.712))),
            SourceCrs::Wgs84,
            &mut ordinals,
        )
        .unwrap();
        let second = zoning_district(
            &feature(json!({"ZONEDIST": "R6"}), Some(square(-74.002, 40.712))),
            SourceCrs::Wgs84,
            &mut ordinals,
        )
        .unwrap();
        let other = zoning_district(
            &feature(json!({"ZONEDIST": "C4-2"}), Some(square(-74.004, 40.714))),
            SourceCrs::Wgs84,
            &mut ordinals,
        )
        .unwrap();

        assert_eq!(first.id, "R6#0");
        assert_eq!(second.id, "R6#1");
        assert_eq!(other.id, "C4-2#0");
        assert_eq!(other.zoning_type, ZoningType::Commercial);
    }

    #[test]
    fn parses_landmark_with_date_and_type() {
        let landmark = landmark(
            &feature(
                json!({
                    "LPC_NUMBER": "LP-00099",
                    "NAME": "Greenwich Village Historic District",
                    "TYPE": "Historic District",
                    "DESDATE": "1969-04-29T00:00:00"
                }),
                Some(square(-74.003, 40.733)),
            ),
            SourceCrs::Wgs84,
        )
        .unwrap();

        assert_eq!(landmark.id, "LP-00099");
        assert_eq!(landmark.landmark_type, LandmarkType::HistoricDistrict);
        assert_eq!(
            landmark.designation_date,
            NaiveDate::from_ymd_opt(1969, 4, 29)
        );
    }

    #[test]
    fn landmark_falls_back_to_name_as_id() {
        let landmark = landmark(
            &feature(
                json!({"NAME": "City Hall", "DATE_DESIG": "02/01/1966"}),
                Some(geojson::Value::Point(vec![-74.0064, 40.7127])),
            ),
            SourceCrs::Wgs84,
        )
        .unwrap();

        assert_eq!(landmark.id, "City Hall");
        assert_eq!(landmark.landmark_type, LandmarkType::Individual);
        assert_eq!(
            landmark.designation_date,
            NaiveDate::from_ymd_opt(1966, 2, 1)
        );
    }

    #[test]
    fn buckets_normalization_failures() {
        // Chicago coordinates fail the NYC envelope.
        let err = parcel(
            &feature(json!({"BBL": "1000120001"}), Some(square(-87.63, 41.88))),
            SourceCrs::Wgs84,
        )
        .unwrap_err();
        assert_eq!(err, "coordinate outside NYC envelope");
    }
}
