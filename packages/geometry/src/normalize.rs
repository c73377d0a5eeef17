//! Normalizes raw source geometries into canonical [`Geometry`] values.
//!
//! Handles both geometry shape repair (ring closing, duplicate-vertex
//! removal) and CRS normalization (WGS84 degrees → state-plane feet).
//! Everything here is pure: a raw record either becomes a valid canonical
//! geometry or a [`NormalizeError`] explaining why it was rejected.

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};

use crate::{Geometry, NormalizeError, SourceCrs, projection};

/// Guard envelope for WGS84 input, `[lon, lat]` degrees.
///
/// Generously covers the five boroughs; anything outside is treated as
/// corrupt source data rather than silently loaded.
const WGS84_ENVELOPE: ((f64, f64), (f64, f64)) = ((-74.5, 40.3), (-73.4, 41.1));

/// Guard envelope for canonical input, state-plane feet.
const STATE_PLANE_ENVELOPE: ((f64, f64), (f64, f64)) =
    ((800_000.0, 30_000.0), (1_200_000.0, 350_000.0));

/// Consecutive vertices closer than this (canonical feet) collapse to one.
const DEDUP_TOLERANCE_FT: f64 = 0.01;

/// Ring endpoints within this distance (canonical feet) auto-close;
/// farther apart, the ring is rejected as unclosed.
const CLOSE_TOLERANCE_FT: f64 = 1.0;

/// Raw coordinate data extracted from a source record, before any
/// validation or reprojection.
///
/// This is the adapter seam: each source format contributes a conversion
/// into `RawGeometry` (currently `GeoJSON` via [`RawGeometry::from_geojson`])
/// and everything downstream is format-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGeometry {
    /// A single position.
    Point([f64; 2]),
    /// Rings of positions; first ring is the exterior, the rest are holes.
    Polygon(Vec<Vec<[f64; 2]>>),
    /// One set of rings per member polygon.
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

impl RawGeometry {
    /// Extracts raw coordinates from a `GeoJSON` geometry.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::UnsupportedGeometry`] for geometry types
    /// the engine does not model (lines, multipoints, collections) and
    /// [`NormalizeError::Empty`] for malformed positions.
    pub fn from_geojson(geometry: &geojson::Geometry) -> Result<Self, NormalizeError> {
        use geojson::Value;

        match &geometry.value {
            Value::Point(position) => Ok(Self::Point(position_to_pair(position)?)),
            Value::Polygon(rings) => Ok(Self::Polygon(rings_to_pairs(rings)?)),
            Value::MultiPolygon(polygons) => Ok(Self::MultiPolygon(
                polygons
                    .iter()
                    .map(|rings| rings_to_pairs(rings))
                    .collect::<Result<_, _>>()?,
            )),
            other => Err(NormalizeError::UnsupportedGeometry {
                kind: other.type_name().to_string(),
            }),
        }
    }
}

fn position_to_pair(position: &[f64]) -> Result<[f64; 2], NormalizeError> {
    if position.len() < 2 {
        return Err(NormalizeError::Empty);
    }
    // Trailing altitude values are dropped.
    Ok([position[0], position[1]])
}

fn rings_to_pairs(rings: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<[f64; 2]>>, NormalizeError> {
    if rings.is_empty() {
        return Err(NormalizeError::Empty);
    }
    rings
        .iter()
        .map(|ring| ring.iter().map(|p| position_to_pair(p)).collect())
        .collect()
}

/// Normalizes a raw geometry into the canonical CRS.
///
/// Validates coordinates against the NYC guard envelope, reprojects WGS84
/// input to state-plane feet, removes consecutive duplicate vertices,
/// auto-closes rings within tolerance, and rejects degenerate or
/// self-intersecting rings. Normalizing an already-canonical output again
/// (with [`SourceCrs::StatePlane`]) is a no-op.
///
/// # Errors
///
/// Returns a [`NormalizeError`] describing the first violation found.
pub fn normalize(raw: &RawGeometry, source_crs: SourceCrs) -> Result<Geometry, NormalizeError> {
    match raw {
        RawGeometry::Point(position) => {
            let [x, y] = to_canonical(*position, source_crs)?;
            Ok(Geometry::Point(Point::new(x, y)))
        }
        RawGeometry::Polygon(rings) => Ok(Geometry::Polygon(normalize_polygon(rings, source_crs)?)),
        RawGeometry::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return Err(NormalizeError::Empty);
            }
            let members = polygons
                .iter()
                .map(|rings| normalize_polygon(rings, source_crs))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Geometry::MultiPolygon(MultiPolygon(members)))
        }
    }
}

fn normalize_polygon(
    rings: &[Vec<[f64; 2]>],
    source_crs: SourceCrs,
) -> Result<Polygon<f64>, NormalizeError> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Err(NormalizeError::Empty);
    };

    let exterior = normalize_ring(exterior, source_crs)?;
    let interiors = interiors
        .iter()
        .map(|ring| normalize_ring(ring, source_crs))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

/// Normalizes one ring into an open vertex sequence; `Polygon::new`
/// closes the resulting [`LineString`].
fn normalize_ring(
    ring: &[[f64; 2]],
    source_crs: SourceCrs,
) -> Result<LineString<f64>, NormalizeError> {
    if ring.is_empty() {
        return Err(NormalizeError::Empty);
    }

    // Project first so both tolerances apply in canonical feet.
    let mut vertices: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
    for position in ring {
        let projected = to_canonical(*position, source_crs)?;
        // Strip consecutive duplicates as we go.
        if let Some(last) = vertices.last()
            && distance(*last, projected) <= DEDUP_TOLERANCE_FT
        {
            continue;
        }
        vertices.push(projected);
    }

    // Merge the explicit closing vertex (or auto-close a near-closed ring).
    if vertices.len() >= 2 {
        let gap_ft = distance(vertices[0], vertices[vertices.len() - 1]);
        if gap_ft <= CLOSE_TOLERANCE_FT {
            vertices.pop();
        } else {
            return Err(NormalizeError::UnclosedRing { gap_ft });
        }
    }

    if vertices.len() < 3 {
        return Err(NormalizeError::NotEnoughVertices {
            count: vertices.len(),
        });
    }

    if ring_self_intersects(&vertices) {
        return Err(NormalizeError::SelfIntersection);
    }

    Ok(LineString::from(
        vertices
            .into_iter()
            .map(|[x, y]| Coord { x, y })
            .collect::<Vec<_>>(),
    ))
}

/// Validates a source position and projects it into canonical feet.
fn to_canonical(position: [f64; 2], source_crs: SourceCrs) -> Result<[f64; 2], NormalizeError> {
    let [x, y] = position;
    if !x.is_finite() || !y.is_finite() {
        return Err(NormalizeError::NonFiniteCoordinate);
    }

    let envelope = match source_crs {
        SourceCrs::Wgs84 => WGS84_ENVELOPE,
        SourceCrs::StatePlane => STATE_PLANE_ENVELOPE,
    };
    let ((min_x, min_y), (max_x, max_y)) = envelope;
    if x < min_x || x > max_x || y < min_y || y > max_y {
        return Err(NormalizeError::OutOfEnvelope { x, y });
    }

    match source_crs {
        SourceCrs::Wgs84 => {
            let (east, north) = projection::wgs84_to_state_plane(x, y);
            Ok([east, north])
        }
        SourceCrs::StatePlane => Ok([x, y]),
    }
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx.hypot(dy)
}

/// Cross product orientation of `c` relative to segment `a -> b`.
fn orientation(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]).mul_add(c[1] - a[1], -((b[1] - a[1]) * (c[0] - a[0])))
}

/// Whether segments `a1 -> a2` and `b1 -> b2` properly cross (strict
/// crossing; shared endpoints do not count).
fn segments_cross(a1: [f64; 2], a2: [f64; 2], b1: [f64; 2], b2: [f64; 2]) -> bool {
    let d1 = orientation(a1, a2, b1);
    let d2 = orientation(a1, a2, b2);
    let d3 = orientation(b1, b2, a1);
    let d4 = orientation(b1, b2, a2);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// O(n²) proper-crossing test over a ring given as an open vertex list.
///
/// Adjacent segments (including the closing wrap) share an endpoint and
/// are skipped. Parcel and district rings are small enough that the
/// quadratic scan is not worth replacing with a sweep.
fn ring_self_intersects(vertices: &[[f64; 2]]) -> bool {
    let n = vertices.len();
    for i in 0..n {
        for j in (i + 1)..n {
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (a1, a2) = (vertices[i], vertices[(i + 1) % n]);
            let (b1, b2) = (vertices[j], vertices[(j + 1) % n]);
            if segments_cross(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;

    /// A unit-ish square in state-plane feet near City Hall.
    fn square_ring() -> Vec<[f64; 2]> {
        vec![
            [980_000.0, 195_000.0],
            [980_100.0, 195_000.0],
            [980_100.0, 195_100.0],
            [980_000.0, 195_100.0],
            [980_000.0, 195_000.0],
        ]
    }

    #[test]
    fn normalizes_closed_square() {
        let raw = RawGeometry::Polygon(vec![square_ring()]);
        let geometry = normalize(&raw, SourceCrs::StatePlane).unwrap();
        let Geometry::Polygon(polygon) = geometry else {
            panic!("expected polygon");
        };
        // geo stores rings closed: 4 vertices + closing duplicate.
        assert_eq!(polygon.exterior().0.len(), 5);
        assert!((polygon.unsigned_area() - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn auto_closes_ring_within_tolerance() {
        let mut ring = square_ring();
        // Nudge the closing vertex half a foot away from the first.
        let last = ring.last_mut().unwrap();
        last[0] += 0.5;
        let raw = RawGeometry::Polygon(vec![ring]);
        let geometry = normalize(&raw, SourceCrs::StatePlane).unwrap();
        let Geometry::Polygon(polygon) = geometry else {
            panic!("expected polygon");
        };
        assert!(polygon.exterior().is_closed());
    }

    #[test]
    fn rejects_ring_with_wide_gap() {
        let mut ring = square_ring();
        ring.pop(); // drop the closing vertex entirely
        let raw = RawGeometry::Polygon(vec![ring]);
        let err = normalize(&raw, SourceCrs::StatePlane).unwrap_err();
        assert!(matches!(err, NormalizeError::UnclosedRing { gap_ft } if gap_ft > 1.0));
    }

    #[test]
    fn removes_consecutive_duplicate_vertices() {
        let mut ring = square_ring();
        ring.insert(1, [980_000.0, 195_000.0]);
        ring.insert(3, [980_100.000_001, 195_000.0]);
        let raw = RawGeometry::Polygon(vec![ring]);
        let geometry = normalize(&raw, SourceCrs::StatePlane).unwrap();
        let Geometry::Polygon(polygon) = geometry else {
            panic!("expected polygon");
        };
        assert_eq!(polygon.exterior().0.len(), 5);
    }

    #[test]
    fn rejects_degenerate_ring() {
        let raw = RawGeometry::Polygon(vec![vec![
            [980_000.0, 195_000.0],
            [980_100.0, 195_000.0],
            [980_000.0, 195_000.0],
        ]]);
        let err = normalize(&raw, SourceCrs::StatePlane).unwrap_err();
        assert!(matches!(err, NormalizeError::NotEnoughVertices { count: 2 }));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let raw = RawGeometry::Point([f64::NAN, 195_000.0]);
        assert_eq!(
            normalize(&raw, SourceCrs::StatePlane),
            Err(NormalizeError::NonFiniteCoordinate)
        );
    }

    #[test]
    fn rejects_coordinates_outside_envelope() {
        // Chicago is not in the five boroughs.
        let raw = RawGeometry::Point([-87.63, 41.88]);
        let err = normalize(&raw, SourceCrs::Wgs84).unwrap_err();
        assert!(matches!(err, NormalizeError::OutOfEnvelope { .. }));
    }

    #[test]
    fn rejects_self_intersecting_bowtie() {
        let raw = RawGeometry::Polygon(vec![vec![
            [980_000.0, 195_000.0],
            [980_100.0, 195_100.0],
            [980_100.0, 195_000.0],
            [980_000.0, 195_100.0],
            [980_000.0, 195_000.0],
        ]]);
        assert_eq!(
            normalize(&raw, SourceCrs::StatePlane),
            Err(NormalizeError::SelfIntersection)
        );
    }

    #[test]
    fn rejects_unsupported_geojson_types() {
        let line = geojson::Geometry::new(geojson::Value::LineString(vec![
            vec![-74.0, 40.7],
            vec![-74.01, 40.71],
        ]));
        let err = RawGeometry::from_geojson(&line).unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedGeometry { .. }));
    }

    #[test]
    fn reprojects_wgs84_input_into_canonical_range() {
        let raw = RawGeometry::Point([-74.006, 40.7128]);
        let Geometry::Point(point) = normalize(&raw, SourceCrs::Wgs84).unwrap() else {
            panic!("expected point");
        };
        assert!((900_000.0..=1_050_000.0).contains(&point.x()));
        assert!((150_000.0..=250_000.0).contains(&point.y()));
    }

    #[test]
    fn normalization_is_idempotent_on_canonical_output() {
        let raw = RawGeometry::Polygon(vec![square_ring()]);
        let first = normalize(&raw, SourceCrs::StatePlane).unwrap();

        let Geometry::Polygon(polygon) = &first else {
            panic!("expected polygon");
        };
        let round_trip = RawGeometry::Polygon(vec![
            polygon.exterior().0.iter().map(|c| [c.x, c.y]).collect(),
        ]);
        let second = normalize(&round_trip, SourceCrs::StatePlane).unwrap();
        assert_eq!(first, second);
    }
}
