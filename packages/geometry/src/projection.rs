//! WGS84 → EPSG:2263 forward projection.
//!
//! Closed-form Lambert Conformal Conic (2SP, GRS80) with the EPSG:2263
//! parameters: standard parallels 40°40'N / 41°02'N, origin 40°10'N
//! 74°00'W, false easting 984,250 US survey feet. Computed in meters and
//! converted to feet at the end, so the ellipsoid constants stay in their
//! published units.

use std::f64::consts::FRAC_PI_4;
use std::sync::OnceLock;

/// GRS80 semi-major axis, meters.
const SEMI_MAJOR_M: f64 = 6_378_137.0;
/// GRS80 flattening.
const FLATTENING: f64 = 1.0 / 298.257_222_101;

/// Northern standard parallel, 41°02'N.
const LAT_1_DEG: f64 = 41.0 + 2.0 / 60.0;
/// Southern standard parallel, 40°40'N.
const LAT_2_DEG: f64 = 40.0 + 40.0 / 60.0;
/// Latitude of origin, 40°10'N.
const LAT_0_DEG: f64 = 40.0 + 10.0 / 60.0;
/// Central meridian, 74°00'W.
const LON_0_DEG: f64 = -74.0;

/// EPSG:2263 false easting, US survey feet.
const FALSE_EASTING_FT: f64 = 984_250.0;
/// Meters per US survey foot.
const METERS_PER_US_FT: f64 = 0.304_800_609_601_219_2;

/// Precomputed cone constants, derived once from the EPSG parameters.
struct ConeConstants {
    /// First eccentricity.
    e: f64,
    /// Cone constant `n`.
    n: f64,
    /// `a * F` (Snyder's notation), meters.
    af: f64,
    /// Radius of the origin parallel, meters.
    rho_0: f64,
}

static CONE: OnceLock<ConeConstants> = OnceLock::new();

fn cone() -> &'static ConeConstants {
    CONE.get_or_init(|| {
        let e = FLATTENING.mul_add(-FLATTENING, 2.0 * FLATTENING).sqrt();
        let phi_1 = LAT_1_DEG.to_radians();
        let phi_2 = LAT_2_DEG.to_radians();
        let phi_0 = LAT_0_DEG.to_radians();

        let m_1 = m_factor(e, phi_1);
        let m_2 = m_factor(e, phi_2);
        let t_1 = t_factor(e, phi_1);
        let t_2 = t_factor(e, phi_2);
        let t_0 = t_factor(e, phi_0);

        let n = (m_1.ln() - m_2.ln()) / (t_1.ln() - t_2.ln());
        let af = SEMI_MAJOR_M * m_1 / (n * t_1.powf(n));
        let rho_0 = af * t_0.powf(n);

        ConeConstants { e, n, af, rho_0 }
    })
}

/// Snyder's `m(φ)`: parallel radius scale factor.
fn m_factor(e: f64, phi: f64) -> f64 {
    let es = e * phi.sin();
    phi.cos() / es.mul_add(-es, 1.0).sqrt()
}

/// Snyder's `t(φ)`: isometric colatitude term.
fn t_factor(e: f64, phi: f64) -> f64 {
    let es = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

/// Projects a WGS84 coordinate into EPSG:2263 state-plane feet.
///
/// Pure function of its inputs. Callers are responsible for range-checking
/// the input first; coordinates far outside the projection's valid zone
/// produce mathematically defined but meaningless output.
#[must_use]
pub fn wgs84_to_state_plane(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let c = cone();
    let phi = lat_deg.to_radians();
    let lam = lon_deg.to_radians();

    let rho = c.af * t_factor(c.e, phi).powf(c.n);
    let theta = c.n * (lam - LON_0_DEG.to_radians());

    let east_m = rho * theta.sin();
    let north_m = rho.mul_add(-theta.cos(), c.rho_0);

    (
        east_m / METERS_PER_US_FT + FALSE_EASTING_FT,
        north_m / METERS_PER_US_FT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_origin_to_false_easting() {
        let (x, y) = wgs84_to_state_plane(LON_0_DEG, LAT_0_DEG);
        assert!((x - FALSE_EASTING_FT).abs() < 0.01, "x = {x}");
        assert!(y.abs() < 0.01, "y = {y}");
    }

    #[test]
    fn projects_city_hall_into_manhattan_range() {
        // NYC City Hall; published EPSG:2263 coordinates are roughly
        // (981,300 ft, 198,800 ft).
        let (x, y) = wgs84_to_state_plane(-74.006, 40.7128);
        assert!((975_000.0..=988_000.0).contains(&x), "x = {x}");
        assert!((193_000.0..=205_000.0).contains(&y), "y = {y}");
    }

    #[test]
    fn easting_increases_with_longitude() {
        let (x_west, _) = wgs84_to_state_plane(-74.1, 40.7);
        let (x_east, _) = wgs84_to_state_plane(-73.9, 40.7);
        assert!(x_east > x_west);
    }

    #[test]
    fn northing_increases_with_latitude() {
        let (_, y_south) = wgs84_to_state_plane(-74.0, 40.6);
        let (_, y_north) = wgs84_to_state_plane(-74.0, 40.8);
        assert!(y_north > y_south);
    }

    #[test]
    fn one_degree_of_longitude_is_a_plausible_distance() {
        // At NYC latitudes a degree of longitude spans roughly 52 miles;
        // make sure the cone scale is in the right ballpark (within 10%).
        let (x_a, _) = wgs84_to_state_plane(-74.0, 40.7);
        let (x_b, _) = wgs84_to_state_plane(-73.0, 40.7);
        let feet = x_b - x_a;
        assert!((250_000.0..=305_000.0).contains(&feet), "feet = {feet}");
    }
}
