//! Coordinate types and the model-CRS projection.
//!
//! Two coordinate spaces coexist:
//!
//! - [`LatLon`] — WGS-84 geographic degrees, as read from OSM and GeoJSON.
//! - [`ProjPoint`] — the *model CRS*: a Transverse-Mercator plane in meters
//!   whose central meridian is the centroid longitude of the focus area.
//!
//! All distance-deterrence math and clustering happen in the model CRS.
//! `f64` is used throughout: the persisted routing matrix remaps entries by
//! exact lat-lon equality, which single precision would break.

use std::f64::consts::PI;

// ── LatLon ────────────────────────────────────────────────────────────────────

/// A WGS-84 geographic coordinate.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Bit-exact key for hash-map remapping of persisted matrices.
    #[inline]
    pub fn bit_key(self) -> (u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits())
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

// ── ProjPoint ─────────────────────────────────────────────────────────────────

/// A point in the projected model CRS (meters).
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ProjPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjPoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in meters.
    #[inline]
    pub fn distance_m(self, other: ProjPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ── Road segments ─────────────────────────────────────────────────────────────

/// One vertex of a road polyline.
///
/// `key` is a stable identifier shared across segments (the OSM node ID in
/// practice) so the network constructor can unify junctions without ever
/// seeing the source format.
#[derive(Copy, Clone, Debug)]
pub struct RoadVertex {
    pub key: i64,
    pub proj: ProjPoint,
    pub latlon: LatLon,
}

/// One drivable way: an ordered vertex polyline plus the attributes the
/// router needs.  Produced by the area extractor, consumed by
/// road-network construction.
#[derive(Clone, Debug)]
pub struct RoadSegment {
    /// At least two vertices.
    pub vertices: Vec<RoadVertex>,
    /// Assumed car speed for the whole segment, m/s.
    pub speed_mps: f64,
    /// `true` when the segment is traversable in vertex order only.
    pub oneway: bool,
}

// ── Transverse Mercator ───────────────────────────────────────────────────────

// WGS-84 ellipsoid.
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Transverse-Mercator projection centered on the focus area.
///
/// A one-off local projection in the spirit of a UTM zone whose central
/// meridian runs through the focus centroid, so east-west distortion stays
/// negligible across a city-scale model area.  Uses the standard series
/// expansion to third order in the ellipsoid eccentricity; round-trip error
/// is well under a meter within a few hundred km of the central meridian.
#[derive(Copy, Clone, Debug)]
pub struct TransverseMercator {
    /// Central meridian in degrees.
    pub central_lon: f64,
}

impl TransverseMercator {
    pub fn new(central_lon: f64) -> Self {
        Self { central_lon }
    }

    /// Project geographic degrees to model-CRS meters.
    pub fn to_model(&self, p: LatLon) -> ProjPoint {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);

        let lat = p.lat * PI / 180.0;
        let dlon = (p.lon - self.central_lon) * PI / 180.0;

        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let tan_lat = lat.tan();

        let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = ep2 * cos_lat * cos_lat;
        let a = cos_lat * dlon;

        let m = meridian_arc(lat);

        let x = n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);
        let y = m
            + n * tan_lat
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0);

        ProjPoint::new(x, y)
    }

    /// Inverse projection: model-CRS meters back to geographic degrees.
    pub fn to_latlon(&self, p: ProjPoint) -> LatLon {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        // Footpoint latitude from the meridian arc length.
        let m = p.y;
        let mu = m
            / (WGS84_A
                * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let cos1 = phi1.cos();
        let tan1 = phi1.tan();

        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let n1 = WGS84_A / (1.0 - e2 * sin1 * sin1).sqrt();
        let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
        let d = p.x / n1;

        let lat = phi1
            - (n1 * tan1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos1;

        LatLon::new(lat * 180.0 / PI, self.central_lon + lon * 180.0 / PI)
    }
}

/// Meridian arc length from the equator to latitude `lat` (radians).
fn meridian_arc(lat: f64) -> f64 {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2 * e2 * e2 / 1024.0)
                * (2.0 * lat).sin()
            + (15.0 * e2 * e2 / 256.0 + 45.0 * e2 * e2 * e2 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e2 * e2 * e2 / 3072.0) * (6.0 * lat).sin())
}
