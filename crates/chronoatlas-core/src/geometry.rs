//! Flat-degree geometry helpers for drawing on a world map.
//!
//! All math treats longitude/latitude as planar coordinates, with one degree of
//! latitude taken as [`KM_PER_DEGREE`] kilometres. Longitude is scaled by
//! `cos(latitude)` where a distance in kilometres is needed.

use kurbo::{ParamCurve, Point, QuadBez, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Kilometres per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Default number of angular steps when sampling a circle.
pub const DEFAULT_CIRCLE_STEPS: usize = 64;

/// Default number of steps when sampling a quadratic bezier.
pub const DEFAULT_BEZIER_STEPS: usize = 50;

/// Smallest number of steps a circle ring is sampled with.
pub const MIN_CIRCLE_STEPS: usize = 3;

/// A geographic coordinate in degrees.
///
/// Serialized as a `[lng, lat]` pair, the order map data sources expect.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a `[lng, lat]` ordered pair.
    pub const fn from_lng_lat(lng: f64, lat: f64) -> Self {
        Self { lat, lng }
    }

    /// Planar distance in degrees.
    pub fn distance_deg(self, other: LatLng) -> f64 {
        Point::from(self).distance(Point::from(other))
    }

    /// Approximate distance in kilometres, scaling longitude at this point's latitude.
    pub fn distance_km(self, other: LatLng) -> f64 {
        let dlat = (other.lat - self.lat) * KM_PER_DEGREE;
        let dlng = (other.lng - self.lng) * KM_PER_DEGREE * lat_scale(self.lat);
        dlat.hypot(dlng)
    }

    /// Check if two coordinates coincide within `epsilon` degrees.
    pub fn approx_eq(self, other: LatLng, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() <= epsilon && (self.lng - other.lng).abs() <= epsilon
    }
}

impl From<[f64; 2]> for LatLng {
    fn from(pair: [f64; 2]) -> Self {
        Self::from_lng_lat(pair[0], pair[1])
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(coord: LatLng) -> Self {
        [coord.lng, coord.lat]
    }
}

impl From<LatLng> for Point {
    fn from(coord: LatLng) -> Self {
        Point::new(coord.lng, coord.lat)
    }
}

impl From<Point> for LatLng {
    fn from(point: Point) -> Self {
        Self::from_lng_lat(point.x, point.y)
    }
}

/// `cos(latitude)`, kept away from zero so polar rings stay finite.
fn lat_scale(lat: f64) -> f64 {
    (lat * PI / 180.0).cos().abs().max(1e-6)
}

/// Sample a circle into a closed ring of `steps + 1` vertices.
///
/// `steps` below [`MIN_CIRCLE_STEPS`] is raised to it, so the ring always
/// encloses an area. The last vertex is an exact copy of the first. The same inputs always yield
/// the same ring, so stored circles re-render identically.
pub fn sample_circle(center: LatLng, radius_km: f64, steps: usize) -> Vec<LatLng> {
    let steps = steps.max(MIN_CIRCLE_STEPS);
    let r_deg = radius_km / KM_PER_DEGREE;
    let scale = lat_scale(center.lat);

    let mut ring = Vec::with_capacity(steps + 1);
    for i in 0..steps {
        let theta = (i as f64 / steps as f64) * 2.0 * PI;
        ring.push(LatLng::new(
            center.lat + r_deg * theta.sin(),
            center.lng + r_deg * theta.cos() / scale,
        ));
    }
    ring.push(ring[0]);
    ring
}

/// Sample a quadratic bezier at `t = i / steps` for `i` in `0..=steps`.
///
/// With `steps == 0` the curve degenerates to its two endpoints.
pub fn sample_bezier(start: LatLng, control: LatLng, end: LatLng, steps: usize) -> Vec<LatLng> {
    if steps == 0 {
        return vec![start, end];
    }
    let curve = QuadBez::new(Point::from(start), Point::from(control), Point::from(end));
    (0..=steps)
        .map(|i| LatLng::from(curve.eval(i as f64 / steps as f64)))
        .collect()
}

/// Result of projecting a point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentDistance {
    /// Planar distance in degrees.
    pub distance: f64,
    /// Closest point on the segment.
    pub closest: LatLng,
}

/// Distance from `point` to the segment `a -> b`, clamped to the segment.
///
/// A degenerate segment (`a == b`) measures the distance to `a`.
pub fn distance_to_segment(point: LatLng, a: LatLng, b: LatLng) -> SegmentDistance {
    let p = Point::from(point);
    let a_pt = Point::from(a);
    let seg: Vec2 = Point::from(b) - a_pt;
    let pv: Vec2 = p - a_pt;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return SegmentDistance {
            distance: pv.hypot(),
            closest: a,
        };
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a_pt + seg * t;
    SegmentDistance {
        distance: p.distance(proj),
        closest: LatLng::from(proj),
    }
}

/// Find the closest point on any of `polylines` strictly within `threshold_deg`.
///
/// Endpoints of every polyline are checked before its segments. Ties keep the
/// first candidate found, in input order.
pub fn find_snap_point<'a, I>(point: LatLng, polylines: I, threshold_deg: f64) -> Option<LatLng>
where
    I: IntoIterator<Item = &'a [LatLng]>,
{
    let mut best: Option<LatLng> = None;
    let mut best_dist = threshold_deg;

    let mut consider = |candidate: LatLng, dist: f64| {
        if dist < best_dist {
            best_dist = dist;
            best = Some(candidate);
        }
    };

    for line in polylines {
        let (Some(first), Some(last)) = (line.first(), line.last()) else {
            continue;
        };
        consider(*first, point.distance_deg(*first));
        consider(*last, point.distance_deg(*last));
        for w in line.windows(2) {
            let hit = distance_to_segment(point, w[0], w[1]);
            consider(hit.closest, hit.distance);
        }
    }
    best
}

/// Bounding box of a set of coordinates (x = lng, y = lat).
pub fn bounds(points: &[LatLng]) -> Option<Rect> {
    let first = Point::from(*points.first()?);
    Some(
        points
            .iter()
            .skip(1)
            .fold(Rect::from_points(first, first), |r, p| r.union_pt(Point::from(*p))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_circle_ring_is_closed() {
        let center = LatLng::new(48.0, 2.0);
        for steps in [3, 16, 64] {
            let ring = sample_circle(center, 250.0, steps);
            assert_eq!(ring.len(), steps + 1);
            assert_eq!(ring.first(), ring.last());
        }
    }

    #[test]
    fn test_circle_steps_floor() {
        let center = LatLng::new(0.0, 0.0);
        assert_eq!(sample_circle(center, 10.0, 1).len(), MIN_CIRCLE_STEPS + 1);
        assert_eq!(sample_circle(center, 10.0, 3).len(), 4);
    }

    #[test]
    fn test_circle_is_deterministic() {
        let center = LatLng::new(-33.9, 18.4);
        assert_eq!(sample_circle(center, 80.0, 64), sample_circle(center, 80.0, 64));
    }

    #[test]
    fn test_circle_radius_on_equator() {
        let ring = sample_circle(LatLng::new(0.0, 0.0), 111.0, 4);
        // theta = 0 walks east, theta = pi/2 walks north
        assert!((ring[0].lng - 1.0).abs() < EPS);
        assert!(ring[0].lat.abs() < EPS);
        assert!((ring[1].lat - 1.0).abs() < EPS);
    }

    #[test]
    fn test_circle_widens_with_latitude() {
        let ring = sample_circle(LatLng::new(60.0, 0.0), 111.0, 4);
        // cos(60deg) = 0.5, so one degree of radius spans two degrees of longitude
        assert!((ring[0].lng - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_bezier_matches_formula() {
        let (p0, p1, p2) = (
            LatLng::new(0.0, 0.0),
            LatLng::new(10.0, 5.0),
            LatLng::new(0.0, 10.0),
        );
        let steps = 50;
        let samples = sample_bezier(p0, p1, p2, steps);
        assert_eq!(samples.len(), steps + 1);
        for (i, s) in samples.iter().enumerate() {
            let t = i as f64 / steps as f64;
            let u = 1.0 - t;
            let lat = u * u * p0.lat + 2.0 * u * t * p1.lat + t * t * p2.lat;
            let lng = u * u * p0.lng + 2.0 * u * t * p1.lng + t * t * p2.lng;
            assert!((s.lat - lat).abs() < EPS);
            assert!((s.lng - lng).abs() < EPS);
        }
    }

    #[test]
    fn test_bezier_zero_steps() {
        let a = LatLng::new(1.0, 2.0);
        let b = LatLng::new(3.0, 4.0);
        assert_eq!(sample_bezier(a, LatLng::new(9.0, 9.0), b, 0), vec![a, b]);
    }

    #[test]
    fn test_distance_to_degenerate_segment() {
        let p = LatLng::new(3.0, 4.0);
        let a = LatLng::new(0.0, 0.0);
        let hit = distance_to_segment(p, a, a);
        assert!((hit.distance - 5.0).abs() < EPS);
        assert_eq!(hit.closest, a);
    }

    #[test]
    fn test_distance_to_segment_clamps() {
        let a = LatLng::from_lng_lat(0.0, 0.0);
        let b = LatLng::from_lng_lat(10.0, 0.0);
        let inside = distance_to_segment(LatLng::from_lng_lat(5.0, 2.0), a, b);
        assert!((inside.distance - 2.0).abs() < EPS);
        assert!((inside.closest.lng - 5.0).abs() < EPS);

        let beyond = distance_to_segment(LatLng::from_lng_lat(13.0, 4.0), a, b);
        assert!((beyond.distance - 5.0).abs() < EPS);
        assert_eq!(beyond.closest, b);
    }

    #[test]
    fn test_snap_none_outside_threshold() {
        let line = vec![LatLng::from_lng_lat(0.0, 0.0), LatLng::from_lng_lat(1.0, 0.0)];
        let lines = [line.as_slice()];
        assert!(find_snap_point(LatLng::from_lng_lat(0.5, 0.5), lines, 0.01).is_none());
    }

    #[test]
    fn test_snap_picks_closest_candidate() {
        let far = vec![LatLng::from_lng_lat(0.0, 0.008), LatLng::from_lng_lat(1.0, 0.008)];
        let near = vec![LatLng::from_lng_lat(0.0, -0.002), LatLng::from_lng_lat(1.0, -0.002)];
        let snapped = find_snap_point(
            LatLng::from_lng_lat(0.5, 0.0),
            [far.as_slice(), near.as_slice()],
            0.01,
        )
        .unwrap();
        assert!((snapped.lat + 0.002).abs() < EPS);
        assert!((snapped.lng - 0.5).abs() < EPS);
    }

    #[test]
    fn test_snap_tie_keeps_first() {
        let a = vec![LatLng::from_lng_lat(0.0, 0.005), LatLng::from_lng_lat(1.0, 0.005)];
        let b = vec![LatLng::from_lng_lat(0.0, -0.005), LatLng::from_lng_lat(1.0, -0.005)];
        let snapped =
            find_snap_point(LatLng::from_lng_lat(0.5, 0.0), [a.as_slice(), b.as_slice()], 0.01)
                .unwrap();
        assert!(snapped.lat > 0.0);
    }

    #[test]
    fn test_distance_km_one_degree_north() {
        let d = LatLng::new(0.0, 0.0).distance_km(LatLng::new(1.0, 0.0));
        assert!((d - 111.0).abs() < EPS);
    }

    #[test]
    fn test_latlng_serializes_lng_first() {
        let json = serde_json::to_string(&LatLng::new(10.0, 20.0)).unwrap();
        assert_eq!(json, "[20.0,10.0]");
        let back: LatLng = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LatLng::new(10.0, 20.0));
    }
}
