//! Geodesic placement: assign (lat, lon) positions satisfying pairwise
//! maximum-distance bounds.

use std::collections::HashMap;

use crate::model::GeoPoint;
use crate::rng::RunRng;

use super::REJECTION_LIMIT;

/// One weighted constraint edge: entities `a` and `b` must end up within
/// `max_meters` of each other.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoEdge {
    pub a: String,
    pub b: String,
    pub max_meters: f64,
}

impl GeoEdge {
    pub fn new(a: impl Into<String>, b: impl Into<String>, max_meters: f64) -> Self {
        Self { a: a.into(), b: b.into(), max_meters }
    }
}

/// Mean earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Decimal degrees of latitude per meter.
const DEG_PER_METER: f64 = 1.0 / 111_300.0;

/// Haversine great-circle distance in meters.
pub fn geodesic_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Random point within `distance_m` of `origin`, uniform by area.
///
/// The `√u` transform spreads samples uniformly over the disk instead of
/// clustering them at the center; the east-west component is corrected by
/// the cosine of the origin latitude.
pub fn rand_lat_lon(rng: &mut RunRng, origin: GeoPoint, distance_m: f64) -> GeoPoint {
    let r = distance_m * DEG_PER_METER;
    let w = r * rng.unit().sqrt();
    let t = 2.0 * std::f64::consts::PI * rng.unit();

    let dlat = w * t.sin();
    let dlon = w * t.cos() / origin.lat.to_radians().cos();
    GeoPoint::new(origin.lat + dlat, origin.lon + dlon)
}

/// Place every entity referenced by `edges`, starting from a caller-supplied
/// anchor, so that each edge's distance bound holds.
///
/// Frontier algorithm: the next entity to place is the unplaced one with a
/// placed neighbor, ordered tightest (smallest-radius) edge first with
/// declaration order breaking ties. Candidates are disk-sampled inside the
/// tightest binding edge's radius and reject-resampled until every
/// placed-neighbor bound is satisfied. When a disconnected component
/// remains, a fresh anchor is seeded at the *first* placed entity's location
/// — an arbitrary choice, so those cross-component distances carry no
/// meaning and violations there are logged by the final verification pass.
pub fn place_geo(
    edges: &[GeoEdge],
    anchor_id: &str,
    anchor_pos: GeoPoint,
    rng: &mut RunRng,
) -> HashMap<String, GeoPoint> {
    let mut placed: HashMap<String, GeoPoint> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    placed.insert(anchor_id.to_owned(), anchor_pos);
    order.push(anchor_id.to_owned());

    loop {
        let Some(target) = next_placeable(edges, &placed) else {
            // Disconnected component: reseed at the first placed location.
            let Some(edge) = edges
                .iter()
                .find(|e| !placed.contains_key(&e.a) && !placed.contains_key(&e.b))
            else {
                break;
            };
            let seed = placed[&order[0]];
            placed.insert(edge.a.clone(), seed);
            order.push(edge.a.clone());
            continue;
        };

        let position = sample_position(edges, &placed, &target, rng);
        placed.insert(target.clone(), position);
        order.push(target);
    }

    verify(edges, &placed);
    placed
}

/// Unplaced entity with a placed neighbor, tightest incident edge first.
fn next_placeable(edges: &[GeoEdge], placed: &HashMap<String, GeoPoint>) -> Option<String> {
    let mut frontier: Vec<&GeoEdge> = edges
        .iter()
        .filter(|e| placed.contains_key(&e.a) != placed.contains_key(&e.b))
        .collect();
    frontier.sort_by(|x, y| x.max_meters.total_cmp(&y.max_meters));

    frontier.first().map(|e| {
        if placed.contains_key(&e.a) { e.b.clone() } else { e.a.clone() }
    })
}

/// Disk-sample inside the tightest binding edge, rejecting candidates until
/// every placed-neighbor bound holds.
fn sample_position(
    edges: &[GeoEdge],
    placed: &HashMap<String, GeoPoint>,
    target: &str,
    rng: &mut RunRng,
) -> GeoPoint {
    let mut incident: Vec<&GeoEdge> = edges
        .iter()
        .filter(|e| {
            (e.a == target && placed.contains_key(&e.b))
                || (e.b == target && placed.contains_key(&e.a))
        })
        .collect();
    incident.sort_by(|x, y| x.max_meters.total_cmp(&y.max_meters));

    let binding = incident[0];
    let center = if binding.a == target { placed[&binding.b] } else { placed[&binding.a] };

    let mut candidate = rand_lat_lon(rng, center, binding.max_meters);
    for attempt in 1.. {
        let satisfied = incident.iter().all(|e| {
            let other = if e.a == target { placed[&e.b] } else { placed[&e.a] };
            geodesic_distance_m(candidate, other) <= e.max_meters
        });
        if satisfied {
            break;
        }
        if attempt >= REJECTION_LIMIT {
            tracing::warn!(
                target,
                attempts = attempt,
                "geo rejection sampling exhausted; accepting last candidate"
            );
            break;
        }
        candidate = rand_lat_lon(rng, center, binding.max_meters);
    }
    candidate
}

fn verify(edges: &[GeoEdge], placed: &HashMap<String, GeoPoint>) {
    for edge in edges {
        let (Some(&pa), Some(&pb)) = (placed.get(&edge.a), placed.get(&edge.b)) else {
            continue;
        };
        let distance = geodesic_distance_m(pa, pb);
        if distance > edge.max_meters {
            tracing::warn!(
                a = %edge.a,
                b = %edge.b,
                distance_m = distance,
                bound_m = edge.max_meters,
                "GEO_DISTANCE bound violated after placement"
            );
        }
    }
}
