//! Temporal placement: assign signed whole-day offsets satisfying pairwise
//! interval bounds.
//!
//! One-dimensional sibling of the geodesic placer: same frontier walk, same
//! rejection sampling, with directed edges — `(a, b, [min, max])` constrains
//! `offset[b] − offset[a]` to the interval.

use std::collections::HashMap;

use crate::rng::RunRng;

use super::REJECTION_LIMIT;

/// Directed offset bound: `offset[b] − offset[a]` ∈ `[min_days, max_days]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetEdge {
    pub a: String,
    pub b: String,
    pub min_days: i64,
    pub max_days: i64,
}

impl OffsetEdge {
    pub fn new(a: impl Into<String>, b: impl Into<String>, min_days: i64, max_days: i64) -> Self {
        Self { a: a.into(), b: b.into(), min_days, max_days }
    }

    fn width(&self) -> i64 {
        self.max_days - self.min_days
    }

    fn contains(&self, diff: i64) -> bool {
        self.min_days <= diff && diff <= self.max_days
    }
}

/// Place every entity referenced by `edges` at a signed day offset, anchor
/// at offset 0, so that each edge's interval holds.
///
/// Candidate raw offsets come from the tightest (narrowest-interval) binding
/// edge: exactly 0 when the interval's lower bound is 0, otherwise a uniform
/// integer in `[min, max]`, applied directionally — reaching the neighbor
/// through an outgoing edge adds the raw offset, through an incoming edge
/// subtracts it. Disconnected components reseed at the first placed
/// entity's offset, same caveat as the geodesic placer.
pub fn place_offsets(
    edges: &[OffsetEdge],
    anchor_id: &str,
    rng: &mut RunRng,
) -> HashMap<String, i64> {
    let mut placed: HashMap<String, i64> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    placed.insert(anchor_id.to_owned(), 0);
    order.push(anchor_id.to_owned());

    loop {
        let Some(target) = next_placeable(edges, &placed) else {
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

        let offset = sample_offset(edges, &placed, &target, rng);
        placed.insert(target.clone(), offset);
        order.push(target);
    }

    verify(edges, &placed);
    placed
}

/// Unplaced entity with a placed neighbor, narrowest incident interval first.
fn next_placeable(edges: &[OffsetEdge], placed: &HashMap<String, i64>) -> Option<String> {
    let mut frontier: Vec<&OffsetEdge> = edges
        .iter()
        .filter(|e| placed.contains_key(&e.a) != placed.contains_key(&e.b))
        .collect();
    frontier.sort_by_key(|e| e.width());

    frontier.first().map(|e| {
        if placed.contains_key(&e.a) { e.b.clone() } else { e.a.clone() }
    })
}

fn sample_offset(
    edges: &[OffsetEdge],
    placed: &HashMap<String, i64>,
    target: &str,
    rng: &mut RunRng,
) -> i64 {
    let mut incident: Vec<&OffsetEdge> = edges
        .iter()
        .filter(|e| {
            (e.a == target && placed.contains_key(&e.b))
                || (e.b == target && placed.contains_key(&e.a))
        })
        .collect();
    incident.sort_by_key(|e| e.width());

    let binding = incident[0];

    let mut candidate = directional_candidate(binding, placed, target, rng);
    for attempt in 1.. {
        let satisfied = incident.iter().all(|e| {
            if e.a == target {
                e.contains(placed[&e.b] - candidate)
            } else {
                e.contains(candidate - placed[&e.a])
            }
        });
        if satisfied {
            break;
        }
        if attempt >= REJECTION_LIMIT {
            tracing::warn!(
                target,
                attempts = attempt,
                "offset rejection sampling exhausted; accepting last candidate"
            );
            break;
        }
        candidate = directional_candidate(binding, placed, target, rng);
    }
    candidate
}

/// Raw offset through the binding edge, signed by edge direction.
fn directional_candidate(
    binding: &OffsetEdge,
    placed: &HashMap<String, i64>,
    target: &str,
    rng: &mut RunRng,
) -> i64 {
    let raw = if binding.min_days == 0 {
        0
    } else {
        rng.int_range(binding.min_days, binding.max_days)
    };
    if binding.a == target {
        // target → neighbor: offset[neighbor] − offset[target] must land in
        // the interval, so the raw offset subtracts.
        placed[&binding.b] - raw
    } else {
        placed[&binding.a] + raw
    }
}

fn verify(edges: &[OffsetEdge], placed: &HashMap<String, i64>) {
    for edge in edges {
        let (Some(&oa), Some(&ob)) = (placed.get(&edge.a), placed.get(&edge.b)) else {
            continue;
        };
        if !edge.contains(ob - oa) {
            tracing::warn!(
                a = %edge.a,
                b = %edge.b,
                diff_days = ob - oa,
                min_days = edge.min_days,
                max_days = edge.max_days,
                "DIFFERENCE bound violated after placement"
            );
        }
    }
}
