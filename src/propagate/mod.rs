//! # Constraint Graph Propagation
//!
//! Transitive placement for geodesic-distance and temporal-offset constraint
//! graphs. Naive per-pair satisfaction breaks down the moment one entity
//! participates in several constraints; these propagators compute one global
//! assignment such that every pairwise bound holds simultaneously, including
//! across disconnected subgraphs.
//!
//! The graphs here are transient: rebuilt per call, discarded after.

pub mod geo;
pub mod temporal;

pub use geo::{GeoEdge, geodesic_distance_m, place_geo, rand_lat_lon};
pub use temporal::{OffsetEdge, place_offsets};

/// Attempt cap for the rejection-sampling loops.
///
/// Satisfiable bound sets converge in a handful of draws; contradictory or
/// near-degenerate ones would otherwise loop forever. On exhaustion the last
/// candidate is accepted and the post-placement verification logs any
/// realized violation.
pub(crate) const REJECTION_LIMIT: usize = 10_000;
