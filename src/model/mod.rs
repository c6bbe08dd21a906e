//! # Generated-Graph Model
//!
//! The DTOs every pipeline stage speaks: entities, attributes, constraints.
//! These types cross every boundary: template ↔ resolver ↔ propagator ↔
//! projector.
//!
//! Design rule: pure data — no I/O, no randomness, no resolution logic here.

pub mod constraint;
pub mod thing;
pub mod value;

pub use constraint::{
    AttrConstraint, Comparison, ComparisonKind, ConstraintOp, RelationshipSpec,
};
pub use thing::{AttrKind, Attribute, ThingSpec};
pub use value::{AttrValue, GeoPoint};
