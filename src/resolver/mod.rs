//! Template resolution: walks a template's entities, relationships and
//! comparison constraints and assigns every generated value.
//!
//! One `Resolver` instance owns its template for the whole pass — stages
//! mutate the template in place and hand it back at the end. Constraint
//! dispatch runs as an explicit worklist processed to fixpoint instead of
//! re-entrant recursion, so chains of constraints referencing a
//! just-resolved entity are picked up without a second top-level pass and
//! without unbounded call-stack depth.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::generate::ValueGenerator;
use crate::model::{AttrKind, AttrValue, Comparison, ComparisonKind, ConstraintOp, GeoPoint};
use crate::propagate::{self, GeoEdge, OffsetEdge, geodesic_distance_m, rand_lat_lon};
use crate::rng::RunRng;
use crate::template::{Dialect, Template, merger};
use crate::{Error, Result};

/// Jitter radius for freshly seeded geo anchors, meters.
const ANCHOR_JITTER_M: f64 = 500.0;

/// Whether GEO_DISTANCE / DIFFERENCE constraints resolve pairwise or through
/// the full constraint-graph propagator.
///
/// Pairwise satisfies each constraint independently and ignores
/// transitivity; the propagator guarantees global consistency when one
/// entity participates in many constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub propagate_geo: bool,
    pub propagate_temporal: bool,
}

impl ResolveOptions {
    /// Legacy templates route geo constraints through the propagator;
    /// component templates default to pairwise resolution.
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Legacy => Self { propagate_geo: true, propagate_temporal: false },
            Dialect::Component => Self { propagate_geo: false, propagate_temporal: false },
        }
    }
}

/// Run-scoped inputs the resolver needs besides the template itself.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Traceable answer-key prefix: `template-id|difficulty|seed.reference`.
    pub origin_source: String,
    /// Anchor latitude/longitude for freshly placed geo attributes.
    pub anchor: GeoPoint,
    /// Reference timestamp fresh temporal attributes are derived from.
    pub reference_time: DateTime<Utc>,
    /// Tuning scalar in [0, 1], forwarded to the value generator.
    pub difficulty: f64,
}

/// Owns a template for the duration of one resolution pass.
pub struct Resolver<'r, G> {
    template: Template,
    ctx: RunContext,
    generator: &'r G,
    rng: &'r mut RunRng,
    options: ResolveOptions,
}

impl<'r, G: ValueGenerator> Resolver<'r, G> {
    pub fn new(
        template: Template,
        generator: &'r G,
        rng: &'r mut RunRng,
        ctx: RunContext,
        options: ResolveOptions,
    ) -> Self {
        Self { template, ctx, generator, rng, options }
    }

    /// Run the full pass: merge identities, generate entity values and
    /// attributes, resolve relationships, then comparisons. Returns the
    /// resolved template; re-resolving it is a no-op.
    pub fn resolve(mut self) -> Result<Template> {
        merger::resolve_identities(&mut self.template, self.rng);
        self.generate_things()?;
        self.generate_relationships()?;
        self.generate_comparisons()?;
        Ok(self.template)
    }

    fn generate(&mut self, attribute: &str, op: ConstraintOp, operand: &AttrValue) -> AttrValue {
        self.generator
            .generate(self.rng, attribute, op, operand, self.ctx.difficulty)
    }

    // ========================================================================
    // Entities
    // ========================================================================

    fn generate_things(&mut self) -> Result<()> {
        for idx in 0..self.template.things.len() {
            if self.template.things[idx].generated {
                continue;
            }
            // The generated value is content-derived: origin source + the
            // entity spec itself + a draw from the run's random stream, so
            // runs are traceable but not globally deterministic across
            // re-randomization.
            let spec_json = serde_json::to_string(&self.template.things[idx])?;
            let value = self.derive_value(&spec_json);

            let constraints = self.template.things[idx].attr_constraints.clone();
            let mut resolved: Vec<(String, AttrValue)> = Vec::new();
            for constraint in &constraints {
                let generated =
                    self.generate(&constraint.attribute, constraint.op, &constraint.operand);
                match resolved.iter_mut().find(|(name, _)| name == &constraint.attribute) {
                    Some((_, existing)) => {
                        *existing = existing.clone().combine(generated);
                    }
                    None => resolved.push((constraint.attribute.clone(), generated)),
                }
            }

            let thing = &mut self.template.things[idx];
            thing.value = Some(value);
            thing.generated = true;
            for (name, value) in resolved {
                thing.push_attr(name, value, AttrKind::Value);
            }
        }
        Ok(())
    }

    fn derive_value(&mut self, spec_json: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.ctx.origin_source.as_bytes());
        hasher.update(spec_json.as_bytes());
        hasher.update(self.rng.token().as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Uuid::from_bytes(bytes).to_string()
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    fn generate_relationships(&mut self) -> Result<()> {
        for idx in 0..self.template.relationships.len() {
            if self.template.relationships[idx].generated {
                continue;
            }
            let rel = self.template.relationships[idx].clone();
            let target_value = self
                .template
                .thing(&rel.node2)
                .and_then(|t| t.value.clone())
                .ok_or_else(|| Error::UnknownThing(rel.node2.clone()))?;
            let node1 = self
                .template
                .thing_mut(&rel.node1)
                .ok_or_else(|| Error::UnknownThing(rel.node1.clone()))?;
            node1.push_attr(&rel.edge, target_value, AttrKind::Object);
            self.template.relationships[idx].generated = true;
        }
        Ok(())
    }

    // ========================================================================
    // Comparison constraints
    // ========================================================================

    fn generate_comparisons(&mut self) -> Result<()> {
        let geo_places = self.geo_placements();
        let offsets = self.offset_placements();

        // Worklist to fixpoint: resolving a constraint enqueues both
        // endpoint entities; constraints touching an enqueued entity resolve
        // before the declaration-order scan continues.
        let mut queue: VecDeque<String> = VecDeque::new();
        loop {
            while let Some(thing_id) = queue.pop_front() {
                while let Some(idx) = self.next_pending(Some(&thing_id)) {
                    self.resolve_comparison(idx, &geo_places, &offsets)?;
                    self.enqueue_endpoints(idx, &mut queue);
                }
            }
            match self.next_pending(None) {
                Some(idx) => {
                    self.resolve_comparison(idx, &geo_places, &offsets)?;
                    self.enqueue_endpoints(idx, &mut queue);
                }
                None => break,
            }
        }
        Ok(())
    }

    /// First unresolved constraint in declaration order, optionally
    /// restricted to constraints touching one entity.
    fn next_pending(&self, touching: Option<&str>) -> Option<usize> {
        self.template.comparisons.iter().position(|c| {
            !c.generated && touching.is_none_or(|thing_id| c.touches(thing_id))
        })
    }

    fn enqueue_endpoints(&self, idx: usize, queue: &mut VecDeque<String>) {
        let comparison = &self.template.comparisons[idx];
        queue.push_back(comparison.thing1.clone());
        queue.push_back(comparison.thing2.clone());
    }

    fn resolve_comparison(
        &mut self,
        idx: usize,
        geo_places: &Option<HashMap<String, GeoPoint>>,
        offsets: &Option<HashMap<String, i64>>,
    ) -> Result<()> {
        let comparison = self.template.comparisons[idx].clone();
        match comparison.kind {
            ComparisonKind::Equals => self.resolve_equals(&comparison)?,
            ComparisonKind::Difference { min_days, max_days } => {
                self.resolve_difference(&comparison, min_days, max_days, offsets)?
            }
            ComparisonKind::GeoDistance { max_meters } => {
                self.resolve_geo_distance(&comparison, max_meters, geo_places)?
            }
            ComparisonKind::SameAs => self.resolve_same_as(&comparison)?,
        }
        self.template.comparisons[idx].generated = true;
        Ok(())
    }

    fn resolve_equals(&mut self, c: &Comparison) -> Result<()> {
        let aval = self.attr_of(&c.thing1, &c.attr1)?;
        let bval = self.attr_of(&c.thing2, &c.attr2)?;
        match (aval, bval) {
            // Both set: consistency is assumed, not verified.
            (Some(_), Some(_)) => {}
            (None, None) => {
                // One fresh value, each side independently re-derived from
                // it so sibling constraints on the same attribute keep their
                // own generator semantics.
                let fresh = self.generate(&c.attr1, ConstraintOp::Any, &AttrValue::Text(String::new()));
                let v1 = self.generate(&c.attr1, ConstraintOp::Equals, &fresh);
                let v2 = self.generate(&c.attr2, ConstraintOp::Equals, &fresh);
                self.push_attr(&c.thing1, &c.attr1, v1, AttrKind::Value)?;
                self.push_attr(&c.thing2, &c.attr2, v2, AttrKind::Value)?;
            }
            (Some(a), None) => self.push_attr(&c.thing2, &c.attr2, a, AttrKind::Value)?,
            (None, Some(b)) => self.push_attr(&c.thing1, &c.attr1, b, AttrKind::Value)?,
        }
        Ok(())
    }

    fn resolve_difference(
        &mut self,
        c: &Comparison,
        min_days: i64,
        max_days: i64,
        offsets: &Option<HashMap<String, i64>>,
    ) -> Result<()> {
        let offset_pair = offsets
            .as_ref()
            .and_then(|m| Some((*m.get(&c.thing1)?, *m.get(&c.thing2)?)));
        // Explicit minimum, or zero when the interval straddles zero.
        let pinned = if min_days <= 0 && 0 <= max_days { 0 } else { min_days };
        let delta = offset_pair.map_or(pinned, |(o1, o2)| o1 - o2);

        let aval = self.timestamp_of(&c.thing1, &c.attr1)?;
        let bval = self.timestamp_of(&c.thing2, &c.attr2)?;
        match (aval, bval) {
            (Some(_), Some(_)) => {}
            (None, None) => {
                let base = self
                    .generate(&c.attr1, ConstraintOp::Any, &AttrValue::Text(String::new()))
                    .as_timestamp()
                    .unwrap_or(self.ctx.reference_time);
                let (off1, off2) = offset_pair.unwrap_or((pinned, 0));
                let v1 = self.generate(
                    &c.attr1,
                    ConstraintOp::Equals,
                    &AttrValue::Timestamp(base + Duration::days(off1)),
                );
                let v2 = self.generate(
                    &c.attr2,
                    ConstraintOp::Equals,
                    &AttrValue::Timestamp(base + Duration::days(off2)),
                );
                self.push_attr(&c.thing1, &c.attr1, v1, AttrKind::Value)?;
                self.push_attr(&c.thing2, &c.attr2, v2, AttrKind::Value)?;
            }
            (Some(a), None) => {
                let value = AttrValue::Timestamp(a - Duration::days(delta));
                self.push_attr(&c.thing2, &c.attr2, value, AttrKind::Value)?;
            }
            (None, Some(b)) => {
                let value = AttrValue::Timestamp(b + Duration::days(delta));
                self.push_attr(&c.thing1, &c.attr1, value, AttrKind::Value)?;
            }
        }
        Ok(())
    }

    fn resolve_geo_distance(
        &mut self,
        c: &Comparison,
        max_meters: f64,
        geo_places: &Option<HashMap<String, GeoPoint>>,
    ) -> Result<()> {
        let placed1 = geo_places.as_ref().and_then(|m| m.get(&c.thing1).copied());
        let placed2 = geo_places.as_ref().and_then(|m| m.get(&c.thing2).copied());
        let g1 = self.geo_of(&c.thing1, &c.attr1)?;
        let g2 = self.geo_of(&c.thing2, &c.attr2)?;

        match (g1, g2) {
            (None, None) => {
                let p1 = placed1
                    .unwrap_or_else(|| rand_lat_lon(self.rng, self.ctx.anchor, ANCHOR_JITTER_M));
                let p2 = placed2.unwrap_or_else(|| rand_lat_lon(self.rng, p1, max_meters));
                self.push_attr(&c.thing1, &c.attr1, AttrValue::Geo(p1), AttrKind::GeoJson)?;
                self.push_attr(&c.thing2, &c.attr2, AttrValue::Geo(p2), AttrKind::GeoJson)?;
                log_if_violated(c, p1, p2, max_meters);
            }
            (Some(p1), None) => {
                let p2 = placed2.unwrap_or_else(|| rand_lat_lon(self.rng, p1, max_meters));
                self.push_attr(&c.thing2, &c.attr2, AttrValue::Geo(p2), AttrKind::GeoJson)?;
                log_if_violated(c, p1, p2, max_meters);
            }
            (None, Some(p2)) => {
                let p1 = placed1.unwrap_or_else(|| rand_lat_lon(self.rng, p2, max_meters));
                self.push_attr(&c.thing1, &c.attr1, AttrValue::Geo(p1), AttrKind::GeoJson)?;
                log_if_violated(c, p1, p2, max_meters);
            }
            (Some(p1), Some(p2)) => log_if_violated(c, p1, p2, max_meters),
        }
        Ok(())
    }

    /// Hard identity merge: the second entity's generated value is aliased
    /// to the first's, leaving two distinct entity records sharing one
    /// output identity.
    fn resolve_same_as(&mut self, c: &Comparison) -> Result<()> {
        let value = self
            .template
            .thing(&c.thing1)
            .ok_or_else(|| Error::UnknownThing(c.thing1.clone()))?
            .value
            .clone();
        let thing2 = self
            .template
            .thing_mut(&c.thing2)
            .ok_or_else(|| Error::UnknownThing(c.thing2.clone()))?;
        thing2.value = value;
        Ok(())
    }

    // ========================================================================
    // Propagation pre-pass
    // ========================================================================

    /// Build the transient geo constraint graph and place every referenced
    /// entity, anchored near the run's configured latitude/longitude.
    fn geo_placements(&mut self) -> Option<HashMap<String, GeoPoint>> {
        if !self.options.propagate_geo {
            return None;
        }
        let mut edges: Vec<GeoEdge> = self
            .template
            .comparisons
            .iter()
            .filter(|c| !c.generated)
            .filter_map(|c| match c.kind {
                ComparisonKind::GeoDistance { max_meters } => {
                    Some(GeoEdge::new(&c.thing1, &c.thing2, max_meters))
                }
                _ => None,
            })
            .collect();
        if edges.is_empty() {
            return None;
        }
        edges.sort_by(|x, y| x.a.cmp(&y.a));
        let anchor_id = edges[0].a.clone();
        let anchor_pos = rand_lat_lon(self.rng, self.ctx.anchor, ANCHOR_JITTER_M);
        Some(propagate::place_geo(&edges, &anchor_id, anchor_pos, self.rng))
    }

    /// Build the transient temporal constraint graph. Edges are oriented
    /// (thing2 → thing1) so placed offsets reproduce the pairwise
    /// `value1 − value2 ∈ [min, max]` semantics.
    fn offset_placements(&mut self) -> Option<HashMap<String, i64>> {
        if !self.options.propagate_temporal {
            return None;
        }
        let mut edges: Vec<OffsetEdge> = self
            .template
            .comparisons
            .iter()
            .filter(|c| !c.generated)
            .filter_map(|c| match c.kind {
                ComparisonKind::Difference { min_days, max_days } => {
                    Some(OffsetEdge::new(&c.thing2, &c.thing1, min_days, max_days))
                }
                _ => None,
            })
            .collect();
        if edges.is_empty() {
            return None;
        }
        edges.sort_by(|x, y| x.a.cmp(&y.a));
        let anchor_id = edges[0].a.clone();
        Some(propagate::place_offsets(&edges, &anchor_id, self.rng))
    }

    // ========================================================================
    // Attribute access
    // ========================================================================

    fn attr_of(&self, thing_id: &str, attr: &str) -> Result<Option<AttrValue>> {
        Ok(self
            .template
            .thing(thing_id)
            .ok_or_else(|| Error::UnknownThing(thing_id.to_owned()))?
            .attr(attr)
            .cloned())
    }

    fn timestamp_of(&self, thing_id: &str, attr: &str) -> Result<Option<DateTime<Utc>>> {
        let value = self.attr_of(thing_id, attr)?;
        match value {
            Some(AttrValue::Timestamp(t)) => Ok(Some(t)),
            Some(other) => {
                tracing::debug!(
                    thing = thing_id,
                    attr,
                    kind = other.type_name(),
                    "non-temporal value on a DIFFERENCE attribute; treating as unset"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn geo_of(&self, thing_id: &str, attr: &str) -> Result<Option<GeoPoint>> {
        Ok(self
            .template
            .thing(thing_id)
            .ok_or_else(|| Error::UnknownThing(thing_id.to_owned()))?
            .geo_attr(attr))
    }

    fn push_attr(
        &mut self,
        thing_id: &str,
        attr: &str,
        value: AttrValue,
        kind: AttrKind,
    ) -> Result<()> {
        self.template
            .thing_mut(thing_id)
            .ok_or_else(|| Error::UnknownThing(thing_id.to_owned()))?
            .push_attr(attr, value, kind);
        Ok(())
    }
}

fn log_if_violated(c: &Comparison, p1: GeoPoint, p2: GeoPoint, max_meters: f64) {
    let distance = geodesic_distance_m(p1, p2);
    if distance > max_meters {
        tracing::warn!(
            thing1 = %c.thing1,
            thing2 = %c.thing2,
            distance_m = distance,
            bound_m = max_meters,
            "GEO_DISTANCE constraint violated"
        );
    }
}
