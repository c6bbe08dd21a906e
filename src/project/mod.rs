//! Graph projection: walk a resolved template and emit its triple set.
//!
//! Every populated entity produces one rdf:type triple, one answer-key
//! metadata triple, and one triple per deduplicated attribute. Literal
//! rendering goes through the pluggable [`DatumFormatter`] collaborator so
//! downstream output formats stay out of this crate.

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;

use crate::model::{AttrKind, AttrValue, GeoPoint, ThingSpec};
use crate::rng::RunRng;
use crate::template::Template;

/// Namespace every subject/predicate/object term is wrapped in.
pub const BASE_URI: &str = "http://schema.localhost/";

/// rdf:type predicate IRI.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Wrap a term in the output namespace convention.
pub fn wrap_ns(term: &str) -> String {
    format!("<{BASE_URI}{term}>")
}

/// One (subject, predicate, object) output triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self { subject: subject.into(), predicate: predicate.into(), object: object.into() }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

// ============================================================================
// Literal rendering
// ============================================================================

/// Pluggable literal rendering: scalars, GeoJSON points, JSON metadata.
pub trait DatumFormatter {
    fn scalar(&self, attribute: &str, value: &AttrValue) -> String;
    fn geo_point(&self, attribute: &str, point: &GeoPoint) -> String;
    fn metadata(&self, payload: &str) -> String;
}

/// Default N-Triples-style literal rendering.
pub struct PlainFormatter;

const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

fn string_literal(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl DatumFormatter for PlainFormatter {
    fn scalar(&self, attribute: &str, value: &AttrValue) -> String {
        match value {
            AttrValue::Text(s) => string_literal(s),
            AttrValue::Float(f) => format!("\"{f}\"^^<{XSD_DOUBLE}>"),
            AttrValue::Timestamp(t) => format!(
                "\"{}\"^^<{XSD_DATETIME}>",
                t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            ),
            AttrValue::Geo(p) => self.geo_point(attribute, p),
        }
    }

    fn geo_point(&self, _attribute: &str, point: &GeoPoint) -> String {
        // GeoJSON coordinate order is [lon, lat].
        let geojson = serde_json::json!({
            "type": "Point",
            "coordinates": [point.lon, point.lat],
        });
        string_literal(&geojson.to_string())
    }

    fn metadata(&self, payload: &str) -> String {
        string_literal(payload)
    }
}

// ============================================================================
// Projection options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialMode {
    /// Sample whole component groups.
    Component,
    /// Sample individual entities.
    Node,
}

/// Partial-emission sampling: emit only `percent` % of the template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    pub mode: PartialMode,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProjectOptions {
    /// Suppress entities that resolved to zero attributes.
    pub trim: bool,
    pub partial: Option<Partial>,
}

// ============================================================================
// Projection
// ============================================================================

/// Emit the deduplicated triple set of a resolved template.
///
/// Populated entities come first in template order; zero-attribute entities
/// trail at the end unless `trim` drops them.
pub fn project(
    template: &Template,
    origin_source: &str,
    formatter: &dyn DatumFormatter,
    options: &ProjectOptions,
    rng: &mut RunRng,
) -> Vec<Triple> {
    let things = select_things(template, options, rng);

    let mut triples = Vec::new();
    let mut empty = Vec::new();
    for thing in things {
        let Some(value) = &thing.value else {
            tracing::warn!(thing = %thing.id, "projecting unresolved entity; skipping");
            continue;
        };

        let type_triple = Triple::new(
            wrap_ns(value),
            format!("<{RDF_TYPE}>"),
            wrap_ns(&thing.schema_class),
        );
        let answer_key = serde_json::json!({
            "answerKey": format!("{origin_source}|{}", thing.id),
        });
        let meta_triple = Triple::new(
            wrap_ns(value),
            wrap_ns("metaData"),
            formatter.metadata(&answer_key.to_string()),
        );

        let attributes = dedup_attributes(thing);
        if attributes.is_empty() {
            if !options.trim {
                empty.push(type_triple);
                empty.push(meta_triple);
            }
            continue;
        }

        triples.push(type_triple);
        triples.push(meta_triple);
        for attribute in attributes {
            let object = match attribute.kind {
                AttrKind::Object => wrap_ns(&attribute.value.canonical_key()),
                AttrKind::GeoJson => match attribute.value.as_geo() {
                    Some(point) => formatter.geo_point(&attribute.name, &point),
                    None => formatter.scalar(&attribute.name, &attribute.value),
                },
                AttrKind::Value => formatter.scalar(&attribute.name, &attribute.value),
            };
            triples.push(Triple::new(wrap_ns(value), wrap_ns(&attribute.name), object));
        }
    }

    triples.extend(empty);
    triples
}

/// Deduplicate an entity's attributes as (name, value, kind) tuples,
/// preserving first-occurrence order.
fn dedup_attributes(thing: &ThingSpec) -> Vec<&crate::model::Attribute> {
    let mut seen: HashSet<(&str, String, AttrKind)> = HashSet::new();
    thing
        .attributes
        .iter()
        .filter(|a| seen.insert((a.name.as_str(), a.value.canonical_key(), a.kind)))
        .collect()
}

/// Apply partial-emission sampling, keeping template order.
fn select_things<'t>(
    template: &'t Template,
    options: &ProjectOptions,
    rng: &mut RunRng,
) -> Vec<&'t ThingSpec> {
    let all: Vec<&ThingSpec> = template.things.iter().collect();
    let Some(partial) = options.partial else {
        return all;
    };

    match partial.mode {
        PartialMode::Node => {
            let keep = sample_indices(all.len(), partial.percent, rng);
            all.into_iter()
                .enumerate()
                .filter(|(i, _)| keep.contains(i))
                .map(|(_, t)| t)
                .collect()
        }
        PartialMode::Component => {
            let mut groups: Vec<&str> = Vec::new();
            for thing in &all {
                if let Some(component) = thing.component.as_deref() {
                    if !groups.contains(&component) {
                        groups.push(component);
                    }
                }
            }
            if groups.is_empty() {
                tracing::debug!("COMPONENT sampling on untagged template; emitting all entities");
                return all;
            }
            let keep = sample_indices(groups.len(), partial.percent, rng);
            let kept: HashSet<&str> = groups
                .iter()
                .enumerate()
                .filter(|(i, _)| keep.contains(i))
                .map(|(_, g)| *g)
                .collect();
            all.into_iter()
                .filter(|t| t.component.as_deref().is_none_or(|c| kept.contains(c)))
                .collect()
        }
    }
}

fn sample_indices(len: usize, percent: f64, rng: &mut RunRng) -> HashSet<usize> {
    let amount = (len as f64 * percent / 100.0) as usize;
    let indices: Vec<usize> = (0..len).collect();
    indices.choose_multiple(rng, amount).copied().collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::model::AttrConstraint;
    use crate::template::Dialect;

    use super::*;

    fn resolved_thing(id: &str, value: &str) -> ThingSpec {
        let mut thing = ThingSpec::new(id, "Person");
        thing.value = Some(value.into());
        thing.generated = true;
        thing
    }

    fn template_of(things: Vec<ThingSpec>) -> Template {
        Template {
            id: "t".into(),
            dialect: Dialect::Legacy,
            things,
            relationships: Vec::new(),
            comparisons: Vec::new(),
            fragments: Vec::new(),
            identities: Vec::new(),
        }
    }

    fn run(template: &Template, options: &ProjectOptions) -> Vec<Triple> {
        let mut rng = RunRng::from_seed(1);
        project(template, "t|0.5|1.100", &PlainFormatter, options, &mut rng)
    }

    #[test]
    fn test_duplicate_attributes_collapse_to_one_triple() {
        let mut thing = resolved_thing("a", "uuid-a");
        for _ in 0..4 {
            thing.push_attr("personName", "Ada", AttrKind::Value);
        }
        let template = template_of(vec![thing]);
        let triples = run(&template, &ProjectOptions::default());
        // type + metadata + exactly one attribute triple
        assert_eq!(triples.len(), 3);
        assert_eq!(triples[2].object, "\"Ada\"");
    }

    #[test]
    fn test_geo_attribute_renders_geojson_point() {
        let mut thing = resolved_thing("a", "uuid-a");
        thing.push_attr("geo", GeoPoint::new(40.0, -75.0), AttrKind::GeoJson);
        let template = template_of(vec![thing]);
        let triples = run(&template, &ProjectOptions::default());
        let object = &triples[2].object;
        assert!(object.contains("Point"), "{object}");
        // coordinates are [lon, lat]
        assert!(object.contains("[-75.0,40.0]"), "{object}");
    }

    #[test]
    fn test_object_attribute_wraps_namespace() {
        let mut thing = resolved_thing("a", "uuid-a");
        thing.push_attr("knows", "uuid-b", AttrKind::Object);
        let template = template_of(vec![thing]);
        let triples = run(&template, &ProjectOptions::default());
        assert_eq!(triples[2].object, format!("<{BASE_URI}uuid-b>"));
    }

    #[test]
    fn test_answer_key_is_traceable() {
        let template = template_of(vec![resolved_thing("suspect", "uuid-a")]);
        let triples = run(&template, &ProjectOptions::default());
        let meta = &triples[1];
        assert_eq!(meta.predicate, format!("<{BASE_URI}metaData>"));
        assert!(meta.object.contains("t|0.5|1.100|suspect"), "{}", meta.object);
    }

    #[test]
    fn test_empty_entities_trail_unless_trimmed() {
        let mut populated = resolved_thing("a", "uuid-a");
        populated.push_attr("personName", "Ada", AttrKind::Value);
        let empty = resolved_thing("b", "uuid-b");

        let template = template_of(vec![empty.clone(), populated.clone()]);
        let triples = run(&template, &ProjectOptions::default());
        // populated entity's triples come first even though "b" is declared first
        assert!(triples[0].subject.contains("uuid-a"));
        assert_eq!(triples.len(), 5);

        let trimmed = run(&template, &ProjectOptions { trim: true, partial: None });
        assert_eq!(trimmed.len(), 3);
        assert!(trimmed.iter().all(|t| !t.subject.contains("uuid-b")));
    }

    #[test]
    fn test_node_partial_emission_samples_entities() {
        let things: Vec<ThingSpec> = (0..10)
            .map(|i| {
                let mut t = resolved_thing(&format!("t{i}"), &format!("uuid-{i}"));
                t.push_attr("n", format!("v{i}"), AttrKind::Value);
                t
            })
            .collect();
        let template = template_of(things);
        let options = ProjectOptions {
            trim: false,
            partial: Some(Partial { mode: PartialMode::Node, percent: 50.0 }),
        };
        let triples = run(&template, &options);
        // 5 of 10 entities, 3 triples each
        assert_eq!(triples.len(), 15);
    }

    #[test]
    fn test_component_partial_emission_samples_groups() {
        let mut things = Vec::new();
        for alias in ["alpha", "beta"] {
            for i in 0..3 {
                let mut t = resolved_thing(&format!("{alias}.{i}"), &format!("uuid-{alias}-{i}"));
                t.component = Some(alias.into());
                t.push_attr("n", "v", AttrKind::Value);
                things.push(t);
            }
        }
        let template = template_of(things);
        let options = ProjectOptions {
            trim: false,
            partial: Some(Partial { mode: PartialMode::Component, percent: 50.0 }),
        };
        let triples = run(&template, &options);
        // one of the two groups survives: 3 entities × 3 triples
        assert_eq!(triples.len(), 9);
        let subjects: HashSet<&str> = triples.iter().map(|t| t.subject.as_str()).collect();
        let alpha = subjects.iter().any(|s| s.contains("alpha"));
        let beta = subjects.iter().any(|s| s.contains("beta"));
        assert!(alpha != beta, "exactly one component group should survive");
    }

    #[test]
    fn test_unused_constraint_metadata_does_not_leak() {
        // Attribute constraints live on the entity record, not in the output.
        let mut thing = resolved_thing("a", "uuid-a");
        thing.attr_constraints.push(AttrConstraint::new(
            "personName",
            crate::model::ConstraintOp::Any,
            "",
        ));
        let template = template_of(vec![thing]);
        let triples = run(&template, &ProjectOptions::default());
        assert_eq!(triples.len(), 2);
    }
}
