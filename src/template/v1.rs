//! Component-dialect parser.
//!
//! Component templates reference reusable hydrated specs by id, address
//! things through `alias.root[.path]` paths, and may override a referenced
//! component's property constraints in place.

use std::collections::HashMap;

use crate::model::{
    AttrConstraint, Comparison, ComparisonKind, ConstraintOp, RelationshipSpec, ThingSpec,
};
use crate::{Error, Result};

use super::{
    Dialect, Template, lenient_f64, lenient_i64, operand_from_json, opt_array, req_array,
    req_obj, req_str,
};

/// Reusable hydrated component specs, keyed by component id.
///
/// Reading component files off disk is the caller's business; the library
/// accepts parsed JSON documents.
pub struct ComponentLibrary {
    components: HashMap<String, serde_json::Value>,
}

impl ComponentLibrary {
    pub fn new() -> Self {
        Self { components: HashMap::new() }
    }

    pub fn insert(&mut self, component: serde_json::Value) -> Result<()> {
        let id = req_str(&component, "id")?.to_owned();
        self.components.insert(id, component);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&serde_json::Value> {
        self.components.get(id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Default for ComponentLibrary {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) fn parse(value: &serde_json::Value, library: &ComponentLibrary) -> Result<Template> {
    let id = req_str(value, "id")?.to_owned();

    let mut things = Vec::new();
    let mut relationships = Vec::new();

    for component_ref in req_array(value, "templateComponents")? {
        hydrate_component(component_ref, library, &mut things, &mut relationships)?;
    }

    let mut comparisons = Vec::new();
    for entry in opt_array(value, "templateComponentComparisonConstraints") {
        parse_comparisons(entry, &mut comparisons)?;
    }

    Ok(Template {
        id,
        dialect: Dialect::Component,
        things,
        relationships,
        comparisons,
        fragments: Vec::new(),
        identities: Vec::new(),
    })
}

/// Copy one referenced component into the template: a thing per root and per
/// property constraint, plus the parent→child relationships the paths imply.
fn hydrate_component(
    component_ref: &serde_json::Value,
    library: &ComponentLibrary,
    things: &mut Vec<ThingSpec>,
    relationships: &mut Vec<RelationshipSpec>,
) -> Result<()> {
    let component_id = req_str(component_ref, "id")?;
    let alias = req_str(component_ref, "alias")?;
    let component = library
        .get(component_id)
        .ok_or_else(|| Error::UnknownComponent(component_id.to_owned()))?;
    let hydrated = req_obj(component, "hydratedThingSpec")?;

    // pathToThing "root" overrides the root's constraints, "root.<path>"
    // overrides the thing at <path>.
    let mut overrides: HashMap<&str, &serde_json::Value> = HashMap::new();
    for spec in opt_array(component_ref, "thingPropertyConstraintOverrides") {
        let path = req_str(spec, "pathToThing")?;
        let constraints = spec.get("dataTypePropertyConstraints").ok_or_else(|| {
            Error::MalformedTemplate("override missing dataTypePropertyConstraints".into())
        })?;
        let key = path.strip_prefix("root.").unwrap_or(if path == "root" { "" } else { path });
        overrides.insert(key, constraints);
    }

    let root = req_obj(hydrated, "rootThing")?;
    let root_id = format!("{alias}.root");
    let mut root_thing =
        ThingSpec::new(&root_id, req_str(root, "dataSchemaClass")?).with_component(alias);
    root_thing.attr_constraints = parse_property_constraints(
        overrides.get("").copied().or_else(|| root.get("dataTypePropertyConstraints")),
    )?;
    things.push(root_thing);

    for property in opt_array(hydrated, "thingPropertyConstraints") {
        let path = req_str(property, "pathFromRoot")?;
        let thing_id = format!("{alias}.root.{path}");
        let mut thing = ThingSpec::new(&thing_id, req_str(property, "dataSchemaClass")?)
            .with_component(alias);
        thing.attr_constraints = parse_property_constraints(
            overrides
                .get(path)
                .copied()
                .or_else(|| property.get("dataTypePropertyConstraints")),
        )?;
        things.push(thing);

        // The path's last segment names the edge from the parent thing.
        let (parent_id, edge) = match path.rsplit_once('.') {
            Some((parent_path, edge)) => (format!("{alias}.root.{parent_path}"), edge),
            None => (root_id.clone(), path),
        };
        relationships.push(RelationshipSpec::new(parent_id, edge, &thing_id));
    }

    Ok(())
}

/// `dataTypePropertyConstraints` items come in several shapes:
/// a bare `{op: [attr, operand]}`, an `equals`/`and`/`or` group of those,
/// or `{op: {leftHandSide, rightHandSide: {value}}}`.
fn parse_property_constraints(
    constraints: Option<&serde_json::Value>,
) -> Result<Vec<AttrConstraint>> {
    let Some(constraints) = constraints.and_then(|c| c.as_array()) else {
        return Ok(Vec::new());
    };

    let mut parsed = Vec::new();
    for item in constraints {
        let obj = item.as_object().ok_or_else(|| {
            Error::MalformedTemplate(format!("property constraint is not an object: {item}"))
        })?;

        // A group's members are single-op objects; a direct op's body is a
        // two-element [attr, operand] array. `equals` appears in both roles.
        let grouped = ["equals", "and", "or"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_array()))
            .filter(|members| members.iter().all(|m| m.is_object()));
        match grouped {
            Some(group) => {
                for inner in group {
                    parsed.push(parse_single_constraint(inner)?);
                }
            }
            None => parsed.push(parse_single_constraint(item)?),
        }
    }
    Ok(parsed)
}

fn parse_single_constraint(item: &serde_json::Value) -> Result<AttrConstraint> {
    let obj = item.as_object().filter(|o| o.len() == 1).ok_or_else(|| {
        Error::MalformedTemplate(format!("expected single-operator constraint, got: {item}"))
    })?;
    let (op_name, body) = obj.iter().next().ok_or_else(|| {
        Error::MalformedTemplate("empty property constraint object".into())
    })?;
    let op = ConstraintOp::parse(op_name).ok_or_else(|| {
        Error::MalformedTemplate(format!("unknown property constraint operator '{op_name}'"))
    })?;

    let (attribute, operand) = match body {
        serde_json::Value::Array(pair) if pair.len() == 2 => {
            let attribute = pair[0].as_str().ok_or_else(|| {
                Error::MalformedTemplate(format!("constraint attribute is not a string: {item}"))
            })?;
            (attribute.to_owned(), operand_from_json(&pair[1])?)
        }
        serde_json::Value::Object(_) => {
            let attribute = req_str(body, "leftHandSide")?.to_owned();
            let operand = operand_from_json(req_obj(body, "rightHandSide")?.get("value").ok_or_else(
                || Error::MalformedTemplate("rightHandSide missing value".into()),
            )?)?;
            (attribute, operand)
        }
        other => {
            return Err(Error::MalformedTemplate(format!(
                "unsupported constraint body: {other}"
            )));
        }
    };
    Ok(AttrConstraint::new(attribute, op, operand))
}

/// `alias.root[.path].attribute` → (thing id, attribute name).
fn resolve_path(path: &str) -> Result<(String, String)> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() < 3 || segments[1] != "root" {
        return Err(Error::UnresolvedPath(path.to_owned()));
    }
    let (thing, attr) = path.rsplit_once('.').ok_or_else(|| Error::UnresolvedPath(path.to_owned()))?;
    Ok((thing.to_owned(), attr.to_owned()))
}

fn parse_comparisons(entry: &serde_json::Value, comparisons: &mut Vec<Comparison>) -> Result<()> {
    let obj = entry.as_object().ok_or_else(|| {
        Error::MalformedTemplate(format!("comparison constraint is not an object: {entry}"))
    })?;

    for (key, body) in obj {
        match key.as_str() {
            "equals" => {
                // N-way equality normalizes to a pairwise chain off the first
                // path; the resolver's fixpoint closes the chain.
                let paths = body.as_array().ok_or_else(|| {
                    Error::MalformedTemplate("equals constraint expects a path array".into())
                })?;
                let mut resolved = paths.iter().map(|p| {
                    p.as_str()
                        .ok_or_else(|| Error::MalformedTemplate("equals path is not a string".into()))
                        .and_then(resolve_path)
                });
                let Some(first) = resolved.next().transpose()? else {
                    continue;
                };
                for other in resolved {
                    let (thing2, attr2) = other?;
                    comparisons.push(Comparison::new(
                        &first.0,
                        &first.1,
                        thing2,
                        attr2,
                        ComparisonKind::Equals,
                    ));
                }
            }
            "difference" => {
                // Oriented so value(thing1) − value(thing2) lands in the
                // interval: minuend first.
                let (thing1, attr1) = resolve_path(req_str(body, "minuend")?)?;
                let (thing2, attr2) = resolve_path(req_str(body, "subtrahend")?)?;
                let min_days = body.get("minValue").and_then(lenient_i64).unwrap_or(0);
                let max_days = body.get("maxValue").and_then(lenient_i64).unwrap_or(min_days);
                comparisons.push(Comparison::new(
                    thing1,
                    attr1,
                    thing2,
                    attr2,
                    ComparisonKind::Difference { min_days, max_days },
                ));
            }
            "geoNear" => {
                let geometries = req_array(body, "geometries")?;
                if geometries.len() != 2 {
                    return Err(Error::MalformedTemplate(
                        "geoNear expects exactly two geometries".into(),
                    ));
                }
                let (thing1, attr1) = resolve_path(geometries[0].as_str().ok_or_else(|| {
                    Error::MalformedTemplate("geoNear geometry is not a string".into())
                })?)?;
                let (thing2, attr2) = resolve_path(geometries[1].as_str().ok_or_else(|| {
                    Error::MalformedTemplate("geoNear geometry is not a string".into())
                })?)?;
                let max_meters = body.get("distance").and_then(lenient_f64).ok_or_else(|| {
                    Error::MalformedTemplate("geoNear constraint missing distance".into())
                })?;
                comparisons.push(Comparison::new(
                    thing1,
                    attr1,
                    thing2,
                    attr2,
                    ComparisonKind::GeoDistance { max_meters },
                ));
            }
            "sameAsNode" => {
                let paths = body.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                    Error::MalformedTemplate("sameAsNode expects exactly two paths".into())
                })?;
                let (thing1, attr1) = resolve_path(paths[0].as_str().ok_or_else(|| {
                    Error::MalformedTemplate("sameAsNode path is not a string".into())
                })?)?;
                let (thing2, attr2) = resolve_path(paths[1].as_str().ok_or_else(|| {
                    Error::MalformedTemplate("sameAsNode path is not a string".into())
                })?)?;
                comparisons.push(Comparison::new(
                    thing1,
                    attr1,
                    thing2,
                    attr2,
                    ComparisonKind::SameAs,
                ));
            }
            _ => {}
        }
    }
    Ok(())
}
