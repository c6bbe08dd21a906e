//! Legacy flat-dialect parser.

use crate::model::{
    AttrConstraint, Comparison, ComparisonKind, ConstraintOp, RelationshipSpec, ThingSpec,
};
use crate::{Error, Result};

use super::{
    Dialect, Identity, Template, lenient_f64, lenient_i64, operand_from_json, opt_array,
    req_array, req_obj, req_str,
};

pub(super) fn parse(value: &serde_json::Value) -> Result<Template> {
    let id = req_str(value, "id")?.to_owned();

    let mut things = Vec::new();
    for spec in req_array(value, "thingSpecs")? {
        things.push(parse_thing(spec)?);
    }

    let mut relationships = Vec::new();
    for spec in opt_array(value, "relationshipSpecs") {
        relationships.push(RelationshipSpec::new(
            req_str(spec, "node1")?,
            req_str(spec, "edge")?,
            req_str(spec, "node2")?,
        ));
    }

    let mut comparisons = Vec::new();
    for spec in opt_array(value, "comparisonConstraints") {
        comparisons.push(parse_comparison(spec)?);
    }

    let mut fragments = Vec::new();
    for spec in opt_array(value, "optionSubTemplateSpecs") {
        fragments.push(parse(req_obj(spec, "template")?)?);
    }

    let mut identities = Vec::new();
    for spec in opt_array(value, "thingIdentities") {
        identities.push(Identity {
            parent: req_str(spec, "thingSpecId1")?.to_owned(),
            candidate: req_str(spec, "thingSpecId2")?.to_owned(),
        });
    }

    Ok(Template {
        id,
        dialect: Dialect::Legacy,
        things,
        relationships,
        comparisons,
        fragments,
        identities,
    })
}

fn parse_thing(spec: &serde_json::Value) -> Result<ThingSpec> {
    let mut thing = ThingSpec::new(req_str(spec, "id")?, req_str(spec, "schemaClass")?);
    for constraint in opt_array(spec, "attributeConstraints") {
        let op_name = req_str(constraint, "attributeConstraintType")?;
        let op = ConstraintOp::parse(op_name).ok_or_else(|| {
            Error::MalformedTemplate(format!("unknown attribute constraint type '{op_name}'"))
        })?;
        let operand = constraint
            .get("value")
            .map(operand_from_json)
            .transpose()?
            .unwrap_or_else(|| "".into());
        thing
            .attr_constraints
            .push(AttrConstraint::new(req_str(constraint, "schemaAttribute")?, op, operand));
    }
    Ok(thing)
}

fn parse_comparison(spec: &serde_json::Value) -> Result<Comparison> {
    let constraint = req_obj(spec, "constraint")?;
    let kind = parse_kind(constraint)?;
    Ok(Comparison::new(
        req_str(spec, "thing1")?,
        req_str(spec, "schemaAttribute1")?,
        req_str(spec, "thing2")?,
        req_str(spec, "schemaAttribute2")?,
        kind,
    ))
}

fn parse_kind(constraint: &serde_json::Value) -> Result<ComparisonKind> {
    if constraint.get("predicate").and_then(|v| v.as_str()) == Some("EQUALS") {
        return Ok(ComparisonKind::Equals);
    }
    if constraint.get("differenceConstraint").and_then(|v| v.as_str()) == Some("true") {
        let min_days = constraint.get("minValue").and_then(lenient_i64).unwrap_or(0);
        let max_days = constraint
            .get("maxValue")
            .and_then(lenient_i64)
            .unwrap_or(min_days);
        return Ok(ComparisonKind::Difference { min_days, max_days });
    }
    if constraint.get("norm").and_then(|v| v.as_str()) == Some("GEO_DISTANCE") {
        let max_meters = constraint
            .get("maxValue")
            .and_then(lenient_f64)
            .ok_or_else(|| {
                Error::MalformedTemplate("GEO_DISTANCE constraint missing maxValue".into())
            })?;
        return Ok(ComparisonKind::GeoDistance { max_meters });
    }
    Err(Error::MalformedTemplate(format!(
        "unrecognized comparison constraint: {constraint}"
    )))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn template_json() -> serde_json::Value {
        serde_json::json!({
            "id": "burglary",
            "thingSpecs": [
                {
                    "id": "suspect",
                    "schemaClass": "Person",
                    "attributeConstraints": [
                        { "schemaAttribute": "personName", "attributeConstraintType": "ANY", "value": "" },
                        { "schemaAttribute": "personAge", "attributeConstraintType": "GREATER_THAN", "value": 18 }
                    ]
                },
                { "id": "scene", "schemaClass": "Location" }
            ],
            "relationshipSpecs": [
                { "node1": "suspect", "edge": "location", "node2": "scene" }
            ],
            "comparisonConstraints": [
                {
                    "thing1": "suspect", "thing2": "scene",
                    "schemaAttribute1": "personGeo", "schemaAttribute2": "locationGeo",
                    "constraint": { "norm": "GEO_DISTANCE", "maxValue": 1000 }
                }
            ]
        })
    }

    #[test]
    fn test_parse_full_template() {
        let template = parse(&template_json()).unwrap();
        assert_eq!(template.id, "burglary");
        assert_eq!(template.dialect, Dialect::Legacy);
        assert_eq!(template.things.len(), 2);
        assert_eq!(template.things[0].attr_constraints.len(), 2);
        assert_eq!(template.things[0].attr_constraints[1].op, ConstraintOp::GreaterThan);
        assert_eq!(template.relationships.len(), 1);
        assert_eq!(
            template.comparisons[0].kind,
            ComparisonKind::GeoDistance { max_meters: 1000.0 }
        );
    }

    #[test]
    fn test_missing_required_key_is_fatal() {
        let missing_class = serde_json::json!({
            "id": "t",
            "thingSpecs": [ { "id": "a" } ]
        });
        assert!(matches!(
            parse(&missing_class),
            Err(Error::MalformedTemplate(_))
        ));
    }

    #[test]
    fn test_difference_constraint_bounds() {
        let spec = serde_json::json!({
            "thing1": "a", "thing2": "b",
            "schemaAttribute1": "x", "schemaAttribute2": "y",
            "constraint": { "differenceConstraint": "true", "minValue": "-2", "maxValue": 5 }
        });
        let comparison = parse_comparison(&spec).unwrap();
        assert_eq!(
            comparison.kind,
            ComparisonKind::Difference { min_days: -2, max_days: 5 }
        );
    }

    #[test]
    fn test_nested_fragments_parse_recursively() {
        let nested = serde_json::json!({
            "id": "outer",
            "thingSpecs": [ { "id": "k", "schemaClass": "Person" } ],
            "optionSubTemplateSpecs": [
                { "template": { "id": "inner", "thingSpecs": [ { "id": "x", "schemaClass": "Person" } ] } }
            ],
            "thingIdentities": [ { "thingSpecId1": "k", "thingSpecId2": "x" } ]
        });
        let template = parse(&nested).unwrap();
        assert_eq!(template.fragments.len(), 1);
        assert_eq!(template.fragments[0].id, "inner");
        assert_eq!(template.identities[0].parent, "k");
        assert_eq!(template.identities[0].candidate, "x");
    }
}
