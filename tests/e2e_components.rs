//! End-to-end tests for the component-dialect pipeline: hydration from a
//! component library, path-addressed constraints, identity aliasing and
//! partial emission.

use graphsynth::propagate::geodesic_distance_m;
use graphsynth::template::{ComponentLibrary, Template};
use graphsynth::{Partial, PartialMode, ProjectOptions, RunParams, Synthesizer};
use pretty_assertions::assert_eq;

fn params(seed: u64) -> RunParams {
    RunParams::new(40.0, -75.0, seed, 1_600_000_000)
}

fn library() -> ComponentLibrary {
    let mut library = ComponentLibrary::new();
    library
        .insert(serde_json::json!({
            "id": "person-at-home",
            "hydratedThingSpec": {
                "rootThing": {
                    "dataSchemaClass": "Person",
                    "dataTypePropertyConstraints": [
                        { "any": ["personAlias", ""] }
                    ]
                },
                "thingPropertyConstraints": [
                    {
                        "pathFromRoot": "home",
                        "dataSchemaClass": "Location",
                        "dataTypePropertyConstraints": [
                            { "stringLike": ["locationCity", "Spring"] }
                        ]
                    }
                ]
            }
        }))
        .unwrap();
    library
}

fn two_person_template() -> serde_json::Value {
    serde_json::json!({
        "id": "neighbors",
        "templateComponents": [
            { "id": "person-at-home", "alias": "alpha" },
            { "id": "person-at-home", "alias": "beta" }
        ],
        "templateComponentComparisonConstraints": [
            { "equals": ["alpha.root.personName", "beta.root.personName"] },
            {
                "geoNear": {
                    "geometries": ["alpha.root.home.locationGeo", "beta.root.home.locationGeo"],
                    "distance": 1500
                }
            }
        ]
    })
}

// ============================================================================
// 1. Hydration and path-derived structure
// ============================================================================

#[test]
fn test_hydrated_components_resolve_and_project() {
    let template =
        Template::from_json_with_components(&two_person_template(), &library()).unwrap();
    let synthesis = Synthesizer::new().synthesize(template, &params(3)).unwrap();

    // Each component contributed a root and a home thing.
    let alpha_root = synthesis.template.thing("alpha.root").unwrap();
    let alpha_home = synthesis.template.thing("alpha.root.home").unwrap();
    assert!(alpha_root.generated && alpha_home.generated);

    // The home's constraint resolved in place.
    let city = alpha_home.attr("locationCity").unwrap().as_str().unwrap().to_owned();
    assert!(city.split_whitespace().any(|tok| tok == "Spring"));

    // The path implies a root --home--> home object triple.
    let home_value = alpha_home.value.clone().unwrap();
    assert!(
        synthesis
            .triples
            .iter()
            .any(|t| t.predicate.contains("home") && t.object.contains(&home_value))
    );

    // Answer keys carry the path-addressed entity id.
    assert!(
        synthesis
            .triples
            .iter()
            .any(|t| t.object.contains(&format!("{}|alpha.root.home", synthesis.origin_source)))
    );
}

// ============================================================================
// 2. Cross-component equality and geo proximity
// ============================================================================

#[test]
fn test_cross_component_constraints_hold() {
    let template =
        Template::from_json_with_components(&two_person_template(), &library()).unwrap();
    let synthesis = Synthesizer::new().synthesize(template, &params(5)).unwrap();

    let alpha_name = synthesis.template.thing("alpha.root").unwrap().attr("personName").unwrap();
    let beta_name = synthesis.template.thing("beta.root").unwrap().attr("personName").unwrap();
    assert_eq!(alpha_name, beta_name);

    let pa = synthesis
        .template
        .thing("alpha.root.home")
        .unwrap()
        .geo_attr("locationGeo")
        .unwrap();
    let pb = synthesis
        .template
        .thing("beta.root.home")
        .unwrap()
        .geo_attr("locationGeo")
        .unwrap();
    assert!(geodesic_distance_m(pa, pb) <= 1500.0);
}

// ============================================================================
// 3. Constraint overrides replace the component's defaults
// ============================================================================

#[test]
fn test_overrides_take_precedence() {
    let json = serde_json::json!({
        "id": "override",
        "templateComponents": [{
            "id": "person-at-home",
            "alias": "only",
            "thingPropertyConstraintOverrides": [{
                "pathToThing": "root.home",
                "dataTypePropertyConstraints": [
                    { "equals": ["locationCity", "Philadelphia"] }
                ]
            }]
        }]
    });
    let template = Template::from_json_with_components(&json, &library()).unwrap();
    let synthesis = Synthesizer::new().synthesize(template, &params(5)).unwrap();
    assert_eq!(
        synthesis
            .template
            .thing("only.root.home")
            .unwrap()
            .attr("locationCity")
            .unwrap()
            .as_str(),
        Some("Philadelphia")
    );
}

// ============================================================================
// 4. sameAsNode: hard identity aliasing
// ============================================================================

#[test]
fn test_same_as_node_aliases_generated_identity() {
    let json = serde_json::json!({
        "id": "alias",
        "templateComponents": [
            { "id": "person-at-home", "alias": "alpha" },
            { "id": "person-at-home", "alias": "beta" }
        ],
        "templateComponentComparisonConstraints": [
            { "sameAsNode": ["alpha.root.id", "beta.root.id"] }
        ]
    });
    let template = Template::from_json_with_components(&json, &library()).unwrap();
    let synthesis = Synthesizer::new().synthesize(template, &params(6)).unwrap();

    // Two distinct entity records share one output identity.
    let alpha = synthesis.template.thing("alpha.root").unwrap();
    let beta = synthesis.template.thing("beta.root").unwrap();
    assert_eq!(alpha.value, beta.value);
    assert_ne!(alpha.id, beta.id);
}

// ============================================================================
// 5. Temporal difference between component attributes
// ============================================================================

#[test]
fn test_component_difference_constraint() {
    let json = serde_json::json!({
        "id": "timeline",
        "templateComponents": [
            { "id": "person-at-home", "alias": "alpha" },
            { "id": "person-at-home", "alias": "beta" }
        ],
        "templateComponentComparisonConstraints": [{
            "difference": {
                "minuend": "alpha.root.lastSeenDate",
                "subtrahend": "beta.root.lastSeenDate",
                "minValue": 3,
                "maxValue": 8
            }
        }]
    });
    let template = Template::from_json_with_components(&json, &library()).unwrap();
    let synthesis = Synthesizer::new().synthesize(template, &params(8)).unwrap();

    let minuend = synthesis
        .template
        .thing("alpha.root")
        .unwrap()
        .attr("lastSeenDate")
        .unwrap()
        .as_timestamp()
        .unwrap();
    let subtrahend = synthesis
        .template
        .thing("beta.root")
        .unwrap()
        .attr("lastSeenDate")
        .unwrap()
        .as_timestamp()
        .unwrap();
    let days = (minuend - subtrahend).num_days();
    assert!((3..=8).contains(&days), "difference {days} out of bounds");
}

// ============================================================================
// 6. Partial emission by component group
// ============================================================================

#[test]
fn test_component_partial_emission() {
    let template =
        Template::from_json_with_components(&two_person_template(), &library()).unwrap();
    let run = params(4).with_project(ProjectOptions {
        trim: false,
        partial: Some(Partial { mode: PartialMode::Component, percent: 50.0 }),
    });
    let synthesis = Synthesizer::new().synthesize(template, &run).unwrap();

    // Exactly one of the two component groups survives.
    let alpha_emitted = synthesis
        .triples
        .iter()
        .any(|t| t.object.contains("|alpha.root"));
    let beta_emitted = synthesis
        .triples
        .iter()
        .any(|t| t.object.contains("|beta.root"));
    assert!(alpha_emitted != beta_emitted);
}
