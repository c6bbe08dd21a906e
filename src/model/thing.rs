//! Entity ("thing") in the generated graph.

use serde::{Deserialize, Serialize};

use super::{AttrConstraint, AttrValue, GeoPoint};

/// How an attribute participates in the output graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKind {
    /// Scalar literal.
    Value,
    /// Reference to another entity's generated value.
    Object,
    /// (lat, lon) pair rendered as a GeoJSON point.
    GeoJson,
}

/// A resolved (name, value, kind) fact on one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
    pub kind: AttrKind,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttrValue>, kind: AttrKind) -> Self {
        Self { name: name.into(), value: value.into(), kind }
    }
}

/// One entity instance described by the template.
///
/// The `value` is the entity's globally-unique generated identifier. It is
/// assigned exactly once, lazily, the first time generation touches the
/// entity; `generated` marks specs already resolved so re-entry is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingSpec {
    /// Template-local identifier, stable across one run.
    pub id: String,
    /// Schema class emitted as the entity's rdf:type.
    pub schema_class: String,
    /// Generated globally-unique value. `None` until resolution.
    pub value: Option<String>,
    pub generated: bool,
    /// Declared attribute constraints, resolved in declaration order.
    pub attr_constraints: Vec<AttrConstraint>,
    /// Resolved attributes, accumulated during the resolution pass.
    pub attributes: Vec<Attribute>,
    /// Component alias this thing was hydrated from (component dialect only).
    pub component: Option<String>,
}

impl ThingSpec {
    pub fn new(id: impl Into<String>, schema_class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schema_class: schema_class.into(),
            value: None,
            generated: false,
            attr_constraints: Vec::new(),
            attributes: Vec::new(),
            component: None,
        }
    }

    pub fn with_constraint(mut self, constraint: AttrConstraint) -> Self {
        self.attr_constraints.push(constraint);
        self
    }

    pub fn with_component(mut self, alias: impl Into<String>) -> Self {
        self.component = Some(alias.into());
        self
    }

    /// First resolved value for the named attribute, any kind.
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    /// First resolved geo position for the named attribute.
    pub fn geo_attr(&self, name: &str) -> Option<GeoPoint> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.kind == AttrKind::GeoJson)
            .and_then(|a| a.value.as_geo())
    }

    pub fn push_attr(&mut self, name: impl Into<String>, value: impl Into<AttrValue>, kind: AttrKind) {
        self.attributes.push(Attribute::new(name, value, kind));
    }
}
