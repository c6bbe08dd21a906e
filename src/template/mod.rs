//! Template documents: the declarative input a run instantiates.
//!
//! Two schema dialects are supported and normalized into one internal
//! [`Template`]:
//! - **Legacy** flat form: `thingSpecs` / `relationshipSpecs` /
//!   `comparisonConstraints`, with nested `optionSubTemplateSpecs` fragments
//!   joined through `thingIdentities`.
//! - **Component** form: `templateComponents` hydrated from a
//!   [`ComponentLibrary`], with path-addressed sub-attributes like
//!   `alias.root.pathFromRoot`.
//!
//! Template *files* are the caller's business; parsing starts from
//! `serde_json::Value`. Missing required keys abort immediately — no partial
//! output from a malformed template.

pub mod merger;
mod v0;
mod v1;

pub use v1::ComponentLibrary;

use serde::{Deserialize, Serialize};

use crate::model::{AttrValue, Comparison, RelationshipSpec, ThingSpec};
use crate::{Error, Result};

/// Which schema dialect a template arrived in. Drives the default
/// propagation toggles of the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    Legacy,
    Component,
}

/// Identification of a parent entity with a fragment entity: the parent's
/// `parent` thing may be identified with `candidate` in one of the fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub parent: String,
    pub candidate: String,
}

/// Normalized template, dialect differences resolved at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub dialect: Dialect,
    pub things: Vec<ThingSpec>,
    pub relationships: Vec<RelationshipSpec>,
    pub comparisons: Vec<Comparison>,
    /// Legacy option sub-templates, consumed by the identity merger.
    pub fragments: Vec<Template>,
    /// Legacy thing identities, consumed by the identity merger.
    pub identities: Vec<Identity>,
}

impl Template {
    /// Parse a legacy-dialect template document.
    ///
    /// Component-dialect documents need a component library; use
    /// [`Template::from_json_with_components`] for those.
    pub fn from_json(value: &serde_json::Value) -> Result<Template> {
        if value.get("thingSpecs").is_some() {
            v0::parse(value)
        } else if value.get("templateComponents").is_some() {
            Err(Error::MalformedTemplate(
                "component-dialect template requires a component library".into(),
            ))
        } else {
            Err(Error::MalformedTemplate(
                "template has neither thingSpecs nor templateComponents".into(),
            ))
        }
    }

    /// Parse either dialect, hydrating component references from `library`.
    pub fn from_json_with_components(
        value: &serde_json::Value,
        library: &ComponentLibrary,
    ) -> Result<Template> {
        if value.get("thingSpecs").is_some() {
            v0::parse(value)
        } else {
            v1::parse(value, library)
        }
    }

    pub fn from_str(s: &str) -> Result<Template> {
        Self::from_json(&serde_json::from_str(s)?)
    }

    pub fn thing(&self, id: &str) -> Option<&ThingSpec> {
        self.things.iter().find(|t| t.id == id)
    }

    pub fn thing_mut(&mut self, id: &str) -> Option<&mut ThingSpec> {
        self.things.iter_mut().find(|t| t.id == id)
    }
}

// ============================================================================
// JSON extraction helpers shared by both dialect parsers
// ============================================================================

pub(crate) fn req_str<'a>(value: &'a serde_json::Value, key: &str) -> Result<&'a str> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::MalformedTemplate(format!("missing required string key '{key}'")))
}

pub(crate) fn req_array<'a>(
    value: &'a serde_json::Value,
    key: &str,
) -> Result<&'a Vec<serde_json::Value>> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::MalformedTemplate(format!("missing required array key '{key}'")))
}

pub(crate) fn req_obj<'a>(value: &'a serde_json::Value, key: &str) -> Result<&'a serde_json::Value> {
    value
        .get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| Error::MalformedTemplate(format!("missing required object key '{key}'")))
}

pub(crate) fn opt_array<'a>(
    value: &'a serde_json::Value,
    key: &str,
) -> &'a [serde_json::Value] {
    value.get(key).and_then(|v| v.as_array()).map_or(&[], Vec::as_slice)
}

/// Integers arrive as JSON numbers or numeric strings in the wild.
pub(crate) fn lenient_i64(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

pub(crate) fn lenient_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// A constraint operand: string or number, anything else is malformed.
pub(crate) fn operand_from_json(value: &serde_json::Value) -> Result<AttrValue> {
    match value {
        serde_json::Value::String(s) => Ok(AttrValue::Text(s.clone())),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(AttrValue::Float)
            .ok_or_else(|| Error::MalformedTemplate("non-finite numeric operand".into())),
        serde_json::Value::Null => Ok(AttrValue::Text(String::new())),
        other => Err(Error::MalformedTemplate(format!(
            "unsupported operand type: {other}"
        ))),
    }
}
