//! Declarative field definitions.
//!
//! A schema is a tree of field definitions. Every node is exactly one of four
//! shapes: a leaf input (carries a `type` string), an object with named
//! `properties`, a list with a single `item` definition applied to every
//! index, or an anonymous object (a bare map of named sub-definitions). The
//! raw JSON form is probed for shape once, at load time; everything after that
//! dispatches on the [`FieldShape`] sum type.

use crate::error::SchemaError;
use crate::expr::{WhenClause, parse::parse_when};
use crate::path::{Path, Segment};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The four mutually exclusive field shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    /// A leaf input such as `number`, `select` or `text`.
    Leaf { field_type: String },
    /// A composite with named, typed properties.
    Object { properties: BTreeMap<String, FieldDef> },
    /// A homogeneous list; `item` applies to every index.
    List { item: Box<FieldDef> },
    /// A bare map of named sub-definitions with no declared type.
    Anonymous { entries: BTreeMap<String, FieldDef> },
}

/// A node in the definition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub shape: FieldShape,
    /// Visibility condition; absent means always visible.
    pub when: Option<WhenClause>,
    pub default_value: Option<Value>,
    /// Extraction pattern for the displayed value. A field declaring one must
    /// either hold a model value or carry a default.
    pub value_pattern: Option<String>,
}

impl Default for FieldDef {
    /// The resilient fallback returned for unknown paths: an empty anonymous
    /// object with no condition.
    fn default() -> FieldDef {
        FieldDef {
            shape: FieldShape::Anonymous {
                entries: BTreeMap::new(),
            },
            when: None,
            default_value: None,
            value_pattern: None,
        }
    }
}

/// Raw JSON form of one node; children stay untyped until their own pass.
#[derive(Debug, Deserialize)]
struct RawFieldDef {
    #[serde(rename = "type")]
    field_type: Option<String>,
    properties: Option<BTreeMap<String, Value>>,
    item: Option<Value>,
    when: Option<Value>,
    #[serde(rename = "defaultValue")]
    default_value: Option<Value>,
    #[serde(rename = "valueRegExp")]
    value_pattern: Option<String>,
    #[serde(flatten)]
    anonymous: BTreeMap<String, Value>,
}

fn convert(raw_value: &Value, at: &Path) -> Result<FieldDef, SchemaError> {
    let raw: RawFieldDef = serde_json::from_value(raw_value.clone())
        .map_err(|e| SchemaError::JsonParse(format!("at '{}': {}", at, e)))?;

    let shape = resolve_shape(&raw, at)?;

    let when = raw
        .when
        .as_ref()
        .map(|expr| parse_when(expr, at))
        .transpose()?;

    if let Some(pattern) = &raw.value_pattern {
        Regex::new(pattern).map_err(|e| SchemaError::InvalidValuePattern {
            path: at.clone(),
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
    }

    Ok(FieldDef {
        shape,
        when,
        default_value: raw.default_value,
        value_pattern: raw.value_pattern,
    })
}

/// Enforces the exactly-one-shape invariant, then recurses into children.
fn resolve_shape(raw: &RawFieldDef, at: &Path) -> Result<FieldShape, SchemaError> {
    let declared: Vec<&str> = [
        raw.field_type.as_ref().map(|_| "type"),
        raw.properties.as_ref().map(|_| "properties"),
        raw.item.as_ref().map(|_| "item"),
        (!raw.anonymous.is_empty()).then_some("anonymous entries"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if declared.len() > 1 {
        return Err(SchemaError::AmbiguousShape {
            path: at.clone(),
            found: declared.join(" + "),
        });
    }

    if let Some(field_type) = &raw.field_type {
        return Ok(FieldShape::Leaf {
            field_type: field_type.clone(),
        });
    }
    if let Some(properties) = &raw.properties {
        return Ok(FieldShape::Object {
            properties: convert_entries(properties, at)?,
        });
    }
    if let Some(item) = &raw.item {
        let item_path = at.child(Segment::Wildcard);
        return Ok(FieldShape::List {
            item: Box::new(convert(item, &item_path)?),
        });
    }
    // No reserved keys at all: a bare map of named sub-definitions.
    Ok(FieldShape::Anonymous {
        entries: convert_entries(&raw.anonymous, at)?,
    })
}

fn convert_entries(
    entries: &BTreeMap<String, Value>,
    at: &Path,
) -> Result<BTreeMap<String, FieldDef>, SchemaError> {
    entries
        .iter()
        .map(|(name, child)| {
            let child_path = at.child(Segment::Named(name.clone()));
            Ok((name.clone(), convert(child, &child_path)?))
        })
        .collect()
}

/// A complete, validated definition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub root: FieldDef,
}

impl Schema {
    /// Loads a schema from its raw JSON form, validating shapes, `when`
    /// expressions and value patterns up front.
    pub fn from_json(raw: &Value) -> Result<Schema, SchemaError> {
        Ok(Schema {
            root: convert(raw, &Path::root())?,
        })
    }

    pub fn from_str(raw: &str) -> Result<Schema, SchemaError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| SchemaError::JsonParse(e.to_string()))?;
        Schema::from_json(&value)
    }

    /// Flattens the tree into `(path, definition)` pairs. Object and anonymous
    /// entries contribute named segments, list items a wildcard segment. The
    /// root itself is included under the empty path.
    pub fn flatten(&self) -> Vec<(Path, &FieldDef)> {
        let mut out = Vec::new();
        Self::walk(&self.root, Path::root(), &mut out);
        out
    }

    fn walk<'a>(def: &'a FieldDef, path: Path, out: &mut Vec<(Path, &'a FieldDef)>) {
        match &def.shape {
            FieldShape::Leaf { .. } => {}
            FieldShape::Object { properties } | FieldShape::Anonymous { entries: properties } => {
                for (name, child) in properties {
                    Self::walk(child, path.child(Segment::Named(name.clone())), out);
                }
            }
            FieldShape::List { item } => {
                Self::walk(item, path.child(Segment::Wildcard), out);
            }
        }
        out.push((path, def));
    }

    /// Resolves the definition at a path. Unknown or partially specified paths
    /// yield the default empty definition instead of an error, so rendering
    /// stays resilient to mid-edit states.
    pub fn definition_at(&self, path: &Path) -> FieldDef {
        let mut current = &self.root;
        for segment in path.segments() {
            let next = match (&current.shape, segment) {
                (FieldShape::Object { properties }, Segment::Named(name)) => properties.get(name),
                (FieldShape::Anonymous { entries }, Segment::Named(name)) => entries.get(name),
                (FieldShape::List { item }, Segment::Index(_) | Segment::Wildcard) => {
                    Some(item.as_ref())
                }
                _ => None,
            };
            match next {
                Some(def) => current = def,
                None => return FieldDef::default(),
            }
        }
        current.clone()
    }
}
