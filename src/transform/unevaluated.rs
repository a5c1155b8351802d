//! `unevaluatedProperties`/`unevaluatedItems` reconciliation.
//!
//! The 3.0-era type generator only understands `additionalProperties` /
//! `additionalItems`, while the validator engine wants the precise 2020-12
//! keyword. Both are therefore emitted: the 3.1 keyword stays, and its value
//! is mirrored into (or wins over) the 3.0 keyword.
//!
//! Conflict policy when both keywords are present:
//! - equal values → no conflict, nothing to do
//! - boolean vs boolean → `unevaluated*` wins ("boolean-mismatch")
//! - boolean additional, schema unevaluated → schema wins ("schema-override")
//! - anything else → "complex"; the `unevaluated*` value is copied verbatim.
//!   This is a deliberate compatibility shim, not 2020-12 semantics, which
//!   would weigh every evaluated subschema instead of overriding.

use serde_json::{Map, Value};

use crate::error::{feature, TransformError};
use crate::node::{build_path, rewrite_children, ChildPositions};
use crate::transform::TransformResult;

// ------------------------------ Conflict model ---------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    BooleanMismatch,
    SchemaOverride,
    Complex,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BooleanMismatch => "boolean-mismatch",
            Self::SchemaOverride => "schema-override",
            Self::Complex => "complex",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnevaluatedConflict {
    /// Pointer of the node holding both keywords.
    pub location: String,
    /// Which keyword pair clashed.
    pub keyword: &'static str,
    pub kind: ConflictKind,
}

#[derive(Debug, Clone, Default)]
pub struct UnevaluatedMeta {
    pub conflicts: Vec<UnevaluatedConflict>,
}

/// Shape summary of one `unevaluatedProperties`/`unevaluatedItems` value.
/// Exactly one of `disallowed`/`allowed` is true when `has_schema` is false.
#[derive(Debug, Clone)]
pub struct UnevaluatedPropertiesInfo {
    pub disallowed: bool,
    pub allowed: bool,
    pub has_schema: bool,
    pub schema: Option<Value>,
}

/// Classify a keyword value, rejecting anything that is neither boolean nor
/// object.
pub fn classify(value: &Value, location: &str) -> Result<UnevaluatedPropertiesInfo, TransformError> {
    match value {
        Value::Bool(b) => Ok(UnevaluatedPropertiesInfo {
            disallowed: !*b,
            allowed: *b,
            has_schema: false,
            schema: None,
        }),
        Value::Object(_) => Ok(UnevaluatedPropertiesInfo {
            disallowed: false,
            allowed: false,
            has_schema: true,
            schema: Some(value.clone()),
        }),
        other => Err(TransformError::invalid_usage(
            feature::UNEVALUATED,
            location,
            format!("value must be a boolean or a schema object, found {other}"),
            None,
        )),
    }
}

// --------------------------------- Pass ----------------------------------- //

pub fn transform(node: Value, location: &str) -> Result<TransformResult<UnevaluatedMeta>, TransformError> {
    let mut meta = UnevaluatedMeta::default();
    let (schema, was_transformed) = walk(node, location, &mut meta)?;
    Ok(TransformResult { schema, was_transformed, meta })
}

fn walk(node: Value, path: &str, meta: &mut UnevaluatedMeta) -> Result<(Value, bool), TransformError> {
    let mut obj = match node {
        Value::Object(obj) => obj,
        other => return Ok((other, false)),
    };
    let mut changed = reconcile(&mut obj, path, "unevaluatedProperties", "additionalProperties", meta)?;
    changed |= reconcile(&mut obj, path, "unevaluatedItems", "additionalItems", meta)?;
    changed |= rewrite_children(&mut obj, path, ChildPositions::ALL, &mut |child, child_path| {
        walk(child, child_path, meta)
    })?;
    Ok((Value::Object(obj), changed))
}

/// Mirror/override `unevaluated_key` into `additional_key` on one node.
fn reconcile(
    obj: &mut Map<String, Value>,
    path: &str,
    unevaluated_key: &'static str,
    additional_key: &'static str,
    meta: &mut UnevaluatedMeta,
) -> Result<bool, TransformError> {
    let Some(unevaluated) = obj.get(unevaluated_key).cloned() else {
        return Ok(false);
    };
    classify(&unevaluated, &build_path(path, &[unevaluated_key]))?;

    match obj.get(additional_key) {
        // only the 3.1 keyword: mirror it in, keep the original too
        None => {
            obj.insert(additional_key.to_string(), unevaluated);
            Ok(true)
        }
        // equal values, boolean or schema: nothing to reconcile
        Some(additional) if *additional == unevaluated => Ok(false),
        Some(additional) => {
            let kind = match (additional, &unevaluated) {
                (Value::Bool(_), Value::Bool(_)) => ConflictKind::BooleanMismatch,
                (Value::Bool(_), Value::Object(_)) => ConflictKind::SchemaOverride,
                _ => ConflictKind::Complex,
            };
            meta.conflicts.push(UnevaluatedConflict {
                location: path.to_string(),
                keyword: unevaluated_key,
                kind,
            });
            // last-write-wins toward the stricter 3.1 keyword
            obj.insert(additional_key.to_string(), unevaluated);
            Ok(true)
        }
    }
}

// --------------------------------- Tests ---------------------------------- //
