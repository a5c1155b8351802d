//! SchemaNode helper layer.
//!
//! Schemas stay as untyped `serde_json::Value` trees (externally-supplied
//! JSON; a closed type would force invalid states). This module provides the
//! narrow per-keyword accessors the passes share, JSON-pointer building, and
//! the child-recursion walker every pass drives.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::TransformError;

// ------------------------------ JSON pointers ----------------------------- //

/// Escape one pointer segment per RFC 6901 (`~` → `~0`, `/` → `~1`).
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Append segments to a base pointer. The document root is `"#"`.
pub fn build_path(base: &str, segments: &[&str]) -> String {
    let mut out = String::from(base);
    for seg in segments {
        out.push('/');
        out.push_str(&escape_segment(seg));
    }
    out
}

/// Re-root a pointer from prefix `from` to `to`. `None` when the pointer is
/// not at or under `from` (a prefix match must end on a segment boundary, so
/// `#/a` is not a prefix of `#/ab`).
pub fn rebase_pointer(pointer: &str, from: &str, to: &str) -> Option<String> {
    let rest = pointer.strip_prefix(from)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(format!("{to}{rest}"))
    } else {
        None
    }
}

// ---------------------------- Type introspection -------------------------- //

/// The seven JSON-Schema primitive type names.
pub const PRIMITIVE_TYPES: &[&str] =
    &["array", "boolean", "integer", "null", "number", "object", "string"];

pub fn is_primitive_type(name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&name)
}

/// Scalar `type` of a node, if it has one (`type: "array"` → `Some("array")`).
pub fn scalar_type(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("type").and_then(Value::as_str)
}

/// Extract type(s) from a schema node, handling both string and array forms.
pub fn extract_types(obj: &Map<String, Value>) -> Vec<String> {
    match obj.get("type") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => vec![],
    }
}

/// Does a raw `type` value include `"null"` (string or array form)?
pub fn type_contains_null(type_val: &Value) -> bool {
    match type_val {
        Value::String(s) => s == "null",
        Value::Array(arr) => arr.iter().any(|t| t.as_str() == Some("null")),
        _ => false,
    }
}

// -------------------------- Property introspection ------------------------ //

pub fn extract_required_set(obj: &Map<String, Value>) -> HashSet<String> {
    obj.get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default()
}

pub fn extract_property_keys(obj: &Map<String, Value>) -> Vec<String> {
    obj.get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

/// Append `name` to the node's `required` list unless already present.
/// Returns true when the list changed.
pub fn ensure_required(obj: &mut Map<String, Value>, name: &str) -> bool {
    match obj.get_mut("required") {
        Some(Value::Array(list)) => {
            if list.iter().any(|v| v.as_str() == Some(name)) {
                false
            } else {
                list.push(Value::from(name));
                true
            }
        }
        _ => {
            obj.insert("required".to_string(), Value::Array(vec![Value::from(name)]));
            true
        }
    }
}

// ----------------------------- Fingerprinting ----------------------------- //

/// Cheap, deterministic structural fingerprint of a node. Serialized form is
/// hashed so structurally-equal trees collide on purpose; the seed folds the
/// active flag set in, keeping cache entries flag-specific.
pub fn structural_fingerprint(node: &Value, seed: u64) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut h = DefaultHasher::new();
    seed.hash(&mut h);
    // preserve_order makes serialization stable for a given tree
    serde_json::to_string(node).unwrap_or_default().hash(&mut h);
    h.finish()
}

// ------------------------------ Child walker ------------------------------ //

/// Which optional nested positions a pass descends into, beyond the standard
/// set (`properties/*`, `items`, `additionalProperties`, `additionalItems`,
/// `allOf`/`anyOf`/`oneOf` elements).
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildPositions {
    pub prefix_items: bool,
    pub conditionals: bool,
}

impl ChildPositions {
    pub const STANDARD: Self = Self { prefix_items: false, conditionals: false };
    pub const ALL: Self = Self { prefix_items: true, conditionals: true };
}

const COMBINERS: &[&str] = &["allOf", "anyOf", "oneOf"];

/// Rewrite every nested schema position of `obj` in place via `f`, which
/// receives each child by value plus its JSON pointer and returns the
/// replacement plus a changed flag. Returns the OR of all child flags.
///
/// `items` is handled in both the single-schema and the legacy 3.0 array
/// form. Schema-valued `unevaluatedProperties`/`unevaluatedItems` are always
/// descended into; boolean forms are left alone.
pub fn rewrite_children<F>(
    obj: &mut Map<String, Value>,
    path: &str,
    positions: ChildPositions,
    f: &mut F,
) -> Result<bool, TransformError>
where
    F: FnMut(Value, &str) -> Result<(Value, bool), TransformError>,
{
    let mut changed = false;

    // properties/<key>
    if let Some(Value::Object(props)) = obj.get_mut("properties") {
        let base = build_path(path, &["properties"]);
        for (key, slot) in props.iter_mut() {
            let child_path = build_path(&base, &[key]);
            changed |= rewrite_slot(slot, &child_path, f)?;
        }
    }

    // items — single schema or legacy array form
    match obj.get_mut("items") {
        Some(slot @ Value::Object(_)) => {
            changed |= rewrite_slot(slot, &build_path(path, &["items"]), f)?;
        }
        Some(Value::Array(elems)) => {
            let base = build_path(path, &["items"]);
            for (i, slot) in elems.iter_mut().enumerate() {
                changed |= rewrite_slot(slot, &build_path(&base, &[&i.to_string()]), f)?;
            }
        }
        _ => {}
    }

    // schema-valued additionalProperties / additionalItems / unevaluated*
    for key in ["additionalProperties", "additionalItems", "unevaluatedProperties", "unevaluatedItems"] {
        if let Some(slot) = obj.get_mut(key) {
            if slot.is_object() {
                changed |= rewrite_slot(slot, &build_path(path, &[key]), f)?;
            }
        }
    }

    // allOf / anyOf / oneOf elements
    for combiner in COMBINERS {
        if let Some(Value::Array(members)) = obj.get_mut(*combiner) {
            let base = build_path(path, &[combiner]);
            for (i, slot) in members.iter_mut().enumerate() {
                changed |= rewrite_slot(slot, &build_path(&base, &[&i.to_string()]), f)?;
            }
        }
    }

    if positions.prefix_items {
        if let Some(Value::Array(elems)) = obj.get_mut("prefixItems") {
            let base = build_path(path, &["prefixItems"]);
            for (i, slot) in elems.iter_mut().enumerate() {
                changed |= rewrite_slot(slot, &build_path(&base, &[&i.to_string()]), f)?;
            }
        }
    }

    if positions.conditionals {
        for key in ["if", "then", "else"] {
            if let Some(slot) = obj.get_mut(key) {
                if slot.is_object() {
                    changed |= rewrite_slot(slot, &build_path(path, &[key]), f)?;
                }
            }
        }
    }

    Ok(changed)
}

fn rewrite_slot<F>(slot: &mut Value, child_path: &str, f: &mut F) -> Result<bool, TransformError>
where
    F: FnMut(Value, &str) -> Result<(Value, bool), TransformError>,
{
    let old = std::mem::take(slot);
    let (new, child_changed) = f(old, child_path)?;
    *slot = new;
    Ok(child_changed)
}

// --------------------------------- Tests ---------------------------------- //
