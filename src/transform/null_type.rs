//! Null-type normalization.
//!
//! Translates 3.1 type arrays into the normalized shape the 3.0-era
//! generator understands:
//! - `type: [X, "null"]` → `{type: X, nullable: true}`
//! - `type: [X, Y, ...]` (2+ non-null types) → `anyOf` of per-type arms,
//!   with `type`/`nullable` removed
//! - `type: ["null"]` → `{type: "null"}` (degenerate but valid)
//!
//! A scalar `type`, with or without a legacy `nullable: true`, is already in
//! normalized shape and passes through untouched, which keeps the pass
//! idempotent on its own output.

use serde_json::{json, Map, Value};

use crate::error::{feature, TransformError};
use crate::node::{is_primitive_type, rewrite_children, ChildPositions};
use crate::transform::TransformResult;

/// Root-level metadata: the resolved type set when the root had a type array.
#[derive(Debug, Clone, Default)]
pub struct NullTypeMeta {
    pub union_types: Option<Vec<String>>,
}

pub fn transform(node: Value, location: &str) -> Result<TransformResult<NullTypeMeta>, TransformError> {
    let mut meta = NullTypeMeta::default();
    let (schema, was_transformed) = walk(node, location, true, &mut meta)?;
    Ok(TransformResult { schema, was_transformed, meta })
}

fn walk(
    node: Value,
    path: &str,
    is_root: bool,
    meta: &mut NullTypeMeta,
) -> Result<(Value, bool), TransformError> {
    let mut obj = match node {
        Value::Object(obj) => obj,
        other => return Ok((other, false)),
    };
    let mut changed = rewrite_node(&mut obj, path, is_root, meta)?;
    changed |= rewrite_children(&mut obj, path, ChildPositions::STANDARD, &mut |child, child_path| {
        walk(child, child_path, false, meta)
    })?;
    Ok((Value::Object(obj), changed))
}

fn rewrite_node(
    obj: &mut Map<String, Value>,
    path: &str,
    is_root: bool,
    meta: &mut NullTypeMeta,
) -> Result<bool, TransformError> {
    let Some(Value::Array(raw)) = obj.get("type") else {
        return Ok(false);
    };

    if raw.is_empty() {
        return Err(TransformError::invalid_usage(
            feature::NULL_TYPE,
            path,
            "`type` array is empty",
            Some("list at least one JSON-Schema primitive type name"),
        ));
    }

    // every element must be a string naming one of the 7 primitive types
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    let mut offenders: Vec<String> = Vec::new();
    for entry in raw {
        match entry.as_str() {
            Some(s) if is_primitive_type(s) => {
                if !names.iter().any(|n| n == s) {
                    names.push(s.to_string());
                }
            }
            Some(s) => offenders.push(format!("\"{s}\"")),
            None => offenders.push(entry.to_string()),
        }
    }
    if !offenders.is_empty() {
        return Err(TransformError::invalid_usage(
            feature::NULL_TYPE,
            path,
            format!("`type` array contains invalid entries: {}", offenders.join(", ")),
            Some("entries must be JSON-Schema primitive type names"),
        ));
    }

    let has_null = names.iter().any(|n| n == "null");
    let non_null: Vec<&String> = names.iter().filter(|n| n.as_str() != "null").collect();

    match non_null.len() {
        0 => {
            // degenerate ["null"]: collapse to a plain null type, no anyOf
            obj.insert("type".to_string(), Value::from("null"));
            obj.remove("nullable");
        }
        1 => {
            let scalar = non_null[0].clone();
            obj.insert("type".to_string(), Value::from(scalar));
            if has_null {
                obj.insert("nullable".to_string(), Value::Bool(true));
            }
        }
        _ => {
            // 2+ non-null types become a union; null keeps its own arm
            let arms: Vec<Value> = names.iter().map(|t| json!({ "type": t })).collect();
            obj.remove("type");
            obj.remove("nullable");
            match obj.get_mut("anyOf") {
                Some(Value::Array(existing)) => existing.extend(arms),
                _ => {
                    obj.insert("anyOf".to_string(), Value::Array(arms));
                }
            }
        }
    }

    if is_root {
        meta.union_types = Some(names);
    }
    Ok(true)
}

// --------------------------------- Tests ---------------------------------- //
