//! Discriminator resolution and enhancement.
//!
//! Two scenarios:
//! 1. Union discriminator (`discriminator` next to `oneOf`/`anyOf`): resolve
//!    a value→reference mapping, explicitly or by inference, then stamp each
//!    non-`$ref` union member with a `const`-typed discriminator property.
//! 2. Inheritance discriminator (`discriminator` next to `allOf`): ensure
//!    the property exists and is required on the base schema; subtypes are
//!    expected to supply their own literal values.
//!
//! Mapping inference priority per union member: `$ref` final path segment,
//! then a `const`/single-element-`enum` literal on the discriminator
//! property, then `title`. Members matching none are skipped without error.
//!
//! A discriminator object missing `propertyName` is a non-fatal pass-through
//! here; strict checking lives in [`validate_discriminator`].

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::TransformError;
use crate::node::{ensure_required, rebase_pointer, rewrite_children, ChildPositions};
use crate::transform::TransformResult;

/// Metadata key attached to enhanced parents for downstream consumption.
pub const ENHANCED_KEY: &str = "x-discriminator-enhanced";

const VARIANT_DESCRIPTION: &str = "Discriminator value for this variant";

/// One resolved discriminator, for type-generation exhaustiveness checks.
#[derive(Debug, Clone)]
pub struct DiscriminatorInfo {
    pub property_name: String,
    /// Explicit `mapping` from the document, when present.
    pub mapping: Option<IndexMap<String, String>>,
    /// Mapping inferred from union members, when no explicit one exists.
    pub inferred_mapping: Option<IndexMap<String, String>>,
    pub is_nested: bool,
    pub location: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscriminatorMeta {
    pub discriminators: Vec<DiscriminatorInfo>,
}

pub fn transform(node: Value, location: &str) -> Result<TransformResult<DiscriminatorMeta>, TransformError> {
    let mut meta = DiscriminatorMeta::default();
    let (schema, was_transformed) = walk(node, location, false, &mut meta)?;
    Ok(TransformResult { schema, was_transformed, meta })
}

fn walk(
    node: Value,
    path: &str,
    is_nested: bool,
    meta: &mut DiscriminatorMeta,
) -> Result<(Value, bool), TransformError> {
    let mut obj = match node {
        Value::Object(obj) => obj,
        other => return Ok((other, false)),
    };
    let mut changed = rewrite_node(&mut obj, path, is_nested, meta)?;
    changed |= rewrite_children(&mut obj, path, ChildPositions::STANDARD, &mut |child, child_path| {
        walk(child, child_path, true, meta)
    })?;
    Ok((Value::Object(obj), changed))
}

fn rewrite_node(
    obj: &mut Map<String, Value>,
    path: &str,
    is_nested: bool,
    meta: &mut DiscriminatorMeta,
) -> Result<bool, TransformError> {
    let Some(disc_obj) = obj.get("discriminator").and_then(Value::as_object) else {
        return Ok(false);
    };
    // missing/empty propertyName: non-fatal pass-through by policy
    let property_name = match disc_obj.get("propertyName").and_then(Value::as_str) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => return Ok(false),
    };
    if obj.contains_key(ENHANCED_KEY) {
        return Ok(false);
    }

    let explicit = explicit_mapping(disc_obj);

    let union_key = ["oneOf", "anyOf"]
        .into_iter()
        .find(|k| matches!(obj.get(*k), Some(Value::Array(_))));

    if let Some(union_key) = union_key {
        let Some(Value::Array(members)) = obj.get(union_key) else {
            return Ok(false);
        };

        // resolve value→ref mapping and a per-member key assignment
        let (resolved, member_keys, inferred) = match &explicit {
            Some(mapping) => {
                let keys = member_keys_from_mapping(members, &property_name, mapping);
                (mapping.clone(), keys, None)
            }
            None => {
                let (mapping, keys) = infer_mapping(members, &property_name, path);
                (mapping.clone(), keys, Some(mapping))
            }
        };

        // enhance non-$ref members with a literal discriminator property
        if let Some(Value::Array(members)) = obj.get_mut(union_key) {
            for (member, key) in members.iter_mut().zip(&member_keys) {
                let (Some(member_obj), Some(key)) = (member.as_object_mut(), key) else {
                    continue;
                };
                if member_obj.contains_key("$ref") {
                    continue;
                }
                let prop_schema = json!({
                    "type": "string",
                    "const": key,
                    "description": VARIANT_DESCRIPTION
                });
                match member_obj.get_mut("properties") {
                    Some(Value::Object(props)) => {
                        props.insert(property_name.clone(), prop_schema);
                    }
                    _ => {
                        let mut props = Map::new();
                        props.insert(property_name.clone(), prop_schema);
                        member_obj.insert("properties".to_string(), Value::Object(props));
                    }
                }
                ensure_required(member_obj, &property_name);
            }
        }

        obj.insert(
            ENHANCED_KEY.to_string(),
            json!({
                "propertyName": property_name,
                "mapping": mapping_to_value(&resolved),
                "location": path
            }),
        );
        meta.discriminators.push(DiscriminatorInfo {
            property_name,
            mapping: explicit,
            inferred_mapping: inferred,
            is_nested,
            location: path.to_string(),
        });
        return Ok(true);
    }

    if matches!(obj.get("allOf"), Some(Value::Array(_))) {
        // inheritance: the base schema must declare and require the property
        match obj.get_mut("properties") {
            Some(Value::Object(props)) => {
                if !props.contains_key(&property_name) {
                    props.insert(property_name.clone(), json!({ "type": "string" }));
                }
            }
            _ => {
                let mut props = Map::new();
                props.insert(property_name.clone(), json!({ "type": "string" }));
                obj.insert("properties".to_string(), Value::Object(props));
            }
        }
        ensure_required(obj, &property_name);

        obj.insert(
            ENHANCED_KEY.to_string(),
            json!({
                "propertyName": property_name,
                "location": path,
                "isInheritance": true
            }),
        );
        meta.discriminators.push(DiscriminatorInfo {
            property_name,
            mapping: explicit,
            inferred_mapping: None,
            is_nested,
            location: path.to_string(),
        });
        return Ok(true);
    }

    // plain 3.0-style discriminator with no co-located combiner
    Ok(false)
}

// ------------------------------ Mapping logic ----------------------------- //

fn explicit_mapping(disc_obj: &Map<String, Value>) -> Option<IndexMap<String, String>> {
    let mapping = disc_obj.get("mapping")?.as_object()?;
    let mut out = IndexMap::with_capacity(mapping.len());
    for (key, target) in mapping {
        // non-string targets are rejected only by validate_discriminator
        if let Some(target) = target.as_str() {
            out.insert(key.clone(), target.to_string());
        }
    }
    Some(out)
}

/// Infer a mapping per union member, in priority order: $ref segment,
/// discriminator-property literal, title. Unmatched members are skipped.
fn infer_mapping(
    members: &[Value],
    property_name: &str,
    location: &str,
) -> (IndexMap<String, String>, Vec<Option<String>>) {
    let mut mapping = IndexMap::new();
    let mut member_keys = Vec::with_capacity(members.len());
    for (index, member) in members.iter().enumerate() {
        let entry = if let Some(reference) = member.get("$ref").and_then(Value::as_str) {
            let key = reference.rsplit('/').next().unwrap_or(reference);
            Some((key.to_string(), reference.to_string()))
        } else if let Some(literal) = literal_discriminator_value(member, property_name) {
            Some((literal, format!("{location}/unionSchemas/{index}")))
        } else if let Some(title) = member.get("title").and_then(Value::as_str) {
            Some((title.to_string(), format!("{location}/unionSchemas/{index}")))
        } else {
            None
        };
        match entry {
            Some((key, target)) => {
                mapping.insert(key.clone(), target);
                member_keys.push(Some(key));
            }
            None => member_keys.push(None),
        }
    }
    (mapping, member_keys)
}

/// With an explicit mapping, members are matched back to their key by
/// reference, literal, or title; unmatched members are left unenhanced.
fn member_keys_from_mapping(
    members: &[Value],
    property_name: &str,
    mapping: &IndexMap<String, String>,
) -> Vec<Option<String>> {
    members
        .iter()
        .map(|member| {
            if let Some(reference) = member.get("$ref").and_then(Value::as_str) {
                return mapping
                    .iter()
                    .find(|(_, target)| target.as_str() == reference)
                    .map(|(key, _)| key.clone());
            }
            if let Some(literal) = literal_discriminator_value(member, property_name) {
                if mapping.contains_key(&literal) {
                    return Some(literal);
                }
            }
            member
                .get("title")
                .and_then(Value::as_str)
                .filter(|title| mapping.contains_key(*title))
                .map(String::from)
        })
        .collect()
}

/// A string `const` (or single-element string `enum`) on the member's
/// discriminator property.
fn literal_discriminator_value(member: &Value, property_name: &str) -> Option<String> {
    let prop = member.get("properties")?.get(property_name)?;
    if let Some(constant) = prop.get("const") {
        return constant.as_str().map(String::from);
    }
    match prop.get("enum") {
        Some(Value::Array(variants)) if variants.len() == 1 => {
            variants[0].as_str().map(String::from)
        }
        _ => None,
    }
}

/// Move a synthetic `<root>/.../unionSchemas/<i>` target to a new root.
/// `None` for real `$ref` targets (no `unionSchemas` segment under `from`),
/// which name other schemas and must not move with this subtree.
pub fn rebase_union_target(target: &str, from: &str, to: &str) -> Option<String> {
    let rest = target.strip_prefix(from)?;
    if rest.starts_with('/') && rest.contains("/unionSchemas/") {
        Some(format!("{to}{rest}"))
    } else {
        None
    }
}

/// Rewrite the pointers embedded in `x-discriminator-enhanced` blocks after
/// a memoized subtree is reused at a different schema root. Everything else
/// in the tree is location-independent.
pub fn rebase_enhancements(node: &mut Value, from: &str, to: &str) {
    match node {
        Value::Object(obj) => {
            if let Some(Value::Object(enhanced)) = obj.get_mut(ENHANCED_KEY) {
                if let Some(Value::String(location)) = enhanced.get_mut("location") {
                    if let Some(moved) = rebase_pointer(location, from, to) {
                        *location = moved;
                    }
                }
                if let Some(Value::Object(mapping)) = enhanced.get_mut("mapping") {
                    for target in mapping.values_mut() {
                        if let Value::String(target) = target {
                            if let Some(moved) = rebase_union_target(target, from, to) {
                                *target = moved;
                            }
                        }
                    }
                }
            }
            for child in obj.values_mut() {
                rebase_enhancements(child, from, to);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                rebase_enhancements(child, from, to);
            }
        }
        _ => {}
    }
}

fn mapping_to_value(mapping: &IndexMap<String, String>) -> Value {
    let mut out = Map::new();
    for (key, target) in mapping {
        out.insert(key.clone(), Value::from(target.clone()));
    }
    Value::Object(out)
}

// ------------------------------ Strict checks ----------------------------- //

/// Strict validation entry point for callers that want throwing behavior:
/// `propertyName` must be a non-empty string, and every explicit `mapping`
/// value must be a string.
pub fn validate_discriminator(discriminator: &Value, location: &str) -> Result<(), TransformError> {
    let obj = discriminator.as_object().ok_or_else(|| {
        TransformError::discriminator(location, "discriminator must be an object", None)
    })?;

    match obj.get("propertyName") {
        Some(Value::String(name)) if !name.is_empty() => {}
        Some(Value::String(_)) => {
            return Err(TransformError::discriminator(
                location,
                "`propertyName` must not be empty",
                None,
            ));
        }
        _ => {
            return Err(TransformError::discriminator(
                location,
                "discriminator requires a `propertyName` string",
                Some("add `propertyName` naming the tag property"),
            ));
        }
    }

    if let Some(mapping) = obj.get("mapping") {
        let mapping = mapping.as_object().ok_or_else(|| {
            TransformError::discriminator(location, "`mapping` must be an object", None)
        })?;
        for (key, target) in mapping {
            if !target.is_string() {
                return Err(TransformError::discriminator(
                    location,
                    format!("mapping value for `{key}` must be a string, found {target}"),
                    None,
                ));
            }
        }
    }
    Ok(())
}

// --------------------------------- Tests ---------------------------------- //
