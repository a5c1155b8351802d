//! `prefixItems` (tuple) normalization.
//!
//! Validates tuple usage and pins down the tail policy so the type generator
//! sees an explicit open/closed decision:
//! - `items: true` → open tail
//! - `items: false` or absent → closed tuple (`items: false` is written out)
//! - `items: <schema>` → homogeneous tail, kept as-is
//!
//! Legacy `additionalItems` supplies the tail when `items` is absent.

use serde_json::{Map, Value};

use crate::error::{feature, TransformError};
use crate::node::{rewrite_children, scalar_type, ChildPositions};
use crate::transform::TransformResult;

pub fn transform(node: Value, location: &str) -> Result<TransformResult<()>, TransformError> {
    let (schema, was_transformed) = walk(node, location)?;
    Ok(TransformResult { schema, was_transformed, meta: () })
}

fn walk(node: Value, path: &str) -> Result<(Value, bool), TransformError> {
    let mut obj = match node {
        Value::Object(obj) => obj,
        other => return Ok((other, false)),
    };
    let mut changed = rewrite_node(&mut obj, path)?;
    let positions = ChildPositions { prefix_items: true, conditionals: false };
    changed |= rewrite_children(&mut obj, path, positions, &mut walk)?;
    Ok((Value::Object(obj), changed))
}

fn rewrite_node(obj: &mut Map<String, Value>, path: &str) -> Result<bool, TransformError> {
    let Some(prefix) = obj.get("prefixItems") else {
        return Ok(false);
    };

    if scalar_type(obj) != Some("array") {
        return Err(TransformError::invalid_usage(
            feature::PREFIX_ITEMS,
            path,
            "`prefixItems` requires `type: \"array\"`",
            Some("add `type: \"array\"` to the tuple schema"),
        ));
    }

    let elems = prefix.as_array().ok_or_else(|| {
        TransformError::invalid_usage(
            feature::PREFIX_ITEMS,
            path,
            "`prefixItems` must be an array of schemas",
            None,
        )
    })?;
    for (i, elem) in elems.iter().enumerate() {
        if !elem.is_object() {
            return Err(TransformError::invalid_usage(
                feature::PREFIX_ITEMS,
                path,
                format!("`prefixItems[{i}]` is not a schema object"),
                None,
            ));
        }
    }

    // tail policy: items wins, legacy additionalItems fills in, absent → closed
    match obj.get("items") {
        Some(Value::Bool(_)) | Some(Value::Object(_)) => Ok(false),
        Some(Value::Array(_)) => Err(TransformError::invalid_usage(
            feature::PREFIX_ITEMS,
            path,
            "array-form `items` cannot coexist with `prefixItems`",
            Some("move positional schemas into `prefixItems` and keep `items` for the tail"),
        )),
        Some(_) => Err(TransformError::invalid_usage(
            feature::PREFIX_ITEMS,
            path,
            "`items` must be a boolean or a schema object",
            None,
        )),
        None => {
            let tail = match obj.get("additionalItems") {
                Some(v @ Value::Bool(_)) | Some(v @ Value::Object(_)) => v.clone(),
                _ => Value::Bool(false),
            };
            obj.insert("items".to_string(), tail);
            Ok(true)
        }
    }
}

// --------------------------------- Tests ---------------------------------- //
