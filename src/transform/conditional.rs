//! `if`/`then`/`else` validation.
//!
//! The keywords pass through untouched for the validator engine to interpret
//! natively; this pass only checks structure and descends. Nesting depth is
//! unbounded: a conditional inside a `then` branch is as valid as one at the
//! root.
//!
//! Because nothing is rewritten, `was_transformed` is always false here.

use serde_json::{Map, Value};

use crate::error::TransformError;
use crate::node::{rewrite_children, ChildPositions};
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
    validate_node(&obj, path)?;
    let positions = ChildPositions { prefix_items: false, conditionals: true };
    let changed = rewrite_children(&mut obj, path, positions, &mut walk)?;
    Ok((Value::Object(obj), changed))
}

fn validate_node(obj: &Map<String, Value>, path: &str) -> Result<(), TransformError> {
    let has_if = obj.contains_key("if");

    if has_if && !obj.contains_key("then") && !obj.contains_key("else") {
        return Err(TransformError::conditional(path, "`if` requires `then` or `else`"));
    }

    // `then`/`else` without `if` are legal JSON Schema (ignored keywords),
    // so only object-valuedness is enforced when the keyword is present.
    for key in ["if", "then", "else"] {
        if let Some(value) = obj.get(key) {
            if !value.is_object() {
                return Err(TransformError::conditional(
                    path,
                    format!("`{key}` must be an object-valued schema"),
                ));
            }
        }
    }
    Ok(())
}

// --------------------------------- Tests ---------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn valid_conditional_passes_through_unchanged() {
        let input = json!({
            "if": { "properties": { "kind": { "const": "a" } } },
            "then": { "required": ["payload"] },
            "else": { "required": ["fallback"] }
        });
        let out = transform(input.clone(), "#").unwrap();
        assert!(!out.was_transformed);
        assert_eq!(out.schema, input);
    }

    #[test]
    fn if_without_then_or_else_fails() {
        let err = transform(json!({ "if": { "type": "object" } }), "#").unwrap_err();
        assert!(err.to_string().contains("requires `then` or `else`"), "{err}");
    }

    #[test]
    fn if_with_only_else_is_fine() {
        assert!(transform(
            json!({ "if": { "type": "object" }, "else": { "type": "string" } }),
            "#"
        )
        .is_ok());
    }

    #[test]
    fn non_object_branches_fail() {
        assert!(transform(json!({ "if": true, "then": {} }), "#").is_err());
        assert!(transform(json!({ "if": {}, "then": "yes" }), "#").is_err());
        assert!(transform(json!({ "if": {}, "then": {}, "else": 4 }), "#").is_err());
    }

    #[test]
    fn then_without_if_passes_through() {
        let input = json!({ "then": { "required": ["a"] } });
        assert!(!transform(input, "#").unwrap().was_transformed);
    }

    #[test]
    fn deep_nesting_is_supported() {
        let mut inner = json!({ "if": { "type": "string" }, "then": { "minLength": 1 } });
        for _ in 0..32 {
            inner = json!({ "if": { "type": "object" }, "then": inner });
        }
        assert!(transform(inner, "#").is_ok());
    }

    #[test]
    fn validation_errors_surface_from_nested_branches() {
        let err = transform(
            json!({
                "if": { "type": "object" },
                "then": {
                    "properties": {
                        "bad": { "if": { "type": "string" } }
                    }
                }
            }),
            "#",
        )
        .unwrap_err();
        assert_eq!(err.location(), "#/then/properties/bad");
    }
}
