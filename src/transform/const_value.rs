//! `const` compatibility expansion.
//!
//! Some consumers key off `type`/`enum` rather than `const`, so every
//! `const: <value>` gains an inferred `type` and a single-element `enum`
//! alongside it. Existing `type`/`enum` keys are left alone, which keeps the
//! pass idempotent. `serde_json::Value` can only hold JSON-serializable
//! values, so there is no unsupported-value failure arm here.

use serde_json::{Map, Value};

use crate::error::TransformError;
use crate::node::{rewrite_children, ChildPositions};
use crate::transform::TransformResult;

/// Type name inferred for a const value. Whole numbers count as integers.
pub fn inferred_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else if n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0) {
                "integer"
            } else {
                "number"
            }
        }
    }
}

pub fn transform(node: Value, location: &str) -> Result<TransformResult<()>, TransformError> {
    let (schema, was_transformed) = walk(node, location)?;
    Ok(TransformResult { schema, was_transformed, meta: () })
}

fn walk(node: Value, path: &str) -> Result<(Value, bool), TransformError> {
    let mut obj = match node {
        Value::Object(obj) => obj,
        other => return Ok((other, false)),
    };
    let mut changed = rewrite_node(&mut obj);
    changed |= rewrite_children(&mut obj, path, ChildPositions::STANDARD, &mut walk)?;
    Ok((Value::Object(obj), changed))
}

fn rewrite_node(obj: &mut Map<String, Value>) -> bool {
    let Some(const_value) = obj.get("const").cloned() else {
        return false;
    };
    let mut changed = false;
    if !obj.contains_key("type") {
        obj.insert("type".to_string(), Value::from(inferred_type(&const_value)));
        changed = true;
    }
    if !obj.contains_key("enum") {
        obj.insert("enum".to_string(), Value::Array(vec![const_value]));
        changed = true;
    }
    changed
}

// --------------------------------- Tests ---------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(schema: Value) -> TransformResult<()> {
        transform(schema, "#").unwrap()
    }

    #[test]
    fn const_gains_type_and_enum() {
        let out = run(json!({ "const": "active" }));
        assert!(out.was_transformed);
        assert_eq!(
            out.schema,
            json!({ "const": "active", "type": "string", "enum": ["active"] })
        );
    }

    #[test]
    fn type_inference_table() {
        assert_eq!(inferred_type(&json!(null)), "null");
        assert_eq!(inferred_type(&json!("x")), "string");
        assert_eq!(inferred_type(&json!(true)), "boolean");
        assert_eq!(inferred_type(&json!(5)), "integer");
        assert_eq!(inferred_type(&json!(5.5)), "number");
        assert_eq!(inferred_type(&json!([1, 2])), "array");
        assert_eq!(inferred_type(&json!({ "a": 1 })), "object");
    }

    #[test]
    fn whole_float_counts_as_integer() {
        assert_eq!(inferred_type(&json!(5.0)), "integer");
        assert_eq!(inferred_type(&json!(-3.0)), "integer");
    }

    #[test]
    fn existing_type_and_enum_are_preserved() {
        let out = run(json!({ "const": 1, "type": "number", "enum": [1, 2] }));
        assert!(!out.was_transformed);
        assert_eq!(out.schema, json!({ "const": 1, "type": "number", "enum": [1, 2] }));
    }

    #[test]
    fn recurses_into_nested_positions() {
        let out = run(json!({
            "type": "object",
            "properties": { "kind": { "const": "cat" } },
            "oneOf": [ { "const": 3 } ]
        }));
        assert_eq!(
            out.schema["properties"]["kind"],
            json!({ "const": "cat", "type": "string", "enum": ["cat"] })
        );
        assert_eq!(out.schema["oneOf"][0], json!({ "const": 3, "type": "integer", "enum": [3] }));
    }

    #[test]
    fn idempotent_on_own_output() {
        let once = run(json!({ "properties": { "k": { "const": null } } }));
        let twice = run(once.schema.clone());
        assert!(!twice.was_transformed);
        assert_eq!(twice.schema, once.schema);
    }

    #[test]
    fn nodes_without_const_are_untouched() {
        let out = run(json!({ "type": "string", "enum": ["a", "b"] }));
        assert!(!out.was_transformed);
    }
}
