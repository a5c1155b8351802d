//! `contains`/`minContains`/`maxContains` validation and collection.
//!
//! The validator engine supports these keywords natively, so the tree is
//! left untouched; this pass validates usage and collects a
//! [`ContainsPattern`] per occurrence for diagnostics and type-generation
//! hints. `was_transformed` is therefore always false.

use serde_json::{Map, Value};

use crate::error::{feature, TransformError};
use crate::node::{build_path, rewrite_children, scalar_type, ChildPositions};
use crate::transform::TransformResult;

/// One `contains` occurrence. When both bounds are present,
/// `min_contains <= max_contains` holds (violations fail validation).
#[derive(Debug, Clone)]
pub struct ContainsPattern {
    pub schema: Value,
    pub min_contains: Option<u64>,
    pub max_contains: Option<u64>,
    pub location: String,
}

#[derive(Debug, Clone, Default)]
pub struct ContainsMeta {
    pub patterns: Vec<ContainsPattern>,
}

pub fn transform(node: Value, location: &str) -> Result<TransformResult<ContainsMeta>, TransformError> {
    let mut meta = ContainsMeta::default();
    let (schema, was_transformed) = walk(node, location, &mut meta)?;
    Ok(TransformResult { schema, was_transformed, meta })
}

fn walk(node: Value, path: &str, meta: &mut ContainsMeta) -> Result<(Value, bool), TransformError> {
    let mut obj = match node {
        Value::Object(obj) => obj,
        other => return Ok((other, false)),
    };
    collect_node(&obj, path, meta)?;
    let changed = rewrite_children(&mut obj, path, ChildPositions::ALL, &mut |child, child_path| {
        walk(child, child_path, meta)
    })?;
    Ok((Value::Object(obj), changed))
}

fn collect_node(obj: &Map<String, Value>, path: &str, meta: &mut ContainsMeta) -> Result<(), TransformError> {
    let Some(contains) = obj.get("contains") else {
        // stray bounds without `contains` carry no meaning; leave them for
        // the validator engine to ignore
        return Ok(());
    };

    if scalar_type(obj) != Some("array") {
        return Err(TransformError::invalid_usage(
            feature::CONTAINS,
            path,
            "`contains` requires `type: \"array\"`",
            Some("add `type: \"array\"` to the containing schema"),
        ));
    }

    if !contains.is_object() {
        return Err(TransformError::invalid_usage(
            feature::CONTAINS,
            path,
            "`contains` must be a schema object",
            None,
        ));
    }

    let min_contains = read_bound(obj, "minContains", path)?;
    let max_contains = read_bound(obj, "maxContains", path)?;
    if let (Some(min), Some(max)) = (min_contains, max_contains) {
        if min > max {
            return Err(TransformError::invalid_usage(
                feature::CONTAINS,
                path,
                format!("minContains ({min}) exceeds maxContains ({max})"),
                Some("swap or correct the bounds"),
            ));
        }
    }

    meta.patterns.push(ContainsPattern {
        schema: contains.clone(),
        min_contains,
        max_contains,
        location: build_path(path, &["contains"]),
    });
    Ok(())
}

fn read_bound(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<u64>, TransformError> {
    match obj.get(key) {
        None => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            TransformError::invalid_usage(
                feature::CONTAINS,
                path,
                format!("`{key}` must be a non-negative integer, found {value}"),
                None,
            )
        }),
    }
}

// --------------------------------- Tests ---------------------------------- //
