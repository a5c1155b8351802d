//! Version detection for raw OpenAPI documents.
//!
//! All downstream behavior branches on this single classification, so it
//! happens exactly once, first, and is a hard gate: unsupported major
//! versions abort before any transform runs instead of being coerced.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::TransformError;

/// `major.minor[.patch][-prerelease]`
static VERSION_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?(?:-([0-9A-Za-z][0-9A-Za-z.\-]*))?$")
        .expect("version regex is valid")
});

/// Immutable once parsed from the `openapi` field. For supported versions
/// exactly one of `is_version30`/`is_version31` is true; both are false for
/// anything else (e.g. a hypothetical 3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenApiVersionInfo {
    pub version: String,
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
    pub is_version30: bool,
    pub is_version31: bool,
}

/// Classify a raw document by its `openapi` field.
///
/// Fails when the field is missing, non-string, or not of the form
/// `major.minor[.patch][-prerelease]`.
pub fn detect(document: &Value) -> Result<OpenApiVersionInfo, TransformError> {
    let field = document.get("openapi").ok_or_else(|| {
        TransformError::version(
            "#/openapi",
            "document has no `openapi` field",
            Some("add `openapi: \"3.1.0\"` (or \"3.0.x\") at the document root"),
        )
    })?;

    let raw = field.as_str().ok_or_else(|| {
        TransformError::version(
            "#/openapi",
            format!("`openapi` must be a string, found {}", kind_name(field)),
            Some("quote the version, e.g. `openapi: \"3.1.0\"`"),
        )
    })?;

    let caps = VERSION_RX.captures(raw).ok_or_else(|| {
        TransformError::version(
            "#/openapi",
            format!("`{raw}` is not a `major.minor[.patch]` version"),
            None,
        )
    })?;

    // the regex guarantees these are digit runs; overflow is the only
    // remaining failure mode
    let parse = |idx: usize| -> Result<u32, TransformError> {
        caps.get(idx)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .parse::<u32>()
            .map_err(|_| {
                TransformError::version("#/openapi", format!("version component out of range in `{raw}`"), None)
            })
    };
    let major = parse(1)?;
    let minor = parse(2)?;
    let patch = match caps.get(3) {
        Some(_) => Some(parse(3)?),
        None => None,
    };

    Ok(OpenApiVersionInfo {
        version: raw.to_string(),
        major,
        minor,
        patch,
        is_version30: major == 3 && minor == 0,
        is_version31: major == 3 && minor == 1,
    })
}

/// Hard support gate: major must be 3 and minor 0 or 1.
pub fn validate_support(info: &OpenApiVersionInfo) -> Result<(), TransformError> {
    if info.is_version30 || info.is_version31 {
        return Ok(());
    }
    Err(TransformError::version(
        "#/openapi",
        format!("OpenAPI {} is not supported", info.version),
        Some("only 3.0.x and 3.1.x documents are accepted"),
    ))
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// --------------------------------- Tests ---------------------------------- //
