//! Document loading: JSON or YAML by extension, with path context in
//! JSON parse errors.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

/// Pick a format from the file extension. Anything that is not `.yaml` or
/// `.yml` is treated as JSON.
pub fn format_for_path(path: &Path) -> DocumentFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => DocumentFormat::Yaml,
        _ => DocumentFormat::Json,
    }
}

/// Deserialize JSON with JSON-path context in error messages.
pub fn from_json_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}

pub fn parse_document(source: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => from_json_str_with_path(source).map_err(|msg| anyhow!(msg)),
        DocumentFormat::Yaml => serde_yaml::from_str(source).context("invalid YAML document"),
    }
}

pub fn load_document(path: &Path) -> Result<Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_document(&source, format_for_path(path))
        .with_context(|| format!("failed to parse {}", path.display()))
}

// --------------------------------- Tests ---------------------------------- //
