//! Feature-flag record gating each transformer, plus the resolver that
//! validates user-supplied flags and fills in defaults.
//!
//! Constructed once per generation run, immutable afterwards, passed by
//! reference into the orchestrator and each pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{feature, TransformError};

/// One boolean per transformer plus `webhooks` and `fallbackToOpenAPI30`.
///
/// Defaults: webhooks off, fallback off, every transform on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ParseOptions {
    pub nullable_type_arrays: bool,
    pub const_keyword: bool,
    pub prefix_items: bool,
    pub conditional_schemas: bool,
    pub discriminator_enhancement: bool,
    pub unevaluated_properties: bool,
    pub contains_arrays: bool,
    pub webhooks: bool,
    #[serde(rename = "fallbackToOpenAPI30")]
    pub fallback_to_openapi30: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            nullable_type_arrays: true,
            const_keyword: true,
            prefix_items: true,
            conditional_schemas: true,
            discriminator_enhancement: true,
            unevaluated_properties: true,
            contains_arrays: true,
            webhooks: false,
            fallback_to_openapi30: false,
        }
    }
}

impl ParseOptions {
    /// Every transform gated off (webhooks and fallback too).
    pub fn all_disabled() -> Self {
        Self {
            nullable_type_arrays: false,
            const_keyword: false,
            prefix_items: false,
            conditional_schemas: false,
            discriminator_enhancement: false,
            unevaluated_properties: false,
            contains_arrays: false,
            webhooks: false,
            fallback_to_openapi30: false,
        }
    }

    /// True when at least one per-keyword transform would run.
    pub fn any_transform_enabled(&self) -> bool {
        self.nullable_type_arrays
            || self.const_keyword
            || self.prefix_items
            || self.conditional_schemas
            || self.discriminator_enhancement
            || self.unevaluated_properties
            || self.contains_arrays
    }

    /// Stable fingerprint of the transform-relevant flags, for cache keys.
    /// Entries must never be shared across runs with different flags.
    pub fn flag_fingerprint(&self) -> u64 {
        let bits = [
            self.nullable_type_arrays,
            self.const_keyword,
            self.prefix_items,
            self.conditional_schemas,
            self.discriminator_enhancement,
            self.unevaluated_properties,
            self.contains_arrays,
        ];
        bits.iter().fold(0u64, |acc, &b| (acc << 1) | u64::from(b))
    }
}

/// Resolve a partial user-supplied flag object over the defaults.
///
/// Unknown keys and non-boolean values are rejected (`parse-options` feature
/// tag) rather than silently ignored.
pub fn resolve(user: Option<Value>) -> Result<ParseOptions, TransformError> {
    match user {
        None => Ok(ParseOptions::default()),
        Some(value) => {
            if !value.is_object() {
                return Err(TransformError::invalid_usage(
                    feature::OPTIONS,
                    "#",
                    "options must be an object of booleans",
                    None,
                ));
            }
            serde_json::from_value(value).map_err(|err| {
                TransformError::invalid_usage(
                    feature::OPTIONS,
                    "#",
                    format!("invalid options record: {err}"),
                    Some("allowed keys are the nine documented camelCase flags, all boolean"),
                )
            })
        }
    }
}

// --------------------------------- Tests ---------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_enable_everything_but_webhooks_and_fallback() {
        let opts = ParseOptions::default();
        assert!(opts.nullable_type_arrays && opts.const_keyword && opts.prefix_items);
        assert!(opts.conditional_schemas && opts.discriminator_enhancement);
        assert!(opts.unevaluated_properties && opts.contains_arrays);
        assert!(!opts.webhooks);
        assert!(!opts.fallback_to_openapi30);
    }

    #[test]
    fn resolve_none_yields_defaults() {
        assert_eq!(resolve(None).unwrap(), ParseOptions::default());
    }

    #[test]
    fn resolve_partial_record_over_defaults() {
        let opts = resolve(Some(json!({
            "webhooks": true,
            "containsArrays": false,
            "fallbackToOpenAPI30": true
        })))
        .unwrap();
        assert!(opts.webhooks);
        assert!(!opts.contains_arrays);
        assert!(opts.fallback_to_openapi30);
        // untouched flags keep their defaults
        assert!(opts.nullable_type_arrays);
    }

    #[test]
    fn resolve_rejects_unknown_keys() {
        let err = resolve(Some(json!({ "nullableTypeArays": true }))).unwrap_err();
        assert_eq!(err.feature(), feature::OPTIONS);
    }

    #[test]
    fn resolve_rejects_non_boolean_values() {
        assert!(resolve(Some(json!({ "webhooks": "yes" }))).is_err());
        assert!(resolve(Some(json!("webhooks"))).is_err());
    }

    #[test]
    fn flag_fingerprint_tracks_transform_flags_only() {
        let a = ParseOptions::default();
        let mut b = a;
        b.webhooks = true; // not part of the fingerprint
        assert_eq!(a.flag_fingerprint(), b.flag_fingerprint());
        b.contains_arrays = false;
        assert_ne!(a.flag_fingerprint(), b.flag_fingerprint());
    }
}
