//! Transformation orchestrator.
//!
//! Runs the enabled per-keyword passes over every schema root of a document
//! in a fixed order, threading the rewritten tree from one pass to the next:
//!
//! null-type → const → prefixItems → conditional → discriminator →
//! unevaluatedProperties → contains
//!
//! Order matters: null-type normalization must precede const and
//! discriminator inference (both inspect `type`), and unevaluated
//! reconciliation runs after prefixItems so the tuple tail is already
//! pinned down.
//!
//! On a pass error, `fallbackToOpenAPI30` discards the 3.1 shape for the
//! whole document and returns the input untouched — an all-or-nothing
//! fallback at the document level, never per node.

pub mod conditional;
pub mod const_value;
pub mod contains;
pub mod discriminator;
pub mod null_type;
pub mod prefix_items;
pub mod unevaluated;

use std::time::Instant;

use indexmap::IndexMap;
use serde_json::Value;

use crate::cache::{CacheEntry, ProfileReport, Profiler, TransformCache};
use crate::error::{
    feature, feature_keywords, ErrorCollector, ErrorContext, RecoveryAction, RecoveryPlan,
    TransformError,
};
use crate::node::{build_path, rebase_pointer};
use crate::options::ParseOptions;
use crate::version::{self, OpenApiVersionInfo};

use contains::ContainsPattern;
use discriminator::DiscriminatorInfo;
use unevaluated::UnevaluatedConflict;

// ------------------------------ Pass results ------------------------------ //

/// Result of one pass over one subtree. `was_transformed == false` implies
/// `schema` is structurally equal to the input.
#[derive(Debug, Clone)]
pub struct TransformResult<M> {
    pub schema: Value,
    pub was_transformed: bool,
    pub meta: M,
}

/// The fixed pass order (feature tags double as pass names).
pub const PASS_ORDER: &[&str] = &[
    feature::NULL_TYPE,
    feature::CONST,
    feature::PREFIX_ITEMS,
    feature::CONDITIONAL,
    feature::DISCRIMINATOR,
    feature::UNEVALUATED,
    feature::CONTAINS,
];

/// Aggregated per-pass metadata for one document run.
#[derive(Debug, Default)]
pub struct PipelineMetadata {
    /// Resolved root type sets, keyed by schema-root pointer.
    pub union_types: IndexMap<String, Vec<String>>,
    pub discriminators: Vec<DiscriminatorInfo>,
    pub contains_patterns: Vec<ContainsPattern>,
    pub unevaluated_conflicts: Vec<UnevaluatedConflict>,
}

impl PipelineMetadata {
    fn absorb(&mut self, record: SchemaRecord, location: &str) {
        if let Some(types) = record.union_types {
            self.union_types.insert(location.to_string(), types);
        }
        self.discriminators.extend(record.discriminators);
        self.contains_patterns.extend(record.contains_patterns);
        self.unevaluated_conflicts.extend(record.unevaluated_conflicts);
    }
}

/// Metadata recorded while running the pass sequence over one schema root.
/// Cached alongside the transformed tree so a memo hit replays it instead of
/// dropping it.
#[derive(Debug, Clone, Default)]
pub struct SchemaRecord {
    pub union_types: Option<Vec<String>>,
    pub discriminators: Vec<DiscriminatorInfo>,
    pub contains_patterns: Vec<ContainsPattern>,
    pub unevaluated_conflicts: Vec<UnevaluatedConflict>,
}

impl SchemaRecord {
    /// Re-root recorded locations from one schema root to another. Synthetic
    /// `unionSchemas` targets move with the subtree; real `$ref` targets
    /// name other schemas and stay put.
    fn rebased(mut self, from: &str, to: &str) -> Self {
        for info in &mut self.discriminators {
            if let Some(moved) = rebase_pointer(&info.location, from, to) {
                info.location = moved;
            }
            if let Some(mapping) = &mut info.inferred_mapping {
                for target in mapping.values_mut() {
                    if let Some(moved) = discriminator::rebase_union_target(target, from, to) {
                        *target = moved;
                    }
                }
            }
        }
        for pattern in &mut self.contains_patterns {
            if let Some(moved) = rebase_pointer(&pattern.location, from, to) {
                pattern.location = moved;
            }
        }
        for conflict in &mut self.unevaluated_conflicts {
            if let Some(moved) = rebase_pointer(&conflict.location, from, to) {
                conflict.location = moved;
            }
        }
        self
    }
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub document: Value,
    pub version: OpenApiVersionInfo,
    /// True when a pass error was swallowed by the document-level fallback.
    pub fell_back_to_30: bool,
    pub passes_applied: Vec<&'static str>,
    pub metadata: PipelineMetadata,
    /// Errors recovered (skipped or substituted) instead of raised.
    pub recovered_errors: Vec<TransformError>,
    pub profile: Option<ProfileReport>,
}

// -------------------------------- Pipeline -------------------------------- //

#[derive(Debug)]
pub struct Pipeline {
    options: ParseOptions,
    recovery: RecoveryPlan,
    collect_all_errors: bool,
    max_errors: usize,
    cache: Option<TransformCache>,
    profiler: Option<Profiler>,
}

impl Pipeline {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            recovery: RecoveryPlan::failing(),
            collect_all_errors: false,
            max_errors: ErrorCollector::DEFAULT_MAX,
            cache: None,
            profiler: None,
        }
    }

    /// Override the default all-FAIL recovery plan.
    pub fn with_recovery(mut self, plan: RecoveryPlan) -> Self {
        self.recovery = plan;
        self
    }

    /// Batch recovered errors up to `max_errors` instead of aborting on the
    /// first one. Only meaningful together with a non-FAIL recovery plan.
    pub fn collect_all_errors(mut self, max_errors: usize) -> Self {
        self.collect_all_errors = true;
        self.max_errors = max_errors;
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = Some(TransformCache::new(&self.options));
        self
    }

    pub fn with_profiling(mut self) -> Self {
        self.profiler = Some(Profiler::new());
        self
    }

    /// Run the pipeline over one document.
    ///
    /// 3.0 documents are returned untouched: the 3.1 passes are never
    /// invoked for them, so enabling or disabling flags cannot change the
    /// output.
    pub fn run(&mut self, document: Value) -> Result<PipelineOutcome, TransformError> {
        let info = version::detect(&document)?;
        version::validate_support(&info)?;

        if info.is_version30 || !self.options.any_transform_enabled() {
            return Ok(PipelineOutcome {
                document,
                version: info,
                fell_back_to_30: false,
                passes_applied: Vec::new(),
                metadata: PipelineMetadata::default(),
                recovered_errors: Vec::new(),
                profile: self.profiler.as_ref().map(Profiler::report),
            });
        }

        let original = self.options.fallback_to_openapi30.then(|| document.clone());
        let mut collector = ErrorCollector::new(self.collect_all_errors, self.max_errors);
        let mut metadata = PipelineMetadata::default();

        match self.apply(document, &info, &mut metadata, &mut collector) {
            Ok(document) => Ok(PipelineOutcome {
                document,
                version: info,
                fell_back_to_30: false,
                passes_applied: self.enabled_passes(),
                metadata,
                recovered_errors: collector.into_errors(),
                profile: self.profiler.as_ref().map(Profiler::report),
            }),
            Err(error) => match original {
                // discard the 3.1 shape for the whole document
                Some(document) => Ok(PipelineOutcome {
                    document,
                    version: info,
                    fell_back_to_30: true,
                    passes_applied: Vec::new(),
                    metadata: PipelineMetadata::default(),
                    recovered_errors: vec![error],
                    profile: self.profiler.as_ref().map(Profiler::report),
                }),
                None => Err(error),
            },
        }
    }

    fn enabled_passes(&self) -> Vec<&'static str> {
        let o = &self.options;
        let gates = [
            (feature::NULL_TYPE, o.nullable_type_arrays),
            (feature::CONST, o.const_keyword),
            (feature::PREFIX_ITEMS, o.prefix_items),
            (feature::CONDITIONAL, o.conditional_schemas),
            (feature::DISCRIMINATOR, o.discriminator_enhancement),
            (feature::UNEVALUATED, o.unevaluated_properties),
            (feature::CONTAINS, o.contains_arrays),
        ];
        gates.iter().filter(|(_, on)| *on).map(|(name, _)| *name).collect()
    }

    // ------------------------- Document traversal ------------------------- //

    fn apply(
        &mut self,
        mut document: Value,
        info: &OpenApiVersionInfo,
        metadata: &mut PipelineMetadata,
        collector: &mut ErrorCollector,
    ) -> Result<Value, TransformError> {
        let Some(root) = document.as_object_mut() else {
            return Ok(document);
        };

        // named schema roots
        if let Some(Value::Object(components)) = root.get_mut("components") {
            if let Some(Value::Object(schemas)) = components.get_mut("schemas") {
                for (name, slot) in schemas.iter_mut() {
                    let location = build_path("#", &["components", "schemas", name]);
                    let node = std::mem::take(slot);
                    *slot = self.run_passes(node, &location, info, metadata, collector)?;
                }
            }
        }

        // inline schemas under path operations
        if let Some(slot) = root.get_mut("paths") {
            let node = std::mem::take(slot);
            *slot = self.walk_operations(node, "#/paths", info, metadata, collector)?;
        }

        // webhook operations are a 3.1 surface, gated separately
        if self.options.webhooks {
            if let Some(slot) = root.get_mut("webhooks") {
                if !slot.is_object() {
                    return Err(TransformError::WebhookProcessing {
                        location: "#/webhooks".to_string(),
                        message: "`webhooks` must be an object of path items".to_string(),
                    });
                }
                let node = std::mem::take(slot);
                *slot = self.walk_operations(node, "#/webhooks", info, metadata, collector)?;
            }
        }

        Ok(document)
    }

    /// Descend through path-item/operation structure, running the pipeline
    /// on every object-valued `schema` position (request bodies, responses,
    /// parameters) without descending into the schemas themselves twice.
    fn walk_operations(
        &mut self,
        node: Value,
        path: &str,
        info: &OpenApiVersionInfo,
        metadata: &mut PipelineMetadata,
        collector: &mut ErrorCollector,
    ) -> Result<Value, TransformError> {
        match node {
            Value::Object(mut obj) => {
                for (key, slot) in obj.iter_mut() {
                    let child_path = build_path(path, &[key]);
                    let taken = std::mem::take(slot);
                    *slot = if key == "schema" && taken.is_object() {
                        self.run_passes(taken, &child_path, info, metadata, collector)?
                    } else {
                        self.walk_operations(taken, &child_path, info, metadata, collector)?
                    };
                }
                Ok(Value::Object(obj))
            }
            Value::Array(mut items) => {
                for (i, slot) in items.iter_mut().enumerate() {
                    let child_path = build_path(path, &[&i.to_string()]);
                    let taken = std::mem::take(slot);
                    *slot = self.walk_operations(taken, &child_path, info, metadata, collector)?;
                }
                Ok(Value::Array(items))
            }
            other => Ok(other),
        }
    }

    // ----------------------------- Pass loop ------------------------------ //

    fn run_passes(
        &mut self,
        node: Value,
        location: &str,
        info: &OpenApiVersionInfo,
        metadata: &mut PipelineMetadata,
        collector: &mut ErrorCollector,
    ) -> Result<Value, TransformError> {
        let cache_key = self.cache.as_ref().map(|c| c.key(&node));
        if let (Some(cache), Some(key)) = (self.cache.as_mut(), cache_key) {
            if let Some(entry) = cache.get(key) {
                // the memoized output carries its original root's pointers;
                // move them to this root before emitting
                let mut schema = entry.schema;
                discriminator::rebase_enhancements(&mut schema, &entry.location, location);
                metadata.absorb(entry.record.rebased(&entry.location, location), location);
                return Ok(schema);
            }
        }

        let mut record = SchemaRecord::default();
        let mut recovered = false;
        let mut current = node;
        for pass in self.enabled_passes() {
            // a non-FAIL strategy needs the input back after a failed pass
            let keep = match self.recovery.strategy_for(pass) {
                crate::error::RecoveryStrategy::Fail => None,
                _ => Some(current.clone()),
            };

            let started = Instant::now();
            let result = dispatch(pass, current, location, &mut record);
            if let Some(profiler) = self.profiler.as_mut() {
                profiler.record(pass, started.elapsed());
            }

            current = match result {
                Ok(next) => next,
                Err(error) => {
                    let error = error.with_context(ErrorContext {
                        schema_path: location.to_string(),
                        version: info.clone(),
                        processing_step: Some(pass.to_string()),
                        context: None,
                    });
                    match (self.recovery.action_for(&error), keep) {
                        (RecoveryAction::Rethrow, _) | (_, None) => return Err(error),
                        (action, Some(mut original)) => {
                            apply_recovery(&mut original, &error, &action, location);
                            collector.record(error)?;
                            recovered = true;
                            original
                        }
                    }
                }
            };
        }

        // a recovered tree depends on this run's error report; memoizing it
        // would suppress that report on the next hit
        if !recovered {
            if let (Some(cache), Some(key)) = (self.cache.as_mut(), cache_key) {
                cache.insert(
                    key,
                    CacheEntry {
                        location: location.to_string(),
                        schema: current.clone(),
                        record: record.clone(),
                    },
                );
            }
        }
        metadata.absorb(record, location);
        Ok(current)
    }
}

/// Run one named pass and fold its metadata into the per-schema record.
fn dispatch(
    pass: &'static str,
    node: Value,
    location: &str,
    record: &mut SchemaRecord,
) -> Result<Value, TransformError> {
    match pass {
        feature::NULL_TYPE => {
            let result = null_type::transform(node, location)?;
            if let Some(types) = result.meta.union_types {
                record.union_types = Some(types);
            }
            Ok(result.schema)
        }
        feature::CONST => Ok(const_value::transform(node, location)?.schema),
        feature::PREFIX_ITEMS => Ok(prefix_items::transform(node, location)?.schema),
        feature::CONDITIONAL => Ok(conditional::transform(node, location)?.schema),
        feature::DISCRIMINATOR => {
            let result = discriminator::transform(node, location)?;
            record.discriminators.extend(result.meta.discriminators);
            Ok(result.schema)
        }
        feature::UNEVALUATED => {
            let result = unevaluated::transform(node, location)?;
            record.unevaluated_conflicts.extend(result.meta.conflicts);
            Ok(result.schema)
        }
        feature::CONTAINS => {
            let result = contains::transform(node, location)?;
            record.contains_patterns.extend(result.meta.patterns);
            Ok(result.schema)
        }
        other => Err(TransformError::unsupported(
            feature::VERSION,
            location,
            format!("unknown pass `{other}`"),
            None,
        )),
    }
}

/// Strip the failed feature's keywords at the error location and, for
/// substitution strategies, merge the replacement keys in.
///
/// Error locations sometimes point at a keyword value rather than its owning
/// schema node, so resolution walks up to the nearest object ancestor.
fn apply_recovery(node: &mut Value, error: &TransformError, action: &RecoveryAction, root_location: &str) {
    let mut relative = error
        .location()
        .strip_prefix(root_location)
        .unwrap_or("")
        .to_string();
    loop {
        if let Some(target) = node.pointer_mut(&relative).and_then(Value::as_object_mut) {
            for keyword in feature_keywords(error.feature()) {
                target.remove(*keyword);
            }
            if let RecoveryAction::Merge(Value::Object(extra)) = action {
                for (key, value) in extra {
                    target.insert(key.clone(), value.clone());
                }
            }
            return;
        }
        match relative.rfind('/') {
            Some(idx) => relative.truncate(idx),
            None => return,
        }
    }
}

/// Convenience wrapper: defaults-only pipeline over one document.
pub fn normalize_document(document: Value, options: &ParseOptions) -> Result<PipelineOutcome, TransformError> {
    Pipeline::new(*options).run(document)
}

// --------------------------------- Tests ---------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecoveryStrategy;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(document: Value) -> PipelineOutcome {
        normalize_document(document, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn end_to_end_nullable_string_property() {
        let out = run(json!({
            "openapi": "3.1.0",
            "components": { "schemas": {
                "User": {
                    "type": "object",
                    "properties": { "name": { "type": ["string", "null"] } },
                    "required": ["name"]
                }
            } }
        }));
        assert_eq!(
            out.document["components"]["schemas"]["User"]["properties"]["name"],
            json!({ "type": "string", "nullable": true })
        );
        assert_eq!(out.passes_applied.len(), 7);
        assert!(!out.fell_back_to_30);
    }

    #[test]
    fn end_to_end_discriminator_inference_and_enhancement() {
        let out = run(json!({
            "openapi": "3.1.0",
            "components": { "schemas": {
                "Pet": {
                    "discriminator": { "propertyName": "petType" },
                    "oneOf": [
                        { "$ref": "#/components/schemas/Cat" },
                        { "$ref": "#/components/schemas/Dog" }
                    ]
                },
                "Cat": { "type": "object", "title": "Cat" },
                "Dog": { "type": "object", "title": "Dog" }
            } }
        }));
        let pet = &out.document["components"]["schemas"]["Pet"];
        assert_eq!(
            pet["x-discriminator-enhanced"]["mapping"],
            json!({
                "Cat": "#/components/schemas/Cat",
                "Dog": "#/components/schemas/Dog"
            })
        );
        assert_eq!(out.metadata.discriminators.len(), 1);
        assert_eq!(out.metadata.discriminators[0].location, "#/components/schemas/Pet");
    }

    #[test]
    fn version_30_documents_pass_through_regardless_of_flags() {
        let document = json!({
            "openapi": "3.0.3",
            "components": { "schemas": {
                "Thing": { "type": "object", "properties": { "n": { "type": "string", "nullable": true } } }
            } }
        });
        let with_flags = normalize_document(document.clone(), &ParseOptions::default()).unwrap();
        let without = normalize_document(document.clone(), &ParseOptions::all_disabled()).unwrap();
        assert_eq!(with_flags.document, without.document);
        assert_eq!(with_flags.document, document);
        assert!(with_flags.passes_applied.is_empty());
    }

    #[test]
    fn unsupported_versions_abort_before_any_transform() {
        let err = normalize_document(
            json!({ "openapi": "4.0.0", "components": { "schemas": { "A": { "type": [] } } } }),
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.feature(), feature::VERSION);
    }

    #[test]
    fn fallback_returns_original_document_on_pass_error() {
        let document = json!({
            "openapi": "3.1.0",
            "components": { "schemas": {
                "Broken": { "type": [] }
            } }
        });

        // without fallback the error propagates
        let err = normalize_document(document.clone(), &ParseOptions::default()).unwrap_err();
        assert_eq!(err.feature(), feature::NULL_TYPE);

        // with fallback the untouched document comes back
        let mut options = ParseOptions::default();
        options.fallback_to_openapi30 = true;
        let out = normalize_document(document.clone(), &options).unwrap();
        assert!(out.fell_back_to_30);
        assert_eq!(out.document, document);
        assert_eq!(out.recovered_errors.len(), 1);
    }

    #[test]
    fn pass_errors_carry_context_and_step() {
        let err = normalize_document(
            json!({
                "openapi": "3.1.0",
                "components": { "schemas": {
                    "T": { "properties": { "bad": { "prefixItems": [] } } }
                } }
            }),
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.feature(), feature::PREFIX_ITEMS);
        assert_eq!(err.location(), "#/components/schemas/T/properties/bad");
        assert!(err.to_string().contains("step prefixItems"), "{err}");
    }

    #[test]
    fn ordering_null_type_feeds_discriminator_literals() {
        // the member literal sits behind a type array; inference only sees a
        // usable `const` because null-type and const ran first
        let out = run(json!({
            "openapi": "3.1.0",
            "components": { "schemas": {
                "Shape": {
                    "discriminator": { "propertyName": "kind" },
                    "oneOf": [
                        { "properties": { "kind": { "const": "circle" }, "r": { "type": ["number", "null"] } } }
                    ]
                }
            } }
        }));
        let shape = &out.document["components"]["schemas"]["Shape"];
        assert_eq!(
            shape["x-discriminator-enhanced"]["mapping"],
            json!({ "circle": "#/components/schemas/Shape/unionSchemas/0" })
        );
        // nested nullable member field got normalized before enhancement
        assert_eq!(
            shape["oneOf"][0]["properties"]["r"],
            json!({ "type": "number", "nullable": true })
        );
    }

    #[test]
    fn ordering_unevaluated_runs_after_prefix_items() {
        let out = run(json!({
            "openapi": "3.1.0",
            "components": { "schemas": {
                "Tuple": {
                    "type": "array",
                    "prefixItems": [ { "type": "string" } ],
                    "unevaluatedItems": true
                }
            } }
        }));
        let tuple = &out.document["components"]["schemas"]["Tuple"];
        // prefixItems closed the tail first; unevaluatedItems then overrode
        // the additionalItems mirror but left `items` governing the tuple
        assert_eq!(tuple["items"], json!(false));
        assert_eq!(tuple["additionalItems"], json!(true));
    }

    #[test]
    fn disabled_passes_do_not_run() {
        let mut options = ParseOptions::default();
        options.nullable_type_arrays = false;
        let out = normalize_document(
            json!({
                "openapi": "3.1.0",
                "components": { "schemas": { "A": { "type": ["string", "null"] } } }
            }),
            &options,
        )
        .unwrap();
        assert_eq!(out.document["components"]["schemas"]["A"], json!({ "type": ["string", "null"] }));
        assert!(!out.passes_applied.contains(&feature::NULL_TYPE));
    }

    #[test]
    fn paths_schemas_are_normalized_in_place() {
        let out = run(json!({
            "openapi": "3.1.0",
            "paths": {
                "/users": {
                    "post": {
                        "requestBody": { "content": { "application/json": {
                            "schema": { "type": "object", "properties": { "id": { "type": ["integer", "null"] } } }
                        } } },
                        "responses": { "200": { "content": { "application/json": {
                            "schema": { "type": ["string", "null"] }
                        } } } }
                    }
                }
            }
        }));
        let body = &out.document["paths"]["/users"]["post"]["requestBody"]["content"]["application/json"]["schema"];
        assert_eq!(body["properties"]["id"], json!({ "type": "integer", "nullable": true }));
        let resp = &out.document["paths"]["/users"]["post"]["responses"]["200"]["content"]["application/json"]["schema"];
        assert_eq!(resp, &json!({ "type": "string", "nullable": true }));
    }

    #[test]
    fn webhooks_are_gated_by_their_flag() {
        let document = json!({
            "openapi": "3.1.0",
            "webhooks": { "newPet": { "post": { "requestBody": { "content": { "application/json": {
                "schema": { "type": ["object", "null"] }
            } } } } } }
        });
        let off = run(document.clone());
        assert_eq!(
            off.document["webhooks"]["newPet"]["post"]["requestBody"]["content"]["application/json"]["schema"],
            json!({ "type": ["object", "null"] })
        );

        let mut options = ParseOptions::default();
        options.webhooks = true;
        let on = normalize_document(document, &options).unwrap();
        assert_eq!(
            on.document["webhooks"]["newPet"]["post"]["requestBody"]["content"]["application/json"]["schema"],
            json!({ "type": "object", "nullable": true })
        );
    }

    #[test]
    fn non_object_webhooks_section_fails_when_enabled() {
        let mut options = ParseOptions::default();
        options.webhooks = true;
        let err = normalize_document(
            json!({ "openapi": "3.1.0", "webhooks": ["not", "an", "object"] }),
            &options,
        )
        .unwrap_err();
        assert_eq!(err.feature(), feature::WEBHOOKS);
    }

    #[test]
    fn skip_recovery_drops_the_offending_construct_and_continues() {
        let plan = RecoveryPlan::failing().set(feature::CONTAINS, RecoveryStrategy::Skip);
        let mut pipeline = Pipeline::new(ParseOptions::default())
            .with_recovery(plan)
            .collect_all_errors(8);
        let out = pipeline
            .run(json!({
                "openapi": "3.1.0",
                "components": { "schemas": {
                    "Bad": { "type": "array", "contains": {}, "minContains": 5, "maxContains": 1 },
                    "Good": { "type": ["string", "null"] }
                } }
            }))
            .unwrap();
        let bad = &out.document["components"]["schemas"]["Bad"];
        assert!(bad.get("contains").is_none());
        assert!(bad.get("minContains").is_none());
        assert_eq!(out.recovered_errors.len(), 1);
        // other schemas still normalized
        assert_eq!(
            out.document["components"]["schemas"]["Good"],
            json!({ "type": "string", "nullable": true })
        );
    }

    #[test]
    fn fallback_recovery_merges_safe_default() {
        let plan = RecoveryPlan::failing().set(feature::UNEVALUATED, RecoveryStrategy::Fallback);
        let mut pipeline = Pipeline::new(ParseOptions::default())
            .with_recovery(plan)
            .collect_all_errors(8);
        let out = pipeline
            .run(json!({
                "openapi": "3.1.0",
                "components": { "schemas": {
                    "Loose": { "type": "object", "unevaluatedProperties": "nope" }
                } }
            }))
            .unwrap();
        let loose = &out.document["components"]["schemas"]["Loose"];
        assert!(loose.get("unevaluatedProperties").is_none());
        assert_eq!(loose["additionalProperties"], json!(true));
    }

    #[test]
    fn downgrade_recovery_substitutes_30_compatible_shape() {
        let plan = RecoveryPlan::failing().set(feature::NULL_TYPE, RecoveryStrategy::Downgrade);
        let mut pipeline = Pipeline::new(ParseOptions::default())
            .with_recovery(plan)
            .collect_all_errors(8);
        let out = pipeline
            .run(json!({
                "openapi": "3.1.0",
                "components": { "schemas": {
                    "Legacy": { "type": ["string", 7], "minLength": 2 }
                } }
            }))
            .unwrap();
        let legacy = &out.document["components"]["schemas"]["Legacy"];
        // the unusable type array is replaced with the 3.0 equivalent
        assert!(legacy.get("type").is_none());
        assert_eq!(legacy["nullable"], json!(true));
        assert_eq!(legacy["minLength"], json!(2));
        assert_eq!(out.recovered_errors.len(), 1);
        assert_eq!(out.recovered_errors[0].feature(), feature::NULL_TYPE);
    }

    #[test]
    fn cache_reuses_results_for_identical_subschemas() {
        let shared = json!({ "type": ["string", "null"] });
        let mut pipeline = Pipeline::new(ParseOptions::default()).with_cache();
        let out = pipeline
            .run(json!({
                "openapi": "3.1.0",
                "components": { "schemas": { "A": shared.clone(), "B": shared.clone(), "C": shared } }
            }))
            .unwrap();
        for name in ["A", "B", "C"] {
            assert_eq!(
                out.document["components"]["schemas"][name],
                json!({ "type": "string", "nullable": true })
            );
            // per-schema metadata is replayed on hits, not dropped
            let location = format!("#/components/schemas/{name}");
            assert_eq!(
                out.metadata.union_types.get(&location).unwrap(),
                &vec!["string".to_string(), "null".into()]
            );
        }
        let (hits, _) = pipeline.cache.as_ref().unwrap().stats();
        assert_eq!(hits, 2);
    }

    #[test]
    fn cache_hits_rebase_discriminator_output_to_the_new_root() {
        let shape = json!({
            "discriminator": { "propertyName": "kind" },
            "oneOf": [ { "title": "Dog" } ]
        });
        let document = json!({
            "openapi": "3.1.0",
            "components": { "schemas": { "A": shape.clone(), "B": shape } }
        });

        let mut cached = Pipeline::new(ParseOptions::default()).with_cache();
        let out = cached.run(document.clone()).unwrap();
        let (hits, _) = cached.cache.as_ref().unwrap().stats();
        assert_eq!(hits, 1);

        // the reused subtree carries B's pointers, not A's
        let b = &out.document["components"]["schemas"]["B"];
        assert_eq!(b["x-discriminator-enhanced"]["location"], json!("#/components/schemas/B"));
        assert_eq!(
            b["x-discriminator-enhanced"]["mapping"],
            json!({ "Dog": "#/components/schemas/B/unionSchemas/0" })
        );

        // metadata matches an uncached run, with locations per schema root
        let plain = normalize_document(document, &ParseOptions::default()).unwrap();
        assert_eq!(out.document, plain.document);
        assert_eq!(out.metadata.discriminators.len(), plain.metadata.discriminators.len());
        assert_eq!(out.metadata.discriminators[1].location, "#/components/schemas/B");
        assert_eq!(
            out.metadata.discriminators[1]
                .inferred_mapping
                .as_ref()
                .unwrap()
                .get("Dog")
                .unwrap(),
            "#/components/schemas/B/unionSchemas/0"
        );
    }

    #[test]
    fn profiler_reports_enabled_passes() {
        let mut pipeline = Pipeline::new(ParseOptions::default()).with_profiling();
        let out = pipeline
            .run(json!({
                "openapi": "3.1.0",
                "components": { "schemas": { "A": { "type": "string" } } }
            }))
            .unwrap();
        let profile = out.profile.unwrap();
        assert_eq!(profile.passes.len(), 7);
        assert_eq!(profile.passes[0].0, feature::NULL_TYPE);
    }

    #[test]
    fn union_types_metadata_is_keyed_by_schema_root() {
        let out = run(json!({
            "openapi": "3.1.0",
            "components": { "schemas": {
                "Mix": { "type": ["string", "integer", "null"] }
            } }
        }));
        assert_eq!(
            out.metadata.union_types.get("#/components/schemas/Mix").unwrap(),
            &vec!["string".to_string(), "integer".into(), "null".into()]
        );
    }
}
