//! Typed error taxonomy for the 3.1 normalization pipeline, plus the
//! recovery-strategy dispatcher and the batching error collector.
//!
//! Every error carries the originating feature name and a JSON-pointer
//! location so callers can branch on either. Transformers raise these
//! synchronously; what an orchestrating caller does with a caught error is
//! governed by a [`RecoveryPlan`] (SKIP / FALLBACK / DOWNGRADE / FAIL).

use indexmap::IndexMap;
use serde_json::{json, Value};
use thiserror::Error;

use crate::version::OpenApiVersionInfo;

// ------------------------------ Feature tags ------------------------------ //

/// Canonical feature names, used both as error tags and as pass names.
pub mod feature {
    pub const NULL_TYPE: &str = "nullable-type-arrays";
    pub const CONST: &str = "const-keyword";
    pub const PREFIX_ITEMS: &str = "prefixItems";
    pub const CONDITIONAL: &str = "conditional-schemas";
    pub const DISCRIMINATOR: &str = "discriminator";
    pub const UNEVALUATED: &str = "unevaluatedProperties";
    pub const CONTAINS: &str = "contains";
    pub const WEBHOOKS: &str = "webhooks";
    pub const VERSION: &str = "openapi-version";
    pub const OPTIONS: &str = "parse-options";
}

// ------------------------------- Taxonomy --------------------------------- //

#[derive(Debug, Error)]
pub enum TransformError {
    /// The construct is recognized but deliberately not implemented.
    #[error("unsupported feature `{feature}` at {location}: {message}")]
    UnsupportedFeature {
        feature: &'static str,
        location: String,
        message: String,
        suggestion: Option<String>,
    },

    /// The construct is used in a structurally invalid way.
    #[error("invalid use of `{feature}` at {location}: {message}")]
    InvalidFeatureUsage {
        feature: &'static str,
        location: String,
        message: String,
        suggestion: Option<String>,
    },

    /// A pass failed partway through rewriting; wraps an optional cause.
    #[error("`{feature}` transformation failed at {location}: {message}")]
    SchemaTransformation {
        feature: &'static str,
        location: String,
        message: String,
        #[source]
        cause: Option<Box<TransformError>>,
    },

    /// A 3.1-only feature (or an unparseable/unsupported version field)
    /// encountered where it cannot be honored.
    #[error("version compatibility at {location}: {message}")]
    VersionCompatibility {
        feature: &'static str,
        location: String,
        message: String,
        suggestion: Option<String>,
    },

    #[error("discriminator error at {location}: {message}")]
    Discriminator {
        location: String,
        message: String,
        suggestion: Option<String>,
    },

    #[error("conditional schema error at {location}: {message}")]
    ConditionalSchema { location: String, message: String },

    #[error("webhook processing error at {location}: {message}")]
    WebhookProcessing { location: String, message: String },

    /// Wraps any of the above with pipeline diagnostics. Never affects
    /// control flow; `feature()`/`location()` delegate to the source.
    #[error("{context}")]
    Contextual {
        context: ErrorContext,
        #[source]
        source: Box<TransformError>,
    },
}

impl TransformError {
    pub fn invalid_usage(
        feature: &'static str,
        location: &str,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) -> Self {
        Self::InvalidFeatureUsage {
            feature,
            location: location.to_string(),
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    pub fn unsupported(
        feature: &'static str,
        location: &str,
        message: impl Into<String>,
        suggestion: Option<&str>,
    ) -> Self {
        Self::UnsupportedFeature {
            feature,
            location: location.to_string(),
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    pub fn discriminator(location: &str, message: impl Into<String>, suggestion: Option<&str>) -> Self {
        Self::Discriminator {
            location: location.to_string(),
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    pub fn conditional(location: &str, message: impl Into<String>) -> Self {
        Self::ConditionalSchema { location: location.to_string(), message: message.into() }
    }

    pub fn version(location: &str, message: impl Into<String>, suggestion: Option<&str>) -> Self {
        Self::VersionCompatibility {
            feature: feature::VERSION,
            location: location.to_string(),
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    /// Originating feature tag, seen through any contextual wrapper.
    pub fn feature(&self) -> &'static str {
        match self {
            Self::UnsupportedFeature { feature, .. }
            | Self::InvalidFeatureUsage { feature, .. }
            | Self::SchemaTransformation { feature, .. }
            | Self::VersionCompatibility { feature, .. } => feature,
            Self::Discriminator { .. } => feature::DISCRIMINATOR,
            Self::ConditionalSchema { .. } => feature::CONDITIONAL,
            Self::WebhookProcessing { .. } => feature::WEBHOOKS,
            Self::Contextual { source, .. } => source.feature(),
        }
    }

    /// JSON pointer of the offending node, seen through any wrapper.
    pub fn location(&self) -> &str {
        match self {
            Self::UnsupportedFeature { location, .. }
            | Self::InvalidFeatureUsage { location, .. }
            | Self::SchemaTransformation { location, .. }
            | Self::VersionCompatibility { location, .. }
            | Self::Discriminator { location, .. }
            | Self::ConditionalSchema { location, .. }
            | Self::WebhookProcessing { location, .. } => location,
            Self::Contextual { source, .. } => source.location(),
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::UnsupportedFeature { suggestion, .. }
            | Self::InvalidFeatureUsage { suggestion, .. }
            | Self::VersionCompatibility { suggestion, .. }
            | Self::Discriminator { suggestion, .. } => suggestion.as_deref(),
            Self::Contextual { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// Wrap with pipeline diagnostics (idempotent on the inner error).
    pub fn with_context(self, context: ErrorContext) -> Self {
        Self::Contextual { context, source: Box::new(self) }
    }
}

// ----------------------------- Error context ------------------------------ //

/// Diagnostic envelope attached by the orchestrator. Carries where in the
/// document and at which processing step an error surfaced.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub schema_path: String,
    pub version: OpenApiVersionInfo,
    pub processing_step: Option<String>,
    pub context: Option<serde_json::Map<String, Value>>,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "at {} (openapi {}", self.schema_path, self.version.version)?;
        if let Some(step) = &self.processing_step {
            write!(f, ", step {step}")?;
        }
        write!(f, ")")
    }
}

// --------------------------- Recovery dispatch ---------------------------- //

/// What an orchestrating caller does with a caught transform error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryStrategy {
    /// Drop the feature's effect and continue.
    Skip,
    /// Substitute a feature-specific safe default value.
    Fallback,
    /// Substitute an OpenAPI-3.0-compatible equivalent.
    Downgrade,
    /// Re-throw.
    #[default]
    Fail,
}

/// Concrete action resolved from a strategy for one error.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    Rethrow,
    /// Remove the feature's keywords at the error location.
    Strip,
    /// Remove the feature's keywords, then merge these keys in.
    Merge(Value),
}

/// Per-feature strategy table with a default, keyed by feature tag.
#[derive(Debug, Clone, Default)]
pub struct RecoveryPlan {
    pub default: RecoveryStrategy,
    pub per_feature: IndexMap<String, RecoveryStrategy>,
}

impl RecoveryPlan {
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_default(default: RecoveryStrategy) -> Self {
        Self { default, per_feature: IndexMap::new() }
    }

    pub fn set(mut self, feature: &str, strategy: RecoveryStrategy) -> Self {
        self.per_feature.insert(feature.to_string(), strategy);
        self
    }

    pub fn strategy_for(&self, feature: &str) -> RecoveryStrategy {
        self.per_feature.get(feature).copied().unwrap_or(self.default)
    }

    pub fn action_for(&self, error: &TransformError) -> RecoveryAction {
        let feature = error.feature();
        match self.strategy_for(feature) {
            RecoveryStrategy::Fail => RecoveryAction::Rethrow,
            RecoveryStrategy::Skip => RecoveryAction::Strip,
            RecoveryStrategy::Fallback => RecoveryAction::Merge(fallback_value(feature)),
            RecoveryStrategy::Downgrade => RecoveryAction::Merge(downgrade_value(feature)),
        }
    }
}

/// Keywords each feature owns on a node; stripped before any merge so a
/// recovered node does not keep the construct that failed.
pub fn feature_keywords(feature: &str) -> &'static [&'static str] {
    match feature {
        feature::NULL_TYPE => &["type", "nullable"],
        feature::CONST => &["const"],
        feature::PREFIX_ITEMS => &["prefixItems"],
        feature::CONDITIONAL => &["if", "then", "else"],
        feature::DISCRIMINATOR => &["discriminator"],
        feature::UNEVALUATED => &["unevaluatedProperties", "unevaluatedItems"],
        feature::CONTAINS => &["contains", "minContains", "maxContains"],
        _ => &[],
    }
}

/// Safe default substituted under FALLBACK.
pub fn fallback_value(feature: &str) -> Value {
    match feature {
        feature::UNEVALUATED => json!({ "additionalProperties": true }),
        feature::PREFIX_ITEMS => json!({ "type": "array", "items": true }),
        feature::CONTAINS => json!({ "type": "array" }),
        feature::CONST | feature::NULL_TYPE => json!({}),
        _ => json!({}),
    }
}

/// OpenAPI-3.0-compatible equivalent substituted under DOWNGRADE.
pub fn downgrade_value(feature: &str) -> Value {
    match feature {
        feature::NULL_TYPE => json!({ "nullable": true }),
        feature::PREFIX_ITEMS => json!({ "type": "array" }),
        feature::UNEVALUATED => json!({ "additionalProperties": true }),
        feature::CONTAINS => json!({ "type": "array" }),
        _ => json!({}),
    }
}

// ----------------------------- Error collector ---------------------------- //

/// Batches errors up to a cap instead of aborting on the first one.
/// With `collect_all` off, `record` re-raises immediately.
#[derive(Debug)]
pub struct ErrorCollector {
    collect_all: bool,
    max_errors: usize,
    errors: Vec<TransformError>,
}

impl ErrorCollector {
    pub const DEFAULT_MAX: usize = 64;

    pub fn new(collect_all: bool, max_errors: usize) -> Self {
        Self { collect_all, max_errors, errors: Vec::new() }
    }

    /// Record an error. Returns it back as `Err` when collection is off or
    /// the cap is reached, so the caller aborts.
    pub fn record(&mut self, error: TransformError) -> Result<(), TransformError> {
        if !self.collect_all || self.errors.len() >= self.max_errors {
            return Err(error);
        }
        self.errors.push(error);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[TransformError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<TransformError> {
        self.errors
    }
}

// --------------------------------- Tests ---------------------------------- //
