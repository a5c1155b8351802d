//! Per-run memoization and pass profiling.
//!
//! Shared sub-schemas ($ref-bundled documents repeat whole subtrees) hit the
//! same pass sequence repeatedly; the cache memoizes the fully-transformed
//! result keyed by structural fingerprint plus the active flag set. Entries
//! are bounded and live for a single pipeline run only — a stale hit across
//! flag sets would silently apply the wrong feature set.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;

use crate::node::structural_fingerprint;
use crate::options::ParseOptions;
use crate::transform::SchemaRecord;

// -------------------------------- Memo table ------------------------------ //

/// One memoized pass-sequence result. `location` is the schema root the
/// entry was produced at; consumers reusing it elsewhere must re-root the
/// pointers embedded in `schema` and `record`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub location: String,
    pub schema: Value,
    pub record: SchemaRecord,
}

#[derive(Debug)]
pub struct TransformCache {
    entries: HashMap<u64, CacheEntry>,
    max_entries: usize,
    flags_fingerprint: u64,
    hits: u64,
    misses: u64,
}

impl TransformCache {
    pub const DEFAULT_MAX_ENTRIES: usize = 512;

    pub fn new(options: &ParseOptions) -> Self {
        Self::with_capacity(options, Self::DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(options: &ParseOptions, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
            flags_fingerprint: options.flag_fingerprint(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cache key for a node under this run's flag set.
    pub fn key(&self, node: &Value) -> u64 {
        structural_fingerprint(node, self.flags_fingerprint)
    }

    pub fn get(&mut self, key: u64) -> Option<CacheEntry> {
        match self.entries.get(&key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert unless the table is at capacity (simple bound, no eviction —
    /// the table dies with the run anyway).
    pub fn insert(&mut self, key: u64, entry: CacheEntry) {
        if self.entries.len() < self.max_entries {
            self.entries.insert(key, entry);
        }
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

// -------------------------------- Profiler -------------------------------- //

/// Accumulated wall-clock per pass across one pipeline run.
#[derive(Debug, Default)]
pub struct Profiler {
    totals: IndexMap<&'static str, Duration>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pass: &'static str, elapsed: Duration) {
        *self.totals.entry(pass).or_default() += elapsed;
    }

    pub fn report(&self) -> ProfileReport {
        ProfileReport {
            passes: self.totals.iter().map(|(name, d)| (*name, *d)).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileReport {
    /// (pass name, accumulated duration), in pass-execution order.
    pub passes: Vec<(&'static str, Duration)>,
}

impl std::fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, duration) in &self.passes {
            writeln!(f, "{name}: {duration:?}")?;
        }
        Ok(())
    }
}

// --------------------------------- Tests ---------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(location: &str, schema: Value) -> CacheEntry {
        CacheEntry {
            location: location.to_string(),
            schema,
            record: SchemaRecord::default(),
        }
    }

    #[test]
    fn hit_after_insert_miss_before() {
        let mut cache = TransformCache::new(&ParseOptions::default());
        let node = json!({ "type": ["string", "null"] });
        let key = cache.key(&node);
        assert!(cache.get(key).is_none());
        cache.insert(key, entry("#/components/schemas/A", json!({ "type": "string", "nullable": true })));
        let hit = cache.get(key).unwrap();
        assert_eq!(hit.schema, json!({ "type": "string", "nullable": true }));
        assert_eq!(hit.location, "#/components/schemas/A");
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn different_flag_sets_produce_different_keys() {
        let node = json!({ "type": ["string", "null"] });
        let a = TransformCache::new(&ParseOptions::default());
        let b = TransformCache::new(&ParseOptions::all_disabled());
        assert_ne!(a.key(&node), b.key(&node));
    }

    #[test]
    fn capacity_bound_is_enforced() {
        let mut cache = TransformCache::with_capacity(&ParseOptions::default(), 1);
        let first = json!({ "a": 1 });
        let second = json!({ "b": 2 });
        let (k1, k2) = (cache.key(&first), cache.key(&second));
        cache.insert(k1, entry("#/a", first));
        cache.insert(k2, entry("#/b", second));
        assert!(cache.get(k1).is_some());
        assert!(cache.get(k2).is_none());
    }

    #[test]
    fn profiler_accumulates_per_pass() {
        let mut profiler = Profiler::new();
        profiler.record("nullable-type-arrays", Duration::from_micros(50));
        profiler.record("nullable-type-arrays", Duration::from_micros(25));
        profiler.record("const-keyword", Duration::from_micros(10));
        let report = profiler.report();
        assert_eq!(report.passes.len(), 2);
        assert_eq!(report.passes[0], ("nullable-type-arrays", Duration::from_micros(75)));
    }
}
