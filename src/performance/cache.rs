//! Evaluator Cache
//!
//! Content-addressed cache of compiled foreign source with LRU eviction.
//! A key is the exact sequence of source fragments; text-identical keys
//! share one entry, anything else is compiled afresh. Compilation runs in
//! the runtime's global scope, so definitions in a key persist after it.

use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

use jvbridge_runtime::Engine;
use lru::LruCache;

use crate::core::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::infrastructure::logging::{log_evaluator_eviction, log_evaluator_hit, log_evaluator_miss};
use crate::interop::{dispatch, to_foreign, to_host};

/// Source fragments forming one unit of compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalKey {
    Single(String),
    /// Statements evaluated together; the last one gives the result
    Fragments(Vec<String>),
}

impl EvalKey {
    /// Validate a host key: a string, or a non-empty sequence of strings
    pub fn from_host(key: &HostValue) -> BridgeResult<Self> {
        let invalid = || BridgeError::invalid_key(format!("{key} ({})", key.type_name()));
        match key {
            HostValue::Text(source) => Ok(EvalKey::Single(source.clone())),
            HostValue::Tuple(parts) | HostValue::List(parts) if !parts.is_empty() => parts
                .iter()
                .map(|part| part.as_text().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(EvalKey::Fragments)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    pub fn fragments(&self) -> &[String] {
        match self {
            EvalKey::Single(source) => std::slice::from_ref(source),
            EvalKey::Fragments(parts) => parts,
        }
    }

    /// Digest over the length-prefixed fragments
    pub fn digest(&self) -> CacheKey {
        let mut hasher = blake3::Hasher::new();
        for fragment in self.fragments() {
            hasher.update(&(fragment.len() as u64).to_le_bytes());
            hasher.update(fragment.as_bytes());
        }
        CacheKey(*hasher.finalize().as_bytes())
    }
}

impl From<&str> for EvalKey {
    fn from(source: &str) -> Self {
        EvalKey::Single(source.to_string())
    }
}

impl From<String> for EvalKey {
    fn from(source: String) -> Self {
        EvalKey::Single(source)
    }
}

impl From<Vec<String>> for EvalKey {
    fn from(parts: Vec<String>) -> Self {
        EvalKey::Fragments(parts)
    }
}

impl From<&[&str]> for EvalKey {
    fn from(parts: &[&str]) -> Self {
        EvalKey::Fragments(parts.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EvalKey {
    fn from(parts: [&str; N]) -> Self {
        EvalKey::from(&parts[..])
    }
}

/// Content hash of a key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex form for logs
    pub fn short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.short())
    }
}

/// Host-level shape of a cached payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeHint {
    Native,
    Handle,
    Callable,
}

impl ShapeHint {
    fn of(payload: &HostValue) -> Self {
        match payload {
            HostValue::Handle(handle) if handle.is_callable() => ShapeHint::Callable,
            HostValue::Handle(_) => ShapeHint::Handle,
            _ => ShapeHint::Native,
        }
    }
}

/// Cached result of one key
#[derive(Debug)]
pub struct CacheEntry {
    pub fragments: Vec<String>,
    pub payload: HostValue,
    pub shape: ShapeHint,
}

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    /// Misses whose compile or run failed
    pub failures: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Subscript-style entry point: `evaluator.get(key)` compiles on a miss
/// and returns the converted result
pub struct Evaluator {
    engine: Rc<Engine>,
    entries: RefCell<LruCache<CacheKey, Rc<CacheEntry>>>,
    stats: RefCell<CacheStats>,
}

impl Evaluator {
    pub fn new(engine: &Rc<Engine>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            engine: Rc::clone(engine),
            entries: RefCell::new(LruCache::new(capacity)),
            stats: RefCell::new(CacheStats::default()),
        }
    }

    pub fn get(&self, key: impl Into<EvalKey>) -> BridgeResult<HostValue> {
        Ok(self.lookup(&key.into())?.payload.clone())
    }

    /// Like `get`, with the key shape checked first
    pub fn get_host(&self, key: &HostValue) -> BridgeResult<HostValue> {
        self.get(EvalKey::from_host(key)?)
    }

    /// Call the cached payload with host arguments
    pub fn call(
        &self,
        key: impl Into<EvalKey>,
        args: &[HostValue],
        kwargs: &[(String, HostValue)],
    ) -> BridgeResult<HostValue> {
        let entry = self.lookup(&key.into())?;
        let callable = to_foreign(&self.engine, &entry.payload)?;
        dispatch::invoke(&self.engine, &callable, args, kwargs)
    }

    /// Cached entry for a key, if present; does not compile
    pub fn entry(&self, key: impl Into<EvalKey>) -> Option<Rc<CacheEntry>> {
        let key = key.into();
        self.entries
            .borrow()
            .peek(&key.digest())
            .filter(|entry| entry.fragments == key.fragments())
            .cloned()
    }

    pub fn contains(&self, key: impl Into<EvalKey>) -> bool {
        self.entry(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.borrow().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.borrow()
    }

    /// Drop every entry; definitions already made in the runtime remain
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    fn lookup(&self, key: &EvalKey) -> BridgeResult<Rc<CacheEntry>> {
        let digest = key.digest();
        if let Some(entry) = self.entries.borrow_mut().get(&digest) {
            if entry.fragments == key.fragments() {
                self.stats.borrow_mut().hits += 1;
                log_evaluator_hit(&digest.short());
                return Ok(Rc::clone(entry));
            }
        }

        self.stats.borrow_mut().misses += 1;
        let entry = match self.compile(key) {
            Ok(entry) => Rc::new(entry),
            Err(err) => {
                self.stats.borrow_mut().failures += 1;
                return Err(err);
            }
        };
        log_evaluator_miss(&digest.short(), key.fragments().len());

        let evicted = self.entries.borrow_mut().push(digest, Rc::clone(&entry));
        if let Some((old, _)) = evicted {
            if old != digest {
                self.stats.borrow_mut().evictions += 1;
                log_evaluator_eviction(&old.short());
            }
        }
        Ok(entry)
    }

    fn compile(&self, key: &EvalKey) -> BridgeResult<CacheEntry> {
        let program = self
            .engine
            .compile(key.fragments())
            .map_err(|err| BridgeError::evaluation(&err))?;
        let value = self
            .engine
            .run(&program)
            .map_err(|err| BridgeError::evaluation(&err))?;
        let payload = to_host(&self.engine, &value);
        Ok(CacheEntry {
            fragments: key.fragments().to_vec(),
            shape: ShapeHint::of(&payload),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(capacity: usize) -> Evaluator {
        Evaluator::new(&Rc::new(Engine::new()), capacity)
    }

    #[test]
    fn test_keys_from_host_values() {
        assert_eq!(
            EvalKey::from_host(&HostValue::text("1 + 1")).unwrap(),
            EvalKey::Single("1 + 1".to_string())
        );
        let parts = HostValue::Tuple(vec!["a = 1".into(), "a".into()]);
        assert_eq!(EvalKey::from_host(&parts).unwrap().fragments().len(), 2);

        for bad in [
            HostValue::from(42),
            HostValue::Tuple(vec![1.into(), 2.into()]),
            HostValue::Tuple(vec!["a".into(), 2.into()]),
            HostValue::List(vec![]),
            HostValue::Unit,
        ] {
            let err = EvalKey::from_host(&bad).unwrap_err();
            assert_eq!(err.kind(), "InvalidKeyError", "{bad}");
        }
    }

    #[test]
    fn test_digest_separates_fragments() {
        let joined = EvalKey::from(["ab", "c"]).digest();
        let split = EvalKey::from(["a", "bc"]).digest();
        assert_ne!(joined, split);
        assert_eq!(EvalKey::from("x").digest(), EvalKey::from(["x"]).digest());
    }

    #[test]
    fn test_hits_reuse_the_compiled_entry() {
        let evaluator = evaluator(8);
        let first = evaluator.get(["counter = 0", "counter += 1"]).unwrap();
        let second = evaluator.get(["counter = 0", "counter += 1"]).unwrap();
        assert_eq!(first, HostValue::from(1));
        assert_eq!(second, HostValue::from(1));
        assert_eq!(evaluator.get("counter").unwrap(), HostValue::from(1));

        let stats = evaluator.stats();
        assert_eq!((stats.hits, stats.misses), (1, 2));
        assert_eq!(stats.hit_rate(), 1.0 / 3.0);
    }

    #[test]
    fn test_failed_miss_leaves_other_entries() {
        let evaluator = evaluator(8);
        evaluator.get("x = 10").unwrap();
        let err = evaluator.get("error(\"boom\")").unwrap_err();
        assert_eq!(err, BridgeError::Evaluation {
            kind: "ErrorException".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(evaluator.get("f(").unwrap_err().kind(), "EvaluationError");
        assert!(evaluator.contains("x = 10"));
        assert_eq!(evaluator.len(), 1);
        assert_eq!(evaluator.stats().failures, 2);
    }

    #[test]
    fn test_callable_payloads() {
        let evaluator = evaluator(8);
        evaluator.get("square(x) = x * x").unwrap();
        let entry = evaluator.entry("square(x) = x * x").unwrap();
        assert_eq!(entry.shape, ShapeHint::Callable);
        let nine = evaluator.call("square(x) = x * x", &[3.into()], &[]).unwrap();
        assert_eq!(nine, HostValue::from(9));

        let err = evaluator.call("1", &[], &[]).unwrap_err();
        assert_eq!(err.kind(), "DispatchError");
    }

    #[test]
    fn test_lru_eviction() {
        let evaluator = evaluator(2);
        evaluator.get("1").unwrap();
        evaluator.get("2").unwrap();
        evaluator.get("1").unwrap();
        evaluator.get("3").unwrap();
        assert!(evaluator.contains("1"));
        assert!(!evaluator.contains("2"));
        assert_eq!(evaluator.stats().evictions, 1);
        assert_eq!(evaluator.capacity(), 2);

        evaluator.clear();
        assert!(evaluator.is_empty());
    }
}
