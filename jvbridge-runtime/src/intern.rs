//! Symbol interning
//!
//! Symbols are process-wide: every `:name` literal and every `Symbol("name")`
//! call resolves to the same shared string, so symbol comparison is a
//! pointer check in the common case.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

/// Global symbol table
static SYMBOLS: Lazy<SymbolTable> = Lazy::new(SymbolTable::new);

struct SymbolTable {
    names: DashMap<Box<str>, Arc<str>>,
}

impl SymbolTable {
    fn new() -> Self {
        let table = Self {
            names: DashMap::with_capacity(256),
        };

        // Names every program touches
        for name in ["Main", "Base", "Core", "x", "y", "a", "b"] {
            table.intern(name);
        }

        table
    }

    fn intern(&self, name: &str) -> Arc<str> {
        if let Some(existing) = self.names.get(name) {
            return Arc::clone(existing.value());
        }
        self.names
            .entry(name.into())
            .or_insert_with(|| Arc::from(name))
            .value()
            .clone()
    }
}

/// Interned symbol
#[derive(Clone, Eq)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(SYMBOLS.intern(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of distinct symbols interned so far
pub fn symbol_count() -> usize {
    SYMBOLS.names.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interned_symbols_share_storage() {
        let a = Symbol::new("interned_probe");
        let b = Symbol::new("interned_probe");
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_symbol_count_grows() {
        let before = symbol_count();
        Symbol::new("a_fresh_symbol_for_counting");
        assert!(symbol_count() > before);
    }
}
