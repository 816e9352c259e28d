//! Symbol interning.
//!
//! Attribute names and identifiers are interned once per session and
//! compared by identity afterwards. Symbols are handed out in interning
//! order and never renumbered, so two guarantees hold for the lifetime of
//! the interner:
//!
//! - equality of symbols is equality of the names they were interned from;
//! - the `Ord` on symbols is total and stable, which is what lets
//!   attribute sets keyed by symbol iterate deterministically.

use std::collections::HashMap;

/// An interned name.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// Maps names to symbols and back.
#[derive(Default)]
pub struct Interner {
    map: HashMap<String, Symbol>,
    names: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning the symbol every equal name maps to.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&sym) = self.map.get(name) {
            return sym;
        }

        let sym = Symbol(self.names.len() as u32);
        self.map.insert(name.to_owned(), sym);
        self.names.push(name.to_owned());
        sym
    }

    /// The name a symbol was interned from.
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.names[sym.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::Interner;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("outPath");
        let b = interner.intern("outPath");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "outPath");
    }

    #[test]
    fn ordering_follows_interning_order() {
        // Attribute sets rely on this for a stable iteration order.
        let mut interner = Interner::new();
        let first = interner.intern("zeta");
        let second = interner.intern("alpha");
        assert!(first < second);
        assert!(interner.intern("zeta") < second);
    }
}
