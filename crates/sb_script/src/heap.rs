//! Reclaimable pools: interned strings and recycled local scopes.
//!
//! Stands in for the engine's memory-reclamation knobs: reclamation can be
//! stopped around bootstrap, restarted afterwards, and forced to run a full
//! pass on the failure-report path.

use std::sync::Arc;

use crate::value::{FastHashMap, Value, fast_map_new};

const STRING_POOL_SOFT_CAP: usize = 4096;
const SCOPE_POOL_CAP: usize = 32;

pub struct Pools {
    strings: FastHashMap<String, Arc<str>>,
    scopes: Vec<FastHashMap<String, Value>>,
    paused: bool,
}

impl Pools {
    pub fn new() -> Self {
        Self {
            strings: fast_map_new(),
            scopes: Vec::new(),
            paused: false,
        }
    }

    /// Intern a string literal, sharing one allocation per distinct text.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(v) = self.strings.get(s) {
            return v.clone();
        }
        let v: Arc<str> = Arc::from(s);
        self.strings.insert(s.to_string(), v.clone());
        v
    }

    pub fn take_scope(&mut self) -> FastHashMap<String, Value> {
        self.scopes.pop().unwrap_or_else(fast_map_new)
    }

    pub fn recycle_scope(&mut self, mut scope: FastHashMap<String, Value>) {
        if self.scopes.len() < SCOPE_POOL_CAP {
            scope.clear();
            self.scopes.push(scope);
        }
    }

    /// Stop automatic reclamation (bootstrap holds partially built state).
    pub fn stop(&mut self) {
        self.paused = true;
    }

    pub fn restart(&mut self) {
        self.paused = false;
    }

    pub fn is_stopped(&self) -> bool {
        self.paused
    }

    /// Opportunistic trim, skipped while reclamation is stopped.
    pub fn maybe_trim(&mut self) {
        if self.paused || self.strings.len() <= STRING_POOL_SOFT_CAP {
            return;
        }
        self.drop_unreferenced();
    }

    /// One full, unconditional reclamation pass.
    pub fn collect_full(&mut self) {
        self.drop_unreferenced();
        self.scopes.clear();
    }

    fn drop_unreferenced(&mut self) {
        // An entry with strong_count == 1 is referenced only by the pool.
        self.strings.retain(|_, v| Arc::strong_count(v) > 1);
    }

    pub fn interned_len(&self) -> usize {
        self.strings.len()
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_shares_allocations() {
        let mut pools = Pools::new();
        let a = pools.intern("hello");
        let b = pools.intern("hello");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pools.interned_len(), 1);
    }

    #[test]
    fn collect_drops_only_unreferenced_strings() {
        let mut pools = Pools::new();
        let keep = pools.intern("keep");
        let _ = pools.intern("drop");
        pools.collect_full();
        assert_eq!(pools.interned_len(), 1);
        assert_eq!(&*keep, "keep");
    }

    #[test]
    fn stop_inhibits_trim_but_not_full_pass() {
        let mut pools = Pools::new();
        pools.stop();
        for i in 0..(STRING_POOL_SOFT_CAP + 10) {
            let _ = pools.intern(&format!("s{i}"));
        }
        pools.maybe_trim();
        assert!(pools.interned_len() > STRING_POOL_SOFT_CAP);
        pools.collect_full();
        assert_eq!(pools.interned_len(), 0);
    }
}
