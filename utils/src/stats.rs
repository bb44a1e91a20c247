//! Operation counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe counter collection with a fixed set of names.
///
/// Unknown names are ignored on write and read as zero.
pub struct StatsCounter {
    counters: HashMap<&'static str, AtomicU64>,
}

impl StatsCounter {
    pub fn new(names: &[&'static str]) -> Self {
        let counters = names.iter().map(|&name| (name, AtomicU64::new(0))).collect();
        Self { counters }
    }

    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        self.counters
            .iter()
            .map(|(&k, v)| (k, v.load(Ordering::Relaxed)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_known_names_only() {
        let stats = StatsCounter::new(&["issued", "cancelled"]);
        stats.increment("issued");
        stats.add("issued", 2);
        stats.increment("unknown");
        assert_eq!(stats.get("issued"), 3);
        assert_eq!(stats.get("cancelled"), 0);
        assert_eq!(stats.get("unknown"), 0);
        assert_eq!(stats.snapshot().len(), 2);
    }
}
