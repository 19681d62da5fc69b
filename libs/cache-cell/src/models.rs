use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    /// Backend failures that were downgraded to misses or skipped writes.
    pub degraded_operations: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub(crate) fn refresh_hit_rate(&mut self) {
        let lookups = self.hits + self.misses;
        self.hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
    }
}
