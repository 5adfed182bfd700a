//! Storage Statistics Module
//!
//! Aggregate counters reported by the backends, plus the maintenance pass
//! options and report.

use serde::{Deserialize, Serialize};

// == Storage Stats ==
/// Aggregate storage metrics, derived at query time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageStats {
    /// Live entries
    pub total_items: usize,
    /// Estimated bytes held by live entries
    pub total_size_bytes: u64,
    /// Entries found expired (and evicted) while gathering these stats
    pub expired_items: usize,
    /// Number of successful retrievals
    pub hits: u64,
    /// Number of failed retrievals (missing or expired)
    pub misses: u64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    /// total_size_bytes / total_items
    pub average_item_size: f64,
    /// total_size_bytes / configured ceiling
    pub utilization: f64,
}

impl StorageStats {
    // == Constructor ==
    /// Builds stats from raw tallies, computing the derived ratios.
    pub fn from_tallies(total_items: usize, total_size_bytes: u64, expired_items: usize) -> Self {
        let average_item_size = if total_items == 0 {
            0.0
        } else {
            total_size_bytes as f64 / total_items as f64
        };

        Self {
            total_items,
            total_size_bytes,
            expired_items,
            average_item_size,
            ..Self::default()
        }
    }

    /// Attaches hit/miss counters.
    pub fn with_counters(mut self, counters: &HitCounters) -> Self {
        self.hits = counters.hits;
        self.misses = counters.misses;
        self.hit_rate = counters.hit_rate();
        self
    }

    /// Computes utilization against a size ceiling.
    pub fn with_capacity(mut self, max_size_bytes: u64) -> Self {
        self.utilization = if max_size_bytes == 0 {
            0.0
        } else {
            self.total_size_bytes as f64 / max_size_bytes as f64
        };
        self
    }
}

// == Hit Counters ==
/// Tracks retrieval outcomes for the memory backend.
#[derive(Debug, Clone, Default)]
pub struct HitCounters {
    pub hits: u64,
    pub misses: u64,
}

impl HitCounters {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }
}

// == Cleanup ==
/// Options for an explicit maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupOptions {
    /// Remove entries older than this many seconds
    pub max_age_seconds: Option<u64>,
    /// Remove oldest entries until the total size fits under this ceiling
    pub max_size_bytes: Option<u64>,
    /// Report what would be removed without mutating
    pub dry_run: bool,
}

/// Outcome of a maintenance pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    pub scanned: usize,
    pub expired: usize,
    pub aged_out: usize,
    pub evicted_for_size: usize,
    pub bytes_freed: u64,
    pub dry_run: bool,
}

impl CleanupReport {
    /// Total entries removed (or that would be removed on a dry run).
    pub fn removed(&self) -> usize {
        self.expired + self.aged_out + self.evicted_for_size
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tallies_empty() {
        let stats = StorageStats::from_tallies(0, 0, 0);
        assert_eq!(stats.average_item_size, 0.0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_average_item_size() {
        let stats = StorageStats::from_tallies(4, 100, 1);
        assert_eq!(stats.average_item_size, 25.0);
        assert_eq!(stats.expired_items, 1);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut counters = HitCounters::default();
        counters.record_hit();
        counters.record_miss();
        assert_eq!(counters.hit_rate(), 0.5);

        let stats = StorageStats::from_tallies(1, 10, 0).with_counters(&counters);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(HitCounters::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_utilization() {
        let stats = StorageStats::from_tallies(1, 50, 0).with_capacity(200);
        assert_eq!(stats.utilization, 0.25);

        let stats = StorageStats::from_tallies(1, 50, 0).with_capacity(0);
        assert_eq!(stats.utilization, 0.0);
    }

    #[test]
    fn test_cleanup_options_defaults_from_json() {
        let options: CleanupOptions = serde_json::from_str(r#"{"dry_run": true}"#).unwrap();
        assert!(options.dry_run);
        assert!(options.max_age_seconds.is_none());
    }

    #[test]
    fn test_cleanup_report_removed() {
        let report = CleanupReport {
            expired: 1,
            aged_out: 2,
            evicted_for_size: 3,
            ..CleanupReport::default()
        };
        assert_eq!(report.removed(), 6);
    }
}
