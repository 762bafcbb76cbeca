//! Worker-pool sizing
//!
//! Chooses how many combinations may run at once. Small batches get a tiny
//! pool so spin-up cost does not dominate, large batches are capped so the
//! data source is not overwhelmed.

use crate::config::schema::ConcurrencyConfig;

/// Tiered sizing thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyPolicy {
    /// Batches up to this size are "small"
    pub small_batch_threshold: usize,
    /// Worker cap for small batches
    pub small_batch_max_workers: usize,
    /// Batches up to this size (and above the small threshold) are "medium"
    pub medium_batch_threshold: usize,
    /// Worker cap for medium batches
    pub medium_batch_max_workers: usize,
    /// Worker ceiling for large batches
    pub large_batch_max_workers: usize,
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            small_batch_threshold: 10,
            small_batch_max_workers: 2,
            medium_batch_threshold: 100,
            medium_batch_max_workers: 4,
            large_batch_max_workers: 8,
        }
    }
}

impl From<&ConcurrencyConfig> for ConcurrencyPolicy {
    fn from(config: &ConcurrencyConfig) -> Self {
        Self {
            small_batch_threshold: config.small_batch_threshold,
            small_batch_max_workers: config.small_batch_max_workers,
            medium_batch_threshold: config.medium_batch_threshold,
            medium_batch_max_workers: config.medium_batch_max_workers,
            large_batch_max_workers: config.large_batch_max_workers,
        }
    }
}

impl ConcurrencyPolicy {
    /// Plans the worker count
    ///
    /// * `total_combinations` - number of combinations in the run
    /// * `available_parallelism` - host parallelism (CPU count)
    /// * `override_cap` - optional configured cap; lowers the result, never raises it
    ///
    /// The result is clamped to `[1, total_combinations]` (and is 1 when
    /// there is nothing to do).
    pub fn plan(
        &self,
        total_combinations: usize,
        available_parallelism: usize,
        override_cap: Option<usize>,
    ) -> usize {
        let computed = if total_combinations <= self.small_batch_threshold {
            total_combinations.min(self.small_batch_max_workers)
        } else if total_combinations <= self.medium_batch_threshold {
            (available_parallelism / 2).min(self.medium_batch_max_workers)
        } else {
            available_parallelism
                .saturating_sub(1)
                .min(self.large_batch_max_workers)
        };

        let capped = match override_cap {
            Some(cap) => computed.min(cap),
            None => computed,
        };

        capped.clamp(1, total_combinations.max(1))
    }
}

/// Host parallelism, falling back to 1 when it cannot be determined
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
