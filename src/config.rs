//! Sizing configuration for the hashed collections.

use crate::error::{CollectionError, Result};

/// Default number of buckets.
pub const DEFAULT_CAPACITY: usize = 16;
/// Default fraction of the bucket count that may be filled before doubling.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;
/// Largest bucket count a table grows to; chains absorb anything beyond.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

/// Capacity and growth policy for a hash table.
///
/// ```
/// use handle_collections::HashConfig;
///
/// let cfg = HashConfig::default().initial_capacity(100).load_factor(0.5);
/// assert!(cfg.validate().is_ok());
/// assert_eq!(cfg.bucket_count(), 128);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HashConfig {
    pub(crate) initial_capacity: usize,
    pub(crate) load_factor: f32,
    pub(crate) max_capacity: usize,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            max_capacity: MAXIMUM_CAPACITY,
        }
    }
}

impl HashConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Reject parameter combinations a table cannot honour.
    pub fn validate(&self) -> Result<()> {
        if !(self.load_factor > 0.0) || !self.load_factor.is_finite() {
            return Err(CollectionError::invalid(format!(
                "load factor must be positive and finite, got {}",
                self.load_factor
            )));
        }
        if self.max_capacity == 0 || !self.max_capacity.is_power_of_two() {
            return Err(CollectionError::invalid(format!(
                "maximum capacity must be a power of two, got {}",
                self.max_capacity
            )));
        }
        if self.initial_capacity > self.max_capacity {
            return Err(CollectionError::invalid(format!(
                "initial capacity {} exceeds maximum {}",
                self.initial_capacity, self.max_capacity
            )));
        }
        Ok(())
    }

    /// Initial bucket count: the requested capacity, clamped to
    /// `max_capacity`, rounded up to a power of two.
    pub fn bucket_count(&self) -> usize {
        let max = self.max_capacity.max(1);
        self.initial_capacity
            .clamp(1, max)
            .checked_next_power_of_two()
            .map_or(max, |n| n.min(max))
    }

    pub(crate) fn threshold_for(&self, buckets: usize) -> usize {
        ((buckets as f64) * (self.load_factor as f64)) as usize
    }
}
