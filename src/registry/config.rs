//! Registry configuration.

/// Upper bound on table shards.
pub const MAX_SHARDS: usize = 256;

/// Tuning knobs for a `HandleRegistry`.
///
/// The default is a single shard, i.e. one mutex guarding the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Number of lock shards. Rounded up to a power of two in `[1, MAX_SHARDS]`.
    pub shards: usize,
    /// Initial capacity of each shard's table.
    pub initial_capacity: usize,
}

impl RegistryConfig {
    /// Create the default configuration.
    pub const fn new() -> Self {
        Self {
            shards: 1,
            initial_capacity: 0,
        }
    }

    /// Set the number of lock shards.
    pub const fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Set the initial per-shard capacity.
    pub const fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Shard count actually used.
    pub fn effective_shards(&self) -> usize {
        self.shards.clamp(1, MAX_SHARDS).next_power_of_two()
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single_shard() {
        assert_eq!(RegistryConfig::default().effective_shards(), 1);
    }

    #[test]
    fn test_shards_normalized() {
        assert_eq!(RegistryConfig::new().with_shards(0).effective_shards(), 1);
        assert_eq!(RegistryConfig::new().with_shards(5).effective_shards(), 8);
        assert_eq!(RegistryConfig::new().with_shards(10_000).effective_shards(), MAX_SHARDS);
    }
}
