use crate::config::PrefetcherConfig;

/// Hook consulted by the system whenever a demand access misses
///
/// Prefetched lines are filled quietly: they don't count as hits or misses, but evicting a dirty
/// line to make room still owes a writeback
pub trait Prefetcher {
    /// Returns the addresses to prefetch after a miss on `address`
    ///
    /// # Arguments
    ///
    /// * `address`: The address which missed
    /// * `line_size`: The cache line size in bytes
    ///
    /// returns: Vec<u64>
    fn on_miss(&mut self, address: u64, line_size: u64) -> Vec<u64>;
}

/// Never prefetches
#[derive(Debug, Default)]
pub struct NullPrefetch;

impl Prefetcher for NullPrefetch {
    fn on_miss(&mut self, _address: u64, _line_size: u64) -> Vec<u64> {
        Vec::new()
    }
}

/// Prefetches the `degree` lines following the one which missed
#[derive(Debug)]
pub struct NextLinePrefetch {
    degree: u64,
}

impl NextLinePrefetch {
    pub fn new(degree: u64) -> Self {
        Self { degree }
    }
}

impl Default for NextLinePrefetch {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Prefetcher for NextLinePrefetch {
    fn on_miss(&mut self, address: u64, line_size: u64) -> Vec<u64> {
        let line_start = address - address % line_size;
        (1..=self.degree)
            .filter_map(|n| line_start.checked_add(n * line_size))
            .collect()
    }
}

/// Creates the prefetcher named by a configuration
pub fn from_config(config: PrefetcherConfig) -> Box<dyn Prefetcher> {
    match config {
        PrefetcherConfig::None => Box::new(NullPrefetch),
        PrefetcherConfig::NextLine => Box::new(NextLinePrefetch::default()),
    }
}
