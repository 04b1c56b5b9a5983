use clap::ValueEnum;
use serde::Deserialize;
use crate::error::CacheError;

/// Configuration for a multi-domain cache system
///
/// Every domain gets an identical cache
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_line_size")]
    pub line_size: u64,
    pub num_lines: u64,
    pub associativity: u64,
    #[serde(default = "default_domains")]
    pub domains: usize,
    /// Maps a thread id, used as the index, to the domain whose cache it uses
    #[serde(default = "default_tid_map")]
    pub tid_map: Vec<usize>,
    #[serde(default = "ReplacementPolicyConfig::default")]
    pub replacement_policy: ReplacementPolicyConfig,
    /// Seed for random replacement. Domain `n` uses `seed + n`. Unseeded caches draw from OS entropy
    #[serde(default)]
    pub seed: Option<u64>,
    /// Counting compulsory misses tracks every line ever touched, which is slow for large traces
    #[serde(default)]
    pub count_compulsory: bool,
    #[serde(default = "PrefetcherConfig::default")]
    pub prefetcher: PrefetcherConfig,
    /// Granularity of first-touch home domain assignment
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_line_size() -> u64 {
    64
}

fn default_domains() -> usize {
    1
}

fn default_tid_map() -> Vec<usize> {
    vec![0]
}

fn default_page_size() -> u64 {
    4096
}

impl SystemConfig {
    /// Checks the parts of the configuration the caches themselves don't
    ///
    /// Cache geometry is checked when the caches are built
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.line_size == 0 {
            return Err(CacheError::InvalidConfig("line_size must be non-zero".to_string()));
        }
        if self.page_size == 0 {
            return Err(CacheError::InvalidConfig("page_size must be non-zero".to_string()));
        }
        if self.domains == 0 {
            return Err(CacheError::InvalidConfig("at least one domain is required".to_string()));
        }
        if self.num_lines == 0 {
            return Err(CacheError::InvalidConfig("num_lines must be non-zero".to_string()));
        }
        if let Some((tid, domain)) = self.tid_map.iter().enumerate().find(|(_, d)| **d >= self.domains) {
            return Err(CacheError::InvalidConfig(format!(
                "thread {tid} maps to domain {domain}, but there are only {} domains",
                self.domains
            )));
        }
        Ok(())
    }
}

/// The replacement policy - lru or random. Defaults to lru.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, ValueEnum)]
pub enum ReplacementPolicyConfig {
    #[serde(alias = "lru")]
    #[value(name = "lru")]
    LeastRecentlyUsed,
    #[serde(alias = "random")]
    #[value(name = "random")]
    Random,
}

impl Default for ReplacementPolicyConfig {
    fn default() -> Self {
        ReplacementPolicyConfig::LeastRecentlyUsed
    }
}

/// The prefetcher consulted on demand misses - none or next_line. Defaults to none.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, ValueEnum)]
pub enum PrefetcherConfig {
    #[serde(alias = "none")]
    #[value(name = "none")]
    None,
    #[serde(alias = "next_line")]
    #[value(name = "next_line")]
    NextLine,
}

impl Default for PrefetcherConfig {
    fn default() -> Self {
        PrefetcherConfig::None
    }
}
