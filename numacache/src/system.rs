use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use crate::cache::{CoherentCache, GenericSetCache, SetCache};
use crate::coherence::{CoherenceState, Residency};
use crate::config::{ReplacementPolicyConfig, SystemConfig};
use crate::error::CacheError;
use crate::prefetch::{self, Prefetcher};
use crate::replacement_policies::{LeastRecentlyUsed, Random};

/// Whether a memory access reads or writes
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Counters accumulated by a [`MultiCacheSystem`]
///
/// Misses are split by where the line came from: another domain's cache, the local domain's
/// memory, or a remote domain's memory. Local and remote writes count writebacks of evicted
/// Modified or Owned lines, by the home domain of the evicted line
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub local_reads: u64,
    pub local_writes: u64,
    pub remote_reads: u64,
    pub remote_writes: u64,
    pub othercache_reads: u64,
    pub compulsory: u64,
    pub writebacks: u64,
    pub prefetches: u64,
}

/// A set of NUMA domains, each with its own cache, kept coherent with MOESI-style transitions
///
/// Each thread is pinned to one domain by the thread map. Memory pages are homed on the domain
/// which touches them first, which decides whether memory traffic is local or remote
///
/// The caches are plain [`CoherentCache`]s; this type decides every state transition and drives
/// the caches through the hit path (`update_lru`, `change_state`) or the miss path
/// (`check_writeback`, `insert_line`)
pub struct MultiCacheSystem {
    caches: Vec<GenericSetCache>,
    tid_map: Vec<usize>,
    line_size: u64,
    page_size: u64,
    num_sets: u64,
    page_homes: HashMap<u64, usize>,
    // Only tracked when counting compulsory misses
    seen_lines: Option<HashSet<u64>>,
    prefetcher: Box<dyn Prefetcher>,
    stats: SystemStats,
}

impl MultiCacheSystem {
    /// Creates a system with the prefetcher named in the configuration
    pub fn new(config: &SystemConfig) -> Result<Self, CacheError> {
        Self::with_prefetcher(config, prefetch::from_config(config.prefetcher))
    }

    /// Creates a system which consults a custom prefetcher on demand misses
    pub fn with_prefetcher(config: &SystemConfig, prefetcher: Box<dyn Prefetcher>) -> Result<Self, CacheError> {
        config.validate()?;
        let caches = (0..config.domains)
            .map(|domain| Self::config_to_cache(config, domain))
            .collect::<Result<Vec<_>, _>>()?;
        let num_sets = config.num_lines / config.associativity;
        debug!(
            domains = config.domains,
            num_sets,
            associativity = config.associativity,
            line_size = config.line_size,
            policy = ?config.replacement_policy,
            "created cache system"
        );
        Ok(Self {
            caches,
            tid_map: config.tid_map.clone(),
            line_size: config.line_size,
            page_size: config.page_size,
            num_sets,
            page_homes: HashMap::new(),
            seen_lines: config.count_compulsory.then(HashSet::new),
            prefetcher,
            stats: SystemStats::default(),
        })
    }

    /// Creates the cache for one domain. Seeded random caches are offset by the domain so the
    /// domains don't evict in lockstep
    fn config_to_cache(config: &SystemConfig, domain: usize) -> Result<GenericSetCache, CacheError> {
        let cache = match config.replacement_policy {
            ReplacementPolicyConfig::LeastRecentlyUsed => {
                GenericSetCache::from(SetCache::new(config.num_lines, config.associativity, LeastRecentlyUsed)?)
            }
            ReplacementPolicyConfig::Random => {
                let policy = match config.seed {
                    Some(seed) => Random::seeded(seed.wrapping_add(domain as u64)),
                    None => Random::new(),
                };
                GenericSetCache::from(SetCache::new(config.num_lines, config.associativity, policy)?)
            }
        };
        Ok(cache)
    }

    /// Simulates one memory access by thread `tid`
    ///
    /// returns: Result<bool, CacheError>, true on a hit in the thread's domain cache
    pub fn mem_access(&mut self, address: u64, kind: AccessKind, tid: usize) -> Result<bool, CacheError> {
        let domain = *self.tid_map.get(tid).ok_or(CacheError::UnknownThread { tid })?;
        self.stats.accesses += 1;
        let line = address / self.line_size;
        let (set, tag) = self.split_line(line);
        self.page_homes.entry(address / self.page_size).or_insert(domain);
        if let Some(seen) = &mut self.seen_lines {
            if seen.insert(line) {
                self.stats.compulsory += 1;
            }
        }

        if let Some(state) = self.caches[domain].probe(set, tag).valid_state() {
            self.stats.hits += 1;
            self.caches[domain].update_lru(set, tag);
            if kind == AccessKind::Write && state != CoherenceState::Modified {
                self.invalidate_peers(set, tag, domain);
                self.caches[domain].change_state(set, tag, CoherenceState::Modified);
            }
            return Ok(true);
        }

        self.stats.misses += 1;
        let supplied_by_peer = self.fill(line, kind, domain);
        if supplied_by_peer {
            self.stats.othercache_reads += 1;
        } else if self.home_of_line(line, domain) == domain {
            self.stats.local_reads += 1;
        } else {
            self.stats.remote_reads += 1;
        }

        for prefetch_address in self.prefetcher.on_miss(address, self.line_size) {
            let prefetch_line = prefetch_address / self.line_size;
            let (set, tag) = self.split_line(prefetch_line);
            if self.caches[domain].probe(set, tag).valid_state().is_none() {
                self.page_homes.entry(prefetch_address / self.page_size).or_insert(domain);
                self.fill(prefetch_line, AccessKind::Read, domain);
                self.stats.prefetches += 1;
            }
        }
        Ok(false)
    }

    /// Brings `line` into `domain`'s cache after a miss, updating peer copies
    ///
    /// returns: bool, whether a peer cache supplied the line
    fn fill(&mut self, line: u64, kind: AccessKind, domain: usize) -> bool {
        let (set, tag) = self.split_line(line);
        let supplied_by_peer = match kind {
            AccessKind::Read => self.downgrade_peers(set, tag, domain),
            AccessKind::Write => self.invalidate_peers(set, tag, domain),
        };
        let state = match (kind, supplied_by_peer) {
            (AccessKind::Write, _) => CoherenceState::Modified,
            (AccessKind::Read, true) => CoherenceState::Shared,
            (AccessKind::Read, false) => CoherenceState::Exclusive,
        };

        let cache = &mut self.caches[domain];
        match cache.probe(set, tag) {
            // Still resident after an invalidation, reuse the slot
            Residency::Present(_) => {
                cache.update_lru(set, tag);
                cache.change_state(set, tag, state);
            }
            Residency::Absent => {
                let (candidate, candidate_owes_writeback) = cache.check_writeback(set);
                let evicted = cache.insert_line(set, tag, state);
                // Random replacement rarely evicts the LRU candidate, trust the returned line
                let owes_writeback = if evicted.tag == candidate {
                    candidate_owes_writeback
                } else {
                    evicted.state.needs_writeback()
                };
                if owes_writeback {
                    self.write_back(set, evicted.tag, domain);
                }
            }
        }
        trace!(domain, set, tag, ?state, supplied_by_peer, "filled line");
        supplied_by_peer
    }

    /// Read miss snoop: Modified peers become Owned and Exclusive peers become Shared
    ///
    /// returns: bool, whether any peer holds a valid copy
    fn downgrade_peers(&mut self, set: u64, tag: u64, domain: usize) -> bool {
        let mut found = false;
        for (peer, cache) in self.caches.iter_mut().enumerate() {
            if peer == domain {
                continue;
            }
            if let Some(state) = cache.probe(set, tag).valid_state() {
                found = true;
                let downgraded = match state {
                    CoherenceState::Modified => CoherenceState::Owned,
                    CoherenceState::Exclusive => CoherenceState::Shared,
                    other => other,
                };
                if downgraded != state {
                    trace!(peer, set, tag, from = ?state, to = ?downgraded, "downgraded peer copy");
                    cache.change_state(set, tag, downgraded);
                }
            }
        }
        found
    }

    /// Write snoop: every valid peer copy is invalidated. The invalid lines stay resident
    ///
    /// returns: bool, whether any peer held a valid copy
    fn invalidate_peers(&mut self, set: u64, tag: u64, domain: usize) -> bool {
        let mut found = false;
        for (peer, cache) in self.caches.iter_mut().enumerate() {
            if peer == domain {
                continue;
            }
            if cache.probe(set, tag).valid_state().is_some() {
                found = true;
                trace!(peer, set, tag, "invalidated peer copy");
                cache.change_state(set, tag, CoherenceState::Invalid);
            }
        }
        found
    }

    fn write_back(&mut self, set: u64, tag: u64, domain: usize) {
        let line = tag * self.num_sets + set;
        self.stats.writebacks += 1;
        if self.home_of_line(line, domain) == domain {
            self.stats.local_writes += 1;
        } else {
            self.stats.remote_writes += 1;
        }
        trace!(domain, set, tag, "wrote back evicted line");
    }

    /// The home domain of the page holding `line`, falling back to `domain` for untouched pages
    fn home_of_line(&self, line: u64, domain: usize) -> usize {
        let page = line * self.line_size / self.page_size;
        self.page_homes.get(&page).copied().unwrap_or(domain)
    }

    fn split_line(&self, line: u64) -> (u64, u64) {
        (line % self.num_sets, line / self.num_sets)
    }

    /// Splits an address into the set index and tag used by every domain's cache
    pub fn address_to_set_and_tag(&self, address: u64) -> (u64, u64) {
        self.split_line(address / self.line_size)
    }

    /// The domain a page was first touched by, if it has been touched
    pub fn home_domain(&self, address: u64) -> Option<usize> {
        self.page_homes.get(&(address / self.page_size)).copied()
    }

    pub fn stats(&self) -> &SystemStats {
        &self.stats
    }

    pub fn cache(&self, domain: usize) -> Option<&GenericSetCache> {
        self.caches.get(domain)
    }

    pub fn caches(&self) -> &[GenericSetCache] {
        &self.caches
    }
}
