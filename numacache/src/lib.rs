//! # NumaCache
//!
//! NumaCache is a library for simulating coherent, set-associative caches, one per NUMA domain
//!
//! It provides a set-associative cache which can be parameterised by a replacement policy, a
//! multi-domain system which keeps those caches coherent, and a simulator to replay pinatrace
//! memory traces through that system
//!
//! The cache itself only tracks tags, coherence states and recency; routing accesses between
//! domains and deciding state transitions is the job of the system

/// Contains the set-associative cache, and a utility enum for the supported replacement policies
pub mod cache;

/// Coherence states and the cache line value type
pub mod coherence;

/// Contains definitions for the JSON configuration format
pub mod config;

/// The error type shared by the whole library
pub mod error;

/// Opens trace files for sequential reading
pub mod io;

/// Prefetcher hook consulted by the system on demand misses
pub mod prefetch;

/// Per-set recency ordering
pub mod recency;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Per-set line storage
pub mod set;

/// Contains the simulator used to replay a trace through a configured system
pub mod simulator;

/// The multi-domain system which keeps one cache per domain coherent
pub mod system;

/// Parsing of pinatrace records
pub mod trace;

#[cfg(test)]
mod test;

/// Contains utilities for running tests and benchmarks.
pub mod util;
