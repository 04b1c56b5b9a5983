use std::io::BufRead;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::cache::CoherentCache;
use crate::config::SystemConfig;
use crate::error::CacheError;
use crate::system::{MultiCacheSystem, SystemStats};
use crate::trace::parse_trace_line;

/// The simulator feeds trace records to a cache system, and collects results.
///
/// It supports calling simulate multiple times, and will update the time taken to simulate and the
/// results accordingly
pub struct Simulator {
    system: MultiCacheSystem,
    result: SimulationResult,
    simulation_time: Duration,
}

/// The result of a simulation. Can be serialised as JSON
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SimulationResult {
    pub policy: String,
    /// Trace records read, including the ones with a null address
    pub records: u64,
    /// Records with a null address, which are counted but not simulated
    pub skipped_null: u64,
    pub stats: SystemStats,
}

impl Simulator {

    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A system configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, CacheError>
    pub fn new(config: &SystemConfig) -> Result<Self, CacheError> {
        Ok(Self::with_system(MultiCacheSystem::new(config)?))
    }

    /// Creates a simulator around an already built system
    pub fn with_system(system: MultiCacheSystem) -> Self {
        let policy = system
            .cache(0)
            .map(|cache| cache.policy_name())
            .unwrap_or_default()
            .to_string();
        Self {
            system,
            result: SimulationResult {
                policy,
                records: 0,
                skipped_null: 0,
                stats: SystemStats::default(),
            },
            simulation_time: Duration::new(0, 0),
        }
    }

    /// Simulates every record of a pinatrace-style trace
    ///
    /// Reads are sequential, so a memory mapped file advised for sequential access works well.
    /// Stops at the first malformed line or unmapped thread
    ///
    /// # Arguments
    ///
    /// * `reader`: The trace
    ///
    /// returns: Result<&SimulationResult, CacheError>
    pub fn simulate<B: BufRead>(&mut self, reader: B) -> Result<&SimulationResult, CacheError> {
        let start = Instant::now();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let record = match parse_trace_line(&line, index as u64 + 1)? {
                Some(record) => record,
                None => continue,
            };
            self.result.records += 1;
            if record.address == 0 {
                debug!(line = index + 1, "skipping record with a null address");
                self.result.skipped_null += 1;
                continue;
            }
            self.system.mem_access(record.address, record.kind, record.tid)?;
        }
        self.simulation_time += start.elapsed();
        self.result.stats = self.system.stats().clone();
        Ok(&self.result)
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of invalid lines in each domain's cache
    pub fn get_invalid_line_counts(&self) -> Vec<u64> {
        self.system.caches().iter().map(|x| x.invalid_line_count() as u64).collect()
    }

    pub fn system(&self) -> &MultiCacheSystem {
        &self.system
    }
}
