use std::fmt::Write;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Base address of generated traces, keeps every generated address well away from null
pub const TRACE_BASE_ADDRESS: u64 = 0x7f00_0000_0000;

/// Shape of a generated trace
pub struct TraceShape {
    pub records: usize,
    /// Distinct lines the trace may touch
    pub footprint_lines: u64,
    pub line_size: u64,
    /// Thread ids are drawn from `0..threads`
    pub threads: usize,
    /// Fraction of records which are writes
    pub write_ratio: f64,
}

impl Default for TraceShape {
    fn default() -> Self {
        Self {
            records: 10_000,
            footprint_lines: 4096,
            line_size: 64,
            threads: 1,
            write_ratio: 0.3,
        }
    }
}

/// Generates a pinatrace-style trace with some temporal locality, deterministic for a given seed
///
/// Most accesses go to a hot eighth of the footprint so that caches smaller than the footprint
/// still see a useful number of hits
pub fn generate_trace(seed: u64, shape: &TraceShape) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let hot_lines = (shape.footprint_lines / 8).max(1);
    let mut out = String::with_capacity(shape.records * 24);
    for _ in 0..shape.records {
        let line = if rng.gen_bool(0.8) {
            rng.gen_range(0..hot_lines)
        } else {
            rng.gen_range(0..shape.footprint_lines.max(1))
        };
        let offset = rng.gen_range(0..shape.line_size.max(1));
        let address = TRACE_BASE_ADDRESS + line * shape.line_size + offset;
        let kind = if rng.gen_bool(shape.write_ratio.clamp(0.0, 1.0)) { 'W' } else { 'R' };
        let tid = rng.gen_range(0..shape.threads.max(1));
        // Writing to a String can't fail
        let _ = writeln!(out, "{kind} {address:#x} {tid}");
    }
    out.push_str("#eof\n");
    out
}
