use std::fs::File;
use std::io::BufReader;
use std::time::Instant;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use numacache::config::{PrefetcherConfig, ReplacementPolicyConfig, SystemConfig};
use numacache::io::get_reader;
use numacache::simulator::Simulator;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Coherent per-domain cache simulator for pinatrace memory traces"))]
struct Args {
    config: String,
    trace: String,

    /// Overrides the replacement policy in the configuration
    #[arg(short = 'r', long, value_enum)]
    policy: Option<ReplacementPolicyConfig>,

    /// Overrides the random replacement seed in the configuration
    #[arg(short, long)]
    seed: Option<u64>,

    /// Overrides the prefetcher in the configuration
    #[arg(long, value_enum)]
    prefetcher: Option<PrefetcherConfig>,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config_file = File::open(&args.config).map_err(|e| format!("Couldn't open the config file at path {}: {e}", args.config))?;
    let mut config: SystemConfig = serde_json::from_reader(BufReader::new(config_file)).map_err(|e| format!("Couldn't parse the config file: {e}"))?;
    if let Some(policy) = args.policy {
        config.replacement_policy = policy;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(prefetcher) = args.prefetcher {
        config.prefetcher = prefetcher;
    }
    info!(policy = ?config.replacement_policy, domains = config.domains, "starting simulation");

    let mut simulator = Simulator::new(&config).map_err(|e| format!("Couldn't build the cache system: {e}"))?;
    let trace_file = File::open(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    let trace_reader = get_reader(trace_file).map_err(|e| format!("Couldn't read the trace file: {e}"))?;
    let result = simulator.simulate(trace_reader).map_err(|e| format!("Simulation failed: {e}"))?;
    println!("{}", serde_json::to_string_pretty(result).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        let invalid_lines = simulator.get_invalid_line_counts();
        let formatted = invalid_lines
            .iter()
            .enumerate()
            .map(|(domain, count)| format!("domain {domain}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Invalid cache lines by domain: ({formatted})");
        println!("Total invalid cache lines: {}", invalid_lines.iter().sum::<u64>())
    }
    Ok(())
}
