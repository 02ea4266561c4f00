//! Gossim CLI
//!
//! Runs one deterministic gossip-consensus simulation and reports how long
//! the network took to converge and how much it talked.
//!
//! # Example
//!
//! ```bash
//! # Reproduce the reference run (1000 nodes, fixed seed)
//! gossim
//!
//! # A smaller network with a different seed and more contrarians
//! gossim --nodes 200 --seed 7 --malicious 30
//! ```

use clap::Parser;
use gossim_simulation::{SimConfig, SimulationRunner, Verdict};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Gossim consensus simulator
///
/// Single-threaded and reproducible: the same seed and parameters always
/// produce the same run. All human-readable output goes to standard error.
#[derive(Parser, Debug)]
#[command(name = "gossim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of nodes
    #[arg(short = 'n', long, default_value_t = 1000)]
    nodes: usize,

    /// Nodes that vote contrarily to what they observe
    #[arg(short = 'm', long, default_value_t = 15)]
    malicious: usize,

    /// Supermajority percentage that ends the run
    #[arg(long, default_value_t = 80)]
    consensus_percent: u32,

    /// Random seed for topology construction
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Minimum end-to-core latency in ms
    #[arg(long, default_value_t = 5)]
    min_e2c_latency: u64,

    /// Maximum end-to-core latency in ms
    #[arg(long, default_value_t = 50)]
    max_e2c_latency: u64,

    /// Minimum core-to-core latency in ms
    #[arg(long, default_value_t = 5)]
    min_c2c_latency: u64,

    /// Maximum core-to-core latency in ms
    #[arg(long, default_value_t = 200)]
    max_c2c_latency: u64,

    /// Outbound links drawn per node
    #[arg(long, default_value_t = 10)]
    links: usize,

    /// Minimum trusted-set size
    #[arg(long, default_value_t = 20)]
    unl_min: usize,

    /// Maximum trusted-set size
    #[arg(long, default_value_t = 30)]
    unl_max: usize,

    /// Trusted-set observations required before changing position
    #[arg(long, default_value_t = 10)]
    unl_thresh: usize,

    /// Delay in ms added to sends so updates can coalesce
    #[arg(long, default_value_t = 1)]
    base_delay: u64,

    /// Votes a node gives its own position (flip hysteresis)
    #[arg(long, default_value_t = 1)]
    self_weight: i64,

    /// Packets allowed in flight per link per direction
    #[arg(long, default_value_t = 3)]
    packets_on_wire: u64,
}

impl Args {
    fn into_config(self) -> SimConfig {
        SimConfig {
            num_nodes: self.nodes,
            malicious_nodes: self.malicious,
            consensus_percent: self.consensus_percent,
            min_e2c_latency: self.min_e2c_latency,
            max_e2c_latency: self.max_e2c_latency,
            min_c2c_latency: self.min_c2c_latency,
            max_c2c_latency: self.max_c2c_latency,
            outbound_links: self.links,
            unl_min: self.unl_min,
            unl_max: self.unl_max,
            unl_thresh: self.unl_thresh,
            base_delay: self.base_delay,
            self_weight: self.self_weight,
            packets_on_wire: self.packets_on_wire,
        }
    }
}

fn main() {
    // All output belongs on stderr, logging included.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,gossim_simulation=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let seed = args.seed;
    let config = args.into_config();

    info!(
        nodes = config.num_nodes,
        malicious = config.malicious_nodes,
        consensus_percent = config.consensus_percent,
        seed,
        "starting simulation"
    );

    let mut runner = match SimulationRunner::new(config, seed) {
        Ok(runner) => runner,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            std::process::exit(1);
        }
    };

    let report = runner.run_with_progress(|snapshot| {
        eprintln!(
            "Time: {} ms  {}/{}",
            snapshot.time, snapshot.positive, snapshot.negative
        );
    });

    match report.verdict {
        Verdict::Consensus(_) => {
            eprintln!(
                "Consensus reached in {} ms with {} messages on the wire",
                report.elapsed_ms, report.residual_messages
            );
            eprintln!("The average node sent {} messages", report.average_sent);
        }
        Verdict::RadioSilence => {
            eprintln!("Fatal: Radio Silence");
        }
    }
}
