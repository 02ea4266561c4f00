//! Deterministic discrete-event engine for gossip binary consensus.
//!
//! This crate simulates N nodes gossiping a single-bit position over a
//! structured peer-to-peer overlay. Each node updates its own bit from the
//! majority among its trusted set (UNL), and the run ends when one bit holds
//! a supermajority of the population or the network goes quiet. Given the
//! same configuration and seed, a run produces identical results every time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    SimulationRunner                      │
//! │                                                          │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │    EventQueue (BTreeMap<SimTime, Vec<Message>>)     │ │
//! │  │    Buckets by delivery time; FIFO within a bucket   │ │
//! │  └──────────────────────────┬──────────────────────────┘ │
//! │                             │                            │
//! │                             ▼                            │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │    nodes: Vec<Node>                                 │ │
//! │  │    receive() → knowledge update → decision rule     │ │
//! │  └──────────────────────────┬──────────────────────────┘ │
//! │                             │                            │
//! │                             ▼                            │
//! │  ┌─────────────────────────────────────────────────────┐ │
//! │  │    Broadcast: edit a still-queued message in place  │ │
//! │  │    (coalesce / suppress) or schedule a new send     │ │
//! │  └─────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The distinguishing mechanic is that queued messages stay mutable until
//! their send time passes: senders merge newer positions into them
//! (coalescing) and erase entries the recipient has since proven it knows
//! (suppression). Messages suppressed down to nothing are dispatched anyway
//! and reconciled at delivery, so fully-suppressed traffic costs nothing in
//! the reported message counts.
//!
//! # Example
//!
//! ```
//! use gossim_simulation::{SimConfig, SimulationRunner, Verdict};
//!
//! let config = SimConfig {
//!     num_nodes: 100,
//!     malicious_nodes: 5,
//!     ..Default::default()
//! };
//! let mut runner = SimulationRunner::new(config, 42).expect("valid configuration");
//! let report = runner.run();
//! match report.verdict {
//!     Verdict::Consensus(position) => {
//!         println!("converged on {position} in {} ms", report.elapsed_ms)
//!     }
//!     Verdict::RadioSilence => println!("network went quiet undecided"),
//! }
//! ```

mod config;
mod event_queue;
mod link;
mod message;
mod node;
mod runner;
mod topology;

pub use config::SimConfig;
pub use event_queue::{EventQueue, MessageHandle};
pub use link::Link;
pub use message::Message;
pub use node::{Node, Tally};
pub use runner::{ProgressSnapshot, SimReport, SimulationRunner, SimulationStats, Verdict};
pub use topology::{full_mesh, LinkSpec, NodeSpec, Topology, TopologyError};
