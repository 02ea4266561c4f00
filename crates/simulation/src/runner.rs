//! Deterministic simulation runner.
//!
//! Owns the nodes, the event queue, and the population tally, and drives
//! delivery until one position holds a supermajority or the queue drains.

use crate::node::{Node, Tally};
use crate::{EventQueue, Link, Message, SimConfig, Topology, TopologyError};
use gossim_types::{NodeId, Position, PositionRecord, SimTime};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Counters accumulated over a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Delivery buckets dispatched.
    pub buckets_processed: u64,
    /// Non-empty messages handed to their destination.
    pub messages_delivered: u64,
    /// Messages that arrived empty after suppression; their send credit was
    /// returned to the sender.
    pub empty_messages_reclaimed: u64,
    /// Messages placed in the queue (seeding excluded).
    pub messages_enqueued: u64,
    /// Updates folded into a still-queued message instead of a new send.
    pub coalesced_updates: u64,
    /// Entries erased from queued messages because the recipient already
    /// knew them.
    pub suppressed_entries: u64,
    /// Nodes changing their own position.
    pub position_flips: u64,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// One position exceeded the supermajority threshold.
    Consensus(Position),
    /// The event queue drained first; the network went quiet undecided.
    RadioSilence,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimReport {
    pub verdict: Verdict,
    /// Virtual time at termination, in ms.
    pub elapsed_ms: SimTime,
    /// Messages still in the queue at termination.
    pub residual_messages: usize,
    /// Sum of per-node send counters (suppressed-empty sends excluded).
    pub total_sent: u64,
    /// `total_sent / num_nodes`, integer division.
    pub average_sent: u64,
    /// Final population split.
    pub tally: Tally,
}

/// Periodic progress observation handed to [`SimulationRunner::run_with_progress`].
///
/// Emitted whenever the next delivery time crosses into a new 100 ms window,
/// before the clock advances; the counts are the split at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub time: SimTime,
    pub positive: usize,
    pub negative: usize,
}

/// Deterministic simulation runner.
///
/// Given the same configuration and seed, produces identical results every
/// run. Single-threaded throughout: all ordering lives in the event queue.
pub struct SimulationRunner {
    config: SimConfig,
    nodes: Vec<Node>,
    queue: EventQueue,
    tally: Tally,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Build the reference random topology from `seed` and seed the initial
    /// broadcasts.
    pub fn new(config: SimConfig, seed: u64) -> Result<Self, TopologyError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let topology = Topology::random(&config, &mut rng)?;
        let runner = Self::with_topology(config, topology)?;
        info!(
            num_nodes = runner.nodes.len(),
            seed,
            initial_messages = runner.queue.pending_messages(),
            "created simulation runner"
        );
        Ok(runner)
    }

    /// Build from an explicit topology and seed the initial broadcasts.
    pub fn with_topology(config: SimConfig, topology: Topology) -> Result<Self, TopologyError> {
        topology.validate()?;
        let num_nodes = topology.len();

        let mut tally = Tally::default();
        let mut nodes: Vec<Node> = Vec::with_capacity(num_nodes);
        for (index, spec) in topology.nodes.into_iter().enumerate() {
            match spec.initial_position {
                Position::Positive => tally.positive += 1,
                Position::Negative => tally.negative += 1,
                Position::Unknown => unreachable!("validated topology has no undecided nodes"),
            }
            let links = spec
                .links
                .iter()
                .map(|link| Link::new(link.to, link.total_latency))
                .collect();
            nodes.push(Node::new(
                NodeId::new(index as u32),
                num_nodes,
                spec.initial_position,
                spec.unl,
                links,
            ));
        }

        let mut runner = Self {
            config,
            nodes,
            queue: EventQueue::new(),
            tally,
            stats: SimulationStats::default(),
        };
        runner.seed_initial_broadcasts();
        Ok(runner)
    }

    /// Announce every node's starting position on each of its links at
    /// time 0. Seed messages are free: they do not count toward `sent`.
    fn seed_initial_broadcasts(&mut self) {
        for node in &mut self.nodes {
            let announcement = BTreeMap::from([(
                node.id(),
                PositionRecord::new(node.id(), 1, node.own_position()),
            )]);
            let from = node.id();
            for link in node.links_mut() {
                let message = Message::with_updates(from, link.to, &announcement);
                self.queue.send(link, message, 0);
            }
        }
    }

    // ─── Accessors ───

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_usize())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Current virtual time in ms.
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Messages still pending delivery.
    pub fn pending_messages(&self) -> usize {
        self.queue.pending_messages()
    }

    // ─── Main Loop ───

    /// Run to termination, logging progress through `tracing`.
    pub fn run(&mut self) -> SimReport {
        self.run_with_progress(|snapshot| {
            info!(
                time_ms = snapshot.time,
                positive = snapshot.positive,
                negative = snapshot.negative,
                "progress"
            );
        })
    }

    /// Run to termination, handing each periodic [`ProgressSnapshot`] to
    /// `progress`.
    pub fn run_with_progress<F>(&mut self, mut progress: F) -> SimReport
    where
        F: FnMut(ProgressSnapshot),
    {
        let threshold = self.config.consensus_threshold();

        let verdict = loop {
            if let Some(winner) = self.tally.decided(threshold) {
                break Verdict::Consensus(winner);
            }

            let Some(next_time) = self.queue.next_time() else {
                warn!(
                    positive = self.tally.positive,
                    negative = self.tally.negative,
                    "radio silence: event queue drained before consensus"
                );
                break Verdict::RadioSilence;
            };

            if next_time / 100 > self.queue.now() / 100 {
                progress(ProgressSnapshot {
                    time: next_time,
                    positive: self.tally.positive,
                    negative: self.tally.negative,
                });
            }

            let (time, bucket) = self
                .queue
                .pop_bucket()
                .expect("a queue with a next_time has a bucket");
            self.stats.buckets_processed += 1;
            trace!(time, messages = bucket.len(), "dispatching bucket");

            for message in &bucket {
                if message.is_empty() {
                    // Fully suppressed before it shipped: not a real send.
                    self.nodes[message.from.as_usize()].reclaim_unsent();
                    self.stats.empty_messages_reclaimed += 1;
                } else {
                    self.stats.messages_delivered += 1;
                    self.nodes[message.to.as_usize()].receive(
                        message,
                        &mut self.queue,
                        &mut self.tally,
                        &self.config,
                        &mut self.stats,
                    );
                }
            }
        };

        let report = self.report(verdict);
        debug!(
            verdict = ?report.verdict,
            elapsed_ms = report.elapsed_ms,
            residual_messages = report.residual_messages,
            average_sent = report.average_sent,
            "run finished"
        );
        report
    }

    fn report(&self, verdict: Verdict) -> SimReport {
        let total_sent: u64 = self.nodes.iter().map(Node::sent).sum();
        SimReport {
            verdict,
            elapsed_ms: self.queue.now(),
            residual_messages: self.queue.pending_messages(),
            total_sent,
            average_sent: total_sent / self.nodes.len() as u64,
            tally: self.tally,
        }
    }

    /// Assert every continuously-held invariant. Intended for tests; panics
    /// with a diagnostic on any violation.
    pub fn check_invariants(&self) {
        let n = self.nodes.len();

        assert_eq!(self.tally.total(), n, "tally must cover every node");
        let positive = self
            .nodes
            .iter()
            .filter(|node| node.own_position() == Position::Positive)
            .count();
        assert_eq!(self.tally.positive, positive, "positive tally desynced");
        assert_eq!(self.tally.negative, n - positive, "negative tally desynced");

        for node in &self.nodes {
            assert!(
                node.own_position().is_known(),
                "node {} lost its own position",
                node.id()
            );
            for link in node.links() {
                if link.queued.is_some() {
                    assert_eq!(
                        link.last_recv_time,
                        link.last_send_time + link.total_latency,
                        "link {} -> {} send/recv window out of step",
                        node.id(),
                        link.to
                    );
                }
            }
        }

        for (time, bucket) in self.queue.buckets() {
            assert!(time >= self.queue.now(), "bucket scheduled in the past");
            for message in bucket {
                assert!(message.from.as_usize() < n, "message from unknown node");
                assert!(message.to.as_usize() < n, "message to unknown node");
                assert!(
                    !message.data().contains_key(&message.to),
                    "message tells its recipient about itself"
                );
            }
        }
    }
}
