//! Per-participant state and the consensus update rule.

use crate::runner::SimulationStats;
use crate::{EventQueue, Link, Message, SimConfig};
use gossim_types::{NodeId, Position, PositionRecord, SimTime, Timestamp};
use std::collections::BTreeMap;
use tracing::debug;

/// Interval in ms after which the decision rule leans one step further
/// toward `Negative`. Uses integer division on the virtual clock; the
/// stepwise (not gradual) bias is part of the deterministic behavior.
/// "Agree to disagree": a split network still terminates.
const TIME_BIAS_INTERVAL_MS: SimTime = 250;

/// Population counts by position. Owned by the runner and mutated only by
/// the decision rule; `positive + negative` always equals the node count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub positive: usize,
    pub negative: usize,
}

impl Tally {
    /// Total nodes accounted for.
    pub fn total(&self) -> usize {
        self.positive + self.negative
    }

    /// Move one node from the opposite side to `to`.
    pub fn record_flip(&mut self, to: Position) {
        match to {
            Position::Positive => {
                self.negative -= 1;
                self.positive += 1;
            }
            Position::Negative => {
                self.positive -= 1;
                self.negative += 1;
            }
            Position::Unknown => unreachable!("nodes never flip to an unknown position"),
        }
    }

    /// The side holding strictly more than `threshold` nodes, if any.
    pub fn decided(&self, threshold: usize) -> Option<Position> {
        if self.positive > threshold {
            Some(Position::Positive)
        } else if self.negative > threshold {
            Some(Position::Negative)
        } else {
            None
        }
    }
}

/// One simulated participant.
///
/// A node tracks the freshest position it has heard for every other node,
/// the trusted set (UNL) whose positions count toward its own decision, and
/// its outbound links. All reaction to the network happens in
/// [`receive`](Self::receive).
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    /// Freshest position heard per node, indexed by id. The entry for this
    /// node's own id is its current position.
    knowledge: Vec<Position>,
    /// Freshness counter backing each `knowledge` entry. Monotone per subject.
    timestamps: Vec<Timestamp>,
    /// Peers whose positions this node counts when deciding its own.
    unl: Vec<NodeId>,
    /// Outbound links, one per connected peer.
    links: Vec<Link>,
    sent: u64,
    received: u64,
}

impl Node {
    /// Create a node holding `initial_position` with freshness 1.
    pub fn new(
        id: NodeId,
        num_nodes: usize,
        initial_position: Position,
        unl: Vec<NodeId>,
        links: Vec<Link>,
    ) -> Self {
        debug_assert!(initial_position.is_known(), "nodes start with a position");
        debug_assert!(!unl.contains(&id), "a node does not trust itself");
        debug_assert!(
            links.iter().all(|link| link.to != id),
            "a node does not link to itself"
        );

        let mut knowledge = vec![Position::Unknown; num_nodes];
        let mut timestamps = vec![0; num_nodes];
        knowledge[id.as_usize()] = initial_position;
        timestamps[id.as_usize()] = 1;

        Self {
            id,
            knowledge,
            timestamps,
            unl,
            links,
            sent: 0,
            received: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The position this node currently holds.
    pub fn own_position(&self) -> Position {
        self.knowledge[self.id.as_usize()]
    }

    /// The freshest position heard for `node` (`Unknown` if never heard).
    pub fn position_of(&self, node: NodeId) -> Position {
        self.knowledge[node.as_usize()]
    }

    /// The freshness counter behind [`position_of`](Self::position_of).
    pub fn timestamp_of(&self, node: NodeId) -> Timestamp {
        self.timestamps[node.as_usize()]
    }

    /// Trusted set of this node.
    pub fn unl(&self) -> &[NodeId] {
        &self.unl
    }

    /// Outbound links of this node.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub(crate) fn links_mut(&mut self) -> &mut [Link] {
        &mut self.links
    }

    /// Messages this node has paid for: incremented per enqueue, reclaimed
    /// when a fully-suppressed message reaches its destination empty.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Non-empty messages delivered to this node.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Give back the send credit for a message that was suppressed down to
    /// nothing before it shipped.
    pub(crate) fn reclaim_unsent(&mut self) {
        debug_assert!(self.sent > 0, "reclaiming a send that was never counted");
        self.sent -= 1;
    }

    /// React to a delivered message: update knowledge, possibly flip our own
    /// position, and propagate whatever was new.
    pub fn receive(
        &mut self,
        message: &Message,
        queue: &mut EventQueue,
        tally: &mut Tally,
        config: &SimConfig,
        stats: &mut SimulationStats,
    ) {
        let now = queue.now();
        self.received += 1;

        // The sender just told us everything in this message; anything we
        // still have queued back to it repeating that data is waste.
        if let Some(link) = self.links.iter_mut().find(|link| link.to == message.from) {
            if link.suppressible_at(now) {
                let handle = link.queued.expect("suppressible link has a queued message");
                let queued = queue
                    .message_mut(handle)
                    .expect("suppressible handle must resolve to a queued message");
                stats.suppressed_entries += queued.suppress(message.data()) as u64;
            }
        }

        // Fold strictly fresher records into our view.
        let mut changes: BTreeMap<NodeId, PositionRecord> = BTreeMap::new();
        for (&subject, record) in message.data() {
            if subject == self.id {
                // A peer never rewrites our own position.
                continue;
            }
            let index = subject.as_usize();
            if record.ts > self.timestamps[index] && record.position != self.knowledge[index] {
                self.knowledge[index] = record.position;
                self.timestamps[index] = record.ts;
                changes.insert(subject, *record);
            }
        }
        if changes.is_empty() {
            return;
        }

        let flipped = self.reconsider_position(now, tally, config, &mut changes, stats);

        // Everyone but the sender hears the news; a flip goes back to the
        // sender as well.
        for link in self.links.iter_mut() {
            if !flipped && link.to == message.from {
                continue;
            }
            if link.editable_at(now) {
                let handle = link.queued.expect("editable link has a queued message");
                let queued = queue
                    .message_mut(handle)
                    .expect("editable handle must resolve to a queued message");
                queued.merge(&changes);
                stats.coalesced_updates += 1;
            } else {
                let mut send_time = now;
                if !flipped {
                    // Delay a bit so nearby updates coalesce, and push back
                    // further while the pipe is full.
                    send_time += config.base_delay;
                    if link.busy_at(send_time) {
                        send_time += link.total_latency / config.packets_on_wire;
                    }
                }
                let outbound = Message::with_updates(self.id, link.to, &changes);
                queue.send(link, outbound, send_time);
                self.sent += 1;
                stats.messages_enqueued += 1;
            }
        }
    }

    /// Re-evaluate our own position against the trusted set. Returns whether
    /// we flipped; a flip is appended to `changes` under our own id.
    fn reconsider_position(
        &mut self,
        now: SimTime,
        tally: &mut Tally,
        config: &SimConfig,
        changes: &mut BTreeMap<NodeId, PositionRecord>,
        stats: &mut SimulationStats,
    ) -> bool {
        let mut known = 0usize;
        let mut balance = 0i64;
        for &peer in &self.unl {
            let position = self.knowledge[peer.as_usize()];
            if position.is_known() {
                known += 1;
                balance += position.sign();
            }
        }

        if self.id.as_usize() < config.malicious_nodes {
            // Contrarian: vote against whatever the trusted set shows.
            balance = -balance;
        }

        // Lean toward "no" as time passes so a split still terminates.
        balance -= (now / TIME_BIAS_INTERVAL_MS) as i64;

        if known < config.unl_thresh {
            return false;
        }

        let own = self.own_position();
        let flip_to = if own == Position::Positive && balance < -config.self_weight {
            Position::Negative
        } else if own == Position::Negative && balance > config.self_weight {
            Position::Positive
        } else {
            return false;
        };

        let index = self.id.as_usize();
        self.knowledge[index] = flip_to;
        self.timestamps[index] += 1;
        tally.record_flip(flip_to);
        stats.position_flips += 1;
        changes.insert(
            self.id,
            PositionRecord::new(self.id, self.timestamps[index], flip_to),
        );
        debug!(node = %self.id, time = now, position = %flip_to, "position flip");
        true
    }
}
