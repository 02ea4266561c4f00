//! Identifier and clock types.

use std::fmt;

/// Virtual-clock time in integer milliseconds.
///
/// The simulation never touches wall-clock time; every delay, latency, and
/// delivery instant is expressed in these units. Integer arithmetic on
/// `SimTime` (including division) is part of the deterministic behavior and
/// must not be replaced with floating point.
pub type SimTime = u64;

/// Per-node freshness counter.
///
/// Bumped only by the node itself when it changes its own position, and used
/// to order competing gossip about the same node. Monotone per subject.
pub type Timestamp = u64;

/// Identifies a participant in the simulated network.
///
/// Ids are dense indices `0..num_nodes`, assigned once at topology
/// construction and used to index per-node state vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a node id from a raw index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// The id as a vector index.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
