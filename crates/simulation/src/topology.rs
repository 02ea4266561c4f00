//! Network topology: who links to whom, who trusts whom.
//!
//! The engine treats topology as an input: an immutable graph plus a
//! per-node trusted set, built once before the run. [`Topology::random`]
//! reproduces the reference construction; tests and experiments can also
//! assemble a [`Topology`] by hand and validate it.

use crate::SimConfig;
use gossim_types::{NodeId, Position, SimTime};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// One directed edge in a topology description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSpec {
    /// Destination node.
    pub to: NodeId,
    /// One-way latency in ms.
    pub total_latency: SimTime,
}

/// Per-node description: starting position, trusted set, outbound edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// Position the node holds at time 0.
    pub initial_position: Position,
    /// Trusted set (UNL): the peers whose positions count toward this
    /// node's own decision. Not necessarily symmetric.
    pub unl: Vec<NodeId>,
    /// Outbound links, in send order.
    pub links: Vec<LinkSpec>,
}

/// A complete, immutable network description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub nodes: Vec<NodeSpec>,
}

/// Rejected topology descriptions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("node {node} links to itself")]
    SelfLink { node: NodeId },
    #[error("node {node} has duplicate links to {peer}")]
    DuplicateLink { node: NodeId, peer: NodeId },
    #[error("link {node} -> {peer} has zero latency")]
    ZeroLatency { node: NodeId, peer: NodeId },
    #[error("link {node} -> {peer} has no mirror with matching latency")]
    AsymmetricLink { node: NodeId, peer: NodeId },
    #[error("node {node} trusts itself")]
    SelfTrust { node: NodeId },
    #[error("node {node} trusts {peer} more than once")]
    DuplicateTrust { node: NodeId, peer: NodeId },
    #[error("node {node} references unknown node {peer}")]
    UnknownPeer { node: NodeId, peer: NodeId },
    #[error("node {node} has no initial position")]
    UndecidedStart { node: NodeId },
    #[error("{required} distinct peers required per node but only {available} available")]
    NotEnoughPeers { required: usize, available: usize },
}

impl Topology {
    /// Number of nodes described.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the topology is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build the reference random topology.
    ///
    /// RNG consumption order is fixed and must not be reordered, or runs
    /// stop being reproducible across versions for a given seed:
    ///
    /// 1. per node: end-to-core latency, then trusted-set size, then
    ///    rejection-sampled trusted-set members;
    /// 2. per node: rejection-sampled link peers, with one core-to-core
    ///    latency draw per *accepted* peer.
    ///
    /// Initial positions alternate by id parity (even ids negative, odd ids
    /// positive) and consume no randomness. Links are mirrored onto both
    /// endpoints with a shared latency of `e2c(a) + e2c(b) + c2c`.
    pub fn random(config: &SimConfig, rng: &mut ChaCha8Rng) -> Result<Self, TopologyError> {
        let n = config.num_nodes;
        let available = n.saturating_sub(1);
        if config.outbound_links > available {
            return Err(TopologyError::NotEnoughPeers {
                required: config.outbound_links,
                available,
            });
        }
        if config.unl_max > available {
            return Err(TopologyError::NotEnoughPeers {
                required: config.unl_max,
                available,
            });
        }

        let mut e2c: Vec<SimTime> = Vec::with_capacity(n);
        let mut nodes: Vec<NodeSpec> = Vec::with_capacity(n);

        for i in 0..n {
            e2c.push(rng.gen_range(config.min_e2c_latency..=config.max_e2c_latency));

            let initial_position = if i % 2 == 1 {
                Position::Positive
            } else {
                Position::Negative
            };

            let unl_size = rng.gen_range(config.unl_min..=config.unl_max);
            let mut unl: Vec<NodeId> = Vec::with_capacity(unl_size);
            while unl.len() < unl_size {
                let candidate = NodeId::new(rng.gen_range(0..n) as u32);
                if candidate.as_usize() != i && !unl.contains(&candidate) {
                    unl.push(candidate);
                }
            }

            nodes.push(NodeSpec {
                initial_position,
                unl,
                links: Vec::new(),
            });
        }

        for i in 0..n {
            let mut remaining = config.outbound_links;
            while remaining > 0 {
                let peer = rng.gen_range(0..n);
                let already_linked = nodes[i].links.iter().any(|link| link.to.as_usize() == peer);
                if peer != i && !already_linked {
                    let total_latency = e2c[i]
                        + e2c[peer]
                        + rng.gen_range(config.min_c2c_latency..=config.max_c2c_latency);
                    nodes[i].links.push(LinkSpec {
                        to: NodeId::new(peer as u32),
                        total_latency,
                    });
                    nodes[peer].links.push(LinkSpec {
                        to: NodeId::new(i as u32),
                        total_latency,
                    });
                    remaining -= 1;
                }
            }
        }

        Ok(Self { nodes })
    }

    /// Check every structural invariant of the description.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let n = self.nodes.len();
        for (index, spec) in self.nodes.iter().enumerate() {
            let node = NodeId::new(index as u32);

            if !spec.initial_position.is_known() {
                return Err(TopologyError::UndecidedStart { node });
            }

            for (i, link) in spec.links.iter().enumerate() {
                if link.to == node {
                    return Err(TopologyError::SelfLink { node });
                }
                if link.to.as_usize() >= n {
                    return Err(TopologyError::UnknownPeer { node, peer: link.to });
                }
                if link.total_latency == 0 {
                    return Err(TopologyError::ZeroLatency { node, peer: link.to });
                }
                if spec.links[..i].iter().any(|other| other.to == link.to) {
                    return Err(TopologyError::DuplicateLink { node, peer: link.to });
                }
                let mirrored = self.nodes[link.to.as_usize()]
                    .links
                    .iter()
                    .any(|back| back.to == node && back.total_latency == link.total_latency);
                if !mirrored {
                    return Err(TopologyError::AsymmetricLink { node, peer: link.to });
                }
            }

            for (i, &peer) in spec.unl.iter().enumerate() {
                if peer == node {
                    return Err(TopologyError::SelfTrust { node });
                }
                if peer.as_usize() >= n {
                    return Err(TopologyError::UnknownPeer { node, peer });
                }
                if spec.unl[..i].contains(&peer) {
                    return Err(TopologyError::DuplicateTrust { node, peer });
                }
            }
        }
        Ok(())
    }
}

/// Build a fully connected topology with one latency everywhere and every
/// node trusting all others. Small deterministic networks for tests.
pub fn full_mesh(num_nodes: usize, latency: SimTime) -> Topology {
    let nodes = (0..num_nodes)
        .map(|i| {
            let others = || {
                (0..num_nodes)
                    .filter(|&j| j != i)
                    .map(|j| NodeId::new(j as u32))
            };
            NodeSpec {
                initial_position: if i % 2 == 1 {
                    Position::Positive
                } else {
                    Position::Negative
                },
                unl: others().collect(),
                links: others()
                    .map(|to| LinkSpec {
                        to,
                        total_latency: latency,
                    })
                    .collect(),
            }
        })
        .collect();
    Topology { nodes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn small_config() -> SimConfig {
        SimConfig {
            num_nodes: 40,
            outbound_links: 4,
            unl_min: 5,
            unl_max: 8,
            unl_thresh: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_random_topology_is_valid() {
        let config = small_config();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let topology = Topology::random(&config, &mut rng).unwrap();

        topology.validate().unwrap();
        assert_eq!(topology.len(), 40);
        for (i, spec) in topology.nodes.iter().enumerate() {
            assert!(spec.links.len() >= config.outbound_links);
            assert!(spec.unl.len() >= config.unl_min);
            assert!(spec.unl.len() <= config.unl_max);
            let expected = if i % 2 == 1 {
                Position::Positive
            } else {
                Position::Negative
            };
            assert_eq!(spec.initial_position, expected);
        }
    }

    #[test]
    fn test_random_topology_is_deterministic() {
        let config = small_config();
        let mut rng1 = ChaCha8Rng::seed_from_u64(7);
        let mut rng2 = ChaCha8Rng::seed_from_u64(7);

        let a = Topology::random(&config, &mut rng1).unwrap();
        let b = Topology::random(&config, &mut rng2).unwrap();
        assert_eq!(a, b, "same seed must reproduce the same topology");

        let mut rng3 = ChaCha8Rng::seed_from_u64(8);
        let c = Topology::random(&config, &mut rng3).unwrap();
        assert_ne!(a, c, "different seeds should give different graphs");
    }

    #[test]
    fn test_random_topology_latencies_are_symmetric_sums() {
        let config = small_config();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let topology = Topology::random(&config, &mut rng).unwrap();

        let floor = 2 * config.min_e2c_latency + config.min_c2c_latency;
        let ceiling = 2 * config.max_e2c_latency + config.max_c2c_latency;
        for spec in &topology.nodes {
            for link in &spec.links {
                assert!(link.total_latency >= floor);
                assert!(link.total_latency <= ceiling);
            }
        }
    }

    #[test]
    fn test_random_rejects_impossible_degree() {
        let config = SimConfig {
            num_nodes: 4,
            outbound_links: 10,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            Topology::random(&config, &mut rng),
            Err(TopologyError::NotEnoughPeers { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_self_link() {
        let mut topology = full_mesh(3, 10);
        topology.nodes[1].links[0].to = NodeId::new(1);
        assert!(matches!(
            topology.validate(),
            Err(TopologyError::SelfLink { .. }) | Err(TopologyError::AsymmetricLink { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_latency() {
        let mut topology = full_mesh(3, 10);
        topology.nodes[0].links[0].total_latency = 0;
        assert!(matches!(
            topology.validate(),
            Err(TopologyError::ZeroLatency { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_mirror() {
        let mut topology = full_mesh(3, 10);
        topology.nodes[2].links.clear();
        assert!(matches!(
            topology.validate(),
            Err(TopologyError::AsymmetricLink { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_latency_mismatch() {
        let mut topology = full_mesh(3, 10);
        topology.nodes[0].links[0].total_latency = 11;
        assert!(matches!(
            topology.validate(),
            Err(TopologyError::AsymmetricLink { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_self_trust() {
        let mut topology = full_mesh(3, 10);
        topology.nodes[0].unl.push(NodeId::new(0));
        assert!(matches!(
            topology.validate(),
            Err(TopologyError::SelfTrust { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_trust() {
        let mut topology = full_mesh(3, 10);
        topology.nodes[0].unl.push(NodeId::new(1));
        assert!(matches!(
            topology.validate(),
            Err(TopologyError::DuplicateTrust { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_peer() {
        let mut topology = full_mesh(3, 10);
        topology.nodes[0].unl.push(NodeId::new(9));
        assert!(matches!(
            topology.validate(),
            Err(TopologyError::UnknownPeer { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_position() {
        let mut topology = full_mesh(3, 10);
        topology.nodes[1].initial_position = Position::Unknown;
        assert!(matches!(
            topology.validate(),
            Err(TopologyError::UndecidedStart { .. })
        ));
    }
}
