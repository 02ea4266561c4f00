//! Simulation parameters.

use gossim_types::SimTime;

/// Configuration for a simulation run.
///
/// All parameters are integers; the defaults reproduce the reference
/// network of 1000 nodes with a 50/50 initial split.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of participants.
    pub num_nodes: usize,
    /// Nodes with id below this count invert the balance they observe
    /// before deciding, voting contrarily to what they see.
    pub malicious_nodes: usize,
    /// Supermajority percentage required to end the run. The run stops once
    /// either side holds strictly more than `num_nodes * consensus_percent / 100`
    /// nodes.
    pub consensus_percent: u32,
    /// Minimum end-to-core latency in ms (node to the network core).
    pub min_e2c_latency: SimTime,
    /// Maximum end-to-core latency in ms.
    pub max_e2c_latency: SimTime,
    /// Minimum core-to-core latency in ms (additional distance between far nodes).
    pub min_c2c_latency: SimTime,
    /// Maximum core-to-core latency in ms.
    pub max_c2c_latency: SimTime,
    /// Outbound links drawn per node. Links are mirrored, so the realized
    /// degree is roughly twice this.
    pub outbound_links: usize,
    /// Minimum trusted-set (UNL) size.
    pub unl_min: usize,
    /// Maximum trusted-set (UNL) size.
    pub unl_max: usize,
    /// Trusted-set observations required before a node will change its own
    /// position. Half of `unl_min` in the reference configuration.
    pub unl_thresh: usize,
    /// Delay in ms added to non-urgent sends so nearby updates can coalesce
    /// into one message.
    pub base_delay: SimTime,
    /// Votes a node gives its own current position: the observed balance
    /// must beat this before the node flips. Hysteresis against ties.
    pub self_weight: i64,
    /// Packets that may be in flight per link per direction. Further sends
    /// are pushed back by `total_latency / packets_on_wire`, modeling finite
    /// bandwidth.
    pub packets_on_wire: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_nodes: 1000,
            malicious_nodes: 15,
            consensus_percent: 80,
            min_e2c_latency: 5,
            max_e2c_latency: 50,
            min_c2c_latency: 5,
            max_c2c_latency: 200,
            outbound_links: 10,
            unl_min: 20,
            unl_max: 30,
            unl_thresh: 10,
            base_delay: 1,
            self_weight: 1,
            packets_on_wire: 3,
        }
    }
}

impl SimConfig {
    /// Node count one side must strictly exceed for the run to end.
    pub fn consensus_threshold(&self) -> usize {
        self.num_nodes * self.consensus_percent as usize / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold() {
        let config = SimConfig::default();
        assert_eq!(config.consensus_threshold(), 800);
    }

    #[test]
    fn test_threshold_uses_integer_division() {
        let config = SimConfig {
            num_nodes: 2,
            consensus_percent: 80,
            ..Default::default()
        };
        // 2 * 80 / 100 = 1, so consensus needs both nodes.
        assert_eq!(config.consensus_threshold(), 1);
    }
}
