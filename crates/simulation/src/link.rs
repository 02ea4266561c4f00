//! Directed edges between nodes.

use crate::event_queue::MessageHandle;
use gossim_types::{NodeId, SimTime};

/// A directed edge from one node to a peer.
///
/// Each link remembers the most recent message it placed in the event queue.
/// Until that message's send time has passed it is still "ours" to rewrite:
/// new positions coalesce into it and positions the peer proves it knows are
/// suppressed out of it. Once the send time passes, the message is on the
/// wire and a fresh send is required.
///
/// Invariant: whenever `queued` is `Some`, `last_recv_time ==
/// last_send_time + total_latency`.
#[derive(Debug, Clone)]
pub struct Link {
    /// Destination node.
    pub to: NodeId,
    /// One-way latency in ms, fixed at construction. Always at least 1, so
    /// a queued message's delivery bucket strictly follows its send time.
    pub total_latency: SimTime,
    /// Send time of the most recently queued message (0 if none yet).
    pub last_send_time: SimTime,
    /// Delivery time of the most recently queued message (0 if none yet).
    pub last_recv_time: SimTime,
    /// Handle to the still-queued message, if any.
    pub queued: Option<MessageHandle>,
}

impl Link {
    /// Create a link to `to` with the given one-way latency.
    pub fn new(to: NodeId, total_latency: SimTime) -> Self {
        debug_assert!(total_latency >= 1, "link latency must be at least 1 ms");
        Self {
            to,
            total_latency,
            last_send_time: 0,
            last_recv_time: 0,
            queued: None,
        }
    }

    /// Whether the queued message can still be rewritten in place.
    pub fn editable_at(&self, now: SimTime) -> bool {
        self.queued.is_some() && self.last_send_time > now
    }

    /// Whether the queued message can still have entries suppressed.
    ///
    /// Note the `>=` here against the strict `>` of [`editable_at`]: a
    /// message handed to the queue at exactly `now` is past coalescing but
    /// the peer's own traffic may still prune it.
    pub fn suppressible_at(&self, now: SimTime) -> bool {
        self.queued.is_some() && self.last_send_time >= now
    }

    /// Whether a packet would still be in flight at `send_time`.
    pub fn busy_at(&self, send_time: SimTime) -> bool {
        self.last_recv_time > send_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_with_queued(send_time: SimTime, latency: SimTime) -> Link {
        let mut link = Link::new(NodeId::new(1), latency);
        link.last_send_time = send_time;
        link.last_recv_time = send_time + latency;
        link.queued = Some(MessageHandle::at(send_time + latency, 0));
        link
    }

    #[test]
    fn test_fresh_link_is_not_editable() {
        let link = Link::new(NodeId::new(1), 10);
        assert!(!link.editable_at(0));
        assert!(!link.suppressible_at(0));
    }

    #[test]
    fn test_editable_requires_future_send_time() {
        let link = link_with_queued(5, 10);
        assert!(link.editable_at(4));
        assert!(!link.editable_at(5));
        assert!(!link.editable_at(6));
    }

    #[test]
    fn test_suppressible_includes_the_send_instant() {
        let link = link_with_queued(5, 10);
        assert!(link.suppressible_at(4));
        assert!(link.suppressible_at(5));
        assert!(!link.suppressible_at(6));
    }

    #[test]
    fn test_busy_while_packet_in_flight() {
        let link = link_with_queued(5, 10);
        assert!(link.busy_at(6));
        assert!(link.busy_at(14));
        assert!(!link.busy_at(15));
        assert!(!link.busy_at(20));
    }
}
