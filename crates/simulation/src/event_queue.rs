//! Virtual-time event queue.

use crate::{Link, Message};
use gossim_types::SimTime;
use std::collections::BTreeMap;

/// Locates a still-queued message so its sender can rewrite it in place.
///
/// A handle is a `(delivery time, bucket slot)` pair resolved through the
/// queue, never a raw pointer. Slots are append-only and buckets are removed
/// whole at dispatch, so a handle stays valid exactly as long as its bucket
/// is queued; the owning link's editability window (which requires a future
/// send time, and latency is at least 1 ms) guarantees it is never resolved
/// after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHandle {
    recv_time: SimTime,
    slot: usize,
}

impl MessageHandle {
    pub(crate) fn at(recv_time: SimTime, slot: usize) -> Self {
        Self { recv_time, slot }
    }

    /// The delivery time of the bucket this handle points into.
    pub fn recv_time(self) -> SimTime {
        self.recv_time
    }
}

/// Time-ordered queue of in-flight messages.
///
/// Holds the virtual clock and a map from delivery timestamp to the bucket
/// of messages due at that instant. Buckets are dispatched in nondecreasing
/// time order and messages within a bucket in insertion order; both are hard
/// determinism requirements.
#[derive(Debug, Default)]
pub struct EventQueue {
    now: SimTime,
    buckets: BTreeMap<SimTime, Vec<Message>>,
}

impl EventQueue {
    /// Create an empty queue at time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in ms.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Delivery time of the earliest pending bucket.
    pub fn next_time(&self) -> Option<SimTime> {
        self.buckets.keys().next().copied()
    }

    /// Whether any messages are pending.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total messages pending across all buckets.
    pub fn pending_messages(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Queue `message` on `link`, leaving at `send_time`.
    ///
    /// Computes the delivery time from the link latency, appends the message
    /// to its bucket, and records the send window and handle on the link so
    /// the sender can keep editing the message until `send_time` passes.
    pub fn send(&mut self, link: &mut Link, message: Message, send_time: SimTime) {
        assert_eq!(
            message.to, link.to,
            "queued message destination must match its link"
        );
        debug_assert!(send_time >= self.now, "cannot send into the past");

        let recv_time = send_time + link.total_latency;
        let bucket = self.buckets.entry(recv_time).or_default();
        bucket.push(message);

        link.last_send_time = send_time;
        link.last_recv_time = recv_time;
        link.queued = Some(MessageHandle::at(recv_time, bucket.len() - 1));
    }

    /// Resolve a handle to its still-queued message.
    ///
    /// Returns `None` once the bucket has been dispatched.
    pub fn message_mut(&mut self, handle: MessageHandle) -> Option<&mut Message> {
        self.buckets
            .get_mut(&handle.recv_time)
            .and_then(|bucket| bucket.get_mut(handle.slot))
    }

    /// Remove and return the earliest bucket, advancing the clock to its
    /// delivery time.
    pub fn pop_bucket(&mut self) -> Option<(SimTime, Vec<Message>)> {
        let (time, bucket) = self.buckets.pop_first()?;
        debug_assert!(time >= self.now, "buckets must dispatch in time order");
        self.now = time;
        Some((time, bucket))
    }

    /// Iterate pending buckets in delivery order.
    pub fn buckets(&self) -> impl Iterator<Item = (SimTime, &[Message])> {
        self.buckets
            .iter()
            .map(|(&time, bucket)| (time, bucket.as_slice()))
    }

    #[cfg(test)]
    pub(crate) fn set_now(&mut self, now: SimTime) {
        self.now = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gossim_types::{NodeId, Position, PositionRecord};
    use std::collections::BTreeMap as Map;

    fn message(from: u32, to: u32, subject: u32, ts: u64) -> Message {
        Message::with_updates(
            NodeId::new(from),
            NodeId::new(to),
            &Map::from([(
                NodeId::new(subject),
                PositionRecord::new(NodeId::new(subject), ts, Position::Positive),
            )]),
        )
    }

    #[test]
    fn test_send_records_window_on_link() {
        let mut queue = EventQueue::new();
        let mut link = Link::new(NodeId::new(1), 10);

        queue.send(&mut link, message(0, 1, 2, 1), 5);

        assert_eq!(link.last_send_time, 5);
        assert_eq!(link.last_recv_time, 15);
        let handle = link.queued.expect("handle recorded");
        assert_eq!(handle.recv_time(), 15);
        assert_eq!(queue.pending_messages(), 1);
    }

    #[test]
    #[should_panic(expected = "destination must match")]
    fn test_send_rejects_mismatched_link() {
        let mut queue = EventQueue::new();
        let mut link = Link::new(NodeId::new(2), 10);
        queue.send(&mut link, message(0, 1, 3, 1), 0);
    }

    #[test]
    fn test_handle_resolves_until_dispatch() {
        let mut queue = EventQueue::new();
        let mut link = Link::new(NodeId::new(1), 10);
        queue.send(&mut link, message(0, 1, 2, 1), 0);
        let handle = link.queued.unwrap();

        assert!(queue.message_mut(handle).is_some());
        let (time, bucket) = queue.pop_bucket().unwrap();
        assert_eq!(time, 10);
        assert_eq!(bucket.len(), 1);
        assert!(queue.message_mut(handle).is_none());
    }

    #[test]
    fn test_buckets_pop_in_time_order() {
        let mut queue = EventQueue::new();
        let mut near = Link::new(NodeId::new(1), 5);
        let mut far = Link::new(NodeId::new(1), 50);

        queue.send(&mut far, message(0, 1, 2, 1), 0);
        queue.send(&mut near, message(0, 1, 3, 1), 0);

        assert_eq!(queue.next_time(), Some(5));
        assert_eq!(queue.pop_bucket().unwrap().0, 5);
        assert_eq!(queue.pop_bucket().unwrap().0, 50);
        assert!(queue.pop_bucket().is_none());
        assert_eq!(queue.now(), 50);
    }

    #[test]
    fn test_same_bucket_preserves_enqueue_order() {
        let mut queue = EventQueue::new();
        let mut first = Link::new(NodeId::new(1), 10);
        let mut second = Link::new(NodeId::new(1), 10);

        queue.send(&mut first, message(2, 1, 4, 1), 0);
        queue.send(&mut second, message(3, 1, 5, 1), 0);

        let (_, bucket) = queue.pop_bucket().unwrap();
        assert_eq!(bucket[0].from, NodeId::new(2));
        assert_eq!(bucket[1].from, NodeId::new(3));
    }

    #[test]
    fn test_handles_into_shared_bucket_stay_distinct() {
        let mut queue = EventQueue::new();
        let mut first = Link::new(NodeId::new(1), 10);
        let mut second = Link::new(NodeId::new(1), 10);

        queue.send(&mut first, message(2, 1, 4, 1), 0);
        queue.send(&mut second, message(3, 1, 5, 1), 0);

        let handle_a = first.queued.unwrap();
        let handle_b = second.queued.unwrap();
        assert_ne!(handle_a, handle_b);
        assert_eq!(queue.message_mut(handle_a).unwrap().from, NodeId::new(2));
        assert_eq!(queue.message_mut(handle_b).unwrap().from, NodeId::new(3));
    }
}
