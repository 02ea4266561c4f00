//! Gossip messages and their in-place edit operations.

use gossim_types::{NodeId, PositionRecord};
use std::collections::BTreeMap;

/// A message from one node to another, carrying the positions taken.
///
/// `data` maps each subject node to the freshest `(ts, position)` pair the
/// sender wants the recipient to learn. A message never carries an entry
/// about its own recipient; [`Message::with_updates`] and [`Message::merge`]
/// both enforce this.
///
/// While a message sits in the event queue it stays editable: the sender may
/// [`merge`](Self::merge) newer positions into it (coalescing) or
/// [`suppress`](Self::suppress) entries the recipient has since proven it
/// already knows. A message suppressed down to nothing still occupies its
/// queue slot and is reconciled at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sending node.
    pub from: NodeId,
    /// Receiving node.
    pub to: NodeId,
    data: BTreeMap<NodeId, PositionRecord>,
}

impl Message {
    /// Create an empty message.
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self {
            from,
            to,
            data: BTreeMap::new(),
        }
    }

    /// Create a message carrying `updates`, minus any entry about the
    /// recipient itself.
    pub fn with_updates(
        from: NodeId,
        to: NodeId,
        updates: &BTreeMap<NodeId, PositionRecord>,
    ) -> Self {
        let mut message = Self::new(from, to);
        message.merge(updates);
        message
    }

    /// The positions this message carries.
    pub fn data(&self) -> &BTreeMap<NodeId, PositionRecord> {
        &self.data
    }

    /// Whether every entry has been suppressed away.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of subjects carried.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Merge `updates` into this message in place.
    ///
    /// For each subject other than the recipient: a strictly fresher record
    /// overwrites the queued one, an absent subject is inserted, and a stale
    /// record is ignored.
    pub fn merge(&mut self, updates: &BTreeMap<NodeId, PositionRecord>) {
        for (&subject, record) in updates {
            if subject == self.to {
                // Don't tell a node about itself.
                continue;
            }
            match self.data.get_mut(&subject) {
                Some(queued) => {
                    if record.ts > queued.ts {
                        *queued = *record;
                    }
                }
                None => {
                    self.data.insert(subject, *record);
                }
            }
        }
    }

    /// Drop entries the recipient has just proven it already knows.
    ///
    /// `received` is the data of a message that arrived *from* this
    /// message's recipient. Any queued entry whose timestamp is not newer
    /// than the received one is erased. Returns the number of entries
    /// erased; the message may become empty.
    pub fn suppress(&mut self, received: &BTreeMap<NodeId, PositionRecord>) -> usize {
        let mut erased = 0;
        for (&subject, record) in received {
            if let Some(queued) = self.data.get(&subject) {
                if record.ts >= queued.ts {
                    self.data.remove(&subject);
                    erased += 1;
                }
            }
        }
        erased
    }
}
