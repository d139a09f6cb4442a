//! Change notifications emitted by the frame graph.
//!
//! Events are emitted when the graph mutates (edge upserted/removed, frame
//! removed) and handled by the transform resolver to evict cache entries
//! whose resolution path crossed the changed frames.
//!
//! Delivery is synchronous relative to the mutation: the event is in every
//! subscriber's channel before the mutating call returns, so a resolver that
//! drains its channel before reading can never observe a stale transform.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::graph::FrameId;

/// Events describing frame-graph mutations.
///
/// Only `"RT"` edges carry spatial transforms, but events fire for every
/// edge type; subscribers filter by `edge_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphEvent {
    /// An edge was inserted or its payload replaced
    EdgeUpserted {
        from: FrameId,
        to: FrameId,
        edge_type: String,
    },

    /// An edge was removed
    EdgeRemoved {
        from: FrameId,
        to: FrameId,
        edge_type: String,
    },

    /// A frame was removed (its incident edges emit `EdgeRemoved` separately)
    NodeRemoved { id: FrameId },
}

/// Fan-out event sender held by the graph.
///
/// Each subscriber gets its own unbounded channel; a dropped receiver is
/// silently skipped on emit.
#[derive(Debug, Default)]
pub struct GraphEventSender {
    senders: Vec<Sender<GraphEvent>>,
}

impl GraphEventSender {
    /// Create a sender with no subscribers (emit is a no-op)
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    /// Emit event to all subscribers (silent if a receiver was dropped)
    pub fn emit(&self, event: GraphEvent) {
        for tx in &self.senders {
            let _ = tx.send(event.clone());
        }
    }

    /// True if at least one subscriber is registered
    pub fn has_subscribers(&self) -> bool {
        !self.senders.is_empty()
    }
}
