//! In-memory frame graph: a tree of coordinate frames with typed edges.
//!
//! Frames carry a stable integer id, a unique name, a hierarchy level
//! (root = 0) and an optional parent link. Edges are directed and keyed by
//! `(from, to, type)`; only `"RT"` edges carry a rigid rotation-translation
//! matrix, other types are semantic tags with no spatial meaning.
//!
//! Every mutation emits a [`GraphEvent`](crate::events::GraphEvent) before
//! returning, which is what drives cache invalidation in the resolver.
//!
//! The read surface consumed by the composer/resolver is the [`FrameLookup`]
//! trait, so alternative storages (shared, persistent) can plug in as long
//! as they guarantee tree shape for RT edges.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Receiver;
use glam::DMat4;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::events::{GraphEvent, GraphEventSender};

/// Stable frame identifier
pub type FrameId = u64;

/// Edge type carrying a spatial transform; all other types are ignored by
/// the resolver.
pub const RT_EDGE: &str = "RT";

/// Caller-facing frame reference: by id or by unique name.
///
/// Cache keys are built from the reference as given, so the same frame pair
/// addressed by name and by id occupies distinct cache entries. Both are
/// indexed under the same frame ids and invalidated together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameRef {
    Id(FrameId),
    Name(String),
}

impl From<FrameId> for FrameRef {
    fn from(id: FrameId) -> Self {
        FrameRef::Id(id)
    }
}

impl From<&str> for FrameRef {
    fn from(name: &str) -> Self {
        FrameRef::Name(name.to_owned())
    }
}

impl From<String> for FrameRef {
    fn from(name: String) -> Self {
        FrameRef::Name(name)
    }
}

/// A coordinate frame node
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    id: FrameId,
    name: String,
    level: u32,
    parent: Option<FrameId>,
}

impl Frame {
    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hierarchy level, root = 0
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Parent frame id, `None` for a root
    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }
}

/// A directed edge between two frames
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    from: FrameId,
    to: FrameId,
    edge_type: String,
    rt: Option<DMat4>,
}

impl Edge {
    pub fn from_id(&self) -> FrameId {
        self.from
    }

    pub fn to_id(&self) -> FrameId {
        self.to
    }

    pub fn edge_type(&self) -> &str {
        &self.edge_type
    }

    /// Rigid transform payload; `Some` only for `"RT"` edges
    pub fn rt(&self) -> Option<DMat4> {
        self.rt
    }
}

/// Lookup counters for monitoring traversal cost.
///
/// Tests use these to prove that a cache hit performs no graph traversal.
#[derive(Debug, Default)]
pub struct GraphStats {
    frame_lookups: AtomicU64,
    edge_lookups: AtomicU64,
}

impl GraphStats {
    pub fn record_frame_lookup(&self) {
        self.frame_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_edge_lookup(&self) {
        self.edge_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_lookups(&self) -> u64 {
        self.frame_lookups.load(Ordering::Relaxed)
    }

    pub fn edge_lookups(&self) -> u64 {
        self.edge_lookups.load(Ordering::Relaxed)
    }

    /// Total lookups of any kind
    pub fn total(&self) -> u64 {
        self.frame_lookups() + self.edge_lookups()
    }

    pub fn reset(&self) {
        self.frame_lookups.store(0, Ordering::Relaxed);
        self.edge_lookups.store(0, Ordering::Relaxed);
    }
}

/// Read surface the composer and resolver consume.
///
/// Implementations must guarantee tree shape for RT edges: every non-root
/// frame has exactly one parent reachable via exactly one RT edge.
pub trait FrameLookup {
    /// Resolve a frame by id or name
    fn get_frame(&self, frame: &FrameRef) -> Option<&Frame>;

    /// Parent frame of `frame`, `None` for roots or dangling parent links
    fn parent_frame(&self, frame: &Frame) -> Option<&Frame>;

    /// RT edge from `parent` down to `child`
    fn rt_edge(&self, parent: FrameId, child: FrameId) -> Option<&Edge>;

    /// Transform payload of an edge, `None` for non-RT edges
    fn edge_transform(&self, edge: &Edge) -> Option<DMat4>;

    /// Hierarchy level of `frame`, root = 0
    fn hierarchy_level(&self, frame: &Frame) -> Option<u32> {
        Some(frame.level())
    }
}

/// In-memory frame graph store
#[derive(Debug, Default)]
pub struct FrameGraph {
    frames: HashMap<FrameId, Frame>,
    names: HashMap<String, FrameId>,
    edges: IndexMap<(FrameId, FrameId, String), Edge>,
    next_id: FrameId,
    events: GraphEventSender,
    stats: GraphStats,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to change notifications.
    ///
    /// Every mutation emits into all subscriber channels before the mutating
    /// call returns.
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        self.events.subscribe()
    }

    /// Lookup counters (traversal cost observability)
    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Id of the frame with `name`, if any
    pub fn frame_id(&self, name: &str) -> Option<FrameId> {
        self.names.get(name).copied()
    }

    /// Add a root frame (level 0, no parent). Fails on duplicate name.
    pub fn add_root(&mut self, name: &str) -> Option<FrameId> {
        self.add_frame(name, 0, None)
    }

    /// Add a child frame under `parent` with the RT transform `rt`
    /// (child pose expressed in the parent frame).
    ///
    /// Level is `parent.level + 1`; emits `EdgeUpserted` for the new RT edge.
    /// Fails if the parent is unknown or the name is taken.
    pub fn add_child(&mut self, parent: FrameId, name: &str, rt: DMat4) -> Option<FrameId> {
        let parent_level = match self.frames.get(&parent) {
            Some(p) => p.level,
            None => {
                warn!("add_child: unknown parent frame {parent}");
                return None;
            }
        };
        let id = self.add_frame(name, parent_level + 1, Some(parent))?;
        self.edges.insert(
            (parent, id, RT_EDGE.to_owned()),
            Edge {
                from: parent,
                to: id,
                edge_type: RT_EDGE.to_owned(),
                rt: Some(rt),
            },
        );
        self.events.emit(GraphEvent::EdgeUpserted {
            from: parent,
            to: id,
            edge_type: RT_EDGE.to_owned(),
        });
        Some(id)
    }

    /// Insert or replace the RT edge from `parent` to `child`.
    ///
    /// `child` must already be linked to `parent` in the tree; emits
    /// `EdgeUpserted`, which invalidates every cached transform whose path
    /// touched either endpoint.
    pub fn upsert_rt(&mut self, parent: FrameId, child: FrameId, rt: DMat4) -> bool {
        match self.frames.get(&child) {
            Some(c) if c.parent == Some(parent) => {}
            Some(_) => {
                warn!("upsert_rt: {child} is not a child of {parent}");
                return false;
            }
            None => {
                warn!("upsert_rt: unknown frame {child}");
                return false;
            }
        }
        self.edges.insert(
            (parent, child, RT_EDGE.to_owned()),
            Edge {
                from: parent,
                to: child,
                edge_type: RT_EDGE.to_owned(),
                rt: Some(rt),
            },
        );
        self.events.emit(GraphEvent::EdgeUpserted {
            from: parent,
            to: child,
            edge_type: RT_EDGE.to_owned(),
        });
        true
    }

    /// Insert or replace a semantic (non-RT) edge.
    ///
    /// RT edges carry a matrix and must go through [`upsert_rt`](Self::upsert_rt).
    pub fn upsert_edge(&mut self, from: FrameId, to: FrameId, edge_type: &str) -> bool {
        if edge_type == RT_EDGE {
            warn!("upsert_edge: RT edges need a transform, use upsert_rt");
            return false;
        }
        if !self.frames.contains_key(&from) || !self.frames.contains_key(&to) {
            warn!("upsert_edge: unknown endpoint {from} -> {to}");
            return false;
        }
        self.edges.insert(
            (from, to, edge_type.to_owned()),
            Edge {
                from,
                to,
                edge_type: edge_type.to_owned(),
                rt: None,
            },
        );
        self.events.emit(GraphEvent::EdgeUpserted {
            from,
            to,
            edge_type: edge_type.to_owned(),
        });
        true
    }

    /// Remove an edge; emits `EdgeRemoved`
    pub fn remove_edge(&mut self, from: FrameId, to: FrameId, edge_type: &str) -> bool {
        if self
            .edges
            .shift_remove(&(from, to, edge_type.to_owned()))
            .is_none()
        {
            return false;
        }
        self.events.emit(GraphEvent::EdgeRemoved {
            from,
            to,
            edge_type: edge_type.to_owned(),
        });
        true
    }

    /// Remove a frame together with its incident edges.
    ///
    /// Emits `EdgeRemoved` for each incident edge, then `NodeRemoved`.
    /// Descendants keep their parent link and become unresolvable until
    /// re-attached.
    pub fn remove_frame(&mut self, id: FrameId) -> bool {
        let Some(frame) = self.frames.remove(&id) else {
            return false;
        };
        self.names.remove(&frame.name);

        let incident: Vec<(FrameId, FrameId, String)> = self
            .edges
            .keys()
            .filter(|(from, to, _)| *from == id || *to == id)
            .cloned()
            .collect();
        for key in incident {
            self.edges.shift_remove(&key);
            let (from, to, edge_type) = key;
            self.events.emit(GraphEvent::EdgeRemoved {
                from,
                to,
                edge_type,
            });
        }

        self.events.emit(GraphEvent::NodeRemoved { id });
        debug!("removed frame {id} ({})", frame.name);
        true
    }

    fn add_frame(&mut self, name: &str, level: u32, parent: Option<FrameId>) -> Option<FrameId> {
        if self.names.contains_key(name) {
            warn!("add_frame: name '{name}' already taken");
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.frames.insert(
            id,
            Frame {
                id,
                name: name.to_owned(),
                level,
                parent,
            },
        );
        self.names.insert(name.to_owned(), id);
        Some(id)
    }
}

impl FrameLookup for FrameGraph {
    fn get_frame(&self, frame: &FrameRef) -> Option<&Frame> {
        self.stats.record_frame_lookup();
        match frame {
            FrameRef::Id(id) => self.frames.get(id),
            FrameRef::Name(name) => self.names.get(name).and_then(|id| self.frames.get(id)),
        }
    }

    fn parent_frame(&self, frame: &Frame) -> Option<&Frame> {
        self.stats.record_frame_lookup();
        frame.parent.and_then(|id| self.frames.get(&id))
    }

    fn rt_edge(&self, parent: FrameId, child: FrameId) -> Option<&Edge> {
        self.stats.record_edge_lookup();
        self.edges.get(&(parent, child, RT_EDGE.to_owned()))
    }

    fn edge_transform(&self, edge: &Edge) -> Option<DMat4> {
        edge.rt
    }
}
