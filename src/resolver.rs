//! Transform resolver: the public entry point.
//!
//! Wraps the composer with the transform cache, subscribes to graph change
//! notifications, and offers the derived operations (point transform, 6-DoF
//! pose transform).
//!
//! Event handling: the resolver drains its event channel at the start of
//! every public operation, so any mutation emitted before the call is
//! applied to the cache before the lookup. RT edge events invalidate both
//! endpoints (transitively evicting every cached pair whose path crossed
//! either); node removal invalidates the removed frame; other edge types
//! cannot affect spatial composition and are ignored.
//!
//! All failures are graph-state conditions (unknown frame, missing edge,
//! disjoint trees) and surface as an absent result.

use crossbeam_channel::Receiver;
use glam::{DMat4, DQuat, DVec3, EulerRot};
use log::debug;

use crate::cache::TransformCache;
use crate::compose::compose;
use crate::events::GraphEvent;
use crate::graph::{FrameId, FrameLookup, FrameRef, RT_EDGE};

/// Translation xyz followed by intrinsic-XYZ Euler angles, radians
pub type Pose6 = [f64; 6];

/// Cache-backed resolver over a frame graph.
///
/// The graph is passed into each operation rather than owned; the resolver
/// only holds ids and names, never frames.
#[derive(Debug, Default)]
pub struct TransformResolver {
    cache: TransformCache,
    events: Option<Receiver<GraphEvent>>,
}

impl TransformResolver {
    /// Resolver without an event subscription.
    ///
    /// Caller is responsible for invalidation via
    /// [`invalidate_frame`](Self::invalidate_frame) / [`handle_event`](Self::handle_event).
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver fed by a graph event channel
    /// (see [`FrameGraph::subscribe`](crate::graph::FrameGraph::subscribe)).
    pub fn with_events(events: Receiver<GraphEvent>) -> Self {
        Self {
            cache: TransformCache::new(),
            events: Some(events),
        }
    }

    /// Transform mapping a point expressed in `orig`'s frame into `dest`'s
    /// frame. Cache hit returns immediately; a miss walks the graph, caches
    /// the result and indexes it under every frame on the path.
    pub fn transformation_matrix<G: FrameLookup>(
        &mut self,
        graph: &G,
        dest: impl Into<FrameRef>,
        orig: impl Into<FrameRef>,
    ) -> Option<DMat4> {
        self.process_events();

        let key = (dest.into(), orig.into());
        if let Some(cached) = self.cache.get(&key) {
            debug!("transform cache hit: {key:?}");
            return Some(cached);
        }

        let composed = compose(graph, &key.0, &key.1)?;
        self.cache.insert(key, composed.matrix, &composed.touched);
        Some(composed.matrix)
    }

    /// Re-express `point` (given in `orig`'s frame) in `dest`'s frame
    pub fn transform_point<G: FrameLookup>(
        &mut self,
        graph: &G,
        dest: impl Into<FrameRef>,
        point: DVec3,
        orig: impl Into<FrameRef>,
    ) -> Option<DVec3> {
        let tm = self.transformation_matrix(graph, dest, orig)?;
        Some(tm.transform_point3(point))
    }

    /// Position of `orig`'s frame origin expressed in `dest`'s frame
    pub fn frame_position<G: FrameLookup>(
        &mut self,
        graph: &G,
        dest: impl Into<FrameRef>,
        orig: impl Into<FrameRef>,
    ) -> Option<DVec3> {
        self.transform_point(graph, dest, DVec3::ZERO, orig)
    }

    /// Re-express a 6-DoF pose (given in `orig`'s frame) in `dest`'s frame.
    ///
    /// The first three components are transformed as a point; the last three
    /// are intrinsic-XYZ Euler angles, composed with the resolved rotation
    /// and re-extracted in the same order.
    pub fn transform_pose6d<G: FrameLookup>(
        &mut self,
        graph: &G,
        dest: impl Into<FrameRef>,
        pose: Pose6,
        orig: impl Into<FrameRef>,
    ) -> Option<Pose6> {
        let tm = self.transformation_matrix(graph, dest, orig)?;

        let position = tm.transform_point3(DVec3::new(pose[0], pose[1], pose[2]));
        let local = DQuat::from_euler(EulerRot::XYZ, pose[3], pose[4], pose[5]);
        let (rx, ry, rz) = (DQuat::from_mat4(&tm) * local).to_euler(EulerRot::XYZ);

        Some([position.x, position.y, position.z, rx, ry, rz])
    }

    /// Pose of `orig`'s frame (zero pose) expressed in `dest`'s frame
    pub fn frame_pose6d<G: FrameLookup>(
        &mut self,
        graph: &G,
        dest: impl Into<FrameRef>,
        orig: impl Into<FrameRef>,
    ) -> Option<Pose6> {
        self.transform_pose6d(graph, dest, [0.0; 6], orig)
    }

    /// Drain pending graph events and apply the resulting invalidations.
    ///
    /// Called implicitly by every resolving operation; exposed for callers
    /// that want eager eviction. Returns the number of events handled.
    pub fn process_events(&mut self) -> usize {
        let Some(rx) = &self.events else {
            return 0;
        };
        let pending: Vec<GraphEvent> = rx.try_iter().collect();
        for event in &pending {
            self.handle_event(event);
        }
        pending.len()
    }

    /// Apply a single change notification to the cache
    pub fn handle_event(&mut self, event: &GraphEvent) {
        match event {
            GraphEvent::EdgeUpserted {
                from,
                to,
                edge_type,
            }
            | GraphEvent::EdgeRemoved {
                from,
                to,
                edge_type,
            } => {
                if edge_type == RT_EDGE {
                    self.cache.invalidate(*from);
                    self.cache.invalidate(*to);
                }
            }
            GraphEvent::NodeRemoved { id } => {
                self.cache.invalidate(*id);
            }
        }
    }

    /// Evict every cached transform whose path touched `id`
    pub fn invalidate_frame(&mut self, id: FrameId) -> usize {
        self.cache.invalidate(id)
    }

    /// Drop all cached transforms
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of cached transforms
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Cache hit/miss counters
    pub fn cache_stats(&self) -> &crate::cache::CacheStats {
        self.cache.stats()
    }
}
