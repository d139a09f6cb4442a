//! frametree - hierarchical frame-transform resolver with change-driven caching
//!
//! A scene is a tree of coordinate frames whose edges carry rigid
//! rotation-translation transforms (child pose expressed in the parent
//! frame). Asking for the transform between two frames walks both up to
//! their common ancestor, composes the edge matrices, and caches the result
//! keyed by the `(destination, origin)` pair. Graph mutations emit change
//! events that evict exactly the cache entries whose resolution path touched
//! the changed frames — never stale data, never a full flush.
//!
//! ```
//! use frametree::{FrameGraph, TransformResolver};
//! use glam::{DMat4, DVec3};
//!
//! let mut graph = FrameGraph::new();
//! let world = graph.add_root("world").unwrap();
//! let robot = graph
//!     .add_child(world, "robot", DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0)))
//!     .unwrap();
//!
//! let mut resolver = TransformResolver::with_events(graph.subscribe());
//! let pos = resolver.frame_position(&graph, "world", "robot").unwrap();
//! assert_eq!(pos, DVec3::new(1.0, 0.0, 0.0));
//!
//! // Moving the robot invalidates every cached transform through it
//! graph.upsert_rt(world, robot, DMat4::from_translation(DVec3::new(2.0, 0.0, 0.0)));
//! let pos = resolver.frame_position(&graph, "world", "robot").unwrap();
//! assert_eq!(pos, DVec3::new(2.0, 0.0, 0.0));
//! ```

pub mod cache;
pub mod compose;
pub mod events;
pub mod graph;
pub mod resolver;

pub use cache::{CacheStats, TransformCache, TransformKey};
pub use compose::{compose, Composed};
pub use events::{GraphEvent, GraphEventSender};
pub use graph::{Edge, Frame, FrameGraph, FrameId, FrameLookup, FrameRef, GraphStats, RT_EDGE};
pub use resolver::{Pose6, TransformResolver};
