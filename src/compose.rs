//! Transform composition: walk two frames to their common ancestor and
//! compose the RT edge matrices met on the way.
//!
//! Stateless; the resolver wraps this with caching. Both walks first climb
//! to the shallower query level, then ascend in lockstep one level at a time
//! until the ids coincide at the common ancestor. Each side accumulates its
//! child-to-parent edge matrices by left-multiplication, so `total_a` maps
//! origin coordinates up to the ancestor and `total_b` does the same for the
//! destination; the result is `total_a * total_b.inverse()`.
//!
//! Any lookup failure mid-ascent (missing parent on a non-root frame,
//! missing RT edge, missing matrix, level inversion) aborts the resolution
//! with an absent result. No partial transform is ever returned.

use glam::DMat4;
use log::trace;

use crate::graph::{Frame, FrameId, FrameLookup, FrameRef};

/// A composed transform plus the frames its resolution traversed.
///
/// `touched` lists both endpoints and every ancestor visited; the cache
/// indexes the entry under each of these ids so a change to any of them
/// evicts it.
#[derive(Debug, Clone)]
pub struct Composed {
    pub matrix: DMat4,
    pub touched: Vec<FrameId>,
}

/// Compose the transform mapping `orig` coordinates into the `dest` frame.
///
/// Returns `None` when either frame is unknown, a level is unavailable, an
/// expected parent or RT edge is missing mid-ascent, or the two frames have
/// no common ancestor (disjoint trees).
pub fn compose<G: FrameLookup>(graph: &G, dest: &FrameRef, orig: &FrameRef) -> Option<Composed> {
    let mut a = graph.get_frame(orig)?.clone();
    let mut b = graph.get_frame(dest)?.clone();

    let level_a = graph.hierarchy_level(&a)?;
    let level_b = graph.hierarchy_level(&b)?;
    let min_level = level_a.min(level_b);

    let mut total_a = DMat4::IDENTITY;
    let mut total_b = DMat4::IDENTITY;
    let mut touched = vec![b.id(), a.id()];

    // Climb each side while at or below the shallower query level
    ascend_to(graph, &mut a, &mut total_a, min_level, &mut touched)?;
    ascend_to(graph, &mut b, &mut total_b, min_level, &mut touched)?;

    // Lockstep ascent to the common ancestor
    while a.id() != b.id() {
        let pa = step_up(graph, &a, &mut total_a, &mut touched)?;
        let pb = step_up(graph, &b, &mut total_b, &mut touched)?;
        a = pa;
        b = pb;
    }
    trace!("common ancestor of {orig:?} and {dest:?}: frame {}", a.id());

    Some(Composed {
        matrix: total_a * total_b.inverse(),
        touched,
    })
}

/// Climb `frame` upward while its level is >= `min_level`, accumulating edge
/// matrices into `total`. A root at the cutoff is a normal stop; a missing
/// parent anywhere deeper is a resolution failure.
fn ascend_to<G: FrameLookup>(
    graph: &G,
    frame: &mut Frame,
    total: &mut DMat4,
    min_level: u32,
    touched: &mut Vec<FrameId>,
) -> Option<()> {
    while graph.hierarchy_level(frame)? >= min_level {
        if frame.parent().is_none() && frame.level() == 0 {
            break;
        }
        *frame = step_up(graph, frame, total, touched)?;
    }
    Some(())
}

/// One step up the tree: fetch the parent and the RT edge leading down to
/// `frame`, left-multiply the edge matrix into `total`, record the parent as
/// a dependency. Fails on missing parent/edge/matrix or a level inversion
/// (tree invariant violated).
fn step_up<G: FrameLookup>(
    graph: &G,
    frame: &Frame,
    total: &mut DMat4,
    touched: &mut Vec<FrameId>,
) -> Option<Frame> {
    let parent = graph.parent_frame(frame)?;
    if parent.level() >= frame.level() {
        trace!(
            "level inversion at frame {}: parent {} level {} >= {}",
            frame.id(),
            parent.id(),
            parent.level(),
            frame.level()
        );
        return None;
    }
    let edge = graph.rt_edge(parent.id(), frame.id())?;
    let rt = graph.edge_transform(edge)?;
    *total = rt * *total;
    touched.push(parent.id());
    trace!("ascend: frame {} -> parent {}", frame.id(), parent.id());
    Some(parent.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FrameGraph;
    use glam::{DQuat, DVec3, EulerRot};

    fn translation(x: f64, y: f64, z: f64) -> DMat4 {
        DMat4::from_translation(DVec3::new(x, y, z))
    }

    fn rt(rx: f64, ry: f64, rz: f64, t: DVec3) -> DMat4 {
        DMat4::from_rotation_translation(DQuat::from_euler(EulerRot::XYZ, rx, ry, rz), t)
    }

    fn assert_mat_eq(a: DMat4, b: DMat4) {
        assert!(a.abs_diff_eq(b, 1e-9), "matrices differ:\n{a}\nvs\n{b}");
    }

    #[test]
    fn test_identity_for_same_frame() {
        let mut g = FrameGraph::new();
        let root = g.add_root("world").unwrap();
        let a = g
            .add_child(root, "a", rt(0.3, 0.0, 1.1, DVec3::new(1.0, 2.0, 3.0)))
            .unwrap();

        let same_root = compose(&g, &root.into(), &root.into()).unwrap();
        assert_mat_eq(same_root.matrix, DMat4::IDENTITY);

        // Non-root: both walks take the same step, the products cancel
        let same_a = compose(&g, &a.into(), &a.into()).unwrap();
        assert_mat_eq(same_a.matrix, DMat4::IDENTITY);
    }

    #[test]
    fn test_chain_composition() {
        let mut g = FrameGraph::new();
        let t1 = rt(0.2, -0.4, 0.9, DVec3::new(1.0, 0.0, 0.0));
        let t2 = rt(-1.0, 0.5, 0.1, DVec3::new(0.0, 2.0, 0.5));

        let root = g.add_root("world").unwrap();
        let a = g.add_child(root, "a", t1).unwrap();
        let b = g.add_child(a, "b", t2).unwrap();

        let down = compose(&g, &root.into(), &b.into()).unwrap();
        assert_mat_eq(down.matrix, t1 * t2);

        let up = compose(&g, &b.into(), &root.into()).unwrap();
        assert_mat_eq(up.matrix, (t1 * t2).inverse());
    }

    #[test]
    fn test_touched_covers_full_path() {
        let mut g = FrameGraph::new();
        let root = g.add_root("world").unwrap();
        let a = g.add_child(root, "a", translation(1.0, 0.0, 0.0)).unwrap();
        let b = g.add_child(a, "b", translation(0.0, 1.0, 0.0)).unwrap();
        let c = g.add_child(root, "c", translation(0.0, 0.0, 1.0)).unwrap();

        let composed = compose(&g, &c.into(), &b.into()).unwrap();
        for id in [root, a, b, c] {
            assert!(composed.touched.contains(&id), "missing dependency {id}");
        }
    }

    #[test]
    fn test_sibling_frames() {
        let mut g = FrameGraph::new();
        let ta = translation(1.0, 0.0, 0.0);
        let tb = rt(0.0, 0.0, std::f64::consts::FRAC_PI_2, DVec3::new(0.0, 3.0, 0.0));

        let root = g.add_root("world").unwrap();
        let a = g.add_child(root, "a", ta).unwrap();
        let b = g.add_child(root, "b", tb).unwrap();

        // a -> root composed with root -> b
        let composed = compose(&g, &b.into(), &a.into()).unwrap();
        assert_mat_eq(composed.matrix, ta * tb.inverse());
    }

    #[test]
    fn test_disconnected_roots() {
        let mut g = FrameGraph::new();
        let r1 = g.add_root("world").unwrap();
        let r2 = g.add_root("island").unwrap();
        let a = g.add_child(r1, "a", translation(1.0, 0.0, 0.0)).unwrap();
        let b = g.add_child(r2, "b", translation(2.0, 0.0, 0.0)).unwrap();

        assert!(compose(&g, &b.into(), &a.into()).is_none());
        assert!(compose(&g, &r2.into(), &r1.into()).is_none());
    }

    #[test]
    fn test_unknown_frame() {
        let mut g = FrameGraph::new();
        let root = g.add_root("world").unwrap();

        assert!(compose(&g, &"nope".into(), &root.into()).is_none());
        assert!(compose(&g, &root.into(), &FrameRef::Id(999)).is_none());
    }

    #[test]
    fn test_orphaned_subtree_fails() {
        let mut g = FrameGraph::new();
        let root = g.add_root("world").unwrap();
        let a = g.add_child(root, "a", translation(1.0, 0.0, 0.0)).unwrap();
        let b = g.add_child(a, "b", translation(0.0, 1.0, 0.0)).unwrap();

        // Removing the intermediate frame leaves b with a dangling parent link
        g.remove_frame(a);
        assert!(compose(&g, &root.into(), &b.into()).is_none());
    }

    #[test]
    fn test_missing_rt_edge_fails() {
        let mut g = FrameGraph::new();
        let root = g.add_root("world").unwrap();
        let a = g.add_child(root, "a", translation(1.0, 0.0, 0.0)).unwrap();

        g.remove_edge(root, a, crate::graph::RT_EDGE);
        assert!(compose(&g, &root.into(), &a.into()).is_none());
    }
}
