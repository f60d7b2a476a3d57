//! Collapse and expand of rooted sub graphs.
//!
//! A collapsed root carries `has_collapsed_sub_structure`; every descendant
//! carries a [`SegmentMembership`] naming the root and its offset from the
//! root's center. Connections inside the segment are hidden and members move
//! as one rigid body with the root.

use crate::geometry::{Point, Rect};
use crate::graph::CanvasGraph;
use crate::item::{CanvasItem, ConnectionId, ItemId, NodeId, SegmentMembership};
use crate::node::Node;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Nodes and connections touched by a collapse or expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentChange {
    pub root: NodeId,
    /// Members in breadth-first order from the root.
    pub members: Vec<NodeId>,
    pub connections: Vec<ConnectionId>,
    /// Knock-on membership changes in other segments.
    pub resync: Resync,
}

/// Membership changes made by [`resync`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resync {
    /// Nodes that started moving with a collapsed root.
    pub joined: Vec<NodeId>,
    /// Nodes whose root was expanded, deleted or cut off from them.
    pub left: Vec<NodeId>,
}

impl Resync {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Collapse the sub graph below `root`.
///
/// Returns `None` when `root` is missing or itself moves with another root.
/// Nested collapsed roots are absorbed: their flag is cleared and their
/// members are re-parented onto `root`. Members shared with another
/// segment move over to `root`.
pub fn collapse(graph: &mut CanvasGraph, root: NodeId) -> Option<SegmentChange> {
    let root_node = graph.node(root)?;
    if root_node.is_in_collapsed_segment() {
        return None;
    }
    let root_center = root_node.center();

    // Breadth first, no recursion depth on deep trees
    let members = graph.descendants(root, None);

    for &member in &members {
        if let Some(node) = graph.node_mut(member) {
            let delta = node.center() - root_center;
            node.has_collapsed_sub_structure = false;
            node.set_segment_membership(Some(SegmentMembership { head: root, delta }));
        }
    }
    if let Some(node) = graph.node_mut(root) {
        node.has_collapsed_sub_structure = true;
    }

    let connections = internal_connections(graph, root, &members);
    let resync = resync(graph);

    debug!(
        "collapsed segment at {:?}: {} members, {} hidden connections",
        root,
        members.len(),
        connections.len()
    );
    Some(SegmentChange {
        root,
        members,
        connections,
        resync,
    })
}

/// Expand a collapsed root, giving every member back its own geometry.
///
/// Members still reachable from another collapsed root join that segment
/// instead; they show up in [`SegmentChange::resync`].
/// Returns `None` when `root` is missing or not collapsed.
pub fn expand(graph: &mut CanvasGraph, root: NodeId) -> Option<SegmentChange> {
    if !graph.node(root)?.has_collapsed_sub_structure() {
        return None;
    }

    let members = members_of(graph, root);
    let connections = internal_connections(graph, root, &members);
    for &member in &members {
        if let Some(node) = graph.node_mut(member) {
            node.set_segment_membership(None);
            node.segment_rect = node.frame();
        }
    }
    if let Some(node) = graph.node_mut(root) {
        node.has_collapsed_sub_structure = false;
        node.segment_rect = node.frame();
    }

    let resync = resync(graph);

    debug!("expanded segment at {:?}: {} members", root, members.len());
    Some(SegmentChange {
        root,
        members,
        connections,
        resync,
    })
}

/// Bring memberships and line visibility back in line with the graph.
///
/// Run after any edit that adds, retargets or invalidates a connection, or
/// changes a root. A membership is dropped when its root is gone, no longer
/// collapsed or no longer reaches the node. A node below a collapsed root
/// that belongs to no segment joins it; collapsed roots are processed in
/// z-order and never cross another segment. A valid connection is hidden
/// exactly when both ends sit in the same segment.
pub fn resync(graph: &mut CanvasGraph) -> Resync {
    let order: Vec<NodeId> = graph
        .z_order()
        .iter()
        .filter_map(|item| match item {
            ItemId::Node(id) => Some(*id),
            _ => None,
        })
        .collect();
    let mut result = Resync::default();

    let mut reach: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &id in &order {
        let Some(head) = graph.node(id).and_then(Node::head_node) else {
            continue;
        };
        let head_is_root = graph
            .node(head)
            .is_some_and(|n| !n.is_retired() && n.has_collapsed_sub_structure());
        let reached = head_is_root
            && reach
                .entry(head)
                .or_insert_with(|| graph.descendants(head, None))
                .contains(&id);
        if !reached {
            if let Some(node) = graph.node_mut(id) {
                node.set_segment_membership(None);
                node.segment_rect = node.frame();
            }
            result.left.push(id);
        }
    }

    let roots: Vec<NodeId> = order
        .iter()
        .copied()
        .filter(|id| graph.node(*id).is_some_and(Node::has_collapsed_sub_structure))
        .collect();
    for &root in &roots {
        let Some(root_center) = graph.node(root).map(|n| n.center()) else {
            continue;
        };
        for id in unclaimed_below(graph, root) {
            let Some(node) = graph.node_mut(id) else {
                continue;
            };
            if node.is_in_collapsed_segment() {
                continue;
            }
            let delta = node.center() - root_center;
            node.set_segment_membership(Some(SegmentMembership { head: root, delta }));
            result.joined.push(id);
        }
    }

    let ids: Vec<ConnectionId> = graph
        .connections()
        .filter(|(_, c)| c.is_valid())
        .map(|(id, _)| id)
        .collect();
    for id in ids {
        let Some(connection) = graph.connection(id) else {
            continue;
        };
        let parent_segment = segment_of(graph, connection.parent());
        let child_segment = graph.node(connection.child()).and_then(Node::head_node);
        let hidden = parent_segment.is_some() && parent_segment == child_segment;
        if hidden == connection.is_hidden() {
            continue;
        }
        if let Some(connection) = graph.connection_mut(id) {
            connection.hidden = hidden;
        }
        if !hidden {
            graph.redraw_connection(id);
        }
    }

    for &root in &roots {
        refresh_segment_rect(graph, root);
    }

    if !result.is_empty() {
        debug!(
            "segments resynced: {} joined, {} left",
            result.joined.len(),
            result.left.len()
        );
    }
    result
}

/// The segment `node` belongs to: itself when it is a collapsed root.
fn segment_of(graph: &CanvasGraph, node: NodeId) -> Option<NodeId> {
    let n = graph.node(node)?;
    if n.has_collapsed_sub_structure() {
        Some(node)
    } else {
        n.head_node()
    }
}

/// Nodes below `root` over valid connections, stopping at other segments.
fn unclaimed_below(graph: &CanvasGraph, root: NodeId) -> Vec<NodeId> {
    let mut visited = HashSet::from([root]);
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(current) = queue.pop_front() {
        let Some(node) = graph.node(current) else {
            continue;
        };
        for connection in node
            .child_connections()
            .iter()
            .filter_map(|id| graph.connection(*id))
        {
            let child = connection.child();
            if !connection.is_valid() || !visited.insert(child) {
                continue;
            }
            let held_elsewhere = graph.node(child).is_some_and(|n| {
                n.has_collapsed_sub_structure() || n.head_node().is_some_and(|h| h != root)
            });
            if !held_elsewhere {
                order.push(child);
                queue.push_back(child);
            }
        }
    }
    order
}

/// Nodes whose membership names `root`, ordered by distance from the root.
pub fn members_of(graph: &CanvasGraph, root: NodeId) -> Vec<NodeId> {
    let mut members: Vec<NodeId> = graph
        .nodes()
        .filter(|(_, node)| node.head_node() == Some(root))
        .map(|(id, _)| id)
        .collect();

    // Follow traversal order where possible; members no longer reachable go last
    let order = graph.descendants(root, None);
    members.sort_by_key(|id| (order.iter().position(|o| o == id).unwrap_or(usize::MAX), *id));
    members
}

/// Move a segment root to `center` (unscaled) and carry its members along.
pub fn move_segment(graph: &mut CanvasGraph, root: NodeId, center: Point) {
    graph.move_node(root, center);
    for member in members_of(graph, root) {
        let delta = graph
            .node(member)
            .map(|n| n.delta_to_collapsed_node())
            .unwrap_or_default();
        graph.move_node(member, center + delta);
    }
    refresh_segment_rect(graph, root);
}

/// Recompute the union of the frames of `root` and its members.
pub fn refresh_segment_rect(graph: &mut CanvasGraph, root: NodeId) {
    let Some(root_node) = graph.node(root) else {
        return;
    };
    let mut rect: Rect = root_node.frame();
    if root_node.has_collapsed_sub_structure() {
        for member in members_of(graph, root) {
            if let Some(node) = graph.node(member) {
                rect = rect.union(&node.frame());
            }
        }
    }
    if let Some(node) = graph.node_mut(root) {
        node.segment_rect = rect;
    }
}

/// Valid child connections of the root and every member.
fn internal_connections(graph: &CanvasGraph, root: NodeId, members: &[NodeId]) -> Vec<ConnectionId> {
    std::iter::once(root)
        .chain(members.iter().copied())
        .filter_map(|id| graph.node(id))
        .flat_map(|node| node.child_connections().iter().copied())
        .filter(|id| {
            graph
                .connection(*id)
                .is_some_and(|c| c.is_valid() && (c.child() == root || members.contains(&c.child())))
        })
        .collect()
}
