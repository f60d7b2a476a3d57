use crate::geometry::{Offset, Point, Rect, Scalable, Size};
use crate::item::{CanvasItem, ConnectionId, HandleId, ItemState, NodeId};
use slint::SharedString;

/// A vertex on the canvas.
///
/// Nodes are handed out by the [`CanvasDataSource`](crate::CanvasDataSource)
/// and then owned by the canvas. Connection lists hold ids only; the
/// [`CanvasGraph`](crate::CanvasGraph) keeps them consistent with the
/// connections' own endpoint references.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    state: ItemState,
    pub(crate) has_collapsed_sub_structure: bool,
    pub(crate) child_connections: Vec<ConnectionId>,
    pub(crate) parent_connections: Vec<ConnectionId>,
    pub(crate) connected_nodes: Vec<NodeId>,
    pub(crate) create_handle: Option<HandleId>,
    pub(crate) segment_rect: Rect,
    /// Deleted while connections were still detaching.
    pub(crate) retired: bool,
    handle_anchor: Offset,
    content: Option<SharedString>,
}

impl Node {
    /// Create a node centered on `center` (unscaled).
    ///
    /// The create-handle anchor defaults to the middle of the right edge.
    pub fn new(center: Point, size: Size) -> Self {
        Self {
            state: ItemState::new(center, size),
            has_collapsed_sub_structure: false,
            child_connections: Vec::new(),
            parent_connections: Vec::new(),
            connected_nodes: Vec::new(),
            create_handle: None,
            segment_rect: Rect::from_center(center, size),
            retired: false,
            handle_anchor: Offset::new(size.width * 0.5, 0.0),
            content: None,
        }
    }

    /// Attach a content label.
    pub fn with_content(mut self, content: impl Into<SharedString>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Override the create-handle anchor (unscaled offset from the center).
    pub fn with_handle_anchor(mut self, anchor: Offset) -> Self {
        self.handle_anchor = anchor;
        self
    }

    pub fn content(&self) -> Option<&SharedString> {
        self.content.as_ref()
    }

    /// `true` when this node is the root of a collapsed segment.
    pub fn has_collapsed_sub_structure(&self) -> bool {
        self.has_collapsed_sub_structure
    }

    /// `true` once the node was deleted; it lingers only so the endpoints
    /// of its removing connections still resolve.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Root of the collapsed segment this node belongs to, if any.
    pub fn head_node(&self) -> Option<NodeId> {
        self.segment_membership().map(|m| m.head)
    }

    pub fn child_connections(&self) -> &[ConnectionId] {
        &self.child_connections
    }

    pub fn parent_connections(&self) -> &[ConnectionId] {
        &self.parent_connections
    }

    /// All nodes directly connected to this one, parents and children.
    pub fn connected_nodes(&self) -> &[NodeId] {
        &self.connected_nodes
    }

    /// The create handle this node is currently hosting.
    pub fn create_handle(&self) -> Option<HandleId> {
        self.create_handle
    }

    pub fn handle_anchor(&self) -> Offset {
        self.handle_anchor
    }

    /// Scaled position of the create-handle anchor.
    pub fn scaled_handle_anchor(&self) -> Point {
        (self.center() + self.handle_anchor).scaled(self.zoom_scale())
    }

    /// Union of the frames of this node and its collapsed segment, unscaled.
    pub fn segment_rect(&self) -> Rect {
        self.segment_rect
    }

    pub fn scaled_segment_rect(&self) -> Rect {
        self.segment_rect.scaled(self.zoom_scale())
    }

    /// Take over position, size and content of `other`, keeping graph state.
    pub(crate) fn update_from(&mut self, other: Node) {
        let delta = other.center() - self.center();
        self.set_center(other.center());
        self.set_size(other.size());
        self.handle_anchor = other.handle_anchor;
        self.content = other.content;
        self.segment_rect = Rect::new(
            self.segment_rect.x + delta.dx,
            self.segment_rect.y + delta.dy,
            self.segment_rect.width,
            self.segment_rect.height,
        );
    }

    /// Drop all connection bookkeeping.
    pub(crate) fn reset(&mut self) {
        self.child_connections.clear();
        self.parent_connections.clear();
        self.connected_nodes.clear();
        self.create_handle = None;
    }
}

impl CanvasItem for Node {
    fn state(&self) -> &ItemState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ItemState {
        &mut self.state
    }
}
