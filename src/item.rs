//! The touchable-item capability shared by nodes, connections and handles.
//!
//! Items refer to each other only through the copyable ids defined here; the
//! [`CanvasGraph`](crate::graph::CanvasGraph) owns the items themselves.

use crate::geometry::{sanitize_zoom, Offset, Point, Rect, Scalable, Size};
use std::fmt;

/// Identifier of a node inside the live collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

/// Identifier of a connection inside the live collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u32);

/// Identifier of a handle inside the live collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub(crate) u32);

/// Any item that can own a touch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemId {
    Node(NodeId),
    Connection(ConnectionId),
    Handle(HandleId),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Node(id) => write!(f, "node #{}", id.0),
            ItemId::Connection(id) => write!(f, "connection #{}", id.0),
            ItemId::Handle(id) => write!(f, "handle #{}", id.0),
        }
    }
}

impl From<NodeId> for ItemId {
    fn from(id: NodeId) -> Self {
        ItemId::Node(id)
    }
}

impl From<ConnectionId> for ItemId {
    fn from(id: ConnectionId) -> Self {
        ItemId::Connection(id)
    }
}

impl From<HandleId> for ItemId {
    fn from(id: HandleId) -> Self {
        ItemId::Handle(id)
    }
}

/// Membership of an item in a collapsed segment.
///
/// `head` is the segment root (it has collapsed sub structure), `delta` is the
/// unscaled offset of this item's center from the root's center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentMembership {
    pub head: NodeId,
    pub delta: Offset,
}

/// State common to every canvas item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemState {
    center: Point,
    size: Size,
    zoom_scale: f32,
    selected: bool,
    highlighted: bool,
    editing: bool,
    touch_offset: Offset,
    membership: Option<SegmentMembership>,
}

impl ItemState {
    pub fn new(center: Point, size: Size) -> Self {
        Self {
            center,
            size,
            zoom_scale: 1.0,
            selected: false,
            highlighted: false,
            editing: false,
            touch_offset: Offset::ZERO,
            membership: None,
        }
    }
}

/// Capability implemented by [`Node`](crate::Node), [`Connection`](crate::Connection)
/// and [`Handle`](crate::Handle).
///
/// Only `state` and `state_mut` are required; everything else is derived.
pub trait CanvasItem {
    fn state(&self) -> &ItemState;
    fn state_mut(&mut self) -> &mut ItemState;

    /// Stored (unscaled) center.
    fn center(&self) -> Point {
        self.state().center
    }

    fn set_center(&mut self, center: Point) {
        self.state_mut().center = center;
    }

    /// Stored (unscaled) size.
    fn size(&self) -> Size {
        self.state().size
    }

    fn set_size(&mut self, size: Size) {
        self.state_mut().size = size;
    }

    fn zoom_scale(&self) -> f32 {
        self.state().zoom_scale
    }

    fn set_zoom_scale(&mut self, scale: f32) {
        self.state_mut().zoom_scale = sanitize_zoom(scale);
    }

    /// Stored frame, unscaled.
    fn frame(&self) -> Rect {
        Rect::from_center(self.center(), self.size())
    }

    /// Frame transformed by the zoom scale.
    fn scaled_frame(&self) -> Rect {
        self.frame().scaled(self.zoom_scale())
    }

    /// Center transformed by the zoom scale.
    fn scaled_center(&self) -> Point {
        self.center().scaled(self.zoom_scale())
    }

    fn is_selected(&self) -> bool {
        self.state().selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.state_mut().selected = selected;
    }

    fn is_highlighted(&self) -> bool {
        self.state().highlighted
    }

    fn set_highlighted(&mut self, highlighted: bool) {
        self.state_mut().highlighted = highlighted;
    }

    fn is_editing(&self) -> bool {
        self.state().editing
    }

    fn set_editing(&mut self, editing: bool) {
        self.state_mut().editing = editing;
    }

    /// Unscaled offset of the current touch from the item center.
    fn touch_offset(&self) -> Offset {
        self.state().touch_offset
    }

    fn set_touch_offset(&mut self, offset: Offset) {
        self.state_mut().touch_offset = offset;
    }

    fn segment_membership(&self) -> Option<SegmentMembership> {
        self.state().membership
    }

    fn set_segment_membership(&mut self, membership: Option<SegmentMembership>) {
        self.state_mut().membership = membership;
    }

    fn is_in_collapsed_segment(&self) -> bool {
        self.state().membership.is_some()
    }

    /// Offset to the collapsed segment root, zero outside a segment.
    fn delta_to_collapsed_node(&self) -> Offset {
        self.state().membership.map(|m| m.delta).unwrap_or(Offset::ZERO)
    }
}
