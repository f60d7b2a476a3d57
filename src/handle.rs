use crate::geometry::{Point, Scalable, Size};
use crate::item::{CanvasItem, ConnectionId, ItemState, NodeId};

/// What a handle manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleTarget {
    /// Freshly created by the data source, not yet attached.
    Detached,
    /// Create handle: starts a new connection from this node.
    Node(NodeId),
    /// Move handle: relocates the child end of this connection.
    Connection(ConnectionId),
}

/// Transient touch target for creating or retargeting a connection.
///
/// Handles exist only for the duration of a gesture. The back reference to
/// the manipulated item is an id; the item never owns its handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    state: ItemState,
    pub(crate) target: HandleTarget,
}

impl Handle {
    /// Create a detached handle centered on a scaled point.
    ///
    /// The center is stored unscaled once the canvas attaches the handle and
    /// assigns its zoom scale.
    pub fn new(center: Point, size: Size) -> Self {
        Self {
            state: ItemState::new(center, size),
            target: HandleTarget::Detached,
        }
    }

    pub fn target(&self) -> HandleTarget {
        self.target
    }

    pub fn is_create_handle(&self) -> bool {
        matches!(self.target, HandleTarget::Node(_))
    }

    pub fn is_move_handle(&self) -> bool {
        matches!(self.target, HandleTarget::Connection(_))
    }

    /// Place the handle on a scaled anchor point.
    pub(crate) fn move_to_scaled(&mut self, anchor: Point) {
        let scale = self.zoom_scale();
        self.set_center(anchor.unscaled(scale));
    }
}

impl CanvasItem for Handle {
    fn state(&self) -> &ItemState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ItemState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_is_detached() {
        let handle = Handle::new(Point::new(10.0, 10.0), Size::new(44.0, 44.0));
        assert_eq!(handle.target(), HandleTarget::Detached);
        assert!(!handle.is_create_handle());
        assert!(!handle.is_move_handle());
    }

    #[test]
    fn test_handle_kind_follows_target() {
        let mut handle = Handle::new(Point::default(), Size::new(44.0, 44.0));
        handle.target = HandleTarget::Node(NodeId(1));
        assert!(handle.is_create_handle());
        handle.target = HandleTarget::Connection(ConnectionId(1));
        assert!(handle.is_move_handle());
    }

    #[test]
    fn test_move_to_scaled_stores_unscaled_center() {
        let mut handle = Handle::new(Point::default(), Size::new(44.0, 44.0));
        handle.set_zoom_scale(2.0);
        handle.move_to_scaled(Point::new(100.0, 60.0));
        assert_eq!(handle.center(), Point::new(50.0, 30.0));
        assert_eq!(handle.scaled_center(), Point::new(100.0, 60.0));
    }
}
