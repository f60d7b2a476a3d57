//! Boundary traits towards the host application.
//!
//! The canvas pulls nodes and connections from a [`CanvasDataSource`] and
//! pushes notifications to a [`CanvasDelegate`]. Both are keyed by
//! [`IndexPath`].

use crate::connection::ConnectionStyle;
use crate::geometry::{Point, Size};
use crate::handle::Handle;
use crate::index_path::{ConnectionPath, IndexPath};
use crate::node::Node;

/// A connection reported by the data source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionSpec {
    pub parent: IndexPath,
    pub child: IndexPath,
    pub style: ConnectionStyle,
}

impl ConnectionSpec {
    pub fn new(parent: IndexPath, child: IndexPath) -> Self {
        Self {
            parent,
            child,
            style: ConnectionStyle::default(),
        }
    }

    pub fn with_style(mut self, style: ConnectionStyle) -> Self {
        self.style = style;
        self
    }

    pub fn path(&self) -> ConnectionPath {
        ConnectionPath::new(self.parent, self.child)
    }
}

/// Supplies nodes, connections and handles by index path.
pub trait CanvasDataSource {
    fn section_count(&self) -> usize;

    fn node_count(&self, section: usize) -> usize;

    /// The node at `path`, `None` if the data source has nothing there.
    fn node(&self, path: IndexPath) -> Option<Node>;

    /// Connections touching the node at `path`, as parent or child.
    ///
    /// Connections whose other endpoint is not on the canvas yet are wired
    /// once that node is inserted.
    fn connections(&self, path: IndexPath) -> Vec<ConnectionSpec> {
        let _ = path;
        Vec::new()
    }

    /// Style for a connection the user draws from the node at `parent`.
    fn new_connection(&self, parent: IndexPath) -> ConnectionStyle {
        let _ = parent;
        ConnectionStyle::default()
    }

    /// Handle for a create gesture, centered on a scaled point.
    ///
    /// A handle with an empty size gets the configured handle size.
    fn new_create_handle(&self, at: Point) -> Handle {
        Handle::new(at, Size::default())
    }

    /// Handle for a move gesture, centered on a scaled point.
    fn new_move_handle(&self, at: Point) -> Handle {
        Handle::new(at, Size::default())
    }
}

/// Receives notifications about user and programmatic edits.
///
/// Every method has an empty default.
#[allow(unused_variables)]
pub trait CanvasDelegate {
    fn did_select_node(&mut self, path: IndexPath) {}

    fn did_move_node(&mut self, path: IndexPath) {}

    /// A collapsed segment was dragged; `paths` starts with the root.
    fn did_move_segment(&mut self, paths: &[IndexPath]) {}

    fn did_collapse_node(&mut self, path: IndexPath) {}

    fn did_collapse_segment(&mut self, root: IndexPath, members: &[IndexPath]) {}

    fn did_collapse_connections_below(&mut self, root: IndexPath) {}

    fn did_expand_node(&mut self, path: IndexPath) {}

    fn did_expand_segment(&mut self, root: IndexPath, members: &[IndexPath]) {}

    fn did_expand_connections_below(&mut self, root: IndexPath) {}

    fn did_delete_node(&mut self, path: IndexPath) {}

    fn did_add_connection(&mut self, path: ConnectionPath) {}

    /// Fired when the removal animation completes, with the path captured
    /// when the removal started.
    fn did_remove_connection(&mut self, path: ConnectionPath) {}

    fn did_move_connection(&mut self, from: ConnectionPath, to: ConnectionPath) {}

    fn did_change_connection_attributes(&mut self, path: ConnectionPath) {}
}

/// Delegate that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl CanvasDelegate for NoopDelegate {}
