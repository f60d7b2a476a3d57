//! Test harness around a canvas backed by an in-memory data source.
//!
//! Provides the three-node layout used by most tests plus helpers for
//! simulating touch sequences in scaled space.

#![allow(dead_code)]

use super::CallbackTracker;
use slint_collection_canvas::{
    Canvas, CanvasDataSource, CanvasItem, CanvasResult, ConnectionPath, ConnectionSpec,
    IndexPath, ItemId, Node, NodeId, Point, Size,
};

/// Size of every node built by [`node`].
pub const NODE_SIZE: Size = Size {
    width: 80.0,
    height: 50.0,
};

pub fn ip(section: usize, row: usize) -> IndexPath {
    IndexPath::new(section, row)
}

pub fn cp(parent: IndexPath, child: IndexPath) -> ConnectionPath {
    ConnectionPath::new(parent, child)
}

pub fn node(x: f32, y: f32) -> Node {
    Node::new(Point::new(x, y), NODE_SIZE)
}

/// Data source holding nodes per section and a flat connection list.
#[derive(Default)]
pub struct VecDataSource {
    pub sections: Vec<Vec<Node>>,
    pub connections: Vec<ConnectionSpec>,
}

impl VecDataSource {
    pub fn new(sections: Vec<Vec<Node>>, connections: Vec<(IndexPath, IndexPath)>) -> Self {
        Self {
            sections,
            connections: connections
                .into_iter()
                .map(|(parent, child)| ConnectionSpec::new(parent, child))
                .collect(),
        }
    }
}

impl CanvasDataSource for VecDataSource {
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn node_count(&self, section: usize) -> usize {
        self.sections.get(section).map_or(0, Vec::len)
    }

    fn node(&self, path: IndexPath) -> Option<Node> {
        self.sections.get(path.section)?.get(path.row).cloned()
    }

    fn connections(&self, path: IndexPath) -> Vec<ConnectionSpec> {
        self.connections
            .iter()
            .filter(|c| c.parent == path || c.child == path)
            .copied()
            .collect()
    }
}

/// A filled canvas plus a handle on the delegate log.
pub struct CanvasHarness {
    pub canvas: Canvas<VecDataSource, CallbackTracker>,
    pub tracker: CallbackTracker,
}

impl CanvasHarness {
    /// One section, nodes (0,0) at (100,100), (0,1) at (300,100), (0,2) at
    /// (300,300) and the connection (0,0) -> (0,1).
    pub fn new() -> Self {
        Self::with_data(VecDataSource::new(
            vec![vec![node(100.0, 100.0), node(300.0, 100.0), node(300.0, 300.0)]],
            vec![(ip(0, 0), ip(0, 1))],
        ))
    }

    pub fn with_data(data: VecDataSource) -> Self {
        let tracker = CallbackTracker::new();
        let mut canvas = Canvas::new(data, tracker.clone());
        canvas.fill_canvas().expect("fixture data is consistent");
        Self { canvas, tracker }
    }

    pub fn id(&self, path: IndexPath) -> NodeId {
        self.canvas.node_id_at(path).expect("node exists")
    }

    /// Stored (unscaled) center.
    pub fn center(&self, path: IndexPath) -> Point {
        self.canvas
            .node_at_index_path(path)
            .map(|n| n.center())
            .expect("node exists")
    }

    pub fn scaled_center(&self, path: IndexPath) -> Point {
        self.canvas
            .node_at_index_path(path)
            .map(|n| n.scaled_center())
            .expect("node exists")
    }

    /// Scaled create-handle anchor of a node.
    pub fn anchor(&self, path: IndexPath) -> Point {
        self.canvas
            .node_at_index_path(path)
            .map(|n| n.scaled_handle_anchor())
            .expect("node exists")
    }

    /// Scaled midpoint of a connection, where its move handle is anchored.
    pub fn midpoint(&self, path: ConnectionPath) -> Point {
        self.canvas
            .connection_at(path)
            .map(|c| c.scaled_midpoint())
            .expect("connection exists")
    }

    pub fn tap(&mut self, at: Point) -> CanvasResult<ItemId> {
        let owner = self.canvas.touch_began(at)?;
        self.canvas.touch_ended(at)?;
        Ok(owner)
    }

    /// Full touch sequence from `from` to `to` with one intermediate move.
    pub fn drag(&mut self, from: Point, to: Point) -> CanvasResult<ItemId> {
        let owner = self.canvas.touch_began(from)?;
        self.canvas.touch_moved(from.midpoint(to))?;
        self.canvas.touch_moved(to)?;
        self.canvas.touch_ended(to)?;
        Ok(owner)
    }

    /// Drag from the create handle of `from` and drop at `to`.
    pub fn connect_by_touch(&mut self, from: IndexPath, to: Point) -> CanvasResult<ItemId> {
        let anchor = self.anchor(from);
        self.drag(anchor, to)
    }
}

impl Default for CanvasHarness {
    fn default() -> Self {
        Self::new()
    }
}
