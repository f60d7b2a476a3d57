//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod harness;

use slint_collection_canvas::{CanvasDelegate, ConnectionPath, IndexPath};
use std::cell::RefCell;
use std::rc::Rc;

/// A delegate notification with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    Selected(IndexPath),
    Moved(IndexPath),
    SegmentMoved(Vec<IndexPath>),
    Collapsed(IndexPath),
    SegmentCollapsed(IndexPath, Vec<IndexPath>),
    ConnectionsCollapsedBelow(IndexPath),
    Expanded(IndexPath),
    SegmentExpanded(IndexPath, Vec<IndexPath>),
    ConnectionsExpandedBelow(IndexPath),
    Deleted(IndexPath),
    ConnectionAdded(ConnectionPath),
    ConnectionRemoved(ConnectionPath),
    ConnectionMoved(ConnectionPath, ConnectionPath),
    ConnectionChanged(ConnectionPath),
}

/// Tracks delegate invocations for testing.
///
/// Clones share the same log, so a test keeps one copy while the canvas
/// owns another.
#[derive(Default, Clone)]
pub struct CallbackTracker {
    events: Rc<RefCell<Vec<CanvasEvent>>>,
}

impl CallbackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CanvasEvent> {
        self.events.borrow().clone()
    }

    pub fn last(&self) -> Option<CanvasEvent> {
        self.events.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&CanvasEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| predicate(e)).count()
    }

    /// Clear all recorded callbacks.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn record(&self, event: CanvasEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl CanvasDelegate for CallbackTracker {
    fn did_select_node(&mut self, path: IndexPath) {
        self.record(CanvasEvent::Selected(path));
    }

    fn did_move_node(&mut self, path: IndexPath) {
        self.record(CanvasEvent::Moved(path));
    }

    fn did_move_segment(&mut self, paths: &[IndexPath]) {
        self.record(CanvasEvent::SegmentMoved(paths.to_vec()));
    }

    fn did_collapse_node(&mut self, path: IndexPath) {
        self.record(CanvasEvent::Collapsed(path));
    }

    fn did_collapse_segment(&mut self, root: IndexPath, members: &[IndexPath]) {
        self.record(CanvasEvent::SegmentCollapsed(root, members.to_vec()));
    }

    fn did_collapse_connections_below(&mut self, root: IndexPath) {
        self.record(CanvasEvent::ConnectionsCollapsedBelow(root));
    }

    fn did_expand_node(&mut self, path: IndexPath) {
        self.record(CanvasEvent::Expanded(path));
    }

    fn did_expand_segment(&mut self, root: IndexPath, members: &[IndexPath]) {
        self.record(CanvasEvent::SegmentExpanded(root, members.to_vec()));
    }

    fn did_expand_connections_below(&mut self, root: IndexPath) {
        self.record(CanvasEvent::ConnectionsExpandedBelow(root));
    }

    fn did_delete_node(&mut self, path: IndexPath) {
        self.record(CanvasEvent::Deleted(path));
    }

    fn did_add_connection(&mut self, path: ConnectionPath) {
        self.record(CanvasEvent::ConnectionAdded(path));
    }

    fn did_remove_connection(&mut self, path: ConnectionPath) {
        self.record(CanvasEvent::ConnectionRemoved(path));
    }

    fn did_move_connection(&mut self, from: ConnectionPath, to: ConnectionPath) {
        self.record(CanvasEvent::ConnectionMoved(from, to));
    }

    fn did_change_connection_attributes(&mut self, path: ConnectionPath) {
        self.record(CanvasEvent::ConnectionChanged(path));
    }
}
