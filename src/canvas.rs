//! The canvas coordinator.
//!
//! [`Canvas`] owns the live collections, arbitrates the single-touch lock and
//! translates between index paths (used by the data source and delegate) and
//! the in-memory item ids.
//!
//! # Example
//!
//! ```ignore
//! use slint_collection_canvas::{Canvas, Point};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let canvas = Rc::new(RefCell::new(Canvas::new(MyDataSource::load(), MyDelegate::default())));
//! canvas.borrow_mut().fill_canvas()?;
//!
//! window.on_pointer_down({
//!     let canvas = canvas.clone();
//!     move |x, y| { let _ = canvas.borrow_mut().touch_began(Point::new(x, y)); }
//! });
//! window.on_pointer_move({
//!     let canvas = canvas.clone();
//!     move |x, y| { let _ = canvas.borrow_mut().touch_moved(Point::new(x, y)); }
//! });
//! window.on_pointer_up({
//!     let canvas = canvas.clone();
//!     move |x, y| { let _ = canvas.borrow_mut().touch_ended(Point::new(x, y)); }
//! });
//!
//! // After playing an animation for `duration`
//! canvas.borrow_mut().complete_animation(id)?;
//! ```

use crate::animation::{AnimationId, AnimationKind, AnimationQueue, PendingAnimation};
use crate::config::CanvasConfig;
use crate::connection::{Connection, ConnectionAnimation, ConnectionStyle};
use crate::data_source::{CanvasDataSource, CanvasDelegate, ConnectionSpec};
use crate::error::{CanvasError, CanvasResult};
use crate::geometry::{Offset, Point, Scalable, Size};
use crate::graph::{CanvasGraph, GraphViolation};
use crate::handle::{Handle, HandleTarget};
use crate::hit_test::{self, HitTarget};
use crate::index_path::{ConnectionPath, IndexPath};
use crate::item::{CanvasItem, ConnectionId, HandleId, ItemId, NodeId, SegmentMembership};
use crate::node::Node;
use crate::segment;
use crate::selection::SelectionManager;
use crate::touch::{Gesture, TouchArbiter, TouchEligibility, TouchState};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// A reported connection whose other endpoint is not on the canvas yet.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DeferredConnection {
    present: NodeId,
    present_is_parent: bool,
    missing: IndexPath,
    style: ConnectionStyle,
}

/// Removals started by one node deletion. The neighbours stay busy until
/// every animation of the cascade has completed.
#[derive(Debug, Default)]
struct DeletionCascade {
    animations: Vec<AnimationId>,
    neighbours: Vec<NodeId>,
}

/// Interactive node-graph canvas.
///
/// All methods run on the host's interaction loop; none of them blocks.
/// Animations are reported through [`pending_animations`](Self::pending_animations)
/// and resumed with [`complete_animation`](Self::complete_animation).
pub struct Canvas<S, D> {
    data_source: S,
    delegate: D,
    config: CanvasConfig,
    graph: CanvasGraph,
    sections: Vec<Vec<NodeId>>,
    paths: HashMap<NodeId, IndexPath>,
    deferred: Vec<DeferredConnection>,
    arbiter: TouchArbiter,
    animations: AnimationQueue,
    cascades: Vec<DeletionCascade>,
    selection: SelectionManager,
    /// Owner of a touch sequence cancelled by a data update; its remaining
    /// events report a stale reference.
    stale_owner: Option<ItemId>,
    zoom_scale: f32,
    connect_mode: bool,
}

impl<S: CanvasDataSource, D: CanvasDelegate> Canvas<S, D> {
    /// Create an empty canvas. Call [`fill_canvas`](Self::fill_canvas) to load it.
    pub fn new(data_source: S, delegate: D) -> Self {
        Self::with_config(data_source, delegate, CanvasConfig::default())
    }

    /// Create an empty canvas with custom tunables.
    ///
    /// An unusable zoom range in `config` is replaced with the default one.
    pub fn with_config(data_source: S, delegate: D, config: CanvasConfig) -> Self {
        Self {
            data_source,
            delegate,
            config: config.sanitized(),
            graph: CanvasGraph::new(),
            sections: Vec::new(),
            paths: HashMap::new(),
            deferred: Vec::new(),
            arbiter: TouchArbiter::new(),
            animations: AnimationQueue::new(),
            cascades: Vec::new(),
            selection: SelectionManager::new(),
            stale_owner: None,
            zoom_scale: 1.0,
            connect_mode: false,
        }
    }

    // === Accessors ===

    pub fn data_source(&self) -> &S {
        &self.data_source
    }

    /// Mutable access for hosts that edit their store before calling one of
    /// the `*_at_index_path` operations.
    pub fn data_source_mut(&mut self) -> &mut S {
        &mut self.data_source
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn graph(&self) -> &CanvasGraph {
        &self.graph
    }

    pub fn touch_state(&self) -> &TouchState {
        self.arbiter.state()
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn zoom_scale(&self) -> f32 {
        self.zoom_scale
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn node_count(&self, section: usize) -> usize {
        self.sections.get(section).map_or(0, Vec::len)
    }

    // === Index paths ===

    pub fn node_id_at(&self, path: IndexPath) -> Option<NodeId> {
        self.sections.get(path.section)?.get(path.row).copied()
    }

    pub fn node_at_index_path(&self, path: IndexPath) -> Option<&Node> {
        self.graph.node(self.node_id_at(path)?)
    }

    pub fn index_path_of(&self, node: NodeId) -> Option<IndexPath> {
        self.paths.get(&node).copied()
    }

    /// External identity of a connection, derived from its endpoints.
    ///
    /// A removing connection reports the path captured when its removal
    /// started, since a deleted endpoint no longer has an index path.
    pub fn connection_path(&self, connection: ConnectionId) -> Option<ConnectionPath> {
        let connection = self.graph.connection(connection)?;
        if let ConnectionAnimation::Removal(animation) = connection.animation() {
            if let Some(AnimationKind::ConnectionRemoval { path, .. }) =
                self.animations.get(animation).map(|a| a.kind)
            {
                return Some(path);
            }
        }
        Some(ConnectionPath::new(
            self.index_path_of(connection.parent())?,
            self.index_path_of(connection.child())?,
        ))
    }

    /// The valid connection joining `path.parent` to `path.child`.
    pub fn connection_at(&self, path: ConnectionPath) -> Option<&Connection> {
        let id = self.connection_id_at(path)?;
        self.graph.connection(id)
    }

    fn connection_id_at(&self, path: ConnectionPath) -> Option<ConnectionId> {
        let parent = self.node_id_at(path.parent)?;
        let child = self.node_id_at(path.child)?;
        self.graph.connection_between(parent, child)
    }

    fn resolve(&self, path: IndexPath) -> CanvasResult<NodeId> {
        self.node_id_at(path)
            .ok_or(CanvasError::InconsistentIndexPath(path))
    }

    fn resolve_connection(&self, path: ConnectionPath) -> CanvasResult<ConnectionId> {
        self.resolve(path.parent)?;
        self.resolve(path.child)?;
        self.connection_id_at(path)
            .ok_or(CanvasError::UnknownConnection(path))
    }

    fn reindex(&mut self) {
        self.paths.clear();
        for (section, rows) in self.sections.iter().enumerate() {
            for (row, id) in rows.iter().enumerate() {
                self.paths.insert(*id, IndexPath::new(section, row));
            }
        }
    }

    // === Lifecycle ===

    /// Replace the contents with everything the data source reports.
    ///
    /// Nothing changes if the data source fails to deliver a node.
    pub fn fill_canvas(&mut self) -> CanvasResult<()> {
        let mut loaded = Vec::new();
        for section in 0..self.data_source.section_count() {
            let mut rows = Vec::new();
            for row in 0..self.data_source.node_count(section) {
                let path = IndexPath::new(section, row);
                let node = self
                    .data_source
                    .node(path)
                    .ok_or(CanvasError::InconsistentIndexPath(path))?;
                rows.push(node);
            }
            loaded.push(rows);
        }

        self.clear_canvas();
        for rows in loaded {
            let ids = rows
                .into_iter()
                .map(|node| self.graph.insert_node(node))
                .collect();
            self.sections.push(ids);
        }
        self.reindex();

        let paths: Vec<IndexPath> = self
            .sections
            .iter()
            .enumerate()
            .flat_map(|(section, rows)| (0..rows.len()).map(move |row| IndexPath::new(section, row)))
            .collect();
        for path in paths {
            for spec in self.data_source.connections(path) {
                self.wire(spec);
            }
        }

        debug!(
            "canvas filled: {} nodes, {} connections, {} deferred",
            self.graph.node_count(),
            self.graph.connection_count(),
            self.deferred.len()
        );
        Ok(())
    }

    /// Drop every item and release the touch lock.
    pub fn clear_canvas(&mut self) {
        self.arbiter.release();
        self.stale_owner = None;
        self.graph.clear();
        self.sections.clear();
        self.paths.clear();
        self.deferred.clear();
        self.animations.clear();
        self.cascades.clear();
        self.selection.clear();
        debug!("canvas cleared");
    }

    /// Clear the canvas and load it again.
    pub fn reload_canvas(&mut self) -> CanvasResult<()> {
        self.clear_canvas();
        self.fill_canvas()
    }

    fn wire(&mut self, spec: ConnectionSpec) -> Option<ConnectionId> {
        match (self.node_id_at(spec.parent), self.node_id_at(spec.child)) {
            (Some(parent), Some(child)) => self.wire_ids(parent, child, spec.style),
            (Some(present), None) => {
                self.defer(DeferredConnection {
                    present,
                    present_is_parent: true,
                    missing: spec.child,
                    style: spec.style,
                });
                None
            }
            (None, Some(present)) => {
                self.defer(DeferredConnection {
                    present,
                    present_is_parent: false,
                    missing: spec.parent,
                    style: spec.style,
                });
                None
            }
            (None, None) => {
                warn!("connection {} has no endpoint on the canvas", spec.path());
                None
            }
        }
    }

    fn wire_ids(&mut self, parent: NodeId, child: NodeId, style: ConnectionStyle) -> Option<ConnectionId> {
        match self.graph.connect(parent, child, style) {
            Ok(id) => {
                self.resync_segments();
                Some(id)
            }
            // Reported by both endpoints
            Err(GraphViolation::DuplicateConnection) => None,
            Err(violation) => {
                warn!(
                    "skipping connection {:?} -> {:?} from data source: {}",
                    self.index_path_of(parent),
                    self.index_path_of(child),
                    violation
                );
                None
            }
        }
    }

    fn defer(&mut self, deferred: DeferredConnection) {
        if !self.deferred.contains(&deferred) {
            debug!("deferring connection to {} until it is inserted", deferred.missing);
            self.deferred.push(deferred);
        }
    }

    /// Re-derive segment membership and line visibility after a graph edit
    /// and report nodes that joined or left a segment.
    fn resync_segments(&mut self) {
        let change = segment::resync(&mut self.graph);
        self.report_resync(&change);
    }

    fn report_resync(&mut self, change: &segment::Resync) {
        for id in &change.left {
            if let Some(path) = self.index_path_of(*id) {
                self.delegate.did_expand_node(path);
            }
        }
        for id in &change.joined {
            if let Some(path) = self.index_path_of(*id) {
                self.delegate.did_collapse_node(path);
            }
        }
    }

    // === Touch handling ===

    /// Start a touch sequence at a scaled point.
    ///
    /// Returns the item that took the lock. Fails with
    /// [`CanvasError::InvalidGestureTarget`] when the lock is held or no
    /// item under the point accepts the touch.
    pub fn touch_began(&mut self, point: Point) -> CanvasResult<ItemId> {
        self.stale_owner = None;
        if !self.arbiter.is_idle() {
            debug!("touch at {:?} rejected, lock held by {:?}", point, self.arbiter.owner());
            return Err(CanvasError::InvalidGestureTarget);
        }

        let candidates: Vec<HitTarget> =
            hit_test::hits_at(&self.graph, point, &self.config, self.connect_mode)
                .into_iter()
                .map(|hit| self.route_to_segment_root(hit))
                .collect();

        let Some(target) = TouchArbiter::resolve(candidates, &*self) else {
            trace!("no item can process touch at {:?}", point);
            return Err(CanvasError::InvalidGestureTarget);
        };

        self.arbiter.lock(target, point);
        self.graph.bring_to_front(target.item());
        if let HitTarget::Node(id) = target {
            let scale = self.zoom_scale;
            if let Some(node) = self.graph.node_mut(id) {
                let offset = node.center() - point.unscaled(scale);
                node.set_touch_offset(offset);
            }
        }
        Ok(target.item())
    }

    /// Continue the touch sequence.
    pub fn touch_moved(&mut self, point: Point) -> CanvasResult<()> {
        if let Some(owner) = self.stale_owner {
            return Err(CanvasError::StaleReference(owner));
        }
        match self.arbiter.state().clone() {
            TouchState::Idle | TouchState::AwaitingAnimation { .. } => Ok(()),
            TouchState::SingleTouchLocked { target, .. } => {
                let gesture = self.begin_gesture(target)?;
                self.arbiter.activate(gesture);
                self.update_gesture(point)
            }
            TouchState::GestureActive { .. } => self.update_gesture(point),
        }
    }

    /// End the touch sequence and commit the gesture.
    ///
    /// A touch that never moved is a tap and selects the node under it.
    pub fn touch_ended(&mut self, point: Point) -> CanvasResult<()> {
        if let Some(owner) = self.stale_owner.take() {
            return Err(CanvasError::StaleReference(owner));
        }
        match self.arbiter.state().clone() {
            TouchState::Idle | TouchState::AwaitingAnimation { .. } => Ok(()),
            TouchState::SingleTouchLocked { target, .. } => {
                self.arbiter.release();
                self.clear_touch_offset(target.item());
                if let HitTarget::Node(id) = target {
                    self.select_node(id);
                }
                Ok(())
            }
            TouchState::GestureActive { owner, gesture } => {
                if let Err(err) = self.update_gesture(point) {
                    self.stale_owner = None;
                    return Err(err);
                }
                // Pick up target changes made by the final update
                let gesture = self.arbiter.gesture().cloned().unwrap_or(gesture);
                self.commit_gesture(owner, gesture, point)
            }
        }
    }

    /// Abort the touch sequence, rolling back any in-flight change.
    ///
    /// Always releases the lock, also while a snap-back is still playing.
    pub fn touch_cancelled(&mut self) -> CanvasResult<()> {
        self.stale_owner = None;
        self.cancel_active_gesture();
        Ok(())
    }

    /// Return to idle immediately, discarding transient handles and
    /// settling a pending snap-back.
    pub fn reset(&mut self) {
        self.stale_owner = None;
        let awaiting = match self.arbiter.state() {
            TouchState::AwaitingAnimation { animation, .. } => Some(*animation),
            _ => None,
        };
        if let Some(animation) = awaiting {
            if let Some(PendingAnimation {
                kind: AnimationKind::SnapBack { connection },
                ..
            }) = self.animations.finish(animation)
            {
                self.settle_connection(connection);
            }
        }
        self.cancel_active_gesture();
    }

    /// `true` unless idle; includes waiting for a snap-back.
    pub fn is_processing_items(&self) -> bool {
        !self.arbiter.is_idle()
    }

    /// `true` while a touch sequence owns the lock.
    pub fn is_locked_to_single_touch(&self) -> bool {
        matches!(
            self.arbiter.state(),
            TouchState::SingleTouchLocked { .. } | TouchState::GestureActive { .. }
        )
    }

    /// Toggle connect mode and return the new value.
    ///
    /// In connect mode a touch anywhere on a node starts a new connection.
    pub fn toggle_connect_mode(&mut self) -> bool {
        self.connect_mode = !self.connect_mode;
        debug!("connect mode {}", if self.connect_mode { "on" } else { "off" });
        self.connect_mode
    }

    pub fn is_connect_mode(&self) -> bool {
        self.connect_mode
    }

    /// Scaled endpoints of the line drawn by an active create gesture.
    pub fn transient_connection(&self) -> Option<(Point, Point)> {
        match self.arbiter.gesture()? {
            Gesture::CreateConnection { node, current, .. } => {
                let start = self.graph.node(*node)?.scaled_center();
                Some((start, *current))
            }
            _ => None,
        }
    }

    fn route_to_segment_root(&self, hit: HitTarget) -> HitTarget {
        match hit {
            HitTarget::Node(id) => self
                .graph
                .node(id)
                .and_then(Node::head_node)
                .map_or(hit, HitTarget::Node),
            other => other,
        }
    }

    fn stale(&mut self, item: ItemId) -> CanvasError {
        debug!("gesture target {} is gone", item);
        self.cancel_active_gesture();
        self.stale_owner = Some(item);
        CanvasError::StaleReference(item)
    }

    fn begin_gesture(&mut self, target: HitTarget) -> CanvasResult<Gesture> {
        match target {
            HitTarget::Node(id) => {
                let info = self
                    .graph
                    .node(id)
                    .map(|n| (n.center(), n.has_collapsed_sub_structure()));
                let Some((origin, collapsed)) = info else {
                    return Err(self.stale(id.into()));
                };
                Ok(if collapsed {
                    Gesture::SegmentDrag { root: id, origin }
                } else {
                    Gesture::Drag { node: id, origin }
                })
            }
            HitTarget::CreateAnchor(id) => {
                let Some(anchor) = self.graph.node(id).map(Node::scaled_handle_anchor) else {
                    return Err(self.stale(id.into()));
                };
                let handle = self.data_source.new_create_handle(anchor);
                let handle = self.spawn_handle(handle, HandleTarget::Node(id), anchor);
                Ok(Gesture::CreateConnection {
                    node: id,
                    handle,
                    current: anchor,
                    target: None,
                })
            }
            HitTarget::MoveAnchor(id) => {
                let info = self
                    .graph
                    .connection(id)
                    .filter(|c| c.is_valid())
                    .map(|c| (c.scaled_midpoint(), c.child()));
                let Some((anchor, original_child)) = info else {
                    return Err(self.stale(id.into()));
                };
                let handle = self.data_source.new_move_handle(anchor);
                let handle = self.spawn_handle(handle, HandleTarget::Connection(id), anchor);
                Ok(Gesture::MoveConnection {
                    connection: id,
                    handle,
                    original_child,
                    current: anchor,
                    target: None,
                })
            }
        }
    }

    fn spawn_handle(&mut self, mut handle: Handle, target: HandleTarget, anchor: Point) -> HandleId {
        if handle.size() == Size::default() {
            handle.set_size(self.config.handle_size);
        }
        let id = self.graph.insert_handle(handle, target);
        if let Some(handle) = self.graph.handle_mut(id) {
            handle.move_to_scaled(anchor);
        }
        id
    }

    fn update_gesture(&mut self, point: Point) -> CanvasResult<()> {
        let Some(gesture) = self.arbiter.gesture().cloned() else {
            return Ok(());
        };
        let scale = self.zoom_scale;

        match gesture {
            Gesture::Drag { node, .. } => {
                let Some(offset) = self.graph.node(node).map(|n| n.touch_offset()) else {
                    return Err(self.stale(node.into()));
                };
                let center = point.unscaled(scale) + offset;
                self.graph.move_node(node, center);
                segment::refresh_segment_rect(&mut self.graph, node);
                trace!("{:?} dragged to {:?}", node, center);
            }
            Gesture::SegmentDrag { root, .. } => {
                let Some(offset) = self.graph.node(root).map(|n| n.touch_offset()) else {
                    return Err(self.stale(root.into()));
                };
                let center = point.unscaled(scale) + offset;
                segment::move_segment(&mut self.graph, root, center);
                trace!("segment {:?} dragged to {:?}", root, center);
            }
            Gesture::CreateConnection {
                node,
                handle,
                target: previous,
                ..
            } => {
                if !self.graph.contains(node.into()) {
                    return Err(self.stale(node.into()));
                }
                if let Some(handle) = self.graph.handle_mut(handle) {
                    handle.move_to_scaled(point);
                }
                let target = hit_test::find_node_at(&self.graph, point, Some(node))
                    .filter(|&candidate| self.graph.validate_connection(node, candidate, None).is_valid());
                self.highlight_drop_target(previous, target);
                if let Some(Gesture::CreateConnection {
                    current, target: t, ..
                }) = self.arbiter.gesture_mut()
                {
                    *current = point;
                    *t = target;
                }
            }
            Gesture::MoveConnection {
                connection,
                handle,
                target: previous,
                ..
            } => {
                let parent = self
                    .graph
                    .connection(connection)
                    .filter(|c| c.is_valid())
                    .map(Connection::parent);
                let Some(parent) = parent else {
                    return Err(self.stale(connection.into()));
                };
                if let Some(handle) = self.graph.handle_mut(handle) {
                    handle.move_to_scaled(point);
                }
                if let Some(c) = self.graph.connection_mut(connection) {
                    c.draw_to_point(point);
                }
                let target = hit_test::find_node_at(&self.graph, point, Some(parent)).filter(|&candidate| {
                    self.graph
                        .validate_connection(parent, candidate, Some(connection))
                        .is_valid()
                });
                self.highlight_drop_target(previous, target);
                if let Some(Gesture::MoveConnection {
                    current, target: t, ..
                }) = self.arbiter.gesture_mut()
                {
                    *current = point;
                    *t = target;
                }
            }
        }
        Ok(())
    }

    fn commit_gesture(&mut self, owner: ItemId, gesture: Gesture, point: Point) -> CanvasResult<()> {
        self.highlight_drop_target(gesture.target(), None);
        self.clear_touch_offset(owner);

        match gesture {
            Gesture::Drag { node, .. } => {
                self.arbiter.release();
                if let Some(path) = self.index_path_of(node) {
                    debug!("node at {} moved", path);
                    self.delegate.did_move_node(path);
                }
                Ok(())
            }
            Gesture::SegmentDrag { root, .. } => {
                self.arbiter.release();
                let paths: Vec<IndexPath> = std::iter::once(root)
                    .chain(segment::members_of(&self.graph, root))
                    .filter_map(|id| self.index_path_of(id))
                    .collect();
                debug!("segment with {} nodes moved", paths.len());
                self.delegate.did_move_segment(&paths);
                Ok(())
            }
            Gesture::CreateConnection { node, handle, .. } => {
                self.arbiter.release();
                self.graph.remove_handle(handle);
                match hit_test::find_node_at(&self.graph, point, Some(node)) {
                    Some(child) => self.commit_new_connection(node, child).map(|_| ()),
                    None => {
                        debug!("create gesture ended on empty canvas");
                        Ok(())
                    }
                }
            }
            Gesture::MoveConnection {
                connection,
                handle,
                original_child,
                ..
            } => {
                self.graph.remove_handle(handle);
                let parent = self.graph.connection(connection).map(Connection::parent);
                let candidate = parent
                    .and_then(|p| hit_test::find_node_at(&self.graph, point, Some(p)))
                    .filter(|&c| c != original_child);

                let outcome = match candidate {
                    Some(new_child) => self.commit_retarget(connection, new_child),
                    None => Ok(()),
                };
                match (candidate, &outcome) {
                    (Some(_), Ok(())) => {
                        self.arbiter.release();
                    }
                    _ => self.snap_back(connection),
                }
                outcome
            }
        }
    }

    fn commit_new_connection(&mut self, parent: NodeId, child: NodeId) -> CanvasResult<ConnectionId> {
        let parent_path = self
            .index_path_of(parent)
            .ok_or(CanvasError::StaleReference(parent.into()))?;
        let child_path = self
            .index_path_of(child)
            .ok_or(CanvasError::StaleReference(child.into()))?;

        let style = self.data_source.new_connection(parent_path);
        let id = self.graph.connect(parent, child, style)?;
        let resync = segment::resync(&mut self.graph);

        let path = ConnectionPath::new(parent_path, child_path);
        debug!("connection {} added", path);
        self.delegate.did_add_connection(path);
        self.report_resync(&resync);
        Ok(id)
    }

    fn commit_retarget(&mut self, connection: ConnectionId, new_child: NodeId) -> CanvasResult<()> {
        let from = self
            .connection_path(connection)
            .ok_or(CanvasError::StaleReference(connection.into()))?;
        let child_path = self
            .index_path_of(new_child)
            .ok_or(CanvasError::StaleReference(new_child.into()))?;

        self.graph.retarget_connection(connection, new_child)?;
        let resync = segment::resync(&mut self.graph);

        let to = ConnectionPath::new(from.parent, child_path);
        debug!("connection {} moved to {}", from, to);
        self.delegate.did_move_connection(from, to);
        self.report_resync(&resync);
        Ok(())
    }

    /// Start the snap-back animation; the lock is held until it completes.
    fn snap_back(&mut self, connection: ConnectionId) {
        let animation = self.animations.start(
            AnimationKind::SnapBack { connection },
            self.config.snap_back_duration(),
        );
        if let Some(c) = self.graph.connection_mut(connection) {
            c.animation = ConnectionAnimation::SnapBack(animation);
        }
        self.arbiter.await_animation(animation);
    }

    fn settle_connection(&mut self, connection: ConnectionId) {
        if let Some(c) = self.graph.connection_mut(connection) {
            if matches!(c.animation, ConnectionAnimation::SnapBack(_)) {
                c.animation = ConnectionAnimation::None;
            }
        }
        self.graph.redraw_connection(connection);
    }

    /// Release the lock and roll back whatever the gesture changed.
    ///
    /// Returns the state that was cancelled.
    fn cancel_active_gesture(&mut self) -> TouchState {
        let previous = self.arbiter.release();
        match &previous {
            TouchState::Idle => {}
            TouchState::SingleTouchLocked { owner, .. } => self.clear_touch_offset(*owner),
            TouchState::GestureActive { owner, gesture } => {
                self.clear_touch_offset(*owner);
                self.rollback(gesture.clone());
            }
            // The snap-back keeps playing and settles on completion
            TouchState::AwaitingAnimation { .. } => {}
        }
        previous
    }

    fn rollback(&mut self, gesture: Gesture) {
        self.highlight_drop_target(gesture.target(), None);
        let kind = gesture.kind();
        match gesture {
            Gesture::Drag { node, origin } => {
                self.graph.move_node(node, origin);
                segment::refresh_segment_rect(&mut self.graph, node);
            }
            Gesture::SegmentDrag { root, origin } => {
                segment::move_segment(&mut self.graph, root, origin);
            }
            Gesture::CreateConnection { handle, .. } => {
                self.graph.remove_handle(handle);
            }
            Gesture::MoveConnection {
                connection, handle, ..
            } => {
                self.graph.remove_handle(handle);
                self.graph.redraw_connection(connection);
            }
        }
        debug!("rolled back {:?} gesture", kind);
    }

    fn highlight_drop_target(&mut self, previous: Option<NodeId>, next: Option<NodeId>) {
        if previous == next {
            return;
        }
        if let Some(node) = previous.and_then(|id| self.graph.node_mut(id)) {
            node.set_highlighted(false);
        }
        if let Some(node) = next.and_then(|id| self.graph.node_mut(id)) {
            node.set_highlighted(true);
        }
    }

    fn clear_touch_offset(&mut self, owner: ItemId) {
        if let ItemId::Node(id) = owner {
            if let Some(node) = self.graph.node_mut(id) {
                node.set_touch_offset(Offset::ZERO);
            }
        }
    }

    fn select_node(&mut self, id: NodeId) {
        self.selection.handle_interaction(id, false);
        let ids: Vec<NodeId> = self.graph.nodes().map(|(id, _)| id).collect();
        for node_id in ids {
            let selected = self.selection.contains(node_id);
            if let Some(node) = self.graph.node_mut(node_id) {
                node.set_selected(selected);
            }
        }
        if let Some(path) = self.index_path_of(id) {
            debug!("node at {} selected", path);
            self.delegate.did_select_node(path);
        }
    }

    /// Index paths of the selected nodes, in order.
    pub fn selected_index_paths(&self) -> Vec<IndexPath> {
        let mut paths: Vec<IndexPath> = self
            .selection
            .iter()
            .filter_map(|id| self.index_path_of(id))
            .collect();
        paths.sort();
        paths
    }

    // === Gesture invalidation ===

    /// Whether the lock owner manipulates `node`.
    fn gesture_involves(&self, node: NodeId) -> bool {
        match self.arbiter.owner() {
            None => false,
            Some(ItemId::Node(owner)) => {
                owner == node
                    || self.graph.node(node).and_then(Node::head_node) == Some(owner)
            }
            Some(ItemId::Connection(connection)) => {
                let endpoints = self
                    .graph
                    .connection(connection)
                    .map(|c| (c.parent(), c.child()));
                let original = match self.arbiter.gesture() {
                    Some(Gesture::MoveConnection { original_child, .. }) => Some(*original_child),
                    _ => None,
                };
                endpoints.is_some_and(|(p, c)| p == node || c == node) || original == Some(node)
            }
            Some(ItemId::Handle(_)) => false,
        }
    }

    /// Cancel the gesture before an external edit; the remaining events of
    /// a live touch sequence report a stale reference.
    fn cancel_for_edit(&mut self) {
        match self.cancel_active_gesture() {
            TouchState::SingleTouchLocked { owner, .. } | TouchState::GestureActive { owner, .. } => {
                debug!("gesture of {} cancelled by a data update", owner);
                self.stale_owner = Some(owner);
            }
            _ => {}
        }
    }

    // === Data updates ===

    /// Reload the node at `path` from the data source, keeping its connections.
    pub fn update_at_index_path(&mut self, path: IndexPath) -> CanvasResult<()> {
        let id = self.resolve(path)?;
        let fresh = self
            .data_source
            .node(path)
            .ok_or(CanvasError::InconsistentIndexPath(path))?;

        if self.gesture_involves(id) {
            self.cancel_for_edit();
        }

        let Some(node) = self.graph.node_mut(id) else {
            return Err(CanvasError::StaleReference(id.into()));
        };
        node.update_from(fresh);
        let center = node.center();
        let collapsed = node.has_collapsed_sub_structure();
        let head = node.head_node();

        if collapsed {
            segment::move_segment(&mut self.graph, id, center);
        } else {
            self.graph.redraw_connections_of(id);
        }

        if let Some(head) = head {
            let head_center = self.graph.node(head).map(|n| n.center());
            if let (Some(head_center), Some(node)) = (head_center, self.graph.node_mut(id)) {
                node.set_segment_membership(Some(SegmentMembership {
                    head,
                    delta: center - head_center,
                }));
            }
            segment::refresh_segment_rect(&mut self.graph, head);
        } else if !collapsed {
            segment::refresh_segment_rect(&mut self.graph, id);
        }

        debug!("node at {} updated", path);
        Ok(())
    }

    /// Insert the node the data source now reports at `path`.
    ///
    /// Rows at or after `path.row` shift down by one. Connections are wired
    /// once both endpoints exist.
    pub fn insert_at_index_path(&mut self, path: IndexPath) -> CanvasResult<NodeId> {
        let rows = match self.sections.get(path.section) {
            Some(rows) => rows.len(),
            None if path.section == self.sections.len() => 0,
            None => return Err(CanvasError::InconsistentIndexPath(path)),
        };
        if path.row > rows {
            return Err(CanvasError::InconsistentIndexPath(path));
        }
        let node = self
            .data_source
            .node(path)
            .ok_or(CanvasError::InconsistentIndexPath(path))?;

        let id = self.graph.insert_node(node);
        if path.section == self.sections.len() {
            self.sections.push(Vec::new());
        }
        if let Some(rows) = self.sections.get_mut(path.section) {
            rows.insert(path.row, id);
        }
        self.reindex();

        let (ready, waiting): (Vec<_>, Vec<_>) = self
            .deferred
            .drain(..)
            .partition(|d| d.missing == path);
        self.deferred = waiting;
        for deferred in ready {
            let (parent, child) = if deferred.present_is_parent {
                (deferred.present, id)
            } else {
                (id, deferred.present)
            };
            self.wire_ids(parent, child, deferred.style);
        }
        for spec in self.data_source.connections(path) {
            self.wire(spec);
        }

        debug!("node inserted at {}", path);
        Ok(id)
    }

    /// Delete the node at `path` and cascade to its connections.
    ///
    /// Every connection is invalidated first and removed when its animation
    /// completes. The node then leaves hit testing and the index paths at
    /// once but stays resolvable by id until its last connection is gone, so
    /// a removing connection never names a missing endpoint. The neighbours
    /// accept no touch until the whole cascade has completed.
    pub fn delete_at_index_path(&mut self, path: IndexPath) -> CanvasResult<()> {
        let id = self.resolve(path)?;

        if self.gesture_involves(id) {
            self.cancel_for_edit();
        }

        // Members must never name a missing root
        if self.graph.node(id).is_some_and(Node::has_collapsed_sub_structure) {
            segment::expand(&mut self.graph, id);
        }
        let head = self.graph.node(id).and_then(Node::head_node);

        let connections: Vec<ConnectionId> = self
            .graph
            .node(id)
            .map(|n| {
                n.child_connections()
                    .iter()
                    .chain(n.parent_connections().iter())
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        let mut cascade = DeletionCascade::default();
        for connection in connections {
            let Some(c) = self.graph.connection(connection).filter(|c| c.is_valid()) else {
                continue;
            };
            let neighbour = if c.parent() == id { c.child() } else { c.parent() };
            let snap_back = match c.animation() {
                ConnectionAnimation::SnapBack(animation) => Some(animation),
                _ => None,
            };
            // Captured now, the endpoint is gone by completion time
            let Some(connection_path) = self.connection_path(connection) else {
                continue;
            };

            if let Some(animation) = snap_back {
                self.animations.finish(animation);
                if self.arbiter.is_awaiting(animation) {
                    self.arbiter.release();
                }
            }

            let animation = self.start_removal(connection, connection_path);
            cascade.animations.push(animation);
            if !cascade.neighbours.contains(&neighbour) {
                cascade.neighbours.push(neighbour);
            }
        }

        let removed = cascade.animations.len();
        if removed > 0 {
            self.cascades.push(cascade);
        }

        self.graph.retire_node(id);
        if let Some(head) = head {
            segment::refresh_segment_rect(&mut self.graph, head);
        }
        if let Some(rows) = self.sections.get_mut(path.section) {
            rows.remove(path.row);
        }
        self.reindex();
        self.selection.remove(id);
        self.deferred.retain(|d| d.present != id);

        debug!("node at {} deleted, {} connections removing", path, removed);
        self.delegate.did_delete_node(path);
        self.resync_segments();
        Ok(())
    }

    fn start_removal(&mut self, connection: ConnectionId, path: ConnectionPath) -> AnimationId {
        let animation = self.animations.start(
            AnimationKind::ConnectionRemoval { connection, path },
            self.config.removal_duration(),
        );
        self.graph.begin_connection_removal(connection, animation);
        debug!("removing connection {} ({})", path, animation);
        animation
    }

    // === Programmatic graph edits ===

    /// Connect two nodes, rejecting self connections, duplicates and cycles.
    pub fn add_connection(&mut self, parent: IndexPath, child: IndexPath) -> CanvasResult<ConnectionId> {
        let parent = self.resolve(parent)?;
        let child = self.resolve(child)?;
        self.commit_new_connection(parent, child)
    }

    /// Start removing a connection; the delegate hears about it once the
    /// returned animation completes.
    pub fn remove_connection(&mut self, path: ConnectionPath) -> CanvasResult<AnimationId> {
        let connection = self.resolve_connection(path)?;
        if self.arbiter.owner() == Some(ItemId::Connection(connection)) {
            self.cancel_for_edit();
        }
        if let Some(ConnectionAnimation::SnapBack(animation)) =
            self.graph.connection(connection).map(Connection::animation)
        {
            self.animations.finish(animation);
            if self.arbiter.is_awaiting(animation) {
                self.arbiter.release();
            }
        }
        let animation = self.start_removal(connection, path);
        self.resync_segments();
        Ok(animation)
    }

    /// Point the connection at `path` to a new child.
    pub fn retarget_connection(&mut self, path: ConnectionPath, new_child: IndexPath) -> CanvasResult<()> {
        let connection = self.resolve_connection(path)?;
        let new_child = self.resolve(new_child)?;
        if self.arbiter.owner() == Some(ItemId::Connection(connection)) {
            self.cancel_for_edit();
        }
        self.commit_retarget(connection, new_child)
    }

    pub fn set_connection_style(&mut self, path: ConnectionPath, style: ConnectionStyle) -> CanvasResult<()> {
        let connection = self.resolve_connection(path)?;
        if let Some(c) = self.graph.connection_mut(connection) {
            c.set_style(style);
        }
        self.delegate.did_change_connection_attributes(path);
        Ok(())
    }

    pub fn set_node_editing(&mut self, path: IndexPath, editing: bool) -> CanvasResult<()> {
        let id = self.resolve(path)?;
        if let Some(node) = self.graph.node_mut(id) {
            node.set_editing(editing);
        }
        Ok(())
    }

    /// Collapse the sub graph below the node at `path` into a rigid segment.
    pub fn collapse_node_at_index_path(&mut self, path: IndexPath) -> CanvasResult<()> {
        let id = self.resolve(path)?;
        if self.graph.node(id).is_some_and(Node::is_in_collapsed_segment) {
            return Err(CanvasError::CollapsedSegmentMember(path));
        }

        let descendants = self.graph.descendants(id, None);
        if std::iter::once(id).chain(descendants).any(|n| self.gesture_involves(n)) {
            self.cancel_for_edit();
        }

        let Some(change) = segment::collapse(&mut self.graph, id) else {
            return Err(CanvasError::InconsistentIndexPath(path));
        };
        let members: Vec<IndexPath> = change
            .members
            .iter()
            .filter_map(|m| self.index_path_of(*m))
            .collect();

        for member in &members {
            self.delegate.did_collapse_node(*member);
        }
        self.delegate.did_collapse_segment(path, &members);
        if !change.connections.is_empty() {
            self.delegate.did_collapse_connections_below(path);
        }
        self.report_resync(&change.resync);
        Ok(())
    }

    /// Expand a collapsed segment. Expanding a node that is not collapsed
    /// is a no-op.
    pub fn expand_node_at_index_path(&mut self, path: IndexPath) -> CanvasResult<()> {
        let id = self.resolve(path)?;
        if self.graph.node(id).is_some_and(Node::is_in_collapsed_segment) {
            return Err(CanvasError::CollapsedSegmentMember(path));
        }

        let members = segment::members_of(&self.graph, id);
        if std::iter::once(id).chain(members).any(|n| self.gesture_involves(n)) {
            self.cancel_for_edit();
        }

        let Some(change) = segment::expand(&mut self.graph, id) else {
            return Ok(());
        };
        let members: Vec<IndexPath> = change
            .members
            .iter()
            .filter_map(|m| self.index_path_of(*m))
            .collect();

        for member in &members {
            self.delegate.did_expand_node(*member);
        }
        self.delegate.did_expand_segment(path, &members);
        if !change.connections.is_empty() {
            self.delegate.did_expand_connections_below(path);
        }
        self.report_resync(&change.resync);
        Ok(())
    }

    // === Animations ===

    /// Animations waiting for their completion callback, oldest first.
    pub fn pending_animations(&self) -> impl Iterator<Item = &PendingAnimation> {
        self.animations.iter()
    }

    /// Run the continuation of a finished animation.
    ///
    /// Each animation completes once; a second report fails with
    /// [`CanvasError::UnknownAnimation`].
    pub fn complete_animation(&mut self, id: AnimationId) -> CanvasResult<()> {
        let Some(pending) = self.animations.finish(id) else {
            return Err(CanvasError::UnknownAnimation(id));
        };

        match pending.kind {
            AnimationKind::ConnectionRemoval { connection, path } => {
                self.graph.finish_connection_removal(connection);
                self.cascades.retain_mut(|cascade| {
                    cascade.animations.retain(|a| *a != id);
                    !cascade.animations.is_empty()
                });
                debug!("connection {} removed", path);
                self.delegate.did_remove_connection(path);
            }
            AnimationKind::SnapBack { connection } => {
                self.settle_connection(connection);
                if self.arbiter.is_awaiting(id) {
                    self.arbiter.release();
                }
                debug!("connection snapped back ({})", id);
            }
        }
        Ok(())
    }

    /// Complete every pending animation in order. Returns how many ran.
    pub fn complete_all_animations(&mut self) -> usize {
        let ids = self.animations.ids();
        ids.iter()
            .filter(|id| self.complete_animation(**id).is_ok())
            .count()
    }

    // === Zoom and sizing ===

    /// Apply a new zoom scale, clamped into the configured range.
    ///
    /// Non-finite and non-positive scales are ignored. Returns the scale in
    /// effect afterwards.
    pub fn zoom_to_scale(&mut self, scale: f32) -> f32 {
        if !scale.is_finite() || scale <= 0.0 {
            debug!("ignoring zoom scale {}", scale);
            return self.zoom_scale;
        }
        let scale = self.config.clamp_zoom(scale);
        self.zoom_scale = scale;
        self.graph.set_zoom_scale(scale);

        // A moving connection keeps following its handle
        if let Some(Gesture::MoveConnection {
            connection, handle, ..
        }) = self.arbiter.gesture().cloned()
        {
            let end = self.graph.handle(handle).map(|h| h.scaled_center());
            if let (Some(end), Some(c)) = (end, self.graph.connection_mut(connection)) {
                c.draw_to_point(end);
            }
        }

        debug!("zoom scale set to {}", scale);
        scale
    }

    /// Scaled content size covering every node plus padding, never smaller
    /// than the configured minimum.
    pub fn size_canvas_to_fit(&self) -> Size {
        let bounds = self
            .graph
            .nodes()
            .map(|(_, node)| node.frame())
            .reduce(|a, b| a.union(&b));
        let padding = self.config.content_padding;
        let content = match bounds {
            Some(rect) => Size::new(rect.max_x() + padding, rect.max_y() + padding),
            None => Size::default(),
        }
        .scaled(self.zoom_scale);

        let min = self.config.min_content_size;
        Size::new(content.width.max(min.width), content.height.max(min.height))
    }

    fn in_cascade(&self, node: NodeId) -> bool {
        self.cascades.iter().any(|c| c.neighbours.contains(&node))
    }
}

impl<S: CanvasDataSource, D: CanvasDelegate> TouchEligibility for Canvas<S, D> {
    /// An item may take the lock only while the canvas is idle and nothing
    /// involving it is still animating.
    fn can_process(&self, item: ItemId) -> bool {
        if !self.arbiter.is_idle() {
            return false;
        }
        match item {
            ItemId::Node(id) => {
                self.graph.contains(item)
                    && !self.graph.has_busy_connection(id)
                    && !self.in_cascade(id)
            }
            ItemId::Connection(id) => self.graph.connection(id).is_some_and(|c| {
                c.is_valid()
                    && !c.is_hidden()
                    && c.animation() == ConnectionAnimation::None
                    && !self.in_cascade(c.parent())
                    && !self.in_cascade(c.child())
            }),
            ItemId::Handle(_) => false,
        }
    }
}
