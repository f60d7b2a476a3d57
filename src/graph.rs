use crate::animation::AnimationId;
use crate::connection::{Connection, ConnectionAnimation, ConnectionStyle};
use crate::geometry::Point;
use crate::handle::{Handle, HandleTarget};
use crate::item::{CanvasItem, ConnectionId, HandleId, ItemId, NodeId};
use crate::node::Node;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Live collections of nodes, connections and handles.
///
/// Insertion order is z-order: the last entry of [`z_order`](Self::z_order)
/// is the topmost item and wins hit tests. Items reference each other by id
/// only, so removing an item never leaves a dangling pointer, only an id that
/// no longer resolves.
///
/// Every mutating operation keeps the node connection lists consistent with
/// the connections' own parent/child references.
pub struct CanvasGraph {
    nodes: HashMap<NodeId, Node>,
    connections: HashMap<ConnectionId, Connection>,
    handles: HashMap<HandleId, Handle>,
    z_order: Vec<ItemId>,
    next_id: u32,
    zoom_scale: f32,
    validator: Box<dyn ConnectionValidator>,
}

impl Default for CanvasGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasGraph {
    /// Create an empty graph using [`CompositeValidator::standard`].
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            connections: HashMap::new(),
            handles: HashMap::new(),
            z_order: Vec::new(),
            next_id: 0,
            zoom_scale: 1.0,
            validator: Box::new(CompositeValidator::standard()),
        }
    }

    /// Replace the connection validator.
    ///
    /// Custom validators should usually wrap [`CompositeValidator::standard`]
    /// so self connections, duplicates and cycles stay rejected.
    pub fn set_validator<V: ConnectionValidator + 'static>(&mut self, validator: V) {
        self.validator = Box::new(validator);
    }

    fn next_raw_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    // === Lookup ===

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn handle(&self, id: HandleId) -> Option<&Handle> {
        self.handles.get(&id)
    }

    pub fn handle_mut(&mut self, id: HandleId) -> Option<&mut Handle> {
        self.handles.get_mut(&id)
    }

    /// Live nodes; retired nodes are skipped.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .filter(|(_, node)| !node.retired)
            .map(|(&id, node)| (id, node))
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections.iter().map(|(&id, c)| (id, c))
    }

    pub fn handles(&self) -> impl Iterator<Item = (HandleId, &Handle)> {
        self.handles.iter().map(|(&id, h)| (id, h))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.values().filter(|node| !node.retired).count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Whether `item` still resolves to a live item.
    pub fn contains(&self, item: ItemId) -> bool {
        match item {
            ItemId::Node(id) => self.nodes.get(&id).is_some_and(|n| !n.retired),
            ItemId::Connection(id) => self.connections.contains_key(&id),
            ItemId::Handle(id) => self.handles.contains_key(&id),
        }
    }

    /// Items bottom to top.
    pub fn z_order(&self) -> &[ItemId] {
        &self.z_order
    }

    /// Move `item` to the top of the z-order.
    pub fn bring_to_front(&mut self, item: ItemId) {
        if let Some(pos) = self.z_order.iter().position(|&i| i == item) {
            self.z_order.remove(pos);
            self.z_order.push(item);
        }
    }

    pub fn zoom_scale(&self) -> f32 {
        self.zoom_scale
    }

    /// Valid connection from `parent` to `child`, if one exists.
    pub fn connection_between(&self, parent: NodeId, child: NodeId) -> Option<ConnectionId> {
        let node = self.nodes.get(&parent)?;
        node.child_connections.iter().copied().find(|id| {
            self.connections
                .get(id)
                .is_some_and(|c| c.is_valid() && c.child == child)
        })
    }

    // === Nodes ===

    /// Add a node on top of the z-order.
    pub fn insert_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.next_raw_id());
        node.reset();
        node.set_zoom_scale(self.zoom_scale);
        self.nodes.insert(id, node);
        self.z_order.push(ItemId::Node(id));
        id
    }

    /// Take a deleted node off the canvas once its connections are invalid.
    ///
    /// A node without connections is removed at once. Otherwise it leaves the
    /// z-order and the live iteration but stays resolvable by id until the
    /// last of its connections completes
    /// [`finish_connection_removal`](Self::finish_connection_removal).
    /// Returns `true` when the node was dropped immediately.
    pub fn retire_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.child_connections.is_empty() && node.parent_connections.is_empty() {
            return self.remove_node(id).is_some();
        }
        node.retired = true;
        node.set_segment_membership(None);
        node.has_collapsed_sub_structure = false;
        let handle = node.create_handle;
        self.z_order.retain(|&item| item != ItemId::Node(id));
        if let Some(handle) = handle {
            self.remove_handle(handle);
        }
        false
    }

    /// Remove a node and its create handle outright.
    ///
    /// Connection ids stay in the surviving endpoints until
    /// [`finish_connection_removal`](Self::finish_connection_removal).
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.z_order.retain(|&item| item != ItemId::Node(id));
        if let Some(handle) = node.create_handle {
            self.remove_handle(handle);
        }
        Some(node)
    }

    // === Handles ===

    /// Attach `handle` to `target` and put it on top of the z-order.
    pub fn insert_handle(&mut self, mut handle: Handle, target: HandleTarget) -> HandleId {
        let id = HandleId(self.next_raw_id());
        handle.target = target;
        handle.set_zoom_scale(self.zoom_scale);
        match target {
            HandleTarget::Node(node) => {
                if let Some(node) = self.nodes.get_mut(&node) {
                    node.create_handle = Some(id);
                }
            }
            HandleTarget::Connection(connection) => {
                if let Some(connection) = self.connections.get_mut(&connection) {
                    connection.move_handle = Some(id);
                }
            }
            HandleTarget::Detached => {}
        }
        self.handles.insert(id, handle);
        self.z_order.push(ItemId::Handle(id));
        id
    }

    /// Destroy a handle and clear the back reference on its target.
    pub fn remove_handle(&mut self, id: HandleId) -> Option<Handle> {
        let handle = self.handles.remove(&id)?;
        self.z_order.retain(|&item| item != ItemId::Handle(id));
        match handle.target {
            HandleTarget::Node(node) => {
                if let Some(node) = self.nodes.get_mut(&node) {
                    if node.create_handle == Some(id) {
                        node.create_handle = None;
                    }
                }
            }
            HandleTarget::Connection(connection) => {
                if let Some(connection) = self.connections.get_mut(&connection) {
                    if connection.move_handle == Some(id) {
                        connection.move_handle = None;
                    }
                }
            }
            HandleTarget::Detached => {}
        }
        Some(handle)
    }

    // === Connections ===

    /// Check whether `parent -> child` may be added.
    ///
    /// `ignore` excludes an existing connection from duplicate and cycle
    /// checks, which is what retargeting needs.
    pub fn validate_connection(
        &self,
        parent: NodeId,
        child: NodeId,
        ignore: Option<ConnectionId>,
    ) -> ValidationResult {
        self.validator.validate(parent, child, self, ignore)
    }

    /// Validate and register a new connection in both endpoint nodes.
    pub fn connect(
        &mut self,
        parent: NodeId,
        child: NodeId,
        style: ConnectionStyle,
    ) -> Result<ConnectionId, GraphViolation> {
        self.validate_connection(parent, child, None).into_result()?;

        let id = ConnectionId(self.next_raw_id());
        let mut connection = Connection::new(parent, child, style);
        connection.set_zoom_scale(self.zoom_scale);
        self.connections.insert(id, connection);

        if let Some(node) = self.nodes.get_mut(&parent) {
            node.child_connections.push(id);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent_connections.push(id);
        }
        self.refresh_connected_nodes(parent);
        self.refresh_connected_nodes(child);

        self.z_order.push(ItemId::Connection(id));
        self.redraw_connection(id);
        Ok(id)
    }

    /// Mark a connection invalid; it no longer takes part in hit testing or
    /// graph queries but stays registered until its removal completes.
    pub fn begin_connection_removal(&mut self, id: ConnectionId, animation: AnimationId) -> bool {
        let Some(connection) = self.connections.get_mut(&id) else {
            return false;
        };
        connection.invalidate(animation);
        true
    }

    /// Unregister a connection from both endpoints and drop it.
    pub fn finish_connection_removal(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        self.z_order.retain(|&item| item != ItemId::Connection(id));

        if let Some(node) = self.nodes.get_mut(&connection.parent) {
            node.child_connections.retain(|&c| c != id);
        }
        if let Some(node) = self.nodes.get_mut(&connection.child) {
            node.parent_connections.retain(|&c| c != id);
        }
        self.refresh_connected_nodes(connection.parent);
        self.refresh_connected_nodes(connection.child);

        if let Some(handle) = connection.move_handle {
            self.remove_handle(handle);
        }
        self.drop_if_detached(connection.parent);
        self.drop_if_detached(connection.child);
        Some(connection)
    }

    /// Drop a retired node once nothing references it any more.
    fn drop_if_detached(&mut self, id: NodeId) {
        let detached = self.nodes.get(&id).is_some_and(|n| {
            n.retired && n.child_connections.is_empty() && n.parent_connections.is_empty()
        });
        if detached {
            self.remove_node(id);
        }
    }

    /// Point the child end of a connection at `new_child`.
    ///
    /// Returns the previous child on success. The connection's own edge is
    /// excluded from the duplicate and cycle checks.
    pub fn retarget_connection(
        &mut self,
        id: ConnectionId,
        new_child: NodeId,
    ) -> Result<NodeId, GraphViolation> {
        let (parent, old_child) = match self.connections.get(&id) {
            Some(c) if c.is_valid() => (c.parent, c.child),
            _ => return Err(GraphViolation::ConnectionNotFound(id)),
        };

        self.validate_connection(parent, new_child, Some(id)).into_result()?;

        if let Some(node) = self.nodes.get_mut(&old_child) {
            node.parent_connections.retain(|&c| c != id);
        }
        if let Some(node) = self.nodes.get_mut(&new_child) {
            node.parent_connections.push(id);
        }
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.child = new_child;
        }

        self.refresh_connected_nodes(parent);
        self.refresh_connected_nodes(old_child);
        self.refresh_connected_nodes(new_child);
        self.redraw_connection(id);
        Ok(old_child)
    }

    /// Whether the node has a connection that is being removed or snapping back.
    pub fn has_busy_connection(&self, node: NodeId) -> bool {
        let Some(node) = self.nodes.get(&node) else {
            return false;
        };
        node.child_connections
            .iter()
            .chain(node.parent_connections.iter())
            .filter_map(|id| self.connections.get(id))
            .any(|c| !c.is_valid() || c.animation != ConnectionAnimation::None)
    }

    fn refresh_connected_nodes(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let mut connected: Vec<NodeId> = Vec::new();
        for connection in node.child_connections.iter().filter_map(|c| self.connections.get(c)) {
            if !connected.contains(&connection.child) {
                connected.push(connection.child);
            }
        }
        for connection in node.parent_connections.iter().filter_map(|c| self.connections.get(c)) {
            if !connected.contains(&connection.parent) {
                connected.push(connection.parent);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.connected_nodes = connected;
        }
    }

    // === Traversal ===

    /// All nodes reachable from `root` over valid child connections,
    /// breadth first, `root` excluded.
    pub fn descendants(&self, root: NodeId, ignore: Option<ConnectionId>) -> Vec<NodeId> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([root]);
        visited.insert(root);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for connection_id in &node.child_connections {
                if Some(*connection_id) == ignore {
                    continue;
                }
                let Some(connection) = self.connections.get(connection_id) else {
                    continue;
                };
                if !connection.is_valid() {
                    continue;
                }
                if visited.insert(connection.child) {
                    order.push(connection.child);
                    queue.push_back(connection.child);
                }
            }
        }
        order
    }

    /// Whether `target` is reachable from `from` over valid child connections.
    pub fn reaches(&self, from: NodeId, target: NodeId, ignore: Option<ConnectionId>) -> bool {
        from == target || self.descendants(from, ignore).contains(&target)
    }

    // === Geometry ===

    /// Re-derive the visible line of a connection from its endpoints.
    ///
    /// Invalid connections keep their frozen geometry.
    pub fn redraw_connection(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.get(&id) else {
            return;
        };
        if !connection.is_valid() {
            return;
        }
        let start = self.nodes.get(&connection.parent).map(|n| n.scaled_center());
        let end = self.nodes.get(&connection.child).map(|n| n.scaled_center());
        if let (Some(start), Some(end), Some(connection)) =
            (start, end, self.connections.get_mut(&id))
        {
            connection.draw_between(start, end);
        }
    }

    /// Redraw every connection touching `node`.
    pub fn redraw_connections_of(&mut self, node: NodeId) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        let ids: Vec<ConnectionId> = n
            .child_connections
            .iter()
            .chain(n.parent_connections.iter())
            .copied()
            .collect();
        for id in ids {
            self.redraw_connection(id);
        }
    }

    /// Move a node (unscaled center) and redraw its connections.
    pub fn move_node(&mut self, id: NodeId, center: Point) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_center(center);
        } else {
            return;
        }
        self.redraw_connections_of(id);
    }

    /// Apply a new zoom scale to every item.
    ///
    /// Stored centers are untouched; visible connection geometry is re-derived
    /// and handles follow automatically since they are stored unscaled.
    pub fn set_zoom_scale(&mut self, scale: f32) {
        let old_scale = self.zoom_scale;
        self.zoom_scale = scale;
        for node in self.nodes.values_mut() {
            node.set_zoom_scale(scale);
        }
        for handle in self.handles.values_mut() {
            handle.set_zoom_scale(scale);
        }
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for id in ids {
            if let Some(connection) = self.connections.get_mut(&id) {
                connection.set_zoom_scale(scale);
                if !connection.is_valid() {
                    connection.rescale_frozen(old_scale, scale);
                }
            }
            self.redraw_connection(id);
        }
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
        self.handles.clear();
        self.z_order.clear();
    }
}

// ============================================================================
// Connection Validation Framework
// ============================================================================

/// Result of connection validation with optional rejection reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Connection is valid
    Valid,
    /// Connection is invalid with a reason
    Invalid(GraphViolation),
}

impl ValidationResult {
    /// Check if the result is valid
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Combine two results (AND logic): returns first error if any
    pub fn and(self, other: ValidationResult) -> ValidationResult {
        match self {
            ValidationResult::Valid => other,
            invalid => invalid,
        }
    }

    pub fn into_result(self) -> Result<(), GraphViolation> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(violation) => Err(violation),
        }
    }
}

/// Reasons why a graph edit was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphViolation {
    /// Node does not exist in the live collections
    #[error("Node {0:?} not found")]
    NodeNotFound(NodeId),
    /// Connection does not exist or is being removed
    #[error("Connection {0:?} not found")]
    ConnectionNotFound(ConnectionId),
    /// Cannot connect a node to itself
    #[error("Cannot connect a node to itself")]
    SelfConnection,
    /// The parent already has this child
    #[error("Connection already exists")]
    DuplicateConnection,
    /// The child is an ancestor of the parent
    #[error("Connection would create a cycle")]
    Cycle,
    /// Custom validation failure
    #[error("{0}")]
    Custom(String),
}

/// Trait for custom connection validation logic.
///
/// Implement this to add rules on top of the standard ones and install it
/// with [`CanvasGraph::set_validator`] or compose it with [`CompositeValidator`].
///
/// # Example
///
/// ```ignore
/// struct MaxChildren(usize);
///
/// impl ConnectionValidator for MaxChildren {
///     fn validate(&self, parent: NodeId, _child: NodeId, graph: &CanvasGraph, _ignore: Option<ConnectionId>) -> ValidationResult {
///         let count = graph.node(parent).map(|n| n.child_connections().len()).unwrap_or(0);
///         if count >= self.0 {
///             ValidationResult::Invalid(GraphViolation::Custom("too many children".into()))
///         } else {
///             ValidationResult::Valid
///         }
///     }
/// }
/// ```
pub trait ConnectionValidator {
    /// Check if a connection from `parent` to `child` is valid
    ///
    /// `ignore` names an existing connection to leave out of the check.
    fn validate(
        &self,
        parent: NodeId,
        child: NodeId,
        graph: &CanvasGraph,
        ignore: Option<ConnectionId>,
    ) -> ValidationResult;
}

/// Both nodes must exist and differ
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicConnectionValidator;

impl ConnectionValidator for BasicConnectionValidator {
    fn validate(
        &self,
        parent: NodeId,
        child: NodeId,
        graph: &CanvasGraph,
        _ignore: Option<ConnectionId>,
    ) -> ValidationResult {
        if !graph.contains(ItemId::Node(parent)) {
            return ValidationResult::Invalid(GraphViolation::NodeNotFound(parent));
        }
        if !graph.contains(ItemId::Node(child)) {
            return ValidationResult::Invalid(GraphViolation::NodeNotFound(child));
        }
        if parent == child {
            return ValidationResult::Invalid(GraphViolation::SelfConnection);
        }
        ValidationResult::Valid
    }
}

/// The child must not already be in the parent's child set
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDuplicatesValidator;

impl ConnectionValidator for NoDuplicatesValidator {
    fn validate(
        &self,
        parent: NodeId,
        child: NodeId,
        graph: &CanvasGraph,
        ignore: Option<ConnectionId>,
    ) -> ValidationResult {
        match graph.connection_between(parent, child) {
            Some(existing) if Some(existing) != ignore => {
                ValidationResult::Invalid(GraphViolation::DuplicateConnection)
            }
            _ => ValidationResult::Valid,
        }
    }
}

/// The parent must not be reachable from the child
#[derive(Clone, Copy, Debug, Default)]
pub struct AcyclicValidator;

impl ConnectionValidator for AcyclicValidator {
    fn validate(
        &self,
        parent: NodeId,
        child: NodeId,
        graph: &CanvasGraph,
        ignore: Option<ConnectionId>,
    ) -> ValidationResult {
        if graph.reaches(child, parent, ignore) {
            ValidationResult::Invalid(GraphViolation::Cycle)
        } else {
            ValidationResult::Valid
        }
    }
}

/// Composite validator that combines multiple validators
///
/// All validators must return Valid for the connection to be valid (AND logic).
/// Returns the first error encountered (short-circuits on failure).
///
/// # Example
///
/// ```ignore
/// let validator = CompositeValidator::standard().add(MaxChildren(3));
/// graph.set_validator(validator);
/// ```
#[derive(Default)]
pub struct CompositeValidator {
    validators: Vec<Box<dyn ConnectionValidator>>,
}

impl CompositeValidator {
    /// Create a new empty composite validator
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Existence, self connection, duplicate and cycle checks, in that order.
    pub fn standard() -> Self {
        Self::new()
            .add(BasicConnectionValidator)
            .add(NoDuplicatesValidator)
            .add(AcyclicValidator)
    }

    /// Add a validator to the composite
    ///
    /// Validators are checked in the order they were added.
    pub fn add<V: ConnectionValidator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }
}

impl ConnectionValidator for CompositeValidator {
    fn validate(
        &self,
        parent: NodeId,
        child: NodeId,
        graph: &CanvasGraph,
        ignore: Option<ConnectionId>,
    ) -> ValidationResult {
        for v in &self.validators {
            let result = v.validate(parent, child, graph, ignore);
            if !result.is_valid() {
                return result;
            }
        }
        ValidationResult::Valid
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use proptest::prelude::*;

    fn node_at(x: f32, y: f32) -> Node {
        Node::new(Point::new(x, y), Size::new(50.0, 30.0))
    }

    /// Graph with nodes a, b, c and edge a -> b
    fn setup_graph() -> (CanvasGraph, NodeId, NodeId, NodeId) {
        let mut graph = CanvasGraph::new();
        let a = graph.insert_node(node_at(0.0, 0.0));
        let b = graph.insert_node(node_at(100.0, 0.0));
        let c = graph.insert_node(node_at(200.0, 0.0));
        graph.connect(a, b, ConnectionStyle::default()).unwrap();
        (graph, a, b, c)
    }

    /// Every list entry must agree with the connection's own endpoints
    fn assert_consistent(graph: &CanvasGraph) {
        for (node_id, node) in graph.nodes() {
            for c in node.child_connections() {
                assert_eq!(graph.connection(*c).map(|c| c.parent()), Some(node_id));
            }
            for c in node.parent_connections() {
                assert_eq!(graph.connection(*c).map(|c| c.child()), Some(node_id));
            }
        }
    }

    // ========================================================================
    // connect()
    // ========================================================================

    #[test]
    fn test_connect_registers_both_sides() {
        let (graph, a, b, _) = setup_graph();
        let id = graph.connection_between(a, b).unwrap();
        assert_eq!(graph.node(a).unwrap().child_connections(), &[id]);
        assert_eq!(graph.node(b).unwrap().parent_connections(), &[id]);
        assert_eq!(graph.node(a).unwrap().connected_nodes(), &[b]);
        assert_eq!(graph.node(b).unwrap().connected_nodes(), &[a]);
        assert_consistent(&graph);
    }

    #[test]
    fn test_connect_draws_between_scaled_centers() {
        let (graph, a, b, _) = setup_graph();
        let c = graph.connection(graph.connection_between(a, b).unwrap()).unwrap();
        assert_eq!(c.visible_start(), Point::new(0.0, 0.0));
        assert_eq!(c.visible_end(), Point::new(100.0, 0.0));
    }

    #[test]
    fn test_connect_rejects_self_connection() {
        let (mut graph, a, _, _) = setup_graph();
        assert_eq!(
            graph.connect(a, a, ConnectionStyle::default()),
            Err(GraphViolation::SelfConnection)
        );
    }

    #[test]
    fn test_connect_rejects_duplicate() {
        let (mut graph, a, b, _) = setup_graph();
        assert_eq!(
            graph.connect(a, b, ConnectionStyle::default()),
            Err(GraphViolation::DuplicateConnection)
        );
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_connect_rejects_reverse_edge_as_cycle() {
        let (mut graph, a, b, _) = setup_graph();
        assert_eq!(
            graph.connect(b, a, ConnectionStyle::default()),
            Err(GraphViolation::Cycle)
        );
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_connect_rejects_transitive_cycle() {
        let (mut graph, a, b, c) = setup_graph();
        graph.connect(b, c, ConnectionStyle::default()).unwrap();
        assert_eq!(
            graph.connect(c, a, ConnectionStyle::default()),
            Err(GraphViolation::Cycle)
        );
    }

    #[test]
    fn test_connect_rejects_missing_node() {
        let (mut graph, a, _, _) = setup_graph();
        let ghost = NodeId(999);
        assert_eq!(
            graph.connect(a, ghost, ConnectionStyle::default()),
            Err(GraphViolation::NodeNotFound(ghost))
        );
    }

    #[test]
    fn test_connect_allows_diamond() {
        let (mut graph, a, b, c) = setup_graph();
        let d = graph.insert_node(node_at(300.0, 0.0));
        graph.connect(a, c, ConnectionStyle::default()).unwrap();
        graph.connect(b, d, ConnectionStyle::default()).unwrap();
        assert!(graph.connect(c, d, ConnectionStyle::default()).is_ok());
        assert_consistent(&graph);
    }

    // ========================================================================
    // Removal
    // ========================================================================

    #[test]
    fn test_invalid_connection_is_ignored_by_queries() {
        let (mut graph, a, b, _) = setup_graph();
        let id = graph.connection_between(a, b).unwrap();
        graph.begin_connection_removal(id, AnimationId(1));

        assert_eq!(graph.connection_between(a, b), None);
        assert!(graph.descendants(a, None).is_empty());
        // Still registered until the animation completes
        assert_eq!(graph.node(a).unwrap().child_connections(), &[id]);
        assert!(graph.has_busy_connection(a));
        assert!(graph.has_busy_connection(b));
        // The reverse edge is acceptable again
        assert!(graph.validate_connection(b, a, None).is_valid());
    }

    #[test]
    fn test_finish_removal_unregisters_both_sides() {
        let (mut graph, a, b, _) = setup_graph();
        let id = graph.connection_between(a, b).unwrap();
        graph.begin_connection_removal(id, AnimationId(1));
        let removed = graph.finish_connection_removal(id);

        assert!(removed.is_some());
        assert!(graph.node(a).unwrap().child_connections().is_empty());
        assert!(graph.node(b).unwrap().parent_connections().is_empty());
        assert!(graph.node(a).unwrap().connected_nodes().is_empty());
        assert!(!graph.z_order().contains(&ItemId::Connection(id)));
        assert!(!graph.has_busy_connection(a));
    }

    #[test]
    fn test_finish_removal_tolerates_missing_endpoint() {
        let (mut graph, a, b, _) = setup_graph();
        let id = graph.connection_between(a, b).unwrap();
        graph.begin_connection_removal(id, AnimationId(1));
        graph.remove_node(b);
        assert!(graph.finish_connection_removal(id).is_some());
        assert!(graph.node(a).unwrap().child_connections().is_empty());
    }

    #[test]
    fn test_retired_node_resolves_until_detached() {
        // a -> b, a -> c; retire a while both lines are removing
        let (mut graph, a, b, c) = setup_graph();
        let ab = graph.connection_between(a, b).unwrap();
        let ac = graph.connect(a, c, ConnectionStyle::default()).unwrap();
        graph.begin_connection_removal(ab, AnimationId(1));
        graph.begin_connection_removal(ac, AnimationId(2));

        assert!(!graph.retire_node(a));
        assert!(graph.node(a).unwrap().is_retired());
        assert!(!graph.contains(ItemId::Node(a)));
        assert!(!graph.z_order().contains(&ItemId::Node(a)));
        assert_eq!(graph.node_count(), 2);
        assert!(graph.nodes().all(|(id, _)| id != a));
        // Retired nodes accept no new connections
        assert_eq!(
            graph.validate_connection(b, a, None),
            ValidationResult::Invalid(GraphViolation::NodeNotFound(a))
        );

        graph.finish_connection_removal(ab);
        assert!(graph.node(a).is_some());
        graph.finish_connection_removal(ac);
        assert!(graph.node(a).is_none());
        assert_consistent(&graph);
    }

    #[test]
    fn test_retiring_unconnected_node_drops_it() {
        let (mut graph, _, _, c) = setup_graph();
        assert!(graph.retire_node(c));
        assert!(graph.node(c).is_none());
    }

    // ========================================================================
    // retarget_connection()
    // ========================================================================

    #[test]
    fn test_retarget_moves_child_end() {
        let (mut graph, a, b, c) = setup_graph();
        let id = graph.connection_between(a, b).unwrap();
        assert_eq!(graph.retarget_connection(id, c), Ok(b));

        assert_eq!(graph.connection(id).unwrap().child(), c);
        assert!(graph.node(b).unwrap().parent_connections().is_empty());
        assert_eq!(graph.node(c).unwrap().parent_connections(), &[id]);
        assert_eq!(graph.connection(id).unwrap().visible_end(), Point::new(200.0, 0.0));
        assert_consistent(&graph);
    }

    #[test]
    fn test_retarget_ignores_own_edge_in_cycle_check() {
        // a -> b -> c, move a->b onto c: the a->b edge must not count
        let (mut graph, a, b, c) = setup_graph();
        graph.connect(b, c, ConnectionStyle::default()).unwrap();
        let id = graph.connection_between(a, b).unwrap();
        assert!(graph.retarget_connection(id, c).is_ok());
    }

    #[test]
    fn test_retarget_rejects_cycle() {
        let (mut graph, a, b, c) = setup_graph();
        let bc = graph.connect(b, c, ConnectionStyle::default()).unwrap();
        assert_eq!(graph.retarget_connection(bc, a), Err(GraphViolation::Cycle));
        assert_eq!(graph.connection(bc).unwrap().child(), c);
    }

    #[test]
    fn test_retarget_rejects_duplicate() {
        let (mut graph, a, b, c) = setup_graph();
        let ac = graph.connect(a, c, ConnectionStyle::default()).unwrap();
        assert_eq!(
            graph.retarget_connection(ac, b),
            Err(GraphViolation::DuplicateConnection)
        );
    }

    // ========================================================================
    // Handles
    // ========================================================================

    #[test]
    fn test_handle_back_reference_is_cleared_on_removal() {
        let (mut graph, a, _, _) = setup_graph();
        let handle = graph.insert_handle(
            Handle::new(Point::default(), Size::new(10.0, 10.0)),
            HandleTarget::Node(a),
        );
        assert_eq!(graph.node(a).unwrap().create_handle(), Some(handle));
        assert_eq!(graph.z_order().last(), Some(&ItemId::Handle(handle)));

        graph.remove_handle(handle);
        assert_eq!(graph.node(a).unwrap().create_handle(), None);
        assert!(!graph.contains(ItemId::Handle(handle)));
    }

    #[test]
    fn test_removing_node_removes_its_create_handle() {
        let (mut graph, _, _, c) = setup_graph();
        let handle = graph.insert_handle(
            Handle::new(Point::default(), Size::new(10.0, 10.0)),
            HandleTarget::Node(c),
        );
        graph.remove_node(c);
        assert!(graph.handle(handle).is_none());
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    #[test]
    fn test_move_node_redraws_connections() {
        let (mut graph, a, b, _) = setup_graph();
        graph.move_node(b, Point::new(100.0, 50.0));
        let c = graph.connection(graph.connection_between(a, b).unwrap()).unwrap();
        assert_eq!(c.visible_end(), Point::new(100.0, 50.0));
    }

    #[test]
    fn test_zoom_rederives_geometry_without_touching_centers() {
        let (mut graph, a, b, _) = setup_graph();
        graph.set_zoom_scale(2.0);
        let c = graph.connection(graph.connection_between(a, b).unwrap()).unwrap();
        assert_eq!(c.visible_end(), Point::new(200.0, 0.0));
        assert_eq!(graph.node(b).unwrap().center(), Point::new(100.0, 0.0));
        assert_eq!(graph.node(b).unwrap().scaled_center(), Point::new(200.0, 0.0));
    }

    #[test]
    fn test_bring_to_front() {
        let (mut graph, a, _, _) = setup_graph();
        graph.bring_to_front(ItemId::Node(a));
        assert_eq!(graph.z_order().last(), Some(&ItemId::Node(a)));
    }

    // ========================================================================
    // Validation framework
    // ========================================================================

    #[test]
    fn test_custom_validator() {
        struct MaxChildren(usize);

        impl ConnectionValidator for MaxChildren {
            fn validate(
                &self,
                parent: NodeId,
                _child: NodeId,
                graph: &CanvasGraph,
                _ignore: Option<ConnectionId>,
            ) -> ValidationResult {
                let count = graph
                    .node(parent)
                    .map(|n| n.child_connections().len())
                    .unwrap_or(0);
                if count >= self.0 {
                    ValidationResult::Invalid(GraphViolation::Custom("too many children".into()))
                } else {
                    ValidationResult::Valid
                }
            }
        }

        let (mut graph, a, _, c) = setup_graph();
        graph.set_validator(CompositeValidator::standard().add(MaxChildren(1)));
        assert_eq!(
            graph.connect(a, c, ConnectionStyle::default()),
            Err(GraphViolation::Custom("too many children".into()))
        );
    }

    #[test]
    fn test_validation_result_and_combinator() {
        let valid = ValidationResult::Valid;
        assert!(valid.clone().and(ValidationResult::Valid).is_valid());
        assert_eq!(
            ValidationResult::Invalid(GraphViolation::Cycle)
                .and(ValidationResult::Invalid(GraphViolation::SelfConnection)),
            ValidationResult::Invalid(GraphViolation::Cycle)
        );
        assert_eq!(
            valid.and(ValidationResult::Invalid(GraphViolation::SelfConnection)),
            ValidationResult::Invalid(GraphViolation::SelfConnection)
        );
    }

    #[test]
    fn test_graph_violation_display() {
        assert_eq!(GraphViolation::SelfConnection.to_string(), "Cannot connect a node to itself");
        assert_eq!(GraphViolation::DuplicateConnection.to_string(), "Connection already exists");
        assert_eq!(GraphViolation::Cycle.to_string(), "Connection would create a cycle");
        assert_eq!(GraphViolation::Custom("nope".into()).to_string(), "nope");
    }

    // ========================================================================
    // Acyclicity property
    // ========================================================================

    proptest! {
        #[test]
        fn prop_added_connection_never_closes_a_cycle(
            edges in proptest::collection::vec((0usize..8, 0usize..8), 0..40)
        ) {
            let mut graph = CanvasGraph::new();
            let ids: Vec<NodeId> = (0..8)
                .map(|i| graph.insert_node(node_at(i as f32 * 10.0, 0.0)))
                .collect();

            for (p, c) in edges {
                let (parent, child) = (ids[p], ids[c]);
                if graph.connect(parent, child, ConnectionStyle::default()).is_ok() {
                    prop_assert!(!graph.descendants(child, None).contains(&parent));
                }
            }
            assert_consistent(&graph);
        }
    }
}
