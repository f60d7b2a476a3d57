use crate::item::NodeId;
use std::collections::HashSet;

/// Tracks which nodes are selected.
///
/// The canvas mirrors membership into each node's `selected` flag.
#[derive(Debug, Default)]
pub struct SelectionManager {
    selected: HashSet<NodeId>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a tap on a node.
    ///
    /// With `extend` the node is toggled in or out of the selection,
    /// otherwise it becomes the only selected node.
    pub fn handle_interaction(&mut self, id: NodeId, extend: bool) {
        if extend {
            if !self.selected.remove(&id) {
                self.selected.insert(id);
            }
        } else {
            if self.selected.len() == 1 && self.selected.contains(&id) {
                return;
            }
            self.selected.clear();
            self.selected.insert(id);
        }
    }

    /// Clear the current selection
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop a node that left the canvas.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.selected.remove(&id)
    }

    /// Replace the current selection with a new set of ids
    pub fn replace_selection<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.selected.clear();
        self.selected.extend(ids);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.selected.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.selected.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
