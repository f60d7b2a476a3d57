//! One-shot animation continuations.
//!
//! The canvas never blocks on an animation. Starting one enqueues a
//! [`PendingAnimation`]; the host plays it for `duration` and then reports
//! completion through [`Canvas::complete_animation`](crate::Canvas::complete_animation),
//! which runs the continuation on the interaction loop.

use crate::index_path::ConnectionPath;
use crate::item::ConnectionId;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Identifier of a pending animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(pub(crate) u32);

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "animation #{}", self.0)
    }
}

/// What happens when an animation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    /// Remove the connection and report `path` to the delegate.
    ConnectionRemoval {
        connection: ConnectionId,
        path: ConnectionPath,
    },
    /// Redraw the connection to its original child and release the touch lock.
    SnapBack { connection: ConnectionId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAnimation {
    pub id: AnimationId,
    pub kind: AnimationKind,
    pub duration: Duration,
}

/// FIFO of animations waiting for their completion callback.
#[derive(Debug, Default)]
pub struct AnimationQueue {
    pending: VecDeque<PendingAnimation>,
    next_id: u32,
}

impl AnimationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an animation and return its id.
    pub fn start(&mut self, kind: AnimationKind, duration: Duration) -> AnimationId {
        self.next_id += 1;
        let id = AnimationId(self.next_id);
        self.pending.push_back(PendingAnimation { id, kind, duration });
        id
    }

    /// Remove a pending animation, returning it if it was still pending.
    ///
    /// Completing the same id twice yields `None` the second time.
    pub fn finish(&mut self, id: AnimationId) -> Option<PendingAnimation> {
        let index = self.pending.iter().position(|a| a.id == id)?;
        self.pending.remove(index)
    }

    pub fn get(&self, id: AnimationId) -> Option<&PendingAnimation> {
        self.pending.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingAnimation> {
        self.pending.iter()
    }

    /// Ids of all pending animations, oldest first.
    pub fn ids(&self) -> Vec<AnimationId> {
        self.pending.iter().map(|a| a.id).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
