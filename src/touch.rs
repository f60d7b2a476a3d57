//! The single-touch lock and the gesture state machine.
//!
//! ```text
//! Idle --began--> SingleTouchLocked --moved--> GestureActive --ended--> Idle
//!                        |                        |   \--ended (rejected move)--> AwaitingAnimation --completion--> Idle
//!                        \--ended (tap)--> Idle   \--cancelled / reset--> Idle
//! ```
//!
//! At most one item owns the lock at any time. Candidates are asked through
//! [`TouchEligibility`] in reverse z-order and the first affirmative answer
//! wins.

use crate::animation::AnimationId;
use crate::geometry::Point;
use crate::hit_test::HitTarget;
use crate::item::{ConnectionId, HandleId, ItemId, NodeId};
use tracing::debug;

/// The kind of an active gesture, inferred from the touched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    CreateConnection,
    MoveConnection,
    SegmentDrag,
}

/// An active gesture with everything needed to commit or roll it back.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// A free node follows the touch.
    Drag { node: NodeId, origin: Point },
    /// A collapsed root and its members follow the touch.
    SegmentDrag { root: NodeId, origin: Point },
    /// A transient connection runs from `node` to the touch point.
    CreateConnection {
        node: NodeId,
        handle: HandleId,
        current: Point,
        target: Option<NodeId>,
    },
    /// The child end of `connection` follows the touch point.
    MoveConnection {
        connection: ConnectionId,
        handle: HandleId,
        original_child: NodeId,
        current: Point,
        target: Option<NodeId>,
    },
}

impl Gesture {
    pub fn kind(&self) -> GestureKind {
        match self {
            Gesture::Drag { .. } => GestureKind::Drag,
            Gesture::SegmentDrag { .. } => GestureKind::SegmentDrag,
            Gesture::CreateConnection { .. } => GestureKind::CreateConnection,
            Gesture::MoveConnection { .. } => GestureKind::MoveConnection,
        }
    }

    /// Handle created for this gesture, if any.
    pub fn handle(&self) -> Option<HandleId> {
        match self {
            Gesture::CreateConnection { handle, .. } | Gesture::MoveConnection { handle, .. } => {
                Some(*handle)
            }
            _ => None,
        }
    }

    /// Current drop target candidate of a connection gesture.
    pub fn target(&self) -> Option<NodeId> {
        match self {
            Gesture::CreateConnection { target, .. } | Gesture::MoveConnection { target, .. } => {
                *target
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TouchState {
    Idle,
    /// A touch began on `owner` but has not moved yet.
    SingleTouchLocked {
        owner: ItemId,
        target: HitTarget,
        began_at: Point,
    },
    GestureActive { owner: ItemId, gesture: Gesture },
    /// The touch sequence ended but `owner` keeps the lock until the
    /// snap-back animation completes.
    AwaitingAnimation { owner: ItemId, animation: AnimationId },
}

/// The "may I take this touch?" query answered by the canvas.
pub trait TouchEligibility {
    fn can_process(&self, item: ItemId) -> bool;
}

/// Owner of the single-touch lock.
#[derive(Debug)]
pub struct TouchArbiter {
    state: TouchState,
}

impl Default for TouchArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchArbiter {
    pub fn new() -> Self {
        Self {
            state: TouchState::Idle,
        }
    }

    pub fn state(&self) -> &TouchState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, TouchState::Idle)
    }

    /// Item currently holding the lock.
    pub fn owner(&self) -> Option<ItemId> {
        match &self.state {
            TouchState::Idle => None,
            TouchState::SingleTouchLocked { owner, .. }
            | TouchState::GestureActive { owner, .. }
            | TouchState::AwaitingAnimation { owner, .. } => Some(*owner),
        }
    }

    /// Active gesture, if any.
    pub fn gesture(&self) -> Option<&Gesture> {
        match &self.state {
            TouchState::GestureActive { gesture, .. } => Some(gesture),
            _ => None,
        }
    }

    pub(crate) fn gesture_mut(&mut self) -> Option<&mut Gesture> {
        match &mut self.state {
            TouchState::GestureActive { gesture, .. } => Some(gesture),
            _ => None,
        }
    }

    /// First candidate the eligibility query accepts.
    ///
    /// `candidates` must already be ordered topmost first.
    pub fn resolve<I, E>(candidates: I, eligibility: &E) -> Option<HitTarget>
    where
        I: IntoIterator<Item = HitTarget>,
        E: TouchEligibility + ?Sized,
    {
        candidates
            .into_iter()
            .find(|candidate| eligibility.can_process(candidate.item()))
    }

    /// Take the lock for `target`. Fails unless idle.
    pub fn lock(&mut self, target: HitTarget, began_at: Point) -> bool {
        if !self.is_idle() {
            return false;
        }
        let owner = target.item();
        debug!("touch locked by {}", owner);
        self.state = TouchState::SingleTouchLocked {
            owner,
            target,
            began_at,
        };
        true
    }

    /// Promote a locked touch to an active gesture.
    pub fn activate(&mut self, gesture: Gesture) -> bool {
        let TouchState::SingleTouchLocked { owner, .. } = self.state else {
            return false;
        };
        debug!("{} started {:?}", owner, gesture.kind());
        self.state = TouchState::GestureActive { owner, gesture };
        true
    }

    /// Keep the lock past the end of the touch sequence until `animation` completes.
    pub fn await_animation(&mut self, animation: AnimationId) -> bool {
        let Some(owner) = self.owner() else {
            return false;
        };
        debug!("{} waits for {}", owner, animation);
        self.state = TouchState::AwaitingAnimation { owner, animation };
        true
    }

    /// Whether the lock is held waiting for `animation`.
    pub fn is_awaiting(&self, animation: AnimationId) -> bool {
        matches!(self.state, TouchState::AwaitingAnimation { animation: a, .. } if a == animation)
    }

    /// Release the lock unconditionally and return the previous state.
    ///
    /// Releasing an idle arbiter is a no-op.
    pub fn release(&mut self) -> TouchState {
        let previous = std::mem::replace(&mut self.state, TouchState::Idle);
        if let Some(owner) = match &previous {
            TouchState::Idle => None,
            TouchState::SingleTouchLocked { owner, .. }
            | TouchState::GestureActive { owner, .. }
            | TouchState::AwaitingAnimation { owner, .. } => Some(*owner),
        } {
            debug!("touch lock released by {}", owner);
        }
        previous
    }
}
