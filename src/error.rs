//! Error types for canvas operations.
//!
//! Every error is recoverable: the canvas stays consistent and the host is
//! free to ignore the outcome. The only user-visible effect is a gesture that
//! does not commit.

use crate::animation::AnimationId;
use crate::graph::GraphViolation;
use crate::index_path::{ConnectionPath, IndexPath};
use crate::item::ItemId;
use thiserror::Error;

/// Errors that can occur while handling touches or graph edits
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanvasError {
    /// The touch did not resolve to an item that may take the lock
    #[error("no item can process this touch")]
    InvalidGestureTarget,

    /// Self connection, duplicate connection or cycle
    #[error("graph violation: {0}")]
    GraphViolation(#[from] GraphViolation),

    /// The gesture target disappeared while the gesture was active
    #[error("stale reference to {0}")]
    StaleReference(ItemId),

    /// The data source returned nothing for an index path
    #[error("no node at index path {0}")]
    InconsistentIndexPath(IndexPath),

    /// No valid connection joins the two index paths
    #[error("no connection {0}")]
    UnknownConnection(ConnectionPath),

    /// The node moves rigidly with another segment root
    #[error("node at {0} belongs to a collapsed segment")]
    CollapsedSegmentMember(IndexPath),

    /// Completion reported for an animation that is not pending
    #[error("{0} is not pending")]
    UnknownAnimation(AnimationId),
}

/// Result type alias for canvas operations
pub type CanvasResult<T> = Result<T, CanvasError>;
