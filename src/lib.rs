//! # Slint Collection Canvas
//!
//! A touch-driven canvas engine for directed node graphs. Hosts supply nodes
//! and connections through a data source addressed by index paths; the
//! canvas arbitrates touches, keeps the graph acyclic and consistent, and
//! derives zoom-aware geometry that a Slint front end can render.
//!
//! ## Features
//!
//! - **Single-touch lock** - exactly one item owns a touch sequence at a time
//! - **Gestures** - drag nodes, drag collapsed segments, create and retarget connections
//! - **Graph consistency** - no self connections, duplicates or cycles
//! - **Collapsed segments** - sub graphs below a root move as one rigid body
//! - **Animation continuations** - removals and snap-backs finish on the host's schedule
//! - **Zoom** - stored geometry stays unscaled; hit testing and rendering are scaled
//!
//! ## Quick Start
//!
//! ```ignore
//! use slint_collection_canvas::{Canvas, LineRenderer, Point};
//!
//! let mut canvas = Canvas::new(MyDataSource::load(), MyDelegate::default());
//! canvas.fill_canvas()?;
//!
//! canvas.touch_began(Point::new(120.0, 80.0))?;
//! canvas.touch_moved(Point::new(180.0, 140.0))?;
//! canvas.touch_ended(Point::new(180.0, 140.0))?;
//!
//! let mut lines = LineRenderer::new();
//! lines.update(&canvas);
//! ```
//!
//! ## Rust Helpers
//!
//! - [`Canvas`] - Coordinator owning the live collections and the touch lock
//! - [`CanvasGraph`] - Nodes, connections and handles with validated edits
//! - [`TouchArbiter`] - The single-touch state machine
//! - [`LineRenderer`] - Connection lines as SVG path commands for Slint models
//! - [`hits_at`] - Z-ordered hit testing in scaled space
//! - [`SelectionManager`] - Selection state with O(1) lookups

pub mod animation;
pub mod canvas;
pub mod config;
pub mod connection;
pub mod data_source;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod handle;
pub mod index_path;
pub mod item;
pub mod node;
pub mod path;
pub mod render;
pub mod segment;
pub mod selection;
pub mod touch;

pub use animation::{AnimationId, AnimationKind, PendingAnimation};
pub use canvas::Canvas;
pub use config::CanvasConfig;
pub use connection::{Connection, ConnectionAnimation, ConnectionStyle};
pub use data_source::{CanvasDataSource, CanvasDelegate, ConnectionSpec, NoopDelegate};
pub use error::{CanvasError, CanvasResult};
pub use geometry::{Offset, Point, Rect, Scalable, Size};
pub use graph::{
    CanvasGraph,
    // Connection validation framework
    AcyclicValidator, BasicConnectionValidator, CompositeValidator, ConnectionValidator,
    GraphViolation, NoDuplicatesValidator, ValidationResult,
};
pub use handle::{Handle, HandleTarget};
pub use hit_test::{find_connection_at, find_node_at, hits_at, HitTarget};
pub use index_path::{ConnectionPath, IndexPath};
pub use item::{CanvasItem, ConnectionId, HandleId, ItemId, NodeId, SegmentMembership};
pub use node::Node;
pub use path::{distance_to_line_segment, generate_line_path};
pub use render::{LinePath, LineRenderer, TRANSIENT_LINE_ID};
pub use segment::{Resync, SegmentChange};
pub use selection::SelectionManager;
pub use touch::{Gesture, GestureKind, TouchArbiter, TouchEligibility, TouchState};
