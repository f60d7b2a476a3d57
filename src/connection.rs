use crate::animation::AnimationId;
use crate::geometry::{Point, Scalable, Size};
use crate::item::{CanvasItem, HandleId, ItemState, NodeId};
use crate::path::distance_to_line_segment;
use slint::Color;

/// Visual attributes of a connection, supplied by the data source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionStyle {
    pub line_color: Color,
    pub line_width: f32,
}

impl ConnectionStyle {
    pub fn new(line_color: Color, line_width: f32) -> Self {
        Self { line_color, line_width }
    }
}

impl Default for ConnectionStyle {
    fn default() -> Self {
        Self::new(Color::from_rgb_u8(255, 255, 255), 2.0)
    }
}

/// Animation a connection is currently playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionAnimation {
    #[default]
    None,
    /// Returning to its original child after a rejected move.
    SnapBack(AnimationId),
    /// Being removed; the connection is already invalid.
    Removal(AnimationId),
}

/// A directed edge from a parent node to a child node.
///
/// The endpoints are non-owning ids. The visible start and end points are
/// presentation state in scaled space and are re-derived by the graph
/// whenever an endpoint moves or the zoom scale changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    state: ItemState,
    pub(crate) parent: NodeId,
    pub(crate) child: NodeId,
    pub(crate) move_handle: Option<HandleId>,
    pub(crate) hidden: bool,
    pub(crate) animation: ConnectionAnimation,
    style: ConnectionStyle,
    valid: bool,
    visible_start: Point,
    visible_end: Point,
}

impl Connection {
    pub(crate) fn new(parent: NodeId, child: NodeId, style: ConnectionStyle) -> Self {
        Self {
            state: ItemState::new(Point::default(), Size::default()),
            parent,
            child,
            move_handle: None,
            hidden: false,
            animation: ConnectionAnimation::None,
            style,
            valid: true,
            visible_start: Point::default(),
            visible_end: Point::default(),
        }
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn child(&self) -> NodeId {
        self.child
    }

    /// `false` once the connection is scheduled for removal.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// `true` while the connection lies inside a collapsed segment.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn style(&self) -> ConnectionStyle {
        self.style
    }

    pub(crate) fn set_style(&mut self, style: ConnectionStyle) {
        self.style = style;
    }

    pub fn animation(&self) -> ConnectionAnimation {
        self.animation
    }

    pub fn move_handle(&self) -> Option<HandleId> {
        self.move_handle
    }

    pub fn visible_start(&self) -> Point {
        self.visible_start
    }

    pub fn visible_end(&self) -> Point {
        self.visible_end
    }

    /// Scaled midpoint of the drawn line, where the move handle is anchored.
    pub fn scaled_midpoint(&self) -> Point {
        self.visible_start.midpoint(self.visible_end)
    }

    /// Draw the line between two scaled points.
    pub(crate) fn draw_between(&mut self, start: Point, end: Point) {
        self.visible_start = start;
        self.visible_end = end;
        let scale = self.zoom_scale();
        self.set_center(start.midpoint(end).unscaled(scale));
    }

    /// Let the child end follow a scaled touch point.
    pub(crate) fn draw_to_point(&mut self, end: Point) {
        let start = self.visible_start;
        self.draw_between(start, end);
    }

    /// Keep frozen geometry of an invalid connection in step with a zoom change.
    pub(crate) fn rescale_frozen(&mut self, old_scale: f32, new_scale: f32) {
        self.visible_start = self.visible_start.unscaled(old_scale).scaled(new_scale);
        self.visible_end = self.visible_end.unscaled(old_scale).scaled(new_scale);
    }

    /// Mark the connection as being removed.
    pub(crate) fn invalidate(&mut self, animation: AnimationId) {
        self.valid = false;
        self.animation = ConnectionAnimation::Removal(animation);
    }

    /// Checks if a touch on the connection is valid.
    ///
    /// Invalid and hidden connections never accept touches.
    pub fn check_touch_is_valid(&self, touch: Point, tolerance: f32) -> bool {
        self.valid
            && !self.hidden
            && distance_to_line_segment(touch, self.visible_start, self.visible_end) <= tolerance
    }
}

impl CanvasItem for Connection {
    fn state(&self) -> &ItemState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ItemState {
        &mut self.state
    }
}
