//! Zoom-aware geometry primitives.
//!
//! Model coordinates are stored **unscaled**. Everything that is hit-tested or
//! handed to the renderer lives in **scaled** space, i.e. multiplied by the
//! current zoom scale. The [`Scalable`] trait converts between the two.

use serde::Deserialize;
use std::ops::{Add, Sub};

/// A position on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Point translated by `offset`.
    pub fn offset_by(self, offset: Offset) -> Self {
        Self::new(self.x + offset.dx, self.y + offset.dy)
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Midpoint between `self` and `other`.
    pub fn midpoint(self, other: Point) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
}

impl Sub for Point {
    type Output = Offset;

    fn sub(self, rhs: Point) -> Offset {
        Offset::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<Offset> for Point {
    type Output = Point;

    fn add(self, rhs: Offset) -> Point {
        self.offset_by(rhs)
    }
}

/// A displacement between two points (x- and y-distance).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub dx: f32,
    pub dy: f32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }
}

impl Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        Offset::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

/// Width and height of an item.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle of `size` centered on `center`.
    pub fn from_center(center: Point, size: Size) -> Self {
        Self::new(
            center.x - size.width * 0.5,
            center.y - size.height * 0.5,
            size.width,
            size.height,
        )
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.max_x() && point.y >= self.y && point.y <= self.max_y()
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(x, y, self.max_x().max(other.max_x()) - x, self.max_y().max(other.max_y()) - y)
    }
}

/// Conversion between unscaled (stored) and scaled (displayed) space.
///
/// `scaled` multiplies every spatial component by the zoom scale, `unscaled`
/// divides by it. Callers are expected to pass a sanitized scale (see
/// [`sanitize_zoom`]).
pub trait Scalable: Sized + Copy {
    fn scaled(self, scale: f32) -> Self;
    fn unscaled(self, scale: f32) -> Self;
}

impl Scalable for Point {
    fn scaled(self, scale: f32) -> Self {
        Point::new(self.x * scale, self.y * scale)
    }

    fn unscaled(self, scale: f32) -> Self {
        Point::new(self.x / scale, self.y / scale)
    }
}

impl Scalable for Offset {
    fn scaled(self, scale: f32) -> Self {
        Offset::new(self.dx * scale, self.dy * scale)
    }

    fn unscaled(self, scale: f32) -> Self {
        Offset::new(self.dx / scale, self.dy / scale)
    }
}

impl Scalable for Size {
    fn scaled(self, scale: f32) -> Self {
        Size::new(self.width * scale, self.height * scale)
    }

    fn unscaled(self, scale: f32) -> Self {
        Size::new(self.width / scale, self.height / scale)
    }
}

impl Scalable for Rect {
    fn scaled(self, scale: f32) -> Self {
        Rect::new(self.x * scale, self.y * scale, self.width * scale, self.height * scale)
    }

    fn unscaled(self, scale: f32) -> Self {
        Rect::new(self.x / scale, self.y / scale, self.width / scale, self.height / scale)
    }
}

/// Returns a usable zoom scale: non-positive or non-finite values fall back to 1.0.
pub fn sanitize_zoom(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}
