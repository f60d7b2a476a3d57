use crate::geometry::Point;

/// Generate SVG path commands for a straight connection line
///
/// Produces a move/line pair from `start` to `end`. When `arrow_length` is
/// positive, two short strokes forming an arrow head are appended at `end`
/// pointing in the direction of travel (parent towards child).
///
/// # Arguments
/// * `start` - Start point (parent side), scaled space
/// * `end` - End point (child side), scaled space
/// * `arrow_length` - Length of the arrow head strokes, 0.0 to omit
///
/// # Returns
/// SVG path command string (e.g., "M 10 20 L 140 80")
pub fn generate_line_path(start: Point, end: Point, arrow_length: f32) -> String {
    let mut path = format!("M {} {} L {} {}", start.x, start.y, end.x, end.y);

    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len = (dx * dx + dy * dy).sqrt();

    // Degenerate lines have no direction to point an arrow along
    if arrow_length <= 0.0 || len < f32::EPSILON {
        return path;
    }

    let (ux, uy) = (dx / len, dy / len);
    // Arrow strokes at +-30 degrees from the reversed direction
    let (sin, cos) = (0.5_f32, 0.866_025_4_f32);
    let left = Point::new(
        end.x - arrow_length * (ux * cos - uy * sin),
        end.y - arrow_length * (uy * cos + ux * sin),
    );
    let right = Point::new(
        end.x - arrow_length * (ux * cos + uy * sin),
        end.y - arrow_length * (uy * cos - ux * sin),
    );

    path.push_str(&format!(
        " M {} {} L {} {} L {} {}",
        left.x, left.y, end.x, end.y, right.x, right.y
    ));
    path
}

/// Calculate the distance from a point to a line segment
pub fn distance_to_line_segment(point: Point, a: Point, b: Point) -> f32 {
    let ab = (b.x - a.x, b.y - a.y);
    let ap = (point.x - a.x, point.y - a.y);

    let ab_len_sq = ab.0 * ab.0 + ab.1 * ab.1;

    if ab_len_sq < f32::EPSILON {
        // Degenerate segment (a == b)
        return (ap.0 * ap.0 + ap.1 * ap.1).sqrt();
    }

    // Project point onto line, clamped to segment
    let t = ((ap.0 * ab.0 + ap.1 * ab.1) / ab_len_sq).clamp(0.0, 1.0);

    let closest = Point::new(a.x + t * ab.0, a.y + t * ab.1);
    point.distance_to(closest)
}
