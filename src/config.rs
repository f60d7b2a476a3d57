use crate::geometry::Size;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Tunables for hit testing, zoom limits, content sizing and animation timing.
///
/// Distances are in scaled (screen) space. Missing fields fall back to
/// [`CanvasConfig::default`] when deserialized.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Touch radius around a node's create-handle anchor and a connection's midpoint
    pub handle_touch_radius: f32,
    /// Maximum distance from a connection line that still counts as touching it
    pub connection_touch_tolerance: f32,
    /// Unscaled size given to handles the data source leaves empty
    pub handle_size: Size,
    /// Smallest zoom scale, must be positive and finite
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Unscaled margin added around the node bounds by `size_canvas_to_fit`
    pub content_padding: f32,
    /// Lower bound for the scaled content size
    pub min_content_size: Size,
    pub snap_back_duration_ms: u64,
    pub removal_duration_ms: u64,
    /// Stroke width of the line drawn while a new connection is dragged out;
    /// committed connections take theirs from [`ConnectionStyle`](crate::ConnectionStyle)
    pub transient_line_width: f32,
    /// Arrow head length for rendered connection lines, 0 disables arrows
    pub arrow_length: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            handle_touch_radius: 22.0,
            connection_touch_tolerance: 12.0,
            handle_size: Size::new(44.0, 44.0),
            min_zoom: 0.25,
            max_zoom: 4.0,
            content_padding: 100.0,
            min_content_size: Size::new(2048.0, 2048.0),
            snap_back_duration_ms: 300,
            removal_duration_ms: 250,
            transient_line_width: 2.0,
            arrow_length: 10.0,
        }
    }
}

impl CanvasConfig {
    /// Replace an unusable zoom range with the default one.
    ///
    /// The range must be finite, positive and ordered.
    pub fn sanitized(mut self) -> Self {
        let valid = self.min_zoom.is_finite()
            && self.max_zoom.is_finite()
            && self.min_zoom > 0.0
            && self.min_zoom <= self.max_zoom;
        if !valid {
            let defaults = Self::default();
            warn!(
                "invalid zoom range {}..{}, using {}..{}",
                self.min_zoom, self.max_zoom, defaults.min_zoom, defaults.max_zoom
            );
            self.min_zoom = defaults.min_zoom;
            self.max_zoom = defaults.max_zoom;
        }
        self
    }

    /// Clamp a requested zoom scale into the configured range.
    ///
    /// Never panics; with a malformed range the upper bound wins.
    pub fn clamp_zoom(&self, scale: f32) -> f32 {
        scale.max(self.min_zoom).min(self.max_zoom)
    }

    pub fn snap_back_duration(&self) -> Duration {
        Duration::from_millis(self.snap_back_duration_ms)
    }

    pub fn removal_duration(&self) -> Duration {
        Duration::from_millis(self.removal_duration_ms)
    }
}
