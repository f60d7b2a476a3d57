//! Connection line rendering for Slint hosts.
//!
//! [`LineRenderer`] turns the visible geometry of every connection into SVG
//! path commands and, once bound, keeps a Slint `VecModel` in sync.
//!
//! # Example
//!
//! ```ignore
//! use slint_collection_canvas::LineRenderer;
//! use slint::{ModelRc, VecModel};
//! use std::rc::Rc;
//!
//! let mut lines = LineRenderer::new();
//! let model = Rc::new(VecModel::<ConnectionLine>::default());
//! lines.bind_model(model.clone(), |id, commands, color, width| ConnectionLine {
//!     id,
//!     commands,
//!     color,
//!     width,
//! });
//! window.set_connection_lines(ModelRc::from(model));
//!
//! // After every touch event, zoom change or data update
//! lines.update(&canvas.borrow());
//! ```

use crate::canvas::Canvas;
use crate::data_source::{CanvasDataSource, CanvasDelegate};
use crate::item::ItemId;
use crate::path::generate_line_path;
use slint::{Color, Model, ModelRc, SharedString, VecModel};
use std::rc::Rc;

/// Line id used for the transient line of a create gesture.
pub const TRANSIENT_LINE_ID: i32 = -1;

/// A rendered connection line.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePath {
    /// Connection id, or [`TRANSIENT_LINE_ID`]
    pub id: i32,
    pub commands: String,
    pub color: Color,
    pub width: f32,
}

trait ModelSyncer {
    fn sync(&self, lines: &[LinePath]);
}

struct ConcreteModelSyncer<P, F> {
    model: Rc<VecModel<P>>,
    constructor: F,
}

impl<P, F> ModelSyncer for ConcreteModelSyncer<P, F>
where
    P: Clone + 'static,
    F: Fn(i32, SharedString, Color, f32) -> P,
{
    fn sync(&self, lines: &[LinePath]) {
        for (i, line) in lines.iter().enumerate() {
            let item = (self.constructor)(
                line.id,
                SharedString::from(line.commands.as_str()),
                line.color,
                line.width,
            );
            if i < self.model.row_count() {
                self.model.set_row_data(i, item);
            } else {
                self.model.push(item);
            }
        }
        while self.model.row_count() > lines.len() {
            self.model.remove(self.model.row_count() - 1);
        }
    }
}

/// Computes connection lines in z-order.
///
/// Hidden connections (inside a collapsed segment) are skipped. Connections
/// being removed keep their frozen line until the removal completes.
#[derive(Default)]
pub struct LineRenderer {
    lines: Vec<LinePath>,
    syncer: Option<Box<dyn ModelSyncer>>,
}

impl LineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a Slint model; every [`update`](Self::update) syncs it.
    ///
    /// `constructor` receives `(id, path_commands, color, line_width)`.
    pub fn bind_model<P, F>(&mut self, model: Rc<VecModel<P>>, constructor: F)
    where
        P: Clone + 'static,
        F: Fn(i32, SharedString, Color, f32) -> P + 'static,
    {
        self.syncer = Some(Box::new(ConcreteModelSyncer { model, constructor }));
    }

    /// Recompute every line from the canvas.
    pub fn update<S: CanvasDataSource, D: CanvasDelegate>(&mut self, canvas: &Canvas<S, D>) {
        let graph = canvas.graph();
        let arrow_length = canvas.config().arrow_length;

        self.lines.clear();
        for item in graph.z_order() {
            let ItemId::Connection(id) = *item else {
                continue;
            };
            let Some(connection) = graph.connection(id) else {
                continue;
            };
            if connection.is_hidden() {
                continue;
            }
            let style = connection.style();
            self.lines.push(LinePath {
                id: id.0 as i32,
                commands: generate_line_path(
                    connection.visible_start(),
                    connection.visible_end(),
                    arrow_length,
                ),
                color: style.line_color,
                width: style.line_width,
            });
        }

        if let Some((start, end)) = canvas.transient_connection() {
            self.lines.push(LinePath {
                id: TRANSIENT_LINE_ID,
                commands: generate_line_path(start, end, arrow_length),
                color: Color::from_rgb_u8(255, 255, 255),
                width: canvas.config().transient_line_width,
            });
        }

        if let Some(syncer) = &self.syncer {
            syncer.sync(&self.lines);
        }
    }

    pub fn lines(&self) -> &[LinePath] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Build a fresh model from the current lines.
    pub fn create_model<P, F>(&self, constructor: F) -> ModelRc<P>
    where
        P: Clone + 'static,
        F: Fn(i32, SharedString, Color, f32) -> P,
    {
        let items: Vec<P> = self
            .lines
            .iter()
            .map(|l| constructor(l.id, SharedString::from(l.commands.as_str()), l.color, l.width))
            .collect();
        ModelRc::from(Rc::new(VecModel::from(items)))
    }
}
