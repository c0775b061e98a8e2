use eframe::egui::Color32;

use crate::record::{LatLng, ShapeId};
use crate::tooltip::TooltipOptions;

pub const SHAPE_COLOR: Color32 = Color32::from_rgb(0xff, 0x66, 0x99);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonStyle {
    pub color: Color32,
    pub stroke_width: f32,
}

impl Default for PolygonStyle {
    fn default() -> Self {
        Self {
            color: SHAPE_COLOR,
            stroke_width: 3.0,
        }
    }
}

/// Options of the interactive polygon tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawControl {
    pub shape: PolygonStyle,
    pub allow_intersection: bool,
}

impl Default for DrawControl {
    fn default() -> Self {
        Self {
            shape: PolygonStyle::default(),
            allow_intersection: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// The user finished a polygon. Vertices are in drawing order, not closed.
    ShapeCreated { vertices: Vec<LatLng> },
}

/// What the annotation layer needs from the map it is mounted on.
pub trait MapHost {
    fn add_draw_control(&mut self, control: DrawControl);
    fn remove_draw_control(&mut self);
    fn add_polygon(&mut self, id: ShapeId, ring: &[LatLng], style: PolygonStyle);
    /// Vertices of a polygon previously added with `add_polygon`.
    fn polygon_ring(&self, id: ShapeId) -> Option<Vec<LatLng>>;
    /// Replaces any tooltip previously bound to `id`.
    fn bind_tooltip(&mut self, id: ShapeId, content: String, options: TooltipOptions);
    fn clear_polygons(&mut self);
}
