//! OpenStreetMap basemap with annotated polygons and the polygon draw tool,
//! drawn as `walkers` plugins.

use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, Response, Shape, Stroke, StrokeKind, Ui, Vec2};
use walkers::sources::{Attribution, TileSource};
use walkers::{HttpTiles, Map, MapMemory, Plugin, Position, Projector, TileId, Tiles};

use crate::config::MAX_ZOOM;
use crate::geometry;
use crate::map_host::{DrawControl, MapEvent, MapHost, PolygonStyle};
use crate::record::{LatLng, MIN_VERTICES, ShapeId};
use crate::tooltip::{Direction, TooltipOptions};

/// Clicking this close to the first vertex closes the ring.
const CLOSE_RADIUS: f32 = 10.0;
/// Clicks closer than this to the last vertex add nothing.
const MIN_VERTEX_SPACING: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("a polygon needs at least 3 points")]
    TooFewVertices,
    #[error("polygon edges cannot cross")]
    SelfIntersection,
}

fn position(p: LatLng) -> Position {
    walkers::lat_lon(p.lat, p.lng)
}

fn to_screen(projector: &Projector, p: LatLng) -> Pos2 {
    projector.project(position(p)).to_pos2()
}

fn to_geo(projector: &Projector, pos: Pos2) -> LatLng {
    let p = projector.unproject(pos.to_vec2());
    LatLng::new(p.y(), p.x())
}

/// Raster tiles from a `{z}/{x}/{y}` URL template.
struct TemplateTiles {
    template: String,
}

impl TileSource for TemplateTiles {
    fn tile_url(&self, tile_id: TileId) -> String {
        self.template
            .replace("{z}", &tile_id.zoom.to_string())
            .replace("{x}", &tile_id.x.to_string())
            .replace("{y}", &tile_id.y.to_string())
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: "© OpenStreetMap contributors",
            url: "https://www.openstreetmap.org/copyright",
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        MAX_ZOOM
    }
}

struct MapPolygon {
    id: ShapeId,
    ring: Vec<LatLng>,
    style: PolygonStyle,
    tooltip: Option<(String, TooltipOptions)>,
}

#[derive(Debug, Default)]
struct DrawTool {
    control: DrawControl,
    active: bool,
    vertices: Vec<LatLng>,
    error: Option<DrawError>,
}

impl DrawTool {
    fn new(control: DrawControl) -> Self {
        Self {
            control,
            ..Default::default()
        }
    }

    fn push(&mut self, p: LatLng) {
        if self.vertices.last() == Some(&p) {
            return;
        }
        if !self.control.allow_intersection {
            let mut candidate = self.vertices.clone();
            candidate.push(p);
            if geometry::path_self_intersects(&candidate) {
                self.error = Some(DrawError::SelfIntersection);
                return;
            }
        }
        self.error = None;
        self.vertices.push(p);
    }

    fn pop(&mut self) {
        self.vertices.pop();
        self.error = None;
    }

    fn cancel(&mut self) {
        self.vertices.clear();
        self.error = None;
        self.active = false;
    }

    /// Closes the ring. The tool switches off after each finished shape.
    fn finish(&mut self) -> Result<Vec<LatLng>, DrawError> {
        if self.vertices.len() < MIN_VERTICES {
            self.error = Some(DrawError::TooFewVertices);
            return Err(DrawError::TooFewVertices);
        }
        if !self.control.allow_intersection && geometry::ring_self_intersects(&self.vertices) {
            self.error = Some(DrawError::SelfIntersection);
            return Err(DrawError::SelfIntersection);
        }
        self.error = None;
        self.active = false;
        Ok(std::mem::take(&mut self.vertices))
    }

    /// Applies one pointer click at `pos`.
    fn click(&mut self, projector: &Projector, pos: Pos2) -> Option<Vec<LatLng>> {
        if let Some(first) = self.vertices.first() {
            let closes_ring = self.vertices.len() >= MIN_VERTICES
                && to_screen(projector, *first).distance(pos) <= CLOSE_RADIUS;
            if closes_ring {
                return self.finish().ok();
            }
        }
        if let Some(last) = self.vertices.last() {
            if to_screen(projector, *last).distance(pos) < MIN_VERTEX_SPACING {
                return None;
            }
        }
        self.push(to_geo(projector, pos));
        None
    }
}

/// Annotated polygons and their tooltips.
struct PolygonLayer<'a> {
    polygons: &'a [MapPolygon],
}

impl Plugin for PolygonLayer<'_> {
    fn run(
        self: Box<Self>,
        ui: &mut Ui,
        response: &Response,
        projector: &Projector,
        _map_memory: &MapMemory,
    ) {
        let painter = ui.painter_at(response.rect);
        let hover = response.hover_pos();
        for polygon in self.polygons {
            let points: Vec<Pos2> = polygon.ring.iter().map(|p| to_screen(projector, *p)).collect();
            painter.add(Shape::closed_line(
                points.clone(),
                Stroke::new(polygon.style.stroke_width, polygon.style.color),
            ));

            let Some((text, options)) = &polygon.tooltip else {
                continue;
            };
            let bounds = Rect::from_points(&points);
            let hovered = hover.is_some_and(|h| bounds.contains(h));
            if options.permanent || hovered {
                paint_tooltip(&painter, bounds, text, *options);
            }
        }
    }
}

/// Input handling and the in-progress outline of the draw tool.
struct DrawLayer<'a> {
    tool: &'a mut DrawTool,
    events: &'a mut Vec<MapEvent>,
}

impl Plugin for DrawLayer<'_> {
    fn run(
        self: Box<Self>,
        ui: &mut Ui,
        response: &Response,
        projector: &Projector,
        _map_memory: &MapMemory,
    ) {
        let DrawLayer { tool, events } = *self;
        if !tool.active {
            return;
        }

        let mut finished = None;
        if response.double_clicked() {
            finished = tool.finish().ok();
        } else if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                finished = tool.click(projector, pos);
            }
        }

        if finished.is_none() && !ui.ctx().wants_keyboard_input() {
            let (enter, escape, backspace) = ui.input(|i| {
                (
                    i.key_pressed(egui::Key::Enter),
                    i.key_pressed(egui::Key::Escape),
                    i.key_pressed(egui::Key::Backspace),
                )
            });
            if escape {
                tool.cancel();
                return;
            }
            if backspace {
                tool.pop();
            }
            if enter {
                finished = tool.finish().ok();
            }
        }

        match finished {
            Some(vertices) => {
                tracing::debug!(vertices = vertices.len(), "polygon finished");
                events.push(MapEvent::ShapeCreated { vertices });
            }
            None => paint_draft(ui, response, projector, tool),
        }
    }
}

fn paint_draft(ui: &Ui, response: &Response, projector: &Projector, tool: &DrawTool) {
    let painter = ui.painter_at(response.rect);
    let color = tool.control.shape.color;
    let mut points: Vec<Pos2> = tool.vertices.iter().map(|p| to_screen(projector, *p)).collect();
    for p in &points {
        painter.circle_filled(*p, 4.0, Color32::WHITE);
        painter.circle_stroke(*p, 4.0, Stroke::new(1.5, color));
    }
    if let Some(h) = response.hover_pos() {
        points.push(h);
    }
    if points.len() > 1 {
        painter.add(Shape::line(points, Stroke::new(tool.control.shape.stroke_width, color)));
    }

    let hint = match tool.error {
        Some(err) => err.to_string(),
        None if tool.vertices.is_empty() => "Click to start drawing a shape".to_owned(),
        None if tool.vertices.len() < MIN_VERTICES => "Click to continue drawing".to_owned(),
        None => "Click the first point or press Enter to finish".to_owned(),
    };
    let anchor = response.rect.center_top() + Vec2::new(0.0, 12.0);
    let galley = painter.layout_no_wrap(hint, FontId::proportional(14.0), Color32::BLACK);
    let rect = Align2::CENTER_TOP.anchor_size(anchor, galley.size()).expand(6.0);
    painter.rect_filled(rect, 4.0, Color32::from_white_alpha(230));
    painter.galley(rect.min + Vec2::splat(6.0), galley, Color32::BLACK);
}

fn paint_tooltip(painter: &egui::Painter, bounds: Rect, text: &str, options: TooltipOptions) {
    let galley = painter.layout_no_wrap(text.to_owned(), FontId::proportional(12.0), Color32::BLACK);
    let size = galley.size() + Vec2::splat(12.0);
    let rect = match options.direction {
        Direction::Top => {
            Align2::CENTER_BOTTOM.anchor_size(bounds.center() - Vec2::new(0.0, 8.0), size)
        }
    };
    painter.rect_filled(rect, 3.0, Color32::WHITE);
    painter.rect_stroke(rect, 3.0, Stroke::new(1.0, Color32::from_gray(160)), StrokeKind::Inside);
    painter.galley(rect.min + Vec2::splat(6.0), galley, Color32::BLACK);
}

pub struct MapView {
    center: Position,
    memory: MapMemory,
    tile_url: String,
    tiles: Option<HttpTiles>,
    polygons: Vec<MapPolygon>,
    draw: Option<DrawTool>,
    events: Vec<MapEvent>,
}

impl MapView {
    pub fn new(center: LatLng, zoom: u8, tile_url: impl Into<String>) -> Self {
        let mut memory = MapMemory::default();
        if let Err(err) = memory.set_zoom(f64::from(zoom.min(MAX_ZOOM))) {
            tracing::warn!(zoom, %err, "keeping default zoom");
        }
        Self {
            center: position(center),
            memory,
            tile_url: tile_url.into(),
            tiles: None,
            polygons: Vec::new(),
            draw: None,
            events: Vec::new(),
        }
    }

    pub fn has_draw_control(&self) -> bool {
        self.draw.is_some()
    }

    pub fn is_drawing(&self) -> bool {
        self.draw.as_ref().is_some_and(|d| d.active)
    }

    pub fn set_drawing(&mut self, on: bool) {
        if let Some(draw) = &mut self.draw {
            if on {
                draw.active = true;
            } else {
                draw.cancel();
            }
        }
    }

    /// Renders the map and returns the events produced this frame.
    pub fn show(&mut self, ui: &mut Ui) -> Vec<MapEvent> {
        let tile_url = &self.tile_url;
        let tiles = self.tiles.get_or_insert_with(|| {
            tracing::info!(url = %tile_url, "starting tile downloads");
            HttpTiles::new(
                TemplateTiles {
                    template: tile_url.clone(),
                },
                ui.ctx().clone(),
            )
        });
        let attribution = tiles.attribution();

        let mut map = Map::new(Some(tiles as &mut dyn Tiles), &mut self.memory, self.center)
            .zoom_with_ctrl(false)
            .with_plugin(PolygonLayer {
                polygons: &self.polygons,
            });
        if let Some(tool) = self.draw.as_mut() {
            map = map.with_plugin(DrawLayer {
                tool,
                events: &mut self.events,
            });
        }
        let response = ui.add(map);

        let rect = Rect::from_min_max(
            response.rect.right_bottom() - Vec2::new(190.0, 18.0),
            response.rect.right_bottom(),
        );
        ui.painter()
            .rect_filled(rect, 0.0, Color32::from_white_alpha(200));
        ui.put(
            rect,
            egui::Hyperlink::from_label_and_url(
                egui::RichText::new(attribution.text).small(),
                attribution.url,
            ),
        );

        std::mem::take(&mut self.events)
    }
}

impl MapHost for MapView {
    fn add_draw_control(&mut self, control: DrawControl) {
        self.draw = Some(DrawTool::new(control));
    }

    fn remove_draw_control(&mut self) {
        self.draw = None;
        self.events.clear();
    }

    fn add_polygon(&mut self, id: ShapeId, ring: &[LatLng], style: PolygonStyle) {
        self.polygons.retain(|p| p.id != id);
        self.polygons.push(MapPolygon {
            id,
            ring: ring.to_vec(),
            style,
            tooltip: None,
        });
    }

    fn polygon_ring(&self, id: ShapeId) -> Option<Vec<LatLng>> {
        self.polygons.iter().find(|p| p.id == id).map(|p| p.ring.clone())
    }

    fn bind_tooltip(&mut self, id: ShapeId, content: String, options: TooltipOptions) {
        match self.polygons.iter_mut().find(|p| p.id == id) {
            Some(polygon) => polygon.tooltip = Some((content, options)),
            None => tracing::warn!(%id, "tooltip for a shape that is not on the map"),
        }
    }

    fn clear_polygons(&mut self) {
        self.polygons.clear();
    }
}
