//! Native viewer using egui + walkers
//!
//! Slippy map with the current day's track and photo markers, a side panel
//! with the day's story or ride metrics, and an elevation profile strip.

use eframe::egui;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use walkers::sources::{Attribution, TileSource};
use walkers::{HttpTiles, Map, MapMemory, Plugin, Position, Projector};

use crate::config::Config;
use crate::itinerary::{Itinerary, Photo};
use crate::layers::{LayerId, LayerManager, MapSurface};
use crate::nav::{Navigator, Transition};
use crate::photos::PhotoIndex;
use crate::render::{self, Panel, PanelBody};
use crate::track::{self, GeoBounds, GeoPoint, GpxDirectory, RideSeries, TrackGeometry};

/// Run the native viewer
pub fn run_viewer(config: Config, itinerary: Itinerary) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title(itinerary.title().to_string()),
        ..Default::default()
    };

    eframe::run_native(
        "Trip Viewer",
        options,
        Box::new(|cc| Ok(Box::new(ViewerApp::new(cc, config, itinerary)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}

/// Tile source configured from the manifest (URL pattern + attribution)
#[derive(Debug, Clone)]
struct ConfigTileSource {
    name: String,
    url_pattern: String,
}

impl TileSource for ConfigTileSource {
    fn tile_url(&self, tile_id: walkers::TileId) -> String {
        self.url_pattern
            .replace("{z}", &tile_id.zoom.to_string())
            .replace("{x}", &tile_id.x.to_string())
            .replace("{y}", &tile_id.y.to_string())
    }

    fn attribution(&self) -> Attribution {
        // Attribution wants 'static, so the provider name is leaked once
        let text: &'static str = Box::leak(self.name.clone().into_boxed_str());
        Attribution {
            text,
            url: "",
            logo_light: None,
            logo_dark: None,
        }
    }
}

/// Queued viewport command, applied when the map rect is known
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportOp {
    Center { center: GeoPoint, zoom: f64 },
    Fit(GeoBounds),
}

/// Retained map content: the GUI-side implementation of `MapSurface`.
/// Layers live here between frames; a walkers plugin paints them.
#[derive(Default)]
pub struct MapScene {
    next_id: u64,
    track: Option<(LayerId, TrackGeometry)>,
    markers: Vec<(LayerId, Photo)>,
    viewport_ops: Vec<ViewportOp>,
}

impl MapScene {
    fn alloc(&mut self) -> LayerId {
        self.next_id += 1;
        LayerId(self.next_id)
    }

    pub fn track(&self) -> Option<(LayerId, &TrackGeometry)> {
        self.track.as_ref().map(|(id, g)| (*id, g))
    }

    pub fn markers(&self) -> &[(LayerId, Photo)] {
        &self.markers
    }

    pub fn take_viewport_ops(&mut self) -> Vec<ViewportOp> {
        std::mem::take(&mut self.viewport_ops)
    }
}

impl MapSurface for MapScene {
    fn add_track_layer(&mut self, track: &TrackGeometry) -> LayerId {
        let id = self.alloc();
        self.track = Some((id, track.clone()));
        id
    }

    fn add_marker(&mut self, photo: &Photo) -> LayerId {
        let id = self.alloc();
        self.markers.push((id, photo.clone()));
        id
    }

    fn remove_layer(&mut self, id: LayerId) {
        if self.track.as_ref().map(|(tid, _)| *tid == id).unwrap_or(false) {
            self.track = None;
        }
        self.markers.retain(|(mid, _)| *mid != id);
    }

    fn set_view(&mut self, center: GeoPoint, zoom: f64) {
        self.viewport_ops.push(ViewportOp::Center { center, zoom });
    }

    fn fit_bounds(&mut self, bounds: GeoBounds) {
        self.viewport_ops.push(ViewportOp::Fit(bounds));
    }
}

/// Zoom level at which `bounds` fits a viewport of the given pixel size.
/// Plain spherical approximation; plenty at ride scale.
pub fn zoom_for_bounds(bounds: &GeoBounds, width_px: f32, height_px: f32) -> f64 {
    const TILE: f64 = 256.0;
    let lon_span = bounds.lon_span().max(1e-6);
    let lat_span = bounds.lat_span().max(1e-6);
    let zx = (f64::from(width_px) * 360.0 / (TILE * lon_span)).log2();
    let zy = (f64::from(height_px) * 180.0 / (TILE * lat_span)).log2();
    zx.min(zy).clamp(3.0, 17.0)
}

/// Plugin painting the current day's polyline and photo markers
struct TrackPlugin {
    polyline: Vec<Position>,
    markers: Vec<(Position, usize)>,
    selected: Option<usize>,
    clicked: Arc<AtomicI32>,
    map_rect: egui::Rect,
}

impl Plugin for TrackPlugin {
    fn run(&mut self, response: &egui::Response, painter: egui::Painter, projector: &Projector) {
        let painter = painter.with_clip_rect(self.map_rect);

        let stroke = egui::Stroke::new(3.0, egui::Color32::from_rgb(36, 98, 219));
        for pair in self.polyline.windows(2) {
            let p1 = projector.project(pair[0]);
            let p2 = projector.project(pair[1]);
            painter.line_segment([egui::pos2(p1.x, p1.y), egui::pos2(p2.x, p2.y)], stroke);
        }

        let click_pos = if response.clicked() {
            response.interact_pointer_pos()
        } else {
            None
        };

        for (pos, idx) in &self.markers {
            let p = projector.project(*pos);
            let center = egui::pos2(p.x, p.y);
            let is_selected = self.selected == Some(*idx);
            let radius = if is_selected { 8.0 } else { 6.0 };
            let fill = if is_selected {
                egui::Color32::YELLOW
            } else {
                egui::Color32::from_rgb(219, 68, 36)
            };
            painter.circle_filled(center, radius, fill);
            painter.circle_stroke(center, radius, egui::Stroke::new(1.5, egui::Color32::WHITE));

            if let Some(cp) = click_pos {
                if cp.distance(center) <= radius + 4.0 {
                    self.clicked.store(*idx as i32, Ordering::Relaxed);
                }
            }
        }
    }
}

struct ViewerApp {
    itinerary: Itinerary,
    photos: PhotoIndex,
    navigator: Navigator,
    manager: LayerManager,
    scene: MapScene,
    tracks: GpxDirectory,
    panel: Panel,
    // Map widget state
    map_memory: MapMemory,
    tiles: Option<HttpTiles>,
    tile_url: String,
    attribution: String,
    home: Position,
    // Photo popup
    image_dir: PathBuf,
    selected_photo: Option<usize>,
    photo_textures: HashMap<String, Option<egui::TextureHandle>>,
    // Elevation profile, keyed by the track layer it was computed from
    profile: Option<(LayerId, RideSeries)>,
}

impl ViewerApp {
    fn new(cc: &eframe::CreationContext<'_>, config: Config, itinerary: Itinerary) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let photos = PhotoIndex::from_itinerary(&itinerary);
        let navigator = Navigator::new(itinerary.len());
        let home_center = GeoPoint {
            lat: config.map.center[0],
            lon: config.map.center[1],
        };
        let mut manager = LayerManager::new(home_center, config.map.zoom);
        let mut scene = MapScene::default();
        let tracks = GpxDirectory::new(config.gpx_dir.clone());

        // Start at the home region, then draw the startup day
        manager.reset_viewport(&mut scene);
        let bootstrap = navigator.bootstrap();
        let panel = render::apply_transition(
            &bootstrap,
            &itinerary,
            &photos,
            &mut manager,
            &mut scene,
            &tracks,
        );
        cc.egui_ctx
            .send_viewport_cmd(egui::ViewportCommand::Title(panel.window_title.clone()));

        Self {
            itinerary,
            photos,
            navigator,
            manager,
            scene,
            tracks,
            panel,
            map_memory: MapMemory::default(),
            tiles: None,
            tile_url: config.map.tile_url,
            attribution: config.map.attribution,
            home: walkers::Position::from_lat_lon(home_center.lat, home_center.lon),
            image_dir: PathBuf::from(config.image_dir),
            selected_photo: None,
            photo_textures: HashMap::new(),
            profile: None,
        }
    }

    fn ensure_tiles(&mut self, ctx: &egui::Context) {
        if self.tiles.is_none() {
            info!("Initializing tile provider: {}", self.attribution);
            let source = ConfigTileSource {
                name: self.attribution.clone(),
                url_pattern: self.tile_url.clone(),
            };
            self.tiles = Some(HttpTiles::new(source, ctx.clone()));
        }
    }

    fn apply(&mut self, ctx: &egui::Context, transition: &Transition) {
        self.panel = render::apply_transition(
            transition,
            &self.itinerary,
            &self.photos,
            &mut self.manager,
            &mut self.scene,
            &self.tracks,
        );
        self.selected_photo = None;
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(self.panel.window_title.clone()));
    }

    fn refresh_profile(&mut self) {
        match self.scene.track() {
            Some((id, geometry)) => {
                let stale = self.profile.as_ref().map(|(pid, _)| *pid != id).unwrap_or(true);
                if stale {
                    self.profile = Some((id, track::analyze(geometry)));
                }
            }
            None => self.profile = None,
        }
    }

    fn photo_texture(&mut self, ctx: &egui::Context, filename: &str) -> Option<egui::TextureHandle> {
        if !self.photo_textures.contains_key(filename) {
            let path = self.image_dir.join(filename);
            let texture = match image::open(&path) {
                Ok(img) => {
                    let rgba = img.to_rgba8();
                    let size = [rgba.width() as usize, rgba.height() as usize];
                    let color = egui::ColorImage::from_rgba_unmultiplied(
                        size,
                        rgba.as_flat_samples().as_slice(),
                    );
                    Some(ctx.load_texture(filename, color, egui::TextureOptions::LINEAR))
                }
                Err(e) => {
                    warn!("Photo {:?} failed to load: {}", path, e);
                    None
                }
            };
            self.photo_textures.insert(filename.to_string(), texture);
        }
        self.photo_textures.get(filename).cloned().flatten()
    }

    fn side_panel(&self, ui: &mut egui::Ui, go_prev: &mut bool, go_next: &mut bool) {
        ui.heading(&self.panel.heading);
        ui.separator();

        match &self.panel.body {
            PanelBody::Narrative(content) => {
                if content.trim().is_empty() {
                    ui.weak("(nothing written for this day)");
                } else {
                    ui.label(content);
                }
            }
            PanelBody::Metrics {
                date,
                miles,
                ascent_ft,
                descent_ft,
                photo_captions,
            } => {
                egui::Grid::new("ride_metrics").num_columns(2).show(ui, |ui| {
                    ui.label("Date");
                    ui.label(date.format("%Y-%m-%d").to_string());
                    ui.end_row();
                    ui.label("Distance");
                    ui.label(format!("{:.1} mi", miles));
                    ui.end_row();
                    ui.label("Ascent");
                    ui.label(format!("{:.0} ft", ascent_ft));
                    ui.end_row();
                    ui.label("Descent");
                    ui.label(format!("{:.0} ft", descent_ft));
                    ui.end_row();
                });

                if self.manager.has_pending_load() {
                    ui.horizontal(|ui| {
                        ui.add(egui::Spinner::new());
                        ui.weak("loading track");
                    });
                }

                if !photo_captions.is_empty() {
                    ui.separator();
                    ui.label(format!("Photos ({})", photo_captions.len()));
                    for caption in photo_captions {
                        ui.weak(format!("• {}", caption));
                    }
                }
            }
        }

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("< Previous").clicked() {
                *go_prev = true;
            }
            if ui.button("Next >").clicked() {
                *go_next = true;
            }
        });
        ui.weak(format!(
            "Day {} of {}",
            self.navigator.index() + 1,
            self.itinerary.len()
        ));
    }

    fn profile_panel(&self, ui: &mut egui::Ui) {
        use egui_plot::{Line, Plot, PlotPoints};

        let Some((_, series)) = self.profile.as_ref() else {
            ui.weak("No track loaded");
            return;
        };

        let points: PlotPoints = series
            .miles
            .iter()
            .zip(&series.elevation_ft)
            .map(|(m, e)| [*m, *e])
            .collect();

        Plot::new("elevation_profile")
            .height(130.0)
            .allow_scroll(false)
            .x_axis_label("miles")
            .y_axis_label("elevation (ft)")
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(points));
            });
    }

    fn map_ui(&mut self, ui: &mut egui::Ui) {
        let map_rect = ui.available_rect_before_wrap();

        // Deferred viewport commands need the rect size for zoom fitting
        for op in self.scene.take_viewport_ops() {
            match op {
                ViewportOp::Center { center, zoom } => {
                    self.map_memory.center_at(walkers::Position::from_lat_lon(center.lat, center.lon));
                    let _ = self.map_memory.set_zoom(zoom as f32);
                }
                ViewportOp::Fit(bounds) => {
                    let center = bounds.center();
                    self.map_memory.center_at(walkers::Position::from_lat_lon(center.lat, center.lon));
                    let zoom = zoom_for_bounds(&bounds, map_rect.width(), map_rect.height());
                    let _ = self.map_memory.set_zoom(zoom as f32);
                }
            }
        }

        let polyline: Vec<Position> = self
            .scene
            .track()
            .map(|(_, g)| {
                g.points
                    .iter()
                    .map(|p| walkers::Position::from_lat_lon(p.lat, p.lon))
                    .collect()
            })
            .unwrap_or_default();
        let markers: Vec<(Position, usize)> = self
            .scene
            .markers()
            .iter()
            .enumerate()
            .map(|(i, (_, photo))| (walkers::Position::from_lat_lon(photo.lat, photo.lon), i))
            .collect();

        let clicked = Arc::new(AtomicI32::new(-1));
        let plugin = TrackPlugin {
            polyline,
            markers,
            selected: self.selected_photo,
            clicked: clicked.clone(),
            map_rect,
        };

        if let Some(ref mut tiles) = self.tiles {
            let map = Map::new(Some(tiles), &mut self.map_memory, self.home).with_plugin(plugin);
            ui.add(map);

            let idx = clicked.load(Ordering::Relaxed);
            if idx >= 0 {
                self.selected_photo = Some(idx as usize);
            }

            ui.painter().text(
                map_rect.max - egui::vec2(5.0, 5.0),
                egui::Align2::RIGHT_BOTTOM,
                format!("(c) {}", self.attribution),
                egui::FontId::proportional(10.0),
                egui::Color32::from_black_alpha(150),
            );
        }
    }

    fn photo_popup(&mut self, ctx: &egui::Context) {
        let Some(idx) = self.selected_photo else {
            return;
        };
        let Some(photo) = self.scene.markers().get(idx).map(|(_, p)| p.clone()) else {
            self.selected_photo = None;
            return;
        };

        let texture = self.photo_texture(ctx, &photo.filename);
        let mut open = true;
        egui::Window::new(&photo.filename)
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                match texture {
                    Some(tex) => {
                        ui.add(egui::Image::new(&tex).max_width(480.0));
                    }
                    None => {
                        ui.weak("photo file not found");
                    }
                }
                if let Some(caption) = &photo.caption {
                    ui.label(caption);
                }
            });
        if !open {
            self.selected_photo = None;
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Track loads complete between frames
        ctx.request_repaint();
        self.ensure_tiles(ctx);

        let mut go_prev = false;
        let mut go_next = false;
        ctx.input(|i| {
            if i.key_pressed(egui::Key::ArrowLeft) {
                go_prev = true;
            }
            if i.key_pressed(egui::Key::ArrowRight) {
                go_next = true;
            }
        });

        egui::SidePanel::left("day_panel").min_width(300.0).show(ctx, |ui| {
            self.side_panel(ui, &mut go_prev, &mut go_next);
        });

        if go_prev {
            let t = self.navigator.retreat();
            self.apply(ctx, &t);
        } else if go_next {
            let t = self.navigator.advance();
            self.apply(ctx, &t);
        }

        self.manager.poll(&mut self.scene);
        self.refresh_profile();

        egui::TopBottomPanel::bottom("profile_panel").show(ctx, |ui| {
            self.profile_panel(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.map_ui(ui);
        });

        self.photo_popup(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::fixture_geometry;

    fn photo(name: &str) -> Photo {
        Photo {
            filename: name.to_string(),
            lat: 19.6,
            lon: -155.9,
            caption: None,
        }
    }

    #[test]
    fn test_scene_remove_layers() {
        let mut scene = MapScene::default();
        let track_id = scene.add_track_layer(&fixture_geometry());
        let marker_id = scene.add_marker(&photo("a.jpg"));
        assert!(scene.track().is_some());
        assert_eq!(scene.markers().len(), 1);

        scene.remove_layer(marker_id);
        assert!(scene.markers().is_empty());
        assert!(scene.track().is_some());

        scene.remove_layer(track_id);
        assert!(scene.track().is_none());
    }

    #[test]
    fn test_scene_queues_viewport_ops() {
        let mut scene = MapScene::default();
        let center = GeoPoint { lat: 19.7, lon: -155.5 };
        scene.set_view(center, 9.0);
        scene.fit_bounds(fixture_geometry().bounds);

        let ops = scene.take_viewport_ops();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], ViewportOp::Center { center, zoom: 9.0 });
        assert!(scene.take_viewport_ops().is_empty());
    }

    #[test]
    fn test_zoom_for_bounds_scales_with_span() {
        let small = GeoBounds {
            min_lat: 19.60,
            min_lon: -155.60,
            max_lat: 19.62,
            max_lon: -155.58,
        };
        let large = GeoBounds {
            min_lat: 18.9,
            min_lon: -156.1,
            max_lat: 20.3,
            max_lon: -154.8,
        };
        let z_small = zoom_for_bounds(&small, 800.0, 600.0);
        let z_large = zoom_for_bounds(&large, 800.0, 600.0);
        assert!(z_small > z_large);
        assert!((3.0..=17.0).contains(&z_small));
        assert!((3.0..=17.0).contains(&z_large));
    }

    #[test]
    fn test_tile_url_substitution() {
        let source = ConfigTileSource {
            name: "OpenStreetMap".to_string(),
            url_pattern: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
        };
        let url = source.tile_url(walkers::TileId {
            x: 5,
            y: 12,
            zoom: 9,
        });
        assert_eq!(url, "https://tile.openstreetmap.org/9/5/12.png");
    }
}
