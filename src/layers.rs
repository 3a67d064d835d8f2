//! Map layer lifecycle
//!
//! `LayerManager` owns the set of layers currently on the map: at most one
//! track polyline plus the current day's photo markers. Every day transition
//! tears the previous generation down before the next one is built, so the
//! map never mixes layers from two days.
//!
//! Track geometry arrives asynchronously. Each `clear()` bumps a generation
//! counter and every pending load carries the generation it was started
//! under; a completion whose generation no longer matches is discarded, so a
//! slow load can never resurrect a day the user has already left.

use std::sync::mpsc::{Receiver, TryRecvError};

use crate::itinerary::Photo;
use crate::track::{GeoBounds, GeoPoint, TrackError, TrackGeometry, TrackSource};

/// Handle to a layer owned by the map surface
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

/// Capability contract of the underlying map widget
pub trait MapSurface {
    fn add_track_layer(&mut self, track: &TrackGeometry) -> LayerId;
    fn add_marker(&mut self, photo: &Photo) -> LayerId;
    fn remove_layer(&mut self, id: LayerId);
    fn set_view(&mut self, center: GeoPoint, zoom: f64);
    fn fit_bounds(&mut self, bounds: GeoBounds);
}

struct PendingTrack {
    generation: u64,
    filename: String,
    rx: Receiver<Result<TrackGeometry, TrackError>>,
}

/// Owns the active layer set and the in-flight track load
pub struct LayerManager {
    track: Option<LayerId>,
    markers: Vec<LayerId>,
    generation: u64,
    pending: Option<PendingTrack>,
    home_center: GeoPoint,
    home_zoom: f64,
}

impl LayerManager {
    pub fn new(home_center: GeoPoint, home_zoom: f64) -> Self {
        LayerManager {
            track: None,
            markers: Vec::new(),
            generation: 0,
            pending: None,
            home_center,
            home_zoom,
        }
    }

    /// Remove every active layer and invalidate any in-flight track load.
    /// Safe to call when nothing is shown.
    pub fn clear(&mut self, surface: &mut dyn MapSurface) {
        self.generation += 1;

        if let Some(id) = self.track.take() {
            surface.remove_layer(id);
        }
        for id in self.markers.drain(..) {
            surface.remove_layer(id);
        }
    }

    /// Recenter the map on the configured home region
    pub fn reset_viewport(&self, surface: &mut dyn MapSurface) {
        surface.set_view(self.home_center, self.home_zoom);
    }

    /// Kick off a track load for the current generation. Non-blocking: the
    /// pending load is retained so a later `clear()` abandons it.
    pub fn show_track(&mut self, source: &dyn TrackSource, filename: &str) {
        tracing::debug!("Loading track {}", filename);
        self.pending = Some(PendingTrack {
            generation: self.generation,
            filename: filename.to_string(),
            rx: source.begin_load(filename),
        });
    }

    /// Add one marker layer per photo
    pub fn show_markers(&mut self, surface: &mut dyn MapSurface, photos: &[Photo]) {
        for photo in photos {
            let id = surface.add_marker(photo);
            self.markers.push(id);
        }
    }

    /// Drain a completed track load, if any. Stale completions (a later
    /// transition already cleared) are dropped without touching the map;
    /// failures are logged and leave the viewport where it was.
    pub fn poll(&mut self, surface: &mut dyn MapSurface) {
        let Some(pending) = self.pending.as_ref() else {
            return;
        };

        let outcome = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                tracing::warn!("Track loader for {} went away", pending.filename);
                self.pending = None;
                return;
            }
        };

        let Some(pending) = self.pending.take() else {
            return;
        };
        match outcome {
            Ok(geometry) => {
                if pending.generation != self.generation {
                    tracing::debug!(
                        "Discarding stale track {} (generation {} != {})",
                        pending.filename,
                        pending.generation,
                        self.generation
                    );
                    return;
                }
                if let Some(old) = self.track.take() {
                    surface.remove_layer(old);
                }
                let id = surface.add_track_layer(&geometry);
                self.track = Some(id);
                surface.fit_bounds(geometry.bounds);
                tracing::info!(
                    "Track {} shown ({} points)",
                    pending.filename,
                    geometry.points.len()
                );
            }
            Err(e) => {
                tracing::warn!("Track {} failed to load: {}", pending.filename, e);
            }
        }
    }

    pub fn track_layer(&self) -> Option<LayerId> {
        self.track
    }

    pub fn marker_layers(&self) -> &[LayerId] {
        &self.markers
    }

    pub fn has_pending_load(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_none() && self.markers.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::track::fixture_geometry;

    fn manager() -> LayerManager {
        let (center, zoom) = home();
        LayerManager::new(center, zoom)
    }

    fn photo(name: &str) -> Photo {
        Photo {
            filename: name.to_string(),
            lat: 19.6,
            lon: -155.9,
            caption: None,
        }
    }

    #[test]
    fn test_clear_is_idempotent_when_empty() {
        let mut mgr = manager();
        let mut surface = FakeSurface::default();

        mgr.clear(&mut surface);
        mgr.clear(&mut surface);

        assert!(mgr.is_empty());
        assert!(surface.calls.is_empty());
    }

    #[test]
    fn test_track_install_and_clear() {
        let mut mgr = manager();
        let mut surface = FakeSurface::default();
        let source = ManualSource::default();

        mgr.show_track(&source, "leg-1.gpx");
        assert!(mgr.has_pending_load());
        assert!(mgr.track_layer().is_none());

        source.complete("leg-1.gpx", Ok(fixture_geometry()));
        mgr.poll(&mut surface);

        assert!(mgr.track_layer().is_some());
        assert_eq!(surface.live_tracks.len(), 1);
        // Install fits the viewport to the track bounds
        assert!(matches!(surface.calls.last(), Some(SurfaceCall::FitBounds(_))));

        mgr.clear(&mut surface);
        assert!(mgr.is_empty());
        assert!(surface.live_tracks.is_empty());
    }

    #[test]
    fn test_markers_follow_photo_list() {
        let mut mgr = manager();
        let mut surface = FakeSurface::default();

        mgr.show_markers(&mut surface, &[photo("a.jpg"), photo("b.jpg")]);
        assert_eq!(mgr.marker_layers().len(), 2);
        assert_eq!(surface.live_markers.len(), 2);

        mgr.clear(&mut surface);
        assert!(surface.live_markers.is_empty());
        assert!(mgr.marker_layers().is_empty());
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut mgr = manager();
        let mut surface = FakeSurface::default();
        let source = ManualSource::default();

        // Day N starts a load...
        mgr.show_track(&source, "leg-1.gpx");
        // ...the user navigates on; day N+1 clears before the load lands
        mgr.clear(&mut surface);
        mgr.show_track(&source, "leg-2.gpx");

        // The abandoned load now completes
        source.complete("leg-1.gpx", Ok(fixture_geometry()));
        mgr.poll(&mut surface);

        // Nothing was added to the map
        assert!(mgr.track_layer().is_none());
        assert!(surface.live_tracks.is_empty());
        assert!(!surface
            .calls
            .iter()
            .any(|c| matches!(c, SurfaceCall::AddTrack(_))));
    }

    #[test]
    fn test_current_completion_after_stale_discard() {
        let mut mgr = manager();
        let mut surface = FakeSurface::default();
        let source = ManualSource::default();

        mgr.show_track(&source, "leg-1.gpx");
        mgr.clear(&mut surface);
        mgr.show_track(&source, "leg-2.gpx");

        // Only the current load's completion installs a layer
        source.complete("leg-2.gpx", Ok(fixture_geometry()));
        mgr.poll(&mut surface);

        assert_eq!(surface.live_tracks.len(), 1);
        assert!(mgr.track_layer().is_some());
    }

    #[test]
    fn test_failed_load_leaves_map_untouched() {
        let mut mgr = manager();
        let mut surface = FakeSurface::default();
        let source = ManualSource::default();

        mgr.show_track(&source, "leg-1.gpx");
        source.complete(
            "leg-1.gpx",
            Err(TrackError::Empty("leg-1.gpx".to_string())),
        );
        mgr.poll(&mut surface);

        assert!(mgr.track_layer().is_none());
        assert!(!mgr.has_pending_load());
        // No viewport movement on failure
        assert!(surface.calls.is_empty());
    }

    #[test]
    fn test_at_most_one_track_layer() {
        let mut mgr = manager();
        let mut surface = FakeSurface::default();
        let source = ManualSource::default();

        mgr.show_track(&source, "leg-1.gpx");
        source.complete("leg-1.gpx", Ok(fixture_geometry()));
        mgr.poll(&mut surface);

        // A second install (same generation, no clear between) replaces
        mgr.show_track(&source, "leg-1b.gpx");
        source.complete("leg-1b.gpx", Ok(fixture_geometry()));
        mgr.poll(&mut surface);

        assert_eq!(surface.live_tracks.len(), 1);
    }

    #[test]
    fn test_reset_viewport_goes_home() {
        let mgr = manager();
        let mut surface = FakeSurface::default();
        mgr.reset_viewport(&mut surface);

        let (center, zoom) = home();
        assert_eq!(surface.calls, vec![SurfaceCall::SetView(center, zoom)]);
    }

    #[test]
    fn test_clear_bumps_generation() {
        let mut mgr = manager();
        let mut surface = FakeSurface::default();
        let g0 = mgr.generation();
        mgr.clear(&mut surface);
        mgr.clear(&mut surface);
        assert_eq!(mgr.generation(), g0 + 2);
    }
}
