//! Shared server state
//!
//! Holds the loaded itinerary plus a cache of decoded track geometries so
//! repeated API requests do not re-parse GPX files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::itinerary::Itinerary;
use crate::photos::PhotoIndex;
use crate::track::{self, TrackError, TrackGeometry};

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub itinerary: Arc<Itinerary>,
    pub photos: Arc<PhotoIndex>,
    tracks: Arc<RwLock<HashMap<String, Arc<TrackGeometry>>>>,
}

impl AppState {
    pub fn new(config: Config, itinerary: Itinerary) -> Self {
        let photos = PhotoIndex::from_itinerary(&itinerary);
        Self {
            config: Arc::new(config),
            itinerary: Arc::new(itinerary),
            photos: Arc::new(photos),
            tracks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Load a track geometry, decoding from disk on first request
    pub async fn load_track(&self, filename: &str) -> Result<Arc<TrackGeometry>, TrackError> {
        {
            let tracks = self.tracks.read().await;
            if let Some(track) = tracks.get(filename) {
                tracing::debug!("Track '{}' found in cache", filename);
                return Ok(track.clone());
            }
        }

        let path = PathBuf::from(&self.config.gpx_dir).join(filename);
        tracing::info!("Decoding track '{}' from {:?}", filename, path);
        let geometry = Arc::new(track::load_track_file(&path)?);

        {
            let mut tracks = self.tracks.write().await;
            tracks.insert(filename.to_string(), geometry.clone());
            tracing::debug!("Track '{}' cached", filename);
        }

        Ok(geometry)
    }
}
