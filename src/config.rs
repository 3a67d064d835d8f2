//! Configuration loader - YAML itinerary manifest + .env secrets

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration loaded from itinerary.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Trip title, shown as the window/page title prefix
    pub title: String,
    #[serde(default)]
    pub map: MapDefaults,
    /// Directory holding the recorded GPX tracks
    #[serde(default = "default_gpx_dir")]
    pub gpx_dir: String,
    /// Directory holding the trip photos
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
    pub days: Vec<RawDay>,
}

/// Default map region and tile provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDefaults {
    /// Home center as [lat, lon]
    pub center: [f64; 2],
    pub zoom: f64,
    #[serde(default = "default_tile_url")]
    pub tile_url: String,
    #[serde(default = "default_attribution")]
    pub attribution: String,
}

/// A single day record as written in the manifest.
///
/// Presence of `date` + `gpx_filename` makes it a riding day; the explicit
/// Info/Leg split happens in `itinerary::Itinerary::from_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDay {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub miles: Option<f64>,
    #[serde(default)]
    pub ascent: Option<f64>,
    #[serde(default)]
    pub descent: Option<f64>,
    #[serde(default)]
    pub gpx_filename: Option<String>,
    #[serde(default)]
    pub photos: Vec<RawPhoto>,
}

/// A photo pinned to a map coordinate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPhoto {
    pub filename: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Secrets loaded from .env
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub arcgis_api_key: Option<String>,
    pub data_dir: String,
}

impl Default for MapDefaults {
    fn default() -> Self {
        MapDefaults {
            center: [19.7, -155.5],
            zoom: 9.0,
            tile_url: default_tile_url(),
            attribution: default_attribution(),
        }
    }
}

fn default_gpx_dir() -> String {
    "public/static/gpx-tracks".to_string()
}

fn default_image_dir() -> String {
    "public/static/images".to_string()
}

fn default_tile_url() -> String {
    "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
}

fn default_attribution() -> String {
    "OpenStreetMap".to_string()
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

impl Secrets {
    /// Load secrets from .env file
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Secrets {
            arcgis_api_key: std::env::var("ARCGIS_API_KEY").ok(),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_defaults() {
        let defaults = MapDefaults::default();
        assert_eq!(defaults.center, [19.7, -155.5]);
        assert_eq!(defaults.zoom, 9.0);
        assert!(defaults.tile_url.contains("{z}"));
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let yaml = r#"
title: "Test Tour"
days:
  - title: "Introduction"
    content: "<p>Hello</p>"
  - title: "A to B"
    date: "2022-11-25"
    miles: 16
    ascent: 1900
    descent: 635
    gpx_filename: "a-to-b.gpx"
  - title: "Conclusion"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "Test Tour");
        assert_eq!(config.days.len(), 3);
        assert_eq!(config.days[1].date.as_deref(), Some("2022-11-25"));
        assert!(config.days[0].gpx_filename.is_none());
        assert_eq!(config.gpx_dir, "public/static/gpx-tracks");
    }
}
