//! GPX track decoding and ride statistics
//!
//! Decodes a recorded .gpx file into a flat point sequence with a bounding
//! region, and derives the cumulative distance/speed/elevation series shown
//! in the viewer. Loads run on a worker thread; completion is delivered over
//! an mpsc channel polled by the layer manager.

use chrono::{DateTime, Utc};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("track {0} contains no points")]
    Empty(String),
}

/// A geographic coordinate
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Axis-aligned bounding region of a track
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    pub fn from_point(p: GeoPoint) -> Self {
        GeoBounds {
            min_lat: p.lat,
            min_lon: p.lon,
            max_lat: p.lat,
            max_lon: p.lon,
        }
    }

    pub fn extend(&mut self, p: GeoPoint) {
        self.min_lat = self.min_lat.min(p.lat);
        self.min_lon = self.min_lon.min(p.lon);
        self.max_lat = self.max_lat.max(p.lat);
        self.max_lon = self.max_lon.max(p.lon);
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lon: (self.min_lon + self.max_lon) / 2.0,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }
}

/// One recorded point of a track
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl TrackPoint {
    pub fn coord(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// Decoded track geometry: point sequence plus its bounding region
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackGeometry {
    pub points: Vec<TrackPoint>,
    pub bounds: GeoBounds,
}

/// Decode GPX bytes into geometry. All tracks and segments in the file are
/// flattened into a single point sequence, in file order.
pub fn decode_gpx(input: &[u8], name: &str) -> Result<TrackGeometry, TrackError> {
    let mut cursor = Cursor::new(input);
    let gpx = gpx::read(&mut cursor).map_err(|e| TrackError::Parse {
        path: name.to_string(),
        message: e.to_string(),
    })?;

    let mut points = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for wpt in segment.points {
                let geo = wpt.point();
                let time = match wpt.time {
                    Some(t) => {
                        let iso = t.format().map_err(|e| TrackError::Parse {
                            path: name.to_string(),
                            message: e.to_string(),
                        })?;
                        Some(
                            DateTime::parse_from_rfc3339(&iso)
                                .map_err(|e| TrackError::Parse {
                                    path: name.to_string(),
                                    message: e.to_string(),
                                })?
                                .with_timezone(&Utc),
                        )
                    }
                    None => None,
                };
                points.push(TrackPoint {
                    lat: geo.y(),
                    lon: geo.x(),
                    elevation_m: wpt.elevation,
                    time,
                });
            }
        }
    }

    let first = points.first().ok_or_else(|| TrackError::Empty(name.to_string()))?;
    let mut bounds = GeoBounds::from_point(first.coord());
    for p in &points[1..] {
        bounds.extend(p.coord());
    }

    tracing::debug!("Decoded {}: {} points", name, points.len());
    Ok(TrackGeometry { points, bounds })
}

/// Load and decode a GPX file from disk
pub fn load_track_file(path: &Path) -> Result<TrackGeometry, TrackError> {
    let bytes = std::fs::read(path).map_err(|e| TrackError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    decode_gpx(&bytes, &path.display().to_string())
}

/// Asynchronous track provider: `begin_load` returns immediately, the
/// decoded geometry (or failure) arrives on the channel later.
pub trait TrackSource {
    fn begin_load(&self, filename: &str) -> Receiver<Result<TrackGeometry, TrackError>>;
}

/// Production source: decodes files from the configured GPX directory on a
/// worker thread.
pub struct GpxDirectory {
    dir: PathBuf,
}

impl GpxDirectory {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        GpxDirectory { dir: dir.into() }
    }
}

impl TrackSource for GpxDirectory {
    fn begin_load(&self, filename: &str) -> Receiver<Result<TrackGeometry, TrackError>> {
        let (tx, rx) = channel();
        let path = self.dir.join(filename);
        std::thread::spawn(move || {
            let result = load_track_file(&path);
            if let Err(ref e) = result {
                tracing::warn!("Track load failed: {}", e);
            }
            // Receiver may already be gone if the user navigated away
            let _ = tx.send(result);
        });
        rx
    }
}

/// Distance between two coordinates in meters
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let r = 6_371_000.0_f64;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    r * c
}

pub fn meters_to_feet(m: f64) -> f64 {
    m * 3.28084
}

pub fn feet_to_miles(ft: f64) -> f64 {
    ft / 5280.0
}

pub fn meters_to_miles(m: f64) -> f64 {
    feet_to_miles(meters_to_feet(m))
}

pub fn mps_to_mph(mps: f64) -> f64 {
    mps * 2.236936
}

/// Cumulative ride series in imperial units, one entry per track point
#[derive(Debug, Clone, Default)]
pub struct RideSeries {
    pub miles: Vec<f64>,
    pub mph: Vec<f64>,
    pub elevation_ft: Vec<f64>,
}

/// Walk the track accumulating distance, speed and elevation.
pub fn analyze(track: &TrackGeometry) -> RideSeries {
    let points = &track.points;
    if points.is_empty() {
        return RideSeries::default();
    }

    let mut series = RideSeries {
        miles: vec![0.0],
        mph: vec![0.0],
        elevation_ft: vec![meters_to_feet(points[0].elevation_m.unwrap_or(0.0))],
    };

    let mut dist_m = 0.0;
    for pair in points.windows(2) {
        let (p0, p1) = (&pair[0], &pair[1]);
        let d = haversine_m(p0.lat, p0.lon, p1.lat, p1.lon);
        dist_m += d;
        series.miles.push(meters_to_miles(dist_m));

        let speed = match (p0.time, p1.time) {
            (Some(t0), Some(t1)) => {
                let secs = (t1 - t0).num_milliseconds() as f64 / 1000.0;
                if secs > 0.0 {
                    mps_to_mph(d / secs)
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        series.mph.push(speed);

        series
            .elevation_ft
            .push(meters_to_feet(p1.elevation_m.unwrap_or(0.0)));
    }

    series
}

/// Ride totals computed from the recorded points
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RideTotals {
    pub miles: f64,
    pub ascent_ft: f64,
    pub descent_ft: f64,
}

pub fn totals(track: &TrackGeometry) -> RideTotals {
    let mut dist_m = 0.0;
    let mut ascent_m = 0.0;
    let mut descent_m = 0.0;

    for pair in track.points.windows(2) {
        let (p0, p1) = (&pair[0], &pair[1]);
        dist_m += haversine_m(p0.lat, p0.lon, p1.lat, p1.lon);
        if let (Some(e0), Some(e1)) = (p0.elevation_m, p1.elevation_m) {
            let delta = e1 - e0;
            if delta > 0.0 {
                ascent_m += delta;
            } else {
                descent_m -= delta;
            }
        }
    }

    RideTotals {
        miles: meters_to_miles(dist_m),
        ascent_ft: meters_to_feet(ascent_m),
        descent_ft: meters_to_feet(descent_m),
    }
}

#[cfg(test)]
pub(crate) fn fixture_geometry() -> TrackGeometry {
    let mut points = Vec::new();
    for i in 0..4 {
        points.push(TrackPoint {
            lat: 19.6 + 0.01 * i as f64,
            lon: -155.9 + 0.01 * i as f64,
            elevation_m: Some(10.0 * i as f64),
            time: Some(
                DateTime::parse_from_rfc3339(&format!("2022-11-25T18:0{}:00Z", i))
                    .unwrap()
                    .with_timezone(&Utc),
            ),
        });
    }
    let mut bounds = GeoBounds::from_point(points[0].coord());
    for p in &points[1..] {
        bounds.extend(p.coord());
    }
    TrackGeometry { points, bounds }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Kona ride</name>
    <trkseg>
      <trkpt lat="19.6400" lon="-155.9969">
        <ele>5.0</ele>
        <time>2022-11-25T18:00:00Z</time>
      </trkpt>
      <trkpt lat="19.6300" lon="-155.9900">
        <ele>25.0</ele>
        <time>2022-11-25T18:05:00Z</time>
      </trkpt>
      <trkpt lat="19.6200" lon="-155.9800">
        <ele>15.0</ele>
        <time>2022-11-25T18:10:00Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_decode_sample() {
        let track = decode_gpx(SAMPLE_GPX.as_bytes(), "sample.gpx").unwrap();
        assert_eq!(track.points.len(), 3);
        assert!((track.points[0].lat - 19.64).abs() < 1e-9);
        assert!((track.points[0].lon - (-155.9969)).abs() < 1e-9);
        assert_eq!(track.points[1].elevation_m, Some(25.0));
        assert!(track.points[2].time.is_some());
    }

    #[test]
    fn test_bounds_cover_all_points() {
        let track = decode_gpx(SAMPLE_GPX.as_bytes(), "sample.gpx").unwrap();
        let b = track.bounds;
        assert!((b.min_lat - 19.62).abs() < 1e-9);
        assert!((b.max_lat - 19.64).abs() < 1e-9);
        assert!((b.min_lon - (-155.9969)).abs() < 1e-9);
        assert!((b.max_lon - (-155.98)).abs() < 1e-9);
        let c = b.center();
        assert!(c.lat > b.min_lat && c.lat < b.max_lat);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_gpx(b"not xml at all", "junk.gpx").unwrap_err();
        assert!(matches!(err, TrackError::Parse { .. }));
    }

    #[test]
    fn test_decode_rejects_empty_track() {
        let gpx = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg></trkseg></trk>
</gpx>"#;
        let err = decode_gpx(gpx.as_bytes(), "empty.gpx").unwrap_err();
        assert!(matches!(err, TrackError::Empty(_)));
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is about 111 km
        let d = haversine_m(19.0, -155.5, 20.0, -155.5);
        assert!((d - 111_195.0).abs() < 200.0);
    }

    #[test]
    fn test_unit_conversions() {
        assert!((meters_to_feet(1000.0) - 3280.84).abs() < 0.01);
        assert!((feet_to_miles(5280.0) - 1.0).abs() < 1e-9);
        assert!((meters_to_miles(1609.344) - 1.0).abs() < 1e-3);
        assert!((mps_to_mph(1.0) - 2.236936).abs() < 1e-6);
    }

    #[test]
    fn test_analyze_series() {
        let track = decode_gpx(SAMPLE_GPX.as_bytes(), "sample.gpx").unwrap();
        let series = analyze(&track);
        assert_eq!(series.miles.len(), 3);
        assert_eq!(series.miles[0], 0.0);
        assert!(series.miles[2] > series.miles[1]);
        assert!(series.mph[1] > 0.0);
        assert!((series.elevation_ft[1] - meters_to_feet(25.0)).abs() < 1e-9);
    }

    #[test]
    fn test_totals_split_ascent_descent() {
        let track = decode_gpx(SAMPLE_GPX.as_bytes(), "sample.gpx").unwrap();
        let t = totals(&track);
        assert!((t.ascent_ft - meters_to_feet(20.0)).abs() < 1e-6);
        assert!((t.descent_ft - meters_to_feet(10.0)).abs() < 1e-6);
        assert!(t.miles > 0.0);
    }

    #[test]
    fn test_gpx_directory_delivers_error_for_missing_file() {
        let source = GpxDirectory::new("/nonexistent-dir");
        let rx = source.begin_load("nope.gpx");
        let result = rx.recv().unwrap();
        assert!(matches!(result, Err(TrackError::Io { .. })));
    }
}
