//! Photo index and geotagging
//!
//! The viewer side only needs `photos_for(date)`. The `index-photos` command
//! goes the other way: given a photo log (filename + timestamp) and the
//! recorded tracks, it pins each photo to the nearest-in-time track point so
//! the coordinates can be pasted back into the itinerary manifest.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::itinerary::{Day, Itinerary, Photo};
use crate::track::TrackPoint;

/// Lookup from calendar date to that day's photos
#[derive(Debug, Default)]
pub struct PhotoIndex {
    by_date: HashMap<NaiveDate, Vec<Photo>>,
}

impl PhotoIndex {
    pub fn from_itinerary(itinerary: &Itinerary) -> Self {
        let mut by_date: HashMap<NaiveDate, Vec<Photo>> = HashMap::new();
        for day in itinerary.days() {
            if let Day::Leg { date, photos, .. } = day {
                by_date.entry(*date).or_default().extend(photos.iter().cloned());
            }
        }
        let total: usize = by_date.values().map(Vec::len).sum();
        tracing::debug!("Photo index built: {} photos on {} dates", total, by_date.len());
        PhotoIndex { by_date }
    }

    /// Photos taken on `date`; a date with no entry yields an empty slice.
    pub fn photos_for(&self, date: NaiveDate) -> &[Photo] {
        self.by_date.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One line of the photo log manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoLogEntry {
    pub filename: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Photo log loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoLog {
    pub photos: Vec<PhotoLogEntry>,
}

impl PhotoLog {
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let log: PhotoLog = serde_yaml::from_str(&content)?;
        Ok(log)
    }
}

/// Assign each logged photo the coordinate of the track point closest in
/// time. `points` must carry timestamps; untimed points are skipped.
/// Returns an empty list when no timed points exist.
pub fn locate_photos(log: &[PhotoLogEntry], points: &[TrackPoint]) -> Vec<Photo> {
    let mut timed: Vec<(DateTime<Utc>, &TrackPoint)> = points
        .iter()
        .filter_map(|p| p.time.map(|t| (t, p)))
        .collect();
    timed.sort_by_key(|(t, _)| *t);

    if timed.is_empty() {
        tracing::warn!("No timestamped track points; cannot locate photos");
        return Vec::new();
    }

    log.iter()
        .map(|entry| {
            let point = nearest_in_time(&timed, entry.time);
            Photo {
                filename: entry.filename.clone(),
                lat: point.lat,
                lon: point.lon,
                caption: entry.caption.clone(),
            }
        })
        .collect()
}

fn nearest_in_time<'a>(
    timed: &[(DateTime<Utc>, &'a TrackPoint)],
    target: DateTime<Utc>,
) -> &'a TrackPoint {
    match timed.binary_search_by_key(&target, |(t, _)| *t) {
        Ok(i) => timed[i].1,
        Err(i) => {
            if i == 0 {
                timed[0].1
            } else if i == timed.len() {
                timed[timed.len() - 1].1
            } else {
                let before = &timed[i - 1];
                let after = &timed[i];
                if target - before.0 <= after.0 - target {
                    before.1
                } else {
                    after.1
                }
            }
        }
    }
}

/// Render located photos as a manifest fragment ready to paste under a
/// day's `photos:` key.
pub fn to_manifest_yaml(photos: &[Photo]) -> anyhow::Result<String> {
    #[derive(Serialize)]
    struct Entry<'a> {
        filename: &'a str,
        lat: f64,
        lon: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<&'a str>,
    }

    let entries: Vec<Entry> = photos
        .iter()
        .map(|p| Entry {
            filename: &p.filename,
            lat: p.lat,
            lon: p.lon,
            caption: p.caption.as_deref(),
        })
        .collect();
    Ok(serde_yaml::to_string(&entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itinerary;
    use crate::track::fixture_geometry;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_index_missing_date_is_empty() {
        let index = PhotoIndex::from_itinerary(&itinerary::fixture(3));
        let date = NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();
        assert!(index.photos_for(date).is_empty());
    }

    #[test]
    fn test_locate_picks_nearest_timestamp() {
        // Fixture points are at 18:00, 18:01, 18:02, 18:03
        let track = fixture_geometry();
        let log = vec![
            PhotoLogEntry {
                filename: "sunrise.jpg".to_string(),
                time: ts("2022-11-25T18:00:20Z"),
                caption: None,
            },
            PhotoLogEntry {
                filename: "summit.jpg".to_string(),
                time: ts("2022-11-25T18:02:50Z"),
                caption: Some("the top".to_string()),
            },
        ];

        let located = locate_photos(&log, &track.points);
        assert_eq!(located.len(), 2);
        assert_eq!(located[0].lat, track.points[0].lat);
        assert_eq!(located[1].lat, track.points[3].lat);
        assert_eq!(located[1].caption.as_deref(), Some("the top"));
    }

    #[test]
    fn test_locate_clamps_outside_track_window() {
        let track = fixture_geometry();
        let log = vec![
            PhotoLogEntry {
                filename: "before.jpg".to_string(),
                time: ts("2022-11-25T06:00:00Z"),
                caption: None,
            },
            PhotoLogEntry {
                filename: "after.jpg".to_string(),
                time: ts("2022-11-25T23:00:00Z"),
                caption: None,
            },
        ];

        let located = locate_photos(&log, &track.points);
        assert_eq!(located[0].lat, track.points[0].lat);
        assert_eq!(located[1].lat, track.points[3].lat);
    }

    #[test]
    fn test_locate_with_untimed_track() {
        let mut track = fixture_geometry();
        for p in &mut track.points {
            p.time = None;
        }
        let log = vec![PhotoLogEntry {
            filename: "a.jpg".to_string(),
            time: ts("2022-11-25T18:00:00Z"),
            caption: None,
        }];
        assert!(locate_photos(&log, &track.points).is_empty());
    }

    #[test]
    fn test_manifest_yaml_roundtrip_fields() {
        let photos = vec![Photo {
            filename: "a.jpg".to_string(),
            lat: 19.5,
            lon: -155.1,
            caption: Some("aloha".to_string()),
        }];
        let yaml = to_manifest_yaml(&photos).unwrap();
        assert!(yaml.contains("a.jpg"));
        assert!(yaml.contains("aloha"));
        assert!(yaml.contains("19.5"));
    }
}
