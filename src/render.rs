//! Day renderer
//!
//! Turns a navigation transition into a toolkit-independent panel
//! description and the matching layer teardown/build sequence. Teardown
//! always precedes build within a transition; overview days leave the map
//! empty.

use chrono::NaiveDate;

use crate::itinerary::{Day, Itinerary};
use crate::layers::{LayerManager, MapSurface};
use crate::nav::Transition;
use crate::photos::PhotoIndex;
use crate::track::TrackSource;

/// Side panel content for one day
#[derive(Debug, Clone, PartialEq)]
pub enum PanelBody {
    /// Free-form narrative (overview days)
    Narrative(String),
    /// Ride metrics (leg days)
    Metrics {
        date: NaiveDate,
        miles: f64,
        ascent_ft: f64,
        descent_ft: f64,
        photo_captions: Vec<String>,
    },
}

/// What the sidebar shows for the current day
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// `"<trip title> > <day title>"`
    pub window_title: String,
    pub heading: String,
    pub body: PanelBody,
}

/// Apply one transition: rebuild the panel and bring the map layers in sync
/// with the newly selected day.
pub fn apply_transition(
    transition: &Transition,
    itinerary: &Itinerary,
    photos: &PhotoIndex,
    manager: &mut LayerManager,
    surface: &mut dyn MapSurface,
    tracks: &dyn TrackSource,
) -> Panel {
    let day = itinerary.day(transition.index);
    tracing::info!("Showing day {}: {}", transition.index, day.title());

    let body = match day {
        Day::Info { content, .. } => {
            // Coming from a leg there are layers to tear down; between
            // overview days the map is already empty.
            if transition.from_leg() {
                manager.clear(surface);
            }
            PanelBody::Narrative(content.clone())
        }
        Day::Leg {
            date,
            miles,
            ascent_ft,
            descent_ft,
            gpx_filename,
            ..
        } => {
            manager.clear(surface);
            manager.show_track(tracks, gpx_filename);
            let day_photos = photos.photos_for(*date);
            manager.show_markers(surface, day_photos);

            PanelBody::Metrics {
                date: *date,
                miles: *miles,
                ascent_ft: *ascent_ft,
                descent_ft: *descent_ft,
                photo_captions: day_photos
                    .iter()
                    .map(|p| p.caption.clone().unwrap_or_else(|| p.filename.clone()))
                    .collect(),
            }
        }
    };

    if transition.reset_viewport {
        manager.reset_viewport(surface);
    }

    Panel {
        window_title: format!("{} > {}", itinerary.title(), day.title()),
        heading: day.title().to_string(),
        body,
    }
}
