//! Itinerary data model
//!
//! Converts raw manifest records into an explicit Info/Leg tagged union at
//! construction time, so nothing downstream has to sniff field presence.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Config;

/// A photo pinned to a map coordinate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Photo {
    pub filename: String,
    pub lat: f64,
    pub lon: f64,
    pub caption: Option<String>,
}

/// One day of the trip
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Day {
    /// Bracketing overview day: text only, no geography
    Info { title: String, content: String },
    /// Riding day: recorded track plus photos taken along it
    Leg {
        title: String,
        date: NaiveDate,
        miles: f64,
        ascent_ft: f64,
        descent_ft: f64,
        gpx_filename: String,
        photos: Vec<Photo>,
    },
}

impl Day {
    pub fn title(&self) -> &str {
        match self {
            Day::Info { title, .. } => title,
            Day::Leg { title, .. } => title,
        }
    }

    pub fn is_leg(&self) -> bool {
        matches!(self, Day::Leg { .. })
    }
}

/// The full trip: ordered days bracketed by overview sentinels
#[derive(Debug, Clone, Serialize)]
pub struct Itinerary {
    title: String,
    days: Vec<Day>,
}

impl Itinerary {
    /// Build and validate the itinerary from loaded config.
    ///
    /// Rules: first and last day must be informational, at least one leg in
    /// between, every leg needs a date and a track file.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.days.len() < 3 {
            bail!(
                "itinerary needs an intro, at least one leg and a conclusion (got {} days)",
                config.days.len()
            );
        }

        let mut days = Vec::with_capacity(config.days.len());
        for (i, raw) in config.days.iter().enumerate() {
            let day = if raw.date.is_some() || raw.gpx_filename.is_some() {
                let date_str = raw
                    .date
                    .as_deref()
                    .with_context(|| format!("day {} ({}) has a track but no date", i, raw.title))?;
                let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                    .with_context(|| format!("day {} ({}): bad date '{}'", i, raw.title, date_str))?;
                let gpx_filename = raw.gpx_filename.clone().with_context(|| {
                    format!("day {} ({}) has a date but no gpx_filename", i, raw.title)
                })?;

                Day::Leg {
                    title: raw.title.clone(),
                    date,
                    miles: raw.miles.unwrap_or(0.0),
                    ascent_ft: raw.ascent.unwrap_or(0.0),
                    descent_ft: raw.descent.unwrap_or(0.0),
                    gpx_filename,
                    photos: raw
                        .photos
                        .iter()
                        .map(|p| Photo {
                            filename: p.filename.clone(),
                            lat: p.lat,
                            lon: p.lon,
                            caption: p.caption.clone(),
                        })
                        .collect(),
                }
            } else {
                Day::Info {
                    title: raw.title.clone(),
                    content: raw.content.clone().unwrap_or_default(),
                }
            };
            days.push(day);
        }

        if days.first().map(Day::is_leg).unwrap_or(true) {
            bail!("first day must be an overview day, not a leg");
        }
        if days.last().map(Day::is_leg).unwrap_or(true) {
            bail!("last day must be an overview day, not a leg");
        }
        if !days.iter().any(Day::is_leg) {
            bail!("itinerary contains no leg days");
        }

        tracing::info!(
            "Itinerary '{}' loaded: {} days ({} legs)",
            config.title,
            days.len(),
            days.iter().filter(|d| d.is_leg()).count()
        );

        Ok(Itinerary {
            title: config.title.clone(),
            days,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day(&self, index: usize) -> &Day {
        &self.days[index]
    }

    pub fn get(&self, index: usize) -> Option<&Day> {
        self.days.get(index)
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }
}

#[cfg(test)]
pub(crate) fn fixture(num_legs: usize) -> Itinerary {
    use crate::config::RawDay;

    let mut days = vec![RawDay {
        title: "Introduction".to_string(),
        content: Some("<p>Hello world!</p>".to_string()),
        date: None,
        miles: None,
        ascent: None,
        descent: None,
        gpx_filename: None,
        photos: vec![],
    }];
    for i in 0..num_legs {
        days.push(RawDay {
            title: format!("Leg {}", i + 1),
            content: None,
            date: Some(format!("2022-11-{:02}", 25 + i % 5)),
            miles: Some(16.0),
            ascent: Some(1900.0),
            descent: Some(635.0),
            gpx_filename: Some(format!("leg-{}.gpx", i + 1)),
            photos: vec![],
        });
    }
    days.push(RawDay {
        title: "Conclusion".to_string(),
        content: Some(String::new()),
        date: None,
        miles: None,
        ascent: None,
        descent: None,
        gpx_filename: None,
        photos: vec![],
    });

    let config = Config {
        title: "Test Tour".to_string(),
        map: Default::default(),
        gpx_dir: "gpx".to_string(),
        image_dir: "images".to_string(),
        days,
    };
    Itinerary::from_config(&config).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawDay;

    fn raw_info(title: &str) -> RawDay {
        RawDay {
            title: title.to_string(),
            content: Some("text".to_string()),
            date: None,
            miles: None,
            ascent: None,
            descent: None,
            gpx_filename: None,
            photos: vec![],
        }
    }

    fn raw_leg(title: &str, date: &str) -> RawDay {
        RawDay {
            title: title.to_string(),
            content: None,
            date: Some(date.to_string()),
            miles: Some(50.5),
            ascent: Some(3650.0),
            descent: Some(4375.0),
            gpx_filename: Some("track.gpx".to_string()),
            photos: vec![],
        }
    }

    fn config_with(days: Vec<RawDay>) -> Config {
        Config {
            title: "Tour".to_string(),
            map: Default::default(),
            gpx_dir: "gpx".to_string(),
            image_dir: "images".to_string(),
            days,
        }
    }

    #[test]
    fn test_tagged_union_from_raw() {
        let it = Itinerary::from_config(&config_with(vec![
            raw_info("Introduction"),
            raw_leg("A to B", "2022-11-26"),
            raw_info("Conclusion"),
        ]))
        .unwrap();

        assert_eq!(it.len(), 3);
        assert!(!it.day(0).is_leg());
        assert!(it.day(1).is_leg());
        match it.day(1) {
            Day::Leg { date, miles, gpx_filename, .. } => {
                assert_eq!(*date, NaiveDate::from_ymd_opt(2022, 11, 26).unwrap());
                assert_eq!(*miles, 50.5);
                assert_eq!(gpx_filename, "track.gpx");
            }
            _ => panic!("expected leg"),
        }
    }

    #[test]
    fn test_rejects_leg_sentinels() {
        let err = Itinerary::from_config(&config_with(vec![
            raw_leg("A to B", "2022-11-25"),
            raw_leg("B to C", "2022-11-26"),
            raw_info("Conclusion"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("first day"));
    }

    #[test]
    fn test_rejects_bad_date() {
        let err = Itinerary::from_config(&config_with(vec![
            raw_info("Introduction"),
            raw_leg("A to B", "November 25"),
            raw_info("Conclusion"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("bad date"));
    }

    #[test]
    fn test_rejects_too_short() {
        let err = Itinerary::from_config(&config_with(vec![
            raw_info("Introduction"),
            raw_info("Conclusion"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("at least one leg"));
    }

    #[test]
    fn test_fixture_shape() {
        let it = fixture(9);
        assert_eq!(it.len(), 11);
        assert!(!it.day(0).is_leg());
        assert!(!it.day(10).is_leg());
        assert!((1..=9).all(|i| it.day(i).is_leg()));
    }
}
