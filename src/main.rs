//! Trip Viewer - interactive map viewer for multi-day bike tours
//!
//! CLI commands:
//! - gui: Launch the native viewer
//! - serve: Start the HTTP API
//! - list: List itinerary days
//! - stats: Recorded vs computed ride stats for one leg
//! - index-photos: Pin logged photos to track coordinates

mod config;
mod geocode;
mod gui;
mod itinerary;
mod layers;
mod logging;
mod nav;
mod photos;
mod render;
mod server;
mod state;
mod track;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::itinerary::{Day, Itinerary};

#[derive(Parser)]
#[command(name = "trip_viewer")]
#[command(about = "Step through a multi-day tour on a map, one day at a time")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the itinerary manifest
    #[arg(short, long, default_value = "itinerary.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the native viewer
    Gui,

    /// Start the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// List itinerary days
    List,

    /// Recorded vs computed ride stats for one leg day
    Stats {
        /// Day index (1 is the first leg)
        day: usize,
    },

    /// Pin logged photos to the coordinates of the nearest track points
    IndexPhotos {
        /// Photo log manifest (filename + timestamp per photo)
        #[arg(long, default_value = "photo_log.yaml")]
        log: PathBuf,

        /// Annotate captions with reverse-geocoded place names
        #[arg(long)]
        geocode: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("logs");
    tracing::info!("Trip Viewer starting up");

    let cli = Cli::parse();
    tracing::debug!("CLI args parsed: config={:?}", cli.config);

    let config = if cli.config.exists() {
        tracing::info!("Loading itinerary from {:?}", cli.config);
        config::Config::load(&cli.config)?
    } else {
        tracing::warn!("Manifest not found: {:?}, using built-in sample", cli.config);
        sample_config()
    };
    let itinerary = Itinerary::from_config(&config)?;

    match cli.command {
        Commands::Gui => {
            tracing::info!("Launching native viewer");
            gui::run_viewer(config, itinerary)?;
        }

        Commands::Serve { port } => {
            let state = state::AppState::new(config, itinerary);
            server::serve(state, port).await?;
        }

        Commands::List => {
            list_days(&itinerary);
        }

        Commands::Stats { day } => {
            print_stats(&config, &itinerary, day)?;
        }

        Commands::IndexPhotos { log, geocode } => {
            index_photos(&config, &log, geocode).await?;
        }
    }

    Ok(())
}

/// Print the day table
fn list_days(itinerary: &Itinerary) {
    println!("{} ({} days):", itinerary.title(), itinerary.len());
    println!();

    for (i, day) in itinerary.days().iter().enumerate() {
        match day {
            Day::Info { title, .. } => {
                println!("  {:>2}. {}", i, title);
            }
            Day::Leg {
                title,
                date,
                miles,
                ascent_ft,
                descent_ft,
                photos,
                ..
            } => {
                println!(
                    "  {:>2}. {} [{}] {:.1} mi, +{:.0}/-{:.0} ft, {} photos",
                    i,
                    title,
                    date,
                    miles,
                    ascent_ft,
                    descent_ft,
                    photos.len()
                );
            }
        }
    }
}

/// Compare the manifest's recorded numbers against the decoded track
fn print_stats(config: &config::Config, itinerary: &Itinerary, index: usize) -> anyhow::Result<()> {
    let day = itinerary
        .get(index)
        .with_context(|| format!("no day at index {}", index))?;

    let Day::Leg {
        title,
        miles,
        ascent_ft,
        descent_ft,
        gpx_filename,
        ..
    } = day
    else {
        anyhow::bail!("day {} ({}) is informational, no track", index, day.title());
    };

    let path = PathBuf::from(&config.gpx_dir).join(gpx_filename);
    println!("Decoding {:?}...", path);
    let geometry = track::load_track_file(&path)?;
    let computed = track::totals(&geometry);

    println!();
    println!("{}", title);
    println!("  {:>10}  {:>10}  {:>10}", "", "recorded", "computed");
    println!("  {:>10}  {:>10.1}  {:>10.1}", "miles", miles, computed.miles);
    println!("  {:>10}  {:>10.0}  {:>10.0}", "ascent ft", ascent_ft, computed.ascent_ft);
    println!("  {:>10}  {:>10.0}  {:>10.0}", "descent ft", descent_ft, computed.descent_ft);
    println!("  {} track points", geometry.points.len());

    Ok(())
}

/// Locate logged photos along the recorded tracks and print a manifest
/// fragment for the itinerary
async fn index_photos(
    config: &config::Config,
    log_path: &PathBuf,
    with_geocode: bool,
) -> anyhow::Result<()> {
    let log = photos::PhotoLog::load(log_path)
        .with_context(|| format!("failed to load photo log {:?}", log_path))?;
    println!("Loaded {} photo log entries", log.photos.len());

    // Every timed point from every track, in one chronological pool
    let gpx_dir = PathBuf::from(&config.gpx_dir);
    let mut points = Vec::new();
    for entry in std::fs::read_dir(&gpx_dir)
        .with_context(|| format!("failed to read gpx dir {:?}", gpx_dir))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("gpx") {
            continue;
        }
        match track::load_track_file(&path) {
            Ok(geometry) => points.extend(geometry.points),
            Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
        }
    }
    println!("Pooled {} track points", points.len());

    let mut located = photos::locate_photos(&log.photos, &points);
    if located.is_empty() {
        anyhow::bail!("no photos could be located (no timestamped track points?)");
    }

    if with_geocode {
        let secrets = config::Secrets::load();
        let token = secrets
            .arcgis_api_key
            .context("--geocode needs ARCGIS_API_KEY in .env")?;
        let client = reqwest::Client::new();

        for photo in &mut located {
            match geocode::reverse_geocode(&client, &token, photo.lat, photo.lon).await {
                Ok(label) => {
                    if photo.caption.is_none() {
                        photo.caption = Some(label);
                    }
                }
                Err(e) => tracing::warn!("Geocoding {} failed: {}", photo.filename, e),
            }
        }
    }

    println!();
    println!("# paste under the matching day's photos: key");
    print!("{}", photos::to_manifest_yaml(&located)?);

    Ok(())
}

/// Built-in sample when no manifest exists
fn sample_config() -> config::Config {
    config::Config {
        title: "Sample Tour".to_string(),
        map: Default::default(),
        gpx_dir: "public/static/gpx-tracks".to_string(),
        image_dir: "public/static/images".to_string(),
        days: vec![
            config::RawDay {
                title: "Introduction".to_string(),
                content: Some("A two-day ride around the bay.".to_string()),
                date: None,
                miles: None,
                ascent: None,
                descent: None,
                gpx_filename: None,
                photos: vec![],
            },
            config::RawDay {
                title: "Around the bay".to_string(),
                content: None,
                date: Some("2022-11-25".to_string()),
                miles: Some(16.0),
                ascent: Some(1900.0),
                descent: Some(635.0),
                gpx_filename: Some("2022-11-25-around-the-bay.gpx".to_string()),
                photos: vec![],
            },
            config::RawDay {
                title: "Conclusion".to_string(),
                content: Some(String::new()),
                date: None,
                miles: None,
                ascent: None,
                descent: None,
                gpx_filename: None,
                photos: vec![],
            },
        ],
    }
}
