//! HTTP Server - serves the itinerary via REST API
//!
//! Endpoints:
//! - GET /api/itinerary            → Trip title + full day list
//! - GET /api/days/:idx            → One day record
//! - GET /api/days/:idx/track      → Decoded track geometry + ride totals
//! - GET /api/photos/:date         → Photos taken on a date (possibly empty)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::itinerary::{Day, Photo};
use crate::state::AppState;
use crate::track::{self, GeoBounds, RideTotals, TrackPoint};

/// Start the HTTP server
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    tracing::info!("Initializing HTTP server on port {}", port);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/itinerary", get(get_itinerary))
        .route("/days/:idx", get(get_day))
        .route("/days/:idx/track", get(get_day_track))
        .route("/photos/:date", get(get_photos))
        .with_state(state.clone());
    tracing::debug!("API routes registered");

    // Static bundle (photos, prebuilt pages) from ./public
    let static_files = ServeDir::new("public");

    let app = Router::new()
        .nest("/api", api)
        .fallback_service(static_files)
        .layer(cors);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Starting server on http://localhost:{}", port);
    tracing::info!("  API: http://localhost:{}/api/itinerary", port);
    tracing::info!("  Days: {}", state.itinerary.len());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server bound to {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct ItineraryResponse<'a> {
    title: &'a str,
    days: &'a [Day],
}

/// GET /api/itinerary - trip title + day list
async fn get_itinerary(State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("GET /api/itinerary");
    Json(ItineraryResponse {
        title: state.itinerary.title(),
        days: state.itinerary.days(),
    })
    .into_response()
}

/// GET /api/days/:idx - one day record
async fn get_day(
    State(state): State<AppState>,
    Path(idx): Path<usize>,
) -> Result<impl IntoResponse, StatusCode> {
    tracing::info!("GET /api/days/{}", idx);
    match state.itinerary.get(idx) {
        Some(day) => Ok(Json(day.clone())),
        None => {
            tracing::warn!("Day {} out of range", idx);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

#[derive(Serialize)]
struct TrackResponse {
    filename: String,
    num_points: usize,
    bounds: GeoBounds,
    totals: RideTotals,
    points: Vec<TrackPoint>,
}

/// GET /api/days/:idx/track - decoded geometry for a leg day
async fn get_day_track(
    State(state): State<AppState>,
    Path(idx): Path<usize>,
) -> Result<impl IntoResponse, StatusCode> {
    tracing::info!("GET /api/days/{}/track", idx);

    let day = state.itinerary.get(idx).ok_or(StatusCode::NOT_FOUND)?;
    let filename = match day {
        Day::Leg { gpx_filename, .. } => gpx_filename.clone(),
        Day::Info { .. } => {
            tracing::debug!("Day {} is informational, no track", idx);
            return Err(StatusCode::NOT_FOUND);
        }
    };

    match state.load_track(&filename).await {
        Ok(geometry) => {
            tracing::debug!("Track '{}': {} points", filename, geometry.points.len());
            Ok(Json(TrackResponse {
                filename,
                num_points: geometry.points.len(),
                bounds: geometry.bounds,
                totals: track::totals(&geometry),
                points: geometry.points.clone(),
            }))
        }
        Err(e) => {
            tracing::error!("Track '{}' failed to load: {}", filename, e);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// GET /api/photos/:date - photos for a date; unknown dates yield []
async fn get_photos(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<Photo>>, StatusCode> {
    tracing::debug!("GET /api/photos/{}", date);
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok(Json(state.photos.photos_for(date).to_vec()))
}
