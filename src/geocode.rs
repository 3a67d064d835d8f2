//! Reverse geocoding via the ArcGIS World GeocodeServer
//!
//! Used by `index-photos --geocode` to suggest captions for freshly located
//! photos. Requires ARCGIS_API_KEY in the environment.

use anyhow::Result;

const REVERSE_GEOCODE_URL: &str =
    "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer/reverseGeocode";

/// Resolve a coordinate to a human-readable place label
pub async fn reverse_geocode(
    client: &reqwest::Client,
    token: &str,
    lat: f64,
    lon: f64,
) -> Result<String> {
    let location = serde_json::json!({ "x": lon, "y": lat }).to_string();
    let url = format!(
        "{}?f=json&token={}&location={}&featureTypes={}",
        REVERSE_GEOCODE_URL,
        urlencoding::encode(token),
        urlencoding::encode(&location),
        urlencoding::encode("StreetAddress,POI"),
    );

    tracing::debug!("Reverse geocoding ({:.5}, {:.5})", lat, lon);

    let response = client
        .get(&url)
        .header("User-Agent", "TripViewer/0.1")
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("geocoder returned status {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    if let Some(error) = body.get("error") {
        anyhow::bail!("geocoder error: {}", error);
    }

    let label = body
        .get("address")
        .and_then(|a| {
            a.get("LongLabel")
                .or_else(|| a.get("Match_addr"))
                .and_then(|v| v.as_str())
        })
        .ok_or_else(|| anyhow::anyhow!("geocoder response missing address label"))?;

    Ok(label.to_string())
}
