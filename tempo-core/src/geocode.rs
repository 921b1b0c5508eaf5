//! City name to coordinates, via the Open-Meteo geocoding API (no key).
//!
//! Open-Meteo's forecast endpoint only accepts coordinates, so a free-form
//! city query has to be resolved first.

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::ClientError,
    model::{Location, LocationQuery},
};

pub const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Coordinates plus whatever place metadata is already known.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub location: Location,
}

impl Place {
    /// Place for a coordinates query. City queries return `None` and need [`search_url`].
    pub fn from_query(query: &LocationQuery) -> Option<Self> {
        match query {
            LocationQuery::City(_) => None,
            LocationQuery::Coordinates { latitude, longitude, label } => Some(Self {
                latitude: *latitude,
                longitude: *longitude,
                location: Location {
                    name: label.clone(),
                    latitude: Some(*latitude),
                    longitude: Some(*longitude),
                    ..Location::default()
                },
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    admin1: Option<String>,
    timezone: Option<String>,
}

/// The search API matches a single place name, so "Florianópolis, SC"
/// is searched as "Florianópolis".
pub(crate) fn search_name(city: &str) -> &str {
    city.split(',').next().unwrap_or(city).trim()
}

pub fn search_url(base: &str, city: &str, language: Option<&str>) -> Result<Url, ClientError> {
    let name = search_name(city);
    if name.is_empty() {
        return Err(ClientError::configuration("City name cannot be empty"));
    }

    let mut params = vec![("name", name), ("count", "1"), ("format", "json")];
    if let Some(language) = language {
        params.push(("language", language));
    }

    Url::parse_with_params(base, &params)
        .map_err(|e| ClientError::configuration(format!("Invalid geocoding URL '{base}': {e}")))
}

/// Pick the best match out of a geocoding payload.
pub fn place_from_response(city: &str, body: &Value) -> Result<Place, ClientError> {
    let parsed: GeocodingResponse = serde_json::from_value(body.clone()).map_err(|e| {
        ClientError::malformed(format!("Failed to parse Open-Meteo geocoding JSON: {e}"))
            .with_details(body.clone())
    })?;

    let best = parsed.results.into_iter().next().ok_or_else(|| {
        ClientError::vendor(format!("No location found for '{city}'")).with_details(body.clone())
    })?;

    Ok(Place {
        latitude: best.latitude,
        longitude: best.longitude,
        location: Location {
            name: Some(best.name),
            region: best.admin1,
            country: best.country,
            timezone: best.timezone,
            latitude: Some(best.latitude),
            longitude: Some(best.longitude),
        },
    })
}
