use std::collections::BTreeMap;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Deserializer, de};
use serde_json::{Value, json};

use crate::{
    ClientOptions,
    error::ClientError,
    model::{
        CurrentConditions, DailyForecastEntry, DataSource, Location, LocationQuery,
        NormalizedWeatherResult,
    },
    provider::{ProviderId, first_non_empty, non_empty, parse_payload, percent},
    wmo,
};

pub const BASE_URL: &str = "https://api.weatherstack.com";

/// Weatherstack: keyed, accepts free-form queries, forecast as a date-keyed object.
#[derive(Clone)]
pub struct WeatherstackProvider {
    access_key: String,
    base_url: String,
}

impl std::fmt::Debug for WeatherstackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherstackProvider")
            .field("access_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl WeatherstackProvider {
    pub fn new(access_key: String) -> Self {
        Self { access_key, base_url: BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `forecast` for multi-day requests, `current` otherwise.
    pub fn endpoint(options: &ClientOptions) -> &'static str {
        if options.forecast_days > 1 { "forecast" } else { "current" }
    }

    pub fn request_url(
        &self,
        query: &LocationQuery,
        options: &ClientOptions,
    ) -> Result<Url, ClientError> {
        let query = match query {
            LocationQuery::City(name) if name.trim().is_empty() => {
                return Err(ClientError::configuration("City name cannot be empty"));
            }
            LocationQuery::City(name) => name.trim().to_string(),
            LocationQuery::Coordinates { latitude, longitude, .. } => {
                format!("{latitude},{longitude}")
            }
        };

        let endpoint = Self::endpoint(options);
        let forecast_days = options.forecast_days.to_string();

        let mut params = vec![
            ("access_key", self.access_key.as_str()),
            ("query", query.as_str()),
            ("units", options.units.weatherstack_code()),
        ];
        if endpoint == "forecast" {
            params.push(("forecast_days", forecast_days.as_str()));
        }
        if let Some(language) = options.language.as_deref() {
            params.push(("language", language));
        }

        let base = format!("{}/{endpoint}", self.base_url.trim_end_matches('/'));
        Url::parse_with_params(&base, &params)
            .map_err(|e| ClientError::configuration(format!("Invalid Weatherstack URL '{base}': {e}")))
    }

    pub fn normalize(
        &self,
        query: &LocationQuery,
        body: &Value,
        options: &ClientOptions,
    ) -> Result<NormalizedWeatherResult, ClientError> {
        let parsed: WsResponse = parse_payload(ProviderId::Weatherstack, body)?;

        let place = parsed.location.unwrap_or_default();
        let location = Location {
            name: non_empty(place.name).or_else(|| query.label().map(str::to_string)),
            region: non_empty(place.region),
            country: non_empty(place.country),
            timezone: non_empty(place.timezone_id),
            latitude: place.lat,
            longitude: place.lon,
        };

        let current = parsed.current;
        let description = first_non_empty(&current.weather_descriptions)
            .or_else(|| non_empty(current.weather_description));

        let current = CurrentConditions {
            temperature: current.temperature,
            feelslike: current.feelslike,
            humidity: percent(current.humidity),
            wind_speed: current.wind_speed,
            description: description.clone(),
            icon: first_non_empty(&current.weather_icons),
            observation_time: non_empty(current.observation_time),
        };

        let forecast = match parsed.forecast {
            Some(forecast) => forecast_entries(forecast, options.language.as_deref())?,
            None => BTreeMap::new(),
        };

        Ok(NormalizedWeatherResult {
            provider: ProviderId::Weatherstack,
            source: DataSource::Live,
            location,
            current,
            forecast,
            description,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WsResponse {
    #[serde(default)]
    location: Option<WsLocation>,
    current: WsCurrent,
    #[serde(default)]
    forecast: Option<WsForecast>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsLocation {
    name: Option<String>,
    region: Option<String>,
    country: Option<String>,
    timezone_id: Option<String>,
    #[serde(deserialize_with = "number_or_string")]
    lat: Option<f64>,
    #[serde(deserialize_with = "number_or_string")]
    lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsCurrent {
    observation_time: Option<String>,
    temperature: Option<f64>,
    feelslike: Option<f64>,
    humidity: Option<f64>,
    wind_speed: Option<f64>,
    weather_descriptions: Vec<String>,
    weather_description: Option<String>,
    weather_icons: Vec<String>,
}

/// Date-keyed object, or a list of days each carrying its own `date`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WsForecast {
    ByDate(BTreeMap<String, WsDay>),
    List(Vec<WsDay>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsDay {
    date: Option<String>,
    maxtemp: Option<f64>,
    mintemp: Option<f64>,
    avgtemp: Option<f64>,
    uv_index: Option<f64>,
    weather_descriptions: Vec<String>,
    condition: Option<String>,
    weather_code: Option<i64>,
    weather_icons: Vec<String>,
    humidity: Option<f64>,
    wind_speed: Option<f64>,
    sunrise: Option<String>,
    sunset: Option<String>,
    astro: Option<WsAstro>,
    hourly: Vec<WsHour>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsAstro {
    sunrise: Option<String>,
    sunset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsHour {
    weather_descriptions: Vec<String>,
    weather_icons: Vec<String>,
    humidity: Option<f64>,
    wind_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WsErrorResponse {
    #[serde(default)]
    success: Option<bool>,
    error: WsError,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsError {
    code: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    info: Option<String>,
}

/// Coordinates come back as strings (`"lat": "-27.583"`).
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
    }
}

/// Weatherstack answers HTTP 200 with `{"success": false, "error": {...}}`.
pub(crate) fn embedded_error(body: &Value, status: StatusCode) -> Option<ClientError> {
    let response = WsErrorResponse::deserialize(body).ok()?;
    if response.success == Some(true) {
        return None;
    }
    let WsError { code, kind, info } = response.error;
    let kind = non_empty(kind);

    let head = [code.map(|c| c.to_string()), kind.clone()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let message = format!(
        "Weatherstack request failed: {head} - {}",
        non_empty(info).unwrap_or_default()
    );
    let message = message.trim_end_matches([' ', '-']).to_string();

    let rate_limited = code == Some(429)
        || matches!(kind.as_deref(), Some("too_many_requests" | "rate_limit_reached"));

    let err = if rate_limited {
        ClientError::rate_limited(message)
    } else {
        ClientError::vendor(message)
    };
    Some(err.with_details(json!({ "status": status.as_u16(), "response": body })))
}

fn forecast_entries(
    forecast: WsForecast,
    language: Option<&str>,
) -> Result<BTreeMap<String, DailyForecastEntry>, ClientError> {
    match forecast {
        WsForecast::ByDate(days) => Ok(days
            .into_iter()
            .map(|(date, day)| (date, day_entry(day, language)))
            .collect()),
        WsForecast::List(days) => days
            .into_iter()
            .enumerate()
            .map(|(i, day)| {
                let date = non_empty(day.date.clone()).ok_or_else(|| {
                    ClientError::malformed(format!(
                        "Weatherstack forecast entry {i} has no 'date'"
                    ))
                })?;
                Ok((date, day_entry(day, language)))
            })
            .collect(),
    }
}

fn day_entry(day: WsDay, language: Option<&str>) -> DailyForecastEntry {
    let first_hour = day.hourly.into_iter().next().unwrap_or_default();
    let astro = day.astro.unwrap_or_default();

    DailyForecastEntry {
        max_temp: day.maxtemp,
        min_temp: day.mintemp,
        avg_temp: day.avgtemp,
        description: first_non_empty(&day.weather_descriptions)
            .or_else(|| non_empty(day.condition))
            .or_else(|| day.weather_code.map(|c| wmo::describe(c, language).to_string()))
            .or_else(|| first_non_empty(&first_hour.weather_descriptions)),
        icon: first_non_empty(&day.weather_icons)
            .or_else(|| first_non_empty(&first_hour.weather_icons)),
        humidity: percent(day.humidity.or(first_hour.humidity)),
        wind_speed: day.wind_speed.or(first_hour.wind_speed),
        sunrise: non_empty(astro.sunrise).or_else(|| non_empty(day.sunrise)),
        sunset: non_empty(astro.sunset).or_else(|| non_empty(day.sunset)),
        uv_index: day.uv_index,
    }
}
