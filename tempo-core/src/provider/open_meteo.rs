use std::collections::BTreeMap;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    ClientOptions,
    error::ClientError,
    geocode::{self, GEOCODING_URL, Place},
    model::{CurrentConditions, DailyForecastEntry, DataSource, NormalizedWeatherResult, Units},
    provider::{ProviderId, non_empty, parse_payload, percent},
    wmo,
};

pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,wind_speed_10m,weather_code";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,temperature_2m_mean,\
    weather_code,sunrise,sunset,uv_index_max,relative_humidity_2m_mean,wind_speed_10m_max";

const KELVIN_OFFSET: f64 = 273.15;

/// Open-Meteo: keyless, coordinates only, daily data as parallel arrays.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    forecast_url: String,
    geocoding_url: String,
}

impl Default for OpenMeteoProvider {
    fn default() -> Self {
        Self::with_base_urls(FORECAST_URL, GEOCODING_URL)
    }
}

impl OpenMeteoProvider {
    pub fn with_base_urls(forecast_url: impl Into<String>, geocoding_url: impl Into<String>) -> Self {
        Self { forecast_url: forecast_url.into(), geocoding_url: geocoding_url.into() }
    }

    pub fn geocoding_url(&self, city: &str, options: &ClientOptions) -> Result<Url, ClientError> {
        geocode::search_url(&self.geocoding_url, city, options.language.as_deref())
    }

    pub fn forecast_url(&self, place: &Place, options: &ClientOptions) -> Result<Url, ClientError> {
        let latitude = place.latitude.to_string();
        let longitude = place.longitude.to_string();
        let forecast_days = options.forecast_days.to_string();

        let mut params = vec![
            ("latitude", latitude.as_str()),
            ("longitude", longitude.as_str()),
            ("current", CURRENT_FIELDS),
            ("daily", DAILY_FIELDS),
            ("forecast_days", forecast_days.as_str()),
            ("timezone", "auto"),
        ];
        if options.units == Units::Fahrenheit {
            params.push(("temperature_unit", "fahrenheit"));
            params.push(("wind_speed_unit", "mph"));
        }

        Url::parse_with_params(&self.forecast_url, &params).map_err(|e| {
            ClientError::configuration(format!("Invalid Open-Meteo URL '{}': {e}", self.forecast_url))
        })
    }

    pub fn normalize(
        &self,
        place: &Place,
        body: &Value,
        options: &ClientOptions,
    ) -> Result<NormalizedWeatherResult, ClientError> {
        let parsed: OmForecastResponse = parse_payload(ProviderId::OpenMeteo, body)?;

        let language = options.language.as_deref();
        let description = parsed
            .current
            .weather_code
            .map(|code| wmo::describe(code, language).to_string());

        let current = CurrentConditions {
            temperature: temperature(parsed.current.temperature_2m, options.units),
            feelslike: temperature(parsed.current.apparent_temperature, options.units),
            humidity: percent(parsed.current.relative_humidity_2m),
            wind_speed: parsed.current.wind_speed_10m,
            description: description.clone(),
            icon: None,
            observation_time: non_empty(parsed.current.time),
        };

        let mut location = place.location.clone();
        if location.timezone.is_none() {
            location.timezone = non_empty(parsed.timezone);
        }

        let forecast = match parsed.daily {
            Some(daily) => daily_forecast(daily, options),
            None => BTreeMap::new(),
        };

        Ok(NormalizedWeatherResult {
            provider: ProviderId::OpenMeteo,
            source: DataSource::Live,
            location,
            current,
            forecast,
            description,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    #[serde(default)]
    timezone: Option<String>,
    current: OmCurrent,
    #[serde(default)]
    daily: Option<OmDaily>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OmCurrent {
    time: Option<String>,
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    wind_speed_10m: Option<f64>,
    weather_code: Option<i64>,
}

/// Parallel arrays indexed like `time`; a short or `null` slot is unknown.
#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<i64>>,
    #[serde(default)]
    sunrise: Vec<Option<String>>,
    #[serde(default)]
    sunset: Vec<Option<String>>,
    #[serde(default)]
    uv_index_max: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmError {
    error: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// `{"error": true, "reason": "..."}`, sent with HTTP 400.
pub(crate) fn embedded_error(body: &Value, status: StatusCode) -> Option<ClientError> {
    let error = OmError::deserialize(body).ok().filter(|e| e.error)?;

    let reason = non_empty(error.reason).unwrap_or_else(|| "unknown error".to_string());
    Some(
        ClientError::vendor(format!("Open-Meteo error: {reason}"))
            .with_details(json!({ "status": status.as_u16(), "response": body })),
    )
}

// Open-Meteo has no Kelvin option; scientific units are converted from Celsius.
fn temperature(value: Option<f64>, units: Units) -> Option<f64> {
    let t = value?;
    Some(if units == Units::Scientific { t + KELVIN_OFFSET } else { t })
}

fn slot<T: Clone>(column: &[Option<T>], i: usize) -> Option<T> {
    column.get(i).cloned().flatten()
}

fn daily_forecast(daily: OmDaily, options: &ClientOptions) -> BTreeMap<String, DailyForecastEntry> {
    let language = options.language.as_deref();

    daily
        .time
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let entry = DailyForecastEntry {
                max_temp: temperature(slot(&daily.temperature_2m_max, i), options.units),
                min_temp: temperature(slot(&daily.temperature_2m_min, i), options.units),
                avg_temp: temperature(slot(&daily.temperature_2m_mean, i), options.units),
                description: slot(&daily.weather_code, i)
                    .map(|code| wmo::describe(code, language).to_string()),
                icon: None,
                humidity: percent(slot(&daily.relative_humidity_2m_mean, i)),
                wind_speed: slot(&daily.wind_speed_10m_max, i),
                sunrise: non_empty(slot(&daily.sunrise, i)),
                sunset: non_empty(slot(&daily.sunset, i)),
                uv_index: slot(&daily.uv_index_max, i),
            };
            (date.clone(), entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocationQuery, error::ErrorKind};

    fn place() -> Place {
        Place::from_query(&LocationQuery::default_location()).unwrap()
    }

    fn payload() -> Value {
        json!({
            "latitude": -27.625,
            "longitude": -48.5,
            "timezone": "America/Sao_Paulo",
            "current": {
                "time": "2024-01-01T15:00",
                "temperature_2m": 27.4,
                "relative_humidity_2m": 78,
                "apparent_temperature": 30.1,
                "wind_speed_10m": 14.2,
                "weather_code": 2
            },
            "daily": {
                "time": ["2024-01-01", "2024-01-02"],
                "temperature_2m_max": [30.0, 28.5],
                "temperature_2m_min": [21.0, 20.5],
                "weather_code": [3, 61],
                "sunrise": ["2024-01-01T05:31"],
                "sunset": ["2024-01-01T19:17", "2024-01-02T19:17"],
                "uv_index_max": [11.2, null]
            }
        })
    }

    #[test]
    fn forecast_url_contains_expected_parameters() {
        let options = ClientOptions { forecast_days: 7, ..Default::default() };
        let url = OpenMeteoProvider::default().forecast_url(&place(), &options).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with(FORECAST_URL));
        assert!(pairs.contains(&("latitude".into(), "-27.5949".into())));
        assert!(pairs.contains(&("longitude".into(), "-48.5482".into())));
        assert!(pairs.contains(&("forecast_days".into(), "7".into())));
        assert!(pairs.contains(&("timezone".into(), "auto".into())));
        assert!(pairs.iter().any(|(k, v)| k == "current" && v.contains("weather_code")));
        assert!(!pairs.iter().any(|(k, _)| k == "temperature_unit"));
    }

    #[test]
    fn fahrenheit_requests_converted_units() {
        let options = ClientOptions { units: Units::Fahrenheit, ..Default::default() };
        let url = OpenMeteoProvider::default().forecast_url(&place(), &options).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("temperature_unit".into(), "fahrenheit".into())));
        assert!(pairs.contains(&("wind_speed_unit".into(), "mph".into())));
    }

    #[test]
    fn normalizes_current_and_daily_arrays() {
        let result = OpenMeteoProvider::default()
            .normalize(&place(), &payload(), &ClientOptions::default())
            .unwrap();

        assert_eq!(result.provider, ProviderId::OpenMeteo);
        assert_eq!(result.description.as_deref(), Some("Parcialmente nublado"));
        assert_eq!(result.location.name.as_deref(), Some("Florianópolis"));
        assert_eq!(result.location.timezone.as_deref(), Some("America/Sao_Paulo"));

        assert_eq!(result.current.temperature, Some(27.4));
        assert_eq!(result.current.feelslike, Some(30.1));
        assert_eq!(result.current.humidity, Some(78));
        assert_eq!(result.current.icon, None);
        assert_eq!(result.current.observation_time.as_deref(), Some("2024-01-01T15:00"));

        let first = &result.forecast["2024-01-01"];
        assert_eq!(first.max_temp, Some(30.0));
        assert_eq!(first.min_temp, Some(21.0));
        assert_eq!(first.description.as_deref(), Some("Nublado"));
        assert_eq!(first.uv_index, Some(11.2));

        let second = &result.forecast["2024-01-02"];
        assert_eq!(second.description.as_deref(), Some("Chuva fraca"));
        assert_eq!(second.sunrise, None);
        assert_eq!(second.uv_index, None);
        assert_eq!(second.avg_temp, None);
    }

    #[test]
    fn english_descriptions_follow_language() {
        let options = ClientOptions { language: Some("en".into()), ..Default::default() };
        let result = OpenMeteoProvider::default().normalize(&place(), &payload(), &options).unwrap();

        assert_eq!(result.description.as_deref(), Some("Partly cloudy"));
        assert_eq!(result.forecast["2024-01-01"].description.as_deref(), Some("Overcast"));
    }

    #[test]
    fn scientific_units_convert_to_kelvin() {
        let options = ClientOptions { units: Units::Scientific, ..Default::default() };
        let result = OpenMeteoProvider::default().normalize(&place(), &payload(), &options).unwrap();

        let kelvin = result.current.temperature.unwrap();
        assert!((kelvin - 300.55).abs() < 1e-9);
    }

    #[test]
    fn missing_daily_block_gives_empty_forecast() {
        let mut body = payload();
        body.as_object_mut().unwrap().remove("daily");

        let result = OpenMeteoProvider::default()
            .normalize(&place(), &body, &ClientOptions::default())
            .unwrap();
        assert!(result.forecast.is_empty());
    }

    #[test]
    fn missing_current_block_is_malformed() {
        let err = OpenMeteoProvider::default()
            .normalize(&place(), &json!({ "daily": {} }), &ClientOptions::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
    }

    #[test]
    fn wrongly_typed_fields_are_malformed() {
        let mut body = payload();
        body["daily"]["temperature_2m_max"] = json!("garbage");
        let err = OpenMeteoProvider::default()
            .normalize(&place(), &body, &ClientOptions::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
        assert_eq!(err.details.unwrap()["daily"]["temperature_2m_max"], "garbage");

        let mut body = payload();
        body["current"]["temperature_2m"] = json!({ "oops": 1 });
        let err = OpenMeteoProvider::default()
            .normalize(&place(), &body, &ClientOptions::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
    }

    #[test]
    fn daily_block_without_dates_is_malformed() {
        let mut body = payload();
        body["daily"] = json!({ "temperature_2m_max": [30.0] });
        let err = OpenMeteoProvider::default()
            .normalize(&place(), &body, &ClientOptions::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
    }

    #[test]
    fn error_payload_is_detected() {
        let body = json!({ "error": true, "reason": "Latitude must be in range of -90 to 90°." });
        let err = embedded_error(&body, StatusCode::BAD_REQUEST).unwrap();

        assert_eq!(err.kind, ErrorKind::VendorError);
        assert!(err.message.contains("Latitude must be in range"));
        assert_eq!(err.details.unwrap()["status"], 400);
        assert!(embedded_error(&payload(), StatusCode::OK).is_none());
    }
}
