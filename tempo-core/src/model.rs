use std::{collections::BTreeMap, fmt, ops::Bound};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Latitude/longitude of the fixed default location (Florianópolis, SC).
pub const DEFAULT_LATITUDE: f64 = -27.5949;
pub const DEFAULT_LONGITUDE: f64 = -48.5482;
pub const DEFAULT_LOCATION_LABEL: &str = "Florianópolis";

/// What the caller asks weather for.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Free-form city string, e.g. "Florianópolis, SC".
    City(String),
    /// Fixed coordinates, optionally with a display label.
    Coordinates {
        latitude: f64,
        longitude: f64,
        label: Option<String>,
    },
}

impl LocationQuery {
    pub fn city(name: impl Into<String>) -> Self {
        Self::City(name.into())
    }

    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Self::Coordinates { latitude, longitude, label: None }
    }

    /// The location the application shows when nothing else was entered.
    pub fn default_location() -> Self {
        Self::Coordinates {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            label: Some(DEFAULT_LOCATION_LABEL.to_string()),
        }
    }

    /// Best display name available without asking a provider.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::City(name) => Some(name.as_str()),
            Self::Coordinates { label, .. } => label.as_deref(),
        }
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::City(name) => f.write_str(name),
            Self::Coordinates { latitude, longitude, label: Some(label) } => {
                write!(f, "{label} ({latitude},{longitude})")
            }
            Self::Coordinates { latitude, longitude, label: None } => {
                write!(f, "{latitude},{longitude}")
            }
        }
    }
}

/// Measurement system requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// °C, km/h
    #[default]
    Metric,
    /// K, km/h
    Scientific,
    /// °F, mph
    Fahrenheit,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Scientific => "scientific",
            Units::Fahrenheit => "fahrenheit",
        }
    }

    /// Value of Weatherstack's `units` query parameter.
    pub fn weatherstack_code(&self) -> &'static str {
        match self {
            Units::Metric => "m",
            Units::Scientific => "s",
            Units::Fahrenheit => "f",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Scientific => "K",
            Units::Fahrenheit => "°F",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Metric | Units::Scientific => "km/h",
            Units::Fahrenheit => "mph",
        }
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" | "m" => Ok(Units::Metric),
            "scientific" | "s" => Ok(Units::Scientific),
            "fahrenheit" | "f" => Ok(Units::Fahrenheit),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, scientific, fahrenheit."
            )),
        }
    }
}

/// Place metadata as reported by the provider. Not validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: Option<f64>,
    pub feelslike: Option<f64>,
    pub humidity: Option<u8>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub observation_time: Option<String>,
}

/// One day of forecast. The date is the key in [`NormalizedWeatherResult::forecast`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyForecastEntry {
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub avg_temp: Option<f64>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub humidity: Option<u8>,
    pub wind_speed: Option<f64>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub uv_index: Option<f64>,
}

/// Where the numbers in a result came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DataSource {
    Live,
    /// Placeholder data produced because the provider could not be reached.
    Synthetic { reason: String },
}

/// Provider-independent weather result.
///
/// Every field the provider did not supply is `None`, which serializes as
/// `null`; fields are never dropped from the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWeatherResult {
    pub provider: ProviderId,
    pub source: DataSource,
    pub location: Location,
    pub current: CurrentConditions,
    /// ISO date (`YYYY-MM-DD`) to forecast entry, in date order.
    pub forecast: BTreeMap<String, DailyForecastEntry>,
    pub description: Option<String>,
}

impl NormalizedWeatherResult {
    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, DataSource::Synthetic { .. })
    }

    pub fn forecast_for(&self, date: NaiveDate) -> Option<&DailyForecastEntry> {
        self.forecast.get(&date.format("%Y-%m-%d").to_string())
    }

    /// Entries for `days` consecutive dates starting at `start`, skipping dates
    /// the provider did not return.
    pub fn forecast_range(
        &self,
        start: NaiveDate,
        days: u64,
    ) -> impl Iterator<Item = (&String, &DailyForecastEntry)> {
        let from = start.format("%Y-%m-%d").to_string();
        // Past year 9999 the formatted end ("+10000-...") sorts before the start.
        let to = match start.checked_add_days(Days::new(days)) {
            Some(end) => {
                let end = end.format("%Y-%m-%d").to_string();
                if end >= from { Bound::Excluded(end) } else { Bound::Unbounded }
            }
            None => Bound::Unbounded,
        };
        self.forecast.range((Bound::Included(from), to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_days(dates: &[&str]) -> NormalizedWeatherResult {
        NormalizedWeatherResult {
            provider: ProviderId::OpenMeteo,
            source: DataSource::Live,
            location: Location::default(),
            current: CurrentConditions::default(),
            forecast: dates
                .iter()
                .map(|d| (d.to_string(), DailyForecastEntry::default()))
                .collect(),
            description: None,
        }
    }

    #[test]
    fn unknown_fields_serialize_as_null() {
        let value = serde_json::to_value(result_with_days(&["2024-01-01"])).unwrap();

        assert!(value["current"]["feelslike"].is_null());
        assert!(value["current"].as_object().unwrap().contains_key("icon"));
        assert!(value["forecast"]["2024-01-01"]["uv_index"].is_null());
        assert!(value["location"]["timezone"].is_null());
        assert_eq!(value["source"]["kind"], "live");
        assert_eq!(value["provider"], "open-meteo");
    }

    #[test]
    fn synthetic_source_is_labelled() {
        let mut result = result_with_days(&[]);
        result.source = DataSource::Synthetic { reason: "offline".into() };

        let value = serde_json::to_value(&result).unwrap();
        assert!(result.is_synthetic());
        assert_eq!(value["source"]["kind"], "synthetic");
        assert_eq!(value["source"]["reason"], "offline");
    }

    #[test]
    fn forecast_range_selects_a_week() {
        let result = result_with_days(&[
            "2024-01-01",
            "2024-01-02",
            "2024-01-05",
            "2024-01-08",
            "2024-01-09",
        ]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let days: Vec<&String> = result.forecast_range(start, 7).map(|(d, _)| d).collect();
        assert_eq!(days, ["2024-01-02", "2024-01-05", "2024-01-08"]);
    }

    #[test]
    fn forecast_range_across_year_9999() {
        let result = result_with_days(&["9999-12-27", "9999-12-28", "9999-12-31"]);
        let start = NaiveDate::from_ymd_opt(9999, 12, 28).unwrap();

        let days: Vec<&String> = result.forecast_range(start, 7).map(|(d, _)| d).collect();
        assert_eq!(days, ["9999-12-28", "9999-12-31"]);
    }

    #[test]
    fn forecast_range_of_zero_days_is_empty() {
        let result = result_with_days(&["2024-01-01"]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(result.forecast_range(start, 0).count(), 0);
    }

    #[test]
    fn forecast_for_single_day() {
        let result = result_with_days(&["2024-01-01"]);
        let present = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let absent = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();

        assert!(result.forecast_for(present).is_some());
        assert!(result.forecast_for(absent).is_none());
    }

    #[test]
    fn units_parse_from_names_and_codes() {
        assert_eq!(Units::try_from("f").unwrap(), Units::Fahrenheit);
        assert_eq!(Units::try_from("Metric").unwrap(), Units::Metric);
        assert!(Units::try_from("imperial").is_err());
    }

    #[test]
    fn location_query_display() {
        assert_eq!(LocationQuery::city("Lisboa").to_string(), "Lisboa");
        assert_eq!(LocationQuery::coordinates(1.5, -2.0).to_string(), "1.5,-2");
        assert_eq!(LocationQuery::default_location().label(), Some("Florianópolis"));
    }
}
