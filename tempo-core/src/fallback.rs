//! Placeholder weather for when no provider can be reached.
//!
//! Results built here are always tagged [`DataSource::Synthetic`] so callers
//! can tell them apart from vendor data.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use crate::{
    model::{
        CurrentConditions, DailyForecastEntry, DataSource, Location, LocationQuery,
        NormalizedWeatherResult,
    },
    provider::ProviderId,
};

const CLEAR: &str = "Ensolarado";
const PARTLY_CLOUDY: &str = "Parcialmente nublado";

/// Deterministic placeholder covering `days` days from `start`.
pub fn synthetic_result(
    query: &LocationQuery,
    provider: ProviderId,
    start: NaiveDate,
    days: u8,
    reason: impl Into<String>,
) -> NormalizedWeatherResult {
    let forecast: BTreeMap<String, DailyForecastEntry> = (0..u64::from(days.max(1)))
        .filter_map(|i| start.checked_add_days(Days::new(i)).map(|date| (i, date)))
        .map(|(i, date)| (date.format("%Y-%m-%d").to_string(), synthetic_day(i)))
        .collect();

    let today = synthetic_day(0);
    let current = CurrentConditions {
        temperature: today.avg_temp,
        feelslike: today.avg_temp.map(|t| t + 2.0),
        humidity: today.humidity,
        wind_speed: today.wind_speed,
        description: today.description.clone(),
        icon: None,
        observation_time: None,
    };

    let (latitude, longitude) = match query {
        LocationQuery::Coordinates { latitude, longitude, .. } => (Some(*latitude), Some(*longitude)),
        LocationQuery::City(_) => (None, None),
    };

    NormalizedWeatherResult {
        provider,
        source: DataSource::Synthetic { reason: reason.into() },
        location: Location {
            name: query.label().map(str::to_string),
            latitude,
            longitude,
            ..Location::default()
        },
        description: current.description.clone(),
        current,
        forecast,
    }
}

fn synthetic_day(i: u64) -> DailyForecastEntry {
    let step = i as f64;
    let max = 20.0 + (i * 3 % 10) as f64;
    let min = 10.0 + (i % 5) as f64;

    DailyForecastEntry {
        max_temp: Some(max),
        min_temp: Some(min),
        avg_temp: Some(((max + min) / 2.0).round()),
        description: Some(if i == 0 { CLEAR } else { PARTLY_CLOUDY }.to_string()),
        icon: None,
        humidity: Some(50 + (i * 7 % 30) as u8),
        wind_speed: Some(5.0 + step % 10.0),
        sunrise: Some("06:00".to_string()),
        sunset: Some("18:00".to_string()),
        uv_index: Some(3.0 + step % 5.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 30).unwrap()
    }

    #[test]
    fn result_is_labelled_synthetic() {
        let result = synthetic_result(
            &LocationQuery::city("Florianópolis"),
            ProviderId::Weatherstack,
            start(),
            3,
            "network down",
        );

        assert!(result.is_synthetic());
        assert_eq!(result.source, DataSource::Synthetic { reason: "network down".into() });
        assert_eq!(result.location.name.as_deref(), Some("Florianópolis"));
    }

    #[test]
    fn covers_consecutive_days_across_month_end() {
        let result =
            synthetic_result(&LocationQuery::default_location(), ProviderId::OpenMeteo, start(), 3, "x");

        let dates: Vec<&String> = result.forecast.keys().collect();
        assert_eq!(dates, ["2024-01-30", "2024-01-31", "2024-02-01"]);
        assert_eq!(result.location.latitude, Some(-27.5949));
    }

    #[test]
    fn is_deterministic() {
        let query = LocationQuery::city("Lisboa");
        let a = synthetic_result(&query, ProviderId::OpenMeteo, start(), 14, "x");
        let b = synthetic_result(&query, ProviderId::OpenMeteo, start(), 14, "x");
        assert_eq!(a, b);
        assert_eq!(a.forecast.len(), 14);
    }

    #[test]
    fn current_matches_first_day() {
        let result =
            synthetic_result(&LocationQuery::city("Lisboa"), ProviderId::OpenMeteo, start(), 1, "x");
        let first = &result.forecast["2024-01-30"];

        assert_eq!(result.current.temperature, first.avg_temp);
        assert_eq!(result.current.description.as_deref(), Some("Ensolarado"));
        assert_eq!(result.description.as_deref(), Some("Ensolarado"));
    }
}
