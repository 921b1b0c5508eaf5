use std::fmt;

use chrono::NaiveDate;
use tempo_core::{DailyForecastEntry, DataSource, NormalizedWeatherResult, Units};

/// Which part of the forecast to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    All,
    Day(NaiveDate),
    Week(NaiveDate),
}

pub fn render(result: &NormalizedWeatherResult, view: View, units: Units) -> String {
    Report { result, view, units }.to_string()
}

struct Report<'a> {
    result: &'a NormalizedWeatherResult,
    view: View,
    units: Units,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Report { result, view, units } = *self;

        if let DataSource::Synthetic { reason } = &result.source {
            writeln!(f, "WARNING: provider unavailable, showing placeholder data ({reason})")?;
        }

        let place = [&result.location.name, &result.location.region, &result.location.country]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let place = if place.is_empty() { "Unknown location".to_string() } else { place };
        match &result.location.timezone {
            Some(tz) => writeln!(f, "{place} ({tz}) [{}]", result.provider)?,
            None => writeln!(f, "{place} [{}]", result.provider)?,
        }

        let current = &result.current;
        write!(f, "Now: {}", temp(current.temperature, units))?;
        if current.feelslike.is_some() {
            write!(f, " (feels like {})", temp(current.feelslike, units))?;
        }
        writeln!(f, ", {}", text(&current.description))?;
        writeln!(
            f,
            "Humidity {}, wind {}, observed {}",
            humidity(current.humidity),
            speed(current.wind_speed, units),
            text(&current.observation_time),
        )?;

        let days: Vec<(&String, &DailyForecastEntry)> = match view {
            View::All => result.forecast.iter().collect(),
            View::Day(date) => result.forecast_range(date, 1).collect(),
            View::Week(start) => result.forecast_range(start, 7).collect(),
        };

        if days.is_empty() {
            if !matches!(view, View::All) || !result.forecast.is_empty() {
                writeln!(f, "\nNo forecast available for the selected dates.")?;
            }
            return Ok(());
        }

        writeln!(f, "\nForecast:")?;
        for (date, day) in days {
            writeln!(
                f,
                "  {date}  {} / {}  {}",
                temp(day.min_temp, units),
                temp(day.max_temp, units),
                text(&day.description),
            )?;
            if matches!(view, View::Day(_)) {
                writeln!(
                    f,
                    "    humidity {}, wind {}, UV {}, sunrise {}, sunset {}",
                    humidity(day.humidity),
                    speed(day.wind_speed, units),
                    day.uv_index.map_or("n/a".to_string(), |uv| format!("{uv:.0}")),
                    text(&day.sunrise),
                    text(&day.sunset),
                )?;
            }
        }

        Ok(())
    }
}

fn temp(value: Option<f64>, units: Units) -> String {
    value.map_or("n/a".to_string(), |t| format!("{t:.1}{}", units.temperature_symbol()))
}

fn speed(value: Option<f64>, units: Units) -> String {
    value.map_or("n/a".to_string(), |s| format!("{s:.1} {}", units.speed_symbol()))
}

fn humidity(value: Option<u8>) -> String {
    value.map_or("n/a".to_string(), |h| format!("{h}%"))
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("n/a")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_core::{CurrentConditions, Location, ProviderId};

    fn sample() -> NormalizedWeatherResult {
        let day = |max: f64, description: &str| DailyForecastEntry {
            max_temp: Some(max),
            min_temp: Some(20.0),
            description: Some(description.to_string()),
            sunrise: Some("05:31".to_string()),
            ..Default::default()
        };

        NormalizedWeatherResult {
            provider: ProviderId::OpenMeteo,
            source: DataSource::Live,
            location: Location {
                name: Some("Florianópolis".into()),
                country: Some("Brasil".into()),
                timezone: Some("America/Sao_Paulo".into()),
                ..Default::default()
            },
            current: CurrentConditions {
                temperature: Some(27.4),
                humidity: Some(78),
                description: Some("Nublado".into()),
                ..Default::default()
            },
            forecast: [
                ("2024-01-01".to_string(), day(30.0, "Nublado")),
                ("2024-01-02".to_string(), day(28.5, "Chuva fraca")),
            ]
            .into_iter()
            .collect(),
            description: Some("Nublado".into()),
        }
    }

    #[test]
    fn renders_header_and_current() {
        let out = render(&sample(), View::All, Units::Metric);

        assert!(out.starts_with("Florianópolis, Brasil (America/Sao_Paulo) [open-meteo]"));
        assert!(out.contains("Now: 27.4°C, Nublado"));
        assert!(out.contains("Humidity 78%, wind n/a, observed n/a"));
        assert!(out.contains("2024-01-02  20.0°C / 28.5°C  Chuva fraca"));
    }

    #[test]
    fn day_view_shows_details_for_one_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let out = render(&sample(), View::Day(date), Units::Metric);

        assert!(out.contains("2024-01-01"));
        assert!(!out.contains("2024-01-02"));
        assert!(out.contains("sunrise 05:31"));
    }

    #[test]
    fn missing_dates_are_reported() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let out = render(&sample(), View::Week(date), Units::Fahrenheit);
        assert!(out.contains("No forecast available"));
    }

    #[test]
    fn synthetic_results_carry_a_warning() {
        let mut result = sample();
        result.source = DataSource::Synthetic { reason: "network_failure: timed out".into() };

        let out = render(&result, View::All, Units::Metric);
        assert!(out.starts_with("WARNING: provider unavailable"));
        assert!(out.contains("network_failure: timed out"));
    }
}
