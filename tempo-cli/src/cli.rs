use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode};
use tempo_core::{
    CancellationToken, Config, LocationQuery, ProviderId, Units, WeatherClient,
};

use crate::output::{self, View};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "tempo", version, about = "Weather from Open-Meteo or Weatherstack")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "open-meteo" or "weatherstack".
        provider: String,
    },

    /// Show weather for an address.
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Address or location name; Florianópolis when absent.
    pub address: Option<String>,

    /// Day to show (YYYY-MM-DD); if absent, the whole forecast.
    #[arg(long)]
    pub date: Option<String>,

    /// Show seven days starting at --date, or today.
    #[arg(long)]
    pub week: bool,

    /// Provider to ask instead of the configured default.
    #[arg(long)]
    pub provider: Option<String>,

    /// Number of forecast days to request (1-16).
    #[arg(long)]
    pub days: Option<u8>,

    /// metric, scientific or fahrenheit.
    #[arg(long)]
    pub units: Option<String>,

    /// Language for descriptions, e.g. "pt" or "en".
    #[arg(long)]
    pub language: Option<String>,

    /// Weatherstack access key, overriding the configured one.
    #[arg(long, env = "WEATHERSTACK_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Print the normalized result (or error) as JSON.
    #[arg(long)]
    pub json: bool,

    /// Show clearly-marked placeholder data if the provider fails.
    #[arg(long)]
    pub fallback: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show(args) => show(args).await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if id.requires_api_key() {
        let key = Password::new(&format!("{id} API key:"))
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
            .context("Failed to read API key")?;

        let key = key.trim();
        if key.is_empty() {
            bail!("API key cannot be empty");
        }
        config.upsert_provider_api_key(id, key.to_string());
    }

    if config.default_provider_id()? != id {
        let make_default = Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(true)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    let path = config.save()?;
    println!("Saved {id} configuration to {}", path.display());
    Ok(())
}

async fn show(args: ShowArgs) -> anyhow::Result<()> {
    let config = Config::load()?;

    let provider = match args.provider.as_deref() {
        Some(name) => ProviderId::try_from(name)?,
        None => config.default_provider_id()?,
    };

    let mut options = config.client_options(provider);
    if let Some(key) = args.access_key {
        options.access_key = Some(key);
    }
    if let Some(days) = args.days {
        options.forecast_days = days;
    }
    if let Some(units) = args.units.as_deref() {
        options.units = Units::try_from(units)?;
    }
    if let Some(language) = args.language {
        options.language = Some(language);
    }

    let date = args.date.as_deref().map(parse_date).transpose()?;
    let view = match (date, args.week) {
        (start, true) => View::Week(start.unwrap_or_else(|| Local::now().date_naive())),
        (Some(day), false) => View::Day(day),
        (None, false) => View::All,
    };

    let query = match args.address {
        Some(address) => LocationQuery::city(address),
        None => LocationQuery::default_location(),
    };

    let units = options.units;
    let client = WeatherClient::new(options)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    tracing::debug!(%query, provider = %client.provider(), "fetching weather");
    let outcome = if args.fallback {
        client.fetch_weather_or_fallback(&query, &cancel).await
    } else {
        client.fetch_weather_with_cancel(&query, &cancel).await
    };

    match outcome {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", output::render(&result, view, units));
            }
            Ok(())
        }
        Err(err) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&err)?);
            }
            Err(anyhow::Error::new(err).context(format!("Could not fetch weather for {query}")))
        }
    }
}

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{value}', expected YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_dates() {
        assert_eq!(parse_date("2024-01-31").unwrap(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert!(parse_date("31/01/2024").is_err());
    }

    #[test]
    fn show_parses_flags() {
        let cli = Cli::try_parse_from([
            "tempo", "show", "Lisboa", "--week", "--days", "10", "--provider", "weatherstack",
        ])
        .unwrap();

        let Command::Show(args) = cli.command else {
            panic!("expected show command");
        };
        assert_eq!(args.address.as_deref(), Some("Lisboa"));
        assert!(args.week);
        assert_eq!(args.days, Some(10));
        assert_eq!(args.provider.as_deref(), Some("weatherstack"));
    }
}
