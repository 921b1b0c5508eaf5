//! Core library for the `tempo` weather client.
//!
//! This crate defines:
//! - A provider-independent weather schema ([`NormalizedWeatherResult`])
//! - Providers (Open-Meteo, Weatherstack) that normalize into it
//! - A retrying client returning either a result or a [`ClientError`]
//! - Configuration & credentials handling
//!
//! It is used by `tempo-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod geocode;
pub mod model;
pub mod provider;
pub mod retry;
pub mod wmo;

pub use client::{WeatherClient, fetch_weather};
pub use config::{ClientOptions, ClientSettings, Config, ProviderConfig};
pub use error::{ClientError, ErrorKind};
pub use model::{
    CurrentConditions, DailyForecastEntry, DataSource, Location, LocationQuery,
    NormalizedWeatherResult, Units,
};
pub use provider::{Provider, ProviderId};
pub use retry::{RetryBudget, RetryPolicy, Sleeper, TokioSleeper};
pub use tokio_util::sync::CancellationToken;
