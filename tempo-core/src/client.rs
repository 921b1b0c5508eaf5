use std::{sync::Arc, time::Duration};

use chrono::Utc;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    ClientOptions, fallback,
    error::{ClientError, ErrorKind},
    geocode::{self, Place},
    model::{LocationQuery, NormalizedWeatherResult},
    provider::{ErrorDetector, Provider, ProviderId, classify_response, open_meteo, weatherstack},
    retry::{self, RetryBudget, Sleeper, TokioSleeper},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("tempo/", env!("CARGO_PKG_VERSION"));

/// Fetches weather from one provider and returns it in normalized form.
///
/// Cloning is cheap; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    provider: Provider,
    options: ClientOptions,
    sleeper: Arc<dyn Sleeper>,
}

impl WeatherClient {
    /// Build a client for the provider named in `options`.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let provider = Provider::from_options(&options)?;
        Self::with_provider(options, provider)
    }

    /// Build a client around an already constructed provider (e.g. one
    /// pointing at a different base URL). `options.provider` is overwritten.
    pub fn with_provider(mut options: ClientOptions, provider: Provider) -> Result<Self, ClientError> {
        options.validate()?;
        options.provider = provider.id();

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ClientError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { http, provider, options, sleeper: Arc::new(TokioSleeper) })
    }

    /// Replace how backoff delays are waited out.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn provider(&self) -> ProviderId {
        self.provider.id()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub async fn fetch_weather(
        &self,
        query: &LocationQuery,
    ) -> Result<NormalizedWeatherResult, ClientError> {
        self.fetch_weather_with_cancel(query, &CancellationToken::new()).await
    }

    /// Like [`fetch_weather`](Self::fetch_weather), aborting the in-flight
    /// request or pending backoff once `cancel` fires.
    ///
    /// Every request of the call (geocoding included) draws on one
    /// [`RetryBudget`].
    #[tracing::instrument(skip(self, cancel), fields(provider = %self.provider.id()))]
    pub async fn fetch_weather_with_cancel(
        &self,
        query: &LocationQuery,
        cancel: &CancellationToken,
    ) -> Result<NormalizedWeatherResult, ClientError> {
        let mut budget = RetryBudget::new(self.options.retry_policy());

        let result = match &self.provider {
            Provider::OpenMeteo(provider) => {
                let place = match Place::from_query(query) {
                    Some(place) => place,
                    None => {
                        let city = query.to_string();
                        let url = provider.geocoding_url(&city, &self.options)?;
                        let body = self
                            .get_json(url, open_meteo::embedded_error, &mut budget, cancel)
                            .await?;
                        geocode::place_from_response(&city, &body)?
                    }
                };

                let url = provider.forecast_url(&place, &self.options)?;
                let body = self
                    .get_json(url, open_meteo::embedded_error, &mut budget, cancel)
                    .await?;
                provider.normalize(&place, &body, &self.options)
            }
            Provider::Weatherstack(provider) => {
                let url = provider.request_url(query, &self.options)?;
                let body = self
                    .get_json(url, weatherstack::embedded_error, &mut budget, cancel)
                    .await?;
                provider.normalize(query, &body, &self.options)
            }
        };

        if let Ok(result) = &result {
            tracing::debug!(days = result.forecast.len(), "weather normalized");
        }
        result
    }

    /// Live weather, or a synthetic placeholder when the provider failed.
    ///
    /// Cancellation and configuration errors are still returned: there is no
    /// provider failure to stand in for.
    pub async fn fetch_weather_or_fallback(
        &self,
        query: &LocationQuery,
        cancel: &CancellationToken,
    ) -> Result<NormalizedWeatherResult, ClientError> {
        match self.fetch_weather_with_cancel(query, cancel).await {
            Ok(result) => Ok(result),
            Err(err) if matches!(err.kind, ErrorKind::Cancelled | ErrorKind::Configuration) => {
                Err(err)
            }
            Err(err) => {
                tracing::warn!(kind = %err.kind, "using synthetic weather: {err}");
                Ok(fallback::synthetic_result(
                    query,
                    self.provider.id(),
                    Utc::now().date_naive(),
                    self.options.forecast_days,
                    format!("{}: {err}", err.kind),
                ))
            }
        }
    }

    async fn get_json(
        &self,
        url: Url,
        detect: ErrorDetector,
        budget: &mut RetryBudget,
        cancel: &CancellationToken,
    ) -> Result<Value, ClientError> {
        retry::run(budget, self.sleeper.as_ref(), cancel, |attempt| {
            let url = url.clone();
            async move { self.send_once(url, detect, attempt).await }
        })
        .await
    }

    async fn send_once(
        &self,
        url: Url,
        detect: ErrorDetector,
        attempt: u64,
    ) -> Result<Value, ClientError> {
        let provider = self.provider.id();
        tracing::debug!(attempt, endpoint = url.path(), "sending request");

        // reqwest errors embed the URL, which may carry the access key.
        let response = self.http.get(url).send().await.map_err(|e| {
            ClientError::network(format!(
                "Failed to send request to {provider}: {}",
                e.without_url()
            ))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ClientError::network(format!(
                "Failed to read {provider} response body: {}",
                e.without_url()
            ))
        })?;

        classify_response(provider, status, &body, detect)
    }
}

/// One-shot fetch: build a client from `options` and query `location`.
pub async fn fetch_weather(
    location: &LocationQuery,
    options: &ClientOptions,
) -> Result<NormalizedWeatherResult, ClientError> {
    WeatherClient::new(options.clone())?.fetch_weather(location).await
}
