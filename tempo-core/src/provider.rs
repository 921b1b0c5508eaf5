use crate::{
    ClientOptions,
    error::ClientError,
    provider::{open_meteo::OpenMeteoProvider, weatherstack::WeatherstackProvider},
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub mod open_meteo;
pub mod weatherstack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    OpenMeteo,
    Weatherstack,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::Weatherstack => "weatherstack",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::Weatherstack]
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::Weatherstack)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "open-meteo" | "openmeteo" | "open_meteo" => Ok(ProviderId::OpenMeteo),
            "weatherstack" => Ok(ProviderId::Weatherstack),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: open-meteo, weatherstack."
            )),
        }
    }
}

/// A configured weather vendor. Each variant owns its request building,
/// error-payload detection and normalization.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenMeteo(OpenMeteoProvider),
    Weatherstack(WeatherstackProvider),
}

impl Provider {
    /// Construct the provider named in `options`, using its access key.
    pub fn from_options(options: &ClientOptions) -> Result<Self, ClientError> {
        match options.provider {
            ProviderId::OpenMeteo => Ok(Provider::OpenMeteo(OpenMeteoProvider::default())),
            ProviderId::Weatherstack => {
                let key = options
                    .access_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| {
                        ClientError::configuration(
                            "No access key configured for provider 'weatherstack'.\n\
                             Hint: run `tempo configure weatherstack` or set WEATHERSTACK_ACCESS_KEY.",
                        )
                    })?;
                Ok(Provider::Weatherstack(WeatherstackProvider::new(key.to_owned())))
            }
        }
    }

    pub fn id(&self) -> ProviderId {
        match self {
            Provider::OpenMeteo(_) => ProviderId::OpenMeteo,
            Provider::Weatherstack(_) => ProviderId::Weatherstack,
        }
    }
}

/// Embedded-error detector for a provider's JSON payloads.
pub(crate) type ErrorDetector = fn(&Value, StatusCode) -> Option<ClientError>;

/// Turn one HTTP exchange into a JSON payload or a classified failure.
pub(crate) fn classify_response(
    provider: ProviderId,
    status: StatusCode,
    body: &str,
    detect: ErrorDetector,
) -> Result<Value, ClientError> {
    let parsed = serde_json::from_str::<Value>(body);

    if status == StatusCode::TOO_MANY_REQUESTS {
        let payload = parsed.unwrap_or_else(|_| Value::String(truncate_body(body)));
        return Err(ClientError::rate_limited(format!(
            "{provider} rate limit reached (HTTP {status})"
        ))
        .with_details(json!({ "status": status.as_u16(), "response": payload })));
    }

    if !status.is_success() {
        let payload = parsed.unwrap_or_else(|_| Value::String(truncate_body(body)));
        return Err(detect(&payload, status).unwrap_or_else(|| {
            ClientError::vendor(format!("{provider} request failed with status {status}"))
                .with_details(json!({ "status": status.as_u16(), "response": payload }))
        }));
    }

    let value = parsed.map_err(|e| {
        ClientError::malformed(format!("Failed to parse {provider} JSON: {e}"))
            .with_details(json!({ "status": status.as_u16(), "response": truncate_body(body) }))
    })?;

    match detect(&value, status) {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

/// Deserialize a vendor payload into its typed response. Anything that does
/// not fit the documented shape is a malformed response.
pub(crate) fn parse_payload<'a, T: Deserialize<'a>>(
    provider: ProviderId,
    body: &'a Value,
) -> Result<T, ClientError> {
    if !body.is_object() {
        return Err(ClientError::malformed(format!("{provider} response is not a JSON object"))
            .with_details(body.clone()));
    }

    T::deserialize(body).map_err(|e| {
        ClientError::malformed(format!("Unexpected {provider} response shape: {e}"))
            .with_details(body.clone())
    })
}

pub(crate) fn percent(value: Option<f64>) -> Option<u8> {
    value.map(|v| v.round().clamp(0.0, 100.0) as u8)
}

/// Vendors send `""` for fields they have no value for.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// First non-empty entry of a list such as `weather_descriptions`.
pub(crate) fn first_non_empty(values: &[String]) -> Option<String> {
    values.iter().find(|s| !s.trim().is_empty()).cloned()
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
