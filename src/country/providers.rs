use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response is missing the '{0}' field")]
    MissingField(&'static str),
}

/// An external service resolving an IP address to a country.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Host name used in logs
    fn name(&self) -> &str;

    /// Country code (or name) reported for `ip`, as returned by the service.
    async fn country_for(&self, ip: &str) -> Result<String, ProviderError>;
}

/// Build the HTTP client shared by the geolocation providers.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("linkify/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, ProviderError> {
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<T>()
        .await?;
    Ok(body)
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, ProviderError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ProviderError::MissingField(field))
}

/// geojs.io: `GET /v1/ip/country/{ip}.json` -> `{ "country": "..." }`
pub struct GeoJsProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GeoJsResponse {
    country: Option<String>,
}

impl GeoJsProvider {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoProvider for GeoJsProvider {
    fn name(&self) -> &str {
        "geojs.io"
    }

    async fn country_for(&self, ip: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/ip/country/{ip}.json", self.base_url);
        let body: GeoJsResponse = fetch_json(&self.client, &url).await?;
        non_empty(body.country, "country")
    }
}

/// ip-api.com: `GET /json/{ip}` -> `{ "countryCode": "..." }`
pub struct IpApiProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    country_code: Option<String>,
}

impl IpApiProvider {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoProvider for IpApiProvider {
    fn name(&self) -> &str {
        "ip-api.com"
    }

    async fn country_for(&self, ip: &str) -> Result<String, ProviderError> {
        let url = format!("{}/json/{ip}", self.base_url);
        let body: IpApiResponse = fetch_json(&self.client, &url).await?;
        non_empty(body.country_code, "countryCode")
    }
}
