use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, warn};

use super::cache::GeoCache;
use super::providers::{http_client, GeoJsProvider, GeoProvider, IpApiProvider};
use crate::config::CountryConfig;

/// Resolves client IP addresses to lowercase country codes.
///
/// Lookups go to the cache first, then to each provider in order. A provider
/// failure is logged and the next one is tried; there are no retries.
pub struct CountryDetector {
    cache: GeoCache,
    providers: Vec<Box<dyn GeoProvider>>,
}

impl CountryDetector {
    pub fn new(cache: GeoCache, providers: Vec<Box<dyn GeoProvider>>) -> Self {
        Self { cache, providers }
    }

    /// geojs.io first, ip-api.com as fallback.
    pub fn from_config(config: &CountryConfig) -> Result<Self> {
        let client = http_client(Duration::from_secs(config.provider_timeout_secs))
            .context("failed to build HTTP client for geolocation providers")?;

        let providers: Vec<Box<dyn GeoProvider>> = vec![
            Box::new(GeoJsProvider::new(client.clone(), &config.geojs_url)),
            Box::new(IpApiProvider::new(client, &config.ipapi_url)),
        ];
        let cache = GeoCache::new(Duration::from_secs(config.cache_duration_secs));

        Ok(Self::new(cache, providers))
    }

    /// Country code for `ip`, or `None` when no provider could tell.
    pub async fn resolve(&self, ip: &str) -> Option<String> {
        let ip = ip.trim();
        if ip.is_empty() {
            warn!("Missing IP address");
            return None;
        }

        if let Some(country) = self.cache.get(ip).await {
            debug!(ip, country = %country, "Country from cache");
            return Some(country);
        }

        for provider in &self.providers {
            match provider.country_for(ip).await {
                Ok(country) => {
                    let country = country.to_lowercase();
                    debug!(ip, country = %country, provider = provider.name(), "Country from provider");
                    self.cache.insert(ip, &country).await;
                    return Some(country);
                }
                Err(e) => {
                    error!(ip, provider = provider.name(), error = %e, "Geolocation lookup failed");
                }
            }
        }

        None
    }
}
