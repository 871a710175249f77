use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::country::{CountryAliases, CountryDetector};
use crate::links::{LinkAliases, LinkIndex, LinkLoader};
use crate::resolver::{Resolver, ResolverOptions};
use crate::server::AppState;

/// Everything the service needs, built once at startup.
pub struct Services {
    pub config: Arc<Config>,
    pub index: Arc<LinkIndex>,
    pub loader: Arc<LinkLoader>,
    pub resolver: Arc<Resolver>,
    pub detector: Arc<CountryDetector>,
}

impl Services {
    /// Build all components and do the initial link load.
    pub async fn start(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let country_aliases = Arc::new(CountryAliases::new(&config.country.aliases));
        info!("Loaded {} country aliases", country_aliases.len());

        let detector = Arc::new(
            CountryDetector::from_config(&config.country)
                .context("failed to set up country detection")?,
        );

        let index = Arc::new(LinkIndex::new());
        let link_aliases = Arc::new(LinkAliases::new(
            &config.links.aliases,
            config.links.auto_plural,
        ));
        let loader = Arc::new(LinkLoader::new(
            Arc::clone(&index),
            Arc::clone(&link_aliases),
            config.links.clone(),
        ));
        loader.load(false).await;

        let resolver = Arc::new(Resolver::new(
            Arc::clone(&index),
            link_aliases,
            country_aliases,
            ResolverOptions::from_config(&config),
        ));

        Ok(Self {
            config,
            index,
            loader,
            resolver,
            detector,
        })
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            config: Arc::clone(&self.config),
            index: Arc::clone(&self.index),
            resolver: Arc::clone(&self.resolver),
            detector: Arc::clone(&self.detector),
        })
    }
}
