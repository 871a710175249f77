pub mod client;
pub mod handlers;
pub mod middleware;
pub mod static_files;
pub mod templates;

use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;

use crate::config::Config;
use crate::country::CountryDetector;
use crate::links::LinkIndex;
use crate::resolver::Resolver;

use handlers::{index, link_redirect, list_links, not_found, search_redirect};
use middleware::log_request;
use static_files::serve_static;

/// Shared state handed to every route.
pub struct AppState {
    pub config: Arc<Config>,
    pub index: Arc<LinkIndex>,
    pub resolver: Arc<Resolver>,
    pub detector: Arc<CountryDetector>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let list_path = format!("/{}/list", state.config.server.api_key);
    let debug = state.config.server.debug;

    let router = Router::new()
        .route("/", get(index))
        .route("/404", get(not_found))
        .route(&list_path, get(list_links))
        .route("/l/{id}", get(link_redirect))
        .route("/s/{search}", get(search_redirect))
        .fallback(serve_static)
        .with_state(state);

    if debug {
        router.layer(axum_middleware::from_fn(log_request))
    } else {
        router
    }
}
