use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header::HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use super::client::{client_country, client_ip};
use super::static_files::{has_logo, read_text_asset};
use super::templates::{escape_html, replace_tags};
use super::AppState;
use crate::models::TargetUrl;

const NOT_FOUND_PATH: &str = "/404";

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LinkQuery {
    /// Comma separated list of sources to pick the link from
    pub sources: Option<String>,
    /// `1` shows a redirect notice page instead of redirecting straight away
    pub rn: Option<String>,
    /// Who is sending the visitor, shown on the redirect notice
    pub from: Option<String>,
}

/// Homepage, redirects to the configured home URL
pub async fn index(State(state): State<Arc<AppState>>) -> Redirect {
    let target = state
        .config
        .server
        .home_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .unwrap_or(NOT_FOUND_PATH);
    Redirect::temporary(target)
}

/// Not found page, listing every link that has a logo
pub async fn not_found(State(state): State<Arc<AppState>>) -> Response {
    let assets_dir = &state.config.server.assets_dir;
    let base_url = state.config.server.url.trim_end_matches('/');
    let template = read_text_asset(assets_dir, "404.html")
        .await
        .unwrap_or_default();

    let mut anchors = Vec::new();
    for key in state.index.keys() {
        if has_logo(assets_dir, &key).await {
            let key = escape_html(&key);
            anchors.push(format!(
                r#"<a href="{base_url}/l/{key}"><img src="/images/{key}.png" /></a>"#
            ));
        }
    }

    let logos = anchors.join(" ");
    let page = replace_tags(&template, &[("logos", logos.as_str())]);
    (StatusCode::NOT_FOUND, Html(page)).into_response()
}

/// Redirect to the target of a link id
pub async fn link_redirect(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LinkQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    redirect_to_target(&state, &id, false, &query, &headers, addr).await
}

/// Redirect to the search page of a source for the given terms
pub async fn search_redirect(
    State(state): State<Arc<AppState>>,
    Path(search): Path<String>,
    Query(query): Query<LinkQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    redirect_to_target(&state, &search, true, &query, &headers, addr).await
}

async fn redirect_to_target(
    state: &AppState,
    id: &str,
    is_search: bool,
    query: &LinkQuery,
    headers: &HeaderMap,
    addr: SocketAddr,
) -> Response {
    let ip = client_ip(headers, addr);
    let country_config = &state.config.country;
    let detected = client_country(
        headers,
        &ip,
        &country_config.local_networks,
        &country_config.default,
        &state.detector,
    )
    .await;

    let (country, country_log) = match detected {
        Some(country) => (country.clone(), country),
        None => {
            let default = country_config.default.to_lowercase();
            (default.clone(), format!("default {default}"))
        }
    };

    let sources = query.sources.as_deref().map(parse_sources);
    let target = match state
        .resolver
        .url_for(id, &country, sources.as_deref(), is_search)
    {
        Ok(target) => target,
        Err(e) => {
            debug!(id, error = %e, "404");
            return Redirect::temporary(NOT_FOUND_PATH).into_response();
        }
    };

    if query.rn.as_deref() != Some("1") {
        info!(id, ip = %ip, country = %country_log, source = %target.source, url = %target.url, "Redirect");
        return Redirect::temporary(&target.url).into_response();
    }

    info!(id, ip = %ip, country = %country_log, source = %target.source, url = %target.url, "Redirection notice");
    Html(redirect_notice(state, query, &target).await).into_response()
}

async fn redirect_notice(state: &AppState, query: &LinkQuery, target: &TargetUrl) -> String {
    let assets_dir = &state.config.server.assets_dir;
    let template = read_text_asset(assets_dir, "redir.html")
        .await
        .unwrap_or_default();

    let from = query
        .from
        .as_deref()
        .filter(|from| !from.is_empty())
        .unwrap_or(state.config.server.notice_from.as_str());
    let logo = if has_logo(assets_dir, &target.source).await {
        target.source.as_str()
    } else {
        "nologo"
    };

    let from = escape_html(from);
    let source = escape_html(&target.source);
    let url = escape_html(&target.url);
    let logo = escape_html(logo);

    replace_tags(
        &template,
        &[
            ("from", from.as_str()),
            ("target", source.as_str()),
            ("url", url.as_str()),
            ("logo", logo.as_str()),
        ],
    )
}

/// Split the `sources` query value into lowercase source names.
pub fn parse_sources(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|source| source.trim().to_lowercase())
        .filter(|source| !source.is_empty())
        .collect()
}

/// Full list of loaded links, requires the API token
pub async fn list_links(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !is_authorized(&headers, &state.config.server.api_token) {
        warn!("Link list access denied");
        return (
            StatusCode::UNAUTHORIZED,
            Json(MessageResponse {
                message: "Access denied".to_string(),
            }),
        )
            .into_response();
    }

    Json(state.index.snapshot()).into_response()
}

fn is_authorized(headers: &HeaderMap, api_token: &str) -> bool {
    let token = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .map(|(_, token)| token.trim());

    match token {
        Some(token) if !api_token.is_empty() => {
            token.as_bytes().ct_eq(api_token.as_bytes()).into()
        }
        _ => false,
    }
}
