//! Client IP and country extraction
//!
//! The client IP is the first address of `X-Forwarded-For` when present,
//! otherwise the socket peer. The country comes from, in order:
//! - the default country for local/loopback clients
//! - Cloudflare's `CF-IPCountry` header
//! - the geolocation lookup

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

use crate::country::CountryDetector;

/// Extract the client IP address, as a string, from the request.
pub fn client_ip(headers: &HeaderMap, socket_addr: SocketAddr) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match forwarded {
        Some(ip) => {
            debug!(ip, "Client IP from header");
            ip.to_string()
        }
        None => {
            let ip = socket_addr.ip().to_canonical().to_string();
            debug!(ip = %ip, "Client IP from socket");
            ip
        }
    }
}

/// Whether `ip` falls in one of the configured local networks.
pub fn is_local(ip: &str, local_networks: &[IpNet]) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(addr) => {
            let addr = addr.to_canonical();
            local_networks.iter().any(|net| net.contains(&addr))
        }
        Err(_) => false,
    }
}

fn cloudflare_country(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cf-ipcountry")
        .and_then(|h| h.to_str().ok())
        .map(|country| country.trim().to_lowercase())
        .filter(|country| !country.is_empty())
}

/// Country of the client, or `None` when it couldn't be determined.
pub async fn client_country(
    headers: &HeaderMap,
    ip: &str,
    local_networks: &[IpNet],
    default_country: &str,
    detector: &CountryDetector,
) -> Option<String> {
    if ip.is_empty() || is_local(ip, local_networks) {
        return Some(default_country.to_lowercase());
    }

    if let Some(country) = cloudflare_country(headers) {
        debug!(ip, country = %country, "Country from CF header");
        return Some(country);
    }

    let country = detector.resolve(ip).await?;
    debug!(ip, country = %country, "Country from IP");
    Some(country)
}
