//! Client country detection
//!
//! Country aliases are static configuration. IP lookups go through a TTL
//! cache and then two external geolocation services, tried in order.

pub mod aliases;
pub mod cache;
pub mod detector;
pub mod providers;

pub use aliases::CountryAliases;
pub use cache::GeoCache;
pub use detector::CountryDetector;
pub use providers::{GeoJsProvider, GeoProvider, IpApiProvider, ProviderError};
