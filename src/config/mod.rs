use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolver::QueryEncoding;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing \"{0}\" on settings")]
    Missing(&'static str),
    #[error("invalid \"{key}\" on settings: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub country: CountryConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL, used for the logo links on the not-found page
    pub url: String,
    /// Path segment guarding the link listing API
    pub api_key: String,
    /// Bearer token required by the link listing API
    pub api_token: String,
    /// Where `/` redirects to, `/404` when unset
    pub home_url: Option<String>,
    /// Directory holding templates, images and other static files
    pub assets_dir: PathBuf,
    /// Default `{{from}}` value on the redirect notice page
    pub notice_from: String,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            url: String::new(),
            api_key: String::new(),
            api_token: String::new(),
            home_url: None,
            assets_dir: PathBuf::from("assets"),
            notice_from: "Linkify".to_string(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEncoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Directory with one `<source>.json` file per link source
    pub path: PathBuf,
    pub auto_reload: bool,
    pub auto_plural: bool,
    /// Canonical link id -> aliases
    pub aliases: HashMap<String, Vec<String>>,
    pub encoding: FileEncoding,
    /// Keys tried, in order, when a link has no URL for the requested country.
    /// The first one is also where single-URL definitions are stored.
    pub wildcard_keys: Vec<String>,
    /// How often watched link files are checked for changes
    pub reload_interval_ms: u64,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("links"),
            auto_reload: false,
            auto_plural: false,
            aliases: HashMap::new(),
            encoding: FileEncoding::Utf8,
            wildcard_keys: vec!["any".to_string(), "default".to_string()],
            reload_interval_ms: 1000,
        }
    }
}

impl LinksConfig {
    /// Key used for links defined as a single URL string.
    pub fn wildcard(&self) -> &str {
        self.wildcard_keys
            .first()
            .map(String::as_str)
            .unwrap_or("any")
    }
}

/// A single alias or a list of aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasList {
    One(String),
    Many(Vec<String>),
}

impl AliasList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: &[String] = match self {
            AliasList::One(alias) => std::slice::from_ref(alias),
            AliasList::Many(aliases) => aliases,
        };
        items.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryConfig {
    /// Country used when the client country can't be detected
    pub default: String,
    pub cache_duration_secs: u64,
    /// Country code -> aliases
    pub aliases: HashMap<String, AliasList>,
    pub provider_timeout_secs: u64,
    pub geojs_url: String,
    pub ipapi_url: String,
    /// Client addresses in these networks always get the default country
    pub local_networks: Vec<IpNet>,
}

impl Default for CountryConfig {
    fn default() -> Self {
        Self {
            default: String::new(),
            cache_duration_secs: 3600,
            aliases: HashMap::new(),
            provider_timeout_secs: 5,
            geojs_url: "https://get.geojs.io".to_string(),
            ipapi_url: "http://ip-api.com".to_string(),
            local_networks: ["127.0.0.0/8", "::1/128"]
                .iter()
                .filter_map(|net| net.parse().ok())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Source -> how search terms are encoded into its `{{query}}` placeholder
    pub encodings: HashMap<String, QueryEncoding>,
}

impl Config {
    /// Load settings from an optional file plus `LINKIFY_*` environment variables.
    ///
    /// Without an explicit path, `settings.{toml,json,yaml}` in the working
    /// directory is used when present. Nested keys are separated by a double
    /// underscore, e.g. `LINKIFY_SERVER__PORT=9000`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name("settings").required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix("LINKIFY")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("links.wildcard_keys")
                    .with_list_parse_key("country.local_networks")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings the service can't run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.url.trim().is_empty() {
            return Err(ConfigError::Missing("server.url"));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                key: "server.port",
                reason: "must be a valid port number".to_string(),
            });
        }
        if self.server.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("server.api_key"));
        }
        if self.server.api_key.contains('/') {
            return Err(ConfigError::Invalid {
                key: "server.api_key",
                reason: "must be a single path segment".to_string(),
            });
        }
        if self.server.api_token.trim().is_empty() {
            return Err(ConfigError::Missing("server.api_token"));
        }
        if self.country.default.trim().is_empty() {
            return Err(ConfigError::Missing("country.default"));
        }
        if self.links.wildcard_keys.is_empty() {
            return Err(ConfigError::Invalid {
                key: "links.wildcard_keys",
                reason: "at least one wildcard key is required".to_string(),
            });
        }
        if self.links.reload_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "links.reload_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
