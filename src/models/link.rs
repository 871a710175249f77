use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A group of target URLs for one link id, keyed by country code or wildcard key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub source: String,
    pub urls: BTreeMap<String, Vec<String>>,
}

impl Link {
    /// Key this link is stored under in the index.
    ///
    /// A source's own entry (id equal to the source, or `default`) is stored
    /// under the bare source name, everything else under `<source>-<id>`.
    pub fn index_key(&self) -> String {
        if self.id == self.source || self.id == "default" {
            self.source.clone()
        } else {
            format!("{}-{}", self.source, self.id)
        }
    }

    pub fn url_count(&self) -> usize {
        self.urls.values().map(Vec::len).sum()
    }
}

/// The resolved target of a link request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetUrl {
    pub url: String,
    pub source: String,
}

/// A single entry of a link definition file, as written on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LinkDefinition {
    Single(String),
    PerCountry(BTreeMap<String, UrlValue>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UrlValue {
    One(String),
    Many(Vec<String>),
}

impl UrlValue {
    fn into_vec(self) -> Vec<String> {
        match self {
            UrlValue::One(url) => vec![url],
            UrlValue::Many(urls) => urls,
        }
    }
}

impl LinkDefinition {
    /// Normalize into lowercase keys mapped to non-empty URL lists.
    pub fn into_urls(self, wildcard: &str) -> BTreeMap<String, Vec<String>> {
        let mut urls: BTreeMap<String, Vec<String>> = BTreeMap::new();

        match self {
            LinkDefinition::Single(url) => {
                urls.insert(wildcard.to_string(), vec![url]);
            }
            LinkDefinition::PerCountry(targets) => {
                for (country, value) in targets {
                    urls.entry(country.to_lowercase())
                        .or_default()
                        .extend(value.into_vec());
                }
            }
        }

        urls.retain(|_, list| !list.is_empty());
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(id: &str, source: &str) -> Link {
        Link {
            id: id.to_string(),
            source: source.to_string(),
            urls: BTreeMap::new(),
        }
    }

    #[test]
    fn index_key_uses_source_for_default_entries() {
        assert_eq!(link("amazon", "amazon").index_key(), "amazon");
        assert_eq!(link("default", "amazon").index_key(), "amazon");
        assert_eq!(link("shoes", "amazon").index_key(), "amazon-shoes");
    }

    #[test]
    fn single_url_goes_under_wildcard() {
        let definition: LinkDefinition =
            serde_json::from_str(r#""https://example.com/a""#).unwrap();
        let urls = definition.into_urls("any");

        assert_eq!(urls.len(), 1);
        assert_eq!(urls["any"], vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn per_country_values_become_lists() {
        let definition: LinkDefinition = serde_json::from_str(
            r#"{ "US": "https://a.example", "de": ["https://b.example", "https://c.example"], "fr": [] }"#,
        )
        .unwrap();
        let urls = definition.into_urls("any");

        assert_eq!(urls["us"], vec!["https://a.example".to_string()]);
        assert_eq!(urls["de"].len(), 2);
        assert!(!urls.contains_key("fr"));
        assert!(!urls.contains_key("US"));
    }

    #[test]
    fn rejects_unsupported_shapes() {
        assert!(serde_json::from_str::<LinkDefinition>("42").is_err());
        assert!(serde_json::from_str::<LinkDefinition>(r#"{ "us": 1 }"#).is_err());
    }
}
