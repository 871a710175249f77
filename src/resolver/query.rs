use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder replaced with the encoded search terms in search link URLs.
pub const QUERY_PLACEHOLDER: &str = "{{query}}";

/// How search terms are written into a source's search URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryEncoding {
    /// `red shoes` -> `red%20shoes`
    #[default]
    Percent,
    /// Keep ASCII letters, digits and spaces, then join words with hyphens:
    /// `red shoes!` -> `red-shoes`
    Slug,
    /// Percent-encoded twice: `red shoes` -> `red%2520shoes`
    DoublePercent,
}

impl QueryEncoding {
    pub fn encode(self, terms: &str) -> String {
        match self {
            QueryEncoding::Percent => urlencoding::encode(terms).into_owned(),
            QueryEncoding::Slug => terms
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
                .map(|c| if c == ' ' { '-' } else { c })
                .collect(),
            QueryEncoding::DoublePercent => {
                urlencoding::encode(&urlencoding::encode(terms)).into_owned()
            }
        }
    }
}

/// Per-source query encodings, falling back to [`QueryEncoding::Percent`].
#[derive(Debug, Clone)]
pub struct QueryEncoder {
    per_source: HashMap<String, QueryEncoding>,
}

impl Default for QueryEncoder {
    fn default() -> Self {
        Self {
            per_source: HashMap::from([
                ("aliexpress".to_string(), QueryEncoding::Slug),
                ("decathlon".to_string(), QueryEncoding::DoublePercent),
                ("ribble".to_string(), QueryEncoding::DoublePercent),
            ]),
        }
    }
}

impl QueryEncoder {
    /// Built-in encodings with `overrides` applied on top.
    pub fn with_overrides(overrides: &HashMap<String, QueryEncoding>) -> Self {
        let mut encoder = Self::default();
        for (source, encoding) in overrides {
            encoder.per_source.insert(source.to_lowercase(), *encoding);
        }
        encoder
    }

    pub fn encoding_for(&self, source: &str) -> QueryEncoding {
        self.per_source.get(source).copied().unwrap_or_default()
    }

    pub fn encode(&self, terms: &str, source: &str) -> String {
        self.encoding_for(source).encode(terms)
    }

    /// Replace every query placeholder in `url` with the encoded terms.
    pub fn apply(&self, url: &str, terms: &str, source: &str) -> String {
        if !url.contains(QUERY_PLACEHOLDER) {
            return url.to_string();
        }
        url.replace(QUERY_PLACEHOLDER, &self.encode(terms, source))
    }
}
