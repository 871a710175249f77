//! Link resolution
//!
//! Turns a link id (or search terms) and a country into one target URL:
//!
//! 1. The id is looked up directly, then through its alias. A direct hit is
//!    the only candidate.
//! 2. Otherwise every source in scope contributes its `<source>-<id>` link
//!    (or `<source>-<alias>`, or their plurals when enabled).
//! 3. Searches with no candidate fall back to each source's `search` link.
//!
//! Each candidate then offers the URLs for the country, its alias, or the
//! wildcard key, and one URL is picked uniformly at random from the pool.

pub mod query;

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

pub use query::{QueryEncoder, QueryEncoding, QUERY_PLACEHOLDER};

use crate::config::Config;
use crate::country::CountryAliases;
use crate::links::{LinkAliases, LinkIndex};
use crate::models::{Link, TargetUrl};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("missing link id")]
    InvalidInput,
    #[error("{kind} not found for '{id}'")]
    NotFound { kind: &'static str, id: String },
}

/// Picks one entry out of a pool of equally valid URLs.
pub trait Selector: Send + Sync {
    /// Index in `0..len`; `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Uniform random choice, spreading traffic across partner links.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl Selector for RandomSelector {
    fn pick(&self, len: usize) -> usize {
        rand::random_range(0..len)
    }
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub auto_plural: bool,
    pub wildcard_keys: Vec<String>,
    pub query: QueryEncoder,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            auto_plural: false,
            wildcard_keys: vec!["any".to_string(), "default".to_string()],
            query: QueryEncoder::default(),
        }
    }
}

impl ResolverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auto_plural: config.links.auto_plural,
            wildcard_keys: config.links.wildcard_keys.clone(),
            query: QueryEncoder::with_overrides(&config.search.encodings),
        }
    }
}

pub struct Resolver {
    index: Arc<LinkIndex>,
    link_aliases: Arc<LinkAliases>,
    country_aliases: Arc<CountryAliases>,
    options: ResolverOptions,
    selector: Box<dyn Selector>,
}

impl Resolver {
    pub fn new(
        index: Arc<LinkIndex>,
        link_aliases: Arc<LinkAliases>,
        country_aliases: Arc<CountryAliases>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            index,
            link_aliases,
            country_aliases,
            options,
            selector: Box::new(RandomSelector),
        }
    }

    pub fn with_selector(mut self, selector: impl Selector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    /// Target URL for `identifier` in `country`.
    ///
    /// `sources` restricts and orders the sources searched for scoped links;
    /// `None` or an empty list means every known source. With `is_search`,
    /// sources' `search` links are used as a last resort and the query
    /// placeholder in the chosen URL is filled with the identifier.
    pub fn url_for(
        &self,
        identifier: &str,
        country: &str,
        sources: Option<&[String]>,
        is_search: bool,
    ) -> Result<TargetUrl, ResolveError> {
        let id = identifier.to_lowercase();
        if id.is_empty() {
            return Err(ResolveError::InvalidInput);
        }
        let country = country.to_lowercase();

        let (sources, sources_log) = match sources {
            Some(list) if !list.is_empty() => {
                let list: Vec<String> = list.iter().map(|source| source.to_lowercase()).collect();
                let log = list.join(", ");
                (list, log)
            }
            _ => (self.index.sources(), "any source".to_string()),
        };

        let candidates = self.candidates(&id, &sources, is_search);
        if candidates.is_empty() {
            warn!(id = %id, sources = %sources_log, "Link not found");
            return Err(ResolveError::NotFound {
                kind: "link",
                id,
            });
        }

        let pool = self.url_pool(&candidates, &id, &country, is_search);
        if pool.is_empty() {
            let kind = if is_search { "search" } else { "link" };
            warn!(id = %id, country = %country, "{} not found for country", capitalize(kind));
            return Err(ResolveError::NotFound { kind, id });
        }

        let target = pool[self.selector.pick(pool.len())].clone();
        info!(id = %id, country = %country, sources = %sources_log, url = %target.url, "Resolved link");
        Ok(target)
    }

    fn candidates(&self, id: &str, sources: &[String], is_search: bool) -> Vec<Arc<Link>> {
        let alias = self.link_aliases.get(id);

        let direct = self
            .index
            .get(id)
            .or_else(|| alias.and_then(|alias| self.index.get(alias)));
        if let Some(link) = direct {
            return vec![link];
        }

        let mut found: Vec<Arc<Link>> = sources
            .iter()
            .filter_map(|source| self.scoped_link(source, id, alias))
            .collect();

        if found.is_empty() && is_search {
            found = sources
                .iter()
                .filter_map(|source| self.index.get(&format!("{source}-search")))
                .collect();
        }

        found
    }

    fn scoped_link(&self, source: &str, id: &str, alias: Option<&str>) -> Option<Arc<Link>> {
        let lookup = |name: &str| self.index.get(&format!("{source}-{name}"));

        lookup(id)
            .or_else(|| alias.and_then(lookup))
            .or_else(|| {
                if !self.options.auto_plural {
                    return None;
                }
                lookup(&format!("{id}s")).or_else(|| alias.and_then(|a| lookup(&format!("{a}s"))))
            })
    }

    /// URLs each candidate offers for `country`, flattened without deduplication.
    fn url_pool(&self, candidates: &[Arc<Link>], id: &str, country: &str, is_search: bool) -> Vec<TargetUrl> {
        let country_alias = self.country_aliases.get(country);
        let mut pool = Vec::new();

        for link in candidates {
            let Some(urls) = self.urls_for_country(link, country, country_alias) else {
                continue;
            };

            pool.extend(urls.iter().map(|url| TargetUrl {
                url: if is_search {
                    self.options.query.apply(url, id, &link.source)
                } else {
                    url.clone()
                },
                source: link.source.clone(),
            }));
        }

        pool
    }

    fn urls_for_country<'a>(
        &self,
        link: &'a Link,
        country: &str,
        country_alias: Option<&str>,
    ) -> Option<&'a [String]> {
        link.urls
            .get(country)
            .or_else(|| country_alias.and_then(|alias| link.urls.get(alias)))
            .or_else(|| {
                self.options
                    .wildcard_keys
                    .iter()
                    .find_map(|key| link.urls.get(key))
            })
            .map(Vec::as_slice)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AliasList;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn link(id: &str, source: &str, urls: &[(&str, &[&str])]) -> Link {
        Link {
            id: id.to_string(),
            source: source.to_string(),
            urls: urls
                .iter()
                .map(|(country, list)| {
                    (
                        country.to_string(),
                        list.iter().map(|u| u.to_string()).collect(),
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    struct Fixture {
        index: Arc<LinkIndex>,
        link_aliases: HashMap<String, Vec<String>>,
        country_aliases: HashMap<String, AliasList>,
        options: ResolverOptions,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                index: Arc::new(LinkIndex::new()),
                link_aliases: HashMap::new(),
                country_aliases: HashMap::new(),
                options: ResolverOptions::default(),
            }
        }

        fn add(&self, link: Link) {
            self.index.register_source(&link.source);
            self.index.insert(link);
        }

        fn resolver(&self) -> Resolver {
            Resolver::new(
                Arc::clone(&self.index),
                Arc::new(LinkAliases::new(&self.link_aliases, self.options.auto_plural)),
                Arc::new(CountryAliases::new(&self.country_aliases)),
                self.options.clone(),
            )
        }
    }

    /// Always picks the entry at a fixed position.
    struct FixedSelector(usize);

    impl Selector for FixedSelector {
        fn pick(&self, len: usize) -> usize {
            self.0.min(len - 1)
        }
    }

    /// Records the pool size it was asked to pick from.
    struct RecordingSelector(Arc<AtomicUsize>);

    impl Selector for RecordingSelector {
        fn pick(&self, len: usize) -> usize {
            self.0.store(len, Ordering::SeqCst);
            0
        }
    }

    #[test]
    fn empty_identifier_is_invalid() {
        let fixture = Fixture::new();
        let resolver = fixture.resolver();

        assert_eq!(resolver.url_for("", "us", None, false), Err(ResolveError::InvalidInput));
    }

    #[test]
    fn identifier_is_lowercased_but_not_trimmed() {
        let fixture = Fixture::new();
        fixture.add(link("shoes", "amazon", &[("any", &["AMAZON"])]));
        let resolver = fixture.resolver();

        assert_eq!(resolver.url_for("SHOES", "us", None, false).unwrap().url, "AMAZON");
        assert!(matches!(
            resolver.url_for(" shoes ", "us", None, false),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn country_specific_url_beats_wildcard() {
        let fixture = Fixture::new();
        fixture.add(link("shop", "shop", &[("us", &["A"]), ("any", &["B"])]));
        let resolver = fixture.resolver();

        for _ in 0..50 {
            assert_eq!(resolver.url_for("shop", "us", None, false).unwrap().url, "A");
            assert_eq!(resolver.url_for("shop", "de", None, false).unwrap().url, "B");
        }
    }

    #[test]
    fn identifier_and_country_are_case_insensitive() {
        let fixture = Fixture::new();
        fixture.add(link("shop", "shop", &[("us", &["A"]), ("any", &["B"])]));
        let resolver = fixture.resolver();

        assert_eq!(resolver.url_for("SHOP", "US", None, false).unwrap().url, "A");
    }

    #[test]
    fn country_alias_is_tried_before_wildcard() {
        let mut fixture = Fixture::new();
        fixture.country_aliases = HashMap::from([(
            "gb".to_string(),
            AliasList::Many(vec!["uk".to_string()]),
        )]);
        fixture.add(link("shop", "shop", &[("gb", &["GB"]), ("any", &["ANY"])]));
        let resolver = fixture.resolver();

        assert_eq!(resolver.url_for("shop", "uk", None, false).unwrap().url, "GB");
    }

    #[test]
    fn default_wildcard_key_is_a_fallback() {
        let fixture = Fixture::new();
        fixture.add(link("shop", "shop", &[("default", &["D"])]));
        let resolver = fixture.resolver();

        assert_eq!(resolver.url_for("shop", "jp", None, false).unwrap().url, "D");
    }

    #[test]
    fn no_url_for_country_is_not_found() {
        let fixture = Fixture::new();
        fixture.add(link("shop", "shop", &[("us", &["A"])]));
        let resolver = fixture.resolver();

        assert_eq!(
            resolver.url_for("shop", "de", None, false),
            Err(ResolveError::NotFound {
                kind: "link",
                id: "shop".to_string()
            })
        );
    }

    #[test]
    fn direct_link_takes_precedence_over_scoped_links() {
        let fixture = Fixture::new();
        fixture.add(link("shoes", "shoes", &[("any", &["GLOBAL"])]));
        fixture.add(link("shoes", "amazon", &[("any", &["AMAZON"])]));
        let resolver = fixture.resolver();

        for _ in 0..50 {
            let target = resolver.url_for("shoes", "us", None, false).unwrap();
            assert_eq!(target.url, "GLOBAL");
            assert_eq!(target.source, "shoes");
        }
    }

    #[test]
    fn scoped_links_accumulate_across_sources() {
        let fixture = Fixture::new();
        fixture.add(link("shoes", "amazon", &[("any", &["AMAZON"])]));
        fixture.add(link("shoes", "zalando", &[("any", &["ZALANDO"])]));
        let seen = Arc::new(AtomicUsize::new(0));
        let resolver = fixture
            .resolver()
            .with_selector(RecordingSelector(Arc::clone(&seen)));

        resolver.url_for("shoes", "us", None, false).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sources_restrict_and_order_candidates() {
        let fixture = Fixture::new();
        fixture.add(link("shoes", "amazon", &[("any", &["AMAZON"])]));
        fixture.add(link("shoes", "zalando", &[("any", &["ZALANDO"])]));
        let resolver = fixture.resolver().with_selector(FixedSelector(0));

        let only = vec!["zalando".to_string()];
        let target = resolver.url_for("shoes", "us", Some(&only), false).unwrap();
        assert_eq!(target.url, "ZALANDO");
        assert_eq!(target.source, "zalando");

        let ordered = vec!["zalando".to_string(), "amazon".to_string()];
        let target = resolver.url_for("shoes", "us", Some(&ordered), false).unwrap();
        assert_eq!(target.source, "zalando");

        let empty: Vec<String> = Vec::new();
        let target = resolver.url_for("shoes", "us", Some(&empty), false).unwrap();
        assert_eq!(target.source, "amazon");
    }

    #[test]
    fn source_names_are_matched_case_insensitively() {
        let fixture = Fixture::new();
        fixture.add(link("shoes", "amazon", &[("any", &["AMAZON"])]));
        fixture.add(link("shoes", "zalando", &[("any", &["ZALANDO"])]));
        let resolver = fixture.resolver();

        let mixed_case = vec!["Zalando".to_string()];
        let target = resolver.url_for("shoes", "us", Some(&mixed_case), false).unwrap();
        assert_eq!(target.source, "zalando");
    }

    #[test]
    fn search_terms_keep_surrounding_spaces() {
        let fixture = Fixture::new();
        fixture.add(link(
            "search",
            "amazon",
            &[("any", &["https://amazon.example/s?k={{query}}"])],
        ));
        let resolver = fixture.resolver();

        let target = resolver.url_for(" red ", "us", None, true).unwrap();
        assert_eq!(target.url, "https://amazon.example/s?k=%20red%20");
    }

    #[test]
    fn alias_resolves_like_canonical_id() {
        let mut fixture = Fixture::new();
        fixture.link_aliases = HashMap::from([(
            "shoes".to_string(),
            vec!["sneaker".to_string()],
        )]);
        fixture.add(link("shoes", "shoes", &[("any", &["GLOBAL"])]));
        fixture.add(link("boots", "amazon", &[("any", &["BOOTS"])]));
        let resolver = fixture.resolver();

        assert_eq!(
            resolver.url_for("sneaker", "us", None, false),
            resolver.url_for("shoes", "us", None, false)
        );
    }

    #[test]
    fn scoped_alias_lookup() {
        let mut fixture = Fixture::new();
        fixture.link_aliases = HashMap::from([(
            "shoes".to_string(),
            vec!["sneaker".to_string()],
        )]);
        fixture.add(link("shoes", "amazon", &[("any", &["AMAZON"])]));
        let resolver = fixture.resolver();

        let target = resolver.url_for("sneaker", "us", None, false).unwrap();
        assert_eq!(target.url, "AMAZON");
    }

    #[test]
    fn direct_id_is_preferred_over_alias() {
        let mut fixture = Fixture::new();
        fixture.link_aliases = HashMap::from([(
            "shoes".to_string(),
            vec!["boots".to_string()],
        )]);
        fixture.add(link("shoes", "shoes", &[("any", &["SHOES"])]));
        fixture.add(link("boots", "boots", &[("any", &["BOOTS"])]));
        let resolver = fixture.resolver();

        assert_eq!(resolver.url_for("boots", "us", None, false).unwrap().url, "BOOTS");
    }

    #[test]
    fn plural_fallback_only_when_enabled() {
        let mut fixture = Fixture::new();
        fixture.add(link("shoes", "amazon", &[("any", &["AMAZON"])]));

        let resolver = fixture.resolver();
        assert!(resolver.url_for("shoe", "us", None, false).is_err());

        fixture.options.auto_plural = true;
        let resolver = fixture.resolver();
        assert_eq!(resolver.url_for("shoe", "us", None, false).unwrap().url, "AMAZON");
    }

    #[test]
    fn search_falls_back_to_source_search_links() {
        let fixture = Fixture::new();
        fixture.add(link(
            "search",
            "amazon",
            &[("any", &["https://amazon.example/s?k={{query}}"])],
        ));
        fixture.add(link(
            "search",
            "aliexpress",
            &[("any", &["https://aliexpress.example/w/{{query}}.html"])],
        ));
        let resolver = fixture.resolver();

        let only_amazon = vec!["amazon".to_string()];
        let target = resolver
            .url_for("Red Shoes", "us", Some(&only_amazon), true)
            .unwrap();
        assert_eq!(target.url, "https://amazon.example/s?k=red%20shoes");

        let only_ali = vec!["aliexpress".to_string()];
        let target = resolver
            .url_for("red shoes", "us", Some(&only_ali), true)
            .unwrap();
        assert_eq!(target.url, "https://aliexpress.example/w/red-shoes.html");
        assert_eq!(target.source, "aliexpress");
    }

    #[test]
    fn search_links_are_not_used_without_search_flag() {
        let fixture = Fixture::new();
        fixture.add(link("search", "amazon", &[("any", &["https://amazon.example/s?k={{query}}"])]));
        let resolver = fixture.resolver();

        assert_eq!(
            resolver.url_for("red shoes", "us", None, false),
            Err(ResolveError::NotFound {
                kind: "link",
                id: "red shoes".to_string()
            })
        );
    }

    #[test]
    fn search_without_country_url_reports_search_kind() {
        let fixture = Fixture::new();
        fixture.add(link("search", "amazon", &[("us", &["https://amazon.example/s?k={{query}}"])]));
        let resolver = fixture.resolver();

        assert_eq!(
            resolver.url_for("red shoes", "de", None, true),
            Err(ResolveError::NotFound {
                kind: "search",
                id: "red shoes".to_string()
            })
        );
    }

    #[test]
    fn duplicate_urls_are_not_deduplicated() {
        let fixture = Fixture::new();
        fixture.add(link("shoes", "amazon", &[("any", &["SAME"])]));
        fixture.add(link("shoes", "zalando", &[("any", &["SAME", "OTHER"])]));
        let seen = Arc::new(AtomicUsize::new(0));
        let resolver = fixture
            .resolver()
            .with_selector(RecordingSelector(Arc::clone(&seen)));

        resolver.url_for("shoes", "us", None, false).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn random_selection_spreads_across_sources() {
        let fixture = Fixture::new();
        fixture.add(link("shoes", "amazon", &[("uk", &["A"])]));
        fixture.add(link("shoes", "zalando", &[("uk", &["Z"])]));
        let resolver = fixture.resolver();

        let trials = 2000;
        let amazon = (0..trials)
            .filter(|_| resolver.url_for("shoes", "uk", None, false).unwrap().url == "A")
            .count();

        // Expected 1000, standard deviation ~22.
        assert!((850..=1150).contains(&amazon), "amazon picked {amazon} times");
    }
}
