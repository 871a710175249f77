use std::collections::HashMap;

use tracing::debug;

use crate::config::AliasList;

/// Maps country aliases (code variants, region names, synonyms) to a
/// canonical lowercase country code. Built once at startup.
#[derive(Debug, Clone, Default)]
pub struct CountryAliases {
    aliases: HashMap<String, String>,
}

impl CountryAliases {
    pub fn new(declared: &HashMap<String, AliasList>) -> Self {
        let mut aliases = HashMap::new();

        for (code, names) in declared {
            let code = code.to_lowercase();
            debug!(
                "Country {code} aliases: {}",
                names.iter().collect::<Vec<_>>().join(", ")
            );

            for name in names.iter() {
                aliases.insert(name.to_lowercase(), code.clone());
            }
        }

        Self { aliases }
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&alias.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
