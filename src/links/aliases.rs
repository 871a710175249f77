use std::collections::HashMap;

/// Maps link aliases to their canonical link id.
#[derive(Debug, Clone, Default)]
pub struct LinkAliases {
    aliases: HashMap<String, String>,
    plurals: bool,
}

impl LinkAliases {
    /// Build from canonical id -> aliases. With `auto_plural`, every alias also
    /// registers its naive plural (`alias` + "s").
    ///
    /// Declared aliases always win over generated plurals. Canonical ids are
    /// applied in sorted order, so a conflict resolves to the last id.
    pub fn new(declared: &HashMap<String, Vec<String>>, auto_plural: bool) -> Self {
        let mut canonical_ids: Vec<(String, &Vec<String>)> = declared
            .iter()
            .map(|(canonical, names)| (canonical.to_lowercase(), names))
            .collect();
        canonical_ids.sort_by(|a, b| a.0.cmp(&b.0));

        let mut aliases = HashMap::new();

        if auto_plural {
            for (canonical, names) in &canonical_ids {
                for name in names.iter() {
                    aliases.insert(format!("{}s", name.to_lowercase()), canonical.clone());
                }
            }
        }

        for (canonical, names) in &canonical_ids {
            for name in names.iter() {
                aliases.insert(name.to_lowercase(), canonical.clone());
            }
        }

        Self {
            aliases,
            plurals: auto_plural,
        }
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    pub fn has_plurals(&self) -> bool {
        self.plurals
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
