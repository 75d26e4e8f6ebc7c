//! Display names for technologies and areas.
//!
//! Localisation files are loaded elsewhere; this table only holds whatever
//! names the caller supplies and falls back to a humanized id.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<String, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, name: impl Into<String>) {
        self.names.insert(key.into(), name.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    /// Supplied name, or [`humanize`]d key.
    pub fn display_name(&self, key: &str) -> String {
        match self.get(key) {
            Some(name) => name.to_string(),
            None => humanize(key),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for NameTable {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// `tech_lasers_1` -> `Lasers 1`.
pub fn humanize(id: &str) -> String {
    let trimmed = id.strip_prefix("tech_").unwrap_or(id);
    trimmed
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
