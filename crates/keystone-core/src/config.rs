//! Named, string-valued configuration sections.
//!
//! A [`ConfigStore`] holds one [`ConfigSection`] per logical configuration
//! file. It is populated once at startup and read-only afterwards.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{BootstrapError, BootstrapResult};

/// A flat `key → value` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    name: String,
    entries: BTreeMap<String, String>,
}

impl ConfigSection {
    /// Creates an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Creates a section from `(key, value)` pairs. Later duplicates win.
    pub fn from_entries<I, K, V>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Section name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the raw value of `key`, failing with
    /// [`BootstrapError::ConfigMalformed`] when it is absent.
    pub fn require(&self, key: &str) -> BootstrapResult<&str> {
        self.get(key)
            .ok_or_else(|| BootstrapError::malformed(&self.name, key, "required key is missing"))
    }

    /// Parses the value of `key` into `T`.
    ///
    /// Returns `Ok(None)` when the key is absent and
    /// [`BootstrapError::ConfigMalformed`] when it does not parse.
    pub fn parse<T>(&self, key: &str) -> BootstrapResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| BootstrapError::malformed(&self.name, key, format!("'{raw}': {e}"))),
        }
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the section has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All configuration sections loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    sections: BTreeMap<String, ConfigSection>,
}

impl ConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_section(mut self, section: ConfigSection) -> Self {
        self.insert(section);
        self
    }

    /// Adds a section, replacing any section with the same name.
    pub fn insert(&mut self, section: ConfigSection) {
        self.sections.insert(section.name.clone(), section);
    }

    /// Looks up a section, failing with [`BootstrapError::ConfigMissing`].
    pub fn get(&self, name: &str) -> BootstrapResult<&ConfigSection> {
        self.sections
            .get(name)
            .ok_or_else(|| BootstrapError::ConfigMissing {
                name: name.to_string(),
            })
    }

    /// Looks up an optional section.
    pub fn find(&self, name: &str) -> Option<&ConfigSection> {
        self.sections.get(name)
    }

    /// Names of all loaded sections, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Number of loaded sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether no section was loaded.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl FromIterator<ConfigSection> for ConfigStore {
    fn from_iter<I: IntoIterator<Item = ConfigSection>>(iter: I) -> Self {
        let mut store = Self::new();
        for section in iter {
            store.insert(section);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_section() {
        let store = ConfigStore::new().with_section(ConfigSection::new("services"));
        assert!(store.get("services").is_ok());
        assert!(matches!(
            store.get("bot"),
            Err(BootstrapError::ConfigMissing { name }) if name == "bot"
        ));
    }

    #[test]
    fn test_parse_values() {
        let section = ConfigSection::new("bot")
            .with("rest.timeout_seconds", " 30 ")
            .with("rest.buffer_size", "lots");

        assert_eq!(section.parse::<u64>("rest.timeout_seconds").unwrap(), Some(30));
        assert_eq!(section.parse::<u64>("absent").unwrap(), None);
        assert!(matches!(
            section.parse::<usize>("rest.buffer_size"),
            Err(BootstrapError::ConfigMalformed { key, .. }) if key == "rest.buffer_size"
        ));
    }

    #[test]
    fn test_require_key() {
        let section = ConfigSection::from_entries("bot", [("token", "abc")]);
        assert_eq!(section.require("token").unwrap(), "abc");
        assert!(section.require("status").is_err());
    }
}
