//! Extended attribute multimap.
//!
//! Web IDL extended attributes are `key` or `key=value` or `key=(v1, v2)`
//! annotations. The frontend flattens them into a multimap from key to a
//! list of string values; a bare `[Key]` has an empty value list.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Multimap of extended attributes attached to a definition, member, type or
/// argument.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ExtendedAttributes {
    entries: BTreeMap<String, Vec<String>>,
}

impl ExtendedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, values)` pairs. Later pairs with the same key extend
    /// the earlier value list.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, Vec<V>)>,
    {
        let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, values) in pairs {
            entries
                .entry(key.into())
                .or_default()
                .extend(values.into_iter().map(Into::into));
        }
        Self { entries }
    }

    /// Whether `[key]` is present, with or without a value.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The single value of `[key=value]`, if present.
    ///
    /// For a bare `[key]` this returns `None`; use [`has`](Self::has) to
    /// distinguish absence from valuelessness.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `[key=(v1, v2, ...)]`, empty when absent or bare.
    pub fn values_of(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys in sorted order (the map is ordered, so iteration is stable).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.entries.entry(key.into()).or_default().extend(values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_key_has_no_value() {
        let attrs = ExtendedAttributes::from_pairs([("CEReactions", Vec::<String>::new())]);
        assert!(attrs.has("CEReactions"));
        assert_eq!(attrs.value_of("CEReactions"), None);
    }

    #[test]
    fn valued_key() {
        let attrs =
            ExtendedAttributes::from_pairs([("RuntimeEnabled", vec!["SharedStorageAPI"])]);
        assert_eq!(attrs.value_of("RuntimeEnabled"), Some("SharedStorageAPI"));
        assert_eq!(attrs.values_of("RuntimeEnabled"), ["SharedStorageAPI"]);
    }

    #[test]
    fn multi_valued_key_preserves_order() {
        let attrs = ExtendedAttributes::from_pairs([("Exposed", vec!["Window", "Worker"])]);
        assert_eq!(attrs.values_of("Exposed"), ["Window", "Worker"]);
    }
}
