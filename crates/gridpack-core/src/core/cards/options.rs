use std::collections::HashMap;

/// Insertion-ordered option table with unique keys.
///
/// Also tracks the widest key and value seen so far, which the card writers use
/// to align rewritten lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    order: Vec<String>,
    values: HashMap<String, String>,
    key_width: usize,
    value_width: usize,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option, appending the key if it is new. Returns `true` for new keys.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        self.value_width = self.value_width.max(value.len());
        let is_new = !self.values.contains_key(key);
        if is_new {
            self.key_width = self.key_width.max(key.len());
            self.order.push(key.to_string());
        }
        self.values.insert(key.to_string(), value);
        is_new
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(|k| (k.as_str(), self.values[k].as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn key_width(&self) -> usize {
        self.key_width
    }

    pub fn value_width(&self) -> usize {
        self.value_width
    }
}
