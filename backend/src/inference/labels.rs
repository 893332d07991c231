use std::collections::HashSet;

use crate::config::ConfigError;

/// Ordered class names, index-aligned with the model output vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self, ConfigError> {
        if labels.is_empty() {
            return Err(ConfigError::Invalid("label set must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                return Err(ConfigError::Invalid("labels must not be blank".into()));
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate label '{}'", label)));
            }
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.labels.clone()
    }
}
