//! Fresh domain sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The set of desired-state domains known to be completely synced.
///
/// Callers pass `Option<&DomainSet>`: `None` disables freshness gating
/// entirely, while an empty set means no domain is fresh.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainSet(BTreeSet<String>);

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.0.contains(domain)
    }

    pub fn add(&mut self, domain: impl Into<String>) {
        self.0.insert(domain.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DomainSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_set_from_json_list() {
        let domains: DomainSet = serde_json::from_str(r#"["cf-apps","tests"]"#).unwrap();
        assert!(domains.contains("cf-apps"));
        assert!(domains.contains("tests"));
        assert!(!domains.contains("other"));
        assert_eq!(domains.len(), 2);
    }
}
