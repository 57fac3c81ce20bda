use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical, lowercase product identifier used to index price tables.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductKey(String);

impl ProductKey {
    /// Trims, lowercases and collapses inner whitespace.
    pub fn new(raw: &str) -> Self {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn belongs_to_family(&self, family: &str) -> bool {
        !family.is_empty() && self.0.contains(family)
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::ProductKey;

    #[test]
    fn keys_are_case_and_whitespace_insensitive() {
        assert_eq!(ProductKey::new("  ALUX   Glass "), ProductKey::new("alux glass"));
        assert_eq!(ProductKey::new("Screenová Roleta").as_str(), "screenová roleta");
    }

    #[test]
    fn family_membership_matches_substring() {
        assert!(ProductKey::new("screen").belongs_to_family("screen"));
        assert!(ProductKey::new("alux screen zip").belongs_to_family("screen"));
        assert!(!ProductKey::new("alux glass").belongs_to_family("screen"));
        assert!(!ProductKey::new("alux glass").belongs_to_family(""));
    }
}
