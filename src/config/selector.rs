//! Label selector parsing and matching
//!
//! A selector is a single `key=value` pair. Containers are only managed when
//! their labels carry exactly that pair.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing a selector string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("label selector '{0}' has no '=' separator")]
    MissingSeparator(String),

    #[error("label selector '{0}' has more than one '=' separator")]
    TooManySeparators(String),
}

/// A required `key=value` label pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

// ============================================================================
// SBIO: Pure parsing and matching (no I/O)
// ============================================================================

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Check whether a container's labels contain this exact pair
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        labels
            .get(&self.key)
            .map(|v| v == &self.value)
            .unwrap_or(false)
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.matches('=').count() {
            0 => Err(SelectorError::MissingSeparator(s.to_string())),
            1 => {
                let (key, value) = s.split_once('=').unwrap_or((s, ""));
                Ok(Self::new(key, value))
            }
            _ => Err(SelectorError::TooManySeparators(s.to_string())),
        }
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_valid_selector() {
        let selector: LabelSelector = "app=web".parse().unwrap();
        assert_eq!(selector.key, "app");
        assert_eq!(selector.value, "web");
        assert_eq!(selector.to_string(), "app=web");
    }

    #[test]
    fn test_parse_empty_value() {
        let selector: LabelSelector = "app=".parse().unwrap();
        assert_eq!(selector.key, "app");
        assert_eq!(selector.value, "");
    }

    #[test]
    fn test_parse_missing_separator() {
        assert_eq!(
            "app".parse::<LabelSelector>(),
            Err(SelectorError::MissingSeparator("app".to_string()))
        );
        assert!("".parse::<LabelSelector>().is_err());
    }

    #[test]
    fn test_parse_too_many_separators() {
        assert_eq!(
            "app=web=extra".parse::<LabelSelector>(),
            Err(SelectorError::TooManySeparators("app=web=extra".to_string()))
        );
    }

    #[test]
    fn test_matches_exact_pair() {
        let selector = LabelSelector::new("app", "web");
        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "front")])));
        assert!(!selector.matches(&labels(&[("app", "worker")])));
        assert!(!selector.matches(&labels(&[("tier", "web")])));
        assert!(!selector.matches(&HashMap::new()));
    }
}
