//! Flexibility set matching
//!
//! A flexibility set is the group of instance types considered interchangeable
//! with the replacement type. It is selected by a regular expression that must
//! match the whole instance type name, e.g. `^(c|m|r)[a-z0-9-]+\.[a-z0-9]+$` accepts every
//! compute, general-purpose and memory-optimized type.

use crate::error::{ConfigError, Result};
use regex::Regex;

/// Compiled flexibility pattern
#[derive(Debug, Clone)]
pub struct FlexibilityMatcher {
    pattern: String,
    regex: Regex,
}

impl FlexibilityMatcher {
    /// Compile a pattern. An invalid pattern is a configuration error.
    pub fn new(pattern: &str) -> Result<Self> {
        // Anchor the user pattern so a partial hit never counts as a match.
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            ConfigError::InvalidValue {
                field: "flexibility".to_string(),
                reason: format!("'{}' is not a valid pattern: {}", pattern, e),
            }
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, instance_type: &str) -> bool {
        self.regex.is_match(instance_type)
    }

    /// Filter a catalog down to the flexibility set, keeping catalog order.
    pub fn flexibility_set<I, S>(&self, catalog: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        catalog
            .into_iter()
            .filter(|it| self.matches(it.as_ref()))
            .map(|it| it.as_ref().to_string())
            .collect()
    }
}
