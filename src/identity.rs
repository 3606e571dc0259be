//! Directory identity to platform account mapping

use serde::{Deserialize, Serialize};

/// A single search/replace rule applied to a directory email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub search: String,
    pub replace: String,
}

impl RewriteRule {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        RewriteRule {
            search: search.into(),
            replace: replace.into(),
        }
    }

    /// Parse `search=replace;search=replace`. Entries without `=` are ignored.
    pub fn parse_list(raw: &str) -> Vec<RewriteRule> {
        raw.split(';')
            .filter_map(|entry| entry.split_once('='))
            .filter(|(search, _)| !search.is_empty())
            .map(|(search, replace)| RewriteRule::new(search, replace))
            .collect()
    }
}

/// Maps directory emails to candidate platform ids.
///
/// The mapping is a pure function of the configured rules: substitutions
/// first, in order, then the prefix, then the suffix. It never fails; a
/// malformed email simply yields a candidate that the existence check
/// rejects later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMapper {
    #[serde(default)]
    pub rules: Vec<RewriteRule>,
    #[serde(default)]
    pub prepend: String,
    #[serde(default)]
    pub append: String,
}

impl IdentityMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a substitution rule
    pub fn with_rule(mut self, search: impl Into<String>, replace: impl Into<String>) -> Self {
        self.rules.push(RewriteRule::new(search, replace));
        self
    }

    /// Set the prefix added to every candidate
    pub fn with_prepend(mut self, prepend: impl Into<String>) -> Self {
        self.prepend = prepend.into();
        self
    }

    /// Set the suffix added to every candidate
    pub fn with_append(mut self, append: impl Into<String>) -> Self {
        self.append = append.into();
        self
    }

    pub fn to_platform_id(&self, email: &str) -> String {
        let rewritten = self
            .rules
            .iter()
            .fold(email.trim().to_string(), |acc, rule| {
                acc.replace(&rule.search, &rule.replace)
            });
        if rewritten.is_empty() {
            return rewritten;
        }
        format!("{}{}{}", self.prepend, rewritten, self.append)
    }
}
