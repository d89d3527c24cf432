//! Guardian-configured rulesets and policy verdicts.

use serde::{Deserialize, Serialize};

/// Which of the two rule lists is active at evaluation time.
///
/// The inactive list is ignored entirely, not merely treated as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    Allowlist,
    Blocklist,
}

/// One guardian's content filtering configuration.
///
/// `topics` is meaningful only in allowlist mode and `keywords` only in
/// blocklist mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRuleSet {
    pub mode: RuleMode,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ContentRuleSet {
    pub fn allowlist(topics: Vec<String>) -> Self {
        Self {
            mode: RuleMode::Allowlist,
            topics,
            keywords: Vec::new(),
        }
    }

    pub fn blocklist(keywords: Vec<String>) -> Self {
        Self {
            mode: RuleMode::Blocklist,
            topics: Vec::new(),
            keywords,
        }
    }

    /// A blocklist with no keywords: everything passes.
    pub fn permissive() -> Self {
        Self::blocklist(Vec::new())
    }
}

impl Default for ContentRuleSet {
    fn default() -> Self {
        Self::permissive()
    }
}

/// The outcome of evaluating one message against one ruleset.
///
/// Produced fresh per message; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked { reason: String },
}

impl Verdict {
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allowed => None,
            Self::Blocked { reason } => Some(reason.as_str()),
        }
    }
}
