//! Per-request ruleset lookup contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use gcommon::UserId;

use crate::ContentRuleSet;

/// Resolves the ruleset governing a restricted account.
///
/// Read on every message; implementations must be cheap and must reflect
/// guardian updates no later than the next request.
pub trait RuleSource: Send + Sync {
    fn rules_for(&self, user: &UserId) -> ContentRuleSet;
}

/// Rule cache keyed by restricted account, with a configurable default for
/// accounts that have no explicit ruleset yet.
#[derive(Debug)]
pub struct InMemoryRuleSource {
    default_rules: ContentRuleSet,
    rules: RwLock<HashMap<UserId, ContentRuleSet>>,
}

impl InMemoryRuleSource {
    pub fn new(default_rules: ContentRuleSet) -> Self {
        Self {
            default_rules,
            rules: RwLock::new(HashMap::new()),
        }
    }

    /// Guardian update path: replaces the ruleset for one account.
    pub fn set_rules(&self, user: UserId, rules: ContentRuleSet) {
        if let Ok(mut map) = self.rules.write() {
            map.insert(user, rules);
        }
    }

    pub fn clear_rules(&self, user: &UserId) {
        if let Ok(mut map) = self.rules.write() {
            map.remove(user);
        }
    }
}

impl Default for InMemoryRuleSource {
    fn default() -> Self {
        Self::new(ContentRuleSet::permissive())
    }
}

impl RuleSource for InMemoryRuleSource {
    fn rules_for(&self, user: &UserId) -> ContentRuleSet {
        self.rules
            .read()
            .ok()
            .and_then(|map| map.get(user).cloned())
            .unwrap_or_else(|| self.default_rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RuleMode, evaluate};

    #[test]
    fn returns_default_rules_for_unknown_user() {
        let source = InMemoryRuleSource::default();
        let rules = source.rules_for(&UserId::from("kid-1"));
        assert_eq!(rules.mode, RuleMode::Blocklist);
        assert!(rules.keywords.is_empty());
    }

    #[test]
    fn guardian_updates_are_visible_to_the_next_lookup() {
        let source = InMemoryRuleSource::default();
        let user = UserId::from("kid-1");

        assert!(evaluate("about weapons", &source.rules_for(&user)).is_allowed());

        source.set_rules(user.clone(), ContentRuleSet::blocklist(vec!["weapon".into()]));
        assert!(!evaluate("about weapons", &source.rules_for(&user)).is_allowed());

        source.clear_rules(&user);
        assert!(evaluate("about weapons", &source.rules_for(&user)).is_allowed());
    }
}
