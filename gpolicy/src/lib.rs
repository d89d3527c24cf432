//! Rule-based content policy evaluated before any provider call.
//!
//! ```rust
//! use gpolicy::{ContentRuleSet, evaluate, sanitize};
//!
//! let rules = ContentRuleSet::blocklist(vec!["gambling".to_string()]);
//! let message = sanitize("  how do\0 plants grow?  ");
//!
//! assert!(evaluate(&message, &rules).is_allowed());
//! assert!(!evaluate("online gambling sites", &rules).is_allowed());
//! ```

mod evaluate;
mod source;
mod types;

pub mod prelude {
    pub use crate::{
        ContentRuleSet, InMemoryRuleSource, RuleMode, RuleSource, Verdict, evaluate, sanitize,
    };
}

pub use evaluate::{BLOCKLIST_REASON, EMPTY_ALLOWLIST_REASON, evaluate, sanitize};
pub use source::{InMemoryRuleSource, RuleSource};
pub use types::{ContentRuleSet, RuleMode, Verdict};

#[cfg(test)]
mod tests {
    use crate::{ContentRuleSet, RuleMode};

    #[test]
    fn rulesets_round_trip_through_json() {
        let rules = ContentRuleSet::allowlist(vec!["space".to_string(), "math".to_string()]);
        let encoded = serde_json::to_string(&rules).expect("ruleset should encode");
        let decoded: ContentRuleSet =
            serde_json::from_str(&encoded).expect("ruleset should decode");

        assert_eq!(decoded, rules);
        assert_eq!(decoded.mode, RuleMode::Allowlist);
    }

    #[test]
    fn mode_serializes_as_lowercase_names() {
        let encoded = serde_json::to_string(&RuleMode::Blocklist).expect("mode should encode");
        assert_eq!(encoded, "\"blocklist\"");
    }

    #[test]
    fn missing_lists_decode_as_empty() {
        let decoded: ContentRuleSet =
            serde_json::from_str(r#"{"mode":"blocklist"}"#).expect("ruleset should decode");
        assert!(decoded.keywords.is_empty());
        assert!(decoded.topics.is_empty());
    }
}
