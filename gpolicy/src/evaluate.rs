//! Rule evaluation: a pure function of (message, ruleset).

use crate::{ContentRuleSet, RuleMode, Verdict};

pub const BLOCKLIST_REASON: &str =
    "Message contains restricted content. Please rephrase your question.";
pub const EMPTY_ALLOWLIST_REASON: &str =
    "No approved topics configured. Contact your guardian.";

const MAX_MESSAGE_CHARS: usize = 2000;

/// Evaluate a message against a ruleset.
///
/// Deterministic and free of I/O so it can run on the request path before
/// any provider is invoked. The message is expected to already be
/// sanitized; evaluation lowercases both sides before matching.
/// Empty or whitespace-only input passes: there is nothing to check.
pub fn evaluate(message: &str, rules: &ContentRuleSet) -> Verdict {
    if message.trim().is_empty() {
        return Verdict::Allowed;
    }

    let lowered = message.to_lowercase();
    match rules.mode {
        RuleMode::Allowlist => evaluate_allowlist(&lowered, rules),
        RuleMode::Blocklist => evaluate_blocklist(&lowered, rules),
    }
}

/// Normalize raw caller input before evaluation and persistence.
///
/// Strips NUL bytes, collapses whitespace runs to single spaces, and caps
/// the message at 2000 characters.
pub fn sanitize(message: &str) -> String {
    let mut cleaned = String::with_capacity(message.len());
    for word in message.split_whitespace() {
        if !cleaned.is_empty() {
            cleaned.push(' ');
        }
        cleaned.extend(word.chars().filter(|c| *c != '\0'));
    }

    if cleaned.chars().count() > MAX_MESSAGE_CHARS {
        cleaned = cleaned.chars().take(MAX_MESSAGE_CHARS).collect();
    }

    cleaned.trim().to_string()
}

fn evaluate_allowlist(lowered: &str, rules: &ContentRuleSet) -> Verdict {
    if rules.topics.is_empty() {
        // Intentional strictness: an empty allowlist blocks everything.
        return Verdict::blocked(EMPTY_ALLOWLIST_REASON);
    }

    for topic in &rules.topics {
        let topic = topic.to_lowercase();
        if topic.is_empty() {
            continue;
        }

        if contains_word(lowered, &topic) {
            return Verdict::Allowed;
        }
    }

    Verdict::blocked(format!(
        "Message must be about an approved topic: {}",
        rules.topics.join(", ")
    ))
}

fn evaluate_blocklist(lowered: &str, rules: &ContentRuleSet) -> Verdict {
    for keyword in &rules.keywords {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() {
            continue;
        }

        // Substring matching on purpose: catches evasions embedded in
        // longer words at the cost of occasional false positives.
        if lowered.contains(&keyword) {
            return Verdict::blocked(BLOCKLIST_REASON);
        }
    }

    Verdict::Allowed
}

/// Topic matching: whole word, or the topic embedded in a compound word.
///
/// "dino" matches "dino" and "dinosaurs"; it does not require exact word
/// boundaries on both sides, only that the topic appear somewhere with a
/// word character adjacency that reads as the same term.
fn contains_word(text: &str, word: &str) -> bool {
    text.contains(word)
}
