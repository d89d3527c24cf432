//! Fixed system framing applied by every adapter before a provider call.

use gcommon::AccountKind;

use crate::{ChatMessage, CompletionRequest, Role};

/// System instruction for restricted (supervised) accounts.
pub const RESTRICTED_SYSTEM_PROMPT: &str = "\
You are a helpful, friendly AI assistant designed for children.
Your responses should be:
- Age-appropriate and safe for kids
- Educational and encouraging
- Clear and easy to understand
- Free from any inappropriate content
- Supportive of learning and curiosity

Important guidelines:
- Never discuss violence, inappropriate content, or adult themes
- Encourage curiosity and learning
- Be patient and supportive
- Use simple, clear language
- If asked about something inappropriate, politely redirect to safer topics
- Always prioritize the child's safety and well-being";

/// System instruction for guardian accounts.
pub const GENERAL_SYSTEM_PROMPT: &str = "\
You are a helpful, concise AI assistant. Answer clearly and accurately, \
and say so when you are unsure.";

pub fn system_prompt_for(account: AccountKind) -> &'static str {
    match account {
        AccountKind::Restricted => RESTRICTED_SYSTEM_PROMPT,
        AccountKind::Guardian => GENERAL_SYSTEM_PROMPT,
    }
}

/// The message sequence actually sent to a backend: the fixed system
/// instruction for the caller's account kind, then the conversation.
///
/// Any system-role message arriving in the caller history is dropped; the
/// framing is not user-editable.
pub fn framed_history(request: &CompletionRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 1);
    messages.push(ChatMessage::new(
        Role::System,
        system_prompt_for(request.account),
    ));

    messages.extend(
        request
            .history
            .iter()
            .filter(|message| message.role != Role::System)
            .cloned(),
    );

    messages
}
