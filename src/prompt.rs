//! System prompt and user content assembly.

use crate::context::MessageRecord;

/// Insertion point for the participant roster.
pub const ROSTER_SLOT: &str = "{roster}";

/// Insertion point for the recent conversation history.
pub const HISTORY_SLOT: &str = "{history}";

/// Built-in persona used when no template is configured.
pub const DEFAULT_PERSONA: &str = "You are MCP (Minecraft Control Protocol).

The members of the current channel are:
{roster}

The recent conversation, oldest first, is:
{history}

Answer the user's question clearly and accurately. If they ask about members, use the list above.
Use the earlier conversation to understand the context of the question.
As MCP, act as a friendly and helpful AI assistant.";

/// Render the system prompt from a roster, an oldest-first history and a persona template.
#[must_use]
pub fn build_system_prompt(roster: &[String], history: &[MessageRecord], template: &str) -> String {
    let roster = roster.join("\n");
    let history = history
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");

    // Single pass so text inside the roster can never be read as the history slot.
    let mut rendered = String::with_capacity(template.len() + roster.len() + history.len());
    let mut rest = template;
    loop {
        let next = [(ROSTER_SLOT, roster.as_str()), (HISTORY_SLOT, history.as_str())]
            .into_iter()
            .filter_map(|(slot, value)| rest.find(slot).map(|at| (at, slot, value)))
            .min_by_key(|(at, _, _)| *at);

        let Some((at, slot, value)) = next else {
            rendered.push_str(rest);
            break;
        };
        rendered.push_str(&rest[..at]);
        rendered.push_str(value);
        rest = &rest[at + slot.len()..];
    }
    rendered
}

/// Remove one occurrence of the bot's mention token and trim the result.
#[must_use]
pub fn build_user_content(raw_text: &str, self_mention_token: &str) -> String {
    if self_mention_token.is_empty() {
        return raw_text.trim().to_string();
    }
    raw_text.replacen(self_mention_token, "", 1).trim().to_string()
}
