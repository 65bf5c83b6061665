use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use poise::serenity_prelude::{ChannelId, Http};

use crate::error::{BotError, Result};
use crate::trigger::Responder;
use crate::types::ConversationKey;

/// Discord rejects message content longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 2000;

/// Posts replies into Discord channels.
pub struct ChannelResponder {
    http: Arc<Http>,
}

impl ChannelResponder {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

/// Discord conversations are keyed by the decimal channel id.
pub fn channel_id(conversation: &ConversationKey) -> Result<ChannelId> {
    let id = conversation
        .as_str()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| BotError::InvalidConversation(conversation.to_string()))?;
    Ok(ChannelId::new(id))
}

/// Cut `text` to the longest prefix Discord accepts as message content.
fn fit_message(text: &str) -> &str {
    match text.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[async_trait]
impl Responder for ChannelResponder {
    async fn send(&self, conversation: &ConversationKey, text: &str) -> Result<()> {
        let channel = channel_id(conversation)?;
        let content = fit_message(text);
        if content.len() < text.len() {
            warn!(
                "Reply for channel {channel} exceeds {MAX_MESSAGE_CHARS} characters, truncating"
            );
        }
        channel.say(&self.http, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_key_round_trips() {
        let key = ConversationKey::from(ChannelId::new(1234).to_string());
        assert_eq!(channel_id(&key).expect("valid id"), ChannelId::new(1234));
    }

    #[test]
    fn long_replies_are_cut_to_the_limit() {
        let reply = "word ".repeat(420);
        let fitted = fit_message(&reply);
        assert_eq!(fitted.chars().count(), MAX_MESSAGE_CHARS);
        assert!(reply.starts_with(fitted));
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let reply = "안".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(fit_message(&reply).chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn short_replies_are_untouched() {
        let exact = "a".repeat(MAX_MESSAGE_CHARS);
        assert_eq!(fit_message(&exact), exact);
        assert_eq!(fit_message("hi"), "hi");
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for raw in ["", "general", "0", "-5"] {
            assert!(matches!(
                channel_id(&ConversationKey::from(raw)),
                Err(BotError::InvalidConversation(_))
            ));
        }
    }
}
