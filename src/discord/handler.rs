//! Message events: map to the platform-independent view and run the trigger policy.

use log::{debug, info};
use poise::serenity_prelude::{Context, Message as SerenityMessage, UserId};

use crate::error::Result;
use crate::trigger::{self, TriggerOutcome};
use crate::types::{ConversationKey, InboundMessage};

use super::{ChannelResponder, Data};

/// Builds the inbound view of a Discord message as seen by `bot_user_id`.
#[must_use]
pub fn inbound_message(message: &SerenityMessage, bot_user_id: UserId) -> InboundMessage {
    InboundMessage {
        conversation: ConversationKey::from(message.channel_id.to_string()),
        author: message.author.tag(),
        text: message.content.clone(),
        mentions_self: message.mentions_user_id(bot_user_id),
        from_self: message.author.id == bot_user_id,
        self_mention_token: format!("<@{bot_user_id}>"),
    }
}

/// Handle one message event.
///
/// # Errors
///
/// Returns an error if the reply could not be sent.
pub async fn handle_message(
    ctx: &Context,
    new_message: &SerenityMessage,
    data: &Data,
) -> Result<()> {
    let bot_user_id = ctx.cache.current_user().id;
    let message = inbound_message(new_message, bot_user_id);

    debug!(
        "Message from {} in channel {} (guild {:?}), mentions bot: {}",
        message.author, new_message.channel_id, new_message.guild_id, message.mentions_self
    );

    if message.qualifies() {
        info!(
            "Received mention from {} in channel {}: {}",
            message.author, new_message.channel_id, new_message.content
        );
        if let Err(e) = new_message.channel_id.broadcast_typing(&ctx.http).await {
            debug!("Failed to broadcast typing indicator: {e}");
        }
    }

    let responder = ChannelResponder::new(ctx.http.clone());
    let outcome = trigger::handle_message(
        &message,
        data.cache(),
        data.completion(),
        &responder,
        data.persona_template(),
    )
    .await?;

    if outcome == TriggerOutcome::Apologized {
        debug!("Sent apology to channel {}", new_message.channel_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use poise::serenity_prelude::{ChannelId, User};

    use super::*;

    fn discord_message(author_id: u64, content: &str, mentions: Vec<User>) -> SerenityMessage {
        let mut author = User::default();
        author.id = UserId::new(author_id);
        author.name = "alice".to_string();

        let mut message = SerenityMessage::default();
        message.channel_id = ChannelId::new(555);
        message.author = author;
        message.content = content.to_string();
        message.mentions = mentions;
        message
    }

    fn bot_user() -> User {
        let mut bot = User::default();
        bot.id = UserId::new(42);
        bot.bot = true;
        bot
    }

    #[test]
    fn mention_from_user_qualifies() {
        let message = discord_message(7, "<@42> hi", vec![bot_user()]);
        let inbound = inbound_message(&message, UserId::new(42));

        assert_eq!(inbound.conversation, ConversationKey::from("555"));
        assert_eq!(inbound.self_mention_token, "<@42>");
        assert!(inbound.mentions_self);
        assert!(!inbound.from_self);
        assert!(inbound.qualifies());
    }

    #[test]
    fn own_message_never_qualifies() {
        let message = discord_message(42, "<@42> echo", vec![bot_user()]);
        let inbound = inbound_message(&message, UserId::new(42));
        assert!(inbound.from_self);
        assert!(!inbound.qualifies());
    }

    #[test]
    fn plain_message_does_not_qualify() {
        let message = discord_message(7, "hello everyone", Vec::new());
        assert!(!inbound_message(&message, UserId::new(42)).qualifies());
    }
}
