//! Startup loading of history and rosters for every visible text channel.

use std::collections::HashMap;

use futures::StreamExt;
use log::{debug, info, warn};
use poise::serenity_prelude::{
    ChannelType, Context, GuildChannel, GuildId, Member, Message, UserId,
};

use crate::context::{ConversationCache, HistoryMessage, Participant};
use crate::types::ConversationKey;

/// Status reported for members without a cached presence.
const DEFAULT_STATUS: &str = "offline";

struct GuildSnapshot {
    name: String,
    channels: Vec<GuildChannel>,
    statuses: HashMap<UserId, String>,
}

/// Refresh history and roster for every text channel of the given guilds.
///
/// Runs once when the gateway cache is ready. Failures are logged per channel
/// and never abort the remaining channels.
pub async fn load_guild_contexts(ctx: &Context, guilds: &[GuildId], cache: &ConversationCache) {
    let bot_user_id = ctx.cache.current_user().id;
    info!("Loading conversation context for {} guilds", guilds.len());

    for guild_id in guilds {
        let Some(guild) = snapshot_guild(ctx, *guild_id) else {
            warn!("Guild {guild_id} is not in the cache, skipping");
            continue;
        };
        info!(
            "  - {} (ID: {}), {} text channels",
            guild.name,
            guild_id,
            guild.channels.len()
        );

        for channel in &guild.channels {
            load_channel_history(ctx, channel, bot_user_id, cache).await;
            load_channel_roster(ctx, channel, &guild.statuses, cache).await;
        }
    }

    info!(
        "Conversation context ready for {} channels",
        cache.conversation_count().await
    );
}

// Copies what is needed out of the cache so no guild reference is held across awaits.
fn snapshot_guild(ctx: &Context, guild_id: GuildId) -> Option<GuildSnapshot> {
    let guild = ctx.cache.guild(guild_id)?;

    let mut channels: Vec<GuildChannel> = guild
        .channels
        .values()
        .filter(|channel| channel.kind == ChannelType::Text)
        .cloned()
        .collect();
    channels.sort_by_key(|channel| channel.position);

    let statuses = guild
        .presences
        .iter()
        .map(|(user_id, presence)| (*user_id, presence.status.name().to_string()))
        .collect();

    Some(GuildSnapshot {
        name: guild.name.clone(),
        channels,
        statuses,
    })
}

async fn load_channel_history(
    ctx: &Context,
    channel: &GuildChannel,
    bot_user_id: UserId,
    cache: &ConversationCache,
) {
    debug!("Loading message history for #{}", channel.name);
    let key = ConversationKey::from(channel.id.to_string());
    let source = channel
        .id
        .messages_iter(&ctx.http)
        .map(|item| item.map(history_message));

    match cache
        .refresh_history(&key, source, &bot_user_id.to_string())
        .await
    {
        Ok(refresh) => info!(
            "Loaded {} messages from #{} (estimated tokens: {:.1})",
            refresh.admitted, channel.name, refresh.estimated_tokens
        ),
        Err(e) => warn!("Failed to load history for #{}: {}", channel.name, e),
    }
}

async fn load_channel_roster(
    ctx: &Context,
    channel: &GuildChannel,
    statuses: &HashMap<UserId, String>,
    cache: &ConversationCache,
) {
    let members = match channel.members(&ctx.cache) {
        Ok(members) => members,
        Err(e) => {
            warn!("Failed to list members of #{}: {}", channel.name, e);
            return;
        }
    };

    let participants = members
        .into_iter()
        .map(|member| participant(member, statuses));

    let key = ConversationKey::from(channel.id.to_string());
    let count = cache.refresh_roster(&key, participants).await;
    debug!("Updated roster for #{} ({count} members)", channel.name);
}

/// Author ids are compared with the bot's id in decimal form.
fn history_message(message: Message) -> HistoryMessage {
    HistoryMessage {
        author_id: message.author.id.to_string(),
        author_name: message.author.name,
        text: message.content,
    }
}

fn participant(member: Member, statuses: &HashMap<UserId, String>) -> Participant {
    let status = statuses
        .get(&member.user.id)
        .cloned()
        .unwrap_or_else(|| DEFAULT_STATUS.to_string());
    Participant {
        name: member.user.name,
        automated: member.user.bot,
        status,
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use poise::serenity_prelude::User;

    use super::*;

    fn user(id: u64, name: &str, bot: bool) -> User {
        let mut user = User::default();
        user.id = UserId::new(id);
        user.name = name.to_string();
        user.bot = bot;
        user
    }

    fn member(id: u64, name: &str, bot: bool) -> Member {
        let mut member = Member::default();
        member.user = user(id, name, bot);
        member
    }

    fn message(author_id: u64, author_name: &str, content: &str) -> Message {
        let mut message = Message::default();
        message.author = user(author_id, author_name, false);
        message.content = content.to_string();
        message
    }

    #[test]
    fn member_without_presence_is_offline() {
        let statuses = HashMap::from([(UserId::new(1), "idle".to_string())]);

        let present = participant(member(1, "alice", false), &statuses);
        let absent = participant(member(2, "bob", false), &statuses);

        assert_eq!(present.status, "idle");
        assert_eq!(absent.status, DEFAULT_STATUS);
        assert_eq!(absent.name, "bob");
    }

    #[test]
    fn bot_members_are_automated() {
        let helper = participant(member(3, "helper", true), &HashMap::new());
        assert!(helper.automated);
        assert!(!participant(member(4, "carol", false), &HashMap::new()).automated);
    }

    #[test]
    fn history_message_keeps_author_and_text() {
        let converted = history_message(message(7, "alice", "hello there"));
        assert_eq!(converted.author_id, "7");
        assert_eq!(converted.author_name, "alice");
        assert_eq!(converted.text, "hello there");
    }

    #[tokio::test]
    async fn own_messages_are_skipped_by_id() {
        let bot_user_id = UserId::new(42);
        let cache = ConversationCache::default();
        let key = ConversationKey::from("555");
        let source = stream::iter(vec![
            Ok::<_, &str>(message(42, "chatrelay", "my own reply")),
            Ok(message(7, "alice", "a question")),
        ])
        .map(|item| item.map(history_message));

        let refresh = cache
            .refresh_history(&key, source, &bot_user_id.to_string())
            .await
            .expect("refresh succeeds");

        assert_eq!(refresh.admitted, 1);
        let snapshot = cache.get(&key).await;
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].author, "alice");
    }
}
