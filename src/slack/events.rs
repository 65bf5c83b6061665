//! Push event dispatch. Events are acknowledged at once and handled in a task.

use std::sync::Arc;

use axum::{
    Extension, Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{debug, error, info};
use serde_json::json;
use slack_morphism::prelude::*;

use crate::error::Result;
use crate::trigger::{self, Responder};
use crate::types::{ConversationKey, InboundMessage};

use super::{SlackBot, SlackCommand};

pub async fn push_event_handler(
    Extension(bot): Extension<Arc<SlackBot>>,
    Extension(event): Extension<SlackPushEvent>,
) -> Response {
    let (response, callback) = acknowledge(event);
    if let Some(callback) = callback {
        tokio::spawn(dispatch(bot, callback));
    }
    response
}

/// Immediate HTTP answer to a push event, plus the callback left to process.
fn acknowledge(event: SlackPushEvent) -> (Response, Option<SlackPushEventCallback>) {
    match event {
        SlackPushEvent::UrlVerification(verification) => {
            info!("Answering Slack URL verification challenge");
            (
                Json(json!({ "challenge": verification.challenge })).into_response(),
                None,
            )
        }
        SlackPushEvent::EventCallback(callback) => (StatusCode::OK.into_response(), Some(callback)),
        other => {
            debug!("Ignoring Slack push event: {other:?}");
            (StatusCode::OK.into_response(), None)
        }
    }
}

async fn dispatch(bot: Arc<SlackBot>, callback: SlackPushEventCallback) {
    let result = match callback.event {
        SlackEventCallbackBody::Message(message) => handle_message_event(&bot, message).await,
        SlackEventCallbackBody::AppMention(mention) => handle_app_mention(&bot, mention).await,
        _ => Ok(()),
    };
    if let Err(e) = result {
        error!("Error handling Slack event: {e}");
    }
}

async fn handle_message_event(bot: &SlackBot, message: SlackMessageEvent) -> Result<()> {
    if message.sender.bot_id.is_some() {
        debug!("Ignoring bot message");
        return Ok(());
    }
    let Some(user) = message.sender.user else {
        return Ok(());
    };
    if user.0 == bot.bot_user_id {
        return Ok(());
    }
    let Some(channel) = message.origin.channel else {
        return Ok(());
    };
    let text = message
        .content
        .and_then(|content| content.text)
        .unwrap_or_default();

    info!(
        "Slack message in channel {} from {}: {}",
        channel.0, user.0, text
    );

    let Ok(command) = text.trim().parse::<SlackCommand>() else {
        return Ok(());
    };
    info!("Running {command:?} command in channel {}", channel.0);

    let reply = command.reply(&bot.session(), &channel, &user.0).await;
    bot.send(&ConversationKey::from(channel.0), &reply).await
}

async fn handle_app_mention(bot: &SlackBot, mention: SlackAppMentionEvent) -> Result<()> {
    let message = inbound_mention(
        mention.channel.0,
        mention.user.0,
        mention.content.text.unwrap_or_default(),
        &bot.bot_user_id,
    );
    info!(
        "Slack mention in channel {} from {}: {}",
        message.conversation, message.author, message.text
    );

    let outcome = trigger::handle_message(
        &message,
        &bot.cache,
        &bot.completion,
        bot,
        &bot.persona_template,
    )
    .await?;
    debug!("Mention in {} handled: {outcome:?}", message.conversation);
    Ok(())
}

/// An `app_mention` event always mentions the bot.
fn inbound_mention(channel: String, user: String, text: String, bot_user_id: &str) -> InboundMessage {
    InboundMessage {
        conversation: ConversationKey::from(channel),
        from_self: user == bot_user_id,
        author: user,
        text,
        mentions_self: true,
        self_mention_token: format!("<@{bot_user_id}>"),
    }
}
