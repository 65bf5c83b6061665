//! Slack bot: Events API receiver, channel commands and mention replies.

mod commands;
mod events;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{Extension, Router, routing::post};
use log::{debug, error, info, warn};
use slack_morphism::prelude::*;
use tokio::net::TcpListener;

use crate::completion::CompletionClient;
use crate::config::SlackConfig;
use crate::context::ConversationCache;
use crate::error::{BotError, Result};
use crate::trigger::Responder;
use crate::types::ConversationKey;

pub use commands::SlackCommand;

/// Shared state for Slack event handlers.
///
/// Its conversation cache is never refreshed: Slack mentions are answered
/// with empty roster and history sections.
pub struct SlackBot {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
    bot_user_id: String,
    cache: ConversationCache,
    completion: CompletionClient,
    persona_template: String,
}

impl SlackBot {
    fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.token)
    }
}

#[async_trait]
impl Responder for SlackBot {
    async fn send(&self, conversation: &ConversationKey, text: &str) -> Result<()> {
        let request = SlackApiChatPostMessageRequest::new(
            SlackChannelId(conversation.as_str().to_string()),
            SlackMessageContent::new().with_text(text.to_string()),
        );
        self.session().chat_post_message(&request).await?;
        Ok(())
    }
}

/// Run the Slack events receiver until Ctrl-C is received.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, the bot token is rejected,
/// or the listener cannot be bound.
pub async fn run() -> Result<()> {
    info!("Initializing Slack bot");
    let config = SlackConfig::from_env()?;

    debug!("Initializing completion client");
    let completion = CompletionClient::new(&config.completion)?;
    info!("Using completion model {}", completion.model());

    let connector =
        SlackClientHyperConnector::new().map_err(|e| BotError::SlackSetup(e.to_string()))?;
    let client = Arc::new(SlackClient::new(connector));
    let token = SlackApiToken::new(SlackApiTokenValue(config.bot_token.clone()));

    let auth = client.open_session(&token).auth_test().await?;
    let bot_user_id = auth.user_id.0.clone();
    info!("Slack bot user ID resolved: {bot_user_id}");

    let bot = Arc::new(SlackBot {
        client: client.clone(),
        token,
        bot_user_id,
        cache: ConversationCache::default(),
        completion,
        persona_template: config.persona_template,
    });

    let listener_environment = Arc::new(
        SlackClientEventsListenerEnvironment::new(client).with_error_handler(slack_error_handler),
    );
    let signing_secret: SlackSigningSecret = config.signing_secret.into();
    let listener = SlackEventsAxumListener::new(listener_environment);

    let app = Router::new()
        .route(
            "/",
            post(events::push_event_handler).layer(
                listener
                    .events_layer(&signing_secret)
                    .with_event_extractor(SlackEventsExtractors::push_event()),
            ),
        )
        .route(
            "/slack/events",
            post(events::push_event_handler).layer(
                listener
                    .events_layer(&signing_secret)
                    .with_event_extractor(SlackEventsExtractors::push_event()),
            ),
        )
        .layer(Extension(bot));

    let tcp = TcpListener::bind(config.listen_addr).await?;
    info!("Slack events receiver listening on {}", config.listen_addr);

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn slack_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    warn!("Rejected Slack request: {err}");
    HttpStatusCode::BAD_REQUEST
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received, shutting down...");
}
