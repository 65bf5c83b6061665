//! Discord bot: startup context loading and mention replies.

mod handler;
mod ready;
mod responder;

use std::error::Error as StdError;

use log::{debug, error, info};
use poise::{
    Framework, FrameworkOptions,
    serenity_prelude::{ClientBuilder, Context, FullEvent, GatewayIntents},
};

use crate::completion::CompletionClient;
use crate::config::DiscordConfig;
use crate::context::ConversationCache;
use crate::error::Result;

pub use responder::ChannelResponder;

type EventResult = std::result::Result<(), Box<dyn StdError + Send + Sync>>;

/// Shared state handed to every event handler.
pub struct Data {
    cache: ConversationCache,
    completion: CompletionClient,
    persona_template: String,
}

impl Data {
    #[must_use]
    pub fn cache(&self) -> &ConversationCache {
        &self.cache
    }

    #[must_use]
    pub fn completion(&self) -> &CompletionClient {
        &self.completion
    }

    #[must_use]
    pub fn persona_template(&self) -> &str {
        &self.persona_template
    }
}

/// Run the Discord bot until the gateway closes or Ctrl-C is received.
///
/// # Errors
///
/// Returns an error if configuration is incomplete or the client fails to start.
pub async fn run() -> Result<()> {
    info!("Initializing Discord bot");
    let config = DiscordConfig::from_env()?;

    debug!("Initializing completion client");
    let completion = CompletionClient::new(&config.completion)?;
    info!("Using completion model {}", completion.model());

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_PRESENCES;

    let discord_token = config.discord_token.clone();
    let cache = ConversationCache::new(config.history_budget);
    let persona_template = config.persona_template;

    debug!("Building framework");
    let framework = Framework::builder()
        .options(FrameworkOptions {
            event_handler: |ctx, event, _framework, data| Box::pin(event_handler(ctx, event, data)),
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            info!(
                "{} is connected to Discord (ID: {})",
                ready.user.name, ready.user.id
            );
            Box::pin(async move {
                Ok(Data {
                    cache,
                    completion,
                    persona_template,
                })
            })
        })
        .build();

    debug!("Creating Discord client");
    let mut client = ClientBuilder::new(discord_token, intents)
        .framework(framework)
        .await?;

    info!("Starting Discord client");

    tokio::select! {
        result = client.start() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    Ok(())
}

async fn event_handler(ctx: &Context, event: &FullEvent, data: &Data) -> EventResult {
    match event {
        FullEvent::CacheReady { guilds } => {
            ready::load_guild_contexts(ctx, guilds, data.cache()).await;
        }
        FullEvent::Message { new_message } => {
            if let Err(e) = handler::handle_message(ctx, new_message, data).await {
                error!(
                    "Error processing message {} in channel {}: {}",
                    new_message.id, new_message.channel_id, e
                );
            }
        }
        _ => {}
    }
    Ok(())
}
