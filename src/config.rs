use std::{env, net::SocketAddr, time::Duration};

use log::{debug, error, info, warn};

use crate::context::TokenBudget;
use crate::error::{BotError, Result};
use crate::prompt::{DEFAULT_PERSONA, HISTORY_SLOT, ROSTER_SLOT};

const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SLACK_LISTEN_ADDR: &str = "0.0.0.0:3000";

type Lookup<'a> = &'a dyn Fn(&str) -> std::result::Result<String, env::VarError>;

/// Settings for the chat-completion endpoint, shared by both bots.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub discord_token: String,
    pub completion: CompletionConfig,
    pub history_budget: TokenBudget,
    pub persona_template: String,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub signing_secret: String,
    pub listen_addr: SocketAddr,
    pub completion: CompletionConfig,
    pub persona_template: String,
}

impl DiscordConfig {
    /// Load the Discord bot configuration from the environment (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns an error if a required credential is missing or an optional
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        debug!("Loading Discord configuration from environment");
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| env::var(key))
    }

    fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let discord_token = required(lookup, "DISCORD_TOKEN")?;
        let completion = CompletionConfig::from_lookup(lookup)?;
        let history_budget = match optional(lookup, "HISTORY_TOKEN_BUDGET") {
            Some(raw) => parse_budget(&raw)?,
            None => TokenBudget::default(),
        };
        let persona_template = persona_template(lookup);

        info!("Discord configuration loaded successfully");
        debug!("Discord token length: {} characters", discord_token.len());
        debug!("History token budget: {}", history_budget.ceiling());

        Ok(Self {
            discord_token,
            completion,
            history_budget,
            persona_template,
        })
    }
}

impl SlackConfig {
    /// Load the Slack bot configuration from the environment (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns an error if a required credential is missing or the listen
    /// address is malformed.
    pub fn from_env() -> Result<Self> {
        debug!("Loading Slack configuration from environment");
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| env::var(key))
    }

    fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let bot_token = required(lookup, "SLACK_BOT_TOKEN")?;
        let signing_secret = required(lookup, "SLACK_SIGNING_SECRET")?;
        let completion = CompletionConfig::from_lookup(lookup)?;

        let raw_addr = optional(lookup, "SLACK_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_SLACK_LISTEN_ADDR.to_string());
        let listen_addr = raw_addr.parse::<SocketAddr>().map_err(|e| {
            BotError::Config(format!("SLACK_LISTEN_ADDR '{raw_addr}' is invalid: {e}"))
        })?;
        let persona_template = persona_template(lookup);

        info!("Slack configuration loaded successfully");
        debug!("Slack bot token length: {} characters", bot_token.len());
        debug!("Slack listen address: {listen_addr}");

        Ok(Self {
            bot_token,
            signing_secret,
            listen_addr,
            completion,
            persona_template,
        })
    }
}

impl CompletionConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let api_key = required(lookup, "OPENAI_API_KEY")?;
        let api_url =
            optional(lookup, "OPENAI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let model = optional(lookup, "OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout_secs = match optional(lookup, "COMPLETION_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                BotError::Config(format!("COMPLETION_TIMEOUT_SECS '{raw}' is invalid: {e}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        debug!("Completion API key length: {} characters", api_key.len());
        debug!("Completion model: {model}");
        debug!("Completion endpoint: {api_url}");

        Ok(Self {
            api_key,
            api_url,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn required(lookup: Lookup<'_>, key: &str) -> Result<String> {
    let value = lookup(key).map_err(|e| {
        error!("Failed to load {key} from environment: {e}");
        e
    })?;
    if value.trim().is_empty() {
        error!("{key} is set but empty");
        return Err(BotError::Config(format!("{key} must not be empty")));
    }
    Ok(value)
}

fn optional(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_budget(raw: &str) -> Result<TokenBudget> {
    let ceiling = raw.trim().parse::<f64>().map_err(|e| {
        BotError::Config(format!("HISTORY_TOKEN_BUDGET '{raw}' is invalid: {e}"))
    })?;
    TokenBudget::new(ceiling).ok_or_else(|| {
        BotError::Config(format!(
            "HISTORY_TOKEN_BUDGET must be a finite, non-negative number, got {raw}"
        ))
    })
}

fn persona_template(lookup: Lookup<'_>) -> String {
    let Some(template) = optional(lookup, "PERSONA_TEMPLATE") else {
        return DEFAULT_PERSONA.to_string();
    };
    for slot in [ROSTER_SLOT, HISTORY_SLOT] {
        if !template.contains(slot) {
            warn!("PERSONA_TEMPLATE has no {slot} insertion point; that context will be omitted");
        }
    }
    debug!("Persona template length: {} characters", template.len());
    template
}
