use reqwest::StatusCode;
use slack_morphism::errors::SlackClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Serenity error: {0}")]
    Serenity(Box<poise::serenity_prelude::Error>),

    #[error("Slack API error: {0}")]
    Slack(Box<SlackClientError>),

    #[error("Slack client setup error: {0}")]
    SlackSetup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid conversation key: {0}")]
    InvalidConversation(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Completion API error ({status}): {message}")]
    CompletionApi { status: StatusCode, message: String },

    #[error("Completion response error: {0}")]
    CompletionResponse(String),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<poise::serenity_prelude::Error> for BotError {
    fn from(err: poise::serenity_prelude::Error) -> Self {
        BotError::Serenity(Box::new(err))
    }
}

impl From<SlackClientError> for BotError {
    fn from(err: SlackClientError) -> Self {
        BotError::Slack(Box::new(err))
    }
}

impl BotError {
    /// Short label for the error kind, used when logging completion failures.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::Serenity(_) => "serenity",
            BotError::Slack(_) => "slack",
            BotError::SlackSetup(_) => "slack_setup",
            BotError::Config(_) => "config",
            BotError::InvalidConversation(_) => "invalid_conversation",
            BotError::EnvVar(_) => "env_var",
            BotError::CompletionApi { status, .. } if status.is_server_error() => {
                "completion_api_server"
            }
            BotError::CompletionApi { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS => {
                "completion_api_rate_limit"
            }
            BotError::CompletionApi { .. } => "completion_api",
            BotError::CompletionResponse(_) => "completion_response",
            BotError::Reqwest(e) if e.is_timeout() => "http_timeout",
            BotError::Reqwest(_) => "http",
            BotError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
