//! Plain-text channel commands (`hello`, `help`, `time`, `lastmessage`).

use chrono::{DateTime, Local, TimeZone};
use log::{error, warn};
use slack_morphism::prelude::*;
use strum::EnumString;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HELP_TEXT: &str = "
*Available commands:*
• hello (안녕) - the bot says hello
• help (도움말) - show this help message
• time (시간) - show the current time
• lastmessage (마지막메시지) - show the last message in this channel
Mention the bot to ask it anything else.
";

const LAST_MESSAGE_UNAVAILABLE: &str = "Could not fetch the message.";

/// A message whose whole text is one of these words runs the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SlackCommand {
    #[strum(serialize = "hello", serialize = "안녕")]
    Greet,
    #[strum(serialize = "help", serialize = "도움말")]
    Help,
    #[strum(serialize = "time", serialize = "시간")]
    Time,
    #[strum(serialize = "lastmessage", serialize = "마지막메시지")]
    LastMessage,
}

/// The most recent message of a channel, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub author: String,
    pub timestamp: String,
    pub text: String,
    pub in_thread: bool,
}

impl SlackCommand {
    /// Produce the reply text for this command in `channel`, on behalf of `user_id`.
    pub async fn reply(
        self,
        session: &SlackClientSession<'_, SlackClientHyperHttpsConnector>,
        channel: &SlackChannelId,
        user_id: &str,
    ) -> String {
        match self {
            SlackCommand::Greet => greeting(user_id),
            SlackCommand::Help => HELP_TEXT.to_string(),
            SlackCommand::Time => current_time(&Local::now()),
            SlackCommand::LastMessage => {
                render_last_message(fetch_last_message(session, channel).await.as_ref())
            }
        }
    }
}

fn greeting(user_id: &str) -> String {
    format!("Hello, <@{user_id}>!")
}

fn current_time<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("The current time is {}.", now.format(TIME_FORMAT))
}

/// Render a Slack `ts` ("seconds.micros") in the given time zone.
///
/// Unparsable values are returned unchanged.
fn format_slack_ts<Tz: TimeZone>(ts: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let (secs, fraction) = ts.split_once('.').unwrap_or((ts, ""));
    let Ok(secs) = secs.parse::<i64>() else {
        return ts.to_string();
    };
    let micros = fraction
        .get(..fraction.len().min(6))
        .and_then(|digits| format!("{digits:0<6}").parse::<u32>().ok())
        .unwrap_or(0);

    DateTime::from_timestamp(secs, micros * 1_000).map_or_else(
        || ts.to_string(),
        |utc| utc.with_timezone(tz).format(TIME_FORMAT).to_string(),
    )
}

fn render_last_message(last: Option<&LastMessage>) -> String {
    let Some(last) = last else {
        return LAST_MESSAGE_UNAVAILABLE.to_string();
    };

    let mut text = format!(
        "
*Last message:*
• Author: {}
• Time: {}
• Text: {}
",
        last.author, last.timestamp, last.text
    );
    if last.in_thread {
        text.push_str("• This message is in a thread");
    }
    text
}

async fn fetch_last_message(
    session: &SlackClientSession<'_, SlackClientHyperHttpsConnector>,
    channel: &SlackChannelId,
) -> Option<LastMessage> {
    let request = SlackApiConversationsHistoryRequest::new()
        .with_channel(channel.clone())
        .with_limit(1);

    let message = match session.conversations_history(&request).await {
        Ok(response) => response.messages.into_iter().next()?,
        Err(e) => {
            error!("Failed to fetch last message of {}: {}", channel.0, e);
            return None;
        }
    };

    let user_id = message.sender.user.map(|user| user.0).unwrap_or_default();
    let author = resolve_real_name(session, &user_id)
        .await
        .unwrap_or_else(|| format!("<@{user_id}>"));

    Some(LastMessage {
        author,
        timestamp: format_slack_ts(&message.origin.ts.0, &Local),
        text: message.content.text.unwrap_or_default(),
        in_thread: message.origin.thread_ts.is_some(),
    })
}

async fn resolve_real_name(
    session: &SlackClientSession<'_, SlackClientHyperHttpsConnector>,
    user_id: &str,
) -> Option<String> {
    if user_id.is_empty() {
        return None;
    }
    match session
        .users_info(&SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_string())))
        .await
    {
        Ok(response) => response
            .user
            .profile
            .and_then(|profile| profile.real_name)
            .filter(|name| !name.trim().is_empty()),
        Err(e) => {
            warn!("Failed to look up Slack user {user_id}: {e}");
            None
        }
    }
}
