//! Decides whether an inbound message gets a completion reply, and sends it.

use async_trait::async_trait;
use log::{debug, error, info};

use crate::completion::CompletionBackend;
use crate::context::ConversationCache;
use crate::error::Result;
use crate::prompt::{build_system_prompt, build_user_content};
use crate::types::{ConversationKey, InboundMessage};

/// Reply sent when no completion can be delivered.
pub const APOLOGY: &str =
    "Sorry, an error occurred while generating a response. Please try again in a moment.";

/// Outbound send call of a messaging platform.
#[async_trait]
pub trait Responder: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the platform rejects the message.
    async fn send(&self, conversation: &ConversationKey, text: &str) -> Result<()>;
}

/// What the trigger policy did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Authored by the bot itself.
    IgnoredSelf,
    /// Did not mention the bot.
    NotMentioned,
    /// The completion was posted.
    Replied,
    /// The completion failed or could not be posted, and the apology was posted.
    Apologized,
}

/// Run the trigger policy for one inbound message.
///
/// A qualifying message produces exactly one reply. Completion failures, and
/// completions the responder refuses to post, are logged and answered with
/// [`APOLOGY`]; they are never retried.
///
/// # Errors
///
/// Returns an error only if the responder also fails to send the apology.
pub async fn handle_message<C, R>(
    message: &InboundMessage,
    cache: &ConversationCache,
    completion: &C,
    responder: &R,
    persona_template: &str,
) -> Result<TriggerOutcome>
where
    C: CompletionBackend + ?Sized,
    R: Responder + ?Sized,
{
    if message.from_self {
        debug!("Ignoring own message in {}", message.conversation);
        return Ok(TriggerOutcome::IgnoredSelf);
    }
    if !message.mentions_self {
        return Ok(TriggerOutcome::NotMentioned);
    }

    let snapshot = cache.get(&message.conversation).await;
    let system_prompt = build_system_prompt(&snapshot.roster, &snapshot.history, persona_template);
    let user_content = build_user_content(&message.text, &message.self_mention_token);
    debug!(
        "Prompting with {} roster entries and {} history messages for {}",
        snapshot.roster.len(),
        snapshot.history.len(),
        message.conversation
    );

    match completion.complete(&system_prompt, &user_content).await {
        Ok(reply) => match responder.send(&message.conversation, &reply).await {
            Ok(()) => {
                info!(
                    "Replied to {} in {}: {}",
                    message.author, message.conversation, reply
                );
                Ok(TriggerOutcome::Replied)
            }
            // Nothing was posted, so the apology is still the only reply.
            Err(e) => {
                error!(
                    "Failed to send reply to {} in {} ({}): {:?}",
                    message.author,
                    message.conversation,
                    e.kind(),
                    e
                );
                responder.send(&message.conversation, APOLOGY).await?;
                Ok(TriggerOutcome::Apologized)
            }
        },
        Err(e) => {
            error!(
                "Completion failed for {} in {} ({}): {:?}",
                message.author,
                message.conversation,
                e.kind(),
                e
            );
            responder.send(&message.conversation, APOLOGY).await?;
            Ok(TriggerOutcome::Apologized)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::stream;
    use reqwest::StatusCode;

    use super::*;
    use crate::context::{HistoryMessage, Participant};
    use crate::error::BotError;

    const PERSONA: &str = "roster:\n{roster}\nhistory:\n{history}";

    struct ScriptedCompletion {
        reply: Option<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedCompletion {
        fn replying(reply: impl Into<String>) -> Self {
            Self {
                reply: Some(reply.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedCompletion {
        async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((system_prompt.to_string(), user_content.to_string()));
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(BotError::CompletionApi {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "upstream down".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingResponder {
        max_chars: Option<usize>,
        sent: Mutex<Vec<(ConversationKey, String)>>,
    }

    impl RecordingResponder {
        fn limited_to(max_chars: usize) -> Self {
            Self {
                max_chars: Some(max_chars),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<(ConversationKey, String)> {
            self.sent.lock().expect("sent lock").clone()
        }
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn send(&self, conversation: &ConversationKey, text: &str) -> Result<()> {
            if self.max_chars.is_some_and(|max| text.chars().count() > max) {
                return Err(BotError::Io(std::io::Error::other("message too long")));
            }
            self.sent
                .lock()
                .expect("sent lock")
                .push((conversation.clone(), text.to_string()));
            Ok(())
        }
    }

    fn inbound(text: &str, mentions_self: bool, from_self: bool) -> InboundMessage {
        InboundMessage {
            conversation: ConversationKey::from("general"),
            author: "alice".to_string(),
            text: text.to_string(),
            mentions_self,
            from_self,
            self_mention_token: "<@42>".to_string(),
        }
    }

    async fn seeded_cache() -> ConversationCache {
        let cache = ConversationCache::default();
        let key = ConversationKey::from("general");
        cache
            .refresh_roster(
                &key,
                [Participant {
                    name: "alice".to_string(),
                    automated: false,
                    status: "online".to_string(),
                }],
            )
            .await;
        let source = vec![Ok::<_, &str>(HistoryMessage {
            author_id: "1".to_string(),
            author_name: "alice".to_string(),
            text: "earlier question".to_string(),
        })];
        cache
            .refresh_history(&key, stream::iter(source), "42")
            .await
            .expect("seed history");
        cache
    }

    #[tokio::test]
    async fn own_message_is_ignored() {
        let cache = seeded_cache().await;
        let before = cache.get(&ConversationKey::from("general")).await;
        let completion = ScriptedCompletion::replying("unused");
        let responder = RecordingResponder::default();

        let outcome = handle_message(
            &inbound("<@42> talking to myself", true, true),
            &cache,
            &completion,
            &responder,
            PERSONA,
        )
        .await
        .expect("policy runs");

        assert_eq!(outcome, TriggerOutcome::IgnoredSelf);
        assert!(completion.calls().is_empty());
        assert!(responder.sent().is_empty());
        assert_eq!(cache.get(&ConversationKey::from("general")).await, before);
    }

    #[tokio::test]
    async fn unmentioned_message_gets_no_reply() {
        let cache = seeded_cache().await;
        let completion = ScriptedCompletion::replying("unused");
        let responder = RecordingResponder::default();

        let outcome = handle_message(
            &inbound("just chatting", false, false),
            &cache,
            &completion,
            &responder,
            PERSONA,
        )
        .await
        .expect("policy runs");

        assert_eq!(outcome, TriggerOutcome::NotMentioned);
        assert!(completion.calls().is_empty());
        assert!(responder.sent().is_empty());
    }

    #[tokio::test]
    async fn mention_is_grounded_and_answered_once() {
        let cache = seeded_cache().await;
        let completion = ScriptedCompletion::replying("It is noon.");
        let responder = RecordingResponder::default();

        let outcome = handle_message(
            &inbound("<@42>  what time is it?", true, false),
            &cache,
            &completion,
            &responder,
            PERSONA,
        )
        .await
        .expect("policy runs");

        assert_eq!(outcome, TriggerOutcome::Replied);
        let calls = completion.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            "roster:\n- alice (status: online)\nhistory:\nalice: earlier question"
        );
        assert_eq!(calls[0].1, "what time is it?");
        assert_eq!(
            responder.sent(),
            vec![(ConversationKey::from("general"), "It is noon.".to_string())]
        );
    }

    #[tokio::test]
    async fn completion_failure_sends_one_apology() {
        let cache = seeded_cache().await;
        let before = cache.get(&ConversationKey::from("general")).await;
        let completion = ScriptedCompletion::failing();
        let responder = RecordingResponder::default();

        let outcome = handle_message(
            &inbound("<@42> help", true, false),
            &cache,
            &completion,
            &responder,
            PERSONA,
        )
        .await
        .expect("completion errors are absorbed");

        assert_eq!(outcome, TriggerOutcome::Apologized);
        assert_eq!(completion.calls().len(), 1);
        assert_eq!(
            responder.sent(),
            vec![(ConversationKey::from("general"), APOLOGY.to_string())]
        );
        assert_eq!(cache.get(&ConversationKey::from("general")).await, before);
    }

    #[tokio::test]
    async fn rejected_reply_falls_back_to_apology() {
        let cache = seeded_cache().await;
        let completion = ScriptedCompletion::replying("word ".repeat(420));
        let responder = RecordingResponder::limited_to(2000);

        let outcome = handle_message(
            &inbound("<@42> write me an essay", true, false),
            &cache,
            &completion,
            &responder,
            PERSONA,
        )
        .await
        .expect("send failures of the completion are absorbed");

        assert_eq!(outcome, TriggerOutcome::Apologized);
        assert_eq!(
            responder.sent(),
            vec![(ConversationKey::from("general"), APOLOGY.to_string())]
        );
    }

    #[tokio::test]
    async fn unknown_conversation_uses_empty_context() {
        let cache = ConversationCache::default();
        let completion = ScriptedCompletion::replying("hi");
        let responder = RecordingResponder::default();
        let mut message = inbound("<@42> hello", true, false);
        message.conversation = ConversationKey::from("elsewhere");

        handle_message(&message, &cache, &completion, &responder, PERSONA)
            .await
            .expect("policy runs");

        assert_eq!(completion.calls()[0].0, "roster:\n\nhistory:\n");
        assert_eq!(responder.sent()[0].0, ConversationKey::from("elsewhere"));
        assert!(cache.get(&ConversationKey::from("elsewhere")).await.history.is_empty());
    }
}
