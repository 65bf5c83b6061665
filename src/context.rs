//! Per-conversation context cache: recent history plus the current roster.

mod history;
mod roster;

use std::collections::HashMap;

use futures::{Stream, StreamExt};
use log::debug;
use tokio::sync::RwLock;

use crate::types::ConversationKey;

pub use history::{HistoryMessage, HistoryWindow, MessageRecord, TokenBudget, estimate_tokens};
pub use roster::{Participant, format_roster};

#[derive(Debug, Clone, Default)]
struct ContextEntry {
    history: Vec<MessageRecord>,
    roster: Vec<String>,
}

/// Copy of one conversation's cached context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationSnapshot {
    /// Oldest-first.
    pub history: Vec<MessageRecord>,
    pub roster: Vec<String>,
}

/// Summary of a completed history refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryRefresh {
    pub admitted: usize,
    pub estimated_tokens: f64,
}

/// In-memory context keyed by conversation.
///
/// Entries are only ever replaced, never removed. Refreshes assemble their
/// result without holding the lock, so a failed refresh leaves the previous
/// entry exactly as it was.
#[derive(Debug, Default)]
pub struct ConversationCache {
    budget: TokenBudget,
    entries: RwLock<HashMap<ConversationKey, ContextEntry>>,
}

impl ConversationCache {
    #[must_use]
    pub fn new(budget: TokenBudget) -> Self {
        Self {
            budget,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a conversation's history from a newest-first message source.
    ///
    /// Messages authored by `self_id` are skipped. The source is not polled
    /// past the first message that would overflow the budget.
    ///
    /// # Errors
    ///
    /// Returns the source's error if enumeration fails; the cached entry is
    /// left untouched in that case.
    pub async fn refresh_history<S, E>(
        &self,
        key: &ConversationKey,
        source: S,
        self_id: &str,
    ) -> Result<HistoryRefresh, E>
    where
        S: Stream<Item = Result<HistoryMessage, E>>,
    {
        let mut source = std::pin::pin!(source);
        let mut window = HistoryWindow::new(self.budget);

        while let Some(item) = source.next().await {
            let message = item?;
            if message.author_id == self_id {
                continue;
            }
            if !window.offer(MessageRecord::new(message.author_name, message.text)) {
                break;
            }
        }

        let (records, estimated_tokens) = window.finish();
        let refresh = HistoryRefresh {
            admitted: records.len(),
            estimated_tokens,
        };

        self.entries
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .history = records;

        debug!(
            "Stored {} history messages for {} (~{:.1} tokens)",
            refresh.admitted, key, refresh.estimated_tokens
        );
        Ok(refresh)
    }

    /// Replace a conversation's roster wholesale. Returns the number of entries stored.
    pub async fn refresh_roster<I>(&self, key: &ConversationKey, participants: I) -> usize
    where
        I: IntoIterator<Item = Participant>,
    {
        let roster = format_roster(participants);
        let count = roster.len();

        self.entries
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .roster = roster;

        debug!("Stored {count} roster entries for {key}");
        count
    }

    /// Current context for a conversation; empty for unknown keys.
    pub async fn get(&self, key: &ConversationKey) -> ConversationSnapshot {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| ConversationSnapshot {
                history: entry.history.clone(),
                roster: entry.roster.clone(),
            })
            .unwrap_or_default()
    }

    /// Number of conversations with a cached entry.
    pub async fn conversation_count(&self) -> usize {
        self.entries.read().await.len()
    }
}
