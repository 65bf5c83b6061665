//! Token-budgeted message history.

use std::fmt;

/// Rough tokens-per-word ratio for English text.
const TOKENS_PER_WORD: f64 = 1.3;

/// Default history ceiling, sized to stay clear of per-minute token limits.
const DEFAULT_CEILING: f64 = 8000.0;

/// A stored history line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub author: String,
    pub text: String,
}

impl MessageRecord {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.author, self.text)
    }
}

/// A message as yielded by a platform history source.
#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub author_id: String,
    pub author_name: String,
    pub text: String,
}

/// Ceiling on the estimated token size of a stored history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBudget {
    ceiling: f64,
}

impl TokenBudget {
    /// Returns `None` for negative or non-finite ceilings.
    #[must_use]
    pub fn new(ceiling: f64) -> Option<Self> {
        (ceiling.is_finite() && ceiling >= 0.0).then_some(Self { ceiling })
    }

    #[must_use]
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CEILING,
        }
    }
}

/// Estimate the token cost of a piece of text as `words * 1.3`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * TOKENS_PER_WORD
}

/// Accumulates records newest-first until the budget would be exceeded.
///
/// The first record that does not fit closes the window: nothing older is
/// admitted afterwards, even if it would fit on its own.
#[derive(Debug)]
pub struct HistoryWindow {
    budget: TokenBudget,
    records: Vec<MessageRecord>,
    total: f64,
    closed: bool,
}

impl HistoryWindow {
    #[must_use]
    pub fn new(budget: TokenBudget) -> Self {
        Self {
            budget,
            records: Vec::new(),
            total: 0.0,
            closed: false,
        }
    }

    /// Offer the next older record. Returns `false` once the window is closed.
    pub fn offer(&mut self, record: MessageRecord) -> bool {
        if self.closed {
            return false;
        }

        let estimate = estimate_tokens(&record.to_string());
        if self.total + estimate > self.budget.ceiling() {
            self.closed = true;
            return false;
        }

        self.total += estimate;
        self.records.push(record);
        true
    }

    /// Consume the window, returning records oldest-first and their estimated total.
    #[must_use]
    pub fn finish(self) -> (Vec<MessageRecord>, f64) {
        let mut records = self.records;
        records.reverse();
        (records, self.total)
    }
}
