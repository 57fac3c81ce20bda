use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteResult;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugEntry {
    pub recorded_at: DateTime<Utc>,
    pub message: String,
}

/// Human-readable diagnostic trail of a session. Advisory only: nothing reads
/// it back to make decisions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLog {
    entries: Vec<DebugEntry>,
}

impl DebugLog {
    pub fn record(&mut self, message: impl Into<String>) {
        self.entries.push(DebugEntry { recorded_at: Utc::now(), message: message.into() });
    }

    pub fn entries(&self) -> &[DebugEntry] {
        &self.entries
    }

    pub fn append(&mut self, mut other: DebugLog) {
        self.entries.append(&mut other.entries);
    }

    pub fn render(&self) -> String {
        self.entries.iter().map(|entry| entry.message.as_str()).collect::<Vec<_>>().join("\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// In-memory state of one quoting session: results newest first plus the
/// accumulated debug log.
#[derive(Clone, Debug, Default)]
pub struct QuoteSession {
    history: VecDeque<QuoteResult>,
    debug_log: DebugLog,
}

impl QuoteSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_result(&mut self, result: QuoteResult) {
        self.history.push_front(result);
    }

    pub fn append_log(&mut self, log: DebugLog) {
        self.debug_log.append(log);
    }

    pub fn history(&self) -> impl Iterator<Item = &QuoteResult> {
        self.history.iter()
    }

    /// Newest first, numbered so the oldest result is 1.
    pub fn numbered_history(&self) -> impl Iterator<Item = (usize, &QuoteResult)> {
        let total = self.history.len();
        self.history.iter().enumerate().map(move |(index, result)| (total - index, result))
    }

    pub fn latest(&self) -> Option<&QuoteResult> {
        self.history.front()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.debug_log
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.debug_log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{DebugLog, QuoteSession};
    use crate::domain::quote::{QuoteResult, SubmissionId};

    fn result(id: &str) -> QuoteResult {
        QuoteResult::new(SubmissionId(id.to_string()), format!("input {id}"))
    }

    #[test]
    fn history_is_newest_first_and_numbered_from_oldest() {
        let mut session = QuoteSession::new();
        session.record_result(result("first"));
        session.record_result(result("second"));
        session.record_result(result("third"));

        let numbered = session
            .numbered_history()
            .map(|(number, result)| (number, result.id.as_str().to_string()))
            .collect::<Vec<_>>();
        assert_eq!(
            numbered,
            vec![(3, "third".to_string()), (2, "second".to_string()), (1, "first".to_string())]
        );
        assert_eq!(session.latest().map(|result| result.id.as_str()), Some("third"));
    }

    #[test]
    fn logs_accumulate_across_submissions() {
        let mut session = QuoteSession::new();

        let mut first = DebugLog::default();
        first.record("input: screen 3500");
        session.append_log(first);

        let mut second = DebugLog::default();
        second.record("input: ALUX Glass 6000x2500");
        second.record("selected size: 6000 × 2500");
        session.append_log(second);

        assert_eq!(session.debug_log().len(), 3);
        assert_eq!(
            session.debug_log().render(),
            "input: screen 3500\ninput: ALUX Glass 6000x2500\nselected size: 6000 × 2500"
        );
    }

    #[test]
    fn reset_clears_history_and_log() {
        let mut session = QuoteSession::new();
        session.record_result(result("only"));
        let mut log = DebugLog::default();
        log.record("something");
        session.append_log(log);

        session.reset();

        assert!(session.is_empty());
        assert!(session.debug_log().is_empty());
    }
}
