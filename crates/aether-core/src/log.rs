//! Log journal entries and the execution context built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, LogLevel};

/// An append-only journal line attributed to an agent (or to `system`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number assigned by the store.
    pub id: i64,

    /// Agent the line belongs to.
    pub agent_id: AgentId,

    /// Human-readable message.
    pub message: String,

    /// Severity.
    pub level: LogLevel,

    /// When the line was written.
    pub created_at: DateTime<Utc>,
}

/// Join an agent's log messages, oldest first, into an execution context.
///
/// `entries` must already be in chronological order. With `max_chars == 0` the
/// whole history is used. Otherwise the newest messages that fit within
/// `max_chars` characters (separators included) are kept; if the newest message
/// alone exceeds the window, its trailing `max_chars` characters are kept.
pub fn build_context(entries: &[LogEntry], max_chars: usize) -> String {
    let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
    if max_chars == 0 {
        return messages.join("\n");
    }

    let mut used = 0usize;
    let mut start = messages.len();
    for (idx, message) in messages.iter().enumerate().rev() {
        let separator = usize::from(start != messages.len());
        let cost = message.chars().count() + separator;
        if used + cost > max_chars {
            break;
        }
        used += cost;
        start = idx;
    }

    if start == messages.len() {
        return match messages.last() {
            Some(newest) => {
                let skip = newest.chars().count().saturating_sub(max_chars);
                newest.chars().skip(skip).collect()
            }
            None => String::new(),
        };
    }

    messages[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, message: &str) -> LogEntry {
        LogEntry {
            id,
            agent_id: AgentId::new("a1"),
            message: message.to_string(),
            level: LogLevel::Info,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_context_joins_chronologically() {
        let entries = vec![entry(1, "m1"), entry(2, "m2")];
        assert_eq!(build_context(&entries, 0), "m1\nm2");
        assert_eq!(build_context(&entries, 100), "m1\nm2");
    }

    #[test]
    fn test_context_empty_history() {
        assert_eq!(build_context(&[], 0), "");
        assert_eq!(build_context(&[], 10), "");
    }

    #[test]
    fn test_context_window_keeps_newest_messages() {
        let entries = vec![entry(1, "aaaa"), entry(2, "bbbb"), entry(3, "cccc")];
        // "bbbb\ncccc" is 9 chars
        assert_eq!(build_context(&entries, 9), "bbbb\ncccc");
        assert_eq!(build_context(&entries, 8), "cccc");
    }

    #[test]
    fn test_context_window_truncates_oversized_newest_message() {
        let entries = vec![entry(1, "old"), entry(2, "0123456789")];
        assert_eq!(build_context(&entries, 4), "6789");
    }
}
