//! Prompt builders for the persona.

use chrono::{DateTime, Utc};

use bobbot_core::config::IdentityConfig;
use bobbot_core::types::{ContextRecord, JournalEntry};

/// Full weekday name, e.g. "Tuesday".
pub fn day_of_week(now: DateTime<Utc>) -> String {
    now.format("%A").to_string()
}

/// `(channel) author: content`, used for cross-channel memories.
pub fn memory_line(record: &ContextRecord) -> String {
    format!(
        "({}) {}: {}",
        record.channel_name, record.author_name, record.content
    )
}

fn join_entries(entries: &[JournalEntry]) -> String {
    entries
        .iter()
        .map(|e| e.entry.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Reply prompt: persona, style, then the channel transcript ending with
/// the bot's name as the next speaker.
pub fn chat_prompt(identity: &IdentityConfig, context: &[ContextRecord]) -> String {
    let transcript = context
        .iter()
        .map(ContextRecord::as_prompt_line)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{} {}\n\nContext:\n{}\n\n{}:",
        identity.system_prompt, identity.reply_style, transcript, identity.name
    )
}

/// Journal prompt from previous entries (newest first) and recent
/// memories (newest first).
pub fn journal_prompt(day: &str, entries: &[JournalEntry], memories: &[ContextRecord]) -> String {
    let memories = memories
        .iter()
        .map(memory_line)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "It is {day}.\nHere are your previous journal entries:\n{}\n\n\
         Here's what you remember:\n{}\n\n\
         Reflect on your experiences, thoughts, and the interactions you've had recently. \
         Use these memories to write a new journal entry.",
        join_entries(entries),
        memories
    )
}

pub fn tweet_prompt(entries: &[JournalEntry], max_chars: usize) -> String {
    format!(
        "Based on your recent reflections and memories, compose a SHORT post for X. \
         Here's what you've been thinking about:\n\n{}\n\n\
         Post MUST be less than {max_chars} characters.",
        join_entries(entries)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(author: &str, content: &str) -> ContextRecord {
        ContextRecord {
            id: format!("{author}-{content}"),
            client_id: "42".into(),
            author_id: author.into(),
            author_name: author.into(),
            channel_id: "c1".into(),
            channel_name: "swamp".into(),
            content: content.into(),
            mentions: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_day_of_week() {
        let tuesday = Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap();
        assert_eq!(day_of_week(tuesday), "Tuesday");
    }

    #[test]
    fn test_chat_prompt_ends_with_speaker() {
        let identity = IdentityConfig::default();
        let prompt = chat_prompt(&identity, &[record("alice", "hi bob"), record("carol", "hello")]);
        assert!(prompt.starts_with(&identity.system_prompt));
        assert!(prompt.contains("Context:\nalice: hi bob\ncarol: hello"));
        assert!(prompt.ends_with("\n\nBob:"));
    }

    #[test]
    fn test_journal_prompt() {
        let entries = vec![JournalEntry::new("newest"), JournalEntry::new("older")];
        let prompt = journal_prompt("Friday", &entries, &[record("alice", "sss")]);
        assert!(prompt.starts_with("It is Friday."));
        assert!(prompt.contains("newest\n\nolder"));
        assert!(prompt.contains("(swamp) alice: sss"));
    }

    #[test]
    fn test_tweet_prompt_mentions_limit() {
        let prompt = tweet_prompt(&[JournalEntry::new("thoughts")], 280);
        assert!(prompt.contains("thoughts"));
        assert!(prompt.contains("less than 280 characters"));
    }
}
