//! Decides whether a chat message addresses the bot.

use bobbot_core::config::MentionMode;
use bobbot_core::types::ContextRecord;

#[derive(Debug, Clone)]
pub struct MentionPolicy {
    mode: MentionMode,
    /// Lowercased names matched as substrings.
    names: Vec<String>,
}

impl MentionPolicy {
    pub fn new(mode: MentionMode, names: &[String]) -> Self {
        Self {
            mode,
            names: names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    fn names_bot(&self, record: &ContextRecord) -> bool {
        let content = record.content.to_lowercase();
        self.names.iter().any(|n| content.contains(n.as_str()))
    }

    fn tags_bot(record: &ContextRecord) -> bool {
        !record.client_id.is_empty() && record.mentions.iter().any(|m| *m == record.client_id)
    }

    pub fn matches(&self, record: &ContextRecord) -> bool {
        match self.mode {
            MentionMode::Name => self.names_bot(record),
            MentionMode::Structured => Self::tags_bot(record),
            MentionMode::Either => self.names_bot(record) || Self::tags_bot(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(content: &str, mentions: &[&str]) -> ContextRecord {
        ContextRecord {
            id: "m1".into(),
            client_id: "42".into(),
            author_id: "7".into(),
            author_name: "alice".into(),
            channel_id: "c1".into(),
            channel_name: "general".into(),
            content: content.into(),
            mentions: mentions.iter().map(|m| m.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_modes() {
        let names = vec!["Bob".to_string()];
        let by_name = record("hey BOB, you there?", &[]);
        let by_tag = record("<@42> hi", &["42"]);
        let neither = record("nice weather", &["9"]);

        let name = MentionPolicy::new(MentionMode::Name, &names);
        assert!(name.matches(&by_name));
        assert!(!name.matches(&by_tag));

        let structured = MentionPolicy::new(MentionMode::Structured, &names);
        assert!(!structured.matches(&by_name));
        assert!(structured.matches(&by_tag));

        let either = MentionPolicy::new(MentionMode::Either, &names);
        assert!(either.matches(&by_name));
        assert!(either.matches(&by_tag));
        assert!(!either.matches(&neither));
    }

    #[test]
    fn test_blank_names_ignored() {
        let policy = MentionPolicy::new(MentionMode::Name, &["  ".to_string()]);
        assert!(!policy.matches(&record("anything", &[])));
    }
}
