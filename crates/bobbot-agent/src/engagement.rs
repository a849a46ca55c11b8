//! Recent-engagement tracking for chat participants.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Participant id → time of the bot's last reply to them. Entries older
/// than the timeout are pruned lazily on lookup.
#[derive(Debug)]
pub struct EngagementTracker {
    timeout: Duration,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl EngagementTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_seen: HashMap::new(),
        }
    }

    pub fn record(&mut self, participant: &str, now: DateTime<Utc>) {
        if participant.is_empty() {
            return;
        }
        self.last_seen.insert(participant.to_string(), now);
    }

    /// Whether `participant` was engaged within the timeout before `now`.
    pub fn is_engaged(&mut self, participant: &str, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_seen.get(participant).copied() else {
            return false;
        };
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < self.timeout {
            return true;
        }
        self.last_seen.remove(participant);
        false
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}
