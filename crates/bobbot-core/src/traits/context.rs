//! Read/write access to chat history and the bot's journal.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ContextRecord, JournalEntry, StoredMessage};

/// Persistent chat context consumed by the content generators.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn insert_message(&self, record: &ContextRecord) -> Result<()>;

    /// Messages stored after position `seq`, in storage order.
    async fn messages_after(&self, seq: i64) -> Result<Vec<StoredMessage>>;

    /// Position of the most recently stored message, 0 when there is none.
    async fn latest_message_seq(&self) -> Result<i64>;

    /// The latest `limit` messages of one channel, oldest first.
    async fn recent_in_channel(&self, channel_id: &str, limit: usize)
    -> Result<Vec<ContextRecord>>;

    /// The latest `limit` messages across all channels, newest first.
    async fn recent_messages(&self, limit: usize) -> Result<Vec<ContextRecord>>;

    /// Resolve a channel id from a channel display name seen in history.
    async fn find_channel_by_name(&self, name: &str) -> Result<Option<String>>;

    async fn insert_journal_entry(&self, entry: &JournalEntry) -> Result<()>;

    /// The latest `limit` journal entries, newest first.
    async fn recent_journal_entries(&self, limit: usize) -> Result<Vec<JournalEntry>>;
}
