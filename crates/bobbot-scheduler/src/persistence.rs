//! SQLite-backed persistence for tasks, chat context and journal entries.
//! Survives restarts; one connection shared behind a mutex.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use bobbot_core::error::{BobError, Result};
use bobbot_core::traits::{ContextStore, Lifecycle};
use bobbot_core::types::{ContextRecord, JournalEntry, StoredMessage};

use crate::store::TaskStore;
use crate::tasks::{NewTask, Task, TaskFilter, TaskId, TaskKind, TaskStatus};

const TASK_COLUMNS: &str =
    "id, kind, content, channel_id, status, result, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, client_id, author_id, author_name, channel_id, channel_name, \
     content, mentions, created_at";

/// SQLite-backed store. Closing it (via `Lifecycle::stop`) drops the
/// connection; later calls fail with a store error.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(db_err("DB open"))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("DB open"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().map_err(|e| BobError::Store(e.to_string()))?;
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(BobError::Store("store is closed".into())),
        }
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,              -- 'discord', 'x', 'ai', ...
            content TEXT NOT NULL,
            channel_id TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            result TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_kind_status ON tasks(kind, status);

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            author_name TEXT NOT NULL,
            channel_id TEXT NOT NULL,
            channel_name TEXT NOT NULL,
            content TEXT NOT NULL,
            mentions TEXT NOT NULL DEFAULT '[]',  -- JSON array of user ids
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);

        CREATE TABLE IF NOT EXISTS journal_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        ",
    )
    .map_err(db_err("Migration"))
}

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> BobError {
    move |e| BobError::Store(format!("{context}: {e}"))
}

/// Fixed-width UTC timestamps so text comparison matches time order.
fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let kind: String = row.get(1)?;
    let status: String = row.get(4)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(Task {
        id: TaskId::from(row.get::<_, String>(0)?),
        kind: TaskKind::from(kind),
        content: row.get(2)?,
        channel_id: row.get(3)?,
        status: status.parse().unwrap_or(TaskStatus::Failed),
        result: row.get(5)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<ContextRecord> {
    let mentions: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(ContextRecord {
        id: row.get(0)?,
        client_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        channel_id: row.get(4)?,
        channel_name: row.get(5)?,
        content: row.get(6)?,
        mentions: serde_json::from_str(&mentions).unwrap_or_default(),
        created_at: parse_ts(&created_at),
    })
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<ContextRecord>> {
    let mut stmt = conn.prepare(sql).map_err(db_err("Query messages"))?;
    let rows = stmt
        .query_map(params, row_to_message)
        .map_err(db_err("Query messages"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("Read messages"))
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn add_task(&self, task: NewTask) -> Result<TaskId> {
        let id = TaskId::generate();
        let now = ts(&Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, kind, content, channel_id, status, result, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5, ?5)",
                params![id.as_str(), task.kind.as_str(), task.content, task.channel_id, now],
            )
            .map_err(db_err("Insert task"))?;
            Ok(())
        })?;
        Ok(id)
    }

    async fn get_pending_tasks(&self, kind: &TaskKind) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'pending' AND kind = ?1 ORDER BY rowid"
            );
            let mut stmt = conn.prepare(&sql).map_err(db_err("Query tasks"))?;
            let rows = stmt
                .query_map(params![kind.as_str()], row_to_task)
                .map_err(db_err("Query tasks"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Read tasks"))
        })
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<()> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
            let task = conn
                .query_row(&sql, params![id.as_str()], row_to_task)
                .optional()
                .map_err(db_err("Load task"))?
                .ok_or_else(|| BobError::TaskNotFound(id.to_string()))?;
            if !task.check_transition(status)? {
                return Ok(());
            }
            // Guarded on the old status so a concurrent terminal write wins.
            let changed = conn
                .execute(
                    "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                    params![status.as_str(), ts(&Utc::now()), id.as_str(), task.status.as_str()],
                )
                .map_err(db_err("Update task"))?;
            if changed == 0 {
                return Err(BobError::Store(format!("task {id} changed concurrently")));
            }
            Ok(())
        })
    }

    async fn set_result(&self, id: &TaskId, result: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE tasks SET result = ?1, updated_at = ?2 WHERE id = ?3",
                    params![result, ts(&Utc::now()), id.as_str()],
                )
                .map_err(db_err("Update task"))?;
            if changed == 0 {
                return Err(BobError::TaskNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
            conn.query_row(&sql, params![id.as_str()], row_to_task)
                .optional()
                .map_err(db_err("Load task"))
        })
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE (?1 IS NULL OR kind = ?1) AND (?2 IS NULL OR status = ?2)
                 ORDER BY rowid DESC LIMIT ?3"
            );
            let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
            let mut stmt = conn.prepare(&sql).map_err(db_err("Query tasks"))?;
            let rows = stmt
                .query_map(
                    params![
                        filter.kind.as_ref().map(|k| k.as_str()),
                        filter.status.map(|s| s.as_str()),
                        limit
                    ],
                    row_to_task,
                )
                .map_err(db_err("Query tasks"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Read tasks"))
        })
    }
}

#[async_trait]
impl ContextStore for SqliteStore {
    async fn insert_message(&self, record: &ContextRecord) -> Result<()> {
        let mentions = serde_json::to_string(&record.mentions)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO messages
                 (id, client_id, author_id, author_name, channel_id, channel_name, content, mentions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.client_id,
                    record.author_id,
                    record.author_name,
                    record.channel_id,
                    record.channel_name,
                    record.content,
                    mentions,
                    ts(&record.created_at),
                ],
            )
            .map_err(db_err("Insert message"))?;
            Ok(())
        })
    }

    async fn messages_after(&self, seq: i64) -> Result<Vec<StoredMessage>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS}, rowid FROM messages WHERE rowid > ?1 ORDER BY rowid ASC"
            );
            let mut stmt = conn.prepare(&sql).map_err(db_err("Query messages"))?;
            let rows = stmt
                .query_map(params![seq], |row| {
                    Ok(StoredMessage {
                        seq: row.get(9)?,
                        record: row_to_message(row)?,
                    })
                })
                .map_err(db_err("Query messages"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Read messages"))
        })
    }

    async fn latest_message_seq(&self) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COALESCE(MAX(rowid), 0) FROM messages", [], |row| row.get(0))
                .map_err(db_err("Query messages"))
        })
    }

    async fn recent_in_channel(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ContextRecord>> {
        let mut found = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE channel_id = ?1
                 ORDER BY created_at DESC LIMIT ?2"
            );
            query_messages(conn, &sql, params![channel_id, limit as i64])
        })?;
        found.reverse();
        Ok(found)
    }

    async fn recent_messages(&self, limit: usize) -> Result<Vec<ContextRecord>> {
        self.with_conn(|conn| {
            let sql =
                format!("SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY created_at DESC LIMIT ?1");
            query_messages(conn, &sql, params![limit as i64])
        })
    }

    async fn find_channel_by_name(&self, name: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT channel_id FROM messages WHERE channel_name = ?1 LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("Find channel"))
        })
    }

    async fn insert_journal_entry(&self, entry: &JournalEntry) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO journal_entries (entry, created_at) VALUES (?1, ?2)",
                params![entry.entry, ts(&entry.created_at)],
            )
            .map_err(db_err("Insert journal entry"))?;
            Ok(())
        })
    }

    async fn recent_journal_entries(&self, limit: usize) -> Result<Vec<JournalEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT entry, created_at FROM journal_entries ORDER BY id DESC LIMIT ?1")
                .map_err(db_err("Query journal"))?;
            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    let created_at: String = row.get(1)?;
                    Ok(JournalEntry {
                        entry: row.get(0)?,
                        created_at: parse_ts(&created_at),
                    })
                })
                .map_err(db_err("Query journal"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Read journal"))
        })
    }
}

#[async_trait]
impl Lifecycle for SqliteStore {
    fn name(&self) -> &str {
        "sqlite-store"
    }

    async fn stop(&self) -> Result<()> {
        let mut guard = self.conn.lock().map_err(|e| BobError::Store(e.to_string()))?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| BobError::Store(format!("DB close: {e}")))?;
            tracing::info!("🗄️ Task store closed");
        }
        Ok(())
    }
}
