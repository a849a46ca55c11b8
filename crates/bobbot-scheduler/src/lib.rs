//! # BobBot Scheduler
//!
//! Durable task queue plus the poll-driven machinery that drains it.
//!
//! ## Architecture
//! ```text
//! DispatchScheduler
//!   ├── ChannelWorker "discord" ── DeliveryHandler ── chunk_message ── Discord
//!   ├── ChannelWorker "x"       ── DeliveryHandler ── chunk_message ── X
//!   ├── ChannelWorker "ai"      ── GenerationHandler ── LLM
//!   └── any other PollJob (chat responder, journal, tweets, ingestion)
//!
//! TaskStore (SQLite or memory)
//!   pending ──► completed
//!          └──► failed
//! ```

pub mod chunk;
pub mod engine;
pub mod handlers;
pub mod persistence;
pub mod store;
pub mod tasks;
pub mod worker;

pub use chunk::chunk_message;
pub use engine::{DispatchScheduler, PollJob};
pub use handlers::{DeliveryHandler, GenerationHandler, with_timeout};
pub use persistence::SqliteStore;
pub use store::{MemoryStore, TaskStore};
pub use tasks::{NewTask, Task, TaskFilter, TaskId, TaskKind, TaskStatus};
pub use worker::{ChannelWorker, CycleReport, TaskHandler};
