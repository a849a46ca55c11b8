//! # BobBot Agent
//!
//! The content side of BobBot. Every generator here is a `PollJob` that
//! reads the context store, asks the LLM for text and enqueues a delivery
//! task; the channel workers take it from there.
//!
//! - [`ChatResponder`]: replies where the bot was mentioned, engaged, or in
//!   its journal channel
//! - [`JournalComposer`]: periodic reflection posted to the journal channel
//! - [`TweetComposer`]: short posts for X at randomized intervals
//! - [`IngestJob`]: pulls inbound messages into the context store

pub mod engagement;
pub mod ingest;
pub mod journal;
pub mod mention;
pub mod prompt;
pub mod responder;
pub mod tweet;

pub use engagement::EngagementTracker;
pub use ingest::IngestJob;
pub use journal::JournalComposer;
pub use mention::MentionPolicy;
pub use responder::ChatResponder;
pub use tweet::TweetComposer;
