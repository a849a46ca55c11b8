//! # BobBot Core
//!
//! Shared vocabulary for every BobBot crate: configuration, the error
//! taxonomy, chat context types and the traits that external collaborators
//! (chat platforms, the language model, the context store) implement.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::BobConfig;
pub use error::{BobError, Result};
