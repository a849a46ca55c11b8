//! Traits implemented by BobBot's external collaborators.

pub mod channel;
pub mod context;
pub mod lifecycle;
pub mod provider;

pub use channel::{Channel, Inbound};
pub use context::ContextStore;
pub use lifecycle::Lifecycle;
pub use provider::Generator;
