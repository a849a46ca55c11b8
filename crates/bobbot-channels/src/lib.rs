//! # BobBot Channels
//! Platform clients: Discord (send + REST polling), X (posting), and a
//! log-only channel for dry runs.

pub mod discord;
pub mod log_channel;
pub mod x;

pub use discord::DiscordChannel;
pub use log_channel::LogChannel;
pub use x::XChannel;
