//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod live;
mod serve;
mod sessions;

pub use ask::{run_ask, AskOptions};
pub use chat::run_chat;
pub use config::run_config;
pub use serve::run_serve;
pub use sessions::run_sessions;
