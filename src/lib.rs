pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod console;
pub mod content;
pub mod error;
pub mod inflight;
pub mod selection;
pub mod taxonomy;
pub mod types;

pub use console::AdminConsole;
pub use error::{AdminError, AdminResult};

#[cfg(test)]
pub mod testing;
