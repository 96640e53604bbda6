pub mod auth;
pub mod content;
pub mod server;
pub mod taxonomy;
