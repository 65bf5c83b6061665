pub mod completion;
pub mod config;
pub mod context;
pub mod discord;
pub mod error;
pub mod prompt;
pub mod slack;
pub mod trigger;
pub mod types;
