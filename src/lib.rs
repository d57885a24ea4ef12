pub mod client;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod progress;
