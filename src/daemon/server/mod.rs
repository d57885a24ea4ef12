//! Unix socket server driven by a `poll(2)` reactor.
//!
//! One thread owns the listener, every connection and the progress tree, so
//! requests are applied strictly one after another without locking.

mod connection;
mod core;
mod lifecycle;
mod reactor;


pub use self::core::{ShutdownHandle, TrackerServer};
