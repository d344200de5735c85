//! lockup-state
//!
//! Persistent lock store, the time indices over it, and the engine that
//! keeps both consistent with the module balance on every mutation.

pub mod config;
pub mod db;
pub mod engine;
pub mod keys;

pub use config::EngineConfig;
pub use db::{StateBatch, StateDb};
pub use engine::LockupEngine;
